// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ProchubError, Result};
use crate::watch::patterns::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ProchubError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.process, raw.watch))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_process_section(cfg)?;
    validate_watch_section(cfg)?;
    Ok(())
}

fn validate_process_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.process.output_capacity == 0 {
        return Err(ProchubError::ConfigError(
            "[process].output_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    build_globset(&cfg.watch.exclude).map_err(|err| {
        ProchubError::ConfigError(format!("[watch].exclude: {err:#}"))
    })?;
    Ok(())
}
