#![allow(dead_code)]

use prochub::config::{ConfigFile, RawConfigFile};
use prochub::exec::ProcessSettings;
use prochub::watch::WatchSettings;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn output_capacity(mut self, bytes: usize) -> Self {
        self.config.process.output_capacity = bytes;
        self
    }

    pub fn read_settle_ms(mut self, ms: u64) -> Self {
        self.config.process.read_settle_ms = ms;
        self
    }

    pub fn fix_permissions(mut self, val: bool) -> Self {
        self.config.process.fix_permissions = val;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    pub fn skip_unchanged(mut self, val: bool) -> Self {
        self.config.watch.skip_unchanged = val;
        self
    }

    /// The unvalidated config, for exercising validation errors.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn process_settings(self) -> ProcessSettings {
        self.build().process_settings()
    }

    pub fn watch_settings(self) -> WatchSettings {
        WatchSettings::from_config(&self.build()).expect("Failed to build watch settings")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
