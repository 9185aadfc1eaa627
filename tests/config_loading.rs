use std::error::Error;
use std::fs;
use std::time::Duration;

use clap::Parser;

use prochub::apply_overrides;
use prochub::cli::CliArgs;
use prochub::config::model::{DEFAULT_DEBOUNCE_MS, DEFAULT_OUTPUT_CAPACITY};
use prochub::config::{load_and_validate, load_from_path, load_or_default, validate_config, ConfigFile};
use prochub::errors::ProchubError;
use prochub::watch::WatchSettings;
use prochub_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<tempfile::NamedTempFile, Box<dyn Error>> {
    let file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    fs::write(file.path(), contents)?;
    Ok(file)
}

#[test]
fn full_config_is_parsed() -> TestResult {
    let file = write_config(
        r#"
[process]
output_capacity = 4096
read_settle_ms = 250
fix_permissions = false

[watch]
exclude = [".git/**", "target"]
debounce_ms = 10
skip_unchanged = true
"#,
    )?;

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.process.output_capacity, 4096);
    assert!(!cfg.process.fix_permissions);
    assert_eq!(cfg.watch.exclude, vec![".git/**", "target"]);
    assert!(cfg.watch.skip_unchanged);

    let settings = cfg.process_settings();
    assert_eq!(settings.read_settle, Duration::from_millis(250));

    let watch = WatchSettings::from_config(&cfg)?;
    assert_eq!(watch.debounce, Duration::from_millis(10));
    assert!(watch.exclude.matches_relative(".git/HEAD"));
    assert!(!watch.exclude.matches_relative("src/main.rs"));
    Ok(())
}

#[test]
fn missing_sections_fall_back_to_defaults() -> TestResult {
    let file = write_config("[watch]\nexclude = [\"*.tmp\"]\n")?;

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.process.output_capacity, DEFAULT_OUTPUT_CAPACITY);
    assert!(cfg.process.fix_permissions);
    assert_eq!(cfg.watch.debounce_ms, DEFAULT_DEBOUNCE_MS);
    Ok(())
}

#[test]
fn zero_capacity_is_rejected() {
    let raw = ConfigFileBuilder::new().output_capacity(0).build_raw();

    let err = validate_config(&raw).unwrap_err();
    assert!(matches!(err, ProchubError::ConfigError(ref msg) if msg.contains("output_capacity")));
    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn invalid_exclude_glob_is_rejected() {
    let raw = ConfigFileBuilder::new().exclude("src/[").build_raw();

    let err = validate_config(&raw).unwrap_err();
    assert!(matches!(err, ProchubError::ConfigError(ref msg) if msg.contains("[watch].exclude")));
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let file = write_config("[process\noutput_capacity = ")?;

    let err = load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ProchubError::TomlError(_)));
    Ok(())
}

#[test]
fn explicit_missing_config_is_an_error() {
    let err = load_or_default(Some(std::path::Path::new("/nonexistent/Prochub.toml"))).unwrap_err();
    assert!(matches!(err, ProchubError::IoError(_)));
}

#[test]
fn cli_flags_override_file_values() -> TestResult {
    let mut cfg = ConfigFileBuilder::new().output_capacity(4096).build();
    let args = CliArgs::try_parse_from([
        "prochub",
        "--output-capacity",
        "1024",
        "--read-settle-ms",
        "5",
    ])?;

    apply_overrides(&mut cfg, &args)?;
    assert_eq!(cfg.process.output_capacity, 1024);
    assert_eq!(cfg.process.read_settle_ms, 5);
    Ok(())
}

#[test]
fn zero_capacity_flag_is_rejected() -> TestResult {
    let mut cfg = ConfigFile::default();
    let args = CliArgs::try_parse_from(["prochub", "--output-capacity", "0"])?;

    let err = apply_overrides(&mut cfg, &args).unwrap_err();
    assert!(matches!(err, ProchubError::ConfigError(_)));
    assert_eq!(cfg.process.output_capacity, DEFAULT_OUTPUT_CAPACITY);
    Ok(())
}
