// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `prochub`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "prochub",
    version,
    about = "Launch process groups, replay their output, and watch directories over a JSON stdio protocol.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Prochub.toml` in the current directory is used when it
    /// exists; otherwise built-in defaults apply.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCHUB_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[process].output_capacity` (bytes kept per task).
    #[arg(long, value_name = "BYTES")]
    pub output_capacity: Option<usize>,

    /// Override `[process].read_settle_ms`.
    #[arg(long, value_name = "MS")]
    pub read_settle_ms: Option<u64>,

    /// Load + validate config, print the effective settings, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
