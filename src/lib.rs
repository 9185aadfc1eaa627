// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod server;
pub mod types;
pub mod watch;

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::errors::ProchubError;
use crate::exec::ProcessRegistry;
use crate::server::{serve, Dispatcher};
use crate::watch::{DirWatchRegistry, WatchSettings};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the process and directory-watch registries
/// - the stdio transport
/// - Ctrl-C handling
///
/// Returns after stdin closes or Ctrl-C, once every group has been killed and
/// every watch dropped.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(args.config.as_deref().map(Path::new))?;
    apply_overrides(&mut cfg, &args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let processes = ProcessRegistry::new(cfg.process_settings());
    let watches = DirWatchRegistry::new(WatchSettings::from_config(&cfg)?);
    let (dispatcher, updates) = Dispatcher::new(processes, watches);

    info!("ready; reading requests from stdin");

    let served = tokio::select! {
        res = serve(dispatcher.clone(), updates, tokio::io::stdin(), tokio::io::stdout()) => res,
        _ = ctrl_c() => {
            info!("Ctrl-C received; shutting down");
            Ok(())
        }
    };

    dispatcher.shutdown();
    served
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Apply CLI flags on top of the loaded config.
pub fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> errors::Result<()> {
    if let Some(capacity) = args.output_capacity {
        if capacity == 0 {
            return Err(ProchubError::ConfigError(
                "--output-capacity must be >= 1 (got 0)".to_string(),
            ));
        }
        cfg.process.output_capacity = capacity;
    }

    if let Some(ms) = args.read_settle_ms {
        cfg.process.read_settle_ms = ms;
    }

    Ok(())
}

/// Simple dry-run output: print the effective settings.
fn print_dry_run(cfg: &ConfigFile) {
    println!("prochub dry-run");
    println!("  process.output_capacity = {}", cfg.process.output_capacity);
    println!("  process.read_settle_ms = {}", cfg.process.read_settle_ms);
    println!("  process.fix_permissions = {}", cfg.process.fix_permissions);
    println!();

    println!("  watch.debounce_ms = {}", cfg.watch.debounce_ms);
    println!("  watch.skip_unchanged = {}", cfg.watch.skip_unchanged);
    if cfg.watch.exclude.is_empty() {
        println!("  watch.exclude = []");
    } else {
        println!("  watch.exclude:");
        for pattern in &cfg.watch.exclude {
            println!("    - {pattern}");
        }
    }

    debug!("dry-run complete (nothing started)");
}
