//! Reflow - post-processes cached HTML pages for faster first paint.

mod cli;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use std::path::Path;

use reflow::config::PipelineConfig;
use reflow::core::CancelToken;
use reflow::{log, logger};

use cli::args::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        Commands::Check => {
            load_config(&cli.config, true)?;
            log!("config"; "{} is valid", cli.config.display());
            Ok(())
        }
        Commands::Warm { args } => {
            logger::set_verbose(args.verbose);
            let config = load_config(&cli.config, false)?;
            let cancel = setup_shutdown_handler()?;
            cli::warm::run(args, &config, cancel)
        }
    }
}

/// Load the config file, falling back to defaults when it is absent.
///
/// `check` always wants the file; `warm` runs fine without one (no
/// transforms enabled means a byte-identical pass).
fn load_config(path: &Path, required: bool) -> Result<PipelineConfig> {
    if path.exists() {
        PipelineConfig::load(path)
            .with_context(|| format!("invalid config file {}", path.display()))
    } else if required {
        anyhow::bail!("config file not found: {}", path.display())
    } else {
        Ok(PipelineConfig::default())
    }
}

/// Setup the global Ctrl+C handler. Call once, before the run starts.
///
/// The returned token is shared with every pipeline; workers observe it at
/// their next checkpoint and fall back to original bytes.
fn setup_shutdown_handler() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        log!("warm"; "shutting down...");
        handler.cancel();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;
    Ok(cancel)
}
