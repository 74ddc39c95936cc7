//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Reflow cached-page post-processor CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: reflow.toml)
    #[arg(short = 'C', long, default_value = "reflow.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Post-process cached pages, in place or into an output directory
    #[command(visible_alias = "w")]
    Warm {
        #[command(flatten)]
        args: WarmArgs,
    },

    /// Validate the configuration file and exit
    #[command(visible_alias = "c")]
    Check,
}

/// Warm command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct WarmArgs {
    /// Files or directories to process. Directories are walked for
    /// .html/.htm pages.
    #[arg(value_name = "PATH", required = true, value_hint = clap::ValueHint::AnyPath)]
    pub paths: Vec<PathBuf>,

    /// Write processed pages under this directory instead of in place
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Write a JSON run report (per-page status and transform failures)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub report: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

#[allow(unused)]
impl Cli {
    pub const fn is_warm(&self) -> bool {
        matches!(self.command, Commands::Warm { .. })
    }
    pub const fn is_check(&self) -> bool {
        matches!(self.command, Commands::Check)
    }
}
