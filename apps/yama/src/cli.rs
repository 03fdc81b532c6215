//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use yama_types::ColorChoice;

/// yama - fetch, verify and atomically install prebuilt packages
#[derive(Parser)]
#[command(name = "yama")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch, verify and atomically install prebuilt packages")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Write debug logs to the state directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fail immediately if the destination is already being installed
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Number of packages installed in parallel (0=auto)
    #[arg(short, long, global = true, value_name = "N")]
    pub jobs: Option<usize>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Install one resolved package
    #[command(alias = "i")]
    Install {
        /// Package name
        name: String,

        /// Archive URL (http, https or file)
        #[arg(long)]
        url: String,

        /// Expected archive digest, `algorithm:hex` or bare hex
        #[arg(long)]
        digest: String,

        /// Directory the package is installed into
        #[arg(long, value_name = "PATH")]
        dest: PathBuf,
    },

    /// Install every package listed in a TOML batch file
    Batch {
        /// File of `[[package]]` tables with name, url, digest and dest
        file: PathBuf,
    },

    /// List installed packages
    #[command(alias = "ls")]
    List,

    /// Show information about an installed package
    Info {
        /// Package name
        name: String,
    },

    /// Remove an installed package
    #[command(alias = "rm")]
    Remove {
        /// Package name
        name: String,
    },
}
