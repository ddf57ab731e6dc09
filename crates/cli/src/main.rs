//! runclens CLI
//!
//! A one-shot command-line tool for listing and inspecting containers
//! managed by runc on the local node.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, list, refresh, Context};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// runclens CLI
#[derive(Parser)]
#[command(name = "runclens")]
#[command(author, version, about = "Inspect runc containers on this node", long_about = None)]
pub struct Cli {
    /// runc binary
    #[arg(long, env = "RUNCLENS_RUNC_BINARY", default_value = "runc")]
    pub runc: String,

    /// runc state directory
    #[arg(long, env = "RUNCLENS_RUNC_ROOT", default_value = "/run/containerd/runc/k8s.io")]
    pub root: PathBuf,

    /// Root of the proc filesystem
    #[arg(long, env = "RUNCLENS_PROC_ROOT", default_value = "/proc")]
    pub proc_root: PathBuf,

    /// Run external tools through sudo
    #[arg(long, env = "RUNCLENS_USE_SUDO")]
    pub sudo: bool,

    /// lsof binary
    #[arg(long, env = "RUNCLENS_LSOF_BINARY", default_value = "lsof")]
    pub lsof: String,

    /// nsenter binary
    #[arg(long, env = "RUNCLENS_NSENTER_BINARY", default_value = "nsenter")]
    pub nsenter: String,

    /// ifconfig binary
    #[arg(long, env = "RUNCLENS_IFCONFIG_BINARY", default_value = "ifconfig")]
    pub ifconfig: String,

    /// Seconds a listing is served from cache
    #[arg(long, env = "RUNCLENS_LIST_TTL_SECS", default_value_t = 10)]
    pub list_ttl: u64,

    /// Seconds a single lookup is served from cache
    #[arg(long, env = "RUNCLENS_GET_TTL_SECS", default_value_t = 20)]
    pub get_ttl: u64,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List containers with their enrichment summary
    List {
        /// Skip population and show only what runc reports
        #[arg(long)]
        bare: bool,
    },

    /// Show everything known about one container
    Inspect {
        /// Host pid of the container's init process
        pid: String,

        /// Also list network interfaces inside the container's namespace
        #[arg(long)]
        interfaces: bool,
    },

    /// Re-discover and repopulate every container
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let ctx = Context::from_cli(&cli);

    match cli.command {
        Commands::List { bare } => {
            list::list_containers(&ctx, bare, cli.format).await?;
        }
        Commands::Inspect { pid, interfaces } => {
            inspect::inspect_container(&ctx, &pid, interfaces, cli.format).await?;
        }
        Commands::Refresh => {
            refresh::refresh_containers(&ctx, cli.format).await?;
        }
    }

    Ok(())
}
