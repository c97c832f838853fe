use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod build;
mod commands;
mod config;
mod util;

#[derive(Parser)]
#[command(name = "sitepile", version, about)]
struct Args {
    /// Default log level; `RUST_LOG` takes precedence when set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// The command to execute
    #[command(subcommand)]
    command: SitepileCommand,
}

/// A build stage, in run order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum StageName {
    Data,
    Compile,
    Publish,
}

#[derive(Parser)]
struct BuildArgs {
    /// Config files; later files override earlier ones
    #[arg(short, long = "config", default_value = "sitepile.yaml")]
    config_files: Vec<PathBuf>,

    /// Run every stage up to and including this one
    #[arg(long, default_value = "publish", conflicts_with = "only")]
    build: StageName,

    /// Run only this stage
    #[arg(long)]
    only: Option<StageName>,
}

#[derive(Parser)]
struct WatchArgs {
    /// Config files; later files override earlier ones
    #[arg(short, long = "config", default_value = "sitepile.yaml")]
    config_files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum SitepileCommand {
    /// Build the site
    Build(BuildArgs),

    /// Build the site, then rebuild on changes
    Watch(WatchArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        SitepileCommand::Build(args) => {
            commands::build::run(&args).await?;
        }
        SitepileCommand::Watch(args) => {
            commands::watch::run(&args).await?;
        }
    }

    Ok(())
}
