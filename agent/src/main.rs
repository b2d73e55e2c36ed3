//! scenesync agent
//!
//! Usage:
//!   scenesync-agent check-url https://demo-default-rtdb.firebaseio.com
//!   scenesync-agent --config agent.toml pull --limit 5
//!   scenesync-agent --config agent.toml mirror --scene scene.json

use anyhow::Result;
use clap::{Parser, Subcommand};
use scenesync_agent::AgentConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scenesync-agent")]
#[command(about = "Headless scenesync mirror and operator CLI")]
struct Args {
    /// Agent config file (TOML)
    #[arg(short, long, env = "SCENESYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a remote base URL would be accepted
    CheckUrl {
        url: String,
        /// Also admit plain-HTTP loopback servers
        #[arg(long)]
        allow_loopback: bool,
    },
    /// Push a scene file as the project snapshot
    PushSnapshot {
        #[arg(long)]
        scene: PathBuf,
    },
    /// List the newest remote batches
    Pull {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mirror the project into a scene file until interrupted
    Mirror {
        #[arg(long)]
        scene: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let config = AgentConfig::load(args.config.as_deref())?;

    match args.command {
        Command::CheckUrl {
            url,
            allow_loopback,
        } => match scenesync_agent::check_url(&url, allow_loopback) {
            Ok(endpoint) => println!("ok: {endpoint}"),
            Err(e) => {
                println!("rejected: {e}");
                std::process::exit(1);
            }
        },
        Command::PushSnapshot { scene } => {
            let services = scenesync_agent::push_snapshot(&config, &scene).await?;
            println!("pushed {services} services");
        }
        Command::Pull { limit } => {
            let limit = limit.unwrap_or(config.sync.pull_limit);
            let batches = scenesync_agent::pull(&config, limit).await?;
            if batches.is_empty() {
                println!("no remote batches");
            }
            for batch in &batches {
                println!("{batch}");
            }
        }
        Command::Mirror { scene } => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Interrupted; writing scene back");
            };
            let summary = scenesync_agent::mirror(&config, &scene, shutdown).await?;
            println!(
                "applied {} remote changes, pushed {}, saved {} services to {}",
                summary.applied,
                summary.pushed,
                summary.saved,
                scene.display()
            );
        }
    }
    Ok(())
}
