//! fogd — the FogGrid daemon.
//!
//! One binary, two roles:
//! - `agent` serves node samples for one region
//! - `scheduler` runs the broker, the decision pipeline and the
//!   submission API
//!
//! # Usage
//!
//! ```text
//! fogd agent --config /etc/foggrid/agent.toml
//! fogd scheduler --config /etc/foggrid/fog.toml --workloads batch.json
//! ```

mod agent_mode;
mod api;
mod scheduler_mode;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fog_core::FogConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,fogd=debug,foggrid=debug";

#[derive(Parser)]
#[command(name = "fogd", about = "FogGrid daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a region agent.
    Agent {
        /// Path to fog.toml.
        #[arg(long, short)]
        config: PathBuf,
    },

    /// Run the scheduler.
    Scheduler {
        /// Path to fog.toml.
        #[arg(long, short)]
        config: PathBuf,

        /// JSON array of workloads to submit at startup.
        #[arg(long)]
        workloads: Option<PathBuf>,

        /// Exit once every startup workload has an outcome.
        #[arg(long, requires = "workloads")]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Agent { config } => {
            let config = FogConfig::from_file(&config)?;
            agent_mode::run_agent(config).await
        }
        Command::Scheduler {
            config,
            workloads,
            once,
        } => {
            let config = FogConfig::from_file(&config)?;
            scheduler_mode::run_scheduler(config, workloads, once).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
