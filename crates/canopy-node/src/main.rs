//! `canopy` command-line entry point.
//!
//! ```text
//! canopy run --config node-1.yaml --root        # one node, this process
//! canopy launch --dir nodes/ --root nodes/node-1.yaml
//! ```

use std::{path::PathBuf, process::ExitCode, time::Duration};

use canopy_core::UniformRandom;
use canopy_node::{NodeConfig, NodeError, NodeRuntime, SystemEnv, TcpTransport, orchestrator};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Decentralized depth-first spanning-tree construction.
#[derive(Parser, Debug)]
#[command(name = "canopy", version, about)]
struct Args {
    /// Log filter, e.g. `info` or `canopy_node=debug` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single node until it terminates and print its report
    Run {
        /// Node configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Start the traversal from this node
        #[arg(long)]
        root: bool,

        /// Delay before the root sends its first probe
        #[arg(long, default_value_t = 1000)]
        start_delay_ms: u64,
    },

    /// Run every node of a directory in this process and print the tree
    Launch {
        /// Directory of node configuration files
        #[arg(short, long)]
        dir: PathBuf,

        /// Configuration file of the root node
        #[arg(long)]
        root: PathBuf,

        /// Delay before the root sends its first probe
        #[arg(long, default_value_t = 100)]
        start_delay_ms: u64,

        /// Give up if some node has not reported within this time
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match execute(args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "canopy failed");
            ExitCode::FAILURE
        },
    }
}

async fn execute(command: Command) -> Result<(), NodeError> {
    match command {
        Command::Run { config, root, start_delay_ms } => {
            let config = NodeConfig::load(&config)?;
            let identity = config.identity()?;
            let transport = TcpTransport::bind(config.addr(), config.port).await.map_err(
                |source| NodeError::Bind { addr: config.addr().socket_addr(config.port), source },
            )?;

            info!(node = %config.addr(), port = config.port, root, "Node listening");

            let policy = UniformRandom::new(SystemEnv);
            let report = NodeRuntime::new(identity, root, transport, SystemEnv, policy)
                .with_start_delay(Duration::from_millis(start_delay_ms))
                .run()
                .await?;

            println!("{report}");
        },
        Command::Launch { dir, root, start_delay_ms, timeout_ms } => {
            let root = NodeConfig::load(&root)?.addr();
            let configs = orchestrator::load_dir(&dir)?.into_iter().map(|(_, c)| c).collect();

            let start_delay = Duration::from_millis(start_delay_ms);
            let timeout = Duration::from_millis(timeout_ms);
            let tree = orchestrator::launch(configs, root, start_delay, timeout).await?;

            println!("{tree}");
            for (parent, child) in tree.edges() {
                println!("{parent} -> {child}");
            }
        },
    }
    Ok(())
}
