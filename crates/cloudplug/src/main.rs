mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloudplug")]
#[command(
    about = "Create and terminate NAT gateways, Redis instances and CBS volumes in batches",
    long_about = None
)]
struct Cli {
    /// Config file (otherwise discovered from CLOUDPLUG_CONFIG_PATH, ./cloudplug.yaml, ...)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plugin action on a JSON batch ({"inputs": [...]})
    Run {
        /// Plugin name (nat-gateway, redis, storage)
        plugin: String,
        /// Action name (create, terminate)
        action: String,
        /// Batch file; stdin when omitted or "-"
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// List registered plugins and their actions
    Plugins,
    /// Show the effective configuration
    Config,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the JSON result, logs go to stderr
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Run {
            plugin,
            action,
            input,
        } => {
            let loaded = commands::load_config(cli.config.as_deref())?;
            let registry = commands::build_registry(&loaded.settings)?;
            commands::run::handle(&registry, &plugin, &action, input.as_deref()).await
        }
        Commands::Plugins => {
            let loaded = commands::load_config(cli.config.as_deref())?;
            let registry = commands::build_registry(&loaded.settings)?;
            commands::plugins::handle(&registry);
            Ok(())
        }
        Commands::Config => {
            let loaded = commands::load_config(cli.config.as_deref())?;
            commands::config::handle(&loaded)
        }
        Commands::Version => {
            println!("cloudplug {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
