//! Ubiquity server binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ubiquity::{Server, ServerConfig};

#[derive(Parser)]
#[command(name = "ubiquity-server")]
#[command(about = "Volume orchestration daemon for SAN and local-disk backends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<String>,

        /// Metadata database directory
        #[arg(long)]
        db: Option<PathBuf>,

        /// Backend used when a create request names none
        #[arg(long)]
        default_backend: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            db,
            default_backend,
        } => {
            // File and environment first, CLI flags win
            let mut server_config = ServerConfig::load(config.as_deref())?;
            if let Some(bind) = bind {
                server_config.bind_addr = bind.parse()?;
            }
            if let Some(db) = db {
                server_config.db_path = db;
            }
            if let Some(default_backend) = default_backend {
                server_config.default_backend = default_backend;
            }

            let fallback = server_config.log_level.clone();
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| fallback.into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            Server::new(server_config).serve().await?;
        }
    }

    Ok(())
}
