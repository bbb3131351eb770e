//! Dynamock - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use dynamock::config::StoreSettings;
use dynamock::{ConfigStore, FileStore, MemoryStore, MockEngine, MockServer, MockServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "dynamock",
    about = "Runtime-configurable API mock server with Mock.js-style templates",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "dynamock.yaml")]
    config: PathBuf,

    /// Address to listen on (overrides server.listen)
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Persist routes to this JSON snapshot (overrides store)
    #[arg(long, value_name = "PATH")]
    store_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print default config if requested
    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no routes)");
        MockServerConfig::default()
    };

    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(path) = args.store_file {
        config.store = StoreSettings::File { path };
    }

    // Validate and exit if requested
    if args.validate {
        config.validate()?;
        println!(
            "Configuration is valid ({} routes defined)",
            config.routes.len()
        );
        return Ok(());
    }

    let store: Arc<dyn ConfigStore> = match &config.store {
        StoreSettings::Memory => {
            info!("Using in-memory config store");
            Arc::new(MemoryStore::new())
        }
        StoreSettings::File { path } => {
            info!(path = %path.display(), "Using file config store");
            Arc::new(FileStore::new(path))
        }
    };

    let engine = Arc::new(MockEngine::new(store, config.settings.clone()));
    let report = engine.seed(config.routes).await?;
    if !report.skipped.is_empty() {
        warn!(skipped = report.skipped.len(), "Some routes were not registered");
    }

    let server = MockServer::bind(engine, config.server.listen).await?;
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Mock server stopped");
    Ok(())
}
