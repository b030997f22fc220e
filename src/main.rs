//! Mocket - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use mocket::{MemoryStore, MockEngine, MocketConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mocket",
    about = "HTTP mock server - templated endpoint definitions and OpenAPI import",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mocket.yaml")]
    config: PathBuf,

    /// Listen address, overrides `server.listen_addr`
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

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

    if args.print_config {
        let default_config = include_str!("../demos/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MocketConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no collections)");
        MocketConfig::default()
    };

    if args.validate {
        config.validate()?;
        let definitions: usize = config.collections.iter().map(|c| c.definitions.len()).sum();
        println!(
            "Configuration is valid ({} collections, {} inline definitions)",
            config.collections.len(),
            definitions
        );
        return Ok(());
    }

    let store = Arc::new(MemoryStore::new());
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    let seeded = config.seed_store(store.as_ref(), store.as_ref(), base_dir).await?;
    info!(
        collections = config.collections.len(),
        definitions = seeded,
        "Store seeded"
    );

    let engine = Arc::new(MockEngine::from_store(store, config.settings.clone()));
    let router = mocket::server::build_router(engine);

    let addr: SocketAddr = match args.listen {
        Some(addr) => addr,
        None => config.server.listen_addr.parse()?,
    };
    info!(%addr, "Starting mock server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Mock server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
