//! arplace dev server - Main entry point
//!
//! Serves the web bundle, the model files and the runtime configuration
//! document the client fetches at startup.

mod config;
mod server;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "arplace-serve")]
#[command(about = "Development server for the arplace AR placement app")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "arplace.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory holding the built web bundle
    #[arg(short, long)]
    root: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the resolved app config as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("arplace-serve v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(root) = args.root {
        config.server.root = root;
    }

    info!(
        models = config.app.models.len(),
        tls = config.server.tls.is_some(),
        "Configuration loaded"
    );

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config.app)?);
        return Ok(());
    }

    server::run(&config).await
}
