//! Mocket - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use mocket::{MockServer, Resolver, ServerSettings};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mocket",
    about = "Stub HTTP server answering requests from a directory of mock definitions",
    version
)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 80)]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Directory of mock definition files
    #[arg(short, long, default_value = "./scripts")]
    scripts: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Do not log individual requests
    #[arg(short, long)]
    quiet: bool,

    /// Validate the mock definitions and exit
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

    let settings = ServerSettings {
        listen: SocketAddr::new(args.bind, args.port),
        mock_dir: args.scripts,
        log_matches: !args.quiet,
        log_unmatched: !args.quiet,
    };

    info!(path = %settings.mock_dir.display(), "Reading mock directory");
    let resolver = Resolver::load(&settings.mock_dir)
        .with_context(|| format!("cannot load mocks from {}", settings.mock_dir.display()))?;

    if args.validate {
        println!(
            "Mock definitions are valid ({} definitions)",
            resolver.definitions()
        );
        return Ok(());
    }

    let listener = TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("cannot bind {}", settings.listen))?;

    let server = Arc::new(MockServer::new(resolver, settings));
    server.serve(listener, shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
