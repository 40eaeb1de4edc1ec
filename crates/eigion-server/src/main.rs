//! Server binary entry point.

use clap::Parser;
use eigion_server::ServerConfig;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::parse();
    if let Err(failure) = eigion_server::serve(config).await {
        error!(error = %failure, "server exited");
        std::process::exit(1);
    }
}
