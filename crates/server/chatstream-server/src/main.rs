//! ChatStream relay server binary

use chatstream_server::{run, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        "SERVER_CONFIG host={} port={} webhook={}",
        config.host,
        config.port,
        config.webhook_url
    );

    if let Err(e) = run(config).await {
        tracing::error!("SERVER_EXIT err={}", e);
        std::process::exit(1);
    }
}
