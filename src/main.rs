use std::sync::Arc;

use flightwire::{Config, Server, StreamHandler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let handler = Arc::new(StreamHandler::new(&config)?);
    let server = Server::bind(config.bind_addr()).await?;
    info!(
        port = config.port,
        allow_origin = config.allow_origin.as_deref().unwrap_or("-"),
        close_after_secs = config.close_after.map(|d| d.as_secs()),
        "server running"
    );

    server
        .run(move |req| {
            let handler = Arc::clone(&handler);
            async move { handler.handle(&req) }
        })
        .await?;
    Ok(())
}
