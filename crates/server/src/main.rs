//! serptrack server - HTTP API for keyword rank tracking
//!
//! This binary exposes the credential pool and bulk execution engine via
//! REST endpoints, with periodic counter resets running in the background.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env during development
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = ServerConfig::load()?;

    // Start server
    server::start_server(config).await?;

    Ok(())
}
