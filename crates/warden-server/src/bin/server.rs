//! Warden Server Binary

use anyhow::{bail, Result};
use tracing::{error, info};
use warden_server::{
    config::{load_config, validate_config},
    logging, Server,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = load_config()?;
    logging::init(&config.logging)?;

    if let Err(errors) = validate_config(&config) {
        for err in &errors {
            error!(error = %err, "Invalid configuration");
        }
        bail!("{} configuration error(s)", errors.len());
    }

    info!("Starting Warden Server v{}", env!("CARGO_PKG_VERSION"));

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}
