//! Netops MCP Server Binary
//!
//! Serves NetBox inventory tools over stdio. Logs go to stderr so stdout
//! stays a clean protocol channel.
//!
//! ## Usage
//!
//! ```bash
//! NETOPS_NETBOX_URL=http://netbox.local NETOPS_NETBOX_TOKEN=... netops-mcp
//! ```

use std::sync::Arc;

use anyhow::Result;
use netops_core::config::{AppConfig, LoadOptions};
use netops_mcp::{NetboxClient, NetopsMcpServer};
use tracing::info;

fn init_logging(config: &AppConfig) {
    use netops_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let inventory = NetboxClient::new(&config.netbox)?;
    info!(
        event_name = "mcp.server.configured",
        netbox_url = %config.netbox.url,
        page_size = config.netbox.page_size,
        "netbox inventory source ready"
    );

    NetopsMcpServer::new(Arc::new(inventory)).run_stdio().await
}
