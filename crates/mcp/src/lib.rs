//! Netops MCP (Model Context Protocol) Server
//!
//! This crate provides an MCP server that exposes read-only NetBox inventory
//! queries and topology generation as tools an AI agent can call.
//!
//! ## Architecture
//!
//! - `NetopsMcpServer`: MCP tool handler (see `server`)
//! - `netbox`: `InventorySource` trait and the NetBox REST client behind it
//! - `tools`: tool names grouped by category
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use netops_core::config::{AppConfig, LoadOptions};
//! use netops_mcp::{NetboxClient, NetopsMcpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(LoadOptions::default())?;
//!     let inventory = NetboxClient::new(&config.netbox)?;
//!     NetopsMcpServer::new(Arc::new(inventory)).run_stdio().await
//! }
//! ```

pub mod netbox;
mod server;
mod tools;

pub use netbox::{InventorySource, NetboxClient};
pub use server::{build_topology, NetopsMcpServer};
pub use tools::*;

use netops_core::config::ConfigError;
use thiserror::Error;

/// Errors raised while reading inventory.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("NetBox request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("NetBox returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("unexpected NetBox payload: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl InventoryError {
    /// Short class name for logs.
    pub fn error_class(&self) -> &'static str {
        match self {
            InventoryError::Http(_) => "http",
            InventoryError::Status { status, .. } if *status == 401 || *status == 403 => "auth",
            InventoryError::Status { .. } => "status",
            InventoryError::Decode(_) => "decode",
            InventoryError::Config(_) => "config",
        }
    }
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;
