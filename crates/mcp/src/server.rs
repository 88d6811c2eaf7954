//! MCP Server Implementation
//!
//! Exposes NetBox reads and topology generation over the Model Context
//! Protocol. Lookup misses are ordinary results; inventory failures are
//! reported as tool errors so the calling agent can narrate them.

use std::sync::Arc;

use netops_core::topology::{TopologyReport, TopologySnapshot};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::netbox::InventorySource;
use crate::{InventoryError, InventoryResult};

const INSTRUCTIONS: &str = "Netops MCP Server - read-only NetBox inventory for network \
    operations agents. List sites, devices, IP addresses, prefixes and VLANs, look up a single \
    device, address or prefix, and generate a layered topology with a Mermaid diagram.";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeviceLookup {
    /// Exact device name, e.g. "core-rtr-01"
    pub name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddressLookup {
    /// Exact IP address with mask, e.g. "10.0.0.1/24"
    pub address: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PrefixLookup {
    /// Prefix in CIDR notation, e.g. "10.0.0.0/24"
    pub prefix: String,
}

/// Main MCP server for netops
#[derive(Clone)]
pub struct NetopsMcpServer {
    inventory: Arc<dyn InventorySource>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl NetopsMcpServer {
    pub fn new(inventory: Arc<dyn InventorySource>) -> Self {
        Self { inventory, tool_router: Self::tool_router() }
    }

    /// Run the server with stdio transport
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.server.starting", transport = "stdio", "starting MCP server");
        let service = self.serve(rmcp::transport::io::stdio()).await?;
        let reason = service.waiting().await?;
        info!(event_name = "mcp.server.stopped", reason = ?reason, "MCP server shutdown complete");
        Ok(())
    }

    #[tool(description = "List all sites in NetBox")]
    async fn list_sites(&self) -> Result<CallToolResult, McpError> {
        json_result("list_sites", self.inventory.list_sites().await)
    }

    #[tool(description = "List all devices in NetBox with type, role, site and status")]
    async fn list_devices(&self) -> Result<CallToolResult, McpError> {
        json_result("list_devices", self.inventory.list_devices().await)
    }

    #[tool(description = "Get details of a specific device by name")]
    async fn get_device(
        &self,
        Parameters(request): Parameters<DeviceLookup>,
    ) -> Result<CallToolResult, McpError> {
        lookup_result(
            "get_device",
            self.inventory.get_device(request.name.trim()).await,
            "Device not found.",
        )
    }

    #[tool(description = "Get details of a specific IP address (exact address, e.g. \"10.0.0.1/24\")")]
    async fn get_ip_address(
        &self,
        Parameters(request): Parameters<AddressLookup>,
    ) -> Result<CallToolResult, McpError> {
        lookup_result(
            "get_ip_address",
            self.inventory.get_ip_address(request.address.trim()).await,
            "IP Address not found.",
        )
    }

    #[tool(description = "List all IP addresses in NetBox")]
    async fn list_ip_addresses(&self) -> Result<CallToolResult, McpError> {
        json_result("list_ip_addresses", self.inventory.list_ip_addresses().await)
    }

    #[tool(description = "List all IP prefixes (subnets) with the number of addresses in use")]
    async fn list_prefixes(&self) -> Result<CallToolResult, McpError> {
        let prefixes = match self.inventory.list_prefixes().await {
            Ok(prefixes) => with_ip_counts(self.inventory.as_ref(), prefixes).await,
            Err(error) => return json_result::<()>("list_prefixes", Err(error)),
        };
        json_result("list_prefixes", Ok(prefixes))
    }

    #[tool(description = "Get details of a specific prefix in CIDR notation, e.g. \"10.0.0.0/24\"")]
    async fn get_prefix(
        &self,
        Parameters(request): Parameters<PrefixLookup>,
    ) -> Result<CallToolResult, McpError> {
        let found = match self.inventory.get_prefix(request.prefix.trim()).await {
            Ok(Some(segment)) => {
                Ok(with_ip_counts(self.inventory.as_ref(), vec![segment]).await.pop())
            }
            other => other,
        };
        lookup_result("get_prefix", found, "Prefix not found.")
    }

    #[tool(description = "List all VLANs in NetBox")]
    async fn list_vlans(&self) -> Result<CallToolResult, McpError> {
        json_result("list_vlans", self.inventory.list_vlans().await)
    }

    #[tool(
        description = "Generate network topology data for documentation: summary counts, devices by role, network segments, VLANs, layer groupings (perimeter, core, distribution, access, security) and a Mermaid diagram"
    )]
    async fn generate_topology(&self) -> Result<CallToolResult, McpError> {
        json_result("generate_topology", build_topology(self.inventory.as_ref()).await)
    }
}

#[tool_handler]
impl ServerHandler for NetopsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Reads devices, prefixes and VLANs and derives the layered topology.
/// A failed per-prefix address count degrades to zero.
pub async fn build_topology(inventory: &dyn InventorySource) -> InventoryResult<TopologyReport> {
    let devices = inventory.list_devices().await?;
    let prefixes = inventory.list_prefixes().await?;
    let segments = with_ip_counts(inventory, prefixes).await;
    let vlans = inventory.list_vlans().await?;

    let report = TopologySnapshot::build(devices, segments, vlans).report();
    info!(
        event_name = "mcp.topology.generated",
        devices = report.summary.total_devices,
        prefixes = report.summary.total_prefixes,
        vlans = report.summary.total_vlans,
        unclassified = report.summary.unclassified_devices.len(),
        "topology generated"
    );
    Ok(report)
}

async fn with_ip_counts(
    inventory: &dyn InventorySource,
    segments: Vec<netops_core::NetworkSegment>,
) -> Vec<netops_core::NetworkSegment> {
    let mut counted = Vec::with_capacity(segments.len());
    for segment in segments {
        let ip_count = match inventory.count_addresses_in(&segment.prefix).await {
            Ok(count) => count,
            Err(error) => {
                warn!(
                    event_name = "mcp.topology.ip_count.failed",
                    prefix = %segment.prefix,
                    error_class = error.error_class(),
                    error = %error,
                    "address count unavailable; using 0"
                );
                0
            }
        };
        counted.push(segment.with_ip_count(ip_count));
    }
    counted
}

fn json_result<T: Serialize>(
    tool: &str,
    result: InventoryResult<T>,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value)
                .map_err(|error| McpError::internal_error(error.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(error) => Ok(inventory_failure(tool, &error)),
    }
}

fn lookup_result<T: Serialize>(
    tool: &str,
    result: InventoryResult<Option<T>>,
    not_found: &str,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(Some(value)) => json_result(tool, Ok(value)),
        Ok(None) => Ok(CallToolResult::success(vec![Content::text(not_found.to_string())])),
        Err(error) => Ok(inventory_failure(tool, &error)),
    }
}

fn inventory_failure(tool: &str, error: &InventoryError) -> CallToolResult {
    warn!(
        event_name = "mcp.tool.inventory.failed",
        tool_name = tool,
        error_class = error.error_class(),
        error = %error,
        "inventory read failed"
    );
    CallToolResult::error(vec![Content::text(format!("Error: {error}"))])
}
