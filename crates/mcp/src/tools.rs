//! Tool names exposed by the MCP server, grouped by category:
//! - Inventory: sites and devices
//! - Addressing: IP addresses, prefixes and VLANs
//! - Topology: layered topology and diagram generation

/// Inventory tools category
pub struct InventoryTools;

/// Addressing tools category
pub struct AddressingTools;

/// Topology tools category
pub struct TopologyTools;

/// Tool category trait
pub trait ToolCategory {
    /// Category name
    fn category_name() -> &'static str
    where
        Self: Sized;
    /// List of tool names in this category
    fn tool_names() -> &'static [&'static str]
    where
        Self: Sized;
}

impl ToolCategory for InventoryTools {
    fn category_name() -> &'static str {
        "inventory"
    }
    fn tool_names() -> &'static [&'static str] {
        &["list_sites", "list_devices", "get_device"]
    }
}

impl ToolCategory for AddressingTools {
    fn category_name() -> &'static str {
        "addressing"
    }
    fn tool_names() -> &'static [&'static str] {
        &["list_ip_addresses", "get_ip_address", "list_prefixes", "get_prefix", "list_vlans"]
    }
}

impl ToolCategory for TopologyTools {
    fn category_name() -> &'static str {
        "topology"
    }
    fn tool_names() -> &'static [&'static str] {
        &["generate_topology"]
    }
}

/// All tool names
pub const ALL_TOOL_NAMES: &[&str] = &[
    "list_sites",
    "list_devices",
    "get_device",
    "list_ip_addresses",
    "get_ip_address",
    "list_prefixes",
    "get_prefix",
    "list_vlans",
    "generate_topology",
];

/// Total number of tools
pub const TOTAL_TOOLS: usize = ALL_TOOL_NAMES.len();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_every_tool_once() {
        let mut grouped: Vec<&str> = InventoryTools::tool_names()
            .iter()
            .chain(AddressingTools::tool_names())
            .chain(TopologyTools::tool_names())
            .copied()
            .collect();
        grouped.sort_unstable();

        let mut all = ALL_TOOL_NAMES.to_vec();
        all.sort_unstable();

        assert_eq!(grouped, all);
        assert_eq!(TOTAL_TOOLS, 9);
        assert_eq!(TopologyTools::category_name(), "topology");
    }
}
