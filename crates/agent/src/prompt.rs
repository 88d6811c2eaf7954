use std::fs;
use std::path::PathBuf;

use netops_core::config::AgentConfig;
use thiserror::Error;

/// Seed instruction for every session unless `agent.system_prompt_path` names
/// a replacement.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a network operations assistant with read access to NetBox, the network infrastructure source of truth.

AVAILABLE TOOLS:
- list_sites: lists all sites
- list_devices: lists all devices
- get_device: details of one device by name
- get_ip_address: details of one IP address (exact address, e.g. "10.0.0.1/24")
- list_ip_addresses: lists all IP addresses
- list_prefixes: lists all prefixes with utilization
- get_prefix: details of one prefix (e.g. "10.0.0.0/24")
- list_vlans: lists all VLANs
- generate_topology: devices by role, network segments, VLANs, layer groupings and a ready Mermaid diagram

TOOL USAGE RULES:
- To list or show ALL devices, use list_devices.
- For a SPECIFIC device by name, use get_device with the device name.
- To list ALL IP addresses, use list_ip_addresses.
- For a SPECIFIC IP address, use get_ip_address with the exact address.
- For sites, use list_sites.
- For subnets, prefixes or network segments, use list_prefixes or get_prefix.
- For VLANs, use list_vlans.
- For complete documentation, a topology diagram or the network architecture, use generate_topology.

TOPOLOGY DIAGRAMS:
When asked for a topology diagram or documentation you MUST include the `diagram` field returned by generate_topology verbatim inside a ```mermaid code block. Do not redraw it by hand.

STRICT RULES:
1. Always query NetBox through a tool before answering. Never answer from memory.
2. Only state facts returned by the tools. Do not add, infer or embellish.
3. If a tool returns an error or no data, say the data was not found in NetBox. Do not guess.
4. Do not assume topology, configuration or relationships that are not in the data.
5. If a question cannot be answered with the available tools, say so plainly.

RESPONSE FORMAT:
- Answer in the language the user writes in.
- Be concise and factual.
- Documentation answers include the diagram, a short architecture explanation, a network segmentation table and the device inventory.
- Use lists or tables for structured data."#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read system prompt from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("system prompt file {0} is empty")]
    Empty(PathBuf),
}

pub fn load_system_prompt(config: &AgentConfig) -> Result<String, PromptError> {
    let Some(path) = &config.system_prompt_path else {
        return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
    };
    let prompt = fs::read_to_string(path)
        .map_err(|source| PromptError::Read { path: path.clone(), source })?;
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PromptError::Empty(path.clone()));
    }
    Ok(prompt.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use netops_core::config::AgentConfig;

    use super::{load_system_prompt, PromptError, DEFAULT_SYSTEM_PROMPT};

    #[test]
    fn default_prompt_names_every_tool() {
        for tool in [
            "list_sites",
            "list_devices",
            "get_device",
            "get_ip_address",
            "list_ip_addresses",
            "list_prefixes",
            "get_prefix",
            "list_vlans",
            "generate_topology",
        ] {
            assert!(DEFAULT_SYSTEM_PROMPT.contains(tool), "prompt should mention {tool}");
        }
    }

    #[test]
    fn prompt_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap_or_else(|error| panic!("tempdir: {error}"));
        let path = dir.path().join("prompt.txt");
        fs::write(&path, "  only answer about VLANs\n")
            .unwrap_or_else(|error| panic!("write prompt: {error}"));

        let config = AgentConfig { system_prompt_path: Some(path) };
        assert_eq!(load_system_prompt(&config).ok().as_deref(), Some("only answer about VLANs"));

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "\n").unwrap_or_else(|error| panic!("write prompt: {error}"));
        let config = AgentConfig { system_prompt_path: Some(empty) };
        assert!(matches!(load_system_prompt(&config), Err(PromptError::Empty(_))));
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        let config = AgentConfig {
            system_prompt_path: Some("/nonexistent/netops/prompt.txt".into()),
        };
        assert!(matches!(load_system_prompt(&config), Err(PromptError::Read { .. })));
        assert_eq!(
            load_system_prompt(&AgentConfig::default()).ok().as_deref(),
            Some(DEFAULT_SYSTEM_PROMPT)
        );
    }
}
