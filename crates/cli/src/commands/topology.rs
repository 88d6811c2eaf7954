use netops_agent::{ToolArguments, ToolDispatcher};
use netops_core::config::LoadOptions;
use netops_core::TopologyReport;

use super::{call_timeout, prepare, runtime, tool_provider, CommandResult, EXIT_TOOL_PROVIDER};

const TOPOLOGY_TOOL: &str = "generate_topology";

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let config = match prepare("topology", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("topology") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let provider = std::sync::Arc::new(tool_provider(&config));
        let dispatcher = ToolDispatcher::connect(provider, call_timeout(&config)).await?;
        Ok::<_, netops_agent::ToolProviderError>(
            dispatcher.invoke(TOPOLOGY_TOOL, &ToolArguments::new()).await,
        )
    });

    let result = match result {
        Ok(result) => result,
        Err(error) => {
            return CommandResult::failure(
                "topology",
                "tool_provider",
                error.to_string(),
                EXIT_TOOL_PROVIDER,
            )
        }
    };
    if result.is_error {
        return CommandResult::failure(
            "topology",
            "tool_invocation",
            result.content,
            EXIT_TOOL_PROVIDER,
        );
    }

    match serde_json::from_str::<TopologyReport>(&result.content) {
        Ok(_) if json_output => CommandResult::text(0, result.content.trim().to_string()),
        Ok(report) => CommandResult::text(0, render(&report)),
        Err(error) => CommandResult::failure(
            "topology",
            "invalid_response",
            format!("`{TOPOLOGY_TOOL}` returned an unexpected payload: {error}"),
            EXIT_TOOL_PROVIDER,
        ),
    }
}

fn render(report: &TopologyReport) -> String {
    let summary = &report.summary;
    let layers = &report.topology_layers;
    let mut lines = vec![
        format!(
            "devices: {}  prefixes: {}  vlans: {}",
            summary.total_devices, summary.total_prefixes, summary.total_vlans
        ),
        format!("roles: {}", list_or_none(&summary.device_roles)),
    ];
    for (name, devices) in [
        ("perimeter", &layers.perimeter),
        ("core", &layers.core),
        ("distribution", &layers.distribution),
        ("security", &layers.security),
        ("access", &layers.access),
    ] {
        lines.push(format!("{name}: {}", list_or_none(devices)));
    }
    if !summary.unclassified_devices.is_empty() {
        lines.push(format!("unclassified: {}", summary.unclassified_devices.join(", ")));
    }
    lines.push(String::new());
    lines.push("```mermaid".to_string());
    lines.push(report.diagram.trim_end().to_string());
    lines.push("```".to_string());
    lines.join("\n")
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use netops_core::{TopologyLayers, TopologyReport, TopologySummary};

    use super::render;

    #[test]
    fn renders_layers_and_fenced_diagram() {
        let report = TopologyReport {
            summary: TopologySummary {
                total_devices: 3,
                total_prefixes: 1,
                total_vlans: 0,
                device_roles: vec!["Core Router".to_string(), "Printer".to_string()],
                unclassified_devices: vec!["printer-01".to_string()],
            },
            devices_by_role: BTreeMap::new(),
            network_segments: Vec::new(),
            vlans: Vec::new(),
            topology_layers: TopologyLayers {
                core: vec!["core-rtr-01".to_string(), "core-rtr-02".to_string()],
                ..TopologyLayers::default()
            },
            diagram: "graph TB\n    CR1 <-->|iBGP| CR2\n".to_string(),
        };

        let output = render(&report);

        assert!(output.starts_with("devices: 3  prefixes: 1  vlans: 0\n"));
        assert!(output.contains("core: core-rtr-01, core-rtr-02\n"));
        assert!(output.contains("perimeter: -\n"));
        assert!(output.contains("unclassified: printer-01\n"));
        assert!(output.ends_with("```mermaid\ngraph TB\n    CR1 <-->|iBGP| CR2\n```"));
    }
}
