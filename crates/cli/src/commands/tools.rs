use netops_agent::{ProviderToolSpec, ToolProvider, ToolRegistry};
use netops_core::config::LoadOptions;

use super::{prepare, runtime, tool_provider, CommandResult, EXIT_TOOL_PROVIDER};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match prepare("tools", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("tools") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let provider = tool_provider(&config);
    match runtime.block_on(provider.list_tools()) {
        Ok(tools) => CommandResult::text(0, render(&config.mcp.command, &ToolRegistry::new(tools))),
        Err(error) => {
            CommandResult::failure("tools", "tool_provider", error.to_string(), EXIT_TOOL_PROVIDER)
        }
    }
}

fn render(command: &str, registry: &ToolRegistry) -> String {
    let mut lines = vec![format!("{} tools from `{command}`:", registry.len())];
    lines.extend(registry.specs().iter().map(render_tool));
    lines.join("\n")
}

fn render_tool(tool: &ProviderToolSpec) -> String {
    let required: Vec<&str> = tool
        .input_schema
        .get("required")
        .and_then(|required| required.as_array())
        .map(|keys| keys.iter().filter_map(|key| key.as_str()).collect())
        .unwrap_or_default();
    format!("- {}({}): {}", tool.name, required.join(", "), tool.description)
}
