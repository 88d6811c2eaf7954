use std::io::{self, BufRead, Write};

use netops_agent::{DialogueOrchestrator, RoundOutcome};
use netops_core::config::LoadOptions;
use tokio::runtime::Runtime;

use super::{prepare, runtime, start_session, CommandResult, EXIT_RUNTIME, EXIT_TOOL_PROVIDER};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match prepare("chat", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    println!("Connecting to tool provider `{}`...", config.mcp.command);
    let mut orchestrator = match runtime.block_on(start_session(&config)) {
        Ok(orchestrator) => orchestrator,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "session_start",
                format!("{error:#}"),
                EXIT_TOOL_PROVIDER,
            )
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    match chat_loop(&runtime, &mut orchestrator, stdin.lock(), &mut stdout) {
        Ok(()) => CommandResult::text(0, ""),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), EXIT_RUNTIME),
    }
}

/// Reads one message per line until `quit`, `exit` or end of input. Each
/// message is one dialogue round; blank lines are skipped.
pub fn chat_loop(
    runtime: &Runtime,
    orchestrator: &mut DialogueOrchestrator,
    input: impl BufRead,
    output: &mut impl Write,
) -> io::Result<()> {
    let tool_names: Vec<&str> = orchestrator.dispatcher().registry().names().collect();
    writeln!(output, "Connected! Available tools: {}", tool_names.join(", "))?;
    writeln!(output, "--- Start chatting (type 'quit' or 'exit' to leave) ---")?;

    let mut lines = input.lines();
    loop {
        write!(output, "User: ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let line = line?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if is_exit(message) {
            break;
        }

        let outcome = runtime.block_on(orchestrator.handle_user_message(message));
        write_outcome(output, &outcome)?;
    }

    writeln!(output, "Goodbye!")
}

fn is_exit(message: &str) -> bool {
    message.eq_ignore_ascii_case("quit") || message.eq_ignore_ascii_case("exit")
}

fn write_outcome(output: &mut impl Write, outcome: &RoundOutcome) -> io::Result<()> {
    for result in &outcome.tool_results {
        let marker = if result.is_error { "failed" } else { "called" };
        writeln!(output, "  ({marker} {})", result.tool_name)?;
    }
    if outcome.is_failure() {
        writeln!(output, "Error: {}", outcome.reply)
    } else {
        writeln!(output, "Assistant: {}", outcome.reply)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use netops_agent::{
        CallableToolSpec, DialogueOrchestrator, LlmClient, LlmError, ProviderCallOutput,
        ProviderToolSpec, Session, ToolArguments, ToolCallRequest, ToolDispatcher, ToolProvider,
        ToolProviderError, ToolRegistry, Turn,
    };
    use serde_json::json;

    use super::chat_loop;

    struct Replies(Mutex<VecDeque<Result<Turn, String>>>);

    impl Replies {
        fn new(replies: Vec<Result<Turn, String>>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(replies.into())))
        }

        fn remaining(&self) -> usize {
            self.0.lock().map(|replies| replies.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for Replies {
        async fn complete(
            &self,
            _transcript: &[Turn],
            _tools: Option<&[CallableToolSpec]>,
        ) -> Result<Turn, LlmError> {
            let next = self.0.lock().ok().and_then(|mut replies| replies.pop_front());
            match next {
                Some(Ok(turn)) => Ok(turn),
                Some(Err(message)) => Err(LlmError::InvalidResponse(message)),
                None => Err(LlmError::InvalidResponse("no reply left".to_string())),
            }
        }
    }

    struct DeviceInventory;

    #[async_trait]
    impl ToolProvider for DeviceInventory {
        async fn list_tools(&self) -> Result<Vec<ProviderToolSpec>, ToolProviderError> {
            Ok(vec![device_tool()])
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: &ToolArguments,
        ) -> Result<ProviderCallOutput, ToolProviderError> {
            Ok(ProviderCallOutput {
                text_blocks: vec![r#"[{"name":"core-rtr-01"}]"#.to_string()],
                is_error: false,
            })
        }
    }

    fn device_tool() -> ProviderToolSpec {
        ProviderToolSpec::new(
            "list_devices",
            "List all devices",
            json!({"type": "object", "properties": {}}),
        )
    }

    fn orchestrator(llm: Arc<Replies>) -> DialogueOrchestrator {
        let dispatcher = ToolDispatcher::new(
            Arc::new(DeviceInventory),
            ToolRegistry::new(vec![device_tool()]),
            Duration::from_secs(5),
        );
        DialogueOrchestrator::new(llm, dispatcher, Session::new("You are a network assistant."))
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|error| panic!("runtime: {error}"))
    }

    fn chat(llm: Arc<Replies>, input: &str) -> String {
        let runtime = runtime();
        let mut orchestrator = orchestrator(llm);
        let mut output = Vec::new();
        chat_loop(&runtime, &mut orchestrator, Cursor::new(input.to_string()), &mut output)
            .unwrap_or_else(|error| panic!("chat loop: {error}"));
        String::from_utf8(output).unwrap_or_else(|error| panic!("utf8: {error}"))
    }

    #[test]
    fn tool_round_then_quit() {
        let llm = Replies::new(vec![
            Ok(Turn::assistant("", vec![ToolCallRequest::new("list_devices", ToolArguments::new())])),
            Ok(Turn::assistant("There is one device: core-rtr-01.", Vec::new())),
            Ok(Turn::assistant("never asked", Vec::new())),
        ]);

        let output = chat(llm.clone(), "\nhow many devices?\nQUIT\nand now?\n");

        assert!(output.starts_with("Connected! Available tools: list_devices\n"));
        assert!(output.contains("  (called list_devices)\n"));
        assert!(output.contains("Assistant: There is one device: core-rtr-01.\n"));
        assert!(output.ends_with("Goodbye!\n"));
        assert_eq!(llm.remaining(), 1);
    }

    #[test]
    fn model_failure_is_shown_and_chat_continues() {
        let llm = Replies::new(vec![
            Err("connection refused".to_string()),
            Ok(Turn::assistant("Hello again.", Vec::new())),
        ]);

        let output = chat(llm, "hello\nhello?\n");

        assert!(output.contains("Error: The assistant is unavailable right now"));
        assert!(output.contains("Assistant: Hello again.\n"));
        assert!(output.ends_with("User: \nGoodbye!\n"));
    }
}
