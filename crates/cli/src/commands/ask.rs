use netops_core::config::LoadOptions;

use super::{
    prepare, runtime, start_session, CommandResult, EXIT_CONFIG, EXIT_MODEL, EXIT_TOOL_PROVIDER,
};

/// One round in a fresh session; prints only the reply.
pub fn run(options: LoadOptions, question: &str) -> CommandResult {
    let question = question.trim();
    if question.is_empty() {
        return CommandResult::failure("ask", "invalid_input", "question must not be empty", EXIT_CONFIG);
    }

    let config = match prepare("ask", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let mut orchestrator = match start_session(&config).await {
            Ok(orchestrator) => orchestrator,
            Err(error) => {
                return CommandResult::failure(
                    "ask",
                    "session_start",
                    format!("{error:#}"),
                    EXIT_TOOL_PROVIDER,
                )
            }
        };

        let outcome = orchestrator.handle_user_message(question).await;
        let exit_code = if outcome.is_failure() { EXIT_MODEL } else { 0 };
        CommandResult::text(exit_code, outcome.reply)
    })
}
