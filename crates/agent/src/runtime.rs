use std::sync::Arc;

use netops_core::errors::AgentError;

use crate::conversation::{Session, ToolResult, Turn};
use crate::intent::IntentExtractor;
use crate::llm::LlmClient;
use crate::tools::{CallableToolSpec, ToolDispatcher};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    AwaitingUserInput,
    ModelCallPending,
    ToolDispatchPending,
    FinalResponseReady,
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::ModelCallPending => "model_call_pending",
            Self::ToolDispatchPending => "tool_dispatch_pending",
            Self::FinalResponseReady => "final_response_ready",
        }
    }
}

/// What one round produced. `failure` is set only when a model call failed;
/// the reply then carries the user-facing failure message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundOutcome {
    pub reply: String,
    pub tool_results: Vec<ToolResult>,
    pub failure: Option<AgentError>,
}

impl RoundOutcome {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Drives one session round by round. Turns produced during a round are
/// staged and committed together once the reply is ready, so a failed round
/// leaves the transcript as it was.
pub struct DialogueOrchestrator {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    extractor: IntentExtractor,
    session: Session,
    state: RoundState,
    rounds: u64,
}

impl DialogueOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, dispatcher: ToolDispatcher, session: Session) -> Self {
        Self {
            llm,
            dispatcher,
            extractor: IntentExtractor::new(),
            session,
            state: RoundState::AwaitingUserInput,
            rounds: 0,
        }
    }

    pub fn with_extractor(mut self, extractor: IntentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub async fn handle_user_message(&mut self, text: &str) -> RoundOutcome {
        self.rounds += 1;
        let round = self.rounds;
        let tools = self.dispatcher.registry().describe();
        let mut staged = vec![Turn::user(text)];

        self.transition(RoundState::ModelCallPending, round);
        let enabled = (!tools.is_empty()).then_some(tools.as_slice());
        let first = match self.call_model(&staged, enabled).await {
            Ok(turn) => turn,
            Err(error) => return self.abort(round, error, Vec::new()),
        };

        let registry = self.dispatcher.registry();
        let requests = self.extractor.extract_known(&first, |name| registry.get(name).is_some());
        let direct_reply = first.content().to_string();
        staged.push(first);

        if requests.is_empty() {
            return self.finish(round, staged, direct_reply, Vec::new());
        }

        self.transition(RoundState::ToolDispatchPending, round);
        let mut tool_results = Vec::with_capacity(requests.len());
        for request in &requests {
            let result = self.dispatcher.invoke(&request.name, &request.arguments).await;
            tracing::info!(
                event_name = "agent.round.tool_turn.staged",
                session_id = %self.session.id(),
                round,
                tool_name = %request.name,
                is_error = result.is_error,
                "tool result staged"
            );
            staged.push(Turn::tool(&result));
            tool_results.push(result);
        }

        self.transition(RoundState::ModelCallPending, round);
        let second = match self.call_model(&staged, None).await {
            Ok(turn) => turn,
            Err(error) => return self.abort(round, error, tool_results),
        };
        let reply = second.content().to_string();
        staged.push(second);

        self.finish(round, staged, reply, tool_results)
    }

    async fn call_model(
        &self,
        staged: &[Turn],
        tools: Option<&[CallableToolSpec]>,
    ) -> Result<Turn, AgentError> {
        let mut transcript = Vec::with_capacity(self.session.len() + staged.len());
        transcript.extend_from_slice(self.session.transcript());
        transcript.extend_from_slice(staged);

        self.llm
            .complete(&transcript, tools)
            .await
            .map_err(|error| AgentError::ModelCallFailure(error.to_string()))
    }

    fn finish(
        &mut self,
        round: u64,
        staged: Vec<Turn>,
        reply: String,
        tool_results: Vec<ToolResult>,
    ) -> RoundOutcome {
        self.transition(RoundState::FinalResponseReady, round);
        let committed = staged.len();
        self.session.commit(staged);
        tracing::info!(
            event_name = "agent.round.completed",
            session_id = %self.session.id(),
            round,
            committed_turns = committed,
            tool_calls = tool_results.len(),
            "round completed"
        );
        self.transition(RoundState::AwaitingUserInput, round);
        RoundOutcome { reply, tool_results, failure: None }
    }

    fn abort(&mut self, round: u64, error: AgentError, tool_results: Vec<ToolResult>) -> RoundOutcome {
        tracing::error!(
            event_name = "agent.round.failed",
            session_id = %self.session.id(),
            round,
            error_class = error.error_class(),
            error = %error,
            "round failed; nothing committed"
        );
        self.transition(RoundState::AwaitingUserInput, round);
        RoundOutcome { reply: error.user_message(), tool_results, failure: Some(error) }
    }

    fn transition(&mut self, next: RoundState, round: u64) {
        tracing::debug!(
            event_name = "agent.round.state.changed",
            session_id = %self.session.id(),
            round,
            from = self.state.as_str(),
            to = next.as_str(),
            "round state changed"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use netops_core::errors::AgentError;
    use serde_json::json;

    use super::{DialogueOrchestrator, RoundState};
    use crate::conversation::{arguments_from_json, Role, Session, ToolArguments, ToolCallRequest, Turn};
    use crate::llm::fakes::ScriptedLlm;
    use crate::tools::fakes::{FakeProvider, Scripted};
    use crate::tools::{ToolDispatcher, ToolRegistry};

    fn orchestrator(llm: Arc<ScriptedLlm>, provider: Arc<FakeProvider>) -> DialogueOrchestrator {
        let registry = ToolRegistry::new(provider.tools.clone());
        let dispatcher = ToolDispatcher::new(provider, registry, Duration::from_secs(5));
        DialogueOrchestrator::new(llm, dispatcher, Session::new("system prompt"))
    }

    fn call(name: &str) -> ToolCallRequest {
        ToolCallRequest::new(name, ToolArguments::new())
    }

    fn roles(orchestrator: &DialogueOrchestrator) -> Vec<Role> {
        orchestrator.session().transcript().iter().map(Turn::role).collect()
    }

    #[tokio::test]
    async fn plain_answer_takes_one_model_call() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(Turn::assistant("Hello!", Vec::new()))]));
        let mut orchestrator = orchestrator(llm.clone(), Arc::new(FakeProvider::netbox()));

        let outcome = orchestrator.handle_user_message("hi").await;

        assert_eq!(outcome.reply, "Hello!");
        assert!(outcome.tool_results.is_empty());
        assert!(!outcome.is_failure());
        assert_eq!(llm.calls(), vec![(2, true)]);
        assert_eq!(roles(&orchestrator), vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(orchestrator.state(), RoundState::AwaitingUserInput);
    }

    #[tokio::test]
    async fn every_request_gets_one_tool_turn_in_order() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(Turn::assistant(
                "",
                vec![call("list_sites"), call("list_devices"), call("list_sites")],
            )),
            Ok(Turn::assistant("One site, eight devices.", Vec::new())),
        ]));
        let provider = Arc::new(FakeProvider::netbox());
        let mut orchestrator = orchestrator(llm.clone(), provider.clone());

        let outcome = orchestrator.handle_user_message("summarize the inventory").await;

        assert_eq!(outcome.reply, "One site, eight devices.");
        let names: Vec<_> = outcome.tool_results.iter().map(|result| result.tool_name.as_str()).collect();
        assert_eq!(names, vec!["list_sites", "list_devices", "list_sites"]);
        assert_eq!(provider.recorded().len(), 3);

        let transcript = orchestrator.session().transcript();
        let tool_names: Vec<_> = transcript.iter().filter_map(Turn::tool_name).collect();
        assert_eq!(tool_names, vec!["list_sites", "list_devices", "list_sites"]);
        assert_eq!(
            roles(&orchestrator),
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Tool,
                Role::Assistant
            ]
        );
        // the follow-up call sees the tool turns and has tools disabled
        assert_eq!(llm.calls(), vec![(2, true), (6, false)]);
    }

    #[tokio::test]
    async fn provider_error_becomes_tool_turn_and_round_completes() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(Turn::assistant("", vec![call("list_devices"), call("list_sites")])),
            Ok(Turn::assistant("Device data was not found in NetBox.", Vec::new())),
        ]));
        let provider = Arc::new(
            FakeProvider::netbox()
                .respond("list_devices", Scripted::ProviderError("NetBox returned 500".to_string())),
        );
        let mut orchestrator = orchestrator(llm, provider);

        let outcome = orchestrator.handle_user_message("list devices").await;

        assert!(!outcome.is_failure());
        assert_eq!(outcome.reply, "Device data was not found in NetBox.");
        assert!(outcome.tool_results[0].is_error);
        assert!(outcome.tool_results[0].content.starts_with("Error calling tool: "));
        assert!(!outcome.tool_results[1].is_error);
        assert_eq!(orchestrator.session().len(), 6);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(Turn::assistant("", vec![call("list_racks")])),
            Ok(Turn::assistant("That information is not available.", Vec::new())),
        ]));
        let provider = Arc::new(FakeProvider::netbox());
        let mut orchestrator = orchestrator(llm, provider.clone());

        let outcome = orchestrator.handle_user_message("list racks").await;

        assert!(outcome.tool_results[0].is_error);
        assert!(provider.recorded().is_empty());
        assert_eq!(outcome.reply, "That information is not available.");
    }

    #[tokio::test]
    async fn echoed_json_with_unknown_name_stays_the_answer() {
        let answer = r#"Found it: {"name": "lab_router", "status": "active"}"#;
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(Turn::assistant(answer, Vec::new()))]));
        let provider = Arc::new(FakeProvider::netbox());
        let mut orchestrator = orchestrator(llm.clone(), provider.clone());

        let outcome = orchestrator.handle_user_message("status of lab_router?").await;

        assert_eq!(outcome.reply, answer);
        assert!(outcome.tool_results.is_empty());
        assert!(provider.recorded().is_empty());
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn first_model_failure_commits_nothing() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err("connection refused".to_string())]));
        let mut orchestrator = orchestrator(llm, Arc::new(FakeProvider::netbox()));

        let outcome = orchestrator.handle_user_message("hi").await;

        assert!(matches!(outcome.failure, Some(AgentError::ModelCallFailure(_))));
        assert!(outcome.reply.contains("connection refused"));
        assert_eq!(orchestrator.session().len(), 1);
        assert_eq!(orchestrator.state(), RoundState::AwaitingUserInput);
    }

    #[tokio::test]
    async fn follow_up_model_failure_commits_nothing() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(Turn::assistant("", vec![call("list_sites")])),
            Err("HTTP 502".to_string()),
        ]));
        let provider = Arc::new(FakeProvider::netbox());
        let mut orchestrator = orchestrator(llm, provider.clone());

        let outcome = orchestrator.handle_user_message("sites?").await;

        assert!(outcome.is_failure());
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(provider.recorded().len(), 1);
        assert_eq!(orchestrator.session().len(), 1);
    }

    #[tokio::test]
    async fn text_fallback_call_is_dispatched_with_cleaned_arguments() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(Turn::assistant(
                r#"{"name": "get_device", "parameters": {"name": "core-rtr-01", "site": "<nil>"}}"#,
                Vec::new(),
            )),
            Ok(Turn::assistant("core-rtr-01 is an active CSR1000v.", Vec::new())),
        ]));
        let provider = Arc::new(FakeProvider::netbox());
        let mut orchestrator = orchestrator(llm, provider.clone());

        let outcome = orchestrator.handle_user_message("tell me about core-rtr-01").await;

        assert_eq!(outcome.reply, "core-rtr-01 is an active CSR1000v.");
        assert_eq!(
            provider.recorded(),
            vec![("get_device".to_string(), arguments_from_json(json!({"name": "core-rtr-01"})))]
        );
    }

    #[tokio::test]
    async fn later_rounds_see_earlier_turns() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(Turn::assistant("Hello!", Vec::new())),
            Err("timeout".to_string()),
            Ok(Turn::assistant("Still here.", Vec::new())),
        ]));
        let mut orchestrator = orchestrator(llm.clone(), Arc::new(FakeProvider::netbox()));

        orchestrator.handle_user_message("hi").await;
        orchestrator.handle_user_message("are you there?").await;
        let outcome = orchestrator.handle_user_message("hello again").await;

        assert_eq!(outcome.reply, "Still here.");
        assert_eq!(llm.calls(), vec![(2, true), (4, true), (4, true)]);
        assert_eq!(orchestrator.session().len(), 5);
    }
}
