//! Agent Turn Loop
//!
//! One user line drives the model until it answers without requesting tools:
//!
//! ```text
//! AwaitingUserInput -> Generating -> (ExecutingTools -> Generating)* -> Done
//! ```
//!
//! Text is streamed to the terminal as it arrives. Tool calls from one step
//! run concurrently behind the confirmation gate and their results are
//! appended in the order the model issued them. The loop gives up after
//! `max_steps` tool steps.

use std::sync::Arc;

use futures::StreamExt;

use crate::console::Console;
use crate::error::{AgentError, Result};
use crate::executor::ToolExecutor;
use crate::gate::{ConfirmationGate, ConsoleGate};
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, GenerationRequest, LlmProvider, StepEvent};
use crate::tool::{ToolCall, ToolRegistry, ToolSchema};

/// Tool steps allowed per turn
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Prompt shown before each user line
pub const USER_PROMPT: &str = "You: ";

/// Label written before the streamed answer
pub const ASSISTANT_LABEL: &str = "\nAssistant: ";

pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are a coding assistant running in the user's terminal.

You can run shell commands and read, list, create, write and edit files in the
current working directory through the tools you are given.

Every tool call is shown to the user for approval before it runs. If a call is
declined, the result contains the user's feedback: read it, adjust your plan
and do not repeat the same call unchanged.

Prefer small, targeted edits. Explain what you changed when you are done.
Be concise and accurate.";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Instructions seeded as the first message
    pub system_prompt: String,

    /// Maximum tool steps per turn
    pub max_steps: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_steps: DEFAULT_MAX_STEPS,
            generation: GenerationOptions::new(model),
        }
    }
}

/// How a turn ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// All text streamed during the turn
    pub response: String,

    /// Tool steps taken
    pub steps: usize,

    /// Whether the step budget cut the turn short
    pub budget_exhausted: bool,
}

/// Scratch state for one user input
#[derive(Debug, Default)]
struct TurnState {
    steps_taken: usize,
    pending_tool_calls: Vec<ToolCall>,
    /// Text of the current step
    step_text: String,
    /// Text of the whole turn
    accumulated_text: String,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    executor: ToolExecutor,
    console: Arc<Console>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        gate: Arc<dyn ConfirmationGate>,
        console: Arc<Console>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            executor: ToolExecutor::new(gate),
            console,
            config,
        }
    }

    /// Fresh history seeded with the system prompt
    pub fn new_conversation(&self) -> Conversation {
        Conversation::with_system_prompt(self.config.system_prompt.clone())
    }

    /// Read user lines until end of input, running one turn per line
    pub async fn run_interactive(&self, conversation: &mut Conversation) -> Result<()> {
        while let Some(line) = self.console.read_line(USER_PROMPT).await? {
            if line.trim().is_empty() {
                continue;
            }

            self.console.write(ASSISTANT_LABEL).await?;
            let outcome = self.run_turn(conversation, &line).await?;
            self.console.write("\n\n").await?;

            tracing::debug!(steps = outcome.steps, "turn finished");
        }

        tracing::info!("input closed");
        Ok(())
    }

    /// Run a single turn for `input`
    pub async fn run_turn(&self, conversation: &mut Conversation, input: &str) -> Result<TurnOutcome> {
        conversation.append(Message::user(input));

        let schemas = self.tools.schemas();
        let mut state = TurnState::default();

        loop {
            self.generate_step(conversation, &schemas, &mut state).await?;

            if state.pending_tool_calls.is_empty() {
                conversation.append(Message::assistant(state.step_text.as_str()));
                return Ok(TurnOutcome {
                    response: state.accumulated_text,
                    steps: state.steps_taken,
                    budget_exhausted: false,
                });
            }

            let calls = std::mem::take(&mut state.pending_tool_calls);
            conversation.append(Message::assistant_tool_calls(&state.step_text, &calls));
            if !state.step_text.is_empty() {
                self.console.write("\n\n").await?;
            }

            let results = self.executor.execute_all(&self.tools, &calls).await;
            for result in &results {
                conversation.append(Message::tool_result(result));
            }
            state.steps_taken += 1;

            if state.steps_taken >= self.config.max_steps {
                return self.finish_exhausted(conversation, state).await;
            }
        }
    }

    /// Stream one generation step into `state`
    async fn generate_step(
        &self,
        conversation: &Conversation,
        tools: &[ToolSchema],
        state: &mut TurnState,
    ) -> Result<()> {
        state.step_text.clear();

        let request = GenerationRequest {
            messages: conversation.snapshot(),
            tools,
            options: &self.config.generation,
        };
        tracing::debug!(
            provider = self.provider.name(),
            messages = request.messages.len(),
            step = state.steps_taken + 1,
            "generation step"
        );

        let mut events = self.provider.stream_step(&request).await?;
        while let Some(event) = events.next().await {
            match event? {
                StepEvent::TextDelta(text) => {
                    self.console.write(&text).await?;
                    state.step_text.push_str(&text);
                    state.accumulated_text.push_str(&text);
                }
                StepEvent::ToolCall(call) => {
                    tracing::debug!(tool = %call.name, id = %call.id, "tool call requested");
                    state.pending_tool_calls.push(call);
                }
                StepEvent::Finish(reason) => {
                    tracing::debug!(?reason, "step finished");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn finish_exhausted(&self, conversation: &mut Conversation, state: TurnState) -> Result<TurnOutcome> {
        tracing::warn!(max_steps = self.config.max_steps, "step budget exhausted");

        // Partial text already sits in the tool-call messages; only the
        // notice is new to the history.
        let response = if state.accumulated_text.is_empty() {
            let notice = format!(
                "Stopped after {} tool steps without a final answer.",
                state.steps_taken
            );
            self.console.write(&notice).await?;
            conversation.append(Message::assistant(notice.as_str()));
            notice
        } else {
            state.accumulated_text
        };

        Ok(TurnOutcome {
            response,
            steps: state.steps_taken,
            budget_exhausted: true,
        })
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
#[derive(Default)]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    gate: Option<Arc<dyn ConfirmationGate>>,
    console: Option<Arc<Console>>,
    model: Option<String>,
    system_prompt: Option<String>,
    max_steps: Option<usize>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Defaults to a [`ConsoleGate`] on the agent's console
    pub fn gate(mut self, gate: Arc<dyn ConfirmationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Defaults to process stdin/stdout
    pub fn console(mut self, console: Arc<Console>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_steps(mut self, max: usize) -> Self {
        self.max_steps = Some(max);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let model = self
            .model
            .ok_or_else(|| AgentError::Config("Model is required".into()))?;
        let max_steps = self.max_steps.unwrap_or(DEFAULT_MAX_STEPS);
        if max_steps == 0 {
            return Err(AgentError::Config("max_steps must be at least 1".into()));
        }

        let mut config = AgentConfig::new(model);
        config.max_steps = max_steps;
        if let Some(prompt) = self.system_prompt {
            config.system_prompt = prompt;
        }

        let console = self.console.unwrap_or_else(|| Arc::new(Console::stdio()));
        let gate = self
            .gate
            .unwrap_or_else(|| Arc::new(ConsoleGate::new(console.clone())));

        Ok(Agent::new(provider, Arc::new(self.tools), gate, console, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ScriptedGate;
    use crate::message::{ContentPart, MessageContent, Role};
    use crate::provider::{FinishReason, StepStream};
    use crate::tool::{ParamType, ParameterSchema, Tool, ToolArguments};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    /// Replays scripted steps; the last step repeats forever
    struct ScriptedProvider {
        steps: Vec<Vec<StepEvent>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(steps: Vec<Vec<StepEvent>>) -> Arc<Self> {
            Arc::new(Self {
                steps,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream_step(&self, request: &GenerationRequest<'_>) -> Result<StepStream> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.messages.to_vec());
            let step = self.steps[n.min(self.steps.len() - 1)].clone();
            let mut events: Vec<Result<StepEvent>> = step.into_iter().map(Ok).collect();
            events.push(Ok(StepEvent::Finish(FinishReason::Stop)));
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn stream_step(&self, _request: &GenerationRequest<'_>) -> Result<StepStream> {
            Err(AgentError::Provider("connection reset".into()))
        }
    }

    struct StubTool {
        name: &'static str,
        output: &'static str,
        delay_ms: u64,
        runs: Arc<AtomicUsize>,
    }

    impl StubTool {
        fn new(name: &'static str, output: &'static str) -> Self {
            Self {
                name,
                output,
                delay_ms: 0,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: self.name.into(),
                description: "stub".into(),
                parameters: vec![ParameterSchema::required("path", ParamType::String, "path")],
            }
        }

        async fn execute(&self, _args: &ToolArguments) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.into())
        }
    }

    fn text(s: &str) -> StepEvent {
        StepEvent::TextDelta(s.into())
    }

    fn tool_call(id: &str, name: &str, path: &str) -> StepEvent {
        StepEvent::ToolCall(ToolCall::with_id(id, name, json!({ "path": path })))
    }

    fn agent(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        gate: Arc<ScriptedGate>,
        max_steps: usize,
    ) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tools(tools)
            .gate(gate)
            .console(Arc::new(Console::new(
                std::io::Cursor::new(Vec::new()),
                tokio::io::sink(),
            )))
            .model("test-model")
            .max_steps(max_steps)
            .build()
            .unwrap()
    }

    fn tool_outputs(conversation: &Conversation) -> Vec<(String, String)> {
        conversation
            .snapshot()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .flat_map(|m| match &m.content {
                MessageContent::Parts(parts) => parts.clone(),
                MessageContent::Text(_) => Vec::new(),
            })
            .filter_map(|p| match p {
                ContentPart::ToolResult { call_id, output, .. } => Some((call_id, output)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let provider = ScriptedProvider::new(vec![vec![text("Hel"), text("lo!")]]);
        let agent = agent(provider.clone(), ToolRegistry::new(), Arc::new(ScriptedGate::default()), 20);
        let mut conversation = agent.new_conversation();

        let outcome = agent.run_turn(&mut conversation, "hi").await.unwrap();

        assert_eq!(outcome.response, "Hello!");
        assert_eq!(outcome.steps, 0);
        assert!(!outcome.budget_exhausted);
        let roles: Vec<_> = conversation.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Assistant]);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_list_files_end_to_end() {
        let provider = ScriptedProvider::new(vec![
            vec![tool_call("call-1", "list_directory", ".")],
            vec![text("The directory holds Cargo.toml and src.")],
        ]);
        let lister = StubTool::new(
            "list_directory",
            r#"[{"name":"Cargo.toml","isDirectory":false},{"name":"src","isDirectory":true}]"#,
        );
        let runs = lister.runs.clone();
        let mut tools = ToolRegistry::new();
        tools.register_local(lister).unwrap();
        let gate = Arc::new(ScriptedGate::new(["y"]));
        let agent = agent(provider.clone(), tools, gate.clone(), 20);
        let mut conversation = agent.new_conversation();

        let outcome = agent.run_turn(&mut conversation, "list files in .").await.unwrap();

        assert_eq!(outcome.steps, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(gate.asked().len(), 1);

        let last = conversation.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.tool_calls().is_empty());
        assert_eq!(last.text(), "The directory holds Cargo.toml and src.");

        let roles: Vec<_> = conversation.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );

        // The second step saw the tool result.
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[1].len(), 4);
        let outputs = tool_outputs(&conversation);
        assert_eq!(outputs[0].0, "call-1");
        assert!(outputs[0].1.contains("Cargo.toml"));
    }

    #[tokio::test]
    async fn test_step_budget_stops_endless_tool_calls() {
        let provider = ScriptedProvider::new(vec![vec![text("checking "), tool_call("x", "probe", "a")]]);
        let mut tools = ToolRegistry::new();
        tools.register_local(StubTool::new("probe", "nothing yet")).unwrap();
        let gate = Arc::new(ScriptedGate::new(vec!["y"; 100]));
        let agent = agent(provider.clone(), tools, gate, DEFAULT_MAX_STEPS);
        let mut conversation = agent.new_conversation();

        let outcome = agent.run_turn(&mut conversation, "loop forever").await.unwrap();

        assert!(outcome.budget_exhausted);
        assert_eq!(outcome.steps, DEFAULT_MAX_STEPS);
        assert_eq!(provider.calls(), DEFAULT_MAX_STEPS);
        assert!(!outcome.response.is_empty());
        assert!(outcome.response.starts_with("checking checking "));
        assert_eq!(conversation.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_step_budget_keeps_partial_text_once_in_history() {
        let provider = ScriptedProvider::new(vec![vec![text("chk "), tool_call("x", "probe", "a")]]);
        let mut tools = ToolRegistry::new();
        tools.register_local(StubTool::new("probe", "nothing")).unwrap();
        let agent = agent(provider, tools, Arc::new(ScriptedGate::new(vec!["y"; 3])), 3);
        let mut conversation = agent.new_conversation();

        let outcome = agent.run_turn(&mut conversation, "go").await.unwrap();

        assert_eq!(outcome.response, "chk chk chk ");
        let history_text: String = conversation
            .snapshot()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(Message::text)
            .collect();
        assert_eq!(history_text, outcome.response);
    }

    #[tokio::test]
    async fn test_step_budget_without_text_reports_notice() {
        let provider = ScriptedProvider::new(vec![vec![tool_call("x", "probe", "a")]]);
        let mut tools = ToolRegistry::new();
        tools.register_local(StubTool::new("probe", "nothing")).unwrap();
        let agent = agent(provider.clone(), tools, Arc::new(ScriptedGate::new(vec!["y"; 3])), 3);
        let mut conversation = agent.new_conversation();

        let outcome = agent.run_turn(&mut conversation, "go").await.unwrap();

        assert_eq!(provider.calls(), 3);
        assert_eq!(outcome.response, "Stopped after 3 tool steps without a final answer.");
        assert_eq!(conversation.last().unwrap().text(), outcome.response);
    }

    #[tokio::test]
    async fn test_tool_results_follow_request_order() {
        let provider = ScriptedProvider::new(vec![
            vec![
                tool_call("A", "slow", "1"),
                tool_call("B", "fast", "2"),
                tool_call("C", "medium", "3"),
            ],
            vec![text("done")],
        ]);
        let mut tools = ToolRegistry::new();
        for (name, delay_ms) in [("slow", 80), ("fast", 0), ("medium", 30)] {
            let mut tool = StubTool::new(name, name);
            tool.delay_ms = delay_ms;
            tools.register_local(tool).unwrap();
        }
        let agent = agent(provider, tools, Arc::new(ScriptedGate::new(["y", "y", "y"])), 20);
        let mut conversation = agent.new_conversation();

        agent.run_turn(&mut conversation, "three things").await.unwrap();

        let ids: Vec<_> = tool_outputs(&conversation).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_declined_call_feeds_feedback_to_model() {
        let provider = ScriptedProvider::new(vec![
            vec![tool_call("1", "probe", "/etc")],
            vec![text("Understood.")],
        ]);
        let probe = StubTool::new("probe", "secret");
        let runs = probe.runs.clone();
        let mut tools = ToolRegistry::new();
        tools.register_local(probe).unwrap();
        let agent = agent(provider, tools, Arc::new(ScriptedGate::new(["no, stay in the project"])), 20);
        let mut conversation = agent.new_conversation();

        agent.run_turn(&mut conversation, "look around").await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        let outputs = tool_outputs(&conversation);
        assert_eq!(
            outputs[0].1,
            "Tool 'probe' was cancelled by the user.\nFeedback: no, stay in the project"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort_turn() {
        let provider = ScriptedProvider::new(vec![
            vec![tool_call("1", "teleport", "x")],
            vec![text("That tool does not exist.")],
        ]);
        let agent = agent(provider, ToolRegistry::new(), Arc::new(ScriptedGate::default()), 20);
        let mut conversation = agent.new_conversation();

        let outcome = agent.run_turn(&mut conversation, "beam me up").await.unwrap();

        assert_eq!(outcome.steps, 1);
        let outputs = tool_outputs(&conversation);
        assert!(outputs[0].1.contains("Tool not found: teleport"));
    }

    #[tokio::test]
    async fn test_provider_error_ends_turn() {
        let agent = agent(Arc::new(FailingProvider), ToolRegistry::new(), Arc::new(ScriptedGate::default()), 20);
        let mut conversation = agent.new_conversation();

        let err = agent.run_turn(&mut conversation, "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_interactive_loop_streams_and_skips_blank_lines() {
        let provider = ScriptedProvider::new(vec![vec![text("Hi "), text("there")]]);
        let (writer, mut output) = tokio::io::duplex(64 * 1024);
        let console = Arc::new(Console::new(std::io::Cursor::new(b"hello\n   \n".to_vec()), writer));
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .console(console)
            .model("test-model")
            .build()
            .unwrap();
        let mut conversation = agent.new_conversation();

        agent.run_interactive(&mut conversation).await.unwrap();
        drop(agent);

        let mut written = String::new();
        output.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "You: \nAssistant: Hi there\n\nYou: You: ");
        assert_eq!(provider.calls(), 1);
        assert_eq!(conversation.len(), 3);
    }

    #[tokio::test]
    async fn test_interactive_loop_survives_invalid_utf8_line() {
        let provider = ScriptedProvider::new(vec![vec![text("ok")]]);
        let console = Arc::new(Console::new(
            std::io::Cursor::new(b"caf\xe9\nhello\n".to_vec()),
            tokio::io::sink(),
        ));
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .console(console)
            .model("test-model")
            .build()
            .unwrap();
        let mut conversation = agent.new_conversation();

        agent.run_interactive(&mut conversation).await.unwrap();

        assert_eq!(provider.calls(), 2);
        let user_lines: Vec<_> = conversation
            .snapshot()
            .iter()
            .filter(|m| m.role == Role::User)
            .map(Message::text)
            .collect();
        assert_eq!(user_lines, ["caf\u{FFFD}", "hello"]);
    }

    #[test]
    fn test_builder_requires_provider_and_model() {
        assert!(matches!(
            AgentBuilder::new().model("m").build(),
            Err(AgentError::Config(_))
        ));
        let provider = ScriptedProvider::new(vec![vec![]]);
        assert!(matches!(
            AgentBuilder::new().provider(provider.clone()).build(),
            Err(AgentError::Config(_))
        ));
        assert!(matches!(
            AgentBuilder::new().provider(provider.clone()).model("m").max_steps(0).build(),
            Err(AgentError::Config(_))
        ));

        let agent = AgentBuilder::new()
            .provider(provider)
            .model("m")
            .max_steps(7)
            .system_prompt("be terse")
            .build()
            .unwrap();
        assert_eq!(agent.config().max_steps, 7);
        assert_eq!(agent.config().generation.model, "m");
        assert_eq!(agent.new_conversation().snapshot()[0].text(), "be terse");
    }
}
