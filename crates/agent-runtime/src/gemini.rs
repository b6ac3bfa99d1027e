//! Google Gemini LLM Provider
//!
//! Implementation of `LlmProvider` over the Gemini `streamGenerateContent`
//! endpoint with server-sent events and native function calling.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use agent_core::{
    error::{AgentError, Result},
    message::{ContentPart, Message, MessageContent, Role},
    provider::{FinishReason, GenerationRequest, LlmProvider, StepEvent, StepStream},
    tool::{ToolCall, ToolSchema},
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,

    /// API root, without trailing slash
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }
}

/// Gemini LLM provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Convert agent messages and tools to a Gemini request body
    fn build_request_body(request: &GenerationRequest<'_>) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        let mut system_instruction = None;
        let mut last_was_tool = false;

        for msg in request.messages {
            let parts = convert_parts(msg);
            if parts.is_empty() {
                continue;
            }
            match msg.role {
                Role::System => {
                    system_instruction = Some(json!({ "parts": parts }));
                }
                Role::Tool => {
                    // Responses to one step's calls travel together.
                    if last_was_tool {
                        if let Some(Value::Array(existing)) =
                            contents.last_mut().and_then(|c| c.get_mut("parts"))
                        {
                            existing.extend(parts);
                            continue;
                        }
                    }
                    contents.push(json!({ "role": "user", "parts": parts }));
                }
                Role::User => contents.push(json!({ "role": "user", "parts": parts })),
                Role::Assistant => contents.push(json!({ "role": "model", "parts": parts })),
            }
            last_was_tool = msg.role == Role::Tool;
        }

        let mut generation_config = json!({
            "maxOutputTokens": request.options.max_output_tokens,
        });
        if let Some(temperature) = request.options.temperature {
            generation_config["temperature"] = json!(temperature);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(sys) = system_instruction {
            body["systemInstruction"] = sys;
        }
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request.tools.iter().map(function_declaration).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, model
        )
    }
}

fn convert_parts(msg: &Message) -> Vec<Value> {
    match &msg.content {
        MessageContent::Text(text) if text.is_empty() => Vec::new(),
        MessageContent::Text(text) => vec![json!({ "text": text })],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => json!({ "text": text }),
                ContentPart::ToolCall(call) => json!({
                    "functionCall": { "name": call.name, "args": call.arguments }
                }),
                ContentPart::ToolResult { name, output, .. } => json!({
                    "functionResponse": { "name": name, "response": { "result": output } }
                }),
            })
            .collect(),
    }
}

fn function_declaration(schema: &ToolSchema) -> Value {
    let mut declaration = json!({
        "name": schema.name,
        "description": schema.description,
    });
    if !schema.parameters.is_empty() {
        declaration["parameters"] = sanitize_schema(schema.json_schema());
    }
    declaration
}

/// Drop JSON-schema keywords the Gemini function schema rejects
fn sanitize_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "$schema" && key != "additionalProperties")
                .map(|(key, value)| (key, sanitize_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_schema).collect()),
        other => other,
    }
}

// ============================================================================
// Response stream
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ResponseChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

/// Splits an SSE byte stream into `data:` payloads
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Tracks what one step produced so the final event is right
#[derive(Debug, Default)]
struct StepTracker {
    saw_tool_call: bool,
    finish_reason: Option<String>,
}

impl StepTracker {
    fn events(&mut self, payload: &str) -> Result<Vec<StepEvent>> {
        let chunk: ResponseChunk = serde_json::from_str(payload)?;
        if let Some(err) = chunk.error {
            return Err(AgentError::Provider(format!("Gemini stream error: {err}")));
        }

        let mut events = Vec::new();
        for candidate in chunk.candidates.into_iter().take(1) {
            if let Some(content) = candidate.content {
                for part in content.parts.into_iter().filter(|p| !p.thought) {
                    if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                        events.push(StepEvent::TextDelta(text));
                    }
                    if let Some(call) = part.function_call {
                        self.saw_tool_call = true;
                        events.push(StepEvent::ToolCall(ToolCall::new(call.name, call.args)));
                    }
                }
            }
            if candidate.finish_reason.is_some() {
                self.finish_reason = candidate.finish_reason;
            }
        }
        Ok(events)
    }

    fn finish(&self) -> FinishReason {
        if self.saw_tool_call {
            return FinishReason::ToolUse;
        }
        match self.finish_reason.as_deref() {
            Some("STOP") | None => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") => {
                FinishReason::ContentFilter
            }
            Some(_) => FinishReason::Other,
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream_step(&self, request: &GenerationRequest<'_>) -> Result<StepStream> {
        let body = Self::build_request_body(request);
        tracing::debug!(model = %request.options.model, "calling Gemini API");

        let response = self
            .client
            .post(self.stream_url(&request.options.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider(format!(
                "Gemini API error (HTTP {status}): {text}"
            )));
        }

        let (tx, rx) = mpsc::channel(64);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            let mut tracker = StepTracker::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(AgentError::Provider(e.to_string()))).await;
                        return;
                    }
                };
                for payload in decoder.push(&chunk) {
                    match tracker.events(&payload) {
                        Ok(events) => {
                            for event in events {
                                if tx.send(Ok(event)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }

            let _ = tx.send(Ok(StepEvent::Finish(tracker.finish()))).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
