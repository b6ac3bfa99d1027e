//! Conversation Messages
//!
//! Standard message format used across the agent system, and the append-only
//! conversation history the turn loop reads and extends.

use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One structured piece of an assistant or tool message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult {
        call_id: String,
        name: String,
        output: String,
    },
}

/// Message body: plain text, or parts when tool data rides along
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Message body
    pub content: MessageContent,
}

impl Message {
    /// Create a new text message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant step that requested tools. Text emitted before the calls is kept.
    pub fn assistant_tool_calls(text: &str, calls: &[ToolCall]) -> Self {
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::Text { text: text.to_string() });
        }
        parts.extend(calls.iter().cloned().map(ContentPart::ToolCall));
        Self {
            role: Role::Assistant,
            content: MessageContent::Parts(parts),
        }
    }

    /// Create a tool result message
    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Parts(vec![ContentPart::ToolResult {
                call_id: result.call_id.clone(),
                name: result.name.clone(),
                output: result.to_text(),
            }]),
        }
    }

    /// Concatenated text of the message, ignoring tool parts
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Tool calls carried by this message
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolCall(call) => Some(call),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Append-only conversation history
///
/// Messages are never edited or removed once appended. The store lives as long
/// as the process; nothing is persisted.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation with exactly one system message
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.append(Message::system(prompt));
        conv
    }

    /// Add a message
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Full ordered history for the next generation request
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolOutcome;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn test_conversation() {
        let mut conv = Conversation::with_system_prompt("You are helpful.");
        conv.append(Message::user("Hi"));
        conv.append(Message::assistant("Hello!"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.snapshot()[0].role, Role::System);
        assert_eq!(conv.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_assistant_tool_calls_keeps_text_and_order() {
        let calls = vec![
            ToolCall::with_id("a", "read_file", serde_json::json!({"path": "a.txt"})),
            ToolCall::with_id("b", "read_file", serde_json::json!({"path": "b.txt"})),
        ];
        let msg = Message::assistant_tool_calls("Let me look.", &calls);

        assert_eq!(msg.text(), "Let me look.");
        let ids: Vec<_> = msg.tool_calls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let bare = Message::assistant_tool_calls("", &calls);
        assert!(matches!(&bare.content, MessageContent::Parts(p) if p.len() == 2));
    }

    #[test]
    fn test_tool_result_message_is_text_payload() {
        let result = ToolResult {
            call_id: "c1".into(),
            name: "shell".into(),
            outcome: ToolOutcome::Success("ok".into()),
        };
        let msg = Message::tool_result(&result);
        assert_eq!(msg.role, Role::Tool);
        match &msg.content {
            MessageContent::Parts(parts) => assert_eq!(
                parts[0],
                ContentPart::ToolResult {
                    call_id: "c1".into(),
                    name: "shell".into(),
                    output: "ok".into(),
                }
            ),
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }
}
