//! # agent-core
//!
//! Turn loop and human-in-the-loop tool execution for an interactive terminal agent.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Agent                                │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐   │
//! │  │  Turn Loop  │──│ ToolExecutor │──│ ConfirmationGate       │   │
//! │  │             │  │              │  │ (Console, y/n)         │   │
//! │  └─────────────┘  └──────────────┘  └────────────────────────┘   │
//! │         │                 │                                      │
//! │  ┌─────────────┐  ┌──────────────┐                               │
//! │  │ LlmProvider │  │ ToolRegistry │  Local + Remote tools         │
//! │  │ (Strategy)  │  │              │                               │
//! │  └─────────────┘  └──────────────┘                               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `Conversation` is owned by the caller and passed into each turn; the
//! agent itself holds no history.

pub mod console;
pub mod error;
pub mod executor;
pub mod gate;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod tool;

pub use console::Console;
pub use error::{AgentError, Result};
pub use executor::ToolExecutor;
pub use gate::{ConfirmationGate, ConsoleGate, ScriptedGate, is_affirmative};
pub use message::{Conversation, Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentBuilder, AgentConfig, TurnOutcome};
pub use tool::{
    ParamType, ParameterSchema, RegisteredTool, Tool, ToolArguments, ToolCall, ToolOutcome,
    ToolRegistry, ToolResult, ToolSchema, ValidationError,
};
