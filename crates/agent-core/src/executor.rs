//! Tool Executor
//!
//! Validate, confirm, execute. Whatever happens, the caller gets a
//! `ToolResult`; nothing raised inside a tool escapes this boundary.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;

use crate::gate::{ConfirmationGate, is_affirmative};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Runs tool calls behind the confirmation gate
#[derive(Clone)]
pub struct ToolExecutor {
    gate: Arc<dyn ConfirmationGate>,
}

impl ToolExecutor {
    pub fn new(gate: Arc<dyn ConfirmationGate>) -> Self {
        Self { gate }
    }

    /// Invoke one tool for one call
    pub async fn invoke(&self, tool: &dyn Tool, call: &ToolCall) -> ToolResult {
        let args = match tool.schema().validate(&call.arguments) {
            Ok(args) => args,
            Err(err) => {
                tracing::debug!(tool = %call.name, error = %err, "tool arguments rejected");
                return ToolResult::failed(call, format!("Invalid arguments: {err}"));
            }
        };

        let answer = match self.gate.confirm(&tool.describe(&args)).await {
            Ok(answer) => answer,
            Err(err) => return ToolResult::failed(call, format!("Confirmation failed: {err}")),
        };
        if !is_affirmative(&answer) {
            tracing::debug!(tool = %call.name, "tool call declined");
            return ToolResult::cancelled(call, answer);
        }

        tracing::debug!(tool = %call.name, id = %call.id, "executing tool");
        match AssertUnwindSafe(tool.execute(&args)).catch_unwind().await {
            Ok(Ok(output)) => ToolResult::success(call, output),
            Ok(Err(err)) => ToolResult::failed(call, err.to_string()),
            Err(_) => ToolResult::failed(call, "tool panicked during execution"),
        }
    }

    /// Resolve a call by name and invoke it
    pub async fn execute_call(&self, registry: &ToolRegistry, call: &ToolCall) -> ToolResult {
        match registry.lookup(&call.name) {
            Ok(entry) => self.invoke(entry.tool().as_ref(), call).await,
            Err(err) => ToolResult::failed(call, err.to_string()),
        }
    }

    /// Run independent calls concurrently; results come back in request order
    pub async fn execute_all(&self, registry: &ToolRegistry, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.execute_call(registry, call))).await
    }
}
