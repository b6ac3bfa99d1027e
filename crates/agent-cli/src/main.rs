//! Terminal agent
//!
//! Reads user turns from stdin, streams the model's answer to stdout and
//! asks before every tool call. Local tools run in-process; filesystem
//! tools also come from an MCP server confined to the working directory.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{Agent, AgentBuilder, AgentError, ToolRegistry};
use agent_runtime::{GeminiConfig, GeminiProvider, McpClient, McpServerConfig};

use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr; stdout carries the conversation.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let config = CliConfig::from_env().map_err(fatal)?;
    let cwd = std::env::current_dir().context("failed to resolve the working directory")?;

    let mcp = McpClient::connect(&McpServerConfig::filesystem(&config.fs_server_command, &cwd))
        .await
        .map_err(fatal)?;

    let agent = match assemble(&config, &mcp).await {
        Ok(agent) => agent,
        Err(err) => {
            mcp.close().await;
            return Err(fatal(err));
        }
    };

    tracing::info!(
        model = %agent.config().generation.model,
        tools = agent.tools().len(),
        max_steps = agent.config().max_steps,
        remote_server = mcp.name(),
        "agent ready"
    );

    let mut conversation = agent.new_conversation();
    let result = tokio::select! {
        result = agent.run_interactive(&mut conversation) => result,
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            mcp.close().await;
            // A pending stdin read would otherwise hold the runtime open.
            std::process::exit(0);
        }
    };

    mcp.close().await;
    result.map_err(fatal)
}

/// Build the registry and the agent around a connected MCP client
async fn assemble(config: &CliConfig, mcp: &McpClient) -> agent_core::Result<Agent> {
    let mut tools = ToolRegistry::new();
    agent_tools::register_local_tools(&mut tools)?;
    for tool in mcp.list().await? {
        tools.register_remote(Arc::new(tool))?;
    }
    for name in tools.names() {
        tracing::debug!(tool = name, "registered");
    }

    let provider = GeminiProvider::new(GeminiConfig::new(config.api_key.clone()));

    AgentBuilder::new()
        .provider(Arc::new(provider))
        .tools(tools)
        .model(config.model.clone())
        .max_steps(config.max_steps)
        .build()
}

/// Fatal errors print the friendly message with the raw cause beneath it
fn fatal(err: AgentError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
