//! # agent-runtime
//!
//! Collaborators for the terminal agent.
//!
//! ## Providers
//!
//! - **Gemini** (default): streaming `generateContent` with function calling
//!
//! ## Remote tools
//!
//! - **MCP**: stdio client that spawns a tool server and exposes its tools
//!   as `<server>__<tool>`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{GeminiConfig, GeminiProvider, McpClient, McpServerConfig};
//!
//! let provider = GeminiProvider::new(GeminiConfig::new(api_key));
//! let mcp = McpClient::connect(&McpServerConfig::filesystem("npx", &cwd)).await?;
//! for tool in mcp.list().await? {
//!     registry.register_remote(Arc::new(tool))?;
//! }
//! ```

#[cfg(feature = "gemini")]
pub mod gemini;
pub mod mcp;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiProvider};
pub use mcp::{McpClient, McpServerConfig, RemoteTool};
