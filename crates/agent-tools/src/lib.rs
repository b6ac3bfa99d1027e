//! # agent-tools
//!
//! Local tools for the terminal agent: one shell executor and five
//! filesystem operations. All of them implement `agent_core::Tool` and
//! rely on the executor's confirmation gate to run.
//!
//! | tool | effect |
//! |---|---|
//! | `shell` | run a command line, return stdout + stderr |
//! | `list_directory` | JSON list of `{name, isDirectory}` |
//! | `read_file` | file content |
//! | `write_file` | create parents, overwrite file |
//! | `create_directory` | recursive mkdir, existing dir is fine |
//! | `edit_file` | first literal occurrence replace |

pub mod error;
pub mod filesystem;
pub mod shell;

pub use error::{Result, ToolError};
pub use filesystem::{CreateDirectoryTool, EditFileTool, ListDirectoryTool, ReadFileTool, WriteFileTool};
pub use shell::ShellTool;

use agent_core::ToolRegistry;

/// Register every local tool
pub fn register_local_tools(registry: &mut ToolRegistry) -> agent_core::Result<()> {
    registry.register_local(ShellTool)?;
    registry.register_local(ListDirectoryTool)?;
    registry.register_local(ReadFileTool)?;
    registry.register_local(WriteFileTool)?;
    registry.register_local(CreateDirectoryTool)?;
    registry.register_local(EditFileTool)?;
    Ok(())
}
