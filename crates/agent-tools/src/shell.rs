//! Shell Tool
//!
//! Runs a command line through the platform shell. The command and its
//! arguments are joined with single spaces; nothing is quoted or escaped.

use async_trait::async_trait;
use tokio::process::Command;

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolArguments, ToolSchema};

use crate::error::{Result, ToolError};

/// Tool for running shell commands
pub struct ShellTool;

/// Join a command and its arguments into one command line
pub fn command_line(command: &str, args: &[&str]) -> String {
    std::iter::once(command)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}

async fn run(line: &str, cwd: Option<&str>) -> Result<String> {
    let mut cmd = shell_command(line);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(ToolError::Spawn)?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(ToolError::CommandFailed {
            status: output.status.to_string(),
            output: text,
        });
    }
    if text.is_empty() {
        text.push_str("(no output)");
    }
    Ok(text)
}

#[async_trait]
impl Tool for ShellTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "shell".into(),
            description: "A shell command executor. You can use it to run shell commands. Returns the output of the command.".into(),
            parameters: vec![
                ParameterSchema::required("command", ParamType::String, "Command to run").non_empty(),
                ParameterSchema::optional("args", ParamType::StringArray, "Arguments appended to the command"),
                ParameterSchema::optional("cwd", ParamType::String, "Working directory for the command"),
            ],
        }
    }

    fn describe(&self, args: &ToolArguments) -> String {
        let line = command_line(args.opt_str("command").unwrap_or_default(), &args.str_list("args"));
        format!("Are you sure you want to run this command? {line}")
    }

    async fn execute(&self, args: &ToolArguments) -> CoreResult<String> {
        let line = command_line(args.str("command")?, &args.str_list("args"));
        tracing::debug!(command = %line, "running shell command");
        Ok(run(&line, args.opt_str("cwd")).await?)
    }
}
