//! Startup configuration read from the environment

use agent_core::{AgentError, Result, reasoning::DEFAULT_MAX_STEPS};

pub const API_KEY_VAR: &str = "GOOGLE_GENERATIVE_AI_API_KEY";
pub const MODEL_VAR: &str = "AGENT_MODEL";
pub const MAX_STEPS_VAR: &str = "AGENT_MAX_STEPS";
pub const FS_SERVER_COMMAND_VAR: &str = "AGENT_FS_SERVER_COMMAND";

const DEFAULT_FS_SERVER_COMMAND: &str = "npx";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CliConfig {
    pub api_key: String,
    pub model: String,
    pub max_steps: usize,

    /// Launcher for the filesystem tool server
    pub fs_server_command: String,
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_blank = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key =
            non_blank(API_KEY_VAR).ok_or_else(|| AgentError::Config(format!("{API_KEY_VAR} not set")))?;
        let model = non_blank(MODEL_VAR).ok_or_else(|| AgentError::Config(format!("{MODEL_VAR} not set")))?;

        let max_steps = match non_blank(MAX_STEPS_VAR) {
            None => DEFAULT_MAX_STEPS,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AgentError::Config(format!("{MAX_STEPS_VAR} must be a positive integer, got '{raw}'"))
                })?,
        };

        let fs_server_command =
            non_blank(FS_SERVER_COMMAND_VAR).unwrap_or_else(|| DEFAULT_FS_SERVER_COMMAND.into());

        Ok(Self {
            api_key,
            model,
            max_steps,
            fs_server_command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<CliConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        CliConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[(API_KEY_VAR, "key"), (MODEL_VAR, "gemini-2.5-pro")]).unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.fs_server_command, "npx");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            (API_KEY_VAR, "key"),
            (MODEL_VAR, "m"),
            (MAX_STEPS_VAR, "5"),
            (FS_SERVER_COMMAND_VAR, "bunx"),
        ])
        .unwrap();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.fs_server_command, "bunx");
    }

    #[test]
    fn test_missing_required() {
        assert!(matches!(config(&[(MODEL_VAR, "m")]), Err(AgentError::Config(msg)) if msg.contains(API_KEY_VAR)));
        assert!(matches!(config(&[(API_KEY_VAR, "  "), (MODEL_VAR, "m")]), Err(AgentError::Config(_))));
        assert!(matches!(config(&[(API_KEY_VAR, "key")]), Err(AgentError::Config(msg)) if msg.contains(MODEL_VAR)));
    }

    #[test]
    fn test_bad_max_steps() {
        for raw in ["0", "-1", "many"] {
            let result = config(&[(API_KEY_VAR, "key"), (MODEL_VAR, "m"), (MAX_STEPS_VAR, raw)]);
            assert!(matches!(result, Err(AgentError::Config(_))), "{raw}");
        }
    }
}
