//! Confirmation Gate
//!
//! Every tool call stops here before it may touch anything. The answer comes
//! back as raw text: anything other than `y` is a refusal, and the text of
//! that refusal is handed to the model as feedback.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::console::Console;
use crate::error::Result;

/// The only answer that lets a tool run (compared case-insensitively)
pub const AFFIRMATIVE: &str = "y";

/// Whether a gate answer approves the action
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case(AFFIRMATIVE)
}

/// Human approval checkpoint
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// Block until the user answers; returns the raw answer
    async fn confirm(&self, description: &str) -> Result<String>;
}

/// Gate that asks on the shared terminal
pub struct ConsoleGate {
    console: Arc<Console>,
}

impl ConsoleGate {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl ConfirmationGate for ConsoleGate {
    async fn confirm(&self, description: &str) -> Result<String> {
        let prompt = format!("{description} (y/n) ");
        // End of input declines with no feedback.
        let answer = self.console.read_line(&prompt).await?.unwrap_or_default();
        tracing::debug!(approved = is_affirmative(&answer), "confirmation answered");
        Ok(answer)
    }
}

/// Gate that answers from a fixed script and records what it was asked
///
/// Once the script runs out every further request is declined with an empty
/// answer.
#[derive(Default)]
pub struct ScriptedGate {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedGate {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Descriptions received so far, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ConfirmationGate for ScriptedGate {
    async fn confirm(&self, description: &str) -> Result<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(description.to_string());
        }
        let answer = self
            .answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or_default();
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_affirmative_token() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative("Y"));
        assert!(is_affirmative(" y "));
        assert!(!is_affirmative("yes"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("no, use ls -la instead"));
    }

    #[tokio::test]
    async fn test_console_gate_prompt_and_raw_answer() {
        let input = std::io::Cursor::new(b"please use the src dir\n".to_vec());
        let (writer, mut output) = tokio::io::duplex(1024);
        let gate = ConsoleGate::new(Arc::new(Console::new(input, writer)));

        let answer = gate.confirm("Read this file? notes.txt").await.unwrap();
        assert_eq!(answer, "please use the src dir");

        // Input exhausted: an empty decline.
        assert_eq!(gate.confirm("Again?").await.unwrap(), "");
        drop(gate);

        let mut written = String::new();
        output.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "Read this file? notes.txt (y/n) Again? (y/n) ");
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_do_not_interleave() {
        let input = std::io::Cursor::new(b"y\nn\ny\n".to_vec());
        let (writer, mut output) = tokio::io::duplex(1024);
        let gate = ConsoleGate::new(Arc::new(Console::new(input, writer)));

        let (a, b, c) = tokio::join!(gate.confirm("A?"), gate.confirm("B?"), gate.confirm("C?"));
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), ("y".into(), "n".into(), "y".into()));
        drop(gate);

        let mut written = String::new();
        output.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "A? (y/n) B? (y/n) C? (y/n) ");
    }

    #[tokio::test]
    async fn test_scripted_gate_runs_dry() {
        let gate = ScriptedGate::new(["y"]);
        assert_eq!(gate.confirm("first").await.unwrap(), "y");
        assert_eq!(gate.confirm("second").await.unwrap(), "");
        assert_eq!(gate.asked(), ["first", "second"]);
    }
}
