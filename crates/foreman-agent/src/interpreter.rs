//! The command-interpreter capability: a synchronous, side-effecting
//! collaborator that executes one textual command per invocation.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::AgentError;

#[async_trait]
pub trait CommandInterpreter: Send + Sync {
    async fn run(&self, command: &str) -> Result<String, AgentError>;
}

/// Working-set interpreter backed by an in-memory file list. Suitable for
/// tests and for embedders that track context membership themselves.
#[derive(Debug, Default)]
pub struct InMemoryInterpreter {
    files: Mutex<BTreeSet<String>>,
}

impl InMemoryInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> BTreeSet<String> {
        self.files.lock().expect("working set mutex poisoned").clone()
    }
}

#[async_trait]
impl CommandInterpreter for InMemoryInterpreter {
    async fn run(&self, command: &str) -> Result<String, AgentError> {
        let mut files = self.files.lock().expect("working set mutex poisoned");
        if let Some(path) = command.strip_prefix("/add ") {
            let path = path.trim();
            if path.is_empty() {
                return Err(AgentError::Interpreter("/add requires a path".to_string()));
            }
            files.insert(path.to_string());
            return Ok(format!("Added {path} to the chat"));
        }
        if let Some(path) = command.strip_prefix("/drop ") {
            let path = path.trim();
            if !files.remove(path) {
                return Ok(format!("{path} was not in the chat"));
            }
            return Ok(format!("Removed {path} from the chat"));
        }
        if command.trim() == "/ls" {
            if files.is_empty() {
                return Ok("No files in chat".to_string());
            }
            let listing: Vec<&str> = files.iter().map(String::as_str).collect();
            return Ok(format!("Files in chat:\n{}", listing.join("\n")));
        }
        Err(AgentError::Interpreter(format!(
            "unrecognized command: {command}"
        )))
    }
}
