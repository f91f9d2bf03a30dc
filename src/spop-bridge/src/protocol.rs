//! spop wire vocabulary.
//!
//! Requests are a verb followed by space separated arguments, one per line.
//! The daemon answers every request with exactly one line, usually a JSON
//! object.

use serde_json::Value;
use std::fmt;

/// Token written on the status connection to wait for the next state change.
pub const REARM: &str = "idle";

/// Commands the bridge sends over the command connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the daemon's library.
    List,
    /// Clear the queue, queue one track and start playing it.
    Play { uri: String },
    /// Append a track to the queue.
    Add { uri: String },
    Stop,
    /// Flip between playing and paused.
    Toggle,
    /// One-shot status snapshot.
    Status,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::List => "ls",
            Command::Play { .. } => "uplay",
            Command::Add { .. } => "uadd",
            Command::Stop => "stop",
            Command::Toggle => "toggle",
            Command::Status => "status",
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            Command::Play { uri } | Command::Add { uri } => std::slice::from_ref(uri),
            _ => &[],
        }
    }

    /// The full request line, terminator included.
    pub fn to_line(&self) -> String {
        let mut line = self.to_string();
        line.push('\n');
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Extract the daemon's complaint from a response of the form `{"error": "..."}`.
pub fn rejection(response: &str) -> Option<String> {
    let value: Value = serde_json::from_str(response).ok()?;
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}
