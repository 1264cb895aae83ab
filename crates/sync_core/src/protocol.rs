//! Wire messages exchanged between the page-side extraction run and the host.
//!
//! Events flow page -> host, commands flow host -> page. Both are JSON objects
//! discriminated by a lowercase `type` field. Record payloads inside `data`
//! events stay untyped here; [`crate::parse_record`] validates them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptEvent {
    Initialized,
    Progress { total: u64, current: u64 },
    Data { data: serde_json::Value },
    Complete { message: String, total: u64 },
    Error { message: String },
    Paused,
    Resumed,
    Stopped,
}

impl ScriptEvent {
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|err| ProtocolError::Malformed(err.to_string()))
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|err| ProtocolError::Malformed(err.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScriptEvent::Initialized => "initialized",
            ScriptEvent::Progress { .. } => "progress",
            ScriptEvent::Data { .. } => "data",
            ScriptEvent::Complete { .. } => "complete",
            ScriptEvent::Error { .. } => "error",
            ScriptEvent::Paused => "paused",
            ScriptEvent::Resumed => "resumed",
            ScriptEvent::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

impl ScriptCommand {
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|err| ProtocolError::Malformed(err.to_string()))
    }

    pub fn encode(&self) -> String {
        match self {
            ScriptCommand::Start => r#"{"type":"start"}"#,
            ScriptCommand::Pause => r#"{"type":"pause"}"#,
            ScriptCommand::Resume => r#"{"type":"resume"}"#,
            ScriptCommand::Stop => r#"{"type":"stop"}"#,
        }
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed protocol message: {0}")]
    Malformed(String),
    #[error("unexpected {kind} message: {reason}")]
    Unexpected { kind: &'static str, reason: String },
}
