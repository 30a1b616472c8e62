//! Tool-server wire protocol: length-framed JSON-RPC style messages.
//!
//! Wire format, one JSON document per length-delimited frame:
//!
//! Agent -> Server (tool request):
//!   { "id": 7, "method": "create", "params": { "goal": "...", "prompt": "..." } }
//!
//! Server -> Agent (tool response):
//!   { "id": 7, "result": { "id": 4 } }
//!   { "id": 7, "error": { "kind": "authority_denied", "message": "..." } }
//!
//! Each tool-server instance is single-client: the agent it was spawned for.
//! The caller's identity is a property of which server it connected to, never
//! a request parameter.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Largest frame either side will accept.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Tool request from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Tool response to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResponse {
    /// Successful response with a result value.
    pub fn ok(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn err(id: u64, error: ToolError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Structured tool error. `kind` is the closed taxonomy surfaced to agents:
/// not_found, authority_denied, invalid_status, invalid_needs, conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: String,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a malformed or unparseable request.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", message)
    }

    /// Shorthand for an unknown tool name.
    pub fn method_not_found(method: &str) -> Self {
        Self::new("method_not_found", format!("unknown tool: {}", method))
    }
}

impl From<&Error> for ToolError {
    fn from(e: &Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<Error> for ToolError {
    fn from(e: Error) -> Self {
        Self::from(&e)
    }
}
