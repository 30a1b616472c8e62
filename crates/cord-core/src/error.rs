//! Error types for Cord

use crate::types::{NodeId, Status};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid status: {id} is {status}")]
    InvalidStatus { id: NodeId, status: Status },

    #[error("invalid needs: {reference} is outside the permissible set for a child of {parent}")]
    InvalidNeeds { parent: NodeId, reference: NodeId },

    #[error("conflict: concurrent transition beat this caller on {0}")]
    Conflict(NodeId),

    #[error("authority denied: {caller} {rule}")]
    AuthorityDenied { caller: NodeId, rule: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn authority_denied(caller: NodeId, rule: impl Into<String>) -> Self {
        Self::AuthorityDenied {
            caller,
            rule: rule.into(),
        }
    }

    pub fn invalid_status(id: NodeId, status: Status) -> Self {
        Self::InvalidStatus { id, status }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Stable wire kind for the tool-error taxonomy.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::InvalidStatus { .. } => "invalid_status",
            Error::InvalidNeeds { .. } => "invalid_needs",
            Error::Conflict(_) => "conflict",
            Error::AuthorityDenied { .. } => "authority_denied",
            Error::Storage(_) | Error::Io(_) | Error::Json(_) => "internal",
        }
    }
}
