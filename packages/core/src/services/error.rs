//! Service Layer Error Types
//!
//! Typed errors for graph operations, generation calls and job handling.
//! Backend failures arrive as `anyhow::Error` and are wrapped, not flattened.

use crate::models::JobStatus;
use crate::utils::path_codec::PathError;
use thiserror::Error;
use uuid::Uuid;

/// Graph store errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// Node not found by path
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// Edge type outside the known set
    #[error("Invalid edge type '{edge_type}' (expected causes, contemporaneous, same_location or thematic)")]
    InvalidEdgeType { edge_type: String },

    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// A document handed to ingest/import could not be read
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Storage backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl GraphError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn invalid_edge_type(edge_type: impl Into<String>) -> Self {
        Self::InvalidEdgeType {
            edge_type: edge_type.into(),
        }
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures talking to the generation service
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Request never produced a response (connect, timeout, TLS)
    #[error("Generation request failed: {0}")]
    Transport(String),

    /// Non-success status; `excerpt` holds the start of the response body
    #[error("Generation service returned {status} | response: {excerpt}")]
    Upstream { status: u16, excerpt: String },

    /// Response body was not a usable generation result
    #[error("Malformed generation result: {0}")]
    Malformed(String),
}

impl GenerationError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn upstream(status: u16, excerpt: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            excerpt: excerpt.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Job pipeline errors
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {id}")]
    NotFound { id: Uuid },

    /// `process` was called on a job that already left `pending`
    #[error("Job {id} already started (status: {status})")]
    AlreadyStarted { id: Uuid, status: JobStatus },

    /// The content judge refused the query
    #[error("Query rejected: {reason}")]
    Rejected { reason: String },

    #[error("Content screening failed: {0}")]
    Screening(#[source] anyhow::Error),
}

impl JobError {
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound { id }
    }

    pub fn already_started(id: Uuid, status: JobStatus) -> Self {
        Self::AlreadyStarted { id, status }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}
