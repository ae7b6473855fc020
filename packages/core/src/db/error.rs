//! Errors from the libsql moment database
//!
//! Only storage failures live here. A missing moment or an unknown edge kind
//! is a graph concern and is reported through `services::error::GraphError`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cannot open moment database {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Table, index or pragma setup failed
    #[error("Moment schema setup failed: {0}")]
    InitializationFailed(String),

    /// The database directory could not be created for lack of permission
    #[error("No permission to create the moment database at {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Cannot create the moment database directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("libsql: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// A statement failed; `context` names the statement
    #[error("Query failed: {context}")]
    SqlExecutionError { context: String },

    /// The `properties` JSON of a row no longer reads as a moment
    #[error("Stored moment '{id}' is unreadable: {reason}")]
    CorruptRecord { id: String, reason: String },
}

impl DatabaseError {
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    pub fn corrupt_record(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
