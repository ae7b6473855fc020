//! Database Layer
//!
//! Persistence for the moment graph behind the [`GraphBackend`] trait:
//!
//! - [`MemoryBackend`]: in-process adjacency maps (tests, ephemeral runs)
//! - [`TursoBackend`]: libsql/SQLite file via [`DatabaseService`]
//!
//! Graph semantics (fingerprints, auto-linking, visibility) sit above this
//! layer in `services::GraphStore`, so every backend behaves the same.

mod database;
mod error;
mod graph_backend;
mod memory_store;
mod turso_store;

pub use database::{DatabaseService, DbMomentParams, DbMomentQuery, EdgeEndpoint};
pub use error::DatabaseError;
pub use graph_backend::GraphBackend;
pub use memory_store::MemoryBackend;
pub use turso_store::TursoBackend;
