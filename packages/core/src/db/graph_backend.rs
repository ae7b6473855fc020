//! GraphBackend Trait - Storage Abstraction Layer
//!
//! This module defines the `GraphBackend` trait that abstracts moment and edge
//! persistence. Two implementations exist:
//!
//! - [`MemoryBackend`](crate::db::MemoryBackend): adjacency maps behind a lock
//! - [`TursoBackend`](crate::db::TursoBackend): libsql tables
//!
//! # Design Decisions
//!
//! 1. **No business logic**: fingerprint stamping, auto-linking and visibility
//!    rules live in `GraphStore`, above this boundary, so both backends behave
//!    identically
//! 2. **Plain persistence**: `put_node` is a raw upsert, `insert_edge` a raw
//!    insert-if-absent; callers validate first
//! 3. **Error Handling**: Uses `anyhow::Result` for flexible error context
//!
//! # Examples
//!
//! ```rust,no_run
//! use clockchain_core::db::{GraphBackend, MemoryBackend};
//! use clockchain_core::models::Moment;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend: Arc<dyn GraphBackend> = Arc::new(MemoryBackend::new());
//!     backend.put_node(Moment::new("/1969/july/20/2056/usa/florida/cape-canaveral/apollo-11")).await?;
//!     assert_eq!(backend.count_nodes().await?, 1);
//!     Ok(())
//! }
//! ```

use crate::models::{Edge, EdgeType, Moment, MomentFilter};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Persistence operations for the moment graph
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single instance is shared by the
/// store, the job pipeline and the daily worker.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    //
    // NODES
    //

    /// Insert or replace a moment keyed by its path
    ///
    /// Replacing a moment must not drop edges attached to it.
    async fn put_node(&self, moment: Moment) -> Result<()>;

    async fn get_node(&self, path: &str) -> Result<Option<Moment>>;

    /// All moments matching `filter`, ordered by path
    async fn list_nodes(&self, filter: &MomentFilter) -> Result<Vec<Moment>>;

    async fn count_nodes(&self) -> Result<usize>;

    //
    // EDGES
    //

    /// Insert an edge unless its `(source, target, type)` key already exists
    ///
    /// Returns `true` when a new edge was written. Both endpoints must exist.
    async fn insert_edge(&self, edge: Edge) -> Result<bool>;

    async fn has_edge(&self, source: &str, target: &str, edge_type: EdgeType) -> Result<bool>;

    /// Edges whose source is `path`
    async fn outgoing_edges(&self, path: &str) -> Result<Vec<Edge>>;

    /// Edges whose target is `path`
    async fn incoming_edges(&self, path: &str) -> Result<Vec<Edge>>;

    async fn count_edges(&self) -> Result<usize>;

    /// Edge counts keyed by type name (types with no edges are omitted)
    async fn edge_type_counts(&self) -> Result<BTreeMap<String, usize>>;

    /// Incident edge count (in + out) for every stored moment, zero included
    async fn degrees(&self) -> Result<BTreeMap<String, usize>>;
}
