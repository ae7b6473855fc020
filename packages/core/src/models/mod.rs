//! Data Models
//!
//! This module contains the core data structures used throughout Clockchain:
//!
//! - `Moment` - A dated, located event addressed by its hierarchical path
//! - `Edge` - Directional relationship between two moments
//! - `Job` - In-memory generation request tracked by the job pipeline
//!
//! Query result shapes (browse entries, search hits, neighbors, stats) live
//! alongside the edge model.

mod edge;
mod job;
mod moment;

pub use edge::{
    BrowseEntry, Direction, Edge, EdgeAttrs, EdgeRecord, EdgeType, GraphStats, Neighbor,
    SearchHit,
};
pub use job::{Job, JobStatus, DEFAULT_PRESET};
pub use moment::{Moment, MomentFilter, MomentPatch, Visibility};
