//! Clockchain Core
//!
//! This crate provides the moment graph, its storage backends and the
//! generation job pipeline behind the Clockchain "temporal causal graph" of
//! historical events.
//!
//! # Architecture
//!
//! - **Path-addressed moments**: every event is keyed by
//!   `/{year}/{month}/{day}/{time}/{country}/{region}/{city}/{slug}`
//! - **Content fingerprints**: a SHA-256 digest over the canonical fields,
//!   stamped on every write
//! - **Auto-linking**: each write infers contemporaneous, same-location and
//!   thematic edges against the existing graph
//! - **Pluggable storage**: in-memory adjacency maps or an embedded libsql file
//!
//! # Modules
//!
//! - [`models`] - Data structures (Moment, Edge, Job)
//! - [`utils`] - Path codec and content fingerprint
//! - [`db`] - Storage backends with libsql integration
//! - [`services`] - GraphStore, AutoLinker, JobPipeline and collaborators
//! - [`config`] - Environment-driven runtime configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::{ClockchainConfig, ConfigError};
pub use models::*;
pub use services::*;
