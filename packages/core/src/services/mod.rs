//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `GraphStore` - Moment graph operations over a pluggable backend
//! - `AutoLinker` - Edge inference run on every node write
//! - `JobPipeline` - Query-to-moment generation jobs
//! - `FlashClient` - HTTP client for the external scene renderer
//! - `SceneStore` - On-disk archive of raw generation results
//! - `DailyWorker` - Periodic "today in history" generation
//!
//! Services coordinate between the database layer and application logic,
//! implementing business rules and orchestrating complex operations.

pub mod auto_linker;
pub mod collaborators;
pub mod daily_worker;
pub mod error;
pub mod generation;
pub mod graph_store;
pub mod ingest;
pub mod job_pipeline;
pub mod scene_store;

pub use auto_linker::{AutoLinker, InferredLink};
pub use collaborators::{ContentJudge, ExpansionDraft, GraphExpander, MomentBrief, Verdict};
pub use daily_worker::{DailyWorker, DailyWorkerConfig, DailyWorkerHandle};
pub use error::{GenerationError, GraphError, JobError};
pub use generation::{FlashClient, GenerationClient, GenerationRequest, GenerationResult};
pub use graph_store::GraphStore;
pub use ingest::{
    ImportSummary, IndexRequest, IngestSummary, NodeLinkDocument, SubgraphDocument,
};
pub use job_pipeline::{JobHandle, JobPipeline};
pub use scene_store::SceneStore;
