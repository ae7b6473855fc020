//! Graph Store - Moment Graph Business Logic
//!
//! This module sits between callers and a [`GraphBackend`]:
//!
//! - Fingerprint stamping on every write path
//! - Auto-linking on `upsert_node`
//! - Visibility-scoped reads (browse, search, today, random)
//! - Unscoped reads (`get_node`, `neighbors`); access control on private
//!   moments is the caller's job
//!
//! # Concurrency
//!
//! All mutations (`upsert_node`, `add_edge`, `update_node` and the auto-link
//! scan) go through one writer lock, so a scan always sees a stable node set
//! and two writers cannot race the fingerprint stamp. Reads do not take the
//! lock and may observe a write in progress.
//!
//! # Examples
//!
//! ```rust,no_run
//! use clockchain_core::db::MemoryBackend;
//! use clockchain_core::models::Moment;
//! use clockchain_core::services::GraphStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = GraphStore::new(Arc::new(MemoryBackend::new()));
//!     let stored = store
//!         .upsert_node(Moment::new("/1969/july/20/2056/usa/florida/cape-canaveral/apollo-11"))
//!         .await?;
//!     assert_eq!(stored.tdf_hash.len(), 64);
//!     Ok(())
//! }
//! ```

use crate::db::GraphBackend;
use crate::models::{
    BrowseEntry, Direction, Edge, EdgeAttrs, EdgeType, GraphStats, Moment, MomentFilter,
    MomentPatch, Neighbor, SearchHit, Visibility,
};
use crate::services::auto_linker::AutoLinker;
use crate::services::error::GraphError;
use crate::utils::fingerprint::fingerprint;
use chrono::Utc;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const NAME_MATCH_SCORE: f64 = 1.0;
pub const ONE_LINER_MATCH_SCORE: f64 = 0.7;
pub const OTHER_MATCH_SCORE: f64 = 0.4;

/// Default `limit` for [`GraphStore::search`]
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Default `min_layer` for [`GraphStore::random_public`]
pub const DEFAULT_RANDOM_MIN_LAYER: u32 = 1;

/// Default `threshold` for [`GraphStore::frontier_nodes`]
pub const DEFAULT_FRONTIER_THRESHOLD: usize = 3;

pub struct GraphStore {
    backend: Arc<dyn GraphBackend>,
    linker: AutoLinker,
    /// Serializes every mutation on this store
    writer: Mutex<()>,
}

impl GraphStore {
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        Self {
            backend,
            linker: AutoLinker::new(),
            writer: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn GraphBackend> {
        &self.backend
    }

    fn stamp(moment: &mut Moment) {
        if moment.tdf_hash.trim().is_empty() {
            moment.tdf_hash = fingerprint(moment);
        }
    }

    //
    // WRITES
    //

    /// Insert or replace a moment keyed by its path, then auto-link it
    ///
    /// The fingerprint is computed when the caller did not supply one; a
    /// supplied fingerprint is kept verbatim. Repeating the same call is
    /// idempotent.
    pub async fn upsert_node(&self, mut moment: Moment) -> Result<Moment, GraphError> {
        Self::stamp(&mut moment);

        let _guard = self.writer.lock().await;
        self.backend.put_node(moment.clone()).await?;
        let linked = self.linker.link(self.backend.as_ref(), &moment).await?;
        if linked > 0 {
            tracing::debug!("Upserted {} with {} new auto-link edges", moment.path, linked);
        }

        Ok(moment)
    }

    /// Persist a moment without auto-linking (migrations and backfills)
    pub(crate) async fn put_unlinked(&self, mut moment: Moment) -> Result<Moment, GraphError> {
        Self::stamp(&mut moment);

        let _guard = self.writer.lock().await;
        self.backend.put_node(moment.clone()).await?;
        Ok(moment)
    }

    /// Add an explicit edge (insert-if-absent)
    ///
    /// Returns `true` when a new edge was written.
    ///
    /// # Errors
    ///
    /// - `InvalidEdgeType` when `edge_type` is not one of the four kinds
    /// - `NotFound` when either endpoint is missing
    pub async fn add_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: &str,
        attrs: EdgeAttrs,
    ) -> Result<bool, GraphError> {
        let edge_type: EdgeType = edge_type.parse().map_err(GraphError::invalid_edge_type)?;

        let _guard = self.writer.lock().await;
        for endpoint in [source, target] {
            if self.backend.get_node(endpoint).await?.is_none() {
                return Err(GraphError::not_found(endpoint));
            }
        }

        let edge = Edge::new(source, target, edge_type)
            .with_weight(attrs.weight)
            .with_theme(attrs.theme);
        Ok(self.backend.insert_edge(edge).await?)
    }

    /// Merge the given fields into an existing moment
    ///
    /// An empty patch changes nothing. Does not auto-link.
    pub async fn update_node(&self, path: &str, patch: MomentPatch) -> Result<Moment, GraphError> {
        let _guard = self.writer.lock().await;
        let mut moment = self
            .backend
            .get_node(path)
            .await?
            .ok_or_else(|| GraphError::not_found(path))?;

        if patch.is_empty() {
            return Ok(moment);
        }

        moment.apply(patch);
        Self::stamp(&mut moment);
        self.backend.put_node(moment.clone()).await?;
        Ok(moment)
    }

    /// Change visibility; going public also stamps `published_at`
    pub async fn publish(&self, path: &str, visibility: Visibility) -> Result<Moment, GraphError> {
        let mut patch = MomentPatch::new().with_visibility(visibility);
        if visibility.is_public() {
            patch = patch.with_published_at(Utc::now());
        }
        let moment = self.update_node(path, patch).await?;
        tracing::info!("Set visibility of {} to {}", path, visibility);
        Ok(moment)
    }

    //
    // UNSCOPED READS
    //

    pub async fn get_node(&self, path: &str) -> Result<Moment, GraphError> {
        self.backend
            .get_node(path)
            .await?
            .ok_or_else(|| GraphError::not_found(path))
    }

    /// Outgoing then incoming edges of `path`, each named after the other end
    ///
    /// Unknown paths yield an empty list.
    pub async fn neighbors(&self, path: &str) -> Result<Vec<Neighbor>, GraphError> {
        let outgoing = self.backend.outgoing_edges(path).await?;
        let incoming = self.backend.incoming_edges(path).await?;

        let mut neighbors = Vec::with_capacity(outgoing.len() + incoming.len());
        let sides = outgoing
            .into_iter()
            .map(|e| (Direction::Outgoing, e))
            .chain(incoming.into_iter().map(|e| (Direction::Incoming, e)));

        for (direction, edge) in sides {
            let other = match direction {
                Direction::Outgoing => edge.target,
                Direction::Incoming => edge.source,
            };
            let name = self
                .backend
                .get_node(&other)
                .await?
                .map(|m| m.name)
                .unwrap_or_default();
            neighbors.push(Neighbor {
                path: other,
                name,
                edge_type: edge.edge_type,
                weight: edge.weight,
                theme: edge.theme,
                direction,
            });
        }

        Ok(neighbors)
    }

    //
    // PUBLIC-ONLY READS
    //

    /// Child segments under `prefix` with the number of public moments below each
    ///
    /// A plain string prefix of the slash-trimmed path, so `"19"` matches
    /// `/1969/...` and yields the segment `"69"`. Results are sorted by segment.
    pub async fn browse(&self, prefix: &str) -> Result<Vec<BrowseEntry>, GraphError> {
        let prefix = prefix.trim_matches('/');
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();

        for moment in self.backend.list_nodes(&MomentFilter::public()).await? {
            let path = moment.path.trim_matches('/');
            let Some(remainder) = path.strip_prefix(prefix) else {
                continue;
            };

            let remainder = remainder.trim_matches('/');
            if remainder.is_empty() {
                continue;
            }
            let segment = remainder.split('/').next().unwrap_or(remainder);
            *counts.entry(segment.to_string()).or_insert(0) += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(segment, count)| BrowseEntry { segment, count })
            .collect())
    }

    /// Case-insensitive substring search over public moments
    ///
    /// Scored 1.0 for a name match, 0.7 for a one-liner match and 0.4 for a
    /// tag or figure match. Equal scores keep path order.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, GraphError> {
        let needle = query.to_lowercase();
        let mut hits: Vec<SearchHit> = Vec::new();

        for moment in self.backend.list_nodes(&MomentFilter::public()).await? {
            let contains = |text: &str| text.to_lowercase().contains(&needle);

            let score = if contains(&moment.name) {
                NAME_MATCH_SCORE
            } else if contains(&moment.one_liner) {
                ONE_LINER_MATCH_SCORE
            } else if moment.tags.iter().any(|t| contains(t))
                || moment.figures.iter().any(|f| contains(f))
            {
                OTHER_MATCH_SCORE
            } else {
                continue;
            };

            hits.push(SearchHit {
                path: moment.path,
                name: moment.name,
                one_liner: moment.one_liner,
                score,
            });
        }

        // Stable sort keeps encounter order for ties
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Public moments on a calendar day, matching month by name or number
    pub async fn today_in_history(&self, month_num: u32, day: u32) -> Result<Vec<Moment>, GraphError> {
        let filter = MomentFilter::public().with_calendar_day(month_num, day);
        Ok(self.backend.list_nodes(&filter).await?)
    }

    /// Uniformly random public moment with `layer >= min_layer`
    pub async fn random_public(&self, min_layer: u32) -> Result<Option<Moment>, GraphError> {
        let filter = MomentFilter::public().with_min_layer(min_layer);
        let candidates = self.backend.list_nodes(&filter).await?;
        Ok(candidates.choose(&mut rand::thread_rng()).cloned())
    }

    //
    // COUNTERS
    //

    pub async fn stats(&self) -> Result<GraphStats, GraphError> {
        let moments = self.backend.list_nodes(&MomentFilter::new()).await?;

        let mut layer_counts = BTreeMap::new();
        let mut source_type_counts = BTreeMap::new();
        for moment in &moments {
            *layer_counts.entry(moment.layer.to_string()).or_insert(0) += 1;
            *source_type_counts
                .entry(moment.source_type.clone())
                .or_insert(0) += 1;
        }

        Ok(GraphStats {
            total_nodes: moments.len(),
            total_edges: self.backend.count_edges().await?,
            layer_counts,
            edge_type_counts: self.backend.edge_type_counts().await?,
            source_type_counts,
        })
    }

    /// Paths whose incident edge count (in + out) is below `threshold`
    pub async fn frontier_nodes(&self, threshold: usize) -> Result<Vec<String>, GraphError> {
        Ok(self
            .backend
            .degrees()
            .await?
            .into_iter()
            .filter(|(_, degree)| *degree < threshold)
            .map(|(path, _)| path)
            .collect())
    }

    /// Incident edge count (in + out); 0 for unknown paths
    pub async fn degree(&self, path: &str) -> Result<usize, GraphError> {
        let outgoing = self.backend.outgoing_edges(path).await?;
        let incoming = self.backend.incoming_edges(path).await?;
        Ok(outgoing.len() + incoming.len())
    }

    pub async fn node_count(&self) -> Result<usize, GraphError> {
        Ok(self.backend.count_nodes().await?)
    }

    pub async fn edge_count(&self) -> Result<usize, GraphError> {
        Ok(self.backend.count_edges().await?)
    }
}
