//! Bulk write paths on top of [`GraphStore`]
//!
//! - `ingest_subgraph`: nodes and edges pushed by expansion workers
//! - `index_moment`: direct indexing of an externally generated moment
//! - `seed_if_empty`: first-start load of a `{nodes, edges}` seed file
//! - `import_node_link`: migration of a node-link graph export (no auto-link)
//! - `verify_fingerprints` / `restamp_fingerprints`: fingerprint backfill
//!
//! Every path stamps a missing fingerprint, so no stored moment is ever
//! left without one.

use crate::models::{EdgeAttrs, EdgeRecord, Moment, MomentFilter, Visibility};
use crate::services::error::GraphError;
use crate::services::graph_store::GraphStore;
use crate::utils::fingerprint::fingerprint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Minimum layer for moments that carry an external generation id
pub const GENERATED_LAYER: u32 = 2;

/// A batch of nodes and edges to ingest
///
/// Nodes stay loosely typed until ingestion so each can be checked for an `id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubgraphDocument {
    #[serde(default)]
    pub nodes: Vec<Map<String, Value>>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub ingested_nodes: usize,
    pub ingested_edges: usize,
}

/// Direct indexing of a moment rendered elsewhere
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexRequest {
    /// Moment attributes; these win over the fields below
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub flash_timepoint_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub created_by: Option<String>,
}

/// Node-link graph export: `{nodes: [{id, ..}], links: [{source, target, ..}]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeLinkDocument {
    #[serde(default)]
    pub nodes: Vec<Map<String, Value>>,
    #[serde(default)]
    pub links: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub nodes: usize,
    pub edges: usize,
    pub skipped_nodes: usize,
    pub skipped_edges: usize,
}

/// Pull the string `id` out of a loosely-typed node
fn node_id(node: &Map<String, Value>) -> Option<&str> {
    node.get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Turn every loose node into a moment, or fail on the first bad one
fn validate_nodes(nodes: Vec<Map<String, Value>>) -> Result<Vec<Moment>, GraphError> {
    let mut moments = Vec::with_capacity(nodes.len());
    for (index, node) in nodes.into_iter().enumerate() {
        let id = node_id(&node)
            .ok_or_else(|| GraphError::invalid_document(format!("node {} has no id", index)))?
            .to_string();
        let moment = Moment::from_attrs(id.clone(), node)
            .map_err(|e| GraphError::invalid_document(format!("node '{}': {}", id, e)))?;
        moments.push(moment);
    }
    Ok(moments)
}

impl GraphStore {
    /// Upsert every node (each auto-linked), then add the edges
    ///
    /// All nodes are validated before anything is written. Edges with an
    /// unknown type or a missing endpoint are skipped and not counted.
    pub async fn ingest_subgraph(&self, document: SubgraphDocument) -> Result<IngestSummary, GraphError> {
        let moments = validate_nodes(document.nodes)?;

        let mut summary = IngestSummary::default();
        for moment in moments {
            self.upsert_node(moment).await?;
            summary.ingested_nodes += 1;
        }
        summary.ingested_edges = self.insert_edges(document.edges).await?;

        tracing::info!(
            "Ingested subgraph: {} nodes, {} edges",
            summary.ingested_nodes,
            summary.ingested_edges
        );
        Ok(summary)
    }

    /// Add explicit edges, skipping bad types and missing endpoints
    async fn insert_edges(&self, edges: Vec<EdgeRecord>) -> Result<usize, GraphError> {
        let mut inserted = 0;
        for edge in edges {
            let attrs = EdgeAttrs {
                weight: edge.weight,
                theme: edge.theme,
            };
            match self
                .add_edge(&edge.source, &edge.target, &edge.edge_type, attrs)
                .await
            {
                Ok(_) => inserted += 1,
                Err(e @ (GraphError::InvalidEdgeType { .. } | GraphError::NotFound { .. })) => {
                    tracing::warn!(
                        "Skipping edge {} -> {}: {}",
                        edge.source,
                        edge.target,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(inserted)
    }

    /// Index a moment under `path` with `type = "event"`
    ///
    /// When an external generation id is given the layer is raised to at
    /// least [`GENERATED_LAYER`].
    pub async fn index_moment(&self, path: &str, request: IndexRequest) -> Result<Moment, GraphError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(GraphError::invalid_document("path is required"));
        }

        let mut attrs = Map::new();
        attrs.insert("type".to_string(), Value::from("event"));
        attrs.insert(
            "visibility".to_string(),
            Value::from(request.visibility.as_str()),
        );
        attrs.insert(
            "created_by".to_string(),
            Value::from(request.created_by.unwrap_or_else(|| "system".to_string())),
        );
        attrs.extend(request.metadata);

        let mut moment = Moment::from_attrs(path, attrs)
            .map_err(|e| GraphError::invalid_document(format!("metadata for '{}': {}", path, e)))?;

        if let Some(flash_id) = request.flash_timepoint_id.filter(|id| !id.is_empty()) {
            moment.flash_timepoint_id = Some(flash_id);
            moment.layer = moment.layer.max(GENERATED_LAYER);
        }

        let moment = self.upsert_node(moment).await?;
        tracing::info!("Indexed {}", moment.path);
        Ok(moment)
    }

    /// Load `seed_file` when the store has no moments
    ///
    /// Returns the number of moments seeded; 0 when the store already has
    /// data or the file does not exist.
    pub async fn seed_if_empty(&self, seed_file: &Path) -> Result<usize, GraphError> {
        if self.node_count().await? > 0 {
            return Ok(0);
        }
        if !seed_file.exists() {
            tracing::warn!("No seed file at {}, starting empty", seed_file.display());
            return Ok(0);
        }

        let raw = tokio::fs::read_to_string(seed_file).await.map_err(|e| {
            GraphError::invalid_document(format!("cannot read {}: {}", seed_file.display(), e))
        })?;
        let document: SubgraphDocument = serde_json::from_str(&raw).map_err(|e| {
            GraphError::invalid_document(format!("cannot parse {}: {}", seed_file.display(), e))
        })?;

        // Seed files carry their own edges; nothing is auto-linked
        let moments = validate_nodes(document.nodes)?;
        let seeded = moments.len();
        for moment in moments {
            self.put_unlinked(moment).await?;
        }
        let edges = self.insert_edges(document.edges).await?;

        tracing::info!(
            "Seeded empty graph from {}: {} nodes, {} edges",
            seed_file.display(),
            seeded,
            edges
        );
        Ok(seeded)
    }

    /// Migrate a node-link export without auto-linking
    ///
    /// The export already carries its edges, so nodes are persisted as-is
    /// (fingerprints stamped where missing) and links are inserted directly.
    /// Nodes without an id and links with a bad type or endpoint are skipped.
    pub async fn import_node_link(&self, document: NodeLinkDocument) -> Result<ImportSummary, GraphError> {
        let mut summary = ImportSummary::default();

        for node in document.nodes {
            let Some(id) = node_id(&node).map(str::to_string) else {
                summary.skipped_nodes += 1;
                continue;
            };
            match Moment::from_attrs(id.clone(), node) {
                Ok(moment) => {
                    self.put_unlinked(moment).await?;
                    summary.nodes += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping node {}: {}", id, e);
                    summary.skipped_nodes += 1;
                }
            }
        }

        for link in document.links {
            let record: EdgeRecord = match serde_json::from_value(Value::Object(link)) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping malformed link: {}", e);
                    summary.skipped_edges += 1;
                    continue;
                }
            };
            let attrs = EdgeAttrs {
                weight: record.weight,
                theme: record.theme,
            };
            match self
                .add_edge(&record.source, &record.target, &record.edge_type, attrs)
                .await
            {
                Ok(_) => summary.edges += 1,
                Err(e @ (GraphError::InvalidEdgeType { .. } | GraphError::NotFound { .. })) => {
                    tracing::warn!("Skipping link {} -> {}: {}", record.source, record.target, e);
                    summary.skipped_edges += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Imported {} nodes and {} edges ({} nodes, {} edges skipped)",
            summary.nodes,
            summary.edges,
            summary.skipped_nodes,
            summary.skipped_edges
        );
        Ok(summary)
    }

    /// Paths whose stored fingerprint differs from the recomputed one
    pub async fn verify_fingerprints(&self) -> Result<Vec<String>, GraphError> {
        Ok(self
            .backend()
            .list_nodes(&MomentFilter::new())
            .await?
            .into_iter()
            .filter(|moment| moment.tdf_hash != fingerprint(moment))
            .map(|moment| moment.path)
            .collect())
    }

    /// Recompute and persist the fingerprint of every drifted moment
    pub async fn restamp_fingerprints(&self) -> Result<usize, GraphError> {
        let mut restamped = 0;
        for path in self.verify_fingerprints().await? {
            let mut moment = self.get_node(&path).await?;
            moment.tdf_hash = fingerprint(&moment);
            self.put_unlinked(moment).await?;
            restamped += 1;
        }

        tracing::info!("Re-stamped {} fingerprints", restamped);
        Ok(restamped)
    }
}
