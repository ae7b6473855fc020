//! MemoryBackend - In-Process Adjacency Store
//!
//! Keeps moments in a path-ordered map with separate outgoing and incoming
//! adjacency lists. Used for tests and for deployments without a database file.
//! Nothing survives a restart.

use crate::db::graph_backend::GraphBackend;
use crate::models::{Edge, EdgeType, Moment, MomentFilter};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Adjacency {
    nodes: BTreeMap<String, Moment>,
    /// source -> edges in insertion order
    outgoing: HashMap<String, Vec<Edge>>,
    /// target -> edges in insertion order
    incoming: HashMap<String, Vec<Edge>>,
    edge_count: usize,
}

/// In-memory implementation of [`GraphBackend`]
#[derive(Default)]
pub struct MemoryBackend {
    graph: RwLock<Adjacency>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphBackend for MemoryBackend {
    async fn put_node(&self, moment: Moment) -> Result<()> {
        let mut graph = self.graph.write().await;
        graph.nodes.insert(moment.path.clone(), moment);
        Ok(())
    }

    async fn get_node(&self, path: &str) -> Result<Option<Moment>> {
        Ok(self.graph.read().await.nodes.get(path).cloned())
    }

    async fn list_nodes(&self, filter: &MomentFilter) -> Result<Vec<Moment>> {
        let graph = self.graph.read().await;
        Ok(graph
            .nodes
            .values()
            .filter(|moment| filter.matches(moment))
            .cloned()
            .collect())
    }

    async fn count_nodes(&self) -> Result<usize> {
        Ok(self.graph.read().await.nodes.len())
    }

    async fn insert_edge(&self, edge: Edge) -> Result<bool> {
        let mut graph = self.graph.write().await;
        for endpoint in [&edge.source, &edge.target] {
            if !graph.nodes.contains_key(endpoint) {
                bail!("Edge endpoint does not exist: {}", endpoint);
            }
        }

        let exists = graph.outgoing.get(&edge.source).is_some_and(|edges| {
            edges
                .iter()
                .any(|e| e.target == edge.target && e.edge_type == edge.edge_type)
        });
        if exists {
            return Ok(false);
        }

        graph
            .incoming
            .entry(edge.target.clone())
            .or_default()
            .push(edge.clone());
        graph
            .outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(edge);
        graph.edge_count += 1;
        Ok(true)
    }

    async fn has_edge(&self, source: &str, target: &str, edge_type: EdgeType) -> Result<bool> {
        let graph = self.graph.read().await;
        Ok(graph.outgoing.get(source).is_some_and(|edges| {
            edges
                .iter()
                .any(|e| e.target == target && e.edge_type == edge_type)
        }))
    }

    async fn outgoing_edges(&self, path: &str) -> Result<Vec<Edge>> {
        let graph = self.graph.read().await;
        Ok(graph.outgoing.get(path).cloned().unwrap_or_default())
    }

    async fn incoming_edges(&self, path: &str) -> Result<Vec<Edge>> {
        let graph = self.graph.read().await;
        Ok(graph.incoming.get(path).cloned().unwrap_or_default())
    }

    async fn count_edges(&self) -> Result<usize> {
        Ok(self.graph.read().await.edge_count)
    }

    async fn edge_type_counts(&self) -> Result<BTreeMap<String, usize>> {
        let graph = self.graph.read().await;
        let mut counts = BTreeMap::new();
        for edge in graph.outgoing.values().flatten() {
            *counts.entry(edge.edge_type.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn degrees(&self) -> Result<BTreeMap<String, usize>> {
        let graph = self.graph.read().await;
        Ok(graph
            .nodes
            .keys()
            .map(|path| {
                let out = graph.outgoing.get(path).map_or(0, Vec::len);
                let inc = graph.incoming.get(path).map_or(0, Vec::len);
                (path.clone(), out + inc)
            })
            .collect())
    }
}
