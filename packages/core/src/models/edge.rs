//! Edge Data Structures
//!
//! Edges are directional and keyed by `(source, target, edge_type)`. Auto-linked
//! relationships are stored as two independent directional edges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Relationship kinds between moments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Causes,
    Contemporaneous,
    SameLocation,
    Thematic,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::Causes,
        EdgeType::Contemporaneous,
        EdgeType::SameLocation,
        EdgeType::Thematic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Causes => "causes",
            EdgeType::Contemporaneous => "contemporaneous",
            EdgeType::SameLocation => "same_location",
            EdgeType::Thematic => "thematic",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A directional relationship between two moments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Populated only for thematic edges
    #[serde(default)]
    pub theme: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type,
            weight: default_weight(),
            theme: String::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }
}

/// Optional attributes supplied with an explicit `add_edge`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub theme: String,
}

impl Default for EdgeAttrs {
    fn default() -> Self {
        Self {
            weight: default_weight(),
            theme: String::new(),
        }
    }
}

/// Loosely-typed edge as it arrives from ingest payloads and seed files
///
/// The type stays a string so invalid kinds can be rejected (and skipped) at
/// the store boundary instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_edge_kind")]
    pub edge_type: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub theme: String,
}

fn default_edge_kind() -> String {
    EdgeType::Thematic.as_str().to_string()
}

/// Which side of an edge the queried node sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// An edge seen from one endpoint, annotated with the other node's name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub path: String,
    pub name: String,
    pub edge_type: EdgeType,
    pub weight: f64,
    pub theme: String,
    pub direction: Direction,
}

/// One child segment of a browse prefix with the number of public moments under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseEntry {
    pub segment: String,
    pub count: usize,
}

/// Ranked search match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub name: String,
    pub one_liner: String,
    pub score: f64,
}

/// Aggregate counters over the whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub layer_counts: BTreeMap<String, usize>,
    pub edge_type_counts: BTreeMap<String, usize>,
    pub source_type_counts: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_parse() {
        assert_eq!("same_location".parse::<EdgeType>(), Ok(EdgeType::SameLocation));
        assert_eq!("causes".parse::<EdgeType>(), Ok(EdgeType::Causes));
        assert!("inspired".parse::<EdgeType>().is_err());
        assert!("Thematic".parse::<EdgeType>().is_err());
    }

    #[test]
    fn test_edge_record_defaults() {
        let record: EdgeRecord =
            serde_json::from_str(r#"{"source": "/a", "target": "/b"}"#).unwrap();
        assert_eq!(record.edge_type, "thematic");
        assert_eq!(record.weight, 1.0);
        assert!(record.theme.is_empty());
    }
}
