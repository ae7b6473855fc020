//! Auto-linking of newly written moments
//!
//! When a moment is upserted, it is compared against every other stored moment
//! and three independent rules may fire:
//!
//! - **contemporaneous**: both years known and at most one year apart (weight 0.5)
//! - **same_location**: non-empty country and identical country/region/city (weight 0.5)
//! - **thematic**: at least one shared tag (weight 0.3, theme = sorted shared tags)
//!
//! Each fired rule is written as two directional edges. Each direction is
//! insert-if-absent on its own, so a reverse edge missing from an earlier pass
//! is backfilled even when the forward edge already exists.

use crate::db::GraphBackend;
use crate::models::{Edge, EdgeType, Moment, MomentFilter};
use anyhow::Result;

pub const CONTEMPORANEOUS_WEIGHT: f64 = 0.5;
pub const SAME_LOCATION_WEIGHT: f64 = 0.5;
pub const THEMATIC_WEIGHT: f64 = 0.3;

/// Maximum year distance for a contemporaneous link
pub const YEAR_WINDOW: u64 = 1;

/// A relationship inferred between two moments, before it is oriented
#[derive(Debug, Clone, PartialEq)]
pub struct InferredLink {
    pub edge_type: EdgeType,
    pub weight: f64,
    pub theme: String,
}

impl InferredLink {
    fn edge(&self, source: &str, target: &str) -> Edge {
        Edge::new(source, target, self.edge_type)
            .with_weight(self.weight)
            .with_theme(self.theme.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoLinker;

impl AutoLinker {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every rule for the pair `(moment, other)`
    ///
    /// Rules are not exclusive; the result holds zero to three links.
    pub fn infer(moment: &Moment, other: &Moment) -> Vec<InferredLink> {
        let mut links = Vec::new();

        if let (Some(year), Some(other_year)) = (moment.year, other.year) {
            if year.abs_diff(other_year) <= YEAR_WINDOW {
                links.push(InferredLink {
                    edge_type: EdgeType::Contemporaneous,
                    weight: CONTEMPORANEOUS_WEIGHT,
                    theme: String::new(),
                });
            }
        }

        if !moment.country.is_empty()
            && moment.country == other.country
            && moment.region == other.region
            && moment.city == other.city
        {
            links.push(InferredLink {
                edge_type: EdgeType::SameLocation,
                weight: SAME_LOCATION_WEIGHT,
                theme: String::new(),
            });
        }

        // BTreeSet intersection is already sorted
        let shared: Vec<&str> = moment
            .tags
            .intersection(&other.tags)
            .map(String::as_str)
            .collect();
        if !shared.is_empty() {
            links.push(InferredLink {
                edge_type: EdgeType::Thematic,
                weight: THEMATIC_WEIGHT,
                theme: shared.join(", "),
            });
        }

        links
    }

    /// Link `moment` against every other stored moment
    ///
    /// The caller must hold the store's writer lock. Returns the number of
    /// edges actually written.
    pub async fn link(&self, backend: &dyn GraphBackend, moment: &Moment) -> Result<usize> {
        let others = backend.list_nodes(&MomentFilter::new()).await?;
        let mut written = 0;

        for other in others.iter().filter(|other| other.path != moment.path) {
            for link in Self::infer(moment, other) {
                for edge in [
                    link.edge(&moment.path, &other.path),
                    link.edge(&other.path, &moment.path),
                ] {
                    let (source, target) = (edge.source.clone(), edge.target.clone());
                    if backend.insert_edge(edge).await? {
                        tracing::debug!(
                            "Auto-linked {} -> {} ({})",
                            source, target, link.edge_type
                        );
                        written += 1;
                    }
                }
            }
        }

        Ok(written)
    }
}
