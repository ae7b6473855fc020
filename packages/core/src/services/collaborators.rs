//! Pluggable collaborators
//!
//! Screening queries and proposing related events are model-backed jobs that
//! run outside this crate. Only their contracts live here, together with the
//! graph-side handling of expansion drafts.

use crate::models::{EdgeAttrs, EdgeType, Moment, Visibility};
use crate::services::error::GraphError;
use crate::services::graph_store::{GraphStore, DEFAULT_FRONTIER_THRESHOLD};
use crate::utils::path_codec::{encode, month_number, slugify, PathParts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Layer assigned to system-expanded moments
pub const EXPANDED_LAYER: u32 = 1;

/// Weight of the edge from the expanded moment to each draft
pub const EXPANSION_EDGE_WEIGHT: f64 = 0.5;

/// Content screening outcome for a generation query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    /// Historically significant but mature; allowed
    Sensitive,
    Reject,
}

impl Verdict {
    /// Read a judge's label; anything unrecognised is a rejection
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "approve" => Verdict::Approve,
            "sensitive" => Verdict::Sensitive,
            _ => Verdict::Reject,
        }
    }

    pub fn allows_generation(&self) -> bool {
        !matches!(self, Verdict::Reject)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Approve => "approve",
            Verdict::Sensitive => "sensitive",
            Verdict::Reject => "reject",
        })
    }
}

#[async_trait]
pub trait ContentJudge: Send + Sync {
    /// Screen a query; unclear answers should come back as `Reject`
    async fn screen(&self, query: &str) -> anyhow::Result<Verdict>;
}

/// What an expander sees of a moment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentBrief {
    pub name: String,
    pub year: Option<i64>,
    pub month: String,
    pub day: u32,
    pub country: String,
    pub region: String,
    pub city: String,
    pub one_liner: String,
}

impl From<&Moment> for MomentBrief {
    fn from(moment: &Moment) -> Self {
        Self {
            name: moment.name.clone(),
            year: moment.year,
            month: moment.month.clone(),
            day: moment.day,
            country: moment.country.clone(),
            region: moment.region.clone(),
            city: moment.city.clone(),
            one_liner: moment.one_liner.clone(),
        }
    }
}

fn default_month() -> String {
    "january".to_string()
}

fn default_day() -> u32 {
    1
}

fn default_time() -> String {
    "1200".to_string()
}

fn default_place() -> String {
    "unknown".to_string()
}

/// A related event proposed by an expander
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionDraft {
    pub name: String,
    #[serde(default)]
    pub year: i64,
    #[serde(default = "default_month")]
    pub month: String,
    #[serde(default = "default_day")]
    pub day: u32,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default = "default_place")]
    pub country: String,
    #[serde(default = "default_place")]
    pub region: String,
    #[serde(default = "default_place")]
    pub city: String,
    #[serde(default)]
    pub one_liner: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub figures: Vec<String>,
    /// Relationship from the expanded moment; kept loose so bad kinds can be skipped
    #[serde(default = "default_edge_type")]
    pub edge_type: String,
}

fn default_edge_type() -> String {
    EdgeType::Thematic.as_str().to_string()
}

#[async_trait]
pub trait GraphExpander: Send + Sync {
    /// Propose events related to `brief`
    async fn expand(&self, brief: &MomentBrief) -> anyhow::Result<Vec<ExpansionDraft>>;
}

impl ExpansionDraft {
    /// Materialize as a public, layer-1 moment
    pub fn to_moment(&self) -> Moment {
        let month = self.month.to_lowercase();
        let month_num = month_number(&month).unwrap_or(1);
        let path = encode(PathParts {
            year: self.year,
            month_num,
            day: self.day,
            time: &self.time,
            country: &self.country,
            region: &self.region,
            city: &self.city,
            slug: &self.name,
        });

        let mut moment = Moment::new(path);
        moment.name = self.name.clone();
        moment.year = Some(self.year);
        moment.month = month;
        moment.month_num = month_num;
        moment.day = self.day;
        moment.time = self.time.clone();
        moment.country = slugify(&self.country);
        moment.region = slugify(&self.region);
        moment.city = slugify(&self.city);
        moment.slug = slugify(&self.name);
        moment.layer = EXPANDED_LAYER;
        moment.visibility = Visibility::Public;
        moment.one_liner = self.one_liner.clone();
        moment.tags = self.tags.clone();
        moment.figures = self.figures.clone();
        moment
    }
}

impl GraphStore {
    /// Add one expansion draft next to `source`
    ///
    /// Drafts whose path already exists are left alone and return `None`. A
    /// draft with an unknown edge kind is stored without the linking edge.
    pub async fn add_expansion(
        &self,
        source: &str,
        draft: &ExpansionDraft,
    ) -> Result<Option<Moment>, GraphError> {
        let moment = draft.to_moment();
        if self.backend().get_node(&moment.path).await?.is_some() {
            return Ok(None);
        }

        let moment = self.upsert_node(moment).await?;
        let attrs = EdgeAttrs {
            weight: EXPANSION_EDGE_WEIGHT,
            theme: String::new(),
        };
        match self
            .add_edge(source, &moment.path, &draft.edge_type, attrs)
            .await
        {
            Ok(_) | Err(GraphError::InvalidEdgeType { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(Some(moment))
    }

    /// Expand the first frontier moment once; returns the moments added
    pub async fn expand_frontier(&self, expander: &dyn GraphExpander) -> Result<Vec<Moment>, GraphError> {
        let Some(source) = self
            .frontier_nodes(DEFAULT_FRONTIER_THRESHOLD)
            .await?
            .into_iter()
            .next()
        else {
            tracing::info!("No frontier nodes to expand");
            return Ok(Vec::new());
        };

        let node = self.get_node(&source).await?;
        tracing::info!("Expanding from node: {}", source);
        let drafts = expander.expand(&MomentBrief::from(&node)).await?;

        let mut added = Vec::new();
        for draft in &drafts {
            if let Some(moment) = self.add_expansion(&source, draft).await? {
                added.push(moment);
            }
        }

        tracing::info!("Expansion complete: added {} events from {}", added.len(), source);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_draft_defaults_and_path() {
        let draft: ExpansionDraft = serde_json::from_value(json!({
            "name": "Battle of Salamis",
            "year": -480,
            "month": "September",
            "day": 22,
            "country": "Greece",
            "region": "Attica",
            "city": "Salamis",
            "edge_type": "causes"
        }))
        .unwrap();

        let moment = draft.to_moment();
        assert_eq!(
            moment.path,
            "/-480/september/22/1200/greece/attica/salamis/battle-of-salamis"
        );
        assert_eq!(moment.layer, EXPANDED_LAYER);
        assert!(moment.is_public());
        assert_eq!(moment.month_num, 9);
    }

    #[test]
    fn test_verdict_gate() {
        assert!(Verdict::Approve.allows_generation());
        assert!(Verdict::Sensitive.allows_generation());
        assert!(!Verdict::Reject.allows_generation());
        assert_eq!(Verdict::from_label(" Approve "), Verdict::Approve);
        assert_eq!(Verdict::from_label("maybe"), Verdict::Reject);
        assert_eq!(
            serde_json::from_value::<Verdict>(json!("sensitive")).unwrap(),
            Verdict::Sensitive
        );
    }
}
