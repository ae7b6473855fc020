//! TursoBackend - GraphBackend Implementation for libsql
//!
//! Thin wrapper around [`DatabaseService`]: builds parameters, delegates the
//! SQL and converts rows back into models. No graph semantics live here.
//!
//! # Examples
//!
//! ```rust,no_run
//! use clockchain_core::db::{DatabaseService, GraphBackend, TursoBackend};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/clockchain.db")).await?);
//!     let backend: Arc<dyn GraphBackend> = Arc::new(TursoBackend::new(db));
//!     println!("{} moments", backend.count_nodes().await?);
//!     Ok(())
//! }
//! ```

use crate::db::database::{DbMomentParams, DbMomentQuery, EdgeEndpoint};
use crate::db::error::DatabaseError;
use crate::db::graph_backend::GraphBackend;
use crate::db::DatabaseService;
use crate::models::{Edge, EdgeType, Moment, MomentFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use libsql::{Row, Rows};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct TursoBackend {
    db: Arc<DatabaseService>,
}

impl TursoBackend {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Convert a `(id, properties, tdf_hash)` row into a Moment
    ///
    /// The id and fingerprint columns win over whatever the JSON carries.
    fn row_to_moment(row: &Row) -> Result<Moment> {
        let id: String = row.get(0).context("Failed to get id")?;
        let properties: String = row.get(1).context("Failed to get properties")?;
        let tdf_hash: String = row.get(2).context("Failed to get tdf_hash")?;

        let mut moment: Moment = serde_json::from_str(&properties)
            .map_err(|e| DatabaseError::corrupt_record(id.clone(), e.to_string()))?;
        moment.path = id;
        moment.tdf_hash = tdf_hash;
        Ok(moment)
    }

    /// Convert a `(source, target, edge_type, weight, theme)` row into an Edge
    fn row_to_edge(row: &Row) -> Result<Edge> {
        let source: String = row.get(0).context("Failed to get source")?;
        let target: String = row.get(1).context("Failed to get target")?;
        let kind: String = row.get(2).context("Failed to get edge_type")?;
        let weight: f64 = row.get(3).context("Failed to get weight")?;
        let theme: String = row.get(4).context("Failed to get theme")?;

        let edge_type: EdgeType = kind
            .parse()
            .map_err(|kind| anyhow::anyhow!("Unknown edge type in database: {}", kind))?;

        Ok(Edge::new(source, target, edge_type)
            .with_weight(weight)
            .with_theme(theme))
    }

    async fn collect_moments(mut rows: Rows) -> Result<Vec<Moment>> {
        let mut moments = Vec::new();
        while let Some(row) = rows.next().await.context("Failed to read moment row")? {
            moments.push(Self::row_to_moment(&row)?);
        }
        Ok(moments)
    }

    async fn collect_edges(mut rows: Rows) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        while let Some(row) = rows.next().await.context("Failed to read edge row")? {
            edges.push(Self::row_to_edge(&row)?);
        }
        Ok(edges)
    }

    async fn collect_counts(mut rows: Rows) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        while let Some(row) = rows.next().await.context("Failed to read count row")? {
            let key: String = row.get(0).context("Failed to get key")?;
            let count: i64 = row.get(1).context("Failed to get count")?;
            counts.insert(key, count.max(0) as usize);
        }
        Ok(counts)
    }

    /// Translate a filter into SQL conditions
    fn filter_query(filter: &MomentFilter) -> DbMomentQuery {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();

        if let Some(visibility) = filter.visibility {
            conditions.push("visibility = ?");
            values.push(visibility.as_str().into());
        }
        if let Some(min_layer) = filter.min_layer {
            conditions.push("layer >= ?");
            values.push(i64::from(min_layer).into());
        }
        if let Some((month_num, day)) = filter.calendar_day {
            // Legacy rows may carry only one month representation; an empty
            // name or a zero number never matches
            let month_name = crate::utils::path_codec::month_name(month_num);
            conditions.push("day = ?");
            values.push(i64::from(day).into());
            match (month_name, month_num) {
                (Some(name), _) => {
                    conditions.push("(LOWER(month) = ? OR month_num = ?)");
                    values.push(name.into());
                    values.push(i64::from(month_num).into());
                }
                (None, 0) => conditions.push("0 = 1"),
                (None, _) => {
                    conditions.push("month_num = ?");
                    values.push(i64::from(month_num).into());
                }
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        DbMomentQuery {
            where_clause,
            values,
        }
    }
}

#[async_trait]
impl GraphBackend for TursoBackend {
    async fn put_node(&self, moment: Moment) -> Result<()> {
        let properties =
            serde_json::to_string(&moment).context("Failed to serialize moment properties")?;

        let params = DbMomentParams {
            id: &moment.path,
            node_type: &moment.node_type,
            name: &moment.name,
            year: moment.year,
            month: &moment.month,
            month_num: moment.month_num,
            day: moment.day,
            visibility: moment.visibility.as_str(),
            layer: moment.layer,
            source_type: &moment.source_type,
            created_at: moment.created_at.to_rfc3339(),
            published_at: moment.published_at.map(|t| t.to_rfc3339()),
            tdf_hash: &moment.tdf_hash,
            properties: &properties,
        };

        self.db
            .db_upsert_moment(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to persist moment: {}", e))
    }

    async fn get_node(&self, path: &str) -> Result<Option<Moment>> {
        match self
            .db
            .db_get_moment(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get moment: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_moment(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_nodes(&self, filter: &MomentFilter) -> Result<Vec<Moment>> {
        let rows = self
            .db
            .db_list_moments(Self::filter_query(filter))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list moments: {}", e))?;
        Self::collect_moments(rows).await
    }

    async fn count_nodes(&self) -> Result<usize> {
        let count = self
            .db
            .db_count_moments()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to count moments: {}", e))?;
        Ok(count.max(0) as usize)
    }

    async fn insert_edge(&self, edge: Edge) -> Result<bool> {
        let written = self
            .db
            .db_insert_edge(
                &edge.source,
                &edge.target,
                edge.edge_type.as_str(),
                edge.weight,
                &edge.theme,
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to insert edge: {}", e))?;
        Ok(written > 0)
    }

    async fn has_edge(&self, source: &str, target: &str, edge_type: EdgeType) -> Result<bool> {
        self.db
            .db_has_edge(source, target, edge_type.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to look up edge: {}", e))
    }

    async fn outgoing_edges(&self, path: &str) -> Result<Vec<Edge>> {
        let rows = self
            .db
            .db_edges_by(EdgeEndpoint::Source, path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load outgoing edges: {}", e))?;
        Self::collect_edges(rows).await
    }

    async fn incoming_edges(&self, path: &str) -> Result<Vec<Edge>> {
        let rows = self
            .db
            .db_edges_by(EdgeEndpoint::Target, path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load incoming edges: {}", e))?;
        Self::collect_edges(rows).await
    }

    async fn count_edges(&self) -> Result<usize> {
        let count = self
            .db
            .db_count_edges()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to count edges: {}", e))?;
        Ok(count.max(0) as usize)
    }

    async fn edge_type_counts(&self) -> Result<BTreeMap<String, usize>> {
        let rows = self
            .db
            .db_edge_type_counts()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to count edges by type: {}", e))?;
        Self::collect_counts(rows).await
    }

    async fn degrees(&self) -> Result<BTreeMap<String, usize>> {
        let rows = self
            .db
            .db_degrees()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to compute degrees: {}", e))?;
        Self::collect_counts(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use tempfile::TempDir;

    async fn create_test_backend() -> Result<(TursoBackend, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        Ok((TursoBackend::new(db), temp_dir))
    }

    #[tokio::test]
    async fn test_moment_row_round_trip() -> Result<()> {
        let (backend, _temp_dir) = create_test_backend().await?;

        let mut moment = Moment::new("/-480/august/20/0600/greece/central-greece/thermopylae/battle-of-thermopylae");
        moment.name = "Battle of Thermopylae".to_string();
        moment.year = Some(-480);
        moment.month = "august".to_string();
        moment.month_num = 8;
        moment.day = 20;
        moment.visibility = Visibility::Public;
        moment.tags.insert("greece".to_string());
        moment.figures = vec!["Leonidas I".to_string(), "Xerxes I".to_string()];
        moment.tdf_hash = "a".repeat(64);
        moment
            .extra
            .insert("wikipedia".to_string(), serde_json::json!("Battle_of_Thermopylae"));

        backend.put_node(moment.clone()).await?;
        let loaded = backend.get_node(&moment.path).await?.expect("moment stored");

        assert_eq!(loaded.name, moment.name);
        assert_eq!(loaded.year, Some(-480));
        assert_eq!(loaded.figures, moment.figures);
        assert_eq!(loaded.tags, moment.tags);
        assert_eq!(loaded.tdf_hash, moment.tdf_hash);
        assert_eq!(loaded.extra.get("wikipedia"), moment.extra.get("wikipedia"));
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_keeps_edges() -> Result<()> {
        let (backend, _temp_dir) = create_test_backend().await?;
        backend.put_node(Moment::new("/a")).await?;
        backend.put_node(Moment::new("/b")).await?;
        assert!(backend.insert_edge(Edge::new("/a", "/b", EdgeType::Causes)).await?);

        let mut replaced = Moment::new("/a");
        replaced.layer = 3;
        backend.put_node(replaced).await?;

        assert_eq!(backend.count_edges().await?, 1);
        assert_eq!(backend.get_node("/a").await?.map(|m| m.layer), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_filter_query() -> Result<()> {
        let (backend, _temp_dir) = create_test_backend().await?;

        let mut by_name = Moment::new("/p1");
        by_name.visibility = Visibility::Public;
        by_name.month = "july".to_string();
        by_name.day = 20;
        by_name.layer = 1;
        backend.put_node(by_name).await?;

        let mut by_num = Moment::new("/p2");
        by_num.visibility = Visibility::Public;
        by_num.month_num = 7;
        by_num.day = 20;
        backend.put_node(by_num).await?;

        let mut private = Moment::new("/p3");
        private.month = "july".to_string();
        private.day = 20;
        backend.put_node(private).await?;

        let today = MomentFilter::public().with_calendar_day(7, 20);
        let paths: Vec<String> = backend
            .list_nodes(&today)
            .await?
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(paths, vec!["/p1".to_string(), "/p2".to_string()]);

        let layered = MomentFilter::public().with_min_layer(1);
        assert_eq!(backend.list_nodes(&layered).await?.len(), 1);
        Ok(())
    }
}
