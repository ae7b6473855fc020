//! Database Connection Management
//!
//! Connection and schema handling for the libsql moment database.
//!
//! # Architecture
//!
//! - **Hybrid rows**: filterable attributes (visibility, layer, calendar
//!   fields) are real columns; the full record is kept as JSON in `properties`
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: Enabled, so edges always reference stored moments
//! - **Idempotent schema**: `CREATE ... IF NOT EXISTS`, no migrations
//!
//! # Database Connection Patterns
//!
//! Always use `connect_with_timeout()` in async functions. The 5-second busy
//! timeout lets concurrent operations wait instead of failing with
//! `SQLITE_BUSY`.
//!
//! ```no_run
//! # use clockchain_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/clockchain.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Columns selected for every moment query, in `row_to_moment` order
pub(crate) const MOMENT_COLUMNS: &str = "id, properties, tdf_hash";

/// Columns selected for every edge query, in `row_to_edge` order
pub(crate) const EDGE_COLUMNS: &str = "source, target, edge_type, weight, theme";

/// Database service for managing the libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub db: Arc<Database>,
    pub db_path: PathBuf,
}

/// Parameters for moment upsert (avoids too-many-arguments lint)
pub struct DbMomentParams<'a> {
    pub id: &'a str,
    pub node_type: &'a str,
    pub name: &'a str,
    pub year: Option<i64>,
    pub month: &'a str,
    pub month_num: u32,
    pub day: u32,
    pub visibility: &'a str,
    pub layer: u32,
    pub source_type: &'a str,
    pub created_at: String,
    pub published_at: Option<String>,
    pub tdf_hash: &'a str,
    /// Full record as JSON
    pub properties: &'a str,
}

/// SQL fragment plus positional values for listing moments
pub struct DbMomentQuery {
    pub where_clause: String,
    pub values: Vec<libsql::Value>,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` and initialize the schema
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the parent directory cannot be created, the
    /// connection fails or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// PRAGMA statements return rows, so they go through query() not execute()
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create tables and indexes (safe to call repeatedly)
    ///
    /// # Schema
    ///
    /// - `moments`: one row per moment, keyed by path
    /// - `edges`: directional edges keyed by `(source, target, edge_type)`
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS moments (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL DEFAULT 'event',
                name TEXT NOT NULL DEFAULT '',
                year INTEGER,
                month TEXT NOT NULL DEFAULT '',
                month_num INTEGER NOT NULL DEFAULT 0,
                day INTEGER NOT NULL DEFAULT 0,
                visibility TEXT NOT NULL DEFAULT 'private'
                    CHECK (visibility IN ('private', 'public')),
                layer INTEGER NOT NULL DEFAULT 0,
                source_type TEXT NOT NULL DEFAULT 'historical',
                created_at TEXT NOT NULL,
                published_at TEXT,
                tdf_hash TEXT NOT NULL,
                properties JSON NOT NULL DEFAULT '{}'
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create moments table: {}", e))
        })?;

        // Edges go when either endpoint goes
        conn.execute(
            "CREATE TABLE IF NOT EXISTS edges (
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                edge_type TEXT NOT NULL
                    CHECK (edge_type IN ('causes', 'contemporaneous', 'same_location', 'thematic')),
                weight REAL NOT NULL DEFAULT 1.0,
                theme TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (source, target, edge_type),
                FOREIGN KEY (source) REFERENCES moments(id) ON DELETE CASCADE,
                FOREIGN KEY (target) REFERENCES moments(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create edges table: {}", e))
        })?;

        self.create_indexes(&conn).await?;

        // Flush schema for fresh files so a quick reopen sees the tables
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    async fn create_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            ("idx_moments_visibility", "moments(visibility)"),
            ("idx_moments_layer", "moments(layer)"),
            ("idx_moments_calendar", "moments(day, month)"),
            ("idx_moments_year", "moments(year)"),
            ("idx_edges_target", "edges(target)"),
            ("idx_edges_type", "edges(edge_type)"),
        ];

        for (name, target) in indexes {
            conn.execute(
                &format!("CREATE INDEX IF NOT EXISTS {} ON {}", name, target),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(())
    }

    /// Raw connection handle; prefer `connect_with_timeout()` in async code
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Connection with a 5-second busy timeout and foreign keys enabled
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        // foreign_keys is per-connection in SQLite
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    //
    // MOMENT OPERATIONS
    // Raw SQL only; row conversion happens in TursoBackend.
    //

    /// Insert or update a moment row
    ///
    /// Uses `ON CONFLICT DO UPDATE` rather than `REPLACE`: a REPLACE deletes
    /// the old row first, which would cascade and drop its edges.
    pub async fn db_upsert_moment(&self, params: DbMomentParams<'_>) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO moments (id, node_type, name, year, month, month_num, day, visibility,
                                  layer, source_type, created_at, published_at, tdf_hash, properties)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                node_type = excluded.node_type,
                name = excluded.name,
                year = excluded.year,
                month = excluded.month,
                month_num = excluded.month_num,
                day = excluded.day,
                visibility = excluded.visibility,
                layer = excluded.layer,
                source_type = excluded.source_type,
                created_at = excluded.created_at,
                published_at = excluded.published_at,
                tdf_hash = excluded.tdf_hash,
                properties = excluded.properties",
            libsql::params![
                params.id,
                params.node_type,
                params.name,
                params.year,
                params.month,
                params.month_num,
                params.day,
                params.visibility,
                params.layer,
                params.source_type,
                params.created_at,
                params.published_at,
                params.tdf_hash,
                params.properties,
            ],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to upsert moment '{}': {}", params.id, e))
        })?;

        Ok(())
    }

    pub async fn db_get_moment(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM moments WHERE id = ?", MOMENT_COLUMNS))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_moment query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_moment query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// List moments ordered by path, optionally narrowed by a WHERE clause
    pub async fn db_list_moments(
        &self,
        query: DbMomentQuery,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let sql = format!(
            "SELECT {} FROM moments{} ORDER BY id",
            MOMENT_COLUMNS, query.where_clause
        );
        let mut stmt = conn.prepare(&sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare list_moments query: {}", e))
        })?;

        stmt.query(query.values).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute list_moments query: {}", e))
        })
    }

    //
    // EDGE OPERATIONS
    //

    /// Insert an edge unless its key exists; returns rows written (0 or 1)
    pub async fn db_insert_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: &str,
        weight: f64,
        theme: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO edges (source, target, edge_type, weight, theme)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(source, target, edge_type) DO NOTHING",
            (source, target, edge_type, weight, theme),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to insert {} edge {} -> {}: {}",
                edge_type, source, target, e
            ))
        })
    }

    /// Edges where `column` (`source` or `target`) equals `id`, in insertion order
    pub async fn db_edges_by(
        &self,
        column: EdgeEndpoint,
        id: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let sql = format!(
            "SELECT {} FROM edges WHERE {} = ? ORDER BY rowid",
            EDGE_COLUMNS,
            column.as_str()
        );
        let mut stmt = conn.prepare(&sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare edge query: {}", e))
        })?;

        stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute edge query: {}", e))
        })
    }

    pub async fn db_has_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: &str,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .db_scalar(
                "SELECT COUNT(*) FROM edges WHERE source = ? AND target = ? AND edge_type = ?",
                vec![source.into(), target.into(), edge_type.into()],
            )
            .await?;
        Ok(count > 0)
    }

    pub async fn db_count_moments(&self) -> Result<i64, DatabaseError> {
        self.db_scalar("SELECT COUNT(*) FROM moments", Vec::new())
            .await
    }

    pub async fn db_count_edges(&self) -> Result<i64, DatabaseError> {
        self.db_scalar("SELECT COUNT(*) FROM edges", Vec::new())
            .await
    }

    /// `(edge_type, count)` rows
    pub async fn db_edge_type_counts(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.query(
            "SELECT edge_type, COUNT(*) FROM edges GROUP BY edge_type ORDER BY edge_type",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to count edges by type: {}", e))
        })
    }

    /// `(id, in + out)` rows for every moment
    pub async fn db_degrees(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.query(
            "SELECT m.id,
                    (SELECT COUNT(*) FROM edges WHERE source = m.id)
                  + (SELECT COUNT(*) FROM edges WHERE target = m.id)
             FROM moments m
             ORDER BY m.id",
            (),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to compute degrees: {}", e)))
    }

    async fn db_scalar(
        &self,
        sql: &str,
        values: Vec<libsql::Value>,
    ) -> Result<i64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut rows = conn
            .query(sql, values)
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to execute '{}': {}", sql, e)))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::sql_execution(format!("Bad scalar result: {}", e))),
            None => Ok(0),
        }
    }
}

/// Which end of an edge a lookup is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEndpoint {
    Source,
    Target,
}

impl EdgeEndpoint {
    fn as_str(&self) -> &'static str {
        match self {
            EdgeEndpoint::Source => "source",
            EdgeEndpoint::Target => "target",
        }
    }
}
