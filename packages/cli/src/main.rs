//! Clockchain operator CLI
//!
//! Maintenance and generation commands over the moment graph.
//!
//! # Usage
//!
//! ```bash
//! clockchain stats
//! clockchain import graph.json
//! clockchain browse 1969/july
//! clockchain generate "Battle of Thermopylae" --public
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_PATH`: libsql file; without it the graph lives in memory and is
//!   seeded from `{DATA_DIR}/seeds.json` on every run
//! - `FLASH_URL` / `FLASH_SERVICE_KEY`: generation service
//! - `DAILY_CRON_ENABLED` / `DAILY_INTERVAL_SECS`: gate and period of `daily`
//! - `DEBUG`: debug logging unless `RUST_LOG` is set

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clockchain_core::db::{DatabaseService, GraphBackend, MemoryBackend, TursoBackend};
use clockchain_core::services::daily_worker::{DailyWorker, DailyWorkerConfig};
use clockchain_core::services::graph_store::DEFAULT_SEARCH_LIMIT;
use clockchain_core::services::{FlashClient, GraphStore, JobPipeline, NodeLinkDocument, SceneStore};
use clockchain_core::{ClockchainConfig, JobStatus, Visibility};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clockchain", about = "Clockchain moment graph operations", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show graph counters
    Stats,

    /// Load a {nodes, edges} seed file into an empty graph
    Seed {
        file: PathBuf,
    },

    /// Import a node-link graph export without auto-linking
    Import {
        file: PathBuf,
    },

    /// List moments whose fingerprint no longer matches their content
    Verify,

    /// Recompute drifted fingerprints
    Restamp,

    /// List the child segments under a path prefix
    Browse {
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Search public moments
    Search {
        query: String,

        /// Max results
        #[arg(long, short, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Generate one moment from a query and wait for it
    Generate {
        query: String,

        /// Generation preset
        #[arg(long)]
        preset: Option<String>,

        /// Publish the resulting moment
        #[arg(long)]
        public: bool,

        /// Owner recorded as created_by
        #[arg(long)]
        user: Option<String>,
    },

    /// Run the daily "today in history" worker until Ctrl-C
    Daily,
}

fn init_logging(config: &ClockchainConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level())),
        )
        .init();
}

/// In-memory graphs are seeded from `{DATA_DIR}/seeds.json`, unless the
/// command is `seed`, which brings its own file
fn seeds_on_open(config: &ClockchainConfig, command: &Commands) -> bool {
    config.database_path.is_none() && !matches!(command, Commands::Seed { .. })
}

async fn open_store(config: &ClockchainConfig, auto_seed: bool) -> Result<Arc<GraphStore>> {
    let backend: Arc<dyn GraphBackend> = match &config.database_path {
        Some(path) => {
            tracing::info!("Database: {}", path.display());
            let db = DatabaseService::new(path.clone())
                .await
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            Arc::new(TursoBackend::new(Arc::new(db)))
        }
        None => {
            tracing::info!("No DATABASE_PATH set, using in-memory graph");
            Arc::new(MemoryBackend::new())
        }
    };

    let store = Arc::new(GraphStore::new(backend));
    if auto_seed {
        let seeded = store.seed_if_empty(&config.seed_file()).await?;
        tracing::info!("Seeded {} moments", seeded);
    }
    Ok(store)
}

fn open_pipeline(config: &ClockchainConfig, store: Arc<GraphStore>) -> Result<Arc<JobPipeline>> {
    let client = FlashClient::new(
        config.flash_url.clone(),
        config.flash_service_key.clone(),
        config.generation_timeout,
    )?;
    tracing::info!("Generation service: {}", client.base_url());
    Ok(Arc::new(JobPipeline::new(
        store,
        Arc::new(client),
        SceneStore::new(&config.data_dir),
    )))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClockchainConfig::from_env()?;
    init_logging(&config);

    let store = open_store(&config, seeds_on_open(&config, &cli.command)).await?;

    match cli.command {
        Commands::Stats => print_json(&store.stats().await?)?,

        Commands::Seed { file } => {
            let seeded = store.seed_if_empty(&file).await?;
            println!("Seeded {} moments", seeded);
        }

        Commands::Import { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let document: NodeLinkDocument = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            print_json(&store.import_node_link(document).await?)?;
        }

        Commands::Verify => {
            let drifted = store.verify_fingerprints().await?;
            for path in &drifted {
                println!("{}", path);
            }
            println!("{} drifted fingerprints", drifted.len());
        }

        Commands::Restamp => {
            let restamped = store.restamp_fingerprints().await?;
            println!("Re-stamped {} fingerprints", restamped);
        }

        Commands::Browse { prefix } => print_json(&store.browse(&prefix).await?)?,

        Commands::Search { query, limit } => print_json(&store.search(&query, limit).await?)?,

        Commands::Generate {
            query,
            preset,
            public,
            user,
        } => {
            let visibility = if public {
                Visibility::Public
            } else {
                Visibility::Private
            };
            let pipeline = open_pipeline(&config, store)?;
            let job = pipeline.create(query, preset, user, visibility).await;
            let job = pipeline.process(job.id).await?;

            print_json(&json!({
                "job_id": job.id,
                "status": job.status,
                "path": job.path,
                "error": job.error,
            }))?;
            if job.status != JobStatus::Completed {
                anyhow::bail!("Job {} {}", job.id, job.status);
            }
        }

        Commands::Daily => {
            if !config.daily_cron_enabled {
                anyhow::bail!("Daily worker is disabled (set DAILY_CRON_ENABLED=true)");
            }
            let pipeline = open_pipeline(&config, store)?;
            let worker = Arc::new(DailyWorker::new(
                pipeline,
                DailyWorkerConfig {
                    interval: config.daily_interval,
                    ..Default::default()
                },
            ));
            let handle = worker.start();

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            handle.shutdown().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_command_skips_default_seed() {
        let in_memory = ClockchainConfig::default();
        let seed = Cli::parse_from(["clockchain", "seed", "other.json"]);
        let stats = Cli::parse_from(["clockchain", "stats"]);

        assert!(!seeds_on_open(&in_memory, &seed.command));
        assert!(seeds_on_open(&in_memory, &stats.command));

        let on_disk = ClockchainConfig {
            database_path: Some(PathBuf::from("graph.db")),
            ..Default::default()
        };
        assert!(!seeds_on_open(&on_disk, &stats.command));
    }
}
