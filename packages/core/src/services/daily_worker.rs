//! Daily "today in history" generation
//!
//! Once per interval the worker looks up public moments that fall on today's
//! calendar day, keeps the ones that have never been rendered, and queues a
//! generation job for the best connected of them.

use crate::models::{Job, Moment, Visibility, DEFAULT_PRESET};
use crate::services::error::GraphError;
use crate::services::job_pipeline::JobPipeline;
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DAILY_INTERVAL: Duration = Duration::from_secs(86_400);

pub const MAX_DAILY_GENERATIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct DailyWorkerConfig {
    pub interval: Duration,
    pub max_generations: usize,
}

impl Default for DailyWorkerConfig {
    fn default() -> Self {
        Self {
            interval: DAILY_INTERVAL,
            max_generations: MAX_DAILY_GENERATIONS,
        }
    }
}

/// True when the moment has no rendered scene yet
pub fn is_sceneless(moment: &Moment) -> bool {
    let has_timepoint = moment
        .flash_timepoint_id
        .as_deref()
        .is_some_and(|id| !id.is_empty());
    let has_scene = match moment.extra.get("flash_scene") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    !has_timepoint && !has_scene
}

/// Query used to render a moment
pub fn daily_query(moment: &Moment) -> String {
    let year = moment.year.map(|y| y.to_string()).unwrap_or_default();
    format!("{} ({})", moment.name, year)
}

pub struct DailyWorker {
    pipeline: Arc<JobPipeline>,
    config: DailyWorkerConfig,
}

impl DailyWorker {
    pub fn new(pipeline: Arc<JobPipeline>, config: DailyWorkerConfig) -> Self {
        Self { pipeline, config }
    }

    /// Sceneless moments for `now`'s calendar day, best first
    ///
    /// Score is `degree + 2 * layer`; ties keep path order.
    pub async fn candidates(&self, now: DateTime<Utc>) -> Result<Vec<Moment>, GraphError> {
        let store = self.pipeline.store();
        let events = store.today_in_history(now.month(), now.day()).await?;
        tracing::info!(
            "Today in history ({}/{}): {} events found",
            now.month(),
            now.day(),
            events.len()
        );

        let mut scored = Vec::new();
        for moment in events.into_iter().filter(is_sceneless) {
            let score = store.degree(&moment.path).await? + moment.layer as usize * 2;
            scored.push((moment, score));
        }
        tracing::info!("Events without rendered scenes: {}", scored.len());

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(scored.into_iter().map(|(moment, _)| moment).collect())
    }

    /// Run one daily pass; returns the finished jobs
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<Vec<Job>, GraphError> {
        let mut finished = Vec::new();
        for moment in self
            .candidates(now)
            .await?
            .into_iter()
            .take(self.config.max_generations)
        {
            let query = daily_query(&moment);
            let job = self
                .pipeline
                .create(
                    query.clone(),
                    Some(DEFAULT_PRESET.to_string()),
                    None,
                    Visibility::Public,
                )
                .await;

            match self.pipeline.process(job.id).await {
                Ok(job) => {
                    tracing::info!("Daily generation {}: {} (job {})", job.status, query, job.id);
                    finished.push(job);
                }
                Err(e) => tracing::warn!("Daily job for {} not processed: {}", query, e),
            }
        }
        Ok(finished)
    }

    /// Run a pass now and then once per interval until shut down
    pub fn start(self: Arc<Self>) -> DailyWorkerHandle {
        tracing::info!(
            "Daily worker starting (interval {}s)",
            self.config.interval.as_secs()
        );
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        tracing::info!("Daily worker shutting down");
                        break;
                    }

                    _ = ticker.tick() => {
                        // A failed pass is retried on the next tick
                        if let Err(e) = self.run_once(Utc::now()).await {
                            tracing::error!("Daily worker error: {}", e);
                        }
                    }
                }
            }
        });

        DailyWorkerHandle { shutdown_tx, task }
    }
}

pub struct DailyWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl DailyWorkerHandle {
    /// Stop the loop and wait for the current pass to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::warn!("Daily worker task ended abnormally: {}", e);
        }
    }
}
