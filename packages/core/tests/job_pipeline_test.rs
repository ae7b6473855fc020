//! Job Pipeline Integration Tests
//!
//! Drives generation jobs end to end against a mocked `GenerationClient`,
//! an in-memory graph and a temp scene directory.

use anyhow::Result;
use async_trait::async_trait;
use clockchain_core::db::MemoryBackend;
use clockchain_core::models::{JobStatus, Moment, Visibility};
use clockchain_core::services::collaborators::{ContentJudge, Verdict};
use clockchain_core::services::daily_worker::{DailyWorker, DailyWorkerConfig};
use clockchain_core::services::{
    GenerationClient, GenerationError, GenerationRequest, GenerationResult, GraphStore, JobError,
    JobPipeline, SceneStore,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Mocks
// ============================================================================

/// Returns a fixed scene and records every request
struct ScriptedClient {
    scene: Value,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    fn new(scene: Value) -> Self {
        Self {
            scene,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn queries(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.query.clone())
            .collect()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        GenerationResult::from_value(self.scene.clone())
    }
}

struct FailingClient;

#[async_trait]
impl GenerationClient for FailingClient {
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        Err(GenerationError::upstream(502, "upstream renderer crashed".to_string()))
    }
}

struct KeywordJudge;

#[async_trait]
impl ContentJudge for KeywordJudge {
    async fn screen(&self, query: &str) -> Result<Verdict> {
        Ok(if query.contains("forbidden") {
            Verdict::Reject
        } else {
            Verdict::Approve
        })
    }
}

fn thermopylae_scene() -> Value {
    json!({
        "id": "tp-thermopylae",
        "name": "Battle of Thermopylae",
        "year": -480,
        "month": "august",
        "day": 20,
        "time_of_day": "dawn",
        "location": "Thermopylae, Central Greece, Greece",
        "tags": ["war", "greece"],
        "characters": {"characters": [{"name": "Leonidas I"}, {"name": "Xerxes I"}]},
        "moment": {"plot_summary": "Three hundred Spartans hold the pass."},
        "share_url": "https://flash.example.com/s/thermopylae"
    })
}

fn create_pipeline(client: Arc<dyn GenerationClient>) -> Result<(Arc<JobPipeline>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(GraphStore::new(Arc::new(MemoryBackend::new())));
    let pipeline = JobPipeline::new(store, client, SceneStore::new(temp_dir.path()));
    Ok((Arc::new(pipeline), temp_dir))
}

// ============================================================================
// Processing
// ============================================================================

#[tokio::test]
async fn test_process_completes_job_and_writes_moment() -> Result<()> {
    let client = Arc::new(ScriptedClient::new(thermopylae_scene()));
    let (pipeline, _temp_dir) = create_pipeline(client.clone())?;

    let job = pipeline
        .create("Battle of Thermopylae", None, Some("user-1".to_string()), Visibility::Public)
        .await;
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.preset, "balanced");

    let finished = pipeline.process(job.id).await?;
    assert_eq!(finished.status, JobStatus::Completed);
    assert!(finished.completed_at.is_some());
    let path = finished.path.clone().expect("completed job has a path");
    assert!(path.contains("thermopylae"));
    assert_eq!(
        path,
        "/-480/august/20/0600/greece/central-greece/thermopylae/battle-of-thermopylae"
    );

    let moment = pipeline.store().get_node(&path).await?;
    assert_eq!(moment.layer, 2);
    assert_eq!(moment.created_by, "user-1");
    assert!(moment.is_public());
    assert_eq!(moment.figures, vec!["Leonidas I", "Xerxes I"]);
    assert_eq!(moment.one_liner, "Three hundred Spartans hold the pass.");
    assert_eq!(moment.flash_timepoint_id.as_deref(), Some("tp-thermopylae"));
    assert_eq!(moment.tdf_hash.len(), 64);

    let scene = pipeline.scenes().load(&path).await?;
    assert_eq!(scene, Some(thermopylae_scene()));

    assert_eq!(pipeline.get(job.id).await?, finished);
    let sent = client.requests.lock().unwrap()[0].clone();
    assert_eq!(sent.context.job_id, job.id.to_string());
    assert_eq!(sent.preset, "balanced");
    Ok(())
}

#[tokio::test]
async fn test_off_type_scene_fields_fall_back_to_defaults() -> Result<()> {
    let mut scene = thermopylae_scene();
    scene["day"] = json!("20");
    scene["grounding"] = json!({"verified_year": "480 BC"});
    scene["characters"] = json!({"characters": [{"name": null}, {"name": "Leonidas I"}, {"role": "hoplite"}]});
    scene["tags"] = json!(["war", 300, "greece"]);

    let (pipeline, _temp_dir) = create_pipeline(Arc::new(ScriptedClient::new(scene)))?;
    let job = pipeline.create("Battle of Thermopylae", None, None, Visibility::Public).await;
    let finished = pipeline.process(job.id).await?;

    assert_eq!(finished.status, JobStatus::Completed, "{:?}", finished.error);
    let path = finished.path.expect("completed job has a path");
    assert_eq!(
        path,
        "/-480/august/20/0600/greece/central-greece/thermopylae/battle-of-thermopylae"
    );

    let moment = pipeline.store().get_node(&path).await?;
    assert_eq!(moment.year, Some(-480));
    assert_eq!(moment.day, 20);
    assert_eq!(moment.figures, vec!["Leonidas I"]);
    assert_eq!(moment.tags.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failing_generation_fails_job_without_writing() -> Result<()> {
    let (pipeline, _temp_dir) = create_pipeline(Arc::new(FailingClient))?;

    let job = pipeline
        .create("Battle of Thermopylae", None, None, Visibility::Private)
        .await;
    let finished = pipeline.process(job.id).await?;

    assert_eq!(finished.status, JobStatus::Failed);
    let error = finished.error.expect("failed job carries an error");
    assert!(!error.is_empty());
    assert!(error.contains("502"));
    assert!(error.contains("upstream renderer crashed"));
    assert!(finished.path.is_none());
    assert_eq!(pipeline.store().node_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_job_is_processed_once() -> Result<()> {
    let (pipeline, _temp_dir) =
        create_pipeline(Arc::new(ScriptedClient::new(thermopylae_scene())))?;

    let job = pipeline.create("Thermopylae", None, None, Visibility::Public).await;
    pipeline.process(job.id).await?;

    let err = pipeline.process(job.id).await.unwrap_err();
    assert!(matches!(
        err,
        JobError::AlreadyStarted {
            status: JobStatus::Completed,
            ..
        }
    ));

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        pipeline.get(missing).await,
        Err(JobError::NotFound { .. })
    ));
    Ok(())
}

// ============================================================================
// Background execution
// ============================================================================

#[tokio::test]
async fn test_spawn_marks_processing_before_returning() -> Result<()> {
    let (pipeline, _temp_dir) =
        create_pipeline(Arc::new(ScriptedClient::new(thermopylae_scene())))?;

    let job = pipeline.create("Thermopylae", None, None, Visibility::Public).await;
    let handle = pipeline.spawn(job.id).await?;
    assert_eq!(handle.id(), job.id);

    let polled = pipeline.get(job.id).await?;
    assert_ne!(polled.status, JobStatus::Pending);
    assert!(matches!(
        pipeline.spawn(job.id).await,
        Err(JobError::AlreadyStarted { .. })
    ));

    let finished = handle.wait().await?;
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(pipeline.get(job.id).await?.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_submit_screens_queries() -> Result<()> {
    let client = Arc::new(ScriptedClient::new(thermopylae_scene()));
    let temp_dir = TempDir::new()?;
    let store = Arc::new(GraphStore::new(Arc::new(MemoryBackend::new())));
    let pipeline = Arc::new(
        JobPipeline::new(store, client.clone(), SceneStore::new(temp_dir.path()))
            .with_judge(Arc::new(KeywordJudge)),
    );

    let err = pipeline
        .submit("something forbidden", None, None, Visibility::Public)
        .await
        .err()
        .expect("rejected query");
    assert!(matches!(err, JobError::Rejected { .. }));
    assert!(client.queries().is_empty());

    let handle = pipeline
        .submit("Battle of Thermopylae", Some("fast".to_string()), None, Visibility::Public)
        .await?;
    let finished = handle.wait().await?;
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.preset, "fast");
    assert_eq!(client.queries(), vec!["Battle of Thermopylae"]);
    Ok(())
}

#[tokio::test]
async fn test_parallel_jobs_complete_independently() -> Result<()> {
    let (pipeline, _temp_dir) =
        create_pipeline(Arc::new(ScriptedClient::new(thermopylae_scene())))?;

    let mut handles = Vec::new();
    for i in 0..5 {
        handles.push(
            pipeline
                .submit(format!("Thermopylae take {}", i), None, None, Visibility::Public)
                .await?,
        );
    }
    for handle in handles {
        assert_eq!(handle.wait().await?.status, JobStatus::Completed);
    }

    // Every job rendered the same scene, so one moment
    assert_eq!(pipeline.store().node_count().await?, 1);
    Ok(())
}

// ============================================================================
// Daily worker
// ============================================================================

fn on_this_day(path: &str, name: &str, year: i64, layer: u32) -> Moment {
    let mut moment = Moment::new(path);
    moment.name = name.to_string();
    moment.year = Some(year);
    moment.month = "august".to_string();
    moment.month_num = 8;
    moment.day = 20;
    moment.layer = layer;
    moment.visibility = Visibility::Public;
    moment
}

#[tokio::test]
async fn test_daily_worker_generates_ranked_sceneless_events() -> Result<()> {
    let client = Arc::new(ScriptedClient::new(thermopylae_scene()));
    let (pipeline, _temp_dir) = create_pipeline(client.clone())?;
    let store = pipeline.store().clone();

    store
        .upsert_node(on_this_day("/1940/august/20/1200/mexico/cdmx/coyoacan/trotsky", "Trotsky Attacked", 1940, 0))
        .await?;
    store
        .upsert_node(on_this_day("/1968/august/20/2300/czechia/prague/prague/warsaw-pact-invasion", "Warsaw Pact Invasion", 1968, 2))
        .await?;
    let mut rendered = on_this_day("/1977/august/20/1429/usa/florida/cape-canaveral/voyager-2", "Voyager 2 Launch", 1977, 2);
    rendered.flash_timepoint_id = Some("tp-voyager".to_string());
    store.upsert_node(rendered).await?;

    let worker = DailyWorker::new(
        pipeline.clone(),
        DailyWorkerConfig {
            interval: Duration::from_secs(3600),
            max_generations: 5,
        },
    );
    let now = Utc.with_ymd_and_hms(2026, 8, 20, 6, 0, 0).unwrap();

    let candidates = worker.candidates(now).await?;
    let names: Vec<&str> = candidates.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Warsaw Pact Invasion", "Trotsky Attacked"]);

    let jobs = worker.run_once(now).await?;
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Completed));
    assert!(jobs.iter().all(|j| j.visibility == Visibility::Public));
    assert_eq!(
        client.queries(),
        vec!["Warsaw Pact Invasion (1968)", "Trotsky Attacked (1940)"]
    );
    Ok(())
}

#[tokio::test]
async fn test_daily_worker_stops_on_shutdown() -> Result<()> {
    let (pipeline, _temp_dir) =
        create_pipeline(Arc::new(ScriptedClient::new(thermopylae_scene())))?;
    let worker = Arc::new(DailyWorker::new(pipeline, DailyWorkerConfig::default()));

    let handle = worker.start();
    tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await?;
    Ok(())
}
