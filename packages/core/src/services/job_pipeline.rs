//! Job Pipeline
//!
//! Turns a free-text query into a persisted moment. A job is created in
//! `pending`, moves to `processing` exactly once, and ends `completed` (with
//! the path of the written moment) or `failed` (with the error text). Jobs are
//! held in memory only.
//!
//! The generation call runs off the request path: [`JobPipeline::spawn`]
//! records the `processing` transition before handing the work to a tokio
//! task, so a caller polling [`JobPipeline::get`] never sees a spawned job
//! still `pending`.

use crate::models::{Job, JobStatus, Moment, Visibility};
use crate::services::collaborators::ContentJudge;
use crate::services::error::JobError;
use crate::services::generation::{
    GenerationClient, GenerationContext, GenerationRequest, GenerationResult,
};
use crate::services::graph_store::GraphStore;
use crate::services::scene_store::SceneStore;
use crate::utils::path_codec::{encode, month_name, month_number, slugify, PathParts};
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use uuid::Uuid;

/// Layer of moments produced by a generation job
pub const JOB_LAYER: u32 = 2;

/// Time used when the result names no recognisable time of day
pub const DEFAULT_TIME: &str = "1200";

pub const ONE_LINER_MAX_CHARS: usize = 200;

const UNKNOWN_PLACE: &str = "unknown";

const TIME_OF_DAY: &[(&str, &str)] = &[
    ("dawn", "0600"),
    ("early morning", "0700"),
    ("morning", "0900"),
    ("late morning", "1100"),
    ("midday", "1200"),
    ("noon", "1200"),
    ("early afternoon", "1300"),
    ("afternoon", "1400"),
    ("late afternoon", "1600"),
    ("evening", "1800"),
    ("dusk", "1900"),
    ("night", "2100"),
    ("late night", "2300"),
    ("midnight", "0000"),
];

/// Slugified `(country, region, city)` from a comma-separated location
///
/// `"Thermopylae, Central Greece, Greece"` reads city first and country last.
/// Two parts are `city, country` with the region taken from the city; one part
/// fills all three. Parts are counted before trimming, so a blank middle part
/// leaves that component empty.
pub fn parse_location(location: &str) -> (String, String, String) {
    let parts: Vec<&str> = location.split(',').map(str::trim).collect();

    let (country, region, city) = match parts.as_slice() {
        [] | [""] => (UNKNOWN_PLACE, UNKNOWN_PLACE, UNKNOWN_PLACE),
        [only] => (*only, *only, *only),
        [city, country] => (*country, *city, *city),
        [city, .., region, country] => (*country, *region, *city),
    };
    (slugify(country), slugify(region), slugify(city))
}

/// 4-digit time for a time-of-day phrase, [`DEFAULT_TIME`] when unknown
pub fn time_of_day_to_time(time_of_day: Option<&str>) -> &'static str {
    let Some(phrase) = time_of_day else {
        return DEFAULT_TIME;
    };
    let phrase = phrase.trim().to_lowercase();
    TIME_OF_DAY
        .iter()
        .find(|(keyword, _)| *keyword == phrase)
        .map(|(_, time)| *time)
        .unwrap_or(DEFAULT_TIME)
}

fn is_clock_time(time: &str) -> bool {
    time.len() == 4 && time.chars().all(|c| c.is_ascii_digit())
}

/// Month number from a number, a numeric string or a month name; 1 otherwise
pub fn resolve_month(month: Option<&Value>) -> u32 {
    let number = match month {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .ok()
            .or_else(|| month_number(s.trim())),
        _ => None,
    };
    number.filter(|n| (1..=12).contains(n)).unwrap_or(1)
}

/// Build the moment a finished job writes
pub fn materialize(job: &Job, result: &GenerationResult) -> Moment {
    let name = result
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| job.query.clone());
    let year = result.resolved_year().unwrap_or(0);
    let month_num = resolve_month(result.month.as_ref());
    let day = result.day.filter(|d| *d > 0).unwrap_or(1);
    let time = result
        .time
        .as_deref()
        .map(str::trim)
        .filter(|t| is_clock_time(t))
        .unwrap_or_else(|| time_of_day_to_time(result.time_of_day.as_deref()))
        .to_string();
    let (country, region, city) = parse_location(result.location.as_deref().unwrap_or(""));
    let slug = slugify(
        result
            .slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&name),
    );

    let path = encode(PathParts {
        year,
        month_num,
        day,
        time: &time,
        country: &country,
        region: &region,
        city: &city,
        slug: &slug,
    });

    let one_liner = result
        .plot_summary()
        .or(result.query.as_deref().filter(|q| !q.is_empty()))
        .unwrap_or(&job.query)
        .chars()
        .take(ONE_LINER_MAX_CHARS)
        .collect();

    let mut moment = Moment::new(path);
    moment.node_type = "event".to_string();
    moment.name = name;
    moment.year = Some(year);
    moment.month = month_name(month_num).unwrap_or("january").to_string();
    moment.month_num = month_num;
    moment.day = day;
    moment.time = time;
    moment.country = country;
    moment.region = region;
    moment.city = city;
    moment.slug = slug;
    moment.layer = JOB_LAYER;
    moment.visibility = job.visibility;
    moment.created_by = job.user_id.clone().unwrap_or_else(|| "system".to_string());
    moment.one_liner = one_liner;
    moment.tags = result.tags.iter().cloned().collect();
    moment.figures = result.figures();
    moment.flash_timepoint_id = result.external_id().map(str::to_string);
    moment.flash_slug = result.slug.clone().unwrap_or_default();
    moment.flash_share_url = result.share_url.clone().unwrap_or_default();
    moment.era = result.era.clone().unwrap_or_default();
    moment
}

/// Completion handle for a spawned job
pub struct JobHandle {
    id: Uuid,
    receiver: oneshot::Receiver<Job>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the job to reach a terminal state
    pub async fn wait(self) -> anyhow::Result<Job> {
        self.receiver
            .await
            .with_context(|| format!("Job {} task ended without reporting", self.id))
    }
}

pub struct JobPipeline {
    store: Arc<GraphStore>,
    client: Arc<dyn GenerationClient>,
    scenes: SceneStore,
    jobs: RwLock<HashMap<Uuid, Job>>,
    judge: Option<Arc<dyn ContentJudge>>,
}

impl JobPipeline {
    pub fn new(store: Arc<GraphStore>, client: Arc<dyn GenerationClient>, scenes: SceneStore) -> Self {
        Self {
            store,
            client,
            scenes,
            jobs: RwLock::new(HashMap::new()),
            judge: None,
        }
    }

    /// Screen every submitted query with `judge`
    pub fn with_judge(mut self, judge: Arc<dyn ContentJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn scenes(&self) -> &SceneStore {
        &self.scenes
    }

    /// Register a new `pending` job
    pub async fn create(
        &self,
        query: impl Into<String>,
        preset: Option<String>,
        user_id: Option<String>,
        visibility: Visibility,
    ) -> Job {
        let job = Job::new(query, preset, user_id, visibility);
        self.jobs.write().await.insert(job.id, job.clone());
        tracing::info!("Created job {} for query {:?}", job.id, job.query);
        job
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Job, JobError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or_else(|| JobError::not_found(job_id))
    }

    /// Move a pending job to `processing`
    async fn begin(&self, job_id: Uuid) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| JobError::not_found(job_id))?;
        if job.status != JobStatus::Pending {
            return Err(JobError::already_started(job_id, job.status));
        }
        job.start();
        Ok(job.clone())
    }

    /// Run a pending job to completion on the current task
    ///
    /// Generation or storage failures do not surface here; they leave the
    /// returned job `failed`.
    pub async fn process(&self, job_id: Uuid) -> Result<Job, JobError> {
        let job = self.begin(job_id).await?;
        Ok(self.run(job).await)
    }

    /// Run a pending job on a background task
    pub async fn spawn(self: &Arc<Self>, job_id: Uuid) -> Result<JobHandle, JobError> {
        let job = self.begin(job_id).await?;
        let (sender, receiver) = oneshot::channel();
        let pipeline = Arc::clone(self);

        tokio::spawn(async move {
            let finished = pipeline.run(job).await;
            // The caller may have dropped the handle
            let _ = sender.send(finished);
        });

        Ok(JobHandle { id: job_id, receiver })
    }

    /// Screen, create and spawn a job in one step
    pub async fn submit(
        self: &Arc<Self>,
        query: impl Into<String>,
        preset: Option<String>,
        user_id: Option<String>,
        visibility: Visibility,
    ) -> Result<JobHandle, JobError> {
        let query = query.into();
        if let Some(judge) = &self.judge {
            let verdict = judge.screen(&query).await.map_err(JobError::Screening)?;
            tracing::info!("Judge verdict for {:?}: {}", query, verdict);
            if !verdict.allows_generation() {
                return Err(JobError::rejected("Query rejected by content judge"));
            }
        }

        let job = self.create(query, preset, user_id, visibility).await;
        self.spawn(job.id).await
    }

    async fn run(&self, job: Job) -> Job {
        let outcome = self.execute(&job).await;

        let mut jobs = self.jobs.write().await;
        let Some(stored) = jobs.get_mut(&job.id) else {
            return job;
        };
        match outcome {
            Ok(path) => {
                tracing::info!("Job {} completed: {}", job.id, path);
                stored.complete(path);
            }
            Err(e) => {
                tracing::error!("Job {} failed: {:#}", job.id, e);
                stored.fail(format!("{:#}", e));
            }
        }
        stored.clone()
    }

    /// Generate, write the moment and archive the scene; returns the path
    async fn execute(&self, job: &Job) -> anyhow::Result<String> {
        let request = GenerationRequest {
            query: job.query.clone(),
            preset: job.preset.clone(),
            context: GenerationContext::for_job(job.id),
        };
        let result = self.client.generate(&request).await?;

        let moment = materialize(job, &result);
        let moment = self.store.upsert_node(moment).await?;

        // The moment exists now; a lost artifact does not fail the job
        if let Err(e) = self.scenes.save(&moment.path, &result.raw).await {
            tracing::warn!("Failed to save scene for {}: {:#}", moment.path, e);
        }

        Ok(moment.path)
    }
}
