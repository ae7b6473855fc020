//! Generation collaborator
//!
//! The job pipeline turns a free-text query into a moment by asking an
//! external renderer for a scene. [`GenerationClient`] is the seam; the
//! shipped implementation is [`FlashClient`], a small reqwest wrapper around
//! the Flash synchronous generation endpoint.
//!
//! Every field of a [`GenerationResult`] may be absent; the pipeline applies
//! defaults when it materializes the moment.

use crate::services::error::GenerationError;
use crate::utils::lenient;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

const GENERATE_SYNC_PATH: &str = "/api/v1/timepoints/generate/sync";
const SERVICE_KEY_HEADER: &str = "X-Service-Key";

/// Characters of an error body kept in `GenerationError::Upstream`
pub const ERROR_EXCERPT_CHARS: usize = 500;

/// Identifies who asked for a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub source: String,
    pub worker: String,
    pub job_id: String,
}

impl GenerationContext {
    pub fn for_job(job_id: Uuid) -> Self {
        Self {
            source: "clockchain".to_string(),
            worker: "renderer".to_string(),
            job_id: job_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub query: String,
    pub preset: String,
    #[serde(rename = "request_context")]
    pub context: GenerationContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grounding {
    /// Only a JSON integer counts as verified
    #[serde(deserialize_with = "lenient::strict_integer")]
    pub verified_year: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    #[serde(deserialize_with = "lenient::optional_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterRoster {
    #[serde(deserialize_with = "lenient::list_of")]
    pub characters: Vec<Character>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSummary {
    #[serde(deserialize_with = "lenient::optional_string")]
    pub plot_summary: Option<String>,
}

/// Scene returned by the generation service
///
/// Known fields are typed but forgiving: a value of the wrong type reads as
/// absent. The untouched response is kept in `raw` so it can be archived as a
/// scene artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationResult {
    #[serde(deserialize_with = "lenient::optional_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub timepoint_id: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub share_url: Option<String>,
    #[serde(deserialize_with = "lenient::year")]
    pub year: Option<i64>,
    #[serde(deserialize_with = "lenient::optional_or_absent")]
    pub grounding: Option<Grounding>,
    /// Month number or name
    pub month: Option<Value>,
    #[serde(deserialize_with = "lenient::optional_u32")]
    pub day: Option<u32>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub time_of_day: Option<String>,
    /// Explicit 4-digit 24h time, when the renderer gives one
    #[serde(deserialize_with = "lenient::optional_string")]
    pub time: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient::optional_or_absent")]
    pub characters: Option<CharacterRoster>,
    #[serde(deserialize_with = "lenient::optional_or_absent")]
    pub moment: Option<SceneSummary>,
    /// The query as the renderer understood it
    #[serde(deserialize_with = "lenient::optional_string")]
    pub query: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub era: Option<String>,

    #[serde(skip)]
    pub raw: Value,
}

impl GenerationResult {
    /// Parse a response body, keeping the original JSON in `raw`
    pub fn from_value(value: Value) -> Result<Self, GenerationError> {
        if !value.is_object() {
            return Err(GenerationError::malformed("expected a JSON object"));
        }
        // Null fields mean "absent"
        let cleaned: Map<String, Value> = value
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut result: GenerationResult = serde_json::from_value(Value::Object(cleaned))
            .map_err(|e| GenerationError::malformed(e.to_string()))?;
        result.raw = value;
        Ok(result)
    }

    /// External identifier, from `id` or `timepoint_id`
    pub fn external_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.timepoint_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Grounded year when present, else the raw year
    pub fn resolved_year(&self) -> Option<i64> {
        self.grounding
            .as_ref()
            .and_then(|g| g.verified_year)
            .or(self.year)
    }

    /// Named characters, in order
    pub fn figures(&self) -> Vec<String> {
        self.characters
            .iter()
            .flat_map(|roster| roster.characters.iter())
            .filter_map(|c| c.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn plot_summary(&self) -> Option<&str> {
        self.moment
            .as_ref()
            .and_then(|m| m.plot_summary.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Anything that can render a query into a scene
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a scene for `request`
    ///
    /// Implementations enforce their own timeout and report it as an error.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError>;
}

/// First `ERROR_EXCERPT_CHARS` characters of a response body
pub fn excerpt(body: &str) -> String {
    body.chars().take(ERROR_EXCERPT_CHARS).collect()
}

/// Client for the Flash renderer
#[derive(Clone)]
pub struct FlashClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl FlashClient {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GenerationError::transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            SERVICE_KEY_HEADER,
            HeaderValue::from_str(&self.service_key)
                .map_err(|e| GenerationError::transport(format!("Invalid service key: {e}")))?,
        );
        Ok(headers)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, GenerationError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::upstream(status, excerpt(&body)));
        }

        response
            .json()
            .await
            .map_err(|e| GenerationError::malformed(e.to_string()))
    }
}

#[async_trait]
impl GenerationClient for FlashClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        tracing::info!(
            "Flash generate: query={:?} preset={}",
            request.query,
            request.preset
        );

        let response = self
            .client
            .post(format!("{}{}", self.base_url, GENERATE_SYNC_PATH))
            .headers(self.build_headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::transport(e.to_string()))?;

        GenerationResult::from_value(Self::read_json(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_accessors() {
        let result = GenerationResult::from_value(json!({
            "timepoint_id": "tp-42",
            "name": "Battle of Thermopylae",
            "year": 480,
            "grounding": {"verified_year": -480},
            "characters": {"characters": [{"name": "Leonidas I"}, {"role": "extra"}, {"name": " Xerxes I "}]},
            "moment": {"plot_summary": "Three hundred Spartans hold the pass."},
            "era": null,
            "unexpected": {"nested": true}
        }))
        .unwrap();

        assert_eq!(result.external_id(), Some("tp-42"));
        assert_eq!(result.resolved_year(), Some(-480));
        assert_eq!(result.figures(), vec!["Leonidas I", "Xerxes I"]);
        assert_eq!(
            result.plot_summary(),
            Some("Three hundred Spartans hold the pass.")
        );
        assert!(result.era.is_none());
        assert_eq!(result.raw["unexpected"]["nested"], json!(true));
    }

    #[test]
    fn test_result_rejects_non_object() {
        assert!(matches!(
            GenerationResult::from_value(json!(["not", "a", "scene"])),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_off_type_fields_read_as_absent() {
        let result = GenerationResult::from_value(json!({
            "year": "four hundred",
            "day": "20",
            "grounding": {"verified_year": "480 BC"},
            "characters": {"characters": [{"name": null}, "Leonidas I", {"name": "Xerxes I"}]},
            "moment": "not an object",
            "tags": ["war", 3],
            "location": 12
        }))
        .unwrap();

        assert_eq!(result.resolved_year(), None);
        assert_eq!(result.day, Some(20));
        assert_eq!(result.figures(), vec!["Xerxes I"]);
        assert_eq!(result.plot_summary(), None);
        assert_eq!(result.tags, vec!["war"]);
        assert!(result.location.is_none());
    }

    #[test]
    fn test_request_wire_shape() {
        let id = Uuid::new_v4();
        let request = GenerationRequest {
            query: "Battle of Thermopylae".to_string(),
            preset: "balanced".to_string(),
            context: GenerationContext::for_job(id),
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["request_context"]["source"], json!("clockchain"));
        assert_eq!(wire["request_context"]["worker"], json!("renderer"));
        assert_eq!(wire["request_context"]["job_id"], json!(id.to_string()));
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        let body = "é".repeat(600);
        assert_eq!(excerpt(&body).chars().count(), ERROR_EXCERPT_CHARS);
        assert_eq!(excerpt("short"), "short");
    }
}
