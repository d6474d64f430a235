//! Roadmap generation
//!
//! [`RoadmapGenerator`] asks a generative model for a topic tree for a goal
//! name. Candidate models are tried in order: an invalid or expired
//! credential stops the chain at once (every model would fail the same way),
//! while any other failure moves on to the next candidate. The generator
//! never writes to the store; callers apply the result as a whole-array
//! topic replacement.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::model::{SubTopic, Topic};
use crate::progress::ids;
use crate::types::CallistoError;

pub const INVALID_CREDENTIAL_MESSAGE: &str = "Your Gemini API key is expired or invalid. \
Please get a new API key from https://aistudio.google.com/app/apikey and set GEMINI_API_KEY";

/// Substrings in provider error bodies that mean the key itself is bad
const CREDENTIAL_MARKERS: &[&str] = &[
    "API_KEY_INVALID",
    "API key expired",
    "API key is invalid",
    "API key not valid",
];

/// Failure of a single model call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("API key rejected: {0}")]
    InvalidCredential(String),

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ModelError {
    /// Classify a non-success HTTP reply
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED || CREDENTIAL_MARKERS.iter().any(|m| body.contains(m))
        {
            return Self::InvalidCredential(format!("HTTP {}", status.as_u16()));
        }
        match status {
            StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                Self::Unavailable(format!("HTTP {}: {}", status.as_u16(), body))
            }
            _ => Self::RequestFailed(format!("HTTP {}: {}", status.as_u16(), body)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoadmapError {
    #[error("Item name is required")]
    MissingName,

    #[error("Roadmap generation is not configured. Please set GEMINI_API_KEY.")]
    NotConfigured,

    #[error("{}", INVALID_CREDENTIAL_MESSAGE)]
    InvalidCredential,

    #[error("All models failed. Last error: {0}")]
    AllModelsFailed(ModelError),

    #[error("Invalid response from model: {0}")]
    MalformedResponse(String),
}

impl From<RoadmapError> for CallistoError {
    fn from(err: RoadmapError) -> Self {
        match err {
            RoadmapError::MissingName => CallistoError::Validation(err.to_string()),
            _ => CallistoError::Upstream(err.to_string()),
        }
    }
}

/// One text-generation backend
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate JSON text for `prompt` with `model`, constrained by `schema`
    async fn generate_json(&self, model: &str, prompt: &str, schema: &Value)
        -> Result<String, ModelError>;
}

// ============================================================================
// Gemini REST client
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Google Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate_json(
        &self,
        model: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, ModelError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let response = self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::from_status(status, &body));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| ModelError::Parse("No text in response".into()))
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Response schema: an array of `{title, subTopics: [{title}]}`
pub fn roadmap_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": {
                    "type": "STRING",
                    "description": "The title of the main learning module"
                },
                "subTopics": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": {
                                "type": "STRING",
                                "description": "The specific sub-topic or skill to learn"
                            }
                        },
                        "required": ["title"]
                    }
                }
            },
            "required": ["title", "subTopics"]
        }
    })
}

fn roadmap_prompt(item_name: &str) -> String {
    format!(
        "Generate a structured learning roadmap for the subject: \"{}\". \
         The roadmap should consist of main topics and for each topic, several detailed sub-topics. \
         Limit to 5-8 main topics to keep it focused.",
        item_name
    )
}

#[derive(Clone)]
pub struct RoadmapGenerator {
    client: Option<Arc<dyn ModelClient>>,
    candidates: Vec<String>,
    call_timeout: Option<Duration>,
}

impl RoadmapGenerator {
    pub fn new(client: Arc<dyn ModelClient>, candidates: Vec<String>) -> Self {
        Self {
            client: Some(client),
            candidates,
            call_timeout: None,
        }
    }

    /// A generator that fails every call with `NotConfigured`
    pub fn unconfigured() -> Self {
        Self {
            client: None,
            candidates: Vec::new(),
            call_timeout: None,
        }
    }

    /// Bound each model call; a call that runs past it counts as a
    /// transient failure and the chain moves on.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Worst-case time for one full pass over the candidates, when bounded
    pub fn chain_budget(&self) -> Option<Duration> {
        let per_call = self.call_timeout?;
        let calls = u32::try_from(self.candidates.len()).unwrap_or(u32::MAX);
        Some(per_call.saturating_mul(calls))
    }

    async fn call_model(
        &self,
        client: &dyn ModelClient,
        model: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, ModelError> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, client.generate_json(model, prompt, schema))
                .await
                .unwrap_or_else(|_| {
                    Err(ModelError::Network(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )))
                }),
            None => client.generate_json(model, prompt, schema).await,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Generate a fresh topic tree for `item_name`
    pub async fn generate(&self, item_name: &str) -> Result<Vec<Topic>, RoadmapError> {
        let item_name = item_name.trim();
        if item_name.is_empty() {
            return Err(RoadmapError::MissingName);
        }
        let client = self.client.as_ref().ok_or(RoadmapError::NotConfigured)?;

        let schema = roadmap_schema();
        let prompt = roadmap_prompt(item_name);
        let mut last_error = None;

        for model in &self.candidates {
            info!(model = %model, "Requesting roadmap");
            match self.call_model(&**client, model, &prompt, &schema).await {
                Ok(text) => {
                    info!(model = %model, "Roadmap model succeeded");
                    return parse_roadmap(&text, ids::next_millis());
                }
                Err(ModelError::InvalidCredential(detail)) => {
                    warn!(model = %model, detail = %detail, "Model credential rejected, aborting");
                    return Err(RoadmapError::InvalidCredential);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Roadmap model failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(RoadmapError::AllModelsFailed(last_error.unwrap_or_else(|| {
            ModelError::Unavailable("no candidate models configured".into())
        })))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTopic {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    sub_topics: Option<Vec<RawSubTopic>>,
}

#[derive(Debug, Deserialize)]
struct RawSubTopic {
    #[serde(default)]
    title: Option<Value>,
}

/// Non-empty string title, or `None`
fn title_of(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Normalize model output into topics with freshly minted ids. Missing
/// titles become positional placeholders.
pub fn parse_roadmap(text: &str, millis: i64) -> Result<Vec<Topic>, RoadmapError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RoadmapError::MalformedResponse("empty response".into()));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| RoadmapError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    if !value.is_array() {
        return Err(RoadmapError::MalformedResponse("expected an array".into()));
    }

    let raw: Vec<Value> = serde_json::from_value(value)
        .map_err(|e| RoadmapError::MalformedResponse(e.to_string()))?;

    let topics = raw
        .into_iter()
        .enumerate()
        .map(|(t_idx, entry)| {
            let raw_topic: RawTopic = serde_json::from_value(entry).unwrap_or(RawTopic {
                title: None,
                sub_topics: None,
            });
            let sub_topics = raw_topic
                .sub_topics
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(s_idx, st)| {
                    SubTopic::new(
                        ids::batch_sub_topic_id(millis, t_idx, s_idx),
                        title_of(st.title.as_ref())
                            .unwrap_or_else(|| format!("Sub-topic {}", s_idx + 1)),
                    )
                })
                .collect();

            Topic::new(
                ids::batch_topic_id(millis, t_idx),
                title_of(raw_topic.title.as_ref()).unwrap_or_else(|| format!("Topic {}", t_idx + 1)),
            )
            .with_sub_topics(sub_topics)
        })
        .collect();

    Ok(topics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_missing_titles() {
        let text = r#"[
            {"title": "Basics", "subTopics": [{"title": "Syntax"}, {}]},
            {"subTopics": []},
            {"title": "", "subTopics": [{"title": 7}]}
        ]"#;
        let topics = parse_roadmap(text, 42).unwrap();

        assert_eq!(topics.len(), 3);
        assert_eq!(topics[0].id, "topic-42-0");
        assert_eq!(topics[0].sub_topics[1].title, "Sub-topic 2");
        assert_eq!(topics[0].sub_topics[1].id, "subtopic-42-0-1");
        assert_eq!(topics[1].title, "Topic 2");
        assert_eq!(topics[2].title, "Topic 3");
        assert_eq!(topics[2].sub_topics[0].title, "Sub-topic 1");
        assert!(topics
            .iter()
            .all(|t| !t.is_completed && t.sub_topics.iter().all(|s| !s.is_completed)));
    }

    #[test]
    fn test_parse_rejects_non_arrays() {
        assert!(matches!(
            parse_roadmap(r#"{"title": "x"}"#, 1),
            Err(RoadmapError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_roadmap("not json", 1),
            Err(RoadmapError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_roadmap("  ", 1),
            Err(RoadmapError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ModelError::from_status(StatusCode::BAD_REQUEST, r#"{"reason":"API_KEY_INVALID"}"#),
            ModelError::InvalidCredential(_)
        ));
        assert!(matches!(
            ModelError::from_status(StatusCode::UNAUTHORIZED, ""),
            ModelError::InvalidCredential(_)
        ));
        assert!(matches!(
            ModelError::from_status(StatusCode::NOT_FOUND, "model not found"),
            ModelError::Unavailable(_)
        ));
        assert!(matches!(
            ModelError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ModelError::RequestFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_generator() {
        let generator = RoadmapGenerator::unconfigured();
        assert!(!generator.is_configured());
        assert_eq!(
            generator.generate("Rust").await,
            Err(RoadmapError::NotConfigured)
        );
        assert_eq!(generator.generate("  ").await, Err(RoadmapError::MissingName));
    }

    struct NeverCalled;

    #[async_trait]
    impl ModelClient for NeverCalled {
        async fn generate_json(&self, _: &str, _: &str, _: &Value) -> Result<String, ModelError> {
            Err(ModelError::Unavailable("unused".into()))
        }
    }

    #[test]
    fn test_chain_budget_covers_every_candidate() {
        let models = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let generator = RoadmapGenerator::new(Arc::new(NeverCalled), models);
        assert_eq!(generator.chain_budget(), None);

        let generator = generator.with_call_timeout(Duration::from_millis(250));
        assert_eq!(generator.call_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(generator.chain_budget(), Some(Duration::from_millis(750)));
        assert_eq!(RoadmapGenerator::unconfigured().chain_budget(), None);
    }

    #[test]
    fn test_schema_requests_array_of_topics() {
        let schema = roadmap_schema();
        assert_eq!(schema["type"], "ARRAY");
        assert_eq!(schema["items"]["required"][1], "subTopics");
    }
}
