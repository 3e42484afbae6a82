//! Boundary to the external text-generation oracle.
//!
//! The oracle is untrusted and may be unavailable. Callers never see an
//! [`OracleError`]: replies are interpreted into an [`OracleReply`] whose
//! fallback opinions are built here.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Score assumed when the oracle gives no usable opinion.
pub const FALLBACK_SCORE: f64 = 50.0;

/// Effort assumed when the oracle answers without structured data.
pub const UNSTRUCTURED_EFFORT: &str = "2-4 hours";

/// Recommendation text when the oracle offers none.
pub const NO_RECOMMENDATIONS: &str = "No AI recommendations available";

/// Prefix of the recommendation text when the oracle call failed.
pub const ANALYSIS_FAILED_MARKER: &str = "AI analysis failed";

const UNSTRUCTURED_EXCERPT_CHARS: usize = 500;

static JSON_OBJECT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Oracle error type.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle request failed: {0}")]
    Request(String),

    #[error("Oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

/// A single prompt sent to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text generation capability.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError>;

    /// False when every call is known to fail.
    fn is_available(&self) -> bool {
        true
    }
}

/// Oracle used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOracle;

#[async_trait]
impl TextOracle for DisabledOracle {
    async fn generate(&self, _request: &OracleRequest) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("API key not configured".to_string()))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Oracle connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Build the oracle described by `config`.
pub fn oracle_from_config(config: &OracleConfig) -> Result<Arc<dyn TextOracle>, OracleError> {
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            info!("Oracle enabled ({} at {})", config.model, config.base_url);
            Ok(Arc::new(OpenAiOracle::new(config.clone())?))
        }
        _ => {
            warn!("No oracle API key configured, AI analysis disabled");
            Ok(Arc::new(DisabledOracle))
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions oracle.
pub struct OpenAiOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextOracle for OpenAiOracle {
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| OracleError::Unavailable("API key not configured".to_string()))?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let endpoint = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!("Oracle request to {} ({} chars)", endpoint, request.prompt.len());

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("response has no content".to_string()))
    }
}

/// Complexity opinion offered by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleOpinion {
    pub complexity_score: Option<f64>,
    pub complexity_reasoning: Option<String>,
    pub migration_effort: Option<String>,
    pub key_challenges: Vec<String>,
    pub recommendations: String,
    pub custom_policies: Vec<String>,
}

/// Interpreted oracle reply.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    /// A JSON object could be located and parsed.
    Structured(OracleOpinion),
    /// Free text without usable structure.
    Unstructured(String),
    /// The call itself failed.
    Failed(String),
}

impl OracleReply {
    /// Classify the outcome of a scoring call.
    pub fn interpret(result: Result<String, OracleError>) -> Self {
        match result {
            Ok(text) => match parse_opinion(&text) {
                Some(opinion) => OracleReply::Structured(opinion),
                None => {
                    debug!("Oracle reply has no parseable JSON object");
                    OracleReply::Unstructured(text)
                }
            },
            Err(e) => {
                warn!("Oracle analysis failed: {}", e);
                OracleReply::Failed(e.to_string())
            }
        }
    }

    /// The opinion to merge, with fallbacks for unstructured or failed replies.
    pub fn opinion(&self) -> OracleOpinion {
        match self {
            OracleReply::Structured(opinion) => opinion.clone(),
            OracleReply::Unstructured(raw) => {
                let excerpt: String = raw.chars().take(UNSTRUCTURED_EXCERPT_CHARS).collect();
                OracleOpinion {
                    complexity_score: Some(FALLBACK_SCORE),
                    complexity_reasoning: Some("AI analysis completed".to_string()),
                    migration_effort: Some(UNSTRUCTURED_EFFORT.to_string()),
                    key_challenges: vec!["Standard migration requirements".to_string()],
                    recommendations: if excerpt.trim().is_empty() {
                        NO_RECOMMENDATIONS.to_string()
                    } else {
                        excerpt
                    },
                    custom_policies: Vec::new(),
                }
            }
            OracleReply::Failed(reason) => OracleOpinion {
                complexity_score: Some(FALLBACK_SCORE),
                complexity_reasoning: None,
                migration_effort: None,
                key_challenges: vec!["Analysis unavailable".to_string()],
                recommendations: format!("{}: {}", ANALYSIS_FAILED_MARKER, reason),
                custom_policies: Vec::new(),
            },
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, OracleReply::Structured(_))
    }
}

fn parse_opinion(text: &str) -> Option<OracleOpinion> {
    let candidate = JSON_OBJECT_PATTERN.find(text)?;
    let value: Value = serde_json::from_str(candidate.as_str()).ok()?;
    let object = value.as_object()?;

    Some(OracleOpinion {
        complexity_score: object.get("complexity_score").and_then(score_value),
        complexity_reasoning: object
            .get("complexity_reasoning")
            .and_then(Value::as_str)
            .map(str::to_string),
        migration_effort: object
            .get("migration_effort")
            .and_then(text_value)
            .filter(|e| !e.trim().is_empty()),
        key_challenges: string_list(object.get("key_challenges")),
        recommendations: normalize_recommendations(object.get("recommendations")),
        custom_policies: string_list(object.get("custom_policies")),
    })
}

/// Collapse the recommendations field into prose.
pub fn normalize_recommendations(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Some(other) => other.to_string(),
    };

    if text.trim().is_empty() {
        NO_RECOMMENDATIONS.to_string()
    } else {
        text
    }
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
