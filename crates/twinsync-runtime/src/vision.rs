//! [`VisionAnalyzer`] – Gemini-backed judgement of a spot snapshot.
//!
//! The analyzer sends the JPEG snapshot, the spot's target description, the
//! voice's system prompt and the rendered memory context to Gemini's
//! `generateContent` endpoint and turns the structured reply into a
//! [`CheckResult`].
//!
//! Analysis never fails from the caller's point of view: a missing API key,
//! an HTTP error or an unparseable reply each produce an
//! [`Unknown`][twinsync_types::SpotStatus::Unknown] result with score 0 and a
//! feedback line describing what went wrong.
//!
//! # Example
//!
//! ```rust,no_run
//! use twinsync_runtime::vision::{SpotAnalyzer, VisionAnalyzer};
//! use twinsync_types::Voice;
//!
//! # async fn run(jpeg: Vec<u8>) {
//! let analyzer = VisionAnalyzer::new(Some("my-key".into()), "gemini-2.0-flash-exp");
//! let result = analyzer
//!     .analyze(&jpeg, "Empty sink with no dishes", Voice::Direct, "")
//!     .await;
//! println!("{} ({})", result.status, result.score);
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use twinsync_types::{CheckResult, MAX_ITEMS_TO_SORT, SpotStatus, ToSortItem, Voice};

use crate::voices;

/// Base URL of the Gemini model endpoints.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 1024;
/// Characters of an API error body kept in the feedback line.
const API_ERROR_EXCERPT: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// SpotAnalyzer trait
// ─────────────────────────────────────────────────────────────────────────────

/// Judges whether a snapshot matches a spot's target description.
///
/// Implementations fold every failure into an unknown result rather than
/// returning an error.
#[async_trait]
pub trait SpotAnalyzer: Send + Sync {
    /// Analyze `image` (JPEG bytes) against `description`.
    ///
    /// `memory_context` is the rendered history summary; empty when the spot
    /// has never been checked.
    async fn analyze(
        &self,
        image: &[u8],
        description: &str,
        voice: Voice,
        memory_context: &str,
    ) -> CheckResult;
}

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Internal failures of a Gemini round trip.  Never escapes the analyzer.
#[derive(Error, Debug)]
enum VisionError {
    #[error("Gemini API key not configured")]
    MissingKey,
    #[error("API error: {0}")]
    Api(String),
    #[error("Analysis error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Analysis error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Analysis error: {0}")]
    BadResponse(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Verdict
// ─────────────────────────────────────────────────────────────────────────────

/// The JSON object the model is asked to reply with.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Verdict {
    /// Whether the space matches the description.
    #[serde(default)]
    pub matches: bool,
    /// 0 = completely off, 100 = perfect match.
    #[serde(default)]
    pub score: f64,
    /// Feedback phrased in the requested voice.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Items that need to be sorted or put away (at most 5).
    #[serde(default)]
    pub items_to_sort: Vec<VerdictItem>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VerdictItem {
    /// What the item is.
    #[serde(default)]
    pub name: Option<String>,
    /// Where it is.
    #[serde(default)]
    pub location: Option<String>,
    /// What to do with it.
    #[serde(default)]
    pub suggestion: Option<String>,
}

impl Verdict {
    /// Normalise into a check result stamped now.
    pub fn into_result(self) -> CheckResult {
        let status = if self.matches {
            SpotStatus::Pass
        } else {
            SpotStatus::Fail
        };
        let score = if self.score.is_finite() {
            self.score.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        let items_to_sort = self
            .items_to_sort
            .into_iter()
            .take(MAX_ITEMS_TO_SORT)
            .map(|item| ToSortItem {
                name: item.name.unwrap_or_else(|| "Unknown".to_string()),
                location: item.location.unwrap_or_default(),
                suggestion: item.suggestion.unwrap_or_default(),
            })
            .collect();

        CheckResult {
            timestamp: Utc::now(),
            status,
            score,
            feedback: self
                .feedback
                .unwrap_or_else(|| "No feedback provided".to_string()),
            items_to_sort,
        }
    }
}

/// Strip an optional markdown code fence (```` ```json ```` or ```` ``` ````)
/// around the model's JSON reply.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse the model's reply text into a check result.
pub fn parse_verdict(text: &str) -> Result<CheckResult, serde_json::Error> {
    let verdict: Verdict = serde_json::from_str(strip_code_fence(text))?;
    Ok(verdict.into_result())
}

/// Build the text part of the request.
pub fn build_prompt(description: &str, voice: Voice, memory_context: &str) -> String {
    let schema = serde_json::to_string_pretty(&schema_for!(Verdict)).unwrap_or_default();
    let context = if memory_context.is_empty() {
        String::new()
    } else {
        format!("Context from previous checks: {memory_context}\n\n")
    };

    format!(
        "You are analyzing a space to see if it matches this description:\n\
         \"{description}\"\n\n\
         {voice_prompt}\n\n\
         Based on the image:\n\
         1. Does it match the description? (yes/no)\n\
         2. Give it a score from 0-100 (0 = completely off, 100 = perfect match)\n\
         3. Provide feedback in your voice style\n\
         4. List any items that need to be sorted/organized (max {MAX_ITEMS_TO_SORT})\n\n\
         {context}\
         Respond with a single JSON object matching this JSON Schema:\n{schema}",
        voice_prompt = voices::system_prompt(voice),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Image { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// VisionAnalyzer
// ─────────────────────────────────────────────────────────────────────────────

/// Gemini REST client implementing [`SpotAnalyzer`].
pub struct VisionAnalyzer {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl VisionAnalyzer {
    /// `api_key` of `None` (or empty) makes every analysis return an unknown
    /// result without touching the network.
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different model endpoint root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request(
        &self,
        image: &[u8],
        description: &str,
        voice: Voice,
        memory_context: &str,
    ) -> Result<CheckResult, VisionError> {
        let key = self.api_key.as_deref().ok_or(VisionError::MissingKey)?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: build_prompt(description, voice, memory_context),
                    },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json",
            },
        };

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini request rejected");
            return Err(VisionError::Api(
                text.chars().take(API_ERROR_EXCERPT).collect(),
            ));
        }

        let reply: GenerateResponse = response.json().await?;
        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or(VisionError::BadResponse("no candidate text in response"))?;
        debug!(chars = text.len(), "Gemini reply received");

        Ok(parse_verdict(&text)?)
    }
}

#[async_trait]
impl SpotAnalyzer for VisionAnalyzer {
    #[instrument(skip_all, fields(voice = %voice, bytes = image.len()))]
    async fn analyze(
        &self,
        image: &[u8],
        description: &str,
        voice: Voice,
        memory_context: &str,
    ) -> CheckResult {
        match self.request(image, description, voice, memory_context).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "analysis failed");
                CheckResult::unknown(e.to_string())
            }
        }
    }
}
