//! LLM intent analysis
//!
//! Classifies a free-text query into a small structured profile that
//! drives rediscovery. The provider is behind a trait so tests and
//! offline deployments can substitute a deterministic classifier; every
//! failure mode falls back to a heuristic profile instead of failing the
//! search.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::{CLASSIFIER_TIMEOUT_SECS, MAX_INTENT_KEYWORDS};
use crate::errors::{EngineError, Result};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You analyze web navigation queries. Respond with only a JSON \
object: {\"intent_type\": \"information_seeking|transaction|navigation|comparison\", \
\"domain_preference\": \"domain or null\", \"complexity\": \"simple|moderate|complex\", \
\"confidence\": 0.0-1.0, \"reasoning\": \"one sentence\", \
\"keywords\": [\"up to 4 search keywords\"]}";

/// Structured profile of what a query is trying to accomplish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub intent_type: String,
    #[serde(default)]
    pub domain_preference: Option<String>,
    pub complexity: String,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl IntentAnalysis {
    /// Rule-based profile used whenever the LLM is unavailable or slow.
    /// The raw query becomes the single rediscovery keyword.
    pub fn heuristic(query: &str) -> Self {
        Self {
            intent_type: "information_seeking".to_string(),
            domain_preference: None,
            complexity: "simple".to_string(),
            confidence: 0.5,
            reasoning: "rule-based fallback, no classifier available".to_string(),
            keywords: vec![query.trim().to_string()],
        }
    }

    fn sanitize(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.keywords.retain(|k| !k.trim().is_empty());
        self.keywords.truncate(MAX_INTENT_KEYWORDS);
        self
    }
}

/// Trait for query intent classification
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn analyze(&self, query: &str) -> Result<IntentAnalysis>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Classifier backed by an OpenAI-compatible chat completion endpoint.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base(OPENAI_API_BASE, api_key, model)
    }

    pub fn with_base(api_base: &str, api_key: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLASSIFIER_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl IntentClassifier for OpenAiClassifier {
    async fn analyze(&self, query: &str) -> Result<IntentAnalysis> {
        let url = format!("{}/chat/completions", self.api_base);
        let user_prompt = format!("Query: {query}");
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            // Deterministic classification
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::ClassifierUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::ClassifierUnavailable(format!(
                "API returned status: {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::ClassifierUnavailable(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| EngineError::ClassifierUnavailable("empty completion".to_string()))?;

        parse_analysis(content)
    }
}

/// Parse a model completion into an [`IntentAnalysis`].
pub fn parse_analysis(content: &str) -> Result<IntentAnalysis> {
    let json = extract_json(content)
        .ok_or_else(|| EngineError::ClassifierUnavailable("no JSON in completion".to_string()))?;
    let analysis: IntentAnalysis = serde_json::from_str(&json)
        .map_err(|e| EngineError::ClassifierUnavailable(format!("malformed JSON: {e}")))?;
    Ok(analysis.sanitize())
}

/// Extract the first balanced JSON object from model output.
///
/// Handles markdown code fences and prose around the object. Brace
/// matching is string-aware so braces inside values do not end the scan.
fn extract_json(content: &str) -> Option<String> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let start = cleaned.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in cleaned[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(cleaned[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
