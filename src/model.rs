//! Typed records for the path graph
//!
//! The graph schema has two node labels and two relationship types:
//!
//! ```text
//! (ROOT)-[HAS_STEP {taskIntent}]->(STEP)-[NEXT_STEP]->(STEP)->...
//! ```
//!
//! Everything that crosses the store-adapter boundary is decoded into the
//! structs below; untyped rows never escape `store/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{EngineError, Result};

/// Action a recorded step performs on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Click,
    Input,
    Wait,
    Select,
    Navigate,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Input => "input",
            Self::Wait => "wait",
            Self::Select => "select",
            Self::Navigate => "navigate",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "click" => Ok(Self::Click),
            "input" => Ok(Self::Input),
            "wait" => Ok(Self::Wait),
            "select" => Ok(Self::Select),
            "navigate" => Ok(Self::Navigate),
            other => Err(EngineError::InvalidSubmission {
                field: "action".to_string(),
                reason: format!("unknown action '{other}'"),
            }),
        }
    }
}

/// One step of a submitted navigation, as declared by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepData {
    pub url: String,

    /// Primary selector first, then fallbacks for resilience against DOM changes.
    #[serde(default)]
    pub selectors: Vec<String>,

    #[serde(default)]
    pub anchor_point: Option<String>,
    #[serde(default)]
    pub relative_path_from_anchor: Option<String>,

    pub action: StepAction,

    // Input metadata (action = input)
    #[serde(default)]
    pub is_input: bool,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub input_placeholder: Option<String>,

    // Wait metadata (action = wait)
    #[serde(default)]
    pub should_wait: bool,
    #[serde(default)]
    pub wait_message: Option<String>,
    #[serde(default)]
    pub max_wait_time: Option<i64>,

    pub description: String,
    #[serde(default)]
    pub text_labels: Vec<String>,
    #[serde(default)]
    pub context_text: Option<String>,

    /// Caller-declared replay reliability, 0.0-1.0.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

fn default_success_rate() -> f64 {
    1.0
}

impl StepData {
    /// Text the step embedding is computed from.
    pub fn embedding_text(&self) -> String {
        let mut text = format!("{} {}", self.description, self.text_labels.join(" "));
        if let Some(ctx) = &self.context_text {
            text.push(' ');
            text.push_str(ctx);
        }
        text.trim().to_string()
    }

    pub fn primary_selector(&self) -> &str {
        self.selectors
            .first()
            .map(String::as_str)
            .unwrap_or("no_selector")
    }
}

/// A complete recorded navigation submitted for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSubmission {
    pub session_id: String,
    /// What the user was trying to accomplish, free text.
    pub task_intent: String,
    /// Starting domain, normalized.
    pub domain: String,
    pub steps: Vec<StepData>,
}

/// What to do when the same (ROOT, first STEP) pair is re-submitted with a
/// different task intent. The source system silently overwrote; both
/// readings are kept selectable until stakeholders settle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntentOverwritePolicy {
    /// The edge carries the most recent intent for this entry point.
    #[default]
    OverwriteLatest,
    /// The first recorded intent stays; later submissions only add weight.
    KeepFirst,
}

// =============================================================================
// Decoded graph records
// =============================================================================

/// ROOT node: one per normalized domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootNode {
    pub domain: String,
    pub base_url: String,
    pub display_name: String,
    pub embedding: Option<Vec<f32>>,
    pub visit_count: i64,
    pub last_visited: DateTime<Utc>,
}

/// STEP node: one per distinct (url, primary selector, action) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepNode {
    pub step_id: String,
    pub url: String,
    pub domain: String,
    pub selectors: Vec<String>,
    pub anchor_point: Option<String>,
    pub relative_path_from_anchor: Option<String>,
    pub action: StepAction,
    pub is_input: bool,
    pub input_type: Option<String>,
    pub input_placeholder: Option<String>,
    pub should_wait: bool,
    pub wait_message: Option<String>,
    pub max_wait_time: Option<i64>,
    pub description: String,
    pub text_labels: Vec<String>,
    pub context_text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub success_rate: f64,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// HAS_STEP edge: marks a domain's entry point, labeled with the intent.
#[derive(Debug, Clone)]
pub struct HasStepEdge {
    pub task_intent: String,
    pub intent_embedding: Option<Vec<f32>>,
    pub weight: i64,
    /// Always 0 in current usage; kept for schema compatibility.
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// NEXT_STEP edge: ordered adjacency within recorded navigations.
#[derive(Debug, Clone)]
pub struct NextStepEdge {
    pub weight: i64,
    pub sequence_order: i64,
    pub path_id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A HAS_STEP candidate pulled for intent ranking.
#[derive(Debug, Clone)]
pub struct IntentCandidate {
    pub domain: String,
    pub first_step_id: String,
    pub task_intent: String,
    pub intent_embedding: Vec<f32>,
    pub weight: i64,
}

/// Aggregate node/relationship counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub root_nodes: u64,
    pub step_nodes: u64,
    pub has_step_relations: u64,
    pub next_step_relations: u64,
}

/// A popular entry point, ordered by accumulated weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularPath {
    pub domain: String,
    pub task_intent: String,
    pub usage_count: i64,
    pub first_step_description: String,
}

// =============================================================================
// API response shapes
// =============================================================================

/// Receipt returned by the ingestion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub status: String,
    pub domain: String,
    pub task_intent: String,
    pub steps_saved: usize,
}

/// One step of a matched path, formatted for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedStep {
    pub order: usize,
    pub url: String,
    pub action: StepAction,
    pub selectors: Vec<String>,
    pub description: String,
    pub is_input: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_placeholder: Option<String>,
    pub should_wait: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_message: Option<String>,
    pub text_labels: Vec<String>,
}

impl FormattedStep {
    pub fn from_node(order: usize, node: &StepNode) -> Self {
        Self {
            order,
            url: node.url.clone(),
            action: node.action,
            selectors: node.selectors.clone(),
            description: node.description.clone(),
            is_input: node.is_input,
            input_type: node.input_type.clone(),
            input_placeholder: node.input_placeholder.clone(),
            should_wait: node.should_wait,
            wait_message: node.wait_message.clone(),
            text_labels: node.text_labels.clone(),
        }
    }
}

/// One matched navigation with its full step sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPath {
    pub domain: String,
    pub task_intent: String,
    pub relevance_score: f32,
    pub weight: i64,
    pub steps: Vec<FormattedStep>,
}

/// Performance block attached to every search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPerformance {
    pub search_time_ms: u64,
    pub strategy: String,
    pub reasoning: String,
    pub max_similarity: f32,
}

/// Normalized search response, identical for every workflow branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub total_matched: usize,
    pub matched_paths: Vec<MatchedPath>,
    pub performance: SearchPerformance,
}

// =============================================================================
// Identity helpers
// =============================================================================

/// Stable STEP identity: content hash of (url, primary selector, action).
///
/// Sessions that repeat the same UI action hash to the same node, which is
/// what gives the graph natural deduplication.
pub fn step_id(url: &str, selectors: &[String], action: StepAction) -> String {
    let primary = selectors.first().map(String::as_str).unwrap_or("no_selector");
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"_");
    hasher.update(primary.as_bytes());
    hasher.update(b"_");
    hasher.update(action.as_str().as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Strip scheme and `www.` from a URL or host, yielding the ROOT key.
pub fn normalize_domain(input: &str) -> String {
    let stripped = input
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = stripped.split('/').next().unwrap_or(stripped);
    host.trim_start_matches("www.").to_lowercase()
}

/// Human display name derived from a domain on first ROOT creation.
pub fn display_name_for(domain: &str) -> String {
    domain.trim_end_matches(".com").replace('.', " ")
}
