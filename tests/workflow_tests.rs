//! Workflow branching tests: threshold behavior, classifier involvement,
//! agent fan-out bounds, and rediscovery ranking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use waymark::agents::{KeywordSearchAgent, RediscoveryAgent};
use waymark::embedding::Embedder;
use waymark::errors::{EngineError, Result};
use waymark::intent::{IntentAnalysis, IntentClassifier};
use waymark::model::{PathSubmission, StepAction, StepData};
use waymark::search::PathSearch;
use waymark::store::InMemoryStore;
use waymark::workflow::{SearchWorkflow, STRATEGY_RANK_EXISTING, STRATEGY_REDISCOVER};
use waymark::{EngineConfig, IntentOverwritePolicy, PathGraphEngine};

/// Unit vector with cosine similarity 0.35 against [1, 0, 0].
const WEAK_MATCH: [f32; 3] = [0.35, 0.936_75, 0.0];

/// Lookup-table embedder that records every embedded text.
struct RecordingEmbedder {
    table: HashMap<String, Vec<f32>>,
    seen: Mutex<Vec<String>>,
}

impl RecordingEmbedder {
    fn new(entries: &[(&str, [f32; 3])]) -> Arc<Self> {
        Arc::new(Self {
            table: entries
                .iter()
                .map(|(text, vec)| (text.to_string(), vec.to_vec()))
                .collect(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn embedded(&self, text: &str) -> bool {
        self.seen.lock().iter().any(|t| t == text)
    }
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.seen.lock().push(text.trim().to_string());
        Some(
            self.table
                .get(text.trim())
                .cloned()
                .unwrap_or_else(|| vec![0.0, 0.0, 1.0]),
        )
    }

    fn dimension(&self) -> usize {
        3
    }
}

struct SpyClassifier {
    called: AtomicBool,
    keywords: Vec<&'static str>,
}

impl SpyClassifier {
    fn new(keywords: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            called: AtomicBool::new(false),
            keywords,
        })
    }

    fn was_called(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for SpyClassifier {
    async fn analyze(&self, _query: &str) -> Result<IntentAnalysis> {
        self.called.store(true, Ordering::SeqCst);
        Ok(IntentAnalysis {
            intent_type: "transaction".to_string(),
            domain_preference: None,
            complexity: "simple".to_string(),
            confidence: 0.9,
            reasoning: "spy classifier".to_string(),
            keywords: self.keywords.iter().map(|k| k.to_string()).collect(),
        })
    }
}

struct FailingClassifier;

#[async_trait]
impl IntentClassifier for FailingClassifier {
    async fn analyze(&self, _query: &str) -> Result<IntentAnalysis> {
        Err(EngineError::ClassifierUnavailable("synthetic outage".to_string()))
    }
}

struct HangingClassifier;

#[async_trait]
impl IntentClassifier for HangingClassifier {
    async fn analyze(&self, _query: &str) -> Result<IntentAnalysis> {
        std::future::pending().await
    }
}

fn tickets_submission() -> PathSubmission {
    PathSubmission {
        session_id: "session-1".to_string(),
        task_intent: "buy concert tickets".to_string(),
        domain: "tickets.example.com".to_string(),
        steps: vec![StepData {
            url: "https://tickets.example.com/events".to_string(),
            selectors: vec!["#buy-now".to_string()],
            anchor_point: None,
            relative_path_from_anchor: None,
            action: StepAction::Click,
            is_input: false,
            input_type: None,
            input_placeholder: None,
            should_wait: false,
            wait_message: None,
            max_wait_time: None,
            description: "Open the event page".to_string(),
            text_labels: vec!["Buy Now".to_string()],
            context_text: None,
            success_rate: 1.0,
        }],
    }
}

async fn seeded_engine(
    embedder: Arc<RecordingEmbedder>,
    classifier: Option<Arc<dyn IntentClassifier>>,
) -> PathGraphEngine {
    let store = Arc::new(InMemoryStore::new());
    let config = EngineConfig {
        intent_policy: IntentOverwritePolicy::default(),
        ..EngineConfig::default()
    };
    let engine = PathGraphEngine::assemble(store, embedder, classifier, config);
    engine.submit(&tickets_submission()).await.unwrap();
    engine
}

#[tokio::test]
async fn test_strong_match_skips_classifier() {
    let embedder = RecordingEmbedder::new(&[
        ("buy concert tickets", WEAK_MATCH),
        ("get tickets to the concert", WEAK_MATCH),
    ]);
    let spy = SpyClassifier::new(vec!["never used"]);
    let engine = seeded_engine(embedder, Some(spy.clone() as Arc<dyn IntentClassifier>)).await;

    let response = engine
        .search("get tickets to the concert", None, None)
        .await
        .unwrap();

    assert_eq!(response.performance.strategy, STRATEGY_RANK_EXISTING);
    assert!(response.performance.max_similarity > 0.99);
    assert_eq!(response.total_matched, 1);
    assert!(!spy.was_called());
}

#[tokio::test]
async fn test_weak_match_rediscovers_with_bounded_fanout() {
    let embedder = RecordingEmbedder::new(&[
        ("buy concert tickets", WEAK_MATCH),
        ("get tickets for the show", [1.0, 0.0, 0.0]),
        ("concert tickets", WEAK_MATCH),
    ]);
    let spy = SpyClassifier::new(vec![
        "concert tickets",
        "unrelated keyword",
        "third keyword",
        "fourth keyword",
    ]);
    let engine = seeded_engine(embedder.clone(), Some(spy.clone() as Arc<dyn IntentClassifier>)).await;

    let response = engine
        .search("get tickets for the show", None, None)
        .await
        .unwrap();

    assert!(spy.was_called());
    assert_eq!(response.performance.strategy, STRATEGY_REDISCOVER);
    assert_eq!(response.performance.max_similarity, 0.35);
    assert_eq!(response.total_matched, 1);

    // The reported relevance is the agent's real similarity, not the
    // bonused ordering score
    let path = &response.matched_paths[0];
    assert_eq!(path.domain, "tickets.example.com");
    assert!(path.relevance_score > 0.99);

    // Fan-out stops at two keywords
    assert!(embedder.embedded("concert tickets"));
    assert!(embedder.embedded("unrelated keyword"));
    assert!(!embedder.embedded("third keyword"));
    assert!(!embedder.embedded("fourth keyword"));
}

#[tokio::test]
async fn test_classifier_outage_degrades_to_heuristic() {
    let embedder = RecordingEmbedder::new(&[
        ("buy concert tickets", WEAK_MATCH),
        ("get tickets for the show", [1.0, 0.0, 0.0]),
    ]);
    let engine = seeded_engine(
        embedder,
        Some(Arc::new(FailingClassifier) as Arc<dyn IntentClassifier>),
    )
    .await;

    // Heuristic keyword is the raw query, which still scores above the
    // similarity floor, so rediscovery answers anyway
    let response = engine
        .search("get tickets for the show", None, None)
        .await
        .unwrap();
    assert_eq!(response.performance.strategy, STRATEGY_REDISCOVER);
    assert_eq!(response.total_matched, 1);
}

#[tokio::test]
async fn test_empty_rediscovery_still_reports_rediscover_strategy() {
    let embedder = RecordingEmbedder::new(&[("buy concert tickets", WEAK_MATCH)]);
    let spy = SpyClassifier::new(vec!["also unknown"]);
    let engine = seeded_engine(embedder, Some(spy.clone() as Arc<dyn IntentClassifier>)).await;

    // Unknown texts embed far from every stored intent, so neither the
    // direct search nor the agents find anything. The response is an
    // empty rediscovery, not a fallback
    let response = engine.search("completely unrelated", None, None).await.unwrap();

    assert!(spy.was_called());
    assert_eq!(response.performance.strategy, STRATEGY_REDISCOVER);
    assert_eq!(response.total_matched, 0);
    assert_eq!(response.performance.max_similarity, 0.0);
}

#[tokio::test]
async fn test_keywordless_classification_fans_out_on_raw_query() {
    let embedder = RecordingEmbedder::new(&[
        ("buy concert tickets", WEAK_MATCH),
        ("get tickets for the show", [1.0, 0.0, 0.0]),
    ]);
    let spy = SpyClassifier::new(vec![]);
    let engine = seeded_engine(embedder, Some(spy.clone() as Arc<dyn IntentClassifier>)).await;

    // The raw query scores 0.35: below the branch threshold but above the
    // similarity floor. With no extracted keywords the agent searches the
    // raw query itself and still recovers the path
    let response = engine
        .search("get tickets for the show", None, None)
        .await
        .unwrap();

    assert!(spy.was_called());
    assert_eq!(response.performance.strategy, STRATEGY_REDISCOVER);
    assert_eq!(response.total_matched, 1);
    assert_eq!(response.matched_paths[0].domain, "tickets.example.com");
    assert_eq!(response.matched_paths[0].task_intent, "buy concert tickets");
}

#[tokio::test(start_paused = true)]
async fn test_hung_classifier_hits_deadline_and_degrades() {
    let embedder = RecordingEmbedder::new(&[
        ("buy concert tickets", WEAK_MATCH),
        ("get tickets for the show", [1.0, 0.0, 0.0]),
    ]);
    let engine = seeded_engine(
        embedder,
        Some(Arc::new(HangingClassifier) as Arc<dyn IntentClassifier>),
    )
    .await;

    // The classifier never resolves; paused time auto-advances past the
    // deadline and the heuristic profile drives rediscovery instead
    let response = engine
        .search("get tickets for the show", None, None)
        .await
        .unwrap();

    assert_eq!(response.performance.strategy, STRATEGY_REDISCOVER);
    assert_eq!(response.total_matched, 1);
    assert_eq!(response.matched_paths[0].task_intent, "buy concert tickets");
}

#[tokio::test]
async fn test_duplicate_agent_finds_collapse() {
    let store = Arc::new(InMemoryStore::new());
    let embedder = RecordingEmbedder::new(&[
        ("buy concert tickets", WEAK_MATCH),
        ("first keyword", WEAK_MATCH),
        ("second keyword", WEAK_MATCH),
    ]);
    let config = EngineConfig::default();
    let engine = PathGraphEngine::assemble(
        store.clone(),
        embedder.clone(),
        Some(SpyClassifier::new(vec!["first keyword", "second keyword"])
            as Arc<dyn IntentClassifier>),
        config,
    );
    engine.submit(&tickets_submission()).await.unwrap();

    // Both keywords hit the same stored path; the response keeps one
    let response = engine.search("no direct match", None, None).await.unwrap();
    assert_eq!(response.performance.strategy, STRATEGY_REDISCOVER);
    assert_eq!(response.total_matched, 1);
}

#[tokio::test]
async fn test_workflow_composes_over_bare_primitives() {
    let store = Arc::new(InMemoryStore::new());
    let embedder = RecordingEmbedder::new(&[("buy concert tickets", [1.0, 0.0, 0.0])]);
    let search = Arc::new(PathSearch::new(store.clone(), embedder.clone()));
    let agents: Vec<Arc<dyn RediscoveryAgent>> =
        vec![Arc::new(KeywordSearchAgent::new(search.clone()))];
    let workflow = SearchWorkflow::new(search, None, agents);

    let engine = PathGraphEngine::assemble(
        store,
        embedder,
        None,
        EngineConfig::default(),
    );
    engine.submit(&tickets_submission()).await.unwrap();

    let response = workflow.run("buy concert tickets", None, 3).await.unwrap();
    assert_eq!(response.performance.strategy, STRATEGY_RANK_EXISTING);
    assert_eq!(response.query, "buy concert tickets");
    assert_eq!(response.total_matched, 1);
}
