//! Conditional search workflow
//!
//! An explicit state machine over the search primitive:
//!
//! ```text
//! AnalyzeSimilarity --(>= threshold)--> RankExisting --> Finalize
//!        |
//!        +--(below)--> AnalyzeIntent --> Rediscover --> Finalize
//! ```
//!
//! The initial search runs exactly once and its results are cached in the
//! run state; the strong-match branch answers straight from that cache.
//! The rediscovery branch answers with whatever the agents found, empty
//! included. All branches produce the same response shape. The workflow
//! object is built once and shared read-only across requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;

use crate::agents::{RediscoveredPath, RediscoveryAgent};
use crate::constants::{CLASSIFIER_DEADLINE_SECS, SIMILARITY_BRANCH_THRESHOLD};
use crate::errors::Result;
use crate::intent::{IntentAnalysis, IntentClassifier};
use crate::model::{MatchedPath, SearchPerformance, SearchResponse};
use crate::search::PathSearch;
use crate::similarity::round_score;

/// Strategy labels reported in the response performance block.
pub const STRATEGY_RANK_EXISTING: &str = "rank_existing_paths";
pub const STRATEGY_REDISCOVER: &str = "rediscover_with_different_agent";
pub const STRATEGY_FALLBACK: &str = "fallback_direct_search";

/// Workflow states. Transitions only move forward; every run visits
/// `AnalyzeSimilarity` first and `Finalize` last.
#[derive(Debug)]
enum WorkflowState {
    AnalyzeSimilarity,
    RankExisting,
    AnalyzeIntent,
    Rediscover(IntentAnalysis),
    Finalize,
}

/// Mutable state threaded through one run.
struct RunState {
    query: String,
    domain_hint: Option<String>,
    limit: usize,
    started: Instant,
    /// Results of the single direct search, reused by two branches.
    initial: Vec<MatchedPath>,
    max_similarity: f32,
    strategy: &'static str,
    reasoning: String,
    matched: Vec<MatchedPath>,
}

pub struct SearchWorkflow {
    search: Arc<PathSearch>,
    classifier: Option<Arc<dyn IntentClassifier>>,
    agents: Vec<Arc<dyn RediscoveryAgent>>,
}

impl SearchWorkflow {
    pub fn new(
        search: Arc<PathSearch>,
        classifier: Option<Arc<dyn IntentClassifier>>,
        agents: Vec<Arc<dyn RediscoveryAgent>>,
    ) -> Self {
        Self {
            search,
            classifier,
            agents,
        }
    }

    /// Run one search end to end.
    pub async fn run(
        &self,
        query: &str,
        domain_hint: Option<&str>,
        limit: usize,
    ) -> Result<SearchResponse> {
        let mut run = RunState {
            query: query.to_string(),
            domain_hint: domain_hint.map(str::to_string),
            limit,
            started: Instant::now(),
            initial: Vec::new(),
            max_similarity: 0.0,
            strategy: STRATEGY_FALLBACK,
            reasoning: String::new(),
            matched: Vec::new(),
        };

        let mut state = WorkflowState::AnalyzeSimilarity;
        loop {
            state = match self.step(state, &mut run).await? {
                Some(next) => next,
                None => break,
            };
        }

        Ok(SearchResponse {
            query: run.query,
            total_matched: run.matched.len(),
            matched_paths: run.matched,
            performance: SearchPerformance {
                search_time_ms: run.started.elapsed().as_millis() as u64,
                strategy: run.strategy.to_string(),
                reasoning: run.reasoning,
                max_similarity: round_score(run.max_similarity),
            },
        })
    }

    /// One transition. Returns the next state, or `None` after `Finalize`.
    async fn step(
        &self,
        state: WorkflowState,
        run: &mut RunState,
    ) -> Result<Option<WorkflowState>> {
        match state {
            WorkflowState::AnalyzeSimilarity => {
                run.initial = self
                    .search
                    .search(&run.query, run.domain_hint.as_deref(), run.limit)
                    .await?;
                run.max_similarity = run
                    .initial
                    .first()
                    .map(|path| path.relevance_score)
                    .unwrap_or(0.0);
                tracing::info!(
                    query = %run.query,
                    max_similarity = run.max_similarity,
                    matches = run.initial.len(),
                    "Similarity analysis complete"
                );

                if run.max_similarity >= SIMILARITY_BRANCH_THRESHOLD {
                    Ok(Some(WorkflowState::RankExisting))
                } else {
                    Ok(Some(WorkflowState::AnalyzeIntent))
                }
            }

            WorkflowState::RankExisting => {
                run.strategy = STRATEGY_RANK_EXISTING;
                run.reasoning = format!(
                    "Strong match found (similarity {:.3} >= {SIMILARITY_BRANCH_THRESHOLD}), \
                     reusing stored paths",
                    run.max_similarity
                );
                run.matched = std::mem::take(&mut run.initial);
                Ok(Some(WorkflowState::Finalize))
            }

            WorkflowState::AnalyzeIntent => {
                let analysis = self.analyze_intent(&run.query).await;
                Ok(Some(WorkflowState::Rediscover(analysis)))
            }

            WorkflowState::Rediscover(analysis) => {
                let mut found = Vec::new();
                for agent in &self.agents {
                    match agent.rediscover(&run.query, &analysis).await {
                        Ok(paths) => found.extend(paths),
                        Err(e) => {
                            tracing::warn!(
                                agent = agent.name(),
                                error = %e,
                                "Agent failed, skipping"
                            );
                        }
                    }
                }

                let rediscovered = finalize_rediscovered(found, run.limit);
                if rediscovered.is_empty() {
                    tracing::info!("Rediscovery found nothing");
                }
                run.strategy = STRATEGY_REDISCOVER;
                run.reasoning = format!(
                    "Weak match (similarity {:.3} < {SIMILARITY_BRANCH_THRESHOLD}), \
                     rediscovered {} paths via {} intent",
                    run.max_similarity,
                    rediscovered.len(),
                    analysis.intent_type
                );
                run.matched = rediscovered;
                Ok(Some(WorkflowState::Finalize))
            }

            WorkflowState::Finalize => Ok(None),
        }
    }

    /// Classify under a hard deadline; any failure degrades to the
    /// heuristic profile.
    async fn analyze_intent(&self, query: &str) -> IntentAnalysis {
        let Some(classifier) = &self.classifier else {
            tracing::debug!("No classifier configured, using heuristic intent");
            return IntentAnalysis::heuristic(query);
        };

        let deadline = Duration::from_secs(CLASSIFIER_DEADLINE_SECS);
        match tokio::time::timeout(deadline, classifier.analyze(query)).await {
            Ok(Ok(analysis)) => {
                tracing::debug!(
                    intent_type = %analysis.intent_type,
                    reasoning = %analysis.reasoning,
                    "Intent classified"
                );
                analysis
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Intent classification failed, using heuristic");
                IntentAnalysis::heuristic(query)
            }
            Err(_) => {
                tracing::warn!("Intent classification deadline exceeded, using heuristic");
                IntentAnalysis::heuristic(query)
            }
        }
    }
}

/// Rank agent finds by bonused score, keep the best per (domain, intent),
/// and strip the ranking metadata before anything reaches a client.
fn finalize_rediscovered(mut found: Vec<RediscoveredPath>, limit: usize) -> Vec<MatchedPath> {
    found.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.rediscovery_score)));

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in found {
        let key = (item.path.domain.clone(), item.path.task_intent.clone());
        if seen.insert(key) {
            tracing::debug!(
                agent = %item.agent_source,
                domain = %item.path.domain,
                score = item.rediscovery_score,
                "Keeping rediscovered path"
            );
            unique.push(item.path);
        }
        if unique.len() == limit {
            break;
        }
    }
    unique
}
