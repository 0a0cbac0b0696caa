//! Semantic path search primitive
//!
//! One search: embed the query, rank stored intents by cosine similarity,
//! and reconstruct the full step sequence for each match. The workflow
//! layer composes this primitive into its branching strategies.

use std::sync::Arc;

use crate::constants::{MAX_PATH_HOPS, SIMILARITY_FLOOR};
use crate::embedding::Embedder;
use crate::errors::Result;
use crate::model::{normalize_domain, FormattedStep, MatchedPath};
use crate::similarity::{rank_candidates, round_score};
use crate::store::GraphStore;

pub struct PathSearch {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
}

impl PathSearch {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Find up to `limit` stored navigations whose intent matches `query`.
    ///
    /// Results come back in descending relevance order. A missing query
    /// embedding degrades to an empty result set rather than an error.
    pub async fn search(
        &self,
        query: &str,
        domain_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MatchedPath>> {
        let Some(query_embedding) = self.embedder.embed(query).await else {
            tracing::warn!(query = %query, "Query embedding unavailable, returning no matches");
            return Ok(Vec::new());
        };

        let normalized_hint = domain_hint.map(normalize_domain);
        let candidates = self
            .store
            .intent_candidates(normalized_hint.as_deref())
            .await?;
        tracing::debug!(candidates = candidates.len(), "Ranking intent candidates");

        let scored = rank_candidates(
            &query_embedding,
            candidates
                .into_iter()
                .map(|c| (c.intent_embedding.clone(), c))
                .collect(),
            SIMILARITY_FLOOR,
            limit,
        );

        let mut matches = Vec::with_capacity(scored.len());
        for (score, candidate) in scored {
            let nodes = self
                .store
                .walk_path(&candidate.first_step_id, MAX_PATH_HOPS)
                .await?;
            if nodes.is_empty() {
                tracing::warn!(
                    step_id = %candidate.first_step_id,
                    "Dangling entry point, skipping match"
                );
                continue;
            }
            matches.push(MatchedPath {
                domain: candidate.domain,
                task_intent: candidate.task_intent,
                relevance_score: round_score(score),
                weight: candidate.weight,
                steps: nodes
                    .iter()
                    .enumerate()
                    .map(|(i, node)| FormattedStep::from_node(i + 1, node))
                    .collect(),
            });
        }
        Ok(matches)
    }
}
