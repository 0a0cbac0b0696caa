//! In-memory graph store
//!
//! Mirrors the merge semantics of the Bolt adapter exactly, so engine
//! behavior can be exercised without a running database. Also usable as a
//! volatile backend for single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;

use super::GraphStore;
use crate::errors::Result;
use crate::model::{
    GraphStats, HasStepEdge, IntentCandidate, IntentOverwritePolicy, NextStepEdge, PopularPath,
    RootNode, StepNode,
};

#[derive(Default)]
struct State {
    roots: HashMap<String, RootNode>,
    steps: HashMap<String, StepNode>,
    /// Keyed by (domain, first step id).
    has_steps: HashMap<(String, String), HasStepEdge>,
    /// Keyed by (from step id, to step id).
    next_steps: HashMap<(String, String), NextStepEdge>,
}

/// Volatile [`GraphStore`] over process-local hash maps.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a step node, for assertions.
    pub fn step(&self, step_id: &str) -> Option<StepNode> {
        self.state.read().steps.get(step_id).cloned()
    }

    /// Snapshot a HAS_STEP edge, for assertions.
    pub fn has_step(&self, domain: &str, step_id: &str) -> Option<HasStepEdge> {
        self.state
            .read()
            .has_steps
            .get(&(domain.to_string(), step_id.to_string()))
            .cloned()
    }

    /// Snapshot a NEXT_STEP edge, for assertions.
    pub fn next_step(&self, from: &str, to: &str) -> Option<NextStepEdge> {
        self.state
            .read()
            .next_steps
            .get(&(from.to_string(), to.to_string()))
            .cloned()
    }

    /// Backdate a NEXT_STEP edge's `lastUpdated`, for decay tests.
    pub fn age_next_step(&self, from: &str, to: &str, days: i64) {
        let mut state = self.state.write();
        if let Some(edge) = state
            .next_steps
            .get_mut(&(from.to_string(), to.to_string()))
        {
            edge.last_updated = Utc::now() - Duration::days(days);
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn upsert_root(
        &self,
        domain: &str,
        base_url: &str,
        display_name: &str,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let now = Utc::now();
        match state.roots.get_mut(domain) {
            Some(root) => {
                root.visit_count += 1;
                root.last_visited = now;
                if let Some(vec) = embedding {
                    root.embedding = Some(vec.to_vec());
                }
            }
            None => {
                state.roots.insert(
                    domain.to_string(),
                    RootNode {
                        domain: domain.to_string(),
                        base_url: base_url.to_string(),
                        display_name: display_name.to_string(),
                        embedding: embedding.map(<[f32]>::to_vec),
                        visit_count: 0,
                        last_visited: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn upsert_step(&self, step: &StepNode) -> Result<()> {
        let mut state = self.state.write();
        let now = Utc::now();
        match state.steps.get_mut(&step.step_id) {
            Some(existing) => {
                existing.url = step.url.clone();
                existing.domain = step.domain.clone();
                existing.selectors = step.selectors.clone();
                existing.anchor_point = step.anchor_point.clone();
                existing.relative_path_from_anchor = step.relative_path_from_anchor.clone();
                existing.action = step.action;
                existing.is_input = step.is_input;
                existing.input_type = step.input_type.clone();
                existing.input_placeholder = step.input_placeholder.clone();
                existing.should_wait = step.should_wait;
                existing.wait_message = step.wait_message.clone();
                existing.max_wait_time = step.max_wait_time;
                existing.description = step.description.clone();
                existing.text_labels = step.text_labels.clone();
                existing.context_text = step.context_text.clone();
                if step.embedding.is_some() {
                    existing.embedding = step.embedding.clone();
                }
                existing.success_rate = step.success_rate;
                existing.usage_count += 1;
                existing.last_used = now;
            }
            None => {
                let mut fresh = step.clone();
                fresh.usage_count = 1;
                fresh.created_at = now;
                fresh.last_used = now;
                state.steps.insert(step.step_id.clone(), fresh);
            }
        }
        Ok(())
    }

    async fn upsert_has_step(
        &self,
        domain: &str,
        step_id: &str,
        task_intent: &str,
        intent_embedding: Option<&[f32]>,
        policy: IntentOverwritePolicy,
    ) -> Result<()> {
        let mut state = self.state.write();
        let now = Utc::now();
        let key = (domain.to_string(), step_id.to_string());
        match state.has_steps.get_mut(&key) {
            Some(edge) => {
                edge.weight += 1;
                edge.last_updated = now;
                if policy == IntentOverwritePolicy::OverwriteLatest {
                    edge.task_intent = task_intent.to_string();
                    if let Some(vec) = intent_embedding {
                        edge.intent_embedding = Some(vec.to_vec());
                    }
                }
            }
            None => {
                state.has_steps.insert(
                    key,
                    HasStepEdge {
                        task_intent: task_intent.to_string(),
                        intent_embedding: intent_embedding.map(<[f32]>::to_vec),
                        weight: 1,
                        order: 0,
                        created_at: now,
                        last_updated: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn upsert_next_step(
        &self,
        from_step_id: &str,
        to_step_id: &str,
        sequence_order: i64,
        path_id: &str,
    ) -> Result<()> {
        let mut state = self.state.write();
        let now = Utc::now();
        let key = (from_step_id.to_string(), to_step_id.to_string());
        match state.next_steps.get_mut(&key) {
            Some(edge) => {
                edge.weight += 1;
                edge.sequence_order = sequence_order;
                edge.path_id = path_id.to_string();
                edge.last_updated = now;
            }
            None => {
                state.next_steps.insert(
                    key,
                    NextStepEdge {
                        weight: 1,
                        sequence_order,
                        path_id: path_id.to_string(),
                        created_at: now,
                        last_updated: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn intent_candidates(&self, domain_hint: Option<&str>) -> Result<Vec<IntentCandidate>> {
        let state = self.state.read();
        let mut candidates: Vec<IntentCandidate> = state
            .has_steps
            .iter()
            .filter(|((domain, _), _)| domain_hint.is_none_or(|hint| hint == domain))
            .filter_map(|((domain, step_id), edge)| {
                let embedding = edge.intent_embedding.clone()?;
                Some(IntentCandidate {
                    domain: domain.clone(),
                    first_step_id: step_id.clone(),
                    task_intent: edge.task_intent.clone(),
                    intent_embedding: embedding,
                    weight: edge.weight,
                })
            })
            .collect();
        // Deterministic order for tests and stable ranking ties
        candidates.sort_by(|a, b| {
            (&a.domain, &a.first_step_id).cmp(&(&b.domain, &b.first_step_id))
        });
        Ok(candidates)
    }

    async fn walk_path(&self, first_step_id: &str, max_hops: usize) -> Result<Vec<StepNode>> {
        let state = self.state.read();
        let mut path = Vec::new();
        let Some(first) = state.steps.get(first_step_id) else {
            return Ok(path);
        };
        path.push(first.clone());

        let mut current = first_step_id.to_string();
        for _ in 0..max_hops {
            // Highest weight wins; ties break on step id for determinism
            let next = state
                .next_steps
                .iter()
                .filter(|((from, _), _)| *from == current)
                .max_by(|((_, a_to), a), ((_, b_to), b)| {
                    a.weight.cmp(&b.weight).then(b_to.cmp(a_to))
                })
                .map(|((_, to), _)| to.clone());

            let Some(next_id) = next else { break };
            if path.iter().any(|node| node.step_id == next_id) {
                break; // cycle guard
            }
            let Some(node) = state.steps.get(&next_id) else {
                break;
            };
            path.push(node.clone());
            current = next_id;
        }
        Ok(path)
    }

    async fn delete_stale_next_steps(&self, older_than_days: i64) -> Result<u64> {
        let mut state = self.state.write();
        let cutoff = Utc::now() - Duration::days(older_than_days);
        let before = state.next_steps.len();
        state.next_steps.retain(|_, edge| edge.last_updated >= cutoff);
        Ok((before - state.next_steps.len()) as u64)
    }

    async fn bump_usage(&self, domain: &str, task_intent: &str) -> Result<()> {
        let first_step_id = {
            let mut state = self.state.write();
            let now = Utc::now();
            let found = state
                .has_steps
                .iter_mut()
                .find(|((d, _), edge)| d == domain && edge.task_intent == task_intent)
                .map(|((_, step_id), edge)| {
                    edge.last_updated = now;
                    step_id.clone()
                });
            if let Some(root) = state.roots.get_mut(domain) {
                root.visit_count += 1;
                root.last_visited = now;
            }
            found
        };

        if let Some(first) = first_step_id {
            let nodes = self.walk_path(&first, crate::constants::MAX_PATH_HOPS).await?;
            let mut state = self.state.write();
            let now = Utc::now();
            for node in nodes {
                if let Some(step) = state.steps.get_mut(&node.step_id) {
                    step.usage_count += 1;
                    step.last_used = now;
                }
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let state = self.state.read();
        Ok(GraphStats {
            root_nodes: state.roots.len() as u64,
            step_nodes: state.steps.len() as u64,
            has_step_relations: state.has_steps.len() as u64,
            next_step_relations: state.next_steps.len() as u64,
        })
    }

    async fn popular_paths(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PopularPath>> {
        let state = self.state.read();
        let mut entries: Vec<(i64, PopularPath)> = state
            .has_steps
            .iter()
            .filter(|((d, _), _)| domain.is_none_or(|hint| hint == d))
            .map(|((d, step_id), edge)| {
                let description = state
                    .steps
                    .get(step_id)
                    .map(|s| s.description.clone())
                    .unwrap_or_default();
                (
                    edge.weight,
                    PopularPath {
                        domain: d.clone(),
                        task_intent: edge.task_intent.clone(),
                        usage_count: edge.weight,
                        first_step_description: description,
                    },
                )
            })
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.domain.cmp(&b.1.domain)));
        Ok(entries.into_iter().take(limit).map(|(_, p)| p).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{step_id, StepAction};

    fn node(url: &str, selector: &str, action: StepAction, desc: &str) -> StepNode {
        let selectors = vec![selector.to_string()];
        StepNode {
            step_id: step_id(url, &selectors, action),
            url: url.to_string(),
            domain: "example.com".to_string(),
            selectors,
            anchor_point: None,
            relative_path_from_anchor: None,
            action,
            is_input: false,
            input_type: None,
            input_placeholder: None,
            should_wait: false,
            wait_message: None,
            max_wait_time: None,
            description: desc.to_string(),
            text_labels: vec![],
            context_text: None,
            embedding: None,
            success_rate: 1.0,
            usage_count: 0,
            created_at: Utc::now(),
            last_used: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_step_upsert_increments_usage() {
        let store = InMemoryStore::new();
        let n = node("https://e.com", "#a", StepAction::Click, "click a");

        store.upsert_step(&n).await.unwrap();
        store.upsert_step(&n).await.unwrap();

        let stored = store.step(&n.step_id).unwrap();
        assert_eq!(stored.usage_count, 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.step_nodes, 1);
    }

    #[tokio::test]
    async fn test_has_step_overwrite_policies() {
        let store = InMemoryStore::new();
        store
            .upsert_has_step(
                "example.com",
                "s1",
                "first intent",
                Some(&[1.0, 0.0]),
                IntentOverwritePolicy::OverwriteLatest,
            )
            .await
            .unwrap();
        store
            .upsert_has_step(
                "example.com",
                "s1",
                "second intent",
                Some(&[0.0, 1.0]),
                IntentOverwritePolicy::OverwriteLatest,
            )
            .await
            .unwrap();

        let edge = store.has_step("example.com", "s1").unwrap();
        assert_eq!(edge.weight, 2);
        assert_eq!(edge.task_intent, "second intent");

        store
            .upsert_has_step(
                "example.com",
                "s1",
                "third intent",
                None,
                IntentOverwritePolicy::KeepFirst,
            )
            .await
            .unwrap();
        let edge = store.has_step("example.com", "s1").unwrap();
        assert_eq!(edge.weight, 3);
        assert_eq!(edge.task_intent, "second intent");
    }

    #[tokio::test]
    async fn test_walk_follows_highest_weight_edge() {
        let store = InMemoryStore::new();
        let a = node("https://e.com/1", "#a", StepAction::Click, "a");
        let b = node("https://e.com/2", "#b", StepAction::Click, "b");
        let c = node("https://e.com/3", "#c", StepAction::Click, "c");
        for n in [&a, &b, &c] {
            store.upsert_step(n).await.unwrap();
        }

        // a->b reinforced twice, a->c once
        store.upsert_next_step(&a.step_id, &b.step_id, 0, "p1").await.unwrap();
        store.upsert_next_step(&a.step_id, &b.step_id, 0, "p2").await.unwrap();
        store.upsert_next_step(&a.step_id, &c.step_id, 0, "p3").await.unwrap();

        let path = store.walk_path(&a.step_id, 20).await.unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].step_id, b.step_id);
    }

    #[tokio::test]
    async fn test_walk_breaks_cycles() {
        let store = InMemoryStore::new();
        let a = node("https://e.com/1", "#a", StepAction::Click, "a");
        let b = node("https://e.com/2", "#b", StepAction::Click, "b");
        store.upsert_step(&a).await.unwrap();
        store.upsert_step(&b).await.unwrap();
        store.upsert_next_step(&a.step_id, &b.step_id, 0, "p").await.unwrap();
        store.upsert_next_step(&b.step_id, &a.step_id, 1, "p").await.unwrap();

        let path = store.walk_path(&a.step_id, 20).await.unwrap();
        assert_eq!(path.len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_deletes_only_stale_edges() {
        let store = InMemoryStore::new();
        let a = node("https://e.com/1", "#a", StepAction::Click, "a");
        let b = node("https://e.com/2", "#b", StepAction::Click, "b");
        let c = node("https://e.com/3", "#c", StepAction::Click, "c");
        for n in [&a, &b, &c] {
            store.upsert_step(n).await.unwrap();
        }
        store.upsert_next_step(&a.step_id, &b.step_id, 0, "p").await.unwrap();
        store.upsert_next_step(&b.step_id, &c.step_id, 1, "p").await.unwrap();
        store.age_next_step(&a.step_id, &b.step_id, 45);

        let deleted = store.delete_stale_next_steps(30).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.next_step(&a.step_id, &b.step_id).is_none());
        assert!(store.next_step(&b.step_id, &c.step_id).is_some());
        // Nodes untouched
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.step_nodes, 3);
    }

    #[tokio::test]
    async fn test_intent_candidates_skip_missing_embeddings() {
        let store = InMemoryStore::new();
        store
            .upsert_has_step("a.com", "s1", "with vector", Some(&[1.0]), Default::default())
            .await
            .unwrap();
        store
            .upsert_has_step("b.com", "s2", "no vector", None, Default::default())
            .await
            .unwrap();

        let candidates = store.intent_candidates(None).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].domain, "a.com");

        let hinted = store.intent_candidates(Some("b.com")).await.unwrap();
        assert!(hinted.is_empty());
    }
}
