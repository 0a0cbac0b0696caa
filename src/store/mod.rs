//! Graph store adapter boundary
//!
//! All durable state lives behind [`GraphStore`]. Rows coming back from the
//! database are decoded into the typed records in [`crate::model`] right
//! here; nothing outside this module touches untyped property bags.
//!
//! Two implementations ship: [`Neo4jStore`] for the Bolt graph database
//! collaborator and [`InMemoryStore`] for tests and offline operation.

pub mod memory;
pub mod neo4j;

use async_trait::async_trait;

pub use memory::InMemoryStore;
pub use neo4j::Neo4jStore;

use crate::errors::Result;
use crate::model::{
    GraphStats, IntentCandidate, IntentOverwritePolicy, PopularPath, StepNode,
};

/// Typed operations the engine needs from the graph database.
///
/// Upserts follow the store's native merge semantics: weight and count
/// accumulation are simple increments, so concurrent ingestions of the same
/// edge are safe without client-side ordering.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert the ROOT for a domain. First creation sets `visitCount` to 0;
    /// every call increments it and refreshes `lastVisited`. The embedding
    /// is only written when present.
    async fn upsert_root(
        &self,
        domain: &str,
        base_url: &str,
        display_name: &str,
        embedding: Option<&[f32]>,
    ) -> Result<()>;

    /// Upsert a STEP by `step_id`, refreshing mutable fields, bumping
    /// `usageCount`, and touching `lastUsed`. Never duplicates a node.
    async fn upsert_step(&self, step: &StepNode) -> Result<()>;

    /// Upsert the HAS_STEP edge from a domain's ROOT to its first step.
    /// Weight accumulates on every call; whether the stored intent is
    /// replaced on re-submission is governed by `policy`.
    async fn upsert_has_step(
        &self,
        domain: &str,
        step_id: &str,
        task_intent: &str,
        intent_embedding: Option<&[f32]>,
        policy: IntentOverwritePolicy,
    ) -> Result<()>;

    /// Upsert a NEXT_STEP adjacency, accumulating weight.
    async fn upsert_next_step(
        &self,
        from_step_id: &str,
        to_step_id: &str,
        sequence_order: i64,
        path_id: &str,
    ) -> Result<()>;

    /// All HAS_STEP candidates with a non-null intent embedding, optionally
    /// restricted to one domain.
    async fn intent_candidates(&self, domain_hint: Option<&str>) -> Result<Vec<IntentCandidate>>;

    /// Reconstruct a stored navigation starting at `first_step_id`, following
    /// the highest-weight outgoing NEXT_STEP edge at each hop until a node
    /// with no outgoing edge, bounded to `max_hops`.
    async fn walk_path(&self, first_step_id: &str, max_hops: usize) -> Result<Vec<StepNode>>;

    /// Delete NEXT_STEP relationships not touched for `older_than_days`.
    /// Returns the number deleted. Nodes are never pruned here.
    async fn delete_stale_next_steps(&self, older_than_days: i64) -> Result<u64>;

    /// Re-touch a matched path after a successful search: HAS_STEP
    /// `lastUpdated`, step usage counts, ROOT `lastVisited`.
    async fn bump_usage(&self, domain: &str, task_intent: &str) -> Result<()>;

    /// Aggregate node/relationship counts.
    async fn stats(&self) -> Result<GraphStats>;

    /// Entry points ordered by accumulated HAS_STEP weight.
    async fn popular_paths(&self, domain: Option<&str>, limit: usize)
        -> Result<Vec<PopularPath>>;
}
