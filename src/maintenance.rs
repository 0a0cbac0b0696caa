//! Graph maintenance
//!
//! Time-based decay for stale structure, plus the best-effort usage
//! reinforcement that follows a successful search. Both are safe to run
//! while ingestion and search are live.

use std::sync::Arc;

use crate::constants::DEFAULT_CLEANUP_DAYS;
use crate::errors::Result;
use crate::store::GraphStore;

/// Outcome of one cleanup sweep.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CleanupReport {
    pub deleted_relationships: u64,
    pub days_threshold: i64,
}

/// Delete NEXT_STEP relationships untouched for `days` (default when
/// `None`). Nodes are never removed: an unused step keeps its identity
/// and can be re-linked by a future submission.
pub async fn cleanup_old_paths(
    store: &dyn GraphStore,
    days: Option<i64>,
) -> Result<CleanupReport> {
    let days = days.unwrap_or(DEFAULT_CLEANUP_DAYS);
    let deleted = store.delete_stale_next_steps(days).await?;
    tracing::info!(deleted, days, "Cleanup sweep complete");
    Ok(CleanupReport {
        deleted_relationships: deleted,
        days_threshold: days,
    })
}

/// Reinforce the top match of a successful search in the background.
///
/// Fire-and-forget: a bump failure is logged and never surfaces to the
/// caller the search already answered.
pub fn spawn_usage_bump(store: Arc<dyn GraphStore>, domain: String, task_intent: String) {
    tokio::spawn(async move {
        if let Err(e) = store.bump_usage(&domain, &task_intent).await {
            tracing::warn!(
                domain = %domain,
                error = %e,
                "Usage bump failed, match ordering may lag"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_cleanup_uses_default_days() {
        let store = InMemoryStore::new();
        let report = cleanup_old_paths(&store, None).await.unwrap();
        assert_eq!(report.days_threshold, DEFAULT_CLEANUP_DAYS);
        assert_eq!(report.deleted_relationships, 0);
    }
}
