//! Navigation ingestion
//!
//! Turns a submitted navigation into graph writes: one ROOT upsert, one
//! STEP upsert per step, a HAS_STEP edge to the first step carrying the
//! intent, and a NEXT_STEP chain over consecutive steps. Re-submission of
//! the same navigation reinforces the existing structure.

use std::sync::Arc;

use uuid::Uuid;

use crate::embedding::Embedder;
use crate::errors::{EngineError, Result};
use crate::model::{
    display_name_for, normalize_domain, step_id, IngestReceipt, IntentOverwritePolicy,
    PathSubmission, StepNode,
};
use crate::store::GraphStore;

pub struct PathIngestor {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    intent_policy: IntentOverwritePolicy,
}

impl PathIngestor {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        intent_policy: IntentOverwritePolicy,
    ) -> Self {
        Self {
            store,
            embedder,
            intent_policy,
        }
    }

    /// Persist one recorded navigation.
    ///
    /// Embedding failures degrade (the record is stored without vectors);
    /// store failures propagate.
    pub async fn submit(&self, submission: &PathSubmission) -> Result<IngestReceipt> {
        validate(submission)?;

        let domain = normalize_domain(&submission.domain);
        // NEXT_STEP edges carry the originating session as their pathId;
        // a recorder that sent none still gets a usable identifier
        let path_id = if submission.session_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            submission.session_id.clone()
        };
        let base_url = &submission.steps[0].url;

        tracing::info!(
            domain = %domain,
            task_intent = %submission.task_intent,
            steps = submission.steps.len(),
            "Ingesting navigation"
        );

        let root_text = format!("{domain} {}", submission.task_intent);
        let domain_embedding = self.embedder.embed(&root_text).await;
        self.store
            .upsert_root(
                &domain,
                base_url,
                &display_name_for(&domain),
                domain_embedding.as_deref(),
            )
            .await?;

        let mut step_ids = Vec::with_capacity(submission.steps.len());
        for step in &submission.steps {
            let id = step_id(&step.url, &step.selectors, step.action);
            let embedding = self.embedder.embed(&step.embedding_text()).await;
            let node = StepNode {
                step_id: id.clone(),
                url: step.url.clone(),
                domain: domain.clone(),
                selectors: step.selectors.clone(),
                anchor_point: step.anchor_point.clone(),
                relative_path_from_anchor: step.relative_path_from_anchor.clone(),
                action: step.action,
                is_input: step.is_input,
                input_type: step.input_type.clone(),
                input_placeholder: step.input_placeholder.clone(),
                should_wait: step.should_wait,
                wait_message: step.wait_message.clone(),
                max_wait_time: step.max_wait_time,
                description: step.description.clone(),
                text_labels: step.text_labels.clone(),
                context_text: step.context_text.clone(),
                embedding,
                success_rate: step.success_rate,
                usage_count: 0,
                created_at: chrono::Utc::now(),
                last_used: chrono::Utc::now(),
            };
            self.store.upsert_step(&node).await?;
            step_ids.push(id);
        }

        let intent_embedding = self.embedder.embed(&submission.task_intent).await;
        if intent_embedding.is_none() {
            tracing::warn!(
                domain = %domain,
                "No intent embedding available, path will not be semantically matchable"
            );
        }
        self.store
            .upsert_has_step(
                &domain,
                &step_ids[0],
                &submission.task_intent,
                intent_embedding.as_deref(),
                self.intent_policy,
            )
            .await?;

        for (order, pair) in step_ids.windows(2).enumerate() {
            self.store
                .upsert_next_step(&pair[0], &pair[1], order as i64, &path_id)
                .await?;
        }

        Ok(IngestReceipt {
            status: "success".to_string(),
            domain,
            task_intent: submission.task_intent.clone(),
            steps_saved: step_ids.len(),
        })
    }
}

fn validate(submission: &PathSubmission) -> Result<()> {
    if submission.task_intent.trim().is_empty() {
        return Err(EngineError::InvalidSubmission {
            field: "taskIntent".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if submission.domain.trim().is_empty() {
        return Err(EngineError::InvalidSubmission {
            field: "domain".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if submission.steps.is_empty() {
        return Err(EngineError::InvalidSubmission {
            field: "steps".to_string(),
            reason: "must contain at least one step".to_string(),
        });
    }
    for (i, step) in submission.steps.iter().enumerate() {
        if step.url.trim().is_empty() {
            return Err(EngineError::InvalidSubmission {
                field: format!("steps[{i}].url"),
                reason: "must not be empty".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StepAction, StepData};

    fn step(url: &str, desc: &str) -> StepData {
        StepData {
            url: url.to_string(),
            selectors: vec!["#target".to_string()],
            anchor_point: None,
            relative_path_from_anchor: None,
            action: StepAction::Click,
            is_input: false,
            input_type: None,
            input_placeholder: None,
            should_wait: false,
            wait_message: None,
            max_wait_time: None,
            description: desc.to_string(),
            text_labels: vec![],
            context_text: None,
            success_rate: 1.0,
        }
    }

    fn submission(steps: Vec<StepData>) -> PathSubmission {
        PathSubmission {
            session_id: "session-1".to_string(),
            task_intent: "log into the account".to_string(),
            domain: "https://www.example.com".to_string(),
            steps,
        }
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut s = submission(vec![step("https://e.com", "x")]);
        s.task_intent = "  ".to_string();
        assert!(validate(&s).is_err());

        let s = submission(vec![]);
        assert!(validate(&s).is_err());

        let s = submission(vec![step("", "x")]);
        assert!(validate(&s).is_err());
    }

    #[test]
    fn test_validate_accepts_minimal_submission() {
        let s = submission(vec![step("https://e.com", "x")]);
        assert!(validate(&s).is_ok());
    }
}
