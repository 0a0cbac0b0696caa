//! Bolt graph database adapter
//!
//! All Cypher for the path graph lives here. Writes are MERGE-based
//! upserts, so re-submitting the same navigation reinforces weights
//! instead of duplicating nodes. Timestamps travel as epoch seconds to
//! keep row decoding independent of the server's temporal types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Row};

use super::GraphStore;
use crate::constants::EMBEDDING_DIM;
use crate::errors::{EngineError, Result};
use crate::model::{
    GraphStats, IntentCandidate, IntentOverwritePolicy, PopularPath, StepAction, StepNode,
};

/// [`GraphStore`] backed by a Bolt connection pool.
pub struct Neo4jStore {
    graph: Graph,
}

const STEP_RETURN: &str = "t.stepId AS stepId, t.url AS url, t.domain AS domain, \
     t.selectors AS selectors, t.anchorPoint AS anchorPoint, \
     t.relativePathFromAnchor AS relativePathFromAnchor, t.action AS action, \
     t.isInput AS isInput, t.inputType AS inputType, \
     t.inputPlaceholder AS inputPlaceholder, t.shouldWait AS shouldWait, \
     t.waitMessage AS waitMessage, t.maxWaitTime AS maxWaitTime, \
     t.description AS description, t.textLabels AS textLabels, \
     t.contextText AS contextText, t.embedding AS embedding, \
     t.successRate AS successRate, t.usageCount AS usageCount, \
     coalesce(t.createdAt, datetime()).epochSeconds AS createdAt, \
     coalesce(t.lastUsed, datetime()).epochSeconds AS lastUsed";

impl Neo4jStore {
    /// Open a connection pool against the given Bolt endpoint.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        Ok(Self { graph })
    }

    /// Create constraints and indexes. Safe to call on every startup;
    /// everything is `IF NOT EXISTS`. Vector and fulltext indexes are
    /// best-effort because older server editions reject them.
    pub async fn ensure_schema(&self) -> Result<()> {
        let required = [
            "CREATE CONSTRAINT root_domain_unique IF NOT EXISTS \
             FOR (r:ROOT) REQUIRE r.domain IS UNIQUE",
            "CREATE CONSTRAINT step_id_unique IF NOT EXISTS \
             FOR (s:STEP) REQUIRE s.stepId IS UNIQUE",
            "CREATE INDEX step_domain_index IF NOT EXISTS FOR (s:STEP) ON (s.domain)",
            "CREATE INDEX step_action_index IF NOT EXISTS FOR (s:STEP) ON (s.action)",
        ];
        for statement in required {
            self.graph.run(query(statement)).await?;
        }

        let optional = [
            format!(
                "CREATE VECTOR INDEX step_embedding_index IF NOT EXISTS \
                 FOR (s:STEP) ON (s.embedding) \
                 OPTIONS {{indexConfig: {{`vector.dimensions`: {EMBEDDING_DIM}, \
                 `vector.similarity_function`: 'cosine'}}}}"
            ),
            "CREATE FULLTEXT INDEX step_description_fulltext IF NOT EXISTS \
             FOR (s:STEP) ON EACH [s.description]"
                .to_string(),
        ];
        for statement in optional {
            if let Err(e) = self.graph.run(query(&statement)).await {
                tracing::warn!(error = %e, "Optional index creation failed, continuing");
            }
        }

        tracing::info!("Graph schema ensured");
        Ok(())
    }

    async fn fetch_step(&self, step_id: &str) -> Result<Option<StepNode>> {
        let q = query(&format!(
            "MATCH (t:STEP {{stepId: $stepId}}) RETURN {STEP_RETURN}"
        ))
        .param("stepId", step_id);

        let mut stream = self.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(Some(decode_step(&row))),
            None => Ok(None),
        }
    }

    async fn next_hop(&self, step_id: &str) -> Result<Option<StepNode>> {
        let q = query(&format!(
            "MATCH (s:STEP {{stepId: $stepId}})-[n:NEXT_STEP]->(t:STEP) \
             RETURN {STEP_RETURN} \
             ORDER BY n.weight DESC, t.stepId ASC LIMIT 1"
        ))
        .param("stepId", step_id);

        let mut stream = self.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(Some(decode_step(&row))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_root(
        &self,
        domain: &str,
        base_url: &str,
        display_name: &str,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let embedding_set = if embedding.is_some() {
            ", r.embedding = $embedding"
        } else {
            ""
        };
        let statement = format!(
            "MERGE (r:ROOT {{domain: $domain}}) \
             ON CREATE SET r.baseUrl = $baseUrl, r.displayName = $displayName, \
                           r.visitCount = 0, r.createdAt = datetime() \
             ON MATCH SET r.visitCount = coalesce(r.visitCount, 0) + 1 \
             SET r.lastVisited = datetime(){embedding_set}"
        );

        let mut q = query(&statement)
            .param("domain", domain)
            .param("baseUrl", base_url)
            .param("displayName", display_name);
        if let Some(vec) = embedding {
            q = q.param("embedding", embedding_to_f64(vec));
        }
        self.graph.run(q).await?;
        Ok(())
    }

    async fn upsert_step(&self, step: &StepNode) -> Result<()> {
        let embedding_set = if step.embedding.is_some() {
            ", s.embedding = $embedding"
        } else {
            ""
        };
        let statement = format!(
            "MERGE (s:STEP {{stepId: $stepId}}) \
             ON CREATE SET s.createdAt = datetime(), s.usageCount = 1 \
             ON MATCH SET s.usageCount = coalesce(s.usageCount, 0) + 1 \
             SET s.url = $url, s.domain = $domain, s.selectors = $selectors, \
                 s.anchorPoint = $anchorPoint, \
                 s.relativePathFromAnchor = $relativePathFromAnchor, \
                 s.action = $action, s.isInput = $isInput, \
                 s.inputType = $inputType, s.inputPlaceholder = $inputPlaceholder, \
                 s.shouldWait = $shouldWait, s.waitMessage = $waitMessage, \
                 s.maxWaitTime = $maxWaitTime, s.description = $description, \
                 s.textLabels = $textLabels, s.contextText = $contextText, \
                 s.successRate = $successRate, \
                 s.lastUsed = datetime(){embedding_set}"
        );

        let mut q = query(&statement)
            .param("stepId", step.step_id.as_str())
            .param("url", step.url.as_str())
            .param("domain", step.domain.as_str())
            .param("selectors", step.selectors.clone())
            .param("anchorPoint", step.anchor_point.clone().unwrap_or_default())
            .param(
                "relativePathFromAnchor",
                step.relative_path_from_anchor.clone().unwrap_or_default(),
            )
            .param("action", step.action.as_str())
            .param("isInput", step.is_input)
            .param("inputType", step.input_type.clone().unwrap_or_default())
            .param(
                "inputPlaceholder",
                step.input_placeholder.clone().unwrap_or_default(),
            )
            .param("shouldWait", step.should_wait)
            .param("waitMessage", step.wait_message.clone().unwrap_or_default())
            .param("maxWaitTime", step.max_wait_time.unwrap_or(0))
            .param("description", step.description.as_str())
            .param("textLabels", step.text_labels.clone())
            .param("contextText", step.context_text.clone().unwrap_or_default())
            .param("successRate", step.success_rate);
        if let Some(vec) = &step.embedding {
            q = q.param("embedding", embedding_to_f64(vec));
        }
        self.graph.run(q).await?;
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
        let create_embedding = if intent_embedding.is_some() {
            ", h.intentEmbedding = $intentEmbedding"
        } else {
            ""
        };
        let match_set = match (policy, intent_embedding.is_some()) {
            (IntentOverwritePolicy::OverwriteLatest, true) => {
                ", h.taskIntent = $taskIntent, h.intentEmbedding = $intentEmbedding"
            }
            (IntentOverwritePolicy::OverwriteLatest, false) => ", h.taskIntent = $taskIntent",
            (IntentOverwritePolicy::KeepFirst, _) => "",
        };
        let statement = format!(
            "MATCH (r:ROOT {{domain: $domain}}) \
             MATCH (s:STEP {{stepId: $stepId}}) \
             MERGE (r)-[h:HAS_STEP]->(s) \
             ON CREATE SET h.createdAt = datetime(), h.weight = 1, h.order = 0, \
                           h.taskIntent = $taskIntent{create_embedding} \
             ON MATCH SET h.weight = coalesce(h.weight, 0) + 1{match_set} \
             SET h.lastUpdated = datetime()"
        );

        let mut q = query(&statement)
            .param("domain", domain)
            .param("stepId", step_id)
            .param("taskIntent", task_intent);
        if let Some(vec) = intent_embedding {
            q = q.param("intentEmbedding", embedding_to_f64(vec));
        }
        self.graph.run(q).await?;
        Ok(())
    }

    async fn upsert_next_step(
        &self,
        from_step_id: &str,
        to_step_id: &str,
        sequence_order: i64,
        path_id: &str,
    ) -> Result<()> {
        let q = query(
            "MATCH (a:STEP {stepId: $fromId}) \
             MATCH (b:STEP {stepId: $toId}) \
             MERGE (a)-[n:NEXT_STEP]->(b) \
             ON CREATE SET n.createdAt = datetime(), n.weight = 1 \
             ON MATCH SET n.weight = coalesce(n.weight, 0) + 1 \
             SET n.sequenceOrder = $sequenceOrder, n.pathId = $pathId, \
                 n.lastUpdated = datetime()",
        )
        .param("fromId", from_step_id)
        .param("toId", to_step_id)
        .param("sequenceOrder", sequence_order)
        .param("pathId", path_id);

        self.graph.run(q).await?;
        Ok(())
    }

    async fn intent_candidates(&self, domain_hint: Option<&str>) -> Result<Vec<IntentCandidate>> {
        let domain_filter = if domain_hint.is_some() {
            " AND r.domain = $domain"
        } else {
            ""
        };
        let statement = format!(
            "MATCH (r:ROOT)-[h:HAS_STEP]->(s:STEP) \
             WHERE h.intentEmbedding IS NOT NULL{domain_filter} \
             RETURN r.domain AS domain, s.stepId AS stepId, \
                    h.taskIntent AS taskIntent, h.intentEmbedding AS intentEmbedding, \
                    coalesce(h.weight, 1) AS weight \
             ORDER BY domain, stepId"
        );

        let mut q = query(&statement);
        if let Some(domain) = domain_hint {
            q = q.param("domain", domain);
        }

        let mut candidates = Vec::new();
        let mut stream = self.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            let raw: Vec<f64> = row.get("intentEmbedding").unwrap_or_default();
            candidates.push(IntentCandidate {
                domain: row.get("domain").unwrap_or_default(),
                first_step_id: row.get("stepId").unwrap_or_default(),
                task_intent: row.get("taskIntent").unwrap_or_default(),
                intent_embedding: raw.into_iter().map(|v| v as f32).collect(),
                weight: row.get("weight").unwrap_or(1),
            });
        }
        Ok(candidates)
    }

    async fn walk_path(&self, first_step_id: &str, max_hops: usize) -> Result<Vec<StepNode>> {
        let mut path = Vec::new();
        let Some(first) = self.fetch_step(first_step_id).await? else {
            return Ok(path);
        };
        let mut current = first.step_id.clone();
        path.push(first);

        for _ in 0..max_hops {
            let Some(next) = self.next_hop(&current).await? else {
                break;
            };
            if path.iter().any(|node| node.step_id == next.step_id) {
                break; // cycle guard
            }
            current = next.step_id.clone();
            path.push(next);
        }
        Ok(path)
    }

    async fn delete_stale_next_steps(&self, older_than_days: i64) -> Result<u64> {
        let q = query(
            "MATCH ()-[n:NEXT_STEP]->() \
             WHERE n.lastUpdated < datetime() - duration({days: $days}) \
             DELETE n \
             RETURN count(n) AS deleted",
        )
        .param("days", older_than_days);

        let mut stream = self.graph.execute(q).await?;
        let deleted = match stream.next().await? {
            Some(row) => row.get::<i64>("deleted").unwrap_or(0),
            None => 0,
        };
        Ok(deleted.max(0) as u64)
    }

    async fn bump_usage(&self, domain: &str, task_intent: &str) -> Result<()> {
        let q = query(
            "MATCH (r:ROOT {domain: $domain})-[h:HAS_STEP]->(first:STEP) \
             WHERE h.taskIntent = $taskIntent \
             SET h.lastUpdated = datetime(), \
                 r.visitCount = coalesce(r.visitCount, 0) + 1, \
                 r.lastVisited = datetime() \
             WITH first \
             MATCH p = (first)-[:NEXT_STEP*0..20]->(:STEP) \
             UNWIND nodes(p) AS node \
             WITH DISTINCT node \
             SET node.usageCount = coalesce(node.usageCount, 0) + 1, \
                 node.lastUsed = datetime()",
        )
        .param("domain", domain)
        .param("taskIntent", task_intent);

        self.graph.run(q).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let q = query(
            "OPTIONAL MATCH (r:ROOT) WITH count(r) AS roots \
             OPTIONAL MATCH (s:STEP) WITH roots, count(s) AS steps \
             OPTIONAL MATCH ()-[h:HAS_STEP]->() WITH roots, steps, count(h) AS hasSteps \
             OPTIONAL MATCH ()-[n:NEXT_STEP]->() \
             RETURN roots, steps, hasSteps, count(n) AS nextSteps",
        );

        let mut stream = self.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(GraphStats {
                root_nodes: row.get::<i64>("roots").unwrap_or(0).max(0) as u64,
                step_nodes: row.get::<i64>("steps").unwrap_or(0).max(0) as u64,
                has_step_relations: row.get::<i64>("hasSteps").unwrap_or(0).max(0) as u64,
                next_step_relations: row.get::<i64>("nextSteps").unwrap_or(0).max(0) as u64,
            }),
            None => Ok(GraphStats::default()),
        }
    }

    async fn popular_paths(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PopularPath>> {
        let domain_filter = if domain.is_some() {
            "WHERE r.domain = $domain "
        } else {
            ""
        };
        let statement = format!(
            "MATCH (r:ROOT)-[h:HAS_STEP]->(s:STEP) {domain_filter}\
             RETURN r.domain AS domain, h.taskIntent AS taskIntent, \
                    coalesce(h.weight, 1) AS weight, s.description AS description \
             ORDER BY weight DESC LIMIT $limit"
        );

        let mut q = query(&statement).param("limit", limit as i64);
        if let Some(d) = domain {
            q = q.param("domain", d);
        }

        let mut paths = Vec::new();
        let mut stream = self.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            paths.push(PopularPath {
                domain: row.get("domain").unwrap_or_default(),
                task_intent: row.get("taskIntent").unwrap_or_default(),
                usage_count: row.get("weight").unwrap_or(1),
                first_step_description: row.get("description").unwrap_or_default(),
            });
        }
        Ok(paths)
    }
}

fn embedding_to_f64(vec: &[f32]) -> Vec<f64> {
    vec.iter().map(|&v| v as f64).collect()
}

fn decode_step(row: &Row) -> StepNode {
    let action_raw: String = row.get("action").unwrap_or_default();
    let action = StepAction::parse(&action_raw).unwrap_or_else(|_| {
        tracing::warn!(action = %action_raw, "Unknown stored action, treating as click");
        StepAction::Click
    });
    let embedding: Vec<f64> = row.get("embedding").unwrap_or_default();
    let max_wait_time: i64 = row.get("maxWaitTime").unwrap_or(0);

    StepNode {
        step_id: row.get("stepId").unwrap_or_default(),
        url: row.get("url").unwrap_or_default(),
        domain: row.get("domain").unwrap_or_default(),
        selectors: row.get("selectors").unwrap_or_default(),
        anchor_point: opt_string(row, "anchorPoint"),
        relative_path_from_anchor: opt_string(row, "relativePathFromAnchor"),
        action,
        is_input: row.get("isInput").unwrap_or(false),
        input_type: opt_string(row, "inputType"),
        input_placeholder: opt_string(row, "inputPlaceholder"),
        should_wait: row.get("shouldWait").unwrap_or(false),
        wait_message: opt_string(row, "waitMessage"),
        max_wait_time: (max_wait_time > 0).then_some(max_wait_time),
        description: row.get("description").unwrap_or_default(),
        text_labels: row.get("textLabels").unwrap_or_default(),
        context_text: opt_string(row, "contextText"),
        embedding: if embedding.is_empty() {
            None
        } else {
            Some(embedding.into_iter().map(|v| v as f32).collect())
        },
        success_rate: row.get("successRate").unwrap_or(1.0),
        usage_count: row.get("usageCount").unwrap_or(0),
        created_at: epoch_to_datetime(row.get("createdAt").unwrap_or(0)),
        last_used: epoch_to_datetime(row.get("lastUsed").unwrap_or(0)),
    }
}

/// Optional string properties are stored as empty strings; decode back
/// to `None`.
fn opt_string(row: &Row, column: &str) -> Option<String> {
    let value: String = row.get(column).unwrap_or_default();
    (!value.is_empty()).then_some(value)
}

fn epoch_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}
