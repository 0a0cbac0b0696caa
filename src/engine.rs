//! Engine facade
//!
//! One owned object wiring the store, embedder, classifier, agents, and
//! workflow together. Callers embed this in whatever transport they run;
//! the engine itself never listens on anything.

use std::sync::Arc;

use crate::agents::{KeywordSearchAgent, RediscoveryAgent};
use crate::config::EngineConfig;
use crate::constants::EMBEDDING_DIM;
use crate::embedding::{CachedEmbedder, DisabledEmbedder, Embedder, OpenAiEmbedder};
use crate::errors::Result;
use crate::ingest::PathIngestor;
use crate::intent::{IntentClassifier, OpenAiClassifier};
use crate::maintenance::{self, CleanupReport};
use crate::model::{
    GraphStats, IngestReceipt, PathSubmission, PopularPath, SearchPerformance, SearchResponse,
};
use crate::search::PathSearch;
use crate::store::{GraphStore, Neo4jStore};
use crate::workflow::{self, SearchWorkflow};

pub struct PathGraphEngine {
    store: Arc<dyn GraphStore>,
    ingestor: PathIngestor,
    search: Arc<PathSearch>,
    workflow: SearchWorkflow,
    config: EngineConfig,
}

impl PathGraphEngine {
    /// Connect to the configured graph database, ensure the schema, and
    /// wire the full component stack.
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        let store = Neo4jStore::connect(
            &config.neo4j_uri,
            &config.neo4j_user,
            &config.neo4j_password,
        )
        .await?;
        store.ensure_schema().await?;

        let provider: Arc<dyn Embedder> = match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiEmbedder::new(key, &config.embedding_model)),
            None => {
                tracing::warn!("No OpenAI key configured, semantic matching disabled");
                Arc::new(DisabledEmbedder::new(EMBEDDING_DIM))
            }
        };
        let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(
            provider,
            config.embedding_cache_capacity,
        ));
        let classifier: Option<Arc<dyn IntentClassifier>> = config
            .openai_api_key
            .as_ref()
            .map(|key| {
                Arc::new(OpenAiClassifier::new(key, &config.chat_model))
                    as Arc<dyn IntentClassifier>
            });

        Ok(Self::assemble(Arc::new(store), embedder, classifier, config))
    }

    /// Wire the engine over caller-provided components. This is how tests
    /// and embedded deployments construct it.
    pub fn assemble(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        classifier: Option<Arc<dyn IntentClassifier>>,
        config: EngineConfig,
    ) -> Self {
        let search = Arc::new(PathSearch::new(store.clone(), embedder.clone()));
        let agents: Vec<Arc<dyn RediscoveryAgent>> =
            vec![Arc::new(KeywordSearchAgent::new(search.clone()))];
        let workflow = SearchWorkflow::new(search.clone(), classifier, agents);
        let ingestor = PathIngestor::new(store.clone(), embedder, config.intent_policy);

        Self {
            store,
            ingestor,
            search,
            workflow,
            config,
        }
    }

    /// Record one navigation into the graph.
    pub async fn submit(&self, submission: &PathSubmission) -> Result<IngestReceipt> {
        self.ingestor.submit(submission).await
    }

    /// Search for reusable navigations. The top match, if any, gets a
    /// background usage bump so repeated wins keep rising.
    ///
    /// A workflow failure is retried once as a plain direct search before
    /// the error surfaces.
    pub async fn search(
        &self,
        query: &str,
        domain_hint: Option<&str>,
        limit: Option<usize>,
    ) -> Result<SearchResponse> {
        let limit = limit.unwrap_or(self.config.default_search_limit);
        let response = match self.workflow.run(query, domain_hint, limit).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Workflow failed, retrying as direct search");
                self.direct_search(query, domain_hint, limit).await?
            }
        };

        if let Some(top) = response.matched_paths.first() {
            maintenance::spawn_usage_bump(
                self.store.clone(),
                top.domain.clone(),
                top.task_intent.clone(),
            );
        }
        Ok(response)
    }

    /// Non-orchestrated search used when the workflow itself errors.
    async fn direct_search(
        &self,
        query: &str,
        domain_hint: Option<&str>,
        limit: usize,
    ) -> Result<SearchResponse> {
        let started = std::time::Instant::now();
        let matched = self.search.search(query, domain_hint, limit).await?;
        let max_similarity = matched
            .first()
            .map(|path| path.relevance_score)
            .unwrap_or(0.0);
        Ok(SearchResponse {
            query: query.to_string(),
            total_matched: matched.len(),
            matched_paths: matched,
            performance: SearchPerformance {
                search_time_ms: started.elapsed().as_millis() as u64,
                strategy: workflow::STRATEGY_FALLBACK.to_string(),
                reasoning: "Workflow error, answered by direct search".to_string(),
                max_similarity,
            },
        })
    }

    /// Explicit usage reinforcement, for callers that confirm a replay
    /// succeeded out of band.
    pub async fn increment_usage(&self, domain: &str, task_intent: &str) -> Result<()> {
        self.store.bump_usage(domain, task_intent).await
    }

    /// Delete stale NEXT_STEP structure. `None` uses the configured
    /// retention window.
    pub async fn cleanup_old_paths(&self, days: Option<i64>) -> Result<CleanupReport> {
        maintenance::cleanup_old_paths(
            self.store.as_ref(),
            Some(days.unwrap_or(self.config.cleanup_days)),
        )
        .await
    }

    pub async fn graph_stats(&self) -> Result<GraphStats> {
        self.store.stats().await
    }

    pub async fn popular_paths(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PopularPath>> {
        self.store.popular_paths(domain, limit).await
    }
}
