//! Rediscovery agents
//!
//! When direct similarity search comes back weak, agents re-attack the
//! graph from different angles. Each agent tags its finds so the workflow
//! can rank and dedupe across agents before answering.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::constants::{AGENT_KEYWORD_FANOUT, REDISCOVERY_BONUS};
use crate::errors::Result;
use crate::intent::IntentAnalysis;
use crate::model::MatchedPath;
use crate::search::PathSearch;

/// A path found by an agent, carrying ranking metadata that never leaves
/// the workflow.
#[derive(Debug, Clone)]
pub struct RediscoveredPath {
    pub path: MatchedPath,
    pub agent_source: String,
    /// Base relevance plus the rediscovery bonus; ordering only.
    pub rediscovery_score: f32,
}

/// Trait for alternative search strategies
#[async_trait]
pub trait RediscoveryAgent: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt to find paths the direct search missed. Agents degrade:
    /// individual search failures are logged and skipped, never propagated.
    async fn rediscover(
        &self,
        query: &str,
        analysis: &IntentAnalysis,
    ) -> Result<Vec<RediscoveredPath>>;
}

/// Re-searches with the classifier's extracted keywords instead of the
/// raw query, or with the raw query itself when the classifier extracted
/// none. Fan-out is bounded, one result per keyword, no domain
/// restriction.
pub struct KeywordSearchAgent {
    search: Arc<PathSearch>,
}

impl KeywordSearchAgent {
    pub fn new(search: Arc<PathSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl RediscoveryAgent for KeywordSearchAgent {
    fn name(&self) -> &'static str {
        "keyword_search_agent"
    }

    async fn rediscover(
        &self,
        query: &str,
        analysis: &IntentAnalysis,
    ) -> Result<Vec<RediscoveredPath>> {
        let mut keywords: Vec<&str> = analysis
            .keywords
            .iter()
            .map(String::as_str)
            .take(AGENT_KEYWORD_FANOUT)
            .collect();
        if keywords.is_empty() {
            keywords.push(query);
        }

        tracing::debug!(?keywords, "Keyword rediscovery fan-out");
        let searches = keywords
            .iter()
            .map(|keyword| self.search.search(keyword, None, 1));
        let outcomes = join_all(searches).await;

        let mut found = Vec::new();
        for (keyword, outcome) in keywords.iter().zip(outcomes) {
            match outcome {
                Ok(paths) => {
                    for path in paths {
                        found.push(RediscoveredPath {
                            rediscovery_score: path.relevance_score + REDISCOVERY_BONUS,
                            agent_source: self.name().to_string(),
                            path,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(keyword = %keyword, error = %e, "Keyword search failed, skipping");
                }
            }
        }
        Ok(found)
    }
}

/// Searches across sites with a condensed phrase built from the
/// classifier's top keywords, or from the intent type when no keywords
/// were extracted. Not part of the default workflow; wire it in when
/// cross-site reuse is wanted.
pub struct CrossDomainAgent {
    search: Arc<PathSearch>,
}

impl CrossDomainAgent {
    pub fn new(search: Arc<PathSearch>) -> Self {
        Self { search }
    }

    fn phrase_for(analysis: &IntentAnalysis) -> String {
        let joined = analysis
            .keywords
            .iter()
            .take(AGENT_KEYWORD_FANOUT)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            format!("{} task", analysis.intent_type)
        } else {
            joined
        }
    }
}

#[async_trait]
impl RediscoveryAgent for CrossDomainAgent {
    fn name(&self) -> &'static str {
        "cross_domain_agent"
    }

    async fn rediscover(
        &self,
        _query: &str,
        analysis: &IntentAnalysis,
    ) -> Result<Vec<RediscoveredPath>> {
        let phrase = Self::phrase_for(analysis);
        let paths = self
            .search
            .search(&phrase, None, 2)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(phrase = %phrase, error = %e, "Cross-domain search failed, skipping");
                Vec::new()
            });

        Ok(paths
            .into_iter()
            .map(|path| RediscoveredPath {
                rediscovery_score: path.relevance_score + REDISCOVERY_BONUS,
                agent_source: self.name().to_string(),
                path,
            })
            .collect())
    }
}
