//! Runtime configuration
//!
//! Everything tunable comes from environment variables with working
//! defaults, so a bare `EngineConfig::from_env()` boots against a local
//! graph database. The OpenAI key is the only genuinely optional piece;
//! without it the engine runs with matching degraded.

use crate::constants::{DEFAULT_CLEANUP_DAYS, DEFAULT_SEARCH_LIMIT, EMBEDDING_CACHE_CAPACITY};
use crate::model::IntentOverwritePolicy;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    /// Absent key disables embeddings and intent classification.
    pub openai_api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,

    pub embedding_cache_capacity: usize,
    pub intent_policy: IntentOverwritePolicy,
    pub cleanup_days: i64,
    pub default_search_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            neo4j_uri: "bolt://localhost:7687".to_string(),
            neo4j_user: "neo4j".to_string(),
            neo4j_password: "password".to_string(),
            openai_api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_cache_capacity: EMBEDDING_CACHE_CAPACITY,
            intent_policy: IntentOverwritePolicy::default(),
            cleanup_days: DEFAULT_CLEANUP_DAYS,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load from `WAYMARK_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            neo4j_uri: env_or("WAYMARK_NEO4J_URI", defaults.neo4j_uri),
            neo4j_user: env_or("WAYMARK_NEO4J_USER", defaults.neo4j_user),
            neo4j_password: env_or("WAYMARK_NEO4J_PASSWORD", defaults.neo4j_password),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            embedding_model: env_or("WAYMARK_EMBEDDING_MODEL", defaults.embedding_model),
            chat_model: env_or("WAYMARK_CHAT_MODEL", defaults.chat_model),
            embedding_cache_capacity: env_parsed(
                "WAYMARK_CACHE_CAPACITY",
                defaults.embedding_cache_capacity,
            ),
            intent_policy: intent_policy_from_env(),
            cleanup_days: env_parsed("WAYMARK_CLEANUP_DAYS", defaults.cleanup_days),
            default_search_limit: env_parsed(
                "WAYMARK_SEARCH_LIMIT",
                defaults.default_search_limit,
            ),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn intent_policy_from_env() -> IntentOverwritePolicy {
    match std::env::var("WAYMARK_INTENT_OVERWRITE").as_deref() {
        Ok("keep-first") => IntentOverwritePolicy::KeepFirst,
        _ => IntentOverwritePolicy::OverwriteLatest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_boot_without_env() {
        let config = EngineConfig::default();
        assert_eq!(config.neo4j_uri, "bolt://localhost:7687");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.intent_policy, IntentOverwritePolicy::OverwriteLatest);
    }
}
