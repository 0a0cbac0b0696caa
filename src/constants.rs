//! Documented constants for the path graph engine
//!
//! All tunable policy values in one place with justification.
//! Centralizing constants prevents magic numbers and makes tuning easier.

// =============================================================================
// SIMILARITY POLICY
// =============================================================================

/// Minimum cosine similarity for a HAS_STEP intent to count as a candidate.
///
/// Below 0.3 the match is essentially noise for 1536-dim text embeddings:
/// unrelated intents routinely score 0.1-0.25 against each other, while
/// paraphrases of the same task land well above 0.4. The floor keeps the
/// candidate list short without discarding legitimate loose matches.
pub const SIMILARITY_FLOOR: f32 = 0.3;

/// Branch threshold for the search workflow.
///
/// At or above this score the best existing path is trusted and returned
/// directly; below it the engine spends an intent-analysis round and lets a
/// rediscovery agent look for alternatives. 0.43 sits between the noise band
/// and the paraphrase band observed in recorded-intent corpora.
pub const SIMILARITY_BRANCH_THRESHOLD: f32 = 0.43;

/// Relevance bonus added to rediscovered paths before final ranking.
///
/// Small enough that a genuinely better existing match still wins, large
/// enough to break ties in favor of the agent's keyword hits. Kept on a
/// separate field so the client-visible relevance score stays honest.
pub const REDISCOVERY_BONUS: f32 = 0.1;

// =============================================================================
// GRAPH TRAVERSAL
// =============================================================================

/// Maximum NEXT_STEP hops followed during path reconstruction.
///
/// Recorded navigations are short (login flows, reservations: 3-10 steps).
/// 20 hops is double the longest observed path and bounds the walk if a
/// cycle ever sneaks into the graph.
pub const MAX_PATH_HOPS: usize = 20;

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// Embedding vector dimension (text-embedding-3-small).
pub const EMBEDDING_DIM: usize = 1536;

/// Embedding cache capacity (entries).
///
/// Repeated identical text is the common case (the same intents and step
/// descriptions recur across sessions), so a moderate bound captures most
/// provider-call savings. At 1536 f32 dims this is ~6 MB worst case.
pub const EMBEDDING_CACHE_CAPACITY: usize = 1000;

// =============================================================================
// INTENT CLASSIFIER
// =============================================================================

/// Per-call timeout for the LLM intent classifier, seconds.
pub const CLASSIFIER_TIMEOUT_SECS: u64 = 10;

/// Outer deadline wrapped around the classifier call, seconds.
///
/// Slightly larger than the client's own timeout so the normal failure path
/// is the client's error, not a race with the outer deadline; the outer
/// deadline only fires if the client itself hangs.
pub const CLASSIFIER_DEADLINE_SECS: u64 = 12;

/// Maximum keywords taken from an intent analysis.
pub const MAX_INTENT_KEYWORDS: usize = 4;

/// Maximum keywords the keyword agent actually fans out on.
///
/// Also the bound on intra-request sub-search concurrency.
pub const AGENT_KEYWORD_FANOUT: usize = 2;

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Default staleness window for relationship cleanup, days.
pub const DEFAULT_CLEANUP_DAYS: i64 = 30;

/// Default result limit for searches when the caller does not specify one.
pub const DEFAULT_SEARCH_LIMIT: usize = 3;
