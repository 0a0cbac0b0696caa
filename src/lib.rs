//! # waymark
//!
//! A path graph engine for web navigation reuse. Recorded navigations
//! (ordered UI steps plus the intent behind them) are stored as a
//! weighted property graph; later queries find reusable paths by
//! semantic similarity over stored intents, with an agent-based
//! rediscovery workflow for queries nothing matches well.
//!
//! Graph shape:
//!
//! ```text
//! (ROOT {domain})-[HAS_STEP {taskIntent, intentEmbedding, weight}]->
//!     (STEP)-[NEXT_STEP {weight, sequenceOrder}]->(STEP)-> ...
//! ```
//!
//! The crate is transport-agnostic: embed [`PathGraphEngine`] behind
//! whatever server or message consumer the deployment runs.

pub mod agents;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod ingest;
pub mod intent;
pub mod maintenance;
pub mod model;
pub mod search;
pub mod similarity;
pub mod store;
pub mod tracing_setup;
pub mod workflow;

pub use config::EngineConfig;
pub use engine::PathGraphEngine;
pub use errors::{EngineError, Result};
pub use model::{
    IngestReceipt, IntentOverwritePolicy, MatchedPath, PathSubmission, SearchResponse, StepAction,
    StepData,
};
pub use tracing_setup::init_tracing;
