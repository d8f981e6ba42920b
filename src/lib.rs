#![forbid(unsafe_code)]

//! # docrank
//!
//! Rank documents by repeated pairwise LLM judgment.
//!
//! For each pair of documents a judge scores both sides 1–5 on every criterion;
//! weighted totals decide the pairwise winner. A merge sort turns those
//! O(n log n) pairwise outcomes into a best-first ranking, with a run-scoped
//! cache guaranteeing each unordered pair is judged at most once. Oracle
//! failures degrade to zero-scored verdicts and never abort a run.

pub mod config;
pub mod criteria;
pub mod gateway;
pub mod prompts;
pub mod rank;
pub mod tokens;

pub use config::{ConfigError, OracleConfig, RankConfig};
pub use criteria::{default_criteria, normalize_weights, validate_criteria, Criterion, CriteriaError};
pub use gateway::{JudgeOracle, ProviderError, ProviderGateway};
pub use rank::{
    rank, rank_with_trace, summarize, CriteriaComparator, CriterionJudge, CriterionVerdict,
    JsonlTraceSink, JudgmentTrace, PairComparator, PairwiseResult, RankOutcome, RankStats,
    RankSummary, RankingEngine, TraceError, TraceSink, TraceWorker, Winner,
};
