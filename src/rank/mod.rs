//! Pairwise-comparison ranking engine.
//!
//! Leaf-first:
//! - [`judge`]: one oracle call per (pair, criterion), normalized to a verdict
//! - [`comparator`]: weighted multi-criterion winner for a pair
//! - [`cache`]: at most one comparison per unordered pair per run
//! - [`engine`]: merge sort over the cached comparator
//! - [`summary`]: win counts, averages and report rows

pub mod cache;
pub mod comparator;
pub mod engine;
pub mod judge;
pub mod summary;
pub mod trace;
pub mod types;

pub use cache::{ComparisonCache, PairKey};
pub use comparator::{
    weighted_score, CriteriaComparator, ExcerptSource, FullText, JudgmentCounts, PairComparator,
};
pub use engine::{rank, rank_with_trace, RankingEngine};
pub use judge::{parse_verdict, CriterionJudge, JudgeError};
pub use summary::{summarize, ComparisonRow, CriterionRow, DocumentSummary, RankSummary};
pub use trace::{JsonlTraceSink, JudgmentTrace, TraceError, TraceSink, TraceWorker};
pub use types::*;
