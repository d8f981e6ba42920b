//! Merge-sort ranking over an expensive, possibly failing comparator.
//!
//! The input is split by position, each half ranked recursively, and the
//! halves merged by comparing their heads through the [`ComparisonCache`].
//! Ties and errors keep the left head, so the sort always terminates and the
//! output is reproducible for a fixed set of pairwise results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tracing::info;

use crate::config::RankConfig;
use crate::criteria::Criterion;
use crate::gateway::JudgeOracle;

use super::cache::ComparisonCache;
use super::comparator::{CriteriaComparator, PairComparator};
use super::judge::CriterionJudge;
use super::trace::TraceSink;
use super::types::{RankOutcome, RankStats, Winner};

/// One ranking run. Consumed by [`RankingEngine::run`]; build a new one per run.
pub struct RankingEngine<C: PairComparator> {
    comparator: C,
    cache: ComparisonCache,
    concurrent: bool,
}

impl<C: PairComparator> RankingEngine<C> {
    pub fn new(comparator: C) -> Self {
        Self {
            comparator,
            cache: ComparisonCache::new(),
            concurrent: false,
        }
    }

    /// Rank the two halves of each split concurrently.
    pub fn concurrent(mut self, enabled: bool) -> Self {
        self.concurrent = enabled;
        self
    }

    /// Rank `ids` best-first and hand back the comparison log.
    ///
    /// Callers should pass distinct ids; duplicates are ranked like any other id.
    pub async fn run(self, ids: &[String]) -> RankOutcome {
        let start = Instant::now();
        info!(documents = ids.len(), concurrent = self.concurrent, "ranking started");

        let ranked = self.sort(ids.to_vec()).await;

        let counts = self.comparator.judgment_counts();
        let stats = RankStats {
            comparisons_requested: self.cache.requests(),
            pairs_evaluated: self.cache.len(),
            cache_hits: self.cache.hits(),
            judgments: counts.judgments,
            error_judgments: counts.errors,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            documents = ranked.len(),
            pairs = stats.pairs_evaluated,
            judgments = stats.judgments,
            errors = stats.error_judgments,
            elapsed_ms = stats.elapsed_ms,
            "ranking finished"
        );

        RankOutcome {
            ranked,
            log: self.cache.into_log(),
            stats,
        }
    }

    fn sort(&self, mut ids: Vec<String>) -> BoxFuture<'_, Vec<String>> {
        async move {
            if ids.len() <= 1 {
                return ids;
            }
            let right = ids.split_off(ids.len() / 2);
            let left = ids;
            let (left, right) = if self.concurrent {
                futures::join!(self.sort(left), self.sort(right))
            } else {
                let left = self.sort(left).await;
                (left, self.sort(right).await)
            };
            self.merge(left, right).await
        }
        .boxed()
    }

    async fn merge(&self, left: Vec<String>, right: Vec<String>) -> Vec<String> {
        let mut merged = Vec::with_capacity(left.len() + right.len());
        let (mut i, mut j) = (0, 0);

        while i < left.len() && j < right.len() {
            let (l, r) = (left[i].as_str(), right[j].as_str());
            let result = self
                .cache
                .get_or_compute(l, r, || self.comparator.compare(l, r))
                .await;
            if result.winner == Winner::B {
                merged.push(right[j].clone());
                j += 1;
            } else {
                merged.push(left[i].clone());
                i += 1;
            }
        }

        merged.extend_from_slice(&left[i..]);
        merged.extend_from_slice(&right[j..]);
        merged
    }
}

/// Rank documents by weighted multi-criterion pairwise judgment.
///
/// `documents` maps every id in `ids` to its text. Fewer than two ids return
/// immediately without contacting the oracle.
pub async fn rank(
    ids: &[String],
    documents: &HashMap<String, String>,
    criteria: &[Criterion],
    oracle: Arc<dyn JudgeOracle>,
    config: &RankConfig,
) -> RankOutcome {
    rank_with_trace(ids, documents, criteria, oracle, config, None).await
}

/// [`rank`] with every criterion judgment recorded to `trace`.
pub async fn rank_with_trace(
    ids: &[String],
    documents: &HashMap<String, String>,
    criteria: &[Criterion],
    oracle: Arc<dyn JudgeOracle>,
    config: &RankConfig,
    trace: Option<Arc<dyn TraceSink>>,
) -> RankOutcome {
    let mut judge = CriterionJudge::new(oracle, config.clone());
    if let Some(sink) = trace {
        judge = judge.with_trace(sink);
    }
    let comparator = CriteriaComparator::new(documents.clone(), criteria.to_vec(), judge)
        .concurrency(config.max_concurrency);
    RankingEngine::new(comparator)
        .concurrent(config.max_concurrency > 1)
        .run(ids)
        .await
}
