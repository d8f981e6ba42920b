//! Multi-criterion pairwise comparison.

use std::borrow::Cow;
use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::criteria::{Criterion, MAX_CRITERION_SCORE};
use crate::prompts::DocSide;

use super::judge::CriterionJudge;
use super::types::{CriterionVerdict, PairwiseResult};

/// Judgment counters a comparator may expose for run statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgmentCounts {
    pub judgments: usize,
    pub errors: usize,
}

/// Decides "which of two documents is better". The ranking algorithm depends only on this.
#[async_trait]
pub trait PairComparator: Send + Sync {
    /// Compare `doc_a` against `doc_b`. Never fails: errors come back as results.
    async fn compare(&self, doc_a: &str, doc_b: &str) -> PairwiseResult;

    fn judgment_counts(&self) -> JudgmentCounts {
        JudgmentCounts::default()
    }
}

/// Resolves the text a judge sees for one document under one criterion.
pub trait ExcerptSource: Send + Sync {
    fn excerpt<'a>(&'a self, doc_id: &str, text: &'a str, criterion: &Criterion) -> Cow<'a, str>;
}

/// Shows every criterion the whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullText;

impl ExcerptSource for FullText {
    fn excerpt<'a>(&'a self, _doc_id: &str, text: &'a str, _criterion: &Criterion) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }
}

/// Weighted contribution of one verdict: `(score / 5) * weight`.
pub fn weighted_score(score: f64, weight: f64) -> f64 {
    (score / MAX_CRITERION_SCORE) * weight
}

/// Judges every criterion for a pair and resolves the weighted winner.
pub struct CriteriaComparator {
    documents: HashMap<String, String>,
    criteria: Vec<Criterion>,
    judge: CriterionJudge,
    excerpts: Box<dyn ExcerptSource>,
    concurrency: usize,
}

impl CriteriaComparator {
    pub fn new(
        documents: HashMap<String, String>,
        criteria: Vec<Criterion>,
        judge: CriterionJudge,
    ) -> Self {
        Self {
            documents,
            criteria,
            judge,
            excerpts: Box::new(FullText),
            concurrency: 1,
        }
    }

    pub fn with_excerpts(mut self, source: impl ExcerptSource + 'static) -> Self {
        self.excerpts = Box::new(source);
        self
    }

    /// Criteria of one pair judged at most `n` at a time. Verdict order is unchanged.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    async fn judge_criterion(
        &self,
        a: DocSide<'_>,
        b: DocSide<'_>,
        criterion: &Criterion,
    ) -> CriterionVerdict {
        let text_a = self.excerpts.excerpt(a.id, a.text, criterion);
        let text_b = self.excerpts.excerpt(b.id, b.text, criterion);
        self.judge
            .judge(
                DocSide::new(a.id, &text_a),
                DocSide::new(b.id, &text_b),
                criterion,
            )
            .await
    }
}

#[async_trait]
impl PairComparator for CriteriaComparator {
    async fn compare(&self, doc_a: &str, doc_b: &str) -> PairwiseResult {
        if let Err(err) = self.judge.oracle().validate_credentials() {
            warn!(doc_a, doc_b, error = %err, "oracle credentials rejected; skipping pair");
            return PairwiseResult::pair_error(doc_a, doc_b, format!("Invalid oracle credentials: {err}"));
        }

        let (text_a, text_b) = match (self.documents.get(doc_a), self.documents.get(doc_b)) {
            (Some(a), Some(b)) => (a.as_str(), b.as_str()),
            (None, _) => {
                warn!(doc_a, doc_b, "unknown document id");
                return PairwiseResult::pair_error(doc_a, doc_b, format!("Unknown document id: {doc_a}"));
            }
            (_, None) => {
                warn!(doc_a, doc_b, "unknown document id");
                return PairwiseResult::pair_error(doc_a, doc_b, format!("Unknown document id: {doc_b}"));
            }
        };
        let a = DocSide::new(doc_a, text_a);
        let b = DocSide::new(doc_b, text_b);

        let verdicts: Vec<CriterionVerdict> = if self.concurrency > 1 {
            let pending: Vec<_> = self
                .criteria
                .iter()
                .map(|criterion| self.judge_criterion(a, b, criterion))
                .collect();
            stream::iter(pending)
                .buffered(self.concurrency)
                .collect()
                .await
        } else {
            let mut verdicts = Vec::with_capacity(self.criteria.len());
            for criterion in &self.criteria {
                verdicts.push(self.judge_criterion(a, b, criterion).await);
            }
            verdicts
        };

        let (mut weighted_a, mut weighted_b) = (0.0, 0.0);
        for (criterion, verdict) in self.criteria.iter().zip(&verdicts) {
            weighted_a += weighted_score(verdict.score_a, criterion.weight);
            weighted_b += weighted_score(verdict.score_b, criterion.weight);
        }

        let mut result =
            PairwiseResult::from_verdicts(doc_a, doc_b, verdicts, weighted_a, weighted_b);
        if !result.verdicts.is_empty() && result.verdicts.iter().all(CriterionVerdict::is_error) {
            let n = result.verdicts.len();
            warn!(doc_a, doc_b, "every criterion judgment failed");
            result = result.into_failed(format!("All {n} criterion judgments failed"));
        }
        debug!(
            doc_a,
            doc_b,
            weighted_a,
            weighted_b,
            winner = %result.winner,
            "pair compared"
        );
        result
    }

    fn judgment_counts(&self) -> JudgmentCounts {
        JudgmentCounts {
            judgments: self.judge.judgments(),
            errors: self.judge.error_judgments(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankConfig;
    use crate::gateway::{JudgeOracle, ProviderError};
    use crate::prompts::PromptInstance;
    use crate::rank::types::Winner;
    use std::sync::{Arc, Mutex};

    /// Records every user prompt and answers with a fixed reply.
    struct Recording {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JudgeOracle for Recording {
        async fn judge(
            &self,
            prompt: &PromptInstance,
            _max_output_tokens: u32,
        ) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.user.clone());
            self.reply
                .clone()
                .map_err(|e| ProviderError::provider("stub", e, false))
        }
    }

    /// Shows each criterion a labelled stand-in instead of the document body.
    struct Labelled;

    impl ExcerptSource for Labelled {
        fn excerpt<'a>(&'a self, doc_id: &str, _text: &'a str, criterion: &Criterion) -> Cow<'a, str> {
            Cow::Owned(format!("excerpt of {doc_id} for {}", criterion.name))
        }
    }

    fn documents() -> HashMap<String, String> {
        HashMap::from([
            ("a".to_string(), "FULL BODY OF A".to_string()),
            ("b".to_string(), "FULL BODY OF B".to_string()),
        ])
    }

    fn criteria() -> Vec<Criterion> {
        vec![
            Criterion::new("1", "Depth", "How deep?", 60.0),
            Criterion::new("2", "Tone", "How polite?", 40.0),
        ]
    }

    #[tokio::test]
    async fn excerpt_source_replaces_full_text() {
        let oracle = Recording::new(Ok(r#"{"document_a_score": 4, "document_b_score": 2, "winner": "A"}"#));
        let judge = CriterionJudge::new(oracle.clone(), RankConfig::default());
        let comparator = CriteriaComparator::new(documents(), criteria(), judge).with_excerpts(Labelled);

        let result = comparator.compare("a", "b").await;
        assert_eq!(result.winner, Winner::A);

        let prompts = oracle.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("excerpt of a for Depth"));
        assert!(prompts[0].contains("excerpt of b for Depth"));
        assert!(prompts[1].contains("excerpt of a for Tone"));
        assert!(prompts.iter().all(|p| !p.contains("FULL BODY")));
    }

    #[tokio::test]
    async fn all_failed_judgments_mark_the_pair_as_failed() {
        let oracle = Recording::new(Err("overloaded"));
        let judge = CriterionJudge::new(oracle, RankConfig::default());
        let comparator = CriteriaComparator::new(documents(), criteria(), judge);

        let result = comparator.compare("a", "b").await;
        assert!(result.is_error());
        assert_eq!(result.winner, Winner::NotApplicable);
        assert_eq!(result.verdicts.len(), 2);
        assert_eq!(result.explanation, "All 2 criterion judgments failed");
        assert!(!result.explanation.contains("independent scoring"));
        assert_eq!(comparator.judgment_counts().errors, 2);
    }

    #[tokio::test]
    async fn partial_failure_still_decides_by_weight() {
        let oracle = Recording::new(Ok(r#"{"document_a_score": 5, "document_b_score": 1, "winner": "A"}"#));
        let judge = CriterionJudge::new(oracle, RankConfig::default());
        let mut criteria = criteria();
        criteria.truncate(1);
        let comparator = CriteriaComparator::new(documents(), criteria, judge);

        let result = comparator.compare("a", "b").await;
        assert!(!result.is_error());
        assert_eq!((result.weighted_a, result.weighted_b), (60.0, 12.0));
    }

    #[test]
    fn weighted_score_scales_by_max() {
        assert_eq!(weighted_score(5.0, 60.0), 60.0);
        assert_eq!(weighted_score(0.0, 40.0), 0.0);
        assert!((weighted_score(3.0, 20.0) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn full_text_borrows() {
        let c = Criterion::new("x", "X", "", 10.0);
        assert!(matches!(FullText.excerpt("d", "body", &c), Cow::Borrowed("body")));
    }
}
