//! Per-criterion judgment: prompt, budget, oracle call, and reply parsing.
//!
//! Implements the contract between the judge's JSON replies and
//! [`CriterionVerdict`]. Every failure is recovered here: callers always get a
//! fully populated verdict back, never an error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::RankConfig;
use crate::criteria::{Criterion, MAX_CRITERION_SCORE};
use crate::gateway::{JudgeOracle, ProviderError};
use crate::prompts::{render_judgment, DocSide, PromptInstance};
use crate::tokens::{count_tokens, response_budget};

use super::trace::{content_hash, now_epoch_ms, JudgmentTrace, TraceSink};
use super::types::{CriterionVerdict, Winner};

/// Error type for a single judgment. Never escapes [`CriterionJudge`].
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("judgment timed out after {0:?}")]
    Timeout(Duration),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("empty reply from judge")]
    EmptyReply,
    #[error("judge concurrency limiter closed")]
    Closed,
}

// =============================================================================
// Reply parsing
// =============================================================================

/// Parse a judge reply into a verdict, repairing missing or mistyped fields.
pub fn parse_verdict(raw: &str, criterion: &Criterion) -> Result<CriterionVerdict, JudgeError> {
    if raw.trim().is_empty() {
        return Err(JudgeError::EmptyReply);
    }
    let payload = extract_json(raw);
    let value: Value =
        serde_json::from_str(payload).map_err(|e| JudgeError::Parse(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(JudgeError::Parse("reply is not a JSON object".into()));
    };

    Ok(CriterionVerdict {
        criterion_id: criterion.id.clone(),
        criterion_name: criterion.name.clone(),
        score_a: coerce_score(fields.get("document_a_score")),
        score_b: coerce_score(fields.get("document_b_score")),
        winner: match fields.get("winner") {
            Some(Value::String(s)) => Winner::parse_lenient(s),
            _ => Winner::Tie,
        },
        document_a_analysis: text_field(&fields, "document_a_analysis"),
        document_b_analysis: text_field(&fields, "document_b_analysis"),
        comparative_analysis: text_field(&fields, "comparative_analysis"),
        reasoning: text_field(&fields, "reasoning"),
        error: None,
    })
}

/// Strip code fences, then take the span from the first `{` to the last `}`.
fn extract_json(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some((_, rest)) = s.split_once("```json") {
        s = rest.split("```").next().unwrap_or(rest).trim();
    } else if let Some((_, rest)) = s.split_once("```") {
        s = rest.split("```").next().unwrap_or(rest).trim();
    }

    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}

fn coerce_score(value: Option<&Value>) -> f64 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if score.is_finite() {
        score.clamp(0.0, MAX_CRITERION_SCORE)
    } else {
        0.0
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Null) | Some(Value::String(_)) | None => {
            format!("No {} provided", key.replace('_', " "))
        }
        Some(other) => other.to_string(),
    }
}

// =============================================================================
// Judge
// =============================================================================

/// Issues one oracle call per (pair, criterion) and normalizes the outcome.
pub struct CriterionJudge {
    oracle: Arc<dyn JudgeOracle>,
    config: RankConfig,
    permits: Arc<Semaphore>,
    trace: Option<Arc<dyn TraceSink>>,
    judgments: AtomicUsize,
    errors: AtomicUsize,
}

impl CriterionJudge {
    pub fn new(oracle: Arc<dyn JudgeOracle>, config: RankConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            oracle,
            config,
            permits,
            trace: None,
            judgments: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn oracle(&self) -> &dyn JudgeOracle {
        self.oracle.as_ref()
    }

    /// Judgments issued so far.
    pub fn judgments(&self) -> usize {
        self.judgments.load(Ordering::Relaxed)
    }

    /// Judgments that degraded to an error verdict.
    pub fn error_judgments(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Judge one criterion for the ordered pair `(a, b)`.
    pub async fn judge(
        &self,
        a: DocSide<'_>,
        b: DocSide<'_>,
        criterion: &Criterion,
    ) -> CriterionVerdict {
        let index = self.judgments.fetch_add(1, Ordering::Relaxed);
        let prompt = render_judgment(criterion, a, b);
        let full_text = prompt.full_text();
        let prompt_tokens = count_tokens(&full_text);
        let budget = response_budget(prompt_tokens, &self.config);

        let start = Instant::now();
        let verdict = match self.call(&prompt, budget).await {
            Ok(raw) => parse_verdict(&raw, criterion),
            Err(err) => Err(err),
        };
        let latency = start.elapsed();

        let verdict = match verdict {
            Ok(v) => {
                debug!(
                    doc_a = a.id,
                    doc_b = b.id,
                    criterion = %criterion.name,
                    score_a = v.score_a,
                    score_b = v.score_b,
                    winner = %v.winner,
                    "criterion judged"
                );
                v
            }
            Err(err) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    doc_a = a.id,
                    doc_b = b.id,
                    criterion = %criterion.name,
                    error = %err,
                    "judgment degraded to error verdict"
                );
                CriterionVerdict::error(criterion, &err)
            }
        };

        if let Some(sink) = &self.trace {
            let event = JudgmentTrace {
                timestamp_ms: now_epoch_ms(),
                judgment_index: index,
                doc_a: a.id.to_string(),
                doc_b: b.id.to_string(),
                doc_a_hash: content_hash(a.text),
                doc_b_hash: content_hash(b.text),
                criterion_id: criterion.id.clone(),
                prompt_template_slug: prompt.template_slug.clone(),
                prompt_hash: content_hash(&full_text),
                prompt_tokens,
                response_budget: budget,
                score_a: verdict.score_a,
                score_b: verdict.score_b,
                winner: verdict.winner.to_string(),
                error: verdict.error.clone(),
                latency_ms: latency.as_millis() as u64,
            };
            if let Err(err) = sink.record(event) {
                warn!(error = %err, "failed to record judgment trace");
            }
        }

        verdict
    }

    async fn call(&self, prompt: &PromptInstance, budget: u32) -> Result<String, JudgeError> {
        let _permit = self.permits.acquire().await.map_err(|_| JudgeError::Closed)?;
        let timeout = self.config.judge_timeout;
        match tokio::time::timeout(timeout, self.oracle.judge(prompt, budget)).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(JudgeError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::default_criteria;

    fn clarity() -> Criterion {
        default_criteria().remove(0)
    }

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"criterion_name": "Clarity", "document_a_score": 4, "document_b_score": 2,
            "document_a_analysis": "crisp", "document_b_analysis": "muddled",
            "comparative_analysis": "A is crisper", "reasoning": "see above", "winner": "A"}"#;
        let v = parse_verdict(raw, &clarity()).unwrap();
        assert_eq!((v.score_a, v.score_b), (4.0, 2.0));
        assert_eq!(v.winner, Winner::A);
        assert_eq!(v.document_b_analysis, "muddled");
        assert_eq!(v.criterion_id, "1");
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let raw = "Here you go:\n```json\n{\"document_a_score\": 3, \"document_b_score\": 5, \"winner\": \"B\"}\n```\nThanks.";
        let v = parse_verdict(raw, &clarity()).unwrap();
        assert_eq!(v.winner, Winner::B);
        assert_eq!(v.score_b, 5.0);

        let bare = "```\n{\"document_a_score\": 1, \"document_b_score\": 1, \"winner\": \"Tie\"}\n```";
        assert_eq!(parse_verdict(bare, &clarity()).unwrap().winner, Winner::Tie);
    }

    #[test]
    fn braces_are_located_without_fences() {
        let raw = "My verdict is {\"document_a_score\": 2, \"document_b_score\": 3, \"winner\": \"B\"} overall.";
        assert_eq!(parse_verdict(raw, &clarity()).unwrap().score_a, 2.0);
    }

    #[test]
    fn missing_fields_are_repaired() {
        let v = parse_verdict("{}", &clarity()).unwrap();
        assert_eq!((v.score_a, v.score_b), (0.0, 0.0));
        assert_eq!(v.winner, Winner::Tie);
        assert_eq!(v.document_a_analysis, "No document a analysis provided");
        assert_eq!(v.reasoning, "No reasoning provided");
        assert!(v.error.is_none());
    }

    #[test]
    fn scores_are_coerced_and_clamped() {
        let raw = r#"{"document_a_score": "4", "document_b_score": "excellent", "winner": "A"}"#;
        let v = parse_verdict(raw, &clarity()).unwrap();
        assert_eq!((v.score_a, v.score_b), (4.0, 0.0));

        let raw = r#"{"document_a_score": 9, "document_b_score": -2, "winner": "A"}"#;
        let v = parse_verdict(raw, &clarity()).unwrap();
        assert_eq!((v.score_a, v.score_b), (5.0, 0.0));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_verdict("the documents are both fine", &clarity()),
            Err(JudgeError::Parse(_))
        ));
        assert!(matches!(
            parse_verdict("  ", &clarity()),
            Err(JudgeError::EmptyReply)
        ));
    }

    #[test]
    fn error_verdict_carries_error_text() {
        let err = JudgeError::Parse("bad".into());
        let v = CriterionVerdict::error(&clarity(), &err);
        assert_eq!(v.winner, Winner::NotApplicable);
        assert_eq!(v.score_a, 0.0);
        assert_eq!(v.document_a_analysis, "Error during evaluation: Parse error: bad");
        assert_eq!(v.comparative_analysis, "Unable to compare due to error");
        assert_eq!(v.reasoning, "Error occurred: Parse error: bad");
    }
}
