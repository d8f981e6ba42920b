//! Verdict, result and request types for document ranking.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::criteria::Criterion;

// =============================================================================
// Per-criterion verdicts
// =============================================================================

/// Winner tag, always relative to the (A, B) orientation it was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    A,
    B,
    Tie,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Winner {
    /// Mirror for the reversed orientation. `Tie` and `N/A` are unchanged.
    pub fn swap(self) -> Self {
        match self {
            Winner::A => Winner::B,
            Winner::B => Winner::A,
            other => other,
        }
    }

    /// Lenient parse of a judge's winner field. Unrecognized values read as `Tie`.
    pub fn parse_lenient(raw: &str) -> Self {
        let s = raw.trim().trim_matches('"').trim();
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "a" | "document a" | "doc a" => Winner::A,
            "b" | "document b" | "doc b" => Winner::B,
            "n/a" | "na" => Winner::NotApplicable,
            _ => Winner::Tie,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Winner::A => "A",
            Winner::B => "B",
            Winner::Tie => "Tie",
            Winner::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One judge's verdict on one criterion for one ordered pair.
///
/// Always fully populated: scores are numeric in `[0, 5]`, text fields are
/// never empty. An oracle or parse failure yields [`CriterionVerdict::error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionVerdict {
    pub criterion_id: String,
    pub criterion_name: String,
    pub score_a: f64,
    pub score_b: f64,
    pub winner: Winner,
    pub document_a_analysis: String,
    pub document_b_analysis: String,
    pub comparative_analysis: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CriterionVerdict {
    pub fn error(criterion: &Criterion, error: impl fmt::Display) -> Self {
        let error = error.to_string();
        Self {
            criterion_id: criterion.id.clone(),
            criterion_name: criterion.name.clone(),
            score_a: 0.0,
            score_b: 0.0,
            winner: Winner::NotApplicable,
            document_a_analysis: format!("Error during evaluation: {error}"),
            document_b_analysis: format!("Error during evaluation: {error}"),
            comparative_analysis: "Unable to compare due to error".to_string(),
            reasoning: format!("Error occurred: {error}"),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn swapped(&self) -> Self {
        Self {
            criterion_id: self.criterion_id.clone(),
            criterion_name: self.criterion_name.clone(),
            score_a: self.score_b,
            score_b: self.score_a,
            winner: self.winner.swap(),
            document_a_analysis: self.document_b_analysis.clone(),
            document_b_analysis: self.document_a_analysis.clone(),
            comparative_analysis: self.comparative_analysis.clone(),
            reasoning: self.reasoning.clone(),
            error: self.error.clone(),
        }
    }
}

// =============================================================================
// Pairwise results
// =============================================================================

/// The complete outcome of comparing two documents across all criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseResult {
    pub doc_a: String,
    pub doc_b: String,
    pub verdicts: Vec<CriterionVerdict>,
    pub weighted_a: f64,
    pub weighted_b: f64,
    /// `A`, `B`, `Tie`, or `N/A` for a pair-level error.
    pub winner: Winner,
    pub explanation: String,
    /// Set when the pair short-circuited before any judgment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PairwiseResult {
    /// Aggregate verdicts into totals, an overall winner and an explanation.
    pub fn from_verdicts(
        doc_a: impl Into<String>,
        doc_b: impl Into<String>,
        verdicts: Vec<CriterionVerdict>,
        weighted_a: f64,
        weighted_b: f64,
    ) -> Self {
        let winner = if weighted_a > weighted_b {
            Winner::A
        } else if weighted_b > weighted_a {
            Winner::B
        } else {
            Winner::Tie
        };
        let mut result = Self {
            doc_a: doc_a.into(),
            doc_b: doc_b.into(),
            verdicts,
            weighted_a,
            weighted_b,
            winner,
            explanation: String::new(),
            error: None,
        };
        result.explanation = result.explain();
        result
    }

    /// Pair-level failure. The merge step reads it as a tie.
    pub fn pair_error(
        doc_a: impl Into<String>,
        doc_b: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        let error = error.to_string();
        Self {
            doc_a: doc_a.into(),
            doc_b: doc_b.into(),
            verdicts: Vec::new(),
            weighted_a: 0.0,
            weighted_b: 0.0,
            winner: Winner::NotApplicable,
            explanation: error.clone(),
            error: Some(error),
        }
    }

    /// Mark a result whose every criterion judgment failed. Verdicts are kept
    /// for reporting; the merge step reads it as a tie.
    pub fn into_failed(mut self, error: impl fmt::Display) -> Self {
        let error = error.to_string();
        self.winner = Winner::NotApplicable;
        self.explanation = error.clone();
        self.error = Some(error);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Id of the winning document, or `None` for a tie or error.
    pub fn winner_id(&self) -> Option<&str> {
        match self.winner {
            Winner::A => Some(&self.doc_a),
            Winner::B => Some(&self.doc_b),
            _ => None,
        }
    }

    /// The same fact seen from `(doc_b, doc_a)`.
    pub fn swapped(&self) -> Self {
        let mut result = Self {
            doc_a: self.doc_b.clone(),
            doc_b: self.doc_a.clone(),
            verdicts: self.verdicts.iter().map(CriterionVerdict::swapped).collect(),
            weighted_a: self.weighted_b,
            weighted_b: self.weighted_a,
            winner: self.winner.swap(),
            explanation: self.explanation.clone(),
            error: self.error.clone(),
        };
        if result.error.is_none() {
            result.explanation = result.explain();
        }
        result
    }

    fn explain(&self) -> String {
        let mut out = String::new();
        match self.winner {
            Winner::A | Winner::B => {
                let id = self.winner_id().unwrap_or_default();
                out.push_str(&format!(
                    "Document {} ({id}) is the overall winner with a weighted score of {:.2} vs {:.2}. ",
                    self.winner, self.weighted_a, self.weighted_b
                ));
                let prevailed: Vec<&str> = self
                    .verdicts
                    .iter()
                    .filter(|v| v.winner == self.winner)
                    .map(|v| v.criterion_name.as_str())
                    .collect();
                if !prevailed.is_empty() {
                    out.push_str(&format!(
                        "Document {} performed better in: {}. ",
                        self.winner,
                        prevailed.join(", ")
                    ));
                }
            }
            _ => {
                out.push_str(&format!(
                    "Documents are tied with equal weighted scores of {:.2}. ",
                    self.weighted_a
                ));
            }
        }
        out.push_str(
            "This assessment is based on both independent scoring against the rubrics and direct comparison between the documents.",
        );
        out
    }
}

// =============================================================================
// Run output
// =============================================================================

/// Counters for one ranking run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankStats {
    /// Comparisons requested by the merge step.
    pub comparisons_requested: usize,
    /// Distinct unordered pairs actually evaluated.
    pub pairs_evaluated: usize,
    /// Requests answered from the cache.
    pub cache_hits: usize,
    /// Criterion judgments issued to the oracle.
    pub judgments: usize,
    /// Judgments that degraded to an error verdict.
    pub error_judgments: usize,
    pub elapsed_ms: u64,
}

/// Ranked ids (best first) plus the audit trail that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankOutcome {
    pub ranked: Vec<String>,
    pub log: Vec<PairwiseResult>,
    #[serde(default)]
    pub stats: RankStats,
}

// =============================================================================
// CLI request
// =============================================================================

/// Input document for ranking.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankDocument {
    /// Stable identifier for the document.
    pub id: String,
    /// Text content shown to the judge.
    pub text: String,
}

/// A ranking request as read from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RankRequest {
    pub documents: Vec<RankDocument>,

    /// Explicit criteria. Takes precedence over `instruction`.
    #[serde(default)]
    pub criteria: Option<Vec<Criterion>>,

    /// Free-form instruction, judged as a single weight-100 criterion.
    #[serde(default)]
    pub instruction: Option<String>,

    /// Model override for the oracle.
    #[serde(default)]
    pub model: Option<String>,

    /// Maximum in-flight oracle calls.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl RankRequest {
    /// Explicit criteria, else the instruction criterion, else the default catalog.
    pub fn resolved_criteria(&self) -> Vec<Criterion> {
        if let Some(criteria) = self.criteria.as_ref().filter(|c| !c.is_empty()) {
            return criteria.clone();
        }
        if let Some(text) = self.instruction.as_ref().filter(|t| !t.trim().is_empty()) {
            return vec![Criterion::instruction(text.clone())];
        }
        crate::criteria::default_criteria()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(name: &str, a: f64, b: f64, winner: Winner) -> CriterionVerdict {
        CriterionVerdict {
            criterion_id: name.to_lowercase(),
            criterion_name: name.to_string(),
            score_a: a,
            score_b: b,
            winner,
            document_a_analysis: "a".into(),
            document_b_analysis: "b".into(),
            comparative_analysis: "c".into(),
            reasoning: "r".into(),
            error: None,
        }
    }

    #[test]
    fn winner_serializes_with_tags() {
        let json = serde_json::to_string(&[Winner::A, Winner::Tie, Winner::NotApplicable]).unwrap();
        assert_eq!(json, r#"["A","Tie","N/A"]"#);
        assert_eq!(Winner::parse_lenient(" b "), Winner::B);
        assert_eq!(Winner::parse_lenient("Document A"), Winner::A);
        assert_eq!(Winner::parse_lenient("draw"), Winner::Tie);
    }

    #[test]
    fn explanation_names_winner_and_prevailing_criteria() {
        let r = PairwiseResult::from_verdicts(
            "x",
            "y",
            vec![
                verdict("Clarity", 5.0, 3.0, Winner::A),
                verdict("Structure", 2.0, 4.0, Winner::B),
            ],
            60.0,
            40.0,
        );
        assert_eq!(r.winner, Winner::A);
        assert!(r
            .explanation
            .starts_with("Document A (x) is the overall winner with a weighted score of 60.00 vs 40.00. "));
        assert!(r.explanation.contains("Document A performed better in: Clarity. "));
        assert!(r.explanation.ends_with("direct comparison between the documents."));
    }

    #[test]
    fn tie_explanation() {
        let r = PairwiseResult::from_verdicts("x", "y", vec![], 12.5, 12.5);
        assert_eq!(r.winner, Winner::Tie);
        assert!(r
            .explanation
            .starts_with("Documents are tied with equal weighted scores of 12.50. "));
        assert_eq!(r.winner_id(), None);
    }

    #[test]
    fn swap_mirrors_everything() {
        let r = PairwiseResult::from_verdicts(
            "x",
            "y",
            vec![verdict("Clarity", 5.0, 1.0, Winner::A)],
            100.0,
            20.0,
        );
        let s = r.swapped();
        assert_eq!((s.doc_a.as_str(), s.doc_b.as_str()), ("y", "x"));
        assert_eq!(s.winner, Winner::B);
        assert_eq!(s.winner_id(), Some("x"));
        assert_eq!((s.weighted_a, s.weighted_b), (20.0, 100.0));
        assert_eq!(s.verdicts[0].score_a, 1.0);
        assert_eq!(s.verdicts[0].winner, Winner::B);
        assert!(s.explanation.starts_with("Document B (x)"));
        assert_eq!(s.swapped(), r);
    }

    #[test]
    fn pair_error_is_not_a_win() {
        let r = PairwiseResult::pair_error("x", "y", "Invalid API key");
        assert!(r.is_error());
        assert_eq!(r.winner, Winner::NotApplicable);
        assert_eq!(r.swapped().winner, Winner::NotApplicable);
    }

    #[test]
    fn failed_result_keeps_verdicts_and_explains_itself() {
        let mut failed = verdict("Clarity", 0.0, 0.0, Winner::NotApplicable);
        failed.error = Some("timeout".into());
        let r = PairwiseResult::from_verdicts("x", "y", vec![failed], 0.0, 0.0)
            .into_failed("All 1 criterion judgments failed");
        assert!(r.is_error());
        assert_eq!(r.winner, Winner::NotApplicable);
        assert_eq!(r.verdicts.len(), 1);
        assert_eq!(r.explanation, "All 1 criterion judgments failed");
        assert_eq!(r.swapped().explanation, r.explanation);
    }
}
