//! Summary tables derived from a finished ranking run.
//!
//! Pure transformation of the ranked ids and comparison log: no oracle calls,
//! no mutation of inputs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::types::{PairwiseResult, Winner};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    /// 1-based position in the ranked list.
    pub rank: usize,
    pub wins: usize,
    /// Mean of this document's non-zero weighted totals across the log.
    pub mean_weighted_score: f64,
    /// Criterion name → mean non-zero score. Unobserved criteria report 0.
    pub criterion_averages: BTreeMap<String, f64>,
}

/// One row per logged pairwise result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub doc_a: String,
    pub doc_b: String,
    pub weighted_a: f64,
    pub weighted_b: f64,
    /// Winning document id, `Tie`, or `N/A` for a failed pair.
    pub winner: String,
    pub explanation: String,
}

/// One row per (logged result, criterion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionRow {
    pub doc_a: String,
    pub doc_b: String,
    pub criterion_id: String,
    pub criterion_name: String,
    pub score_a: f64,
    pub document_a_analysis: String,
    pub score_b: f64,
    pub document_b_analysis: String,
    pub comparative_analysis: String,
    pub reasoning: String,
    /// Winning document id, or `Tie` for ties and error verdicts.
    pub winner: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankSummary {
    pub win_counts: BTreeMap<String, usize>,
    /// In ranked order.
    pub documents: Vec<DocumentSummary>,
    pub comparisons: Vec<ComparisonRow>,
    pub criteria: Vec<CriterionRow>,
}

#[derive(Default)]
struct Mean {
    total: f64,
    count: usize,
}

impl Mean {
    /// Zero is the missing/error sentinel and is not observed.
    fn observe(&mut self, value: f64) {
        if value > 0.0 {
            self.total += value;
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregate a comparison log into win counts, averages and flat report rows.
pub fn summarize(ranked: &[String], log: &[PairwiseResult]) -> RankSummary {
    let mut wins: HashMap<&str, usize> = HashMap::new();
    let mut weighted: HashMap<&str, Mean> = HashMap::new();
    let mut per_criterion: HashMap<(&str, &str), Mean> = HashMap::new();
    let mut criterion_names: BTreeSet<&str> = BTreeSet::new();

    for result in log {
        if let Some(id) = result.winner_id() {
            *wins.entry(id).or_default() += 1;
        }
        weighted.entry(result.doc_a.as_str()).or_default().observe(result.weighted_a);
        weighted.entry(result.doc_b.as_str()).or_default().observe(result.weighted_b);
        for v in &result.verdicts {
            criterion_names.insert(v.criterion_name.as_str());
            per_criterion
                .entry((result.doc_a.as_str(), v.criterion_name.as_str()))
                .or_default()
                .observe(v.score_a);
            per_criterion
                .entry((result.doc_b.as_str(), v.criterion_name.as_str()))
                .or_default()
                .observe(v.score_b);
        }
    }

    let win_counts = ranked
        .iter()
        .map(|id| (id.clone(), wins.get(id.as_str()).copied().unwrap_or(0)))
        .collect();

    let documents = ranked
        .iter()
        .enumerate()
        .map(|(i, id)| DocumentSummary {
            id: id.clone(),
            rank: i + 1,
            wins: wins.get(id.as_str()).copied().unwrap_or(0),
            mean_weighted_score: weighted.get(id.as_str()).map(Mean::value).unwrap_or(0.0),
            criterion_averages: criterion_names
                .iter()
                .map(|name| {
                    let avg = per_criterion
                        .get(&(id.as_str(), *name))
                        .map(Mean::value)
                        .unwrap_or(0.0);
                    (name.to_string(), avg)
                })
                .collect(),
        })
        .collect();

    let comparisons = log
        .iter()
        .map(|r| ComparisonRow {
            doc_a: r.doc_a.clone(),
            doc_b: r.doc_b.clone(),
            weighted_a: r.weighted_a,
            weighted_b: r.weighted_b,
            winner: r
                .winner_id()
                .map(str::to_string)
                .unwrap_or_else(|| r.winner.to_string()),
            explanation: r.explanation.clone(),
        })
        .collect();

    let criteria = log
        .iter()
        .flat_map(|r| {
            r.verdicts.iter().map(move |v| CriterionRow {
                doc_a: r.doc_a.clone(),
                doc_b: r.doc_b.clone(),
                criterion_id: v.criterion_id.clone(),
                criterion_name: v.criterion_name.clone(),
                score_a: v.score_a,
                document_a_analysis: v.document_a_analysis.clone(),
                score_b: v.score_b,
                document_b_analysis: v.document_b_analysis.clone(),
                comparative_analysis: v.comparative_analysis.clone(),
                reasoning: v.reasoning.clone(),
                winner: match v.winner {
                    Winner::A => r.doc_a.clone(),
                    Winner::B => r.doc_b.clone(),
                    _ => Winner::Tie.to_string(),
                },
            })
        })
        .collect();

    RankSummary {
        win_counts,
        documents,
        comparisons,
        criteria,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::types::CriterionVerdict;

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

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_log_reports_zeros() {
        let s = summarize(&ids(&["x"]), &[]);
        assert_eq!(s.win_counts["x"], 0);
        assert_eq!(s.documents[0].mean_weighted_score, 0.0);
        assert!(s.comparisons.is_empty());
        assert!(s.criteria.is_empty());
    }

    #[test]
    fn aggregates_wins_and_averages() {
        let log = vec![
            PairwiseResult::from_verdicts(
                "x",
                "y",
                vec![verdict("Clarity", 5.0, 3.0, Winner::A)],
                100.0,
                60.0,
            ),
            PairwiseResult::from_verdicts(
                "z",
                "x",
                vec![verdict("Clarity", 4.0, 3.0, Winner::A)],
                80.0,
                60.0,
            ),
            PairwiseResult::pair_error("y", "z", "boom"),
        ];
        let s = summarize(&ids(&["x", "z", "y"]), &log);

        assert_eq!(s.win_counts["x"], 1);
        assert_eq!(s.win_counts["z"], 1);
        assert_eq!(s.win_counts["y"], 0);

        let x = &s.documents[0];
        assert_eq!((x.id.as_str(), x.rank), ("x", 1));
        assert_eq!(x.mean_weighted_score, 80.0);
        assert_eq!(x.criterion_averages["Clarity"], 4.0);

        // The failed pair contributes zeros, which are skipped.
        let y = &s.documents[2];
        assert_eq!(y.mean_weighted_score, 60.0);

        assert_eq!(s.comparisons.len(), 3);
        assert_eq!(s.comparisons[0].winner, "x");
        assert_eq!(s.comparisons[2].winner, "N/A");

        assert_eq!(s.criteria.len(), 2);
        assert_eq!(s.criteria[1].winner, "z");
    }

    #[test]
    fn criterion_row_tie_and_error_read_as_tie() {
        let log = vec![PairwiseResult::from_verdicts(
            "x",
            "y",
            vec![
                verdict("Clarity", 3.0, 3.0, Winner::Tie),
                verdict("Structure", 0.0, 0.0, Winner::NotApplicable),
            ],
            12.0,
            12.0,
        )];
        let s = summarize(&ids(&["x", "y"]), &log);
        assert!(s.criteria.iter().all(|row| row.winner == "Tie"));
        assert_eq!(s.documents[0].criterion_averages["Structure"], 0.0);
    }
}
