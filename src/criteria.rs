//! Evaluation criteria: weighted dimensions with an optional 1–5 rubric.
//!
//! A criterion either carries a rubric-scored description or a free-form
//! instruction. Weights live in `[0, 100]` and need not sum to 100; each
//! document's weighted total is accumulated independently.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Highest score a judge may award on a single criterion.
pub const MAX_CRITERION_SCORE: f64 = 5.0;

pub const MAX_WEIGHT: f64 = 100.0;

/// Level descriptions used when a criterion supplies none (or only some).
pub const DEFAULT_RUBRIC: [(u8, &str); 5] = [
    (1, "Poor - Does not meet the criterion requirements"),
    (2, "Fair - Partially meets some requirements with significant gaps"),
    (3, "Good - Meets most requirements with minor gaps"),
    (4, "Very Good - Fully meets all requirements"),
    (5, "Excellent - Exceeds requirements in meaningful ways"),
];

pub const CUSTOM_CRITERION_NAME: &str = "Custom Evaluation";

/// Ordered mapping from rubric level (1..=5) to its description.
pub type Rubric = BTreeMap<u8, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rubric: Rubric,
    /// Free-form evaluation instruction. When set, the rubric framing is not used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

impl Criterion {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            weight,
            rubric: Rubric::new(),
            instruction: None,
        }
    }

    /// A single free-form criterion carrying the whole weight.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            id: "custom".to_string(),
            name: CUSTOM_CRITERION_NAME.to_string(),
            description: String::new(),
            weight: MAX_WEIGHT,
            rubric: Rubric::new(),
            instruction: Some(text.into()),
        }
    }

    pub fn with_level(mut self, level: u8, description: impl Into<String>) -> Self {
        self.rubric.insert(level, description.into());
        self
    }

    pub fn is_free_form(&self) -> bool {
        self.instruction.is_some()
    }

    /// All five rubric levels, with criterion-supplied levels taking precedence.
    pub fn rubric_levels(&self) -> Vec<(u8, String)> {
        DEFAULT_RUBRIC
            .iter()
            .map(|(level, default)| {
                let text = self
                    .rubric
                    .get(level)
                    .filter(|s| !s.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| default.to_string());
                (*level, text)
            })
            .collect()
    }

    /// Text the judge is asked to apply: the instruction in free-form mode, else the description.
    pub fn prompt_text(&self) -> &str {
        self.instruction.as_deref().unwrap_or(&self.description)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CriteriaError {
    #[error("criteria list is empty")]
    Empty,
    #[error("criterion {0:?} has an empty name")]
    EmptyName(String),
    #[error("criterion {id:?} weight {weight} outside [0, 100]")]
    WeightOutOfRange { id: String, weight: f64 },
    #[error("criterion {id:?} has rubric level {level} outside 1..=5")]
    RubricLevel { id: String, level: u8 },
    #[error("duplicate criterion id {0:?}")]
    DuplicateId(String),
}

/// Reject catalogs the engine cannot score meaningfully.
pub fn validate_criteria(criteria: &[Criterion]) -> Result<(), CriteriaError> {
    if criteria.is_empty() {
        return Err(CriteriaError::Empty);
    }
    let mut seen = HashSet::new();
    for c in criteria {
        if c.name.trim().is_empty() {
            return Err(CriteriaError::EmptyName(c.id.clone()));
        }
        if !c.weight.is_finite() || !(0.0..=MAX_WEIGHT).contains(&c.weight) {
            return Err(CriteriaError::WeightOutOfRange {
                id: c.id.clone(),
                weight: c.weight,
            });
        }
        if let Some(level) = c.rubric.keys().find(|l| !(1..=5).contains(*l)) {
            return Err(CriteriaError::RubricLevel {
                id: c.id.clone(),
                level: *level,
            });
        }
        if !seen.insert(c.id.as_str()) {
            return Err(CriteriaError::DuplicateId(c.id.clone()));
        }
    }
    Ok(())
}

/// Rescale weights so they sum to 100. No-op when the total is zero.
pub fn normalize_weights(criteria: &mut [Criterion]) {
    let total: f64 = criteria.iter().map(|c| c.weight).sum();
    if total <= 0.0 || (total - MAX_WEIGHT).abs() < f64::EPSILON {
        return;
    }
    for c in criteria.iter_mut() {
        c.weight = c.weight / total * MAX_WEIGHT;
    }
}

/// The stock catalog used when a caller supplies neither criteria nor an instruction.
pub fn default_criteria() -> Vec<Criterion> {
    vec![
        Criterion::new(
            "1",
            "Clarity",
            "How clear and understandable is the document?",
            30.0,
        )
        .with_level(1, "Poor - Document is unclear and difficult to understand")
        .with_level(2, "Fair - Document has significant clarity issues")
        .with_level(3, "Good - Document is mostly clear with minor clarity issues")
        .with_level(4, "Very Good - Document is clear and easy to understand")
        .with_level(5, "Excellent - Document is exceptionally clear and easy to understand"),
        Criterion::new(
            "2",
            "Relevance",
            "How relevant is the content to the subject matter?",
            30.0,
        )
        .with_level(1, "Poor - Content is mostly irrelevant to the subject matter")
        .with_level(2, "Fair - Content has limited relevance to the subject matter")
        .with_level(3, "Good - Content is mostly relevant with some gaps")
        .with_level(4, "Very Good - Content is highly relevant to the subject matter")
        .with_level(5, "Excellent - Content is exceptionally relevant and focused"),
        Criterion::new(
            "3",
            "Thoroughness",
            "How comprehensive and complete is the document?",
            20.0,
        )
        .with_level(1, "Poor - Document lacks comprehensiveness and is incomplete")
        .with_level(2, "Fair - Document covers basic aspects but has significant gaps")
        .with_level(3, "Good - Document is mostly comprehensive with minor gaps")
        .with_level(4, "Very Good - Document is comprehensive and covers all key areas")
        .with_level(5, "Excellent - Document is exceptionally thorough and comprehensive"),
        Criterion::new("4", "Structure", "How well-organized is the document?", 20.0)
            .with_level(1, "Poor - Document is poorly organized and structured")
            .with_level(2, "Fair - Document has basic structure but with significant issues")
            .with_level(3, "Good - Document is reasonably well-organized with minor issues")
            .with_level(4, "Very Good - Document is well-organized and structured")
            .with_level(5, "Excellent - Document has exceptional organization and structure"),
    ]
}
