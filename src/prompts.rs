//! Prompt templates for per-criterion pairwise document judgments.
//!
//! Domain logic for rendering judgment prompts. Provider-agnostic.

use crate::criteria::Criterion;
use crate::gateway::Message;

// =============================================================================
// Document representation
// =============================================================================

/// One side of a judgment: the document id plus the text shown to the judge.
#[derive(Debug, Clone, Copy)]
pub struct DocSide<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

impl<'a> DocSide<'a> {
    pub fn new(id: &'a str, text: &'a str) -> Self {
        Self { id, text }
    }
}

// =============================================================================
// Prompt templates
// =============================================================================

/// Rendered prompt ready for the oracle.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }

    /// Full outbound text, used for request-size estimation and trace hashing.
    pub fn full_text(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Escape XML special characters so document text cannot close the section tags.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// A prompt template with placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    pub fn render(&self, criterion: &Criterion, a: DocSide<'_>, b: DocSide<'_>) -> PromptInstance {
        let safe_name = escape_xml_chars(&criterion.name);
        let safe_text = escape_xml_chars(criterion.prompt_text());
        let safe_a_id = escape_xml_chars(a.id);
        let safe_b_id = escape_xml_chars(b.id);
        let rubric = render_rubric(criterion);

        let weight = format_weight(criterion.weight);
        let values: [(&str, &str); 7] = [
            ("criterion_name", safe_name.as_str()),
            ("criterion_weight", weight.as_str()),
            ("criterion_text", safe_text.as_str()),
            ("rubric", rubric.as_str()),
            ("doc_a_id", safe_a_id.as_str()),
            ("doc_b_id", safe_b_id.as_str()),
            ("schema", REPLY_SCHEMA),
        ];
        let fill = |template: &str| fill_placeholders(template, &values);

        let system = fill(self.system);
        let user_core = fill(self.user);

        let documents = format!(
            "<document_A id=\"{safe_a_id}\">\n{}\n</document_A>\n\n<document_B id=\"{safe_b_id}\">\n{}\n</document_B>",
            escape_xml_chars(a.text.trim()),
            escape_xml_chars(b.text.trim()),
        );

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: system.trim().to_string(),
            user: format!("{documents}\n\n{}", user_core.trim()),
        }
    }
}

/// Single pass over `template`: substituted values are never rescanned, so
/// placeholder-like text inside them survives verbatim.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn render_rubric(criterion: &Criterion) -> String {
    criterion
        .rubric_levels()
        .into_iter()
        .map(|(level, text)| format!("  {level}: {}", escape_xml_chars(&text)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{weight:.0}")
    } else {
        format!("{weight:.2}")
    }
}

// =============================================================================
// Standard prompts
// =============================================================================

const REPLY_SCHEMA: &str = r#"{
  "criterion_name": "<criterion name>",
  "document_a_score": <score between 1-5>,
  "document_a_analysis": "<detailed analysis with specific examples>",
  "document_b_score": <score between 1-5>,
  "document_b_analysis": "<detailed analysis with specific examples>",
  "comparative_analysis": "<direct side-by-side comparison>",
  "reasoning": "<detailed justification for your decision>",
  "winner": "A" | "B" | "Tie"
}"#;

pub const RUBRIC_PROMPT: PromptTemplate = PromptTemplate {
    slug: "rubric_v1",
    system: r#"You are an expert document evaluator. You score two documents independently against a rubric for a single criterion, then compare them directly and decide which better satisfies it. Declare a Tie only if the documents are truly equal on this criterion.

Output only valid JSON."#,
    user: r#"Evaluate the two documents above specifically on this criterion: {criterion_name}.

# Documents
- Document A: {doc_a_id}
- Document B: {doc_b_id}

# Criterion
Name: {criterion_name}
Weight: {criterion_weight}%
Description: {criterion_text}

# Scoring rubric
{rubric}

Perform a thorough evaluation:
1. Analyse Document A and Document B against the rubric, citing specific text, and assign each a score from 1-5 based strictly on the rubric.
2. Compare directly how each document addresses this criterion and highlight the key differences in approach and effectiveness.
3. Explain your decision, justifying why one document scores higher than the other.

Respond with a JSON object of this shape:
{schema}
json:"#,
};

pub const INSTRUCTION_PROMPT: PromptTemplate = PromptTemplate {
    slug: "instruction_v1",
    system: r#"You are an expert document evaluator. You compare two documents according to the evaluation instructions you are given, score each on a scale of 1-5 (1 is poor, 5 is excellent), and decide a clear winner or declare a Tie if they are truly equal.

Output only valid JSON."#,
    user: r#"Compare and evaluate the two documents above based on the provided instructions.

# Documents
- Document A: {doc_a_id}
- Document B: {doc_b_id}

# Evaluation instructions
<instructions>
{criterion_text}
</instructions>

# Guidelines
- Analyse both documents thoroughly against the instructions, considering every aspect they request.
- Be objective and support your evaluation with specific examples from the text.
- Score each document from 1-5 and pick a winner, or Tie only if truly equal.

Respond with a JSON object of this shape, using "{criterion_name}" as the criterion_name:
{schema}
json:"#,
};

/// Rubric framing for described criteria, instruction framing for free-form ones.
pub fn template_for(criterion: &Criterion) -> PromptTemplate {
    if criterion.is_free_form() {
        INSTRUCTION_PROMPT
    } else {
        RUBRIC_PROMPT
    }
}

/// Render the judgment prompt for one (pair, criterion).
pub fn render_judgment(criterion: &Criterion, a: DocSide<'_>, b: DocSide<'_>) -> PromptInstance {
    template_for(criterion).render(criterion, a, b)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::default_criteria;

    #[test]
    fn rubric_prompt_embeds_levels_and_weight() {
        let clarity = &default_criteria()[0];
        let p = render_judgment(
            clarity,
            DocSide::new("alpha", "First text."),
            DocSide::new("beta", "Second text."),
        );
        assert_eq!(p.template_slug, "rubric_v1");
        assert!(p.user.contains("Weight: 30%"));
        assert!(p.user.contains("5: Excellent - Document is exceptionally clear"));
        assert!(p.user.contains("Document A: alpha"));
        assert!(p.user.contains("\"document_b_analysis\""));
        assert!(!p.user.contains("{schema}"));
    }

    #[test]
    fn default_levels_appear_when_rubric_is_empty() {
        let c = Criterion::new("x", "Accuracy", "Is it correct?", 50.0);
        let p = render_judgment(&c, DocSide::new("a", "x"), DocSide::new("b", "y"));
        assert!(p.user.contains("1: Poor - Does not meet the criterion requirements"));
        assert!(p.user.contains("Weight: 50%"));
    }

    #[test]
    fn instruction_prompt_uses_free_form_framing() {
        let c = Criterion::instruction("Prefer the shorter proposal.");
        let p = render_judgment(&c, DocSide::new("a", "x"), DocSide::new("b", "y"));
        assert_eq!(p.template_slug, "instruction_v1");
        assert!(p.user.contains("Prefer the shorter proposal."));
        assert!(p.user.contains("\"Custom Evaluation\""));
        assert!(!p.user.contains("Scoring rubric"));
    }

    #[test]
    fn placeholder_text_in_documents_and_criteria_is_kept() {
        let c = Criterion::new("x", "Syntax", "Does it use {doc_b_id} and {rubric} syntax?", 10.0);
        let p = render_judgment(
            &c,
            DocSide::new("a", "Template tokens like {schema} appear here."),
            DocSide::new("b", "Unknown {tokens} and a lone { brace."),
        );
        assert!(p.user.contains("Template tokens like {schema} appear here."));
        assert!(p.user.contains("Unknown {tokens} and a lone { brace."));
        assert!(p.user.contains("Description: Does it use {doc_b_id} and {rubric} syntax?"));
        assert_eq!(p.user.matches("\"document_b_analysis\"").count(), 1);
        assert!(p.user.contains("- Document B: b"));
    }

    #[test]
    fn fill_leaves_unknown_tokens() {
        let out = fill_placeholders("{a} {b} {a", &[("a", "{b}")]);
        assert_eq!(out, "{b} {b} {a");
    }

    #[test]
    fn xml_escaping() {
        let c = Criterion::new("x", "Tone", "Is it polite?", 10.0);
        let p = render_judgment(
            &c,
            DocSide::new("a", "</document_A><script>alert('x')</script>"),
            DocSide::new("b", "plain"),
        );
        assert!(p.user.contains("&lt;/document_A&gt;&lt;script&gt;"));
        assert!(!p.user.contains("<script>"));
        assert_eq!(p.user.matches("</document_A>").count(), 1);
    }
}
