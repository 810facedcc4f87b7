use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::ids::StepId;

//
// ─── STEP TYPES ────────────────────────────────────────────────────────────────
//

/// One unit of a lesson: informational content, a multiple-choice question,
/// or a free-response question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Content(ContentStep),
    MultipleChoice(MultipleChoiceStep),
    FreeResponse(FreeResponseStep),
}

impl Step {
    #[must_use]
    pub fn id(&self) -> &StepId {
        match self {
            Step::Content(step) => &step.id,
            Step::MultipleChoice(step) => &step.id,
            Step::FreeResponse(step) => &step.id,
        }
    }

    /// Returns true for informational steps that carry nothing to grade.
    #[must_use]
    pub fn is_content(&self) -> bool {
        matches!(self, Step::Content(_))
    }
}

/// Informational step. Never graded, always answerable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStep {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ContentStep {
    /// Parsed image URL, if one is present and well-formed.
    ///
    /// A malformed URL is an authoring defect; the step still renders, so
    /// this resolves to `None` rather than failing.
    #[must_use]
    pub fn image(&self) -> Option<Url> {
        let raw = self.image_url.as_deref()?.trim();
        Url::parse(raw).ok()
    }
}

/// Single-select question. Exactly one of `correct_index`/`correct_answer`
/// is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceStep {
    pub id: StepId,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl MultipleChoiceStep {
    /// Resolve the authoritative correct option index.
    ///
    /// `correct_index` wins when present; otherwise the first option whose
    /// trimmed text equals the trimmed `correct_answer`. Returns `None` when
    /// neither resolves (including an out-of-range `correct_index`) — the
    /// step stays answerable but yields no feedback.
    #[must_use]
    pub fn resolve_correct_index(&self) -> Option<usize> {
        if let Some(index) = self.correct_index {
            return (index < self.options.len()).then_some(index);
        }
        let wanted = self.correct_answer.as_deref()?.trim();
        self.options.iter().position(|option| option.trim() == wanted)
    }
}

/// Open-ended question graded by one of the strategies in
/// [`GradingStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeResponseStep {
    pub id: StepId,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_responses: Option<AcceptedResponses>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<String>,
    #[serde(default)]
    pub ai_grading: bool,
}

impl FreeResponseStep {
    /// Resolve the grading precedence into a single canonical strategy.
    ///
    /// Precedence: AI grading when requested, otherwise the accepted-response
    /// list, otherwise the legacy single answer key, otherwise ungraded.
    /// An empty accepted list falls through to the next rule.
    #[must_use]
    pub fn grading_strategy(&self) -> GradingStrategy {
        if self.ai_grading {
            return GradingStrategy::Ai;
        }
        if let Some(accepted) = &self.accepted_responses {
            let entries = accepted.entries();
            if !entries.is_empty() {
                return GradingStrategy::AcceptedList(entries.to_vec());
            }
        }
        if let Some(key) = &self.answer_key {
            return GradingStrategy::AnswerKey(key.clone());
        }
        GradingStrategy::Ungraded
    }
}

//
// ─── ACCEPTED RESPONSES ────────────────────────────────────────────────────────
//

/// Accepted responses arrive from the catalog as either a bare string or a
/// list. Both deserialize here and normalize to a slice, so nothing
/// downstream branches on the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AcceptedResponses {
    One(String),
    Many(Vec<String>),
}

impl AcceptedResponses {
    /// All accepted entries, in authored order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        match self {
            AcceptedResponses::One(entry) => std::slice::from_ref(entry),
            AcceptedResponses::Many(entries) => entries,
        }
    }
}

//
// ─── GRADING STRATEGY ──────────────────────────────────────────────────────────
//

/// Canonical grading configuration for a free-response step, resolved once
/// per step instead of re-deriving precedence on every submission.
#[derive(Debug, Clone, PartialEq)]
pub enum GradingStrategy {
    /// Rule-based: match against any entry of the accepted list.
    AcceptedList(Vec<String>),
    /// Legacy single-answer key.
    AnswerKey(String),
    /// Asynchronous AI-assisted grading.
    Ai,
    /// No judge configured; the step is completion-only.
    Ungraded,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn choice_step(
        correct_index: Option<usize>,
        correct_answer: Option<&str>,
    ) -> MultipleChoiceStep {
        MultipleChoiceStep {
            id: StepId::new("mc-1"),
            question: "How do you greet someone in French?".into(),
            options: vec!["Hola".into(), "Bonjour ".into(), "Ciao".into()],
            correct_index,
            correct_answer: correct_answer.map(Into::into),
            feedback: None,
        }
    }

    #[test]
    fn correct_index_wins_over_correct_answer() {
        let step = choice_step(Some(2), Some("Bonjour"));
        assert_eq!(step.resolve_correct_index(), Some(2));
    }

    #[test]
    fn correct_answer_resolves_by_trimmed_match() {
        let step = choice_step(None, Some("Bonjour"));
        assert_eq!(step.resolve_correct_index(), Some(1));
    }

    #[test]
    fn out_of_range_correct_index_does_not_resolve() {
        let step = choice_step(Some(7), None);
        assert_eq!(step.resolve_correct_index(), None);
    }

    #[test]
    fn unresolvable_step_yields_none() {
        let step = choice_step(None, Some("Guten Tag"));
        assert_eq!(step.resolve_correct_index(), None);
        let step = choice_step(None, None);
        assert_eq!(step.resolve_correct_index(), None);
    }

    #[test]
    fn step_deserializes_from_tagged_json() {
        let json = r#"{
            "type": "multiple_choice",
            "id": "mc-1",
            "question": "Pick one",
            "options": ["a", "b"],
            "correct_index": 0
        }"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.id(), &StepId::new("mc-1"));
        assert!(!step.is_content());
    }

    #[test]
    fn content_step_tolerates_missing_fields_and_bad_urls() {
        let json = r#"{ "type": "content", "id": "intro" }"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert!(step.is_content());

        let bad = ContentStep {
            id: StepId::new("intro"),
            content_markdown: None,
            image_url: Some("not a url".into()),
        };
        assert!(bad.image().is_none());

        let good = ContentStep {
            id: StepId::new("intro"),
            content_markdown: None,
            image_url: Some(" https://example.com/a.png ".into()),
        };
        assert!(good.image().is_some());
    }

    #[test]
    fn accepted_responses_deserializes_string_or_list() {
        let one: AcceptedResponses = serde_json::from_str(r#""paris""#).unwrap();
        assert_eq!(one.entries(), ["paris".to_string()]);

        let many: AcceptedResponses = serde_json::from_str(r#"["paris", "lyon"]"#).unwrap();
        assert_eq!(many.entries().len(), 2);
    }

    fn free_step(
        accepted: Option<AcceptedResponses>,
        answer_key: Option<&str>,
        ai_grading: bool,
    ) -> FreeResponseStep {
        FreeResponseStep {
            id: StepId::new("fr-1"),
            question: "What is the capital of France?".into(),
            hint: None,
            accepted_responses: accepted,
            answer_key: answer_key.map(Into::into),
            ai_grading,
        }
    }

    #[test]
    fn accepted_list_takes_precedence_over_answer_key() {
        let step = free_step(
            Some(AcceptedResponses::Many(vec!["hola".into()])),
            Some("bonjour"),
            false,
        );
        assert_eq!(
            step.grading_strategy(),
            GradingStrategy::AcceptedList(vec!["hola".into()])
        );
    }

    #[test]
    fn ai_grading_overrides_rule_based_config() {
        let step = free_step(
            Some(AcceptedResponses::One("hola".into())),
            Some("bonjour"),
            true,
        );
        assert_eq!(step.grading_strategy(), GradingStrategy::Ai);
    }

    #[test]
    fn answer_key_applies_when_no_accepted_list() {
        let step = free_step(None, Some("bonjour"), false);
        assert_eq!(
            step.grading_strategy(),
            GradingStrategy::AnswerKey("bonjour".into())
        );
    }

    #[test]
    fn empty_accepted_list_falls_through_to_answer_key() {
        let step = free_step(Some(AcceptedResponses::Many(vec![])), Some("bonjour"), false);
        assert_eq!(
            step.grading_strategy(),
            GradingStrategy::AnswerKey("bonjour".into())
        );
    }

    #[test]
    fn unconfigured_step_is_ungraded() {
        let step = free_step(None, None, false);
        assert_eq!(step.grading_strategy(), GradingStrategy::Ungraded);
    }

    #[test]
    fn ai_grading_defaults_to_false_on_the_wire() {
        let json = r#"{
            "type": "free_response",
            "id": "fr-1",
            "question": "Say hello"
        }"#;
        let Step::FreeResponse(step) = serde_json::from_str::<Step>(json).unwrap() else {
            panic!("expected free_response step");
        };
        assert!(!step.ai_grading);
        assert_eq!(step.grading_strategy(), GradingStrategy::Ungraded);
    }
}
