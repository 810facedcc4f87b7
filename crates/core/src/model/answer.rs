use serde::{Deserialize, Serialize};

//
// ─── ANSWER VALUE ──────────────────────────────────────────────────────────────
//

/// A learner's submitted answer for one step: an option index for multiple
/// choice, free text for free response.
///
/// Serializes untagged so a completion payload carries plain numbers and
/// strings, matching what the progress backend expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(usize),
    Text(String),
}

impl AnswerValue {
    #[must_use]
    pub fn as_choice(&self) -> Option<usize> {
        match self {
            AnswerValue::Choice(index) => Some(*index),
            AnswerValue::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            AnswerValue::Choice(_) => None,
        }
    }

    /// True when the answer carries non-whitespace content.
    ///
    /// Choice answers always count; text answers must have visible text.
    #[must_use]
    pub fn has_content(&self) -> bool {
        match self {
            AnswerValue::Choice(_) => true,
            AnswerValue::Text(text) => !text.trim().is_empty(),
        }
    }
}

impl From<usize> for AnswerValue {
    fn from(index: usize) -> Self {
        AnswerValue::Choice(index)
    }
}

impl From<&str> for AnswerValue {
    fn from(text: &str) -> Self {
        AnswerValue::Text(text.to_string())
    }
}

//
// ─── FEEDBACK ──────────────────────────────────────────────────────────────────
//

/// Outcome of grading one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub is_correct: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_responses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

impl FeedbackResult {
    #[must_use]
    pub fn correct(message: impl Into<String>) -> Self {
        Self {
            is_correct: true,
            message: message.into(),
            accepted_responses: None,
            score: None,
        }
    }

    #[must_use]
    pub fn incorrect(message: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            message: message.into(),
            accepted_responses: None,
            score: None,
        }
    }

    /// Attach the accepted-response list the grader compared against.
    #[must_use]
    pub fn with_accepted_responses(mut self, accepted: Vec<String>) -> Self {
        self.accepted_responses = Some(accepted);
        self
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
