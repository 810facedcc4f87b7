//! Synchronous grading rules for lesson steps.
//!
//! Multiple choice and the rule-based free-response strategies grade
//! immediately. AI-assisted grading is asynchronous and lives in the
//! services layer; this module only maps its score onto a result.

use crate::model::{FeedbackResult, GradingStrategy, MultipleChoiceStep};

/// Minimum AI score that counts as a correct response.
pub const PASS_SCORE: u8 = 70;

/// Neutral acknowledgment used when no judge is configured, or when
/// grading is unavailable and the session fails open.
pub const NEUTRAL_ACK: &str = "Answer recorded.";

const CORRECT_MESSAGE: &str = "Correct!";

//
// ─── MULTIPLE CHOICE ───────────────────────────────────────────────────────────
//

/// Grade a multiple-choice submission.
///
/// Returns `None` when the step has no resolvable correct option; the step
/// stays answerable but produces no feedback.
#[must_use]
pub fn grade_choice(step: &MultipleChoiceStep, submitted: usize) -> Option<FeedbackResult> {
    let correct = step.resolve_correct_index()?;

    if submitted == correct {
        let message = step
            .feedback
            .clone()
            .unwrap_or_else(|| CORRECT_MESSAGE.to_string());
        return Some(FeedbackResult::correct(message));
    }

    // Surface the right answer immediately; there is no separate reveal step.
    let message = format!("Not quite. The correct answer is: {}", step.options[correct]);
    Some(FeedbackResult::incorrect(message))
}

//
// ─── FREE RESPONSE ─────────────────────────────────────────────────────────────
//

/// Normalize a response for rule-based comparison: trim plus case-fold.
#[must_use]
pub fn normalize_response(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Apply the synchronous free-response strategies.
///
/// Returns `None` for [`GradingStrategy::Ai`]; those submissions go through
/// the asynchronous grading collaborator instead.
#[must_use]
pub fn grade_free_response(strategy: &GradingStrategy, submitted: &str) -> Option<FeedbackResult> {
    match strategy {
        GradingStrategy::AcceptedList(accepted) => {
            let wanted = normalize_response(submitted);
            let is_correct = accepted
                .iter()
                .any(|entry| normalize_response(entry) == wanted);
            let result = if is_correct {
                FeedbackResult::correct(CORRECT_MESSAGE)
            } else {
                FeedbackResult::incorrect("Not quite. Compare with the accepted answers.")
            };
            Some(result.with_accepted_responses(accepted.clone()))
        }
        GradingStrategy::AnswerKey(key) => {
            let is_correct = normalize_response(key) == normalize_response(submitted);
            let result = if is_correct {
                FeedbackResult::correct(CORRECT_MESSAGE)
            } else {
                FeedbackResult::incorrect(format!("Not quite. Expected: {key}"))
            };
            Some(result)
        }
        GradingStrategy::Ai => None,
        GradingStrategy::Ungraded => Some(FeedbackResult::correct(NEUTRAL_ACK)),
    }
}

/// Map an AI grader's verdict onto a feedback result.
///
/// The message and score pass through verbatim; correctness is the fixed
/// `PASS_SCORE` threshold.
#[must_use]
pub fn ai_feedback(score: u8, message: impl Into<String>) -> FeedbackResult {
    FeedbackResult {
        is_correct: score >= PASS_SCORE,
        message: message.into(),
        accepted_responses: None,
        score: Some(score),
    }
}

/// Fail-open result for an unavailable AI grader: correct, neutral message,
/// no score.
#[must_use]
pub fn fail_open_feedback() -> FeedbackResult {
    FeedbackResult::correct(NEUTRAL_ACK)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
