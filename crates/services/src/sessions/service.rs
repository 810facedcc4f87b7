use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use client::repository::{CompletionRecord, ProgressRecord};
use lesson_core::grading;
use lesson_core::model::{AnswerValue, FeedbackResult, GradingStrategy, Lesson, Step, StepId};

use crate::error::SessionError;
use super::progress::SessionProgress;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Outcome of recording a submission for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Feedback for this step is already final; nothing changed.
    AlreadyFinal,
    /// The submission was graded and feedback recorded.
    Graded,
    /// The step has no resolvable correct answer; the answer was recorded
    /// without feedback and navigation stays open.
    Unjudged,
    /// The step now awaits the AI grading collaborator.
    AwaitingAi,
    /// A whitespace-only free-response submission; nothing was recorded.
    Empty,
}

/// Result of an advance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the next step.
    Moved { index: usize },
    /// The final step was finished; the session is complete.
    Completed,
    /// A required free-response answer is missing, empty, or still being
    /// graded; the session is unchanged.
    Blocked,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Mutable state of one learner working through one lesson.
///
/// Steps through the lesson sequentially, recording answers and feedback
/// keyed by step id. The navigation cursor and the completed set are the
/// only state the progress collaborator ever sees.
pub struct SessionService {
    lesson: Arc<Lesson>,
    review_mode: bool,
    current: usize,
    completed: BTreeSet<usize>,
    answers: HashMap<StepId, AnswerValue>,
    feedback: HashMap<StepId, FeedbackResult>,
    pending: HashSet<StepId>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionService {
    /// Fresh first-pass session starting at the first step.
    ///
    /// `started_at` should come from the services layer clock to keep time
    /// deterministic.
    #[must_use]
    pub fn start(lesson: Arc<Lesson>, started_at: DateTime<Utc>) -> Self {
        Self {
            lesson,
            review_mode: false,
            current: 0,
            completed: BTreeSet::new(),
            answers: HashMap::new(),
            feedback: HashMap::new(),
            pending: HashSet::new(),
            started_at,
            completed_at: None,
        }
    }

    /// First-pass session restored from persisted progress.
    ///
    /// A record written against an older revision of the lesson may point
    /// past the end; the cursor and completed set are clamped onto the
    /// current step range.
    #[must_use]
    pub fn resume(lesson: Arc<Lesson>, record: &ProgressRecord, started_at: DateTime<Utc>) -> Self {
        let mut session = Self::start(lesson, started_at);
        session.current = record.current_step.min(session.lesson.last_index());
        session.completed = record
            .completed_steps
            .iter()
            .copied()
            .filter(|&index| index < session.lesson.len())
            .collect();
        session
    }

    /// Review session over an already-completed lesson.
    ///
    /// Every step is marked completed and every question with a resolvable
    /// correct value gets that answer and a correct feedback entry, so the
    /// learner replays the lesson without interacting. Starts at the first
    /// step.
    #[must_use]
    pub fn review(lesson: Arc<Lesson>, started_at: DateTime<Utc>) -> Self {
        let mut session = Self::start(Arc::clone(&lesson), started_at);
        session.review_mode = true;

        for (index, step) in lesson.steps().iter().enumerate() {
            session.completed.insert(index);
            match step {
                Step::Content(_) => {}
                Step::MultipleChoice(step) => {
                    if let Some(correct) = step.resolve_correct_index() {
                        if let Some(result) = grading::grade_choice(step, correct) {
                            session
                                .answers
                                .insert(step.id.clone(), AnswerValue::Choice(correct));
                            session.feedback.insert(step.id.clone(), result);
                        }
                    }
                }
                Step::FreeResponse(step) => {
                    let strategy = step.grading_strategy();
                    let known = match &strategy {
                        GradingStrategy::AcceptedList(entries) => entries.first().cloned(),
                        GradingStrategy::AnswerKey(key) => Some(key.clone()),
                        GradingStrategy::Ai | GradingStrategy::Ungraded => None,
                    };
                    if let Some(text) = known {
                        if let Some(result) = grading::grade_free_response(&strategy, &text) {
                            session
                                .answers
                                .insert(step.id.clone(), AnswerValue::Text(text));
                            session.feedback.insert(step.id.clone(), result);
                        }
                    }
                }
            }
        }

        session
    }

    //
    // ─── READS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    #[must_use]
    pub fn review_mode(&self) -> bool {
        self.review_mode
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_step(&self) -> &Step {
        &self.lesson.steps()[self.current]
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn completed_steps(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    #[must_use]
    pub fn answer(&self, step_id: &StepId) -> Option<&AnswerValue> {
        self.answers.get(step_id)
    }

    #[must_use]
    pub fn feedback_for(&self, step_id: &StepId) -> Option<&FeedbackResult> {
        self.feedback.get(step_id)
    }

    /// True while an AI grade for the step is in flight.
    #[must_use]
    pub fn is_pending(&self, step_id: &StepId) -> bool {
        self.pending.contains(step_id)
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.lesson.len(),
            completed: self.completed.len(),
            current: self.current,
            is_complete: self.is_complete(),
            review_mode: self.review_mode,
        }
    }

    //
    // ─── NAVIGATION GATE ───────────────────────────────────────────────────
    //

    /// Decide whether a step index is reachable right now.
    ///
    /// Reachable: the current step, any finished step, or the single step
    /// just past a finished current step. Depends only on the cursor and
    /// the completed set; recompute on every render, never cache.
    #[must_use]
    pub fn can_navigate_to(&self, index: usize) -> bool {
        if index >= self.lesson.len() {
            return false;
        }
        if index == self.current || self.completed.contains(&index) {
            return true;
        }
        index == self.current + 1 && self.completed.contains(&self.current)
    }

    /// Move the cursor if the navigation gate allows it.
    pub fn navigate_to(&mut self, index: usize) -> bool {
        if !self.can_navigate_to(index) {
            return false;
        }
        self.current = index;
        true
    }

    /// Whether the "next" affordance should be enabled for the current step.
    ///
    /// Derived from state on every call: review sessions and content steps
    /// always may, a choice step needs a recorded answer, a free-response
    /// step needs recorded feedback.
    #[must_use]
    pub fn can_press_next(&self) -> bool {
        if self.review_mode {
            return true;
        }
        match self.current_step() {
            Step::Content(_) => true,
            Step::MultipleChoice(step) => self.answers.contains_key(&step.id),
            Step::FreeResponse(step) => self.feedback.contains_key(&step.id),
        }
    }

    //
    // ─── SUBMISSIONS ───────────────────────────────────────────────────────
    //

    /// Record and grade a multiple-choice submission.
    ///
    /// A graded choice is final: once feedback exists for the step, any
    /// further submission is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownStep` for a foreign step id and
    /// `SessionError::AnswerMismatch` when the step is not multiple choice.
    pub fn submit_choice(
        &mut self,
        step_id: &StepId,
        option: usize,
    ) -> Result<SubmitOutcome, SessionError> {
        let index = self
            .lesson
            .index_of(step_id)
            .ok_or_else(|| SessionError::UnknownStep {
                id: step_id.clone(),
            })?;
        let Step::MultipleChoice(step) = &self.lesson.steps()[index] else {
            return Err(SessionError::AnswerMismatch {
                id: step_id.clone(),
            });
        };

        if self.feedback.contains_key(step_id) {
            return Ok(SubmitOutcome::AlreadyFinal);
        }

        self.answers
            .insert(step_id.clone(), AnswerValue::Choice(option));
        match grading::grade_choice(step, option) {
            Some(result) => {
                self.feedback.insert(step_id.clone(), result);
                Ok(SubmitOutcome::Graded)
            }
            None => Ok(SubmitOutcome::Unjudged),
        }
    }

    /// Record a free-response submission and grade it where a synchronous
    /// strategy applies.
    ///
    /// For AI-graded steps the step is marked pending and the caller is
    /// expected to resolve it via [`SessionService::resolve_ai`]. Feedback,
    /// once recorded, is final.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownStep` for a foreign step id and
    /// `SessionError::AnswerMismatch` when the step is not free response.
    pub fn submit_text(
        &mut self,
        step_id: &StepId,
        text: impl Into<String>,
    ) -> Result<SubmitOutcome, SessionError> {
        let index = self
            .lesson
            .index_of(step_id)
            .ok_or_else(|| SessionError::UnknownStep {
                id: step_id.clone(),
            })?;
        let Step::FreeResponse(step) = &self.lesson.steps()[index] else {
            return Err(SessionError::AnswerMismatch {
                id: step_id.clone(),
            });
        };

        if self.feedback.contains_key(step_id) {
            return Ok(SubmitOutcome::AlreadyFinal);
        }

        let text = text.into();
        // an empty required answer is silently rejected, never graded;
        // grading it would finalize feedback on a contentless answer
        if text.trim().is_empty() {
            return Ok(SubmitOutcome::Empty);
        }
        let strategy = step.grading_strategy();
        self.answers
            .insert(step_id.clone(), AnswerValue::Text(text.clone()));
        match grading::grade_free_response(&strategy, &text) {
            Some(result) => {
                self.feedback.insert(step_id.clone(), result);
                Ok(SubmitOutcome::Graded)
            }
            None => {
                self.pending.insert(step_id.clone());
                Ok(SubmitOutcome::AwaitingAi)
            }
        }
    }

    /// Record the outcome of an asynchronous grade.
    ///
    /// Returns false and discards the result when the step is no longer
    /// pending: a resolution arriving after a reset or teardown must not
    /// mutate the session.
    pub fn resolve_ai(&mut self, step_id: &StepId, result: FeedbackResult) -> bool {
        if !self.pending.remove(step_id) {
            return false;
        }
        self.feedback.insert(step_id.clone(), result);
        true
    }

    //
    // ─── STEPPING ──────────────────────────────────────────────────────────
    //

    /// Try to move one step forward, finishing the lesson from the last
    /// step.
    ///
    /// Outside review mode a free-response step holds the cursor until it
    /// has a non-empty submission with no grade in flight; a blocked
    /// advance changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the lesson is already finished.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<AdvanceOutcome, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }

        if !self.review_mode {
            if let Step::FreeResponse(step) = self.current_step() {
                let answered = self
                    .answers
                    .get(&step.id)
                    .is_some_and(AnswerValue::has_content);
                if !answered || self.pending.contains(&step.id) {
                    return Ok(AdvanceOutcome::Blocked);
                }
            }
        }

        self.completed.insert(self.current);
        if self.current == self.lesson.last_index() {
            self.completed_at = Some(now);
            return Ok(AdvanceOutcome::Completed);
        }
        self.current += 1;
        Ok(AdvanceOutcome::Moved {
            index: self.current,
        })
    }

    /// Move one step back. Never unwinds completion state or feedback.
    pub fn retreat(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    //
    // ─── COLLABORATOR SNAPSHOTS ────────────────────────────────────────────
    //

    /// Snapshot of the state the progress collaborator persists.
    #[must_use]
    pub fn progress_record(&self) -> ProgressRecord {
        ProgressRecord {
            lesson_id: self.lesson.id().clone(),
            current_step: self.current,
            completed_steps: self.completed.iter().copied().collect(),
        }
    }

    /// Aggregated result reported when the lesson completes.
    ///
    /// `total_score` is the percentage of graded steps judged correct,
    /// absent when nothing produced feedback.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn completion_record(&self) -> CompletionRecord {
        let graded = self.feedback.len();
        let correct = self
            .feedback
            .values()
            .filter(|result| result.is_correct)
            .count();
        let total_score = (graded > 0).then(|| ((correct * 100) / graded) as u8);

        CompletionRecord {
            lesson_id: self.lesson.id().clone(),
            answers: self
                .answers
                .iter()
                .map(|(id, answer)| (id.clone(), answer.clone()))
                .collect(),
            feedback: self
                .feedback
                .iter()
                .map(|(id, result)| (id.clone(), result.clone()))
                .collect(),
            total_score,
        }
    }
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("lesson_id", &self.lesson.id())
            .field("review_mode", &self.review_mode)
            .field("current", &self.current)
            .field("completed", &self.completed)
            .field("answers_len", &self.answers.len())
            .field("feedback_len", &self.feedback.len())
            .field("pending_len", &self.pending.len())
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
