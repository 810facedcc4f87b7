use std::sync::Arc;

use client::repository::{
    CompletionSink, GradeRequest, LessonContext, ProgressRepository, ResponseGrader,
};
use lesson_core::grading;
use lesson_core::model::{LearnerProfile, Lesson, Step, StepId};
use lesson_core::time::Clock;

use crate::error::SessionError;
use super::service::{AdvanceOutcome, SessionService, SubmitOutcome};
use super::sync::ProgressSync;

/// Owns one learner's pass through one lesson and talks to the
/// collaborators on its behalf.
///
/// The session state is never shared: tearing the service down drops any
/// in-flight grading future with it, so a late response cannot mutate a
/// disposed session.
pub struct LessonSessionService {
    clock: Clock,
    profile: LearnerProfile,
    lesson: Arc<Lesson>,
    session: SessionService,
    sync: ProgressSync,
    grader: Arc<dyn ResponseGrader>,
    completions: Arc<dyn CompletionSink>,
}

impl LessonSessionService {
    /// Open a normal session, restoring persisted progress when available.
    ///
    /// A failed progress read logs a warning and falls back to a fresh
    /// session; opening never blocks the learner.
    pub async fn open(
        lesson: Arc<Lesson>,
        profile: LearnerProfile,
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        grader: Arc<dyn ResponseGrader>,
        completions: Arc<dyn CompletionSink>,
    ) -> Self {
        let now = clock.now();
        let restored = match progress.load(lesson.id()).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(
                    lesson = %lesson.id(),
                    error = %err,
                    "progress load failed; starting fresh"
                );
                None
            }
        };
        let session = match restored {
            Some(record) => SessionService::resume(Arc::clone(&lesson), &record, now),
            None => SessionService::start(Arc::clone(&lesson), now),
        };

        Self {
            clock,
            profile,
            lesson,
            session,
            sync: ProgressSync::new(progress),
            grader,
            completions,
        }
    }

    /// Open a review session over an already-completed lesson.
    ///
    /// The session is pre-filled with known-correct answers and fully
    /// completed; the progress collaborator is neither read nor written for
    /// its whole lifetime.
    #[must_use]
    pub fn open_review(
        lesson: Arc<Lesson>,
        profile: LearnerProfile,
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        grader: Arc<dyn ResponseGrader>,
        completions: Arc<dyn CompletionSink>,
    ) -> Self {
        let session = SessionService::review(Arc::clone(&lesson), clock.now());
        Self {
            clock,
            profile,
            lesson,
            session,
            sync: ProgressSync::new(progress),
            grader,
            completions,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionService {
        &self.session
    }

    /// Record and grade a multiple-choice submission.
    ///
    /// Neither the cursor nor the completed set changes here, so nothing is
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for unknown or mismatched step ids.
    pub fn submit_choice(
        &mut self,
        step_id: &StepId,
        option: usize,
    ) -> Result<SubmitOutcome, SessionError> {
        self.session.submit_choice(step_id, option)
    }

    /// Submit free-response text for grading.
    ///
    /// Rule-based and unjudged strategies resolve immediately. AI-graded
    /// steps are marked pending while the collaborator is awaited; any
    /// grader failure fails open so an outage never blocks completion.
    /// Dropping the returned future discards the in-flight grade.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for unknown or mismatched step ids.
    pub async fn submit_free_response(
        &mut self,
        step_id: &StepId,
        text: impl Into<String>,
    ) -> Result<SubmitOutcome, SessionError> {
        let text = text.into();
        let outcome = self.session.submit_text(step_id, text.clone())?;
        if outcome != SubmitOutcome::AwaitingAi {
            return Ok(outcome);
        }

        let request = self.grade_request(step_id, &text)?;
        let result = match self.grader.grade(&request).await {
            Ok(verdict) => grading::ai_feedback(verdict.clamped_score(), verdict.feedback),
            Err(err) => {
                tracing::warn!(
                    lesson = %self.lesson.id(),
                    step = %step_id,
                    error = %err,
                    "AI grading failed; failing open"
                );
                grading::fail_open_feedback()
            }
        };
        self.session.resolve_ai(step_id, result);
        Ok(SubmitOutcome::Graded)
    }

    /// Advance one step, persisting the move and dispatching the completion
    /// result when the final step finishes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the lesson is already finished.
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, SessionError> {
        let outcome = self.session.advance(self.clock.now())?;
        match outcome {
            AdvanceOutcome::Blocked => {}
            AdvanceOutcome::Moved { .. } => self.persist().await,
            AdvanceOutcome::Completed => {
                self.persist().await;
                // a review replay is read-mostly; finishing it again must
                // not re-trigger server-side completion processing
                if !self.session.review_mode() {
                    self.dispatch_completion().await;
                }
            }
        }
        Ok(outcome)
    }

    /// Step back one step; persists the cursor move.
    pub async fn retreat(&mut self) -> bool {
        let moved = self.session.retreat();
        if moved {
            self.persist().await;
        }
        moved
    }

    /// Jump to a step the navigation gate allows. Returns whether the jump
    /// was taken.
    pub async fn navigate_to(&mut self, index: usize) -> bool {
        let before = self.session.current_index();
        let allowed = self.session.navigate_to(index);
        if allowed && self.session.current_index() != before {
            self.persist().await;
        }
        allowed
    }

    /// Clear persisted progress and restart the lesson from scratch in
    /// normal mode (redo). Any in-flight grade resolution is discarded with
    /// the old state.
    pub async fn reset(&mut self) {
        if let Err(err) = self.sync.clear(self.lesson.id()).await {
            tracing::warn!(
                lesson = %self.lesson.id(),
                error = %err,
                "progress clear failed"
            );
        }
        self.session = SessionService::start(Arc::clone(&self.lesson), self.clock.now());
    }

    fn grade_request(&self, step_id: &StepId, answer: &str) -> Result<GradeRequest, SessionError> {
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

        Ok(GradeRequest {
            language: self.profile.language.clone(),
            user_cefr_level: self.profile.cefr_level,
            question: step.question.clone(),
            user_answer: answer.to_string(),
            lesson_context: LessonContext {
                lesson_id: self.lesson.id().clone(),
                title: self.lesson.title().to_string(),
                current_step: self.session.current_index(),
            },
        })
    }

    async fn persist(&self) {
        // review sessions never write progress
        if self.session.review_mode() {
            return;
        }
        self.sync.save(self.session.progress_record()).await;
    }

    async fn dispatch_completion(&self) {
        let record = self.session.completion_record();
        if let Err(err) = self.completions.complete(&record).await {
            tracing::warn!(
                lesson = %record.lesson_id,
                error = %err,
                "completion report failed"
            );
        }
    }
}
