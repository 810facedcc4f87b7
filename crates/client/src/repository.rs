use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use lesson_core::model::{AnswerValue, CefrLevel, FeedbackResult, LessonId, StepId};

/// Errors surfaced by collaborator adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("request failed with status {0}")]
    Status(u16),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── WIRE RECORDS ──────────────────────────────────────────────────────────────
//

/// Persisted progress for one lesson: the navigation cursor plus the set of
/// finished step indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub lesson_id: LessonId,
    pub current_step: usize,
    pub completed_steps: Vec<usize>,
}

/// Request body for AI free-response grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRequest {
    pub language: String,
    pub user_cefr_level: CefrLevel,
    pub question: String,
    pub user_answer: String,
    pub lesson_context: LessonContext,
}

/// Where in the lesson the graded answer was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContext {
    pub lesson_id: LessonId,
    pub title: String,
    pub current_step: usize,
}

/// Verdict returned by the AI grading collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeVerdict {
    pub score: f64,
    pub feedback: String,
}

impl GradeVerdict {
    /// Score clamped onto the 0–100 scale the controller works with.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn clamped_score(&self) -> u8 {
        self.score.clamp(0.0, 100.0).round() as u8
    }
}

/// Aggregated result emitted when the last step of a lesson completes.
///
/// Maps are ordered so the payload serializes deterministically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRecord {
    pub lesson_id: LessonId,
    pub answers: BTreeMap<StepId, AnswerValue>,
    pub feedback: BTreeMap<StepId, FeedbackResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_score: Option<u8>,
}

//
// ─── COLLABORATOR CONTRACTS ────────────────────────────────────────────────────
//

/// Remote store for per-lesson progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch persisted progress for a lesson.
    ///
    /// Returns `Ok(None)` when no progress exists.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures; callers treat those the
    /// same as "no progress yet".
    async fn load(&self, lesson_id: &LessonId) -> Result<Option<ProgressRecord>, ApiError>;

    /// Write progress, replacing any previous record for the lesson.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the write is not acknowledged.
    async fn save(&self, record: &ProgressRecord) -> Result<(), ApiError>;

    /// Clear persisted progress for a lesson (redo).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures.
    async fn clear(&self, lesson_id: &LessonId) -> Result<(), ApiError>;
}

/// AI grading collaborator for free-response submissions.
#[async_trait]
pub trait ResponseGrader: Send + Sync {
    /// Grade a free-response answer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the grader is unreachable or rejects the
    /// request; the session controller fails open on any error.
    async fn grade(&self, request: &GradeRequest) -> Result<GradeVerdict, ApiError>;
}

/// Sink for completed-lesson results.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    /// Report a completed lesson. Only success/failure matters to callers.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures.
    async fn complete(&self, record: &CompletionRecord) -> Result<(), ApiError>;
}

//
// ─── IN-MEMORY IMPLEMENTATIONS ─────────────────────────────────────────────────
//

/// In-memory progress store for testing and prototyping.
///
/// Counts loads and saves so tests can assert that review mode never
/// touches the collaborator.
#[derive(Clone, Default)]
pub struct InMemoryProgressStore {
    records: Arc<Mutex<HashMap<LessonId, ProgressRecord>>>,
    loads: Arc<AtomicUsize>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for a lesson, if any.
    #[must_use]
    pub fn get(&self, lesson_id: &LessonId) -> Option<ProgressRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|guard| guard.get(lesson_id).cloned())
    }

    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryProgressStore {
    async fn load(&self, lesson_id: &LessonId) -> Result<Option<ProgressRecord>, ApiError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let guard = self
            .records
            .lock()
            .map_err(|e| ApiError::Connection(e.to_string()))?;
        Ok(guard.get(lesson_id).cloned())
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), ApiError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut guard = self
            .records
            .lock()
            .map_err(|e| ApiError::Connection(e.to_string()))?;
        guard.insert(record.lesson_id.clone(), record.clone());
        Ok(())
    }

    async fn clear(&self, lesson_id: &LessonId) -> Result<(), ApiError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| ApiError::Connection(e.to_string()))?;
        guard.remove(lesson_id);
        Ok(())
    }
}

/// Scripted grader for tests: always returns the configured verdict, or
/// fails when none is configured.
#[derive(Clone, Default)]
pub struct ScriptedGrader {
    verdict: Option<GradeVerdict>,
    requests: Arc<Mutex<Vec<GradeRequest>>>,
}

impl ScriptedGrader {
    /// A grader that scores every answer the same way.
    #[must_use]
    pub fn scoring(score: f64, feedback: impl Into<String>) -> Self {
        Self {
            verdict: Some(GradeVerdict {
                score,
                feedback: feedback.into(),
            }),
            requests: Arc::default(),
        }
    }

    /// A grader whose every call fails, for exercising the fail-open path.
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Requests seen so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<GradeRequest> {
        self.requests.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResponseGrader for ScriptedGrader {
    async fn grade(&self, request: &GradeRequest) -> Result<GradeVerdict, ApiError> {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request.clone());
        }
        self.verdict
            .clone()
            .ok_or_else(|| ApiError::Connection("grader offline".into()))
    }
}

/// Completion sink that records everything it receives.
#[derive(Clone, Default)]
pub struct RecordingCompletions {
    records: Arc<Mutex<Vec<CompletionRecord>>>,
}

impl RecordingCompletions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion records received so far, in call order.
    #[must_use]
    pub fn completed(&self) -> Vec<CompletionRecord> {
        self.records.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionSink for RecordingCompletions {
    async fn complete(&self, record: &CompletionRecord) -> Result<(), ApiError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| ApiError::Connection(e.to_string()))?;
        guard.push(record.clone());
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
