use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use client::repository::{ApiError, ProgressRecord, ProgressRepository};
use lesson_core::model::LessonId;

/// Outcome of one best-effort progress write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Acknowledged while still the newest issued write.
    Applied,
    /// A newer write was issued while this one was in flight; the stale
    /// acknowledgment is discarded.
    Stale,
    /// Collaborator failure; logged and swallowed.
    Failed,
}

/// "Latest wins" guard over fire-and-forget progress writes.
///
/// Every write is stamped with a per-session monotonic sequence number. An
/// acknowledgment that lands after a newer write was issued must not count
/// as the persisted state, so it is discarded; rapid navigation never
/// resurrects a stale cursor.
pub struct ProgressSync {
    repo: Arc<dyn ProgressRepository>,
    issued: AtomicU64,
    applied: AtomicU64,
}

impl ProgressSync {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>) -> Self {
        Self {
            repo,
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    /// Sequence number of the newest acknowledged-and-applied write.
    #[must_use]
    pub fn applied_seq(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    /// Best-effort write. Failures are logged, never surfaced to the
    /// learner.
    pub async fn save(&self, record: ProgressRecord) -> SaveOutcome {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        match self.repo.save(&record).await {
            Ok(()) => {
                if self.issued.load(Ordering::SeqCst) > seq {
                    tracing::debug!(
                        lesson = %record.lesson_id,
                        seq,
                        "discarding stale progress acknowledgment"
                    );
                    return SaveOutcome::Stale;
                }
                self.applied.fetch_max(seq, Ordering::SeqCst);
                SaveOutcome::Applied
            }
            Err(err) => {
                tracing::warn!(
                    lesson = %record.lesson_id,
                    error = %err,
                    "progress write failed"
                );
                SaveOutcome::Failed
            }
        }
    }

    /// Clear persisted progress (redo).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures; callers log and continue.
    pub async fn clear(&self, lesson_id: &LessonId) -> Result<(), ApiError> {
        self.repo.clear(lesson_id).await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
