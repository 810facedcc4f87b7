//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::StepId;

/// Errors emitted by session services.
///
/// Collaborator failures never appear here: progress and completion writes
/// are best-effort, and a failed AI grade fails open. What remains are
/// misuses of the session itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("lesson session already completed")]
    Completed,

    #[error("unknown step id: {id}")]
    UnknownStep { id: StepId },

    #[error("step {id} does not take this kind of answer")]
    AnswerMismatch { id: StepId },
}
