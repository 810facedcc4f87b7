#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use lesson_core::Clock;

pub use error::SessionError;
pub use sessions::{
    AdvanceOutcome, LessonSessionService, ProgressSync, SaveOutcome, SessionProgress,
    SessionService, SubmitOutcome,
};
