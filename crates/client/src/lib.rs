#![forbid(unsafe_code)]

pub mod http;
pub mod repository;

pub use http::{ApiConfig, HttpApi};
pub use repository::{
    ApiError, CompletionRecord, CompletionSink, GradeRequest, GradeVerdict, InMemoryProgressStore,
    LessonContext, ProgressRecord, ProgressRepository, RecordingCompletions, ResponseGrader,
    ScriptedGrader,
};
