mod answer;
mod ids;
mod lesson;
mod step;

pub use answer::{AnswerValue, FeedbackResult};
pub use ids::{LessonId, StepId};
pub use lesson::{CefrLevel, LearnerProfile, Lesson, LessonError, ParseCefrLevelError};
pub use step::{
    AcceptedResponses, ContentStep, FreeResponseStep, GradingStrategy, MultipleChoiceStep, Step,
};
