use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{LessonId, StepId};
use crate::model::step::Step;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson has no steps")]
    Empty,

    #[error("duplicate step id within lesson: {id}")]
    DuplicateStepId { id: StepId },
}

//
// ─── CEFR LEVEL ────────────────────────────────────────────────────────────────
//

/// CEFR proficiency band, passed verbatim into AI grading requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCefrLevelError;

impl fmt::Display for ParseCefrLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown CEFR level")
    }
}

impl std::error::Error for ParseCefrLevelError {}

impl FromStr for CefrLevel {
    type Err = ParseCefrLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            _ => Err(ParseCefrLevelError),
        }
    }
}

//
// ─── LEARNER PROFILE ───────────────────────────────────────────────────────────
//

/// Explicit learner context for a session.
///
/// Fed into AI grading requests; passed into session construction rather
/// than read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerProfile {
    pub language: String,
    pub cefr_level: CefrLevel,
}

impl LearnerProfile {
    #[must_use]
    pub fn new(language: impl Into<String>, cefr_level: CefrLevel) -> Self {
        Self {
            language: language.into(),
            cefr_level,
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// An ordered list of heterogeneous steps with a stable identity.
/// Immutable once loaded from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    language: String,
    level: CefrLevel,
    steps: Vec<Step>,
}

impl Lesson {
    /// Validate and build a lesson document.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Empty` for a lesson with no steps, or
    /// `LessonError::DuplicateStepId` when two steps share an id.
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        language: impl Into<String>,
        level: CefrLevel,
        steps: Vec<Step>,
    ) -> Result<Self, LessonError> {
        if steps.is_empty() {
            return Err(LessonError::Empty);
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id().clone()) {
                return Err(LessonError::DuplicateStepId {
                    id: step.id().clone(),
                });
            }
        }

        Ok(Self {
            id,
            title: title.into(),
            language: language.into(),
            level,
            steps,
        })
    }

    #[must_use]
    pub fn id(&self) -> &LessonId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn level(&self) -> CefrLevel {
        self.level
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps in this lesson. Always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Position of a step id within the lesson, if present.
    #[must_use]
    pub fn index_of(&self, id: &StepId) -> Option<usize> {
        self.steps.iter().position(|step| step.id() == id)
    }

    /// Index of the final step.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
