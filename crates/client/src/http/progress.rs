use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lesson_core::model::LessonId;

use super::HttpApi;
use crate::repository::{ApiError, ProgressRecord, ProgressRepository};

/// Wire shape of `GET /progress/{lesson_id}`. Absent fields mean "no
/// progress yet".
#[derive(Debug, Deserialize)]
struct ProgressResponse {
    current_step: Option<usize>,
    completed_steps: Option<Vec<usize>>,
}

#[derive(Debug, Serialize)]
struct ProgressBody<'a> {
    lesson_id: &'a LessonId,
    current_step: usize,
    completed_steps: &'a [usize],
}

#[async_trait]
impl ProgressRepository for HttpApi {
    async fn load(&self, lesson_id: &LessonId) -> Result<Option<ProgressRecord>, ApiError> {
        let response = self.get(&format!("progress/{lesson_id}")).await?;
        if !response.status().is_success() {
            // 4xx/5xx read identically to "no progress yet".
            return Ok(None);
        }

        let body: ProgressResponse = response.json().await?;
        if body.current_step.is_none() && body.completed_steps.is_none() {
            return Ok(None);
        }
        Ok(Some(ProgressRecord {
            lesson_id: lesson_id.clone(),
            current_step: body.current_step.unwrap_or(0),
            completed_steps: body.completed_steps.unwrap_or_default(),
        }))
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), ApiError> {
        let body = ProgressBody {
            lesson_id: &record.lesson_id,
            current_step: record.current_step,
            completed_steps: &record.completed_steps,
        };
        let response = self.post_json("progress", &body).await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn clear(&self, lesson_id: &LessonId) -> Result<(), ApiError> {
        let response = self.delete(&format!("progress/{lesson_id}")).await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
