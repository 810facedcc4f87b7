use async_trait::async_trait;

use super::HttpApi;
use crate::repository::{ApiError, GradeRequest, GradeVerdict, ResponseGrader};

#[async_trait]
impl ResponseGrader for HttpApi {
    async fn grade(&self, request: &GradeRequest) -> Result<GradeVerdict, ApiError> {
        let response = self.post_json_graded("grade-free-response", request).await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
