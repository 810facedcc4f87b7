use async_trait::async_trait;

use super::HttpApi;
use crate::repository::{ApiError, CompletionRecord, CompletionSink};

#[async_trait]
impl CompletionSink for HttpApi {
    async fn complete(&self, record: &CompletionRecord) -> Result<(), ApiError> {
        let response = self.post_json("complete", record).await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
