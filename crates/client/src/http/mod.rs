//! HTTP/JSON implementations of the collaborator contracts.

mod completion;
mod grading;
mod progress;

use std::env;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;

use crate::repository::ApiError;

/// Caller-side timeout for grading calls, so the fail-open path stays
/// reachable on a hung connection.
const GRADING_TIMEOUT: Duration = Duration::from_secs(20);

/// Connection settings shared by the HTTP collaborators.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Read connection settings from the environment.
    ///
    /// Returns `None` when `LESSON_API_BASE_URL` is unset or empty;
    /// `LESSON_API_TOKEN` is optional.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("LESSON_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_token = env::var("LESSON_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// Single HTTP client behind all three collaborator contracts
/// ([`crate::repository::ProgressRepository`],
/// [`crate::repository::ResponseGrader`],
/// [`crate::repository::CompletionSink`]).
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    config: ApiConfig,
}

impl HttpApi {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Response, ApiError> {
        let builder = self.client.get(self.url(path));
        Ok(self.authorized(builder).send().await?)
    }

    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let builder = self.client.post(self.url(path)).json(body);
        Ok(self.authorized(builder).send().await?)
    }

    /// POST with the grading timeout applied on top of client defaults.
    pub(crate) async fn post_json_graded<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let builder = self
            .client
            .post(self.url(path))
            .timeout(GRADING_TIMEOUT)
            .json(body);
        Ok(self.authorized(builder).send().await?)
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        let builder = self.client.delete(self.url(path));
        Ok(self.authorized(builder).send().await?)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Serialization(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}
