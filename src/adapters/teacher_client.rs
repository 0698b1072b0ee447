use crate::domain::model::{HealthStatus, Lesson, Level};
use crate::domain::ports::LessonSource;
use crate::utils::error::ClientError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Lessons can take several upstream retries, so they get a longer budget.
const LESSON_TIMEOUT: Duration = Duration::from_secs(45);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPayload {
    error: Option<String>,
    retry_after: Option<u64>,
}

/// HTTP client for the `/api/ai` and `/health` endpoints.
#[derive(Debug, Clone)]
pub struct TeacherClient {
    client: Client,
    base_url: String,
}

impl TeacherClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::DecodeError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn lesson(
        &self,
        question: &str,
        topic: &str,
        level: Level,
    ) -> Result<Lesson, ClientError> {
        let url = format!("{}/api/ai", self.base_url);
        tracing::debug!("API Request: GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("question", question),
                ("topic", topic),
                ("level", level.as_str()),
            ])
            .timeout(LESSON_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        tracing::debug!("API Response: {} {}", status, url);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        response
            .json::<Lesson>()
            .await
            .map_err(|e| ClientError::DecodeError(e.to_string()))
    }

    /// Ask how to say a phrase in Japanese, in `formal` or `casual` speech.
    pub async fn translation(&self, phrase: &str, speech: &str) -> Result<Lesson, ClientError> {
        let question = format!(
            "How do you say \"{}\" in Japanese using {} speech?",
            phrase, speech
        );
        self.lesson(&question, "Japanese Language", Level::Intermediate)
            .await
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!("Health check failed: {}", e);
            ClientError::HealthCheckError
        })?;

        if !response.status().is_success() {
            tracing::error!("Health check failed with status {}", response.status());
            return Err(ClientError::HealthCheckError);
        }

        response
            .json::<HealthStatus>()
            .await
            .map_err(|_| ClientError::HealthCheckError)
    }

    fn transport_error(&self, error: reqwest::Error) -> ClientError {
        tracing::error!("Educational API error: {}", error);
        if error.is_timeout() {
            ClientError::TimeoutError
        } else if error.is_connect() {
            ClientError::ConnectionRefusedError {
                url: self.base_url.clone(),
            }
        } else {
            ClientError::UnknownError
        }
    }
}

#[async_trait]
impl LessonSource for TeacherClient {
    async fn lesson(
        &self,
        question: &str,
        topic: &str,
        level: Level,
    ) -> Result<Lesson, ClientError> {
        TeacherClient::lesson(self, question, topic, level).await
    }
}

/// 將後端錯誤回應轉為使用者可讀的訊息
fn error_for_status(status: StatusCode, body: &str) -> ClientError {
    let payload = serde_json::from_str::<ErrorPayload>(body).ok();
    tracing::error!("Response error: {} {}", status, body);

    match status {
        StatusCode::SERVICE_UNAVAILABLE => {
            let retry_after_secs = payload
                .and_then(|p| p.retry_after)
                .map(|ms| (ms + 500) / 1000)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            ClientError::BusyError { retry_after_secs }
        }
        StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimitedError,
        StatusCode::UNAUTHORIZED => ClientError::AuthError,
        _ => match payload.and_then(|p| p.error) {
            Some(message) => ClientError::ServerError(message),
            None => ClientError::UnknownError,
        },
    }
}
