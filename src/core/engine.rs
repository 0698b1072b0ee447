use crate::core::prompt::build_prompt;
use crate::core::repair::{repair, RepairStage};
use crate::core::retry::{retry_with_backoff, RetryPolicy};
use crate::domain::model::LessonRequest;
use crate::domain::ports::LanguageModel;
use crate::utils::error::{Result, TeacherError};
use crate::utils::logger::truncate_for_log;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub body: Value,
    pub stage: RepairStage,
}

pub struct TeacherEngine<M: LanguageModel> {
    model: M,
    retry: RetryPolicy,
}

impl<M: LanguageModel> TeacherEngine<M> {
    pub fn new(model: M, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// 產生一份教學回答：組 prompt、呼叫模型（含重試）、修復 JSON
    ///
    /// Upstream failures are returned as errors. Output that cannot be
    /// repaired is not an error: the fallback lesson comes back instead.
    pub async fn answer(&self, request: &LessonRequest) -> Result<Answer> {
        tracing::info!(
            "Processing AI request: \"{}\" ({}, {})",
            truncate_for_log(&request.question, 120),
            request.topic,
            request.level
        );

        let prompt = build_prompt(request);
        let text = retry_with_backoff(&self.retry, TeacherError::is_retryable, |attempt| {
            tracing::debug!("Calling language model, attempt {}", attempt);
            self.model.generate(&prompt)
        })
        .await?;

        tracing::debug!("Raw AI response: {}", truncate_for_log(&text, 200));

        let repaired = repair(&text);
        if repaired.stage.is_fallback() {
            tracing::warn!("Serving fallback lesson for \"{}\"", truncate_for_log(&request.question, 120));
        } else {
            tracing::info!("AI response processed successfully ({:?})", repaired.stage);
        }

        Ok(Answer {
            body: repaired.value,
            stage: repaired.stage,
        })
    }
}
