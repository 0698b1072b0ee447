use crate::domain::model::{Lesson, Level, ModelSettings, RetrySettings};
use crate::utils::error::{ClientError, Result};
use async_trait::async_trait;

/// A hosted text-generation model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for Box<M> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }
}

/// Anything that can produce a lesson for a question, e.g. the backend API.
#[async_trait]
pub trait LessonSource: Send + Sync {
    async fn lesson(
        &self,
        question: &str,
        topic: &str,
        level: Level,
    ) -> std::result::Result<Lesson, ClientError>;
}

pub trait ConfigProvider: Send + Sync {
    fn api_key(&self) -> Option<&str>;
    fn model_settings(&self) -> &ModelSettings;
    fn retry_settings(&self) -> RetrySettings;
    fn allowed_origins(&self) -> Vec<String>;
    fn is_development(&self) -> bool;
}
