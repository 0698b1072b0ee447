pub mod toml_config;

use crate::domain::ports::ConfigProvider;
use crate::domain::model::{ModelSettings, RetrySettings};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use clap::Parser;
use std::path::PathBuf;
use toml_config::TomlConfig;

/// Origins the browser UI is served from during local development.
pub const LOCAL_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

#[derive(Debug, Clone, Parser)]
#[command(name = "ai-teacher")]
#[command(about = "Backend for the All-Rounder AI Teacher")]
pub struct ServerConfig {
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    #[arg(long, env = "NODE_ENV", default_value = "production")]
    pub node_env: String,

    #[arg(long, help = "Override the Gemini model name")]
    pub model: Option<String>,

    #[arg(long, help = "Optional TOML file with [model] and [retry] settings")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(skip)]
    pub model_settings: ModelSettings,

    #[arg(skip)]
    pub retry_settings: RetrySettings,
}

impl ServerConfig {
    /// 解析命令列與環境變數，並合併 TOML 設定檔
    pub fn load() -> Result<Self> {
        let mut config = Self::parse();
        config.resolve()?;
        Ok(config)
    }

    /// Merge the optional TOML file and CLI overrides into the model settings.
    pub fn resolve(&mut self) -> Result<()> {
        if let Some(path) = &self.config {
            let file = TomlConfig::from_file(path)?;
            file.apply_model(&mut self.model_settings);
            file.apply_retry(&mut self.retry_settings);
            if self.gemini_api_key.is_none() {
                self.gemini_api_key = file.api_key().map(str::to_string);
            }
        }

        if let Some(model) = &self.model {
            self.model_settings.name = model.clone();
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }
}

impl ConfigProvider for ServerConfig {
    fn api_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    fn model_settings(&self) -> &ModelSettings {
        &self.model_settings
    }

    fn retry_settings(&self) -> RetrySettings {
        self.retry_settings
    }

    fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.trim_end_matches('/').to_string()];
        for origin in LOCAL_ORIGINS {
            if !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }

    fn is_development(&self) -> bool {
        self.node_env.eq_ignore_ascii_case("development")
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("port", self.port as usize, 1)?;
        validate_url("frontend_url", &self.frontend_url)?;

        let model = &self.model_settings;
        validate_non_empty_string("model.name", &model.name)?;
        validate_url("model.base_url", &model.base_url)?;
        validate_range("model.temperature", model.temperature, 0.0, 2.0)?;
        validate_range("model.top_p", model.top_p, 0.0, 1.0)?;
        validate_positive_number("model.top_k", model.top_k as usize, 1)?;
        validate_positive_number("model.max_output_tokens", model.max_output_tokens as usize, 1)?;
        validate_positive_number(
            "model.request_timeout_seconds",
            model.request_timeout_seconds as usize,
            1,
        )?;

        validate_range("retry.max_attempts", self.retry_settings.max_attempts, 1, 10)?;

        Ok(())
    }
}
