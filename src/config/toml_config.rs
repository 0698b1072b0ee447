use crate::domain::model::{ModelSettings, RetrySettings};
use crate::utils::error::{Result, TeacherError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional file-based settings for the upstream model and retry policy.
///
/// Every key may be omitted; missing keys keep their built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub model: Option<ModelSection>,
    pub retry: Option<RetrySection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSection {
    pub api_key: Option<String>,
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    pub max_attempts: Option<usize>,
    pub base_delay_ms: Option<u64>,
    pub max_jitter_ms: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TeacherError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TeacherError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEMINI_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TeacherError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// API key from the file, ignoring unresolved `${VAR}` placeholders.
    pub fn api_key(&self) -> Option<&str> {
        self.model
            .as_ref()
            .and_then(|m| m.api_key.as_deref())
            .filter(|key| !key.trim().is_empty() && !key.starts_with("${"))
    }

    pub fn apply_model(&self, settings: &mut ModelSettings) {
        let Some(section) = &self.model else {
            return;
        };
        if let Some(name) = &section.name {
            settings.name = name.clone();
        }
        if let Some(base_url) = &section.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(temperature) = section.temperature {
            settings.temperature = temperature;
        }
        if let Some(top_k) = section.top_k {
            settings.top_k = top_k;
        }
        if let Some(top_p) = section.top_p {
            settings.top_p = top_p;
        }
        if let Some(max_output_tokens) = section.max_output_tokens {
            settings.max_output_tokens = max_output_tokens;
        }
        if let Some(timeout) = section.request_timeout_seconds {
            settings.request_timeout_seconds = timeout;
        }
    }

    pub fn apply_retry(&self, settings: &mut RetrySettings) {
        let Some(section) = &self.retry else {
            return;
        };
        if let Some(max_attempts) = section.max_attempts {
            settings.max_attempts = max_attempts;
        }
        if let Some(base_delay_ms) = section.base_delay_ms {
            settings.base_delay_ms = base_delay_ms;
        }
        if let Some(max_jitter_ms) = section.max_jitter_ms {
            settings.max_jitter_ms = max_jitter_ms;
        }
    }
}
