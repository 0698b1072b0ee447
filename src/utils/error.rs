use thiserror::Error;

#[derive(Error, Debug)]
pub enum TeacherError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Upstream model returned HTTP {status}: {message}")]
    UpstreamError { status: u16, message: String },

    #[error("Upstream model returned no text")]
    EmptyCompletionError,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required parameter: {field}")]
    MissingParameterError { field: String },

    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameterError { field: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    Configuration,
    Request,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// 上游可重試的 HTTP 狀態碼
pub const RETRYABLE_STATUSES: [u16; 3] = [429, 500, 503];

impl TeacherError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TeacherError::ApiError(_) => ErrorCategory::Network,
            TeacherError::UpstreamError { .. } | TeacherError::EmptyCompletionError => {
                ErrorCategory::Upstream
            }
            TeacherError::ConfigError { .. }
            | TeacherError::MissingConfigError { .. }
            | TeacherError::InvalidConfigValueError { .. }
            | TeacherError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            TeacherError::MissingParameterError { .. }
            | TeacherError::InvalidParameterError { .. } => ErrorCategory::Request,
            TeacherError::SerializationError(_) => ErrorCategory::Data,
            TeacherError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 上游回傳的 HTTP 狀態碼（若有）
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            TeacherError::UpstreamError { status, .. } => Some(*status),
            TeacherError::ApiError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Only upstream 429/500/503 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.upstream_status()
            .map(|status| RETRYABLE_STATUSES.contains(&status))
            .unwrap_or(false)
    }

    /// 是否為連線層級的失敗（連不上、逾時）
    pub fn is_connectivity(&self) -> bool {
        match self {
            TeacherError::ApiError(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TeacherError::ApiError(_) => "Check network connectivity to the AI service",
            TeacherError::UpstreamError { status: 429, .. } => {
                "Slow down requests; the AI service is rate limiting"
            }
            TeacherError::UpstreamError { status: 401 | 403, .. } => {
                "Check the GEMINI_API_KEY configuration"
            }
            TeacherError::UpstreamError { .. } => "Try again in a few moments",
            TeacherError::EmptyCompletionError => "Rephrase the question and try again",
            TeacherError::MissingConfigError { .. } => {
                "Set the missing value via command line flag or environment variable"
            }
            TeacherError::ConfigError { .. }
            | TeacherError::InvalidConfigValueError { .. }
            | TeacherError::ConfigValidationError { .. } => {
                "Review the configuration file and command line flags"
            }
            TeacherError::MissingParameterError { .. }
            | TeacherError::InvalidParameterError { .. } => "Fix the request parameters",
            TeacherError::SerializationError(_) => "Inspect the raw upstream response",
            TeacherError::IoError(_) => "Check file paths and permissions",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TeacherError::ApiError(_) => "Unable to reach the AI service".to_string(),
            TeacherError::UpstreamError { status, .. } => {
                format!("The AI service answered with HTTP {}", status)
            }
            TeacherError::EmptyCompletionError => "The AI service returned an empty answer".to_string(),
            TeacherError::MissingConfigError { field } => format!("{} is not configured", field),
            TeacherError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TeacherError>;

/// Failures seen by consumers of the backend API.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("AI service is temporarily busy. Please try again in {retry_after_secs} seconds. The AI model is experiencing high traffic right now.")]
    BusyError { retry_after_secs: u64 },

    #[error("Too many requests. Please wait a moment before asking another question.")]
    RateLimitedError,

    #[error("Authentication error. Please check if the backend server is properly configured.")]
    AuthError,

    #[error("Cannot connect to backend server at {url}. Please make sure the backend is running.")]
    ConnectionRefusedError { url: String },

    #[error("Request timed out. The AI service may be slow right now. Please try again.")]
    TimeoutError,

    #[error("{0}")]
    ServerError(String),

    #[error("Failed to get educational response. Please check if the backend server is running and try again.")]
    UnknownError,

    #[error("Backend server is not responding")]
    HealthCheckError,

    #[error("Invalid response body: {0}")]
    DecodeError(String),
}
