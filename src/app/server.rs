use crate::adapters::GeminiModel;
use crate::core::engine::TeacherEngine;
use crate::core::retry::RetryPolicy;
use crate::domain::model::{AskRequest, HealthStatus};
use crate::domain::ports::{ConfigProvider, LanguageModel};
use crate::utils::error::{Result, TeacherError};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;
const OVERLOADED_RETRY_AFTER_MS: u64 = 30_000;
const RATE_LIMITED_RETRY_AFTER_MS: u64 = 60_000;

pub type DynEngine = TeacherEngine<Box<dyn LanguageModel>>;

#[derive(Clone)]
pub struct AppState {
    engine: Option<Arc<DynEngine>>,
    development: bool,
}

impl AppState {
    /// `engine` is `None` when no API key is configured; `/api/ai` then answers 500.
    pub fn new(engine: Option<DynEngine>, development: bool) -> Self {
        Self {
            engine: engine.map(Arc::new),
            development,
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let retry = RetryPolicy::from(&config.retry_settings());
        let engine = GeminiModel::from_config(config)?.map(|model| {
            let model: Box<dyn LanguageModel> = Box::new(model);
            TeacherEngine::new(model, retry)
        });
        Ok(Self::new(engine, config.is_development()))
    }
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/ai", get(ask_get).post(ask_post))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, details: Option<&str>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                details: details.map(str::to_string),
                retry_after: None,
            },
        }
    }

    fn retry_after(mut self, millis: u64) -> Self {
        self.body.retry_after = Some(millis);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// 依錯誤種類決定 HTTP 狀態碼與回應內容
    pub fn from_teacher_error(err: &TeacherError, development: bool) -> Self {
        match err {
            TeacherError::MissingParameterError { field } => ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("Missing required parameter: {}", field),
                None,
            ),
            TeacherError::InvalidParameterError { field, reason } => ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("Invalid parameter: {}", field),
                Some(reason.as_str()),
            ),
            TeacherError::MissingConfigError { .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error: AI service not available",
                None,
            ),
            _ if err.upstream_status() == Some(503) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "AI service is temporarily overloaded. Please try again in a few moments.",
                Some("The AI model is experiencing high traffic. This is temporary."),
            )
            .retry_after(OVERLOADED_RETRY_AFTER_MS),
            _ if err.upstream_status() == Some(429) => ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please wait a moment before trying again.",
                Some("Rate limit exceeded. Please slow down your requests."),
            )
            .retry_after(RATE_LIMITED_RETRY_AFTER_MS),
            _ if matches!(err.upstream_status(), Some(401 | 403)) => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "Authentication error with AI service",
                Some("Please check API key configuration"),
            ),
            TeacherError::SerializationError(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to parse AI response. Please try again.",
                Some("The AI response contained invalid JSON format."),
            ),
            _ if err.is_connectivity() => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Unable to connect to AI service. Please try again later.",
                Some("Network connectivity issue with the AI service"),
            ),
            _ => {
                let details = if development {
                    err.to_string()
                } else {
                    "An unexpected error occurred".to_string()
                };
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate response. Please try again.",
                    Some(details.as_str()),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "All-Rounder AI Teacher Backend API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "ai": "/api/ai"
        }
    }))
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok())
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    let route = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Route not found",
            "message": format!("The route {} does not exist on this server", route)
        })),
    )
}

async fn ask_get(
    State(state): State<AppState>,
    Query(params): Query<AskRequest>,
) -> std::result::Result<Json<Value>, ApiError> {
    answer(&state, params).await
}

/// POST 版本：參數放在 JSON 本文，空本文視同缺少參數
async fn ask_post(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<Value>, ApiError> {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        AskRequest::default()
    } else {
        serde_json::from_slice::<AskRequest>(&body).map_err(|e| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                Some(e.to_string().as_str()),
            )
        })?
    };

    answer(&state, params).await
}

async fn answer(state: &AppState, params: AskRequest) -> std::result::Result<Json<Value>, ApiError> {
    let to_api_error = |err: TeacherError| ApiError::from_teacher_error(&err, state.development);

    let request = params.into_lesson_request().map_err(to_api_error)?;

    let Some(engine) = &state.engine else {
        tracing::error!("GEMINI_API_KEY not configured");
        return Err(to_api_error(TeacherError::MissingConfigError {
            field: "GEMINI_API_KEY".to_string(),
        }));
    };

    match engine.answer(&request).await {
        Ok(answer) => Ok(Json(answer.body)),
        Err(err) => {
            tracing::error!(
                "Error with Gemini API: {} (Category: {:?}, Severity: {:?})",
                err,
                err.category(),
                err.severity()
            );
            tracing::debug!("💡 Recovery suggestion: {}", err.recovery_suggestion());
            Err(to_api_error(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String>>>,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TeacherError::EmptyCompletionError))
        }
    }

    fn app_with(replies: Vec<Result<String>>, development: bool) -> Router {
        let model: Box<dyn LanguageModel> = Box::new(ScriptedModel {
            replies: Mutex::new(replies.into()),
        });
        let engine = TeacherEngine::new(model, RetryPolicy::immediate(3));
        router(
            AppState::new(Some(engine), development),
            &["http://localhost:3000".to_string()],
        )
    }

    fn upstream(status: u16) -> TeacherError {
        TeacherError::UpstreamError {
            status,
            message: "upstream".to_string(),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("request should complete");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request should build")
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let (status, body) = send(app_with(vec![], false), get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["message"], "All-Rounder AI Teacher Backend is running");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let (status, body) = send(app_with(vec![], false), get_request("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoints"]["ai"], "/api/ai");
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let (status, body) = send(app_with(vec![], false), get_request("/nope?x=1")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["message"], "The route /nope?x=1 does not exist on this server");
    }

    #[tokio::test]
    async fn test_get_returns_repaired_lesson() {
        let app = app_with(
            vec![Ok("```json\n{\"topic\": \"Physics\", \"steps\": [\"a\",],}\n```".to_string())],
            false,
        );

        let (status, body) = send(app, get_request("/api/ai?question=What%20is%20force%3F&topic=Physics")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topic"], "Physics");
        assert_eq!(body["steps"][0], "a");
    }

    #[tokio::test]
    async fn test_post_accepts_json_body() {
        let app = app_with(vec![Ok("{\"topic\": \"History\"}".to_string())], false);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/ai")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"question": "Who built the pyramids?", "level": "beginner"}"#))
            .expect("request should build");

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topic"], "History");
    }

    #[tokio::test]
    async fn test_missing_question_returns_400() {
        let (status, body) = send(app_with(vec![], false), get_request("/api/ai?topic=Math")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required parameter: question");
    }

    #[tokio::test]
    async fn test_empty_post_body_returns_400() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/ai")
            .body(Body::empty())
            .expect("request should build");

        let (status, body) = send(app_with(vec![], false), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required parameter: question");
    }

    #[tokio::test]
    async fn test_unknown_level_is_answered_at_intermediate() {
        let app = app_with(vec![Ok("{\"topic\": \"General\"}".to_string())], false);

        let (status, body) = send(app, get_request("/api/ai?question=hi&level=expert")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topic"], "General");
    }

    #[tokio::test]
    async fn test_missing_api_key_returns_500() {
        let app = router(AppState::new(None, false), &[]);

        let (status, body) = send(app, get_request("/api/ai?question=hi")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server configuration error: AI service not available");
    }

    #[tokio::test]
    async fn test_overloaded_upstream_returns_503_with_retry_after() {
        let app = app_with(
            vec![Err(upstream(503)), Err(upstream(503)), Err(upstream(503))],
            false,
        );

        let (status, body) = send(app, get_request("/api/ai?question=hi")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retryAfter"], 30000);
    }

    #[tokio::test]
    async fn test_rate_limited_upstream_returns_429() {
        let app = app_with(
            vec![Err(upstream(429)), Err(upstream(429)), Err(upstream(429))],
            false,
        );

        let (status, body) = send(app, get_request("/api/ai?question=hi")).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["retryAfter"], 60000);
    }

    #[tokio::test]
    async fn test_forbidden_upstream_returns_401() {
        let app = app_with(vec![Err(upstream(403))], false);

        let (status, body) = send(app, get_request("/api/ai?question=hi")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["details"], "Please check API key configuration");
    }

    #[tokio::test]
    async fn test_generic_error_details_depend_on_environment() {
        let (status, body) = send(
            app_with(vec![Err(upstream(400))], false),
            get_request("/api/ai?question=hi"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"], "An unexpected error occurred");

        let (_, body) = send(
            app_with(vec![Err(upstream(400))], true),
            get_request("/api/ai?question=hi"),
        )
        .await;
        assert!(body["details"].as_str().unwrap().contains("HTTP 400"));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_served_as_fallback_with_200() {
        let app = app_with(vec![Ok("no json here".to_string())], false);

        let (status, body) = send(app, get_request("/api/ai?question=hi")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], "Educational Content");
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/ai")
            .header("Origin", "http://localhost:3000")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .expect("request should build");

        let response = app_with(vec![], false)
            .oneshot(request)
            .await
            .expect("request should complete");

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }
}
