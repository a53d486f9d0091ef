use crate::ai_sdk::AiConfig;
use crate::assistant::Assistant;
use crate::error::AiError;
use crate::protocol::{
    AskRequest, AskResponse, GenerateWeeklyReportRequest, ImproveDailyLogRequest,
    ImproveDailyLogResponse, StreamEvent, WeeklyReportResponse,
};
use crate::relay::RelayReceiver;
use crate::report;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

pub struct ServerConfig {
    pub listen: String,
    pub auth_token: String,
    pub ai: AiConfig,
}

struct ServerState {
    assistant: Assistant,
    auth_token: String,
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(ServerState {
        assistant: Assistant::new(config.ai),
        auth_token: config.auth_token,
    });

    let ai = state.assistant.config();
    if ai.api_key.is_empty() {
        tracing::warn!("AI_API_KEY is not set; upstream requests will be unauthenticated");
    }
    tracing::info!(api_url = %ai.api_url, model = %ai.model, "using AI provider");

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    tracing::info!("weekly-report-ai listening on http://{}", config.listen);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ai/ask", post(ask))
        .route("/api/ai/ask/stream", post(ask_stream))
        .route(
            "/api/ai/generate-weekly-report",
            post(generate_weekly_report),
        )
        .route(
            "/api/ai/generate-weekly-report/stream",
            post(generate_weekly_report_stream),
        )
        .route("/api/ai/improve-daily-log", post(improve_daily_log))
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing or invalid bearer token")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.status.as_u16(),
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        tracing::error!(error = %err, "AI request failed");
        Self::new(StatusCode::BAD_GATEWAY, err.to_string())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ask(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    authorize(&headers, &state.auth_token)?;
    require_text(&payload.question, "question must not be empty")?;

    let answer = state
        .assistant
        .ask(&payload.question, payload.system_prompt.as_deref())
        .await?;
    Ok(Json(AskResponse { answer }))
}

async fn ask_stream(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&headers, &state.auth_token)?;
    require_text(&payload.question, "question must not be empty")?;

    tracing::info!("streaming answer");
    let relay = state
        .assistant
        .ask_stream(&payload.question, payload.system_prompt.as_deref());
    Ok(emit(relay))
}

async fn generate_weekly_report(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(payload): Json<GenerateWeeklyReportRequest>,
) -> Result<Json<WeeklyReportResponse>, ApiError> {
    authorize(&headers, &state.auth_token)?;
    require_logs(&payload)?;

    let content = state
        .assistant
        .generate_weekly_report(&payload.daily_logs, payload.template.as_deref())
        .await?;
    let summary = report::summarize(&content);
    Ok(Json(WeeklyReportResponse { content, summary }))
}

async fn generate_weekly_report_stream(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(payload): Json<GenerateWeeklyReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&headers, &state.auth_token)?;
    require_logs(&payload)?;

    tracing::info!(logs = payload.daily_logs.len(), "streaming weekly report");
    let relay = state
        .assistant
        .generate_weekly_report_stream(&payload.daily_logs, payload.template.as_deref());
    Ok(emit(relay))
}

async fn improve_daily_log(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(payload): Json<ImproveDailyLogRequest>,
) -> Result<Json<ImproveDailyLogResponse>, ApiError> {
    authorize(&headers, &state.auth_token)?;
    require_text(&payload.content, "content must not be empty")?;

    let content = state.assistant.improve_daily_log(&payload.content).await?;
    Ok(Json(ImproveDailyLogResponse { content }))
}

// One SSE event per fragment; a failure becomes the final event.
fn emit(relay: RelayReceiver) -> impl IntoResponse {
    let events = relay.into_stream().map(|event| {
        let data = serde_json::to_string(&StreamEvent::from(event)).unwrap_or_default();
        Ok::<Event, Infallible>(Event::default().data(data))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn authorize(headers: &HeaderMap, token: &str) -> Result<(), ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match header {
        Some(value) if value == format!("Bearer {}", token) => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}

fn require_text(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(message));
    }
    Ok(())
}

fn require_logs(payload: &GenerateWeeklyReportRequest) -> Result<(), ApiError> {
    if payload.daily_logs.is_empty() {
        return Err(ApiError::bad_request("dailyLogs must not be empty"));
    }
    Ok(())
}
