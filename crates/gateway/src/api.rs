//! Refinement API.
//!
//! Endpoints:
//!
//! - `POST /api/refine`: Start a session, stream its events (SSE)
//! - `GET  /api/sessions`: List sessions (`?status=&limit=`)
//! - `GET  /api/sessions/{id}`: Session plus ordered iteration records
//! - `GET  /api/sessions/{id}/report`: Final report from stored records
//! - `POST /api/sessions/{id}/cancel`: Cancel a running session
//! - `GET  /api/activity`: SSE feed of domain events
//! - `GET  /api/health`: Liveness and dependency status

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tracing::{error, info};

use promptsmith_config::AppConfig;
use promptsmith_core::error::{Error, KnowledgeError};
use promptsmith_core::event::DomainEvent;
use promptsmith_core::iteration::IterationRecord;
use promptsmith_core::session::{RefinementRequest, Session, SessionFilter, SessionId, SessionSummary};
use promptsmith_engine::{Engine, FinalReport};

use crate::SESSION_ID_HEADER;

// ── State ─────────────────────────────────────────────────────────────────

/// Largest page returned by `GET /api/sessions`.
const MAX_LIST_LIMIT: usize = 200;

/// Shared state for the API.
pub struct GatewayState {
    pub engine: Arc<Engine>,
    pub config: Arc<AppConfig>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(engine: Arc<Engine>, config: Arc<AppConfig>) -> Self {
        Self {
            engine,
            config,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the API router. Nest this under "/api" in the main router.
pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/refine", post(refine_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/report", get(report_handler))
        .route("/sessions/{id}/cancel", post(cancel_handler))
        .route("/activity", get(activity_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

// ── Request / Response types ─────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn storage_error(e: KnowledgeError) -> ApiError {
    error!(error = %e, "Knowledge Base request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Knowledge Base error: {e}"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDetailResponse {
    pub session: Session,
    pub iterations: Vec<IterationRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: FinalReport,
    pub markdown: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub session_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeHealth {
    pub backend: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    pub knowledge_base: KnowledgeHealth,
    pub backends: Vec<String>,
    pub active_sessions: usize,
}

// ── Refine ────────────────────────────────────────────────────────────────

/// `POST /api/refine`: validate, start a session and stream its events.
///
/// Malformed or out-of-range bodies are rejected with `400 {error}` before
/// any session exists. Dropping the connection cancels the session at the
/// next iteration boundary.
async fn refine_handler(
    State(state): State<SharedState>,
    payload: Result<Json<RefinementRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;

    info!(
        backend = %request.config.providers.orchestrator,
        enhancer = request.config.providers.enhancer.as_str(),
        max_iterations = request.config.max_iterations,
        "Refine request"
    );

    let run = state.engine.start(request).await.map_err(|e| match e {
        Error::Config { message } => api_error(StatusCode::BAD_REQUEST, message),
        other => {
            error!(error = %other, "Could not start session");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    })?;

    let session_id = run.session_id.to_string();
    let (events, _session_task) = run.into_parts();
    let stream = ReceiverStream::new(events).map(|event| {
        Ok::<_, Infallible>(
            SseEvent::default()
                .event(event.event_type())
                .data(event.data().to_string()),
        )
    });

    let mut response = Sse::new(stream).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    Ok(response)
}

// ── Sessions ──────────────────────────────────────────────────────────────

async fn list_sessions_handler(
    State(state): State<SharedState>,
    query: Result<Query<SessionFilter>, QueryRejection>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let Query(mut filter) = query.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    filter.limit = Some(filter.limit.unwrap_or(50).min(MAX_LIST_LIMIT));

    let sessions = state
        .engine
        .knowledge()
        .list_sessions(&filter)
        .await
        .map_err(storage_error)?;
    Ok(Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    }))
}

async fn load_session(state: &GatewayState, id: &SessionId) -> Result<Session, ApiError> {
    state
        .engine
        .knowledge()
        .session(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session not found: {id}")))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let id = SessionId(id);
    let session = load_session(&state, &id).await?;
    let iterations = state
        .engine
        .knowledge()
        .get_session(&id)
        .await
        .map_err(storage_error)?;
    Ok(Json(SessionDetailResponse { session, iterations }))
}

/// `GET /api/sessions/{id}/report`: recomputed from stored records.
async fn report_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let id = SessionId(id);
    let session = load_session(&state, &id).await?;
    let records = state
        .engine
        .knowledge()
        .get_session(&id)
        .await
        .map_err(storage_error)?;
    let report = FinalReport::from_stored(&session, &records);
    Ok(Json(ReportResponse {
        markdown: report.to_markdown(),
        report,
    }))
}

async fn cancel_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CancelResponse>), ApiError> {
    let id = SessionId(id);
    if state.engine.cancel(&id).await {
        return Ok((
            StatusCode::ACCEPTED,
            Json(CancelResponse {
                session_id: id.to_string(),
                cancelled: true,
            }),
        ));
    }

    let session = load_session(&state, &id).await?;
    Err(api_error(
        StatusCode::CONFLICT,
        format!("Session {id} is not running (status: {})", session.status.as_str()),
    ))
}

// ── Activity feed ─────────────────────────────────────────────────────────

fn domain_event_name(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::SessionStarted { .. } => "session_started",
        DomainEvent::IterationPersisted { .. } => "iteration_persisted",
        DomainEvent::SessionFinished { .. } => "session_finished",
        DomainEvent::ErrorOccurred { .. } => "error_occurred",
    }
}

/// `GET /api/activity`: SSE stream of domain events across all sessions.
/// Lagging subscribers skip the events they missed.
async fn activity_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.engine.bus().subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default()
                .event(domain_event_name(event.as_ref()))
                .data(data))
        });

    Sse::new(stream)
}

// ── Health ────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let kb = state.engine.knowledge();
    let reachable = kb.health_check().await.unwrap_or(false);
    let backends = state
        .engine
        .registry()
        .router()
        .available()
        .iter()
        .map(|b| b.as_str().to_string())
        .collect();

    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" }.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
        knowledge_base: KnowledgeHealth {
            backend: kb.name().to_string(),
            reachable,
        },
        backends,
        active_sessions: state.engine.active_sessions().await,
    })
}
