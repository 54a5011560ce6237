//! HTTP gateway for Promptsmith.
//!
//! Serves the refinement API under `/api`: a streaming refine endpoint,
//! session history and reports from the Knowledge Base, cancellation, a
//! process-wide activity feed and a health check.
//!
//! Built on Axum; every session is streamed as Server-Sent Events.

pub mod api;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use promptsmith_config::AppConfig;
use promptsmith_core::event::EventBus;
use promptsmith_engine::{CapabilityRegistry, Engine};

pub use api::{GatewayState, SharedState};

/// Response header carrying the id of a newly started session.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Build the full router.
///
/// Layers applied:
/// - CORS for the configured front-end origin
/// - request body size limit (`gateway.max_body_bytes`, 1 MB by default)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let origin = match state.config.gateway.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            warn!(
                origin = %state.config.gateway.allowed_origin,
                "Invalid allowed_origin, cross-origin requests will be rejected"
            );
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
        .max_age(std::time::Duration::from_secs(3600));

    let body_limit = state.config.gateway.max_body_bytes;

    Router::new()
        .nest("/api", api::api_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds the provider router, Knowledge Base and engine once and shares
/// them across every request.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let config = Arc::new(config);

    let router = Arc::new(promptsmith_providers::build_from_config(&config));
    let backends: Vec<&str> = router.available().iter().map(|b| b.as_str()).collect();
    info!(backends = ?backends, "Model backends ready");

    let kb = promptsmith_knowledge::open_from_config(&config).await?;
    let bus = Arc::new(EventBus::new(config.runtime.bus_capacity));
    let registry = Arc::new(CapabilityRegistry::new(router, config.clone()));
    let engine = Arc::new(Engine::new(registry, kb, bus));

    let app = build_router(Arc::new(GatewayState::new(engine, config)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
