//! HTTP gateway for Careers.
//!
//! Exposes the chat endpoint the browser UI talks to, plus health and tool
//! listing endpoints. A chat request carries the whole conversation; the
//! response is the run's event stream framed as Server-Sent Events.
//!
//! Built on Axum for high performance async HTTP.

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::Stream;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use careers_agent::SessionLoop;
use careers_config::{AppConfig, GatewayConfig};
use careers_core::error::{Error, ErrorKind};
use careers_core::message::{Conversation, Message};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub session: SessionLoop,
    pub config: GatewayConfig,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS for the configured UI origins
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(list_tools_handler))
        .route("/chat", post(chat_handler))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(parsed))
}

/// Build the shared state from configuration: provider, tools, session.
pub fn build_state(config: &AppConfig) -> Result<SharedState, Box<dyn std::error::Error + Send + Sync>> {
    let router = careers_providers::router::build_from_config(config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;
    let tools = Arc::new(careers_tools::default_registry()?);

    Ok(Arc::new(GatewayState {
        session: SessionLoop::from_config(provider, tools, config),
        config: config.gateway.clone(),
    }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No API key configured; chat requests will fail until one is set");
    }

    let app = build_router(build_state(&config)?);

    info!(
        addr = %addr,
        model = %config.default_model,
        max_steps = config.session.max_steps,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ToolDto {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolDto>,
    count: usize,
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let defs = state.session.tools().definitions();
    let count = defs.len();

    Json(ToolListResponse {
        tools: defs
            .into_iter()
            .map(|d| ToolDto {
                name: d.name,
                description: d.description,
                parameters: d.parameters,
            })
            .collect(),
        count,
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn preflight_error(e: Error) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: e.to_string(),
            kind: Some(e.kind()),
        }),
    )
}

/// `POST /chat`: run the session loop over the posted conversation.
///
/// Problems with the request itself (bad JSON, malformed history, tools
/// the registry does not know) are answered with `400` before anything
/// is streamed.
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        (
            rejection.status(),
            Json(ErrorResponse {
                error: rejection.body_text(),
                kind: None,
            }),
        )
    })?;

    let conversation = Conversation::from_messages(payload.messages);
    info!(messages = conversation.len(), "Chat request");

    let run = state.session.run(conversation).map_err(|e| {
        warn!(error = %e, "Rejected chat request");
        preflight_error(e)
    })?;

    Ok(transport::sse_response(run.into_events()))
}
