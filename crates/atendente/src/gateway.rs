// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator HTTP gateway built on axum.
//!
//! Routes:
//! - `GET /health`, `GET /metrics` (public)
//! - `GET /v1/sessions`
//! - `POST|GET|DELETE /v1/sessions/{id}` (start with `?force=true` to replace a socket)
//! - `POST /v1/sessions/{id}/messages`
//! - `POST /v1/knowledge/{tenant}/documents` (202, ingestion continues in the background)
//! - `GET /v1/documents/{id}`
//!
//! `/v1` routes require `Authorization: Bearer <token>` when a token is configured.

use std::time::Instant;

use atendente_config::model::GatewayConfig;
use atendente_core::types::SessionStatus;
use atendente_core::{AtendenteError, SessionId};
use atendente_knowledge::{DEFAULT_KNOWLEDGE_BASE, Document, Ingestor};
use atendente_session::{SessionInfo, SessionRegistry};
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self as axum_middleware, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: SessionRegistry,
    pub ingestor: Ingestor,
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` leaves the API open.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth.bearer_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Error body for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

struct ApiError(AtendenteError);

impl From<AtendenteError> for ApiError {
    fn from(e: AtendenteError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AtendenteError::SessionNotFound(_) | AtendenteError::ConversationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AtendenteError::Transport { .. } | AtendenteError::Provider { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AtendenteError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AtendenteError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "gateway request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn not_found(what: &str, id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{what} {id} not found"),
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    pub pairing_code: Option<String>,
}

impl From<SessionInfo> for SessionView {
    fn from(info: SessionInfo) -> Self {
        Self {
            session_id: info.session_id.0,
            status: info.status,
            pairing_code: info.last_pairing_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartParams {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Recipient identity on the transport.
    pub to: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub sessions: usize,
}

async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        sessions: state.registry.list_sessions().len(),
    })
}

async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_sessions(State(state): State<GatewayState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state
            .registry
            .list_sessions()
            .into_iter()
            .map(SessionView::from)
            .collect(),
    })
}

async fn start_session(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(params): Query<StartParams>,
) -> Result<Json<SessionView>, ApiError> {
    let info = state
        .registry
        .start(&SessionId(id), params.force)
        .await?;
    Ok(Json(info.into()))
}

async fn get_session(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.registry.get_info(&SessionId(id.clone())) {
        Some(info) => Json(SessionView::from(info)).into_response(),
        None => not_found("session", &id),
    }
}

async fn delete_session(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.disconnect(&SessionId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_message(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let receipt = state
        .registry
        .send(&SessionId(id), &body.to, &body.text)
        .await?;
    Ok(Json(SendResponse {
        message_id: receipt.message_id,
    }))
}

async fn submit_document(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
    Json(body): Json<DocumentRequest>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let kb = state
        .ingestor
        .store()
        .ensure_knowledge_base(&tenant, DEFAULT_KNOWLEDGE_BASE)
        .await?;
    let document = state.ingestor.submit(&kb.id, &body.title, body.text).await?;
    info!(tenant_id = %tenant, document_id = %document.id, "document accepted for ingestion");
    Ok((StatusCode::ACCEPTED, Json(document)))
}

async fn get_document(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match state.ingestor.store().get_document(&id).await? {
        Some(document) => Json(document).into_response(),
        None => not_found("document", &id),
    })
}

pub fn router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/sessions", get(list_sessions))
        .route(
            "/v1/sessions/{id}",
            post(start_session).get(get_session).delete(delete_session),
        )
        .route("/v1/sessions/{id}/messages", post(send_message))
        .route("/v1/knowledge/{tenant}/documents", post(submit_document))
        .route("/v1/documents/{id}", get(get_document))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds the gateway and serves until `cancel` fires.
pub async fn serve(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), AtendenteError> {
    let auth = AuthConfig {
        bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
    };
    if auth.bearer_token.is_none() {
        warn!("gateway has no bearer token configured, API is open");
    }
    let app = router(state, auth);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AtendenteError::Transport {
            message: format!("failed to bind gateway to {addr}"),
            source: Some(Box::new(e)),
        })?;
    info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| AtendenteError::Transport {
            message: "gateway server error".into(),
            source: Some(Box::new(e)),
        })?;

    info!("gateway stopped");
    Ok(())
}
