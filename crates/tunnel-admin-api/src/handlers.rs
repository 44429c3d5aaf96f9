use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tunnel_admin_proto::{
    TunnelUpdate, TunnelUpdateRequest, ValidationError, Violation, BODY_FIELD,
};

use crate::models::*;
use crate::store::UpdateError;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn validation_failed(err: ValidationError) -> ApiError {
    warn!("Rejected tunnel update: {}", err);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "Tunnel update failed validation".to_string(),
            code: Some("VALIDATION_FAILED".to_string()),
            violations: Some(err.into_violations()),
        }),
    )
}

/// Validate an update body; unreadable JSON is reported like any other violation
fn read_update(body: Result<Json<Value>, JsonRejection>) -> Result<TunnelUpdate, ApiError> {
    let Json(value) = body.map_err(|rejection| {
        validation_failed(ValidationError::new(vec![Violation::new(
            BODY_FIELD,
            rejection.body_text(),
        )]))
    })?;

    debug!("Update request: {}", value);

    TunnelUpdateRequest::validate_json(value).map_err(validation_failed)
}

fn update_failed(err: UpdateError) -> ApiError {
    warn!("Tunnel update not applied: {}", err);
    let (status, code) = match err {
        UpdateError::TunnelNotFound(_) => (StatusCode::NOT_FOUND, "TUNNEL_NOT_FOUND"),
        UpdateError::UnknownNode(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNKNOWN_NODE"),
    };
    (status, Json(ErrorResponse::new(err.to_string(), code)))
}

fn tunnel_not_found(id: i64) -> ApiError {
    update_failed(UpdateError::TunnelNotFound(id))
}

/// Update an existing tunnel
#[utoipa::path(
    post,
    path = "/api/tunnels/update",
    request_body = TunnelUpdateRequest,
    responses(
        (status = 200, description = "Tunnel updated", body = TunnelConfig),
        (status = 400, description = "Payload failed validation", body = ErrorResponse),
        (status = 404, description = "Tunnel not found", body = ErrorResponse),
        (status = 422, description = "Referenced node is not registered", body = ErrorResponse)
    ),
    tag = "tunnels"
)]
pub async fn update_tunnel(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TunnelConfig>, ApiError> {
    let update = read_update(body)?;
    let id = update.id;

    let tunnel = state
        .updater
        .update_tunnel(update)
        .await
        .map_err(update_failed)?;

    info!("Updated tunnel {} ({})", id, tunnel.name);
    Ok(Json(tunnel))
}

/// Validate an update without applying it
#[utoipa::path(
    post,
    path = "/api/tunnels/validate",
    request_body = TunnelUpdateRequest,
    responses(
        (status = 200, description = "Normalized update", body = TunnelUpdate),
        (status = 400, description = "Payload failed validation", body = ErrorResponse)
    ),
    tag = "tunnels"
)]
pub async fn validate_tunnel_update(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TunnelUpdate>, ApiError> {
    read_update(body).map(Json)
}

/// List all tunnels
#[utoipa::path(
    get,
    path = "/api/tunnels",
    responses(
        (status = 200, description = "List of tunnels", body = TunnelList)
    ),
    tag = "tunnels"
)]
pub async fn list_tunnels(State(state): State<Arc<AppState>>) -> Json<TunnelList> {
    debug!("Listing tunnels");

    let tunnels = state.updater.list_tunnels().await;
    let total = tunnels.len();

    Json(TunnelList { tunnels, total })
}

/// Get a specific tunnel by ID
#[utoipa::path(
    get,
    path = "/api/tunnels/{id}",
    params(
        ("id" = i64, Path, description = "Tunnel ID")
    ),
    responses(
        (status = 200, description = "Tunnel configuration", body = TunnelConfig),
        (status = 404, description = "Tunnel not found", body = ErrorResponse)
    ),
    tag = "tunnels"
)]
pub async fn get_tunnel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TunnelConfig>, ApiError> {
    debug!("Getting tunnel: {}", id);

    state
        .updater
        .get_tunnel(id)
        .await
        .map(Json)
        .ok_or_else(|| tunnel_not_found(id))
}

/// List the nodes bound to a tunnel with their role and hop
#[utoipa::path(
    get,
    path = "/api/tunnels/{id}/nodes",
    params(
        ("id" = i64, Path, description = "Tunnel ID")
    ),
    responses(
        (status = 200, description = "Node bindings", body = Vec<TunnelNodeBinding>),
        (status = 404, description = "Tunnel not found", body = ErrorResponse)
    ),
    tag = "tunnels"
)]
pub async fn get_tunnel_nodes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TunnelNodeBinding>>, ApiError> {
    debug!("Getting node bindings for tunnel: {}", id);

    state
        .updater
        .get_tunnel(id)
        .await
        .map(|tunnel| Json(tunnel.bindings()))
        .ok_or_else(|| tunnel_not_found(id))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
