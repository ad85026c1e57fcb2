//! Maintenance requests: tenants file them, landlords move them along.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use letting::{MaintenanceRequest, MaintenanceStatus};
use porter::Action;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{require_requested_with, AuthSession};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct FileMaintenanceBody {
    pub summary: String,
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMaintenanceQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceBody {
    pub status: String,
}

#[axum::debug_handler]
pub async fn file_maintenance(
    State(state): State<AppState>,
    session: AuthSession,
    Path(unit_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<FileMaintenanceBody>,
) -> AppResult<(StatusCode, Json<MaintenanceRequest>)> {
    require_requested_with(&headers)?;
    session.require(Action::FileMaintenance)?;

    let summary = body.summary.trim().to_string();
    if summary.is_empty() {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "summary must not be empty".to_string(),
        });
    }

    let quota = {
        let mut quotas = state.quotas.lock().map_err(|_| AppError {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error: quota lock poisoned".to_string(),
        })?;
        quotas.allow_and_count(session.profile_id, Action::FileMaintenance)
    };
    if !quota.allowed {
        warn!(tenant = %session.profile_id, limit = quota.limit, "maintenance quota exhausted");
        return Err(AppError {
            status_code: StatusCode::TOO_MANY_REQUESTS,
            message: format!(
                "maintenance quota exhausted ({} per {}s window)",
                quota.limit, quota.window_seconds
            ),
        });
    }

    let tenant = session.profile_id;
    let detail = body.detail.filter(|d| !d.trim().is_empty());
    let request = state
        .with_store(move |store| store.file_maintenance(tenant, unit_id, &summary, detail))
        .await?;
    info!(request = %request.id, unit = %unit_id, "maintenance request filed");
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_maintenance(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<ListMaintenanceQuery>,
) -> AppResult<Json<Vec<MaintenanceRequest>>> {
    let status = query
        .status
        .map(|s| s.parse::<MaintenanceStatus>())
        .transpose()
        .map_err(|e| AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        })?;
    let scope = session.scope();
    let requests = state
        .with_store(move |store| store.list_maintenance(&scope, status))
        .await?;
    Ok(Json(requests))
}

#[axum::debug_handler]
pub async fn advance_maintenance(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<AdvanceBody>,
) -> AppResult<Json<MaintenanceRequest>> {
    require_requested_with(&headers)?;
    session.require(Action::AdvanceMaintenance)?;

    let to: MaintenanceStatus = body.status.parse().map_err(|e: letting::UnknownVariant| {
        AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }
    })?;
    let landlord = session.profile_id;
    let request = state
        .with_store(move |store| store.advance_maintenance(landlord, id, to))
        .await?;
    info!(request = %request.id, status = %request.status, "maintenance request advanced");
    Ok(Json(request))
}
