//! Join requests: tenants apply for vacant units, landlords decide.
//!
//! Decisions are first-writer-wins. Repeating the recorded verdict is a
//! 200 no-op; contradicting it is a 409 that reports the recorded state.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hearth_store::NewJoinRequest;
use letting::{DecisionOutcome, JoinRequest, JoinRequestStatus, Verdict};
use porter::Action;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{require_requested_with, AuthSession};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct FileJoinRequestBody {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecideBody {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListJoinRequestsQuery {
    pub status: Option<String>,
}

#[axum::debug_handler]
pub async fn file_join_request(
    State(state): State<AppState>,
    session: AuthSession,
    Path(unit_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<FileJoinRequestBody>,
) -> AppResult<(StatusCode, Json<JoinRequest>)> {
    require_requested_with(&headers)?;
    session.require(Action::FileJoinRequest)?;

    let quota = {
        let mut quotas = state.quotas.lock().map_err(|_| AppError {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error: quota lock poisoned".to_string(),
        })?;
        quotas.allow_and_count(session.profile_id, Action::FileJoinRequest)
    };
    if !quota.allowed {
        warn!(tenant = %session.profile_id, limit = quota.limit, "join request quota exhausted");
        return Err(AppError {
            status_code: StatusCode::TOO_MANY_REQUESTS,
            message: format!(
                "join request quota exhausted ({} per {}s window)",
                quota.limit, quota.window_seconds
            ),
        });
    }

    let new = NewJoinRequest {
        tenant_id: session.profile_id,
        unit_id,
        message: body.message.filter(|m| !m.trim().is_empty()),
    };
    let request = state
        .with_store(move |store| store.file_join_request(new))
        .await?;
    info!(request = %request.id, unit = %unit_id, "join request filed");
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_join_requests(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<ListJoinRequestsQuery>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    let status = query
        .status
        .map(|s| s.parse::<JoinRequestStatus>())
        .transpose()
        .map_err(|e| AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        })?;
    let scope = session.scope();
    let requests = state
        .with_store(move |store| store.list_join_requests(&scope, status))
        .await?;
    Ok(Json(requests))
}

#[axum::debug_handler]
pub async fn approve_join_request(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<DecideBody>,
) -> AppResult<Response> {
    decide(state, session, headers, id, Verdict::Approve, body.note).await
}

#[axum::debug_handler]
pub async fn reject_join_request(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<DecideBody>,
) -> AppResult<Response> {
    decide(state, session, headers, id, Verdict::Reject, body.note).await
}

async fn decide(
    state: AppState,
    session: AuthSession,
    headers: HeaderMap,
    id: Uuid,
    verdict: Verdict,
    note: Option<String>,
) -> AppResult<Response> {
    require_requested_with(&headers)?;
    session.require(Action::DecideJoinRequest)?;

    let landlord = session.profile_id;
    let (request, outcome) = state
        .with_store(move |store| store.decide_join_request(landlord, id, verdict, note.as_deref()))
        .await?;

    let response = match outcome {
        DecisionOutcome::Applied => {
            info!(request = %request.id, status = %request.status, "join request decided");
            (
                StatusCode::OK,
                Json(json!({ "status": "applied", "request": request })),
            )
                .into_response()
        }
        DecisionOutcome::AlreadyApplied => (
            StatusCode::OK,
            Json(json!({ "status": "noop", "request": request })),
        )
            .into_response(),
        DecisionOutcome::Conflict { current } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "join request already resolved",
                "status": current,
                "request": request,
            })),
        )
            .into_response(),
    };
    Ok(response)
}
