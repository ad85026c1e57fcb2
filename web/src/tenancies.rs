//! Tenancy listing, detail and ending.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{NaiveDate, Utc};
use hearth_store::TenancyDetail;
use letting::Tenancy;
use porter::Action;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{require_requested_with, AuthSession};
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize, Default)]
pub struct EndTenancyBody {
    #[serde(rename = "endedOn")]
    pub ended_on: Option<NaiveDate>,
}

pub async fn list_tenancies(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<Vec<Tenancy>>> {
    let scope = session.scope();
    let tenancies = state
        .with_store(move |store| store.list_tenancies(&scope))
        .await?;
    Ok(Json(tenancies))
}

pub async fn get_tenancy(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TenancyDetail>> {
    let scope = session.scope();
    let detail = state
        .with_store(move |store| store.tenancy_by_id(&scope, id))
        .await?;
    Ok(Json(detail))
}

#[axum::debug_handler]
pub async fn end_tenancy(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<EndTenancyBody>,
) -> AppResult<Json<Tenancy>> {
    require_requested_with(&headers)?;
    session.require(Action::EndTenancy)?;

    let ended_on = body.ended_on.unwrap_or_else(|| Utc::now().date_naive());
    let landlord = session.profile_id;
    let tenancy = state
        .with_store(move |store| store.end_tenancy(landlord, id, ended_on))
        .await?;
    info!(tenancy = %tenancy.id, %ended_on, "tenancy ended");
    Ok(Json(tenancy))
}
