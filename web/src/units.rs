//! Unit CRUD and the vacant-unit search.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use hearth_store::{UnitListing, VacantFilter};
use letting::Unit;
use porter::Action;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{require_requested_with, AuthSession};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateUnitBody {
    pub label: String,
    #[serde(rename = "rentAmount")]
    pub rent_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUnitBody {
    pub label: Option<String>,
    #[serde(rename = "rentAmount")]
    pub rent_amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VacantQuery {
    #[serde(rename = "minRent")]
    pub min_rent: Option<i64>,
    #[serde(rename = "maxRent")]
    pub max_rent: Option<i64>,
    #[serde(rename = "propertyId")]
    pub property_id: Option<Uuid>,
    pub q: Option<String>,
}

pub async fn list_units(
    State(state): State<AppState>,
    session: AuthSession,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Vec<Unit>>> {
    let scope = session.scope();
    let units = state
        .with_store(move |store| store.list_units(&scope, property_id))
        .await?;
    Ok(Json(units))
}

#[axum::debug_handler]
pub async fn create_unit(
    State(state): State<AppState>,
    session: AuthSession,
    Path(property_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CreateUnitBody>,
) -> AppResult<(StatusCode, Json<Unit>)> {
    require_requested_with(&headers)?;
    session.require(Action::CreateUnit)?;

    let label = body.label.trim().to_string();
    if label.is_empty() {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "label must not be empty".to_string(),
        });
    }
    if body.rent_amount < 0 {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "rentAmount must not be negative".to_string(),
        });
    }

    let landlord = session.profile_id;
    let unit = state
        .with_store(move |store| store.create_unit(landlord, property_id, &label, body.rent_amount))
        .await?;
    info!(unit = %unit.id, property = %property_id, "unit created");
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn get_unit(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Unit>> {
    let scope = session.scope();
    let unit = state
        .with_store(move |store| store.unit_by_id(&scope, id))
        .await?;
    Ok(Json(unit))
}

#[axum::debug_handler]
pub async fn update_unit(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdateUnitBody>,
) -> AppResult<Json<Unit>> {
    require_requested_with(&headers)?;
    session.require(Action::UpdateUnit)?;

    if body.label.is_none() && body.rent_amount.is_none() {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "nothing to update".to_string(),
        });
    }
    if body.rent_amount.is_some_and(|rent| rent < 0) {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "rentAmount must not be negative".to_string(),
        });
    }
    let landlord = session.profile_id;
    let unit = state
        .with_store(move |store| {
            store.update_unit(landlord, id, body.label.as_deref(), body.rent_amount)
        })
        .await?;
    info!(unit = %unit.id, "unit updated");
    Ok(Json(unit))
}

/// The public side of the marketplace: every authenticated role can
/// search vacant units across all landlords.
pub async fn browse_vacant(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(query): Query<VacantQuery>,
) -> AppResult<Json<Vec<UnitListing>>> {
    let filter = VacantFilter {
        min_rent: query.min_rent,
        max_rent: query.max_rent,
        property_id: query.property_id,
        query: query.q.filter(|q| !q.trim().is_empty()),
    };
    let listings = state
        .with_store(move |store| store.browse_vacant(&filter))
        .await?;
    Ok(Json(listings))
}
