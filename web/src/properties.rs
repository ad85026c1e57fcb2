//! Property CRUD. Reads follow the caller's row scope; writes are
//! landlord-only and owner-checked in the store.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use letting::Property;
use porter::Action;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{require_requested_with, AuthSession};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreatePropertyBody {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePropertyBody {
    pub name: Option<String>,
    pub address: Option<String>,
}

pub async fn list_properties(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<Vec<Property>>> {
    let scope = session.scope();
    let properties = state
        .with_store(move |store| store.list_properties(&scope))
        .await?;
    Ok(Json(properties))
}

#[axum::debug_handler]
pub async fn create_property(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(body): Json<CreatePropertyBody>,
) -> AppResult<(StatusCode, Json<Property>)> {
    require_requested_with(&headers)?;
    session.require(Action::CreateProperty)?;

    let name = body.name.trim().to_string();
    let address = body.address.trim().to_string();
    if name.is_empty() || address.is_empty() {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "name and address must not be empty".to_string(),
        });
    }

    let landlord = session.profile_id;
    let property = state
        .with_store(move |store| store.create_property(landlord, &name, &address))
        .await?;
    info!(property = %property.id, landlord = %landlord, "property created");
    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn get_property(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Property>> {
    let scope = session.scope();
    let property = state
        .with_store(move |store| store.property_by_id(&scope, id))
        .await?;
    Ok(Json(property))
}

#[axum::debug_handler]
pub async fn update_property(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdatePropertyBody>,
) -> AppResult<Json<Property>> {
    require_requested_with(&headers)?;
    session.require(Action::UpdateProperty)?;

    if body.name.is_none() && body.address.is_none() {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "nothing to update".to_string(),
        });
    }
    let landlord = session.profile_id;
    let property = state
        .with_store(move |store| {
            store.update_property(landlord, id, body.name.as_deref(), body.address.as_deref())
        })
        .await?;
    info!(property = %property.id, "property updated");
    Ok(Json(property))
}
