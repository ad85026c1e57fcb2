//! Dashboard rollups.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use letting::stats::{Month, PlatformStats, PortfolioStats};
use porter::Action;
use serde::Deserialize;

use crate::auth::AuthSession;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub month: Option<String>,
}

fn month_or_current(raw: Option<String>) -> Result<Month, AppError> {
    match raw {
        Some(m) => m.parse::<Month>().map_err(|e| AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }),
        None => Ok(Month::current()),
    }
}

pub async fn portfolio_stats(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<PortfolioStats>> {
    session.require(Action::ViewPortfolioStats)?;
    let month = month_or_current(query.month)?;
    let landlord = session.profile_id;
    let stats = state
        .with_store(move |store| store.portfolio_stats(landlord, &month))
        .await?;
    Ok(Json(stats))
}

pub async fn platform_stats(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<PlatformStats>> {
    session.require(Action::ViewPlatformStats)?;
    let month = month_or_current(query.month)?;
    let stats = state
        .with_store(move |store| store.platform_stats(&month))
        .await?;
    Ok(Json(stats))
}
