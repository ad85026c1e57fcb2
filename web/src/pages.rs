//! Server-rendered pages: login, the role-routed dashboard, and the
//! public vacant-unit listing. Pages authenticate from the
//! `hearth_token` cookie and bounce to the login page when it is
//! missing or stale.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use hearth_store::VacantFilter;
use letting::{stats::Month, JoinRequestStatus, Role};
use tracing::debug;

use crate::auth::{cookie_token, session_from_token};
use crate::units::VacantQuery;
use crate::{AppResult, AppState};

fn render(state: &AppState, template: &str, ctx: &tera::Context) -> AppResult<Html<String>> {
    let body = state.tera.render(template, ctx)?;
    Ok(Html(body))
}

pub async fn login_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    let ctx = tera::Context::new();
    render(&state, "login.html", &ctx)
}

pub async fn dashboard_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let Some(token) = cookie_token(&headers) else {
        return Ok(Redirect::to("/").into_response());
    };
    let session = match session_from_token(&token, &state.auth.jwt_secret) {
        Ok(session) => session,
        Err(_) => {
            debug!("stale dashboard cookie, redirecting to login");
            return Ok(Redirect::to("/").into_response());
        }
    };

    let mut ctx = tera::Context::new();
    ctx.insert("name", &session.name);
    ctx.insert("role", &session.role.to_string());

    let scope = session.scope();
    match session.role {
        Role::Landlord => {
            let landlord = session.profile_id;
            let month = Month::current();
            let stats = state
                .with_store(move |store| store.portfolio_stats(landlord, &month))
                .await?;
            let properties = state
                .with_store(move |store| store.list_properties(&scope))
                .await?;
            let pending = state
                .with_store(move |store| {
                    store.list_join_requests(&scope, Some(JoinRequestStatus::Pending))
                })
                .await?;
            let maintenance = state
                .with_store(move |store| store.list_maintenance(&scope, None))
                .await?;
            ctx.insert("stats", &stats);
            ctx.insert("properties", &properties);
            ctx.insert("pending_requests", &pending);
            ctx.insert("maintenance", &maintenance);
        }
        Role::Tenant => {
            let tenancies = state
                .with_store(move |store| store.list_tenancies(&scope))
                .await?;
            let payments = state
                .with_store(move |store| store.list_payments(&scope, None))
                .await?;
            let requests = state
                .with_store(move |store| store.list_join_requests(&scope, None))
                .await?;
            let maintenance = state
                .with_store(move |store| store.list_maintenance(&scope, None))
                .await?;
            ctx.insert("tenancies", &tenancies);
            ctx.insert("payments", &payments);
            ctx.insert("join_requests", &requests);
            ctx.insert("maintenance", &maintenance);
        }
        Role::Admin => {
            let month = Month::current();
            let stats = state
                .with_store(move |store| store.platform_stats(&month))
                .await?;
            ctx.insert("stats", &stats);
        }
    }

    Ok(render(&state, "dashboard.html", &ctx)?.into_response())
}

/// Public listing; no session needed to window-shop vacant units.
pub async fn browse_page(
    State(state): State<AppState>,
    Query(query): Query<VacantQuery>,
) -> AppResult<Html<String>> {
    let filter = VacantFilter {
        min_rent: query.min_rent,
        max_rent: query.max_rent,
        property_id: query.property_id,
        query: query.q.clone().filter(|q| !q.trim().is_empty()),
    };
    let listings = state
        .with_store(move |store| store.browse_vacant(&filter))
        .await?;

    let mut ctx = tera::Context::new();
    ctx.insert("listings", &listings);
    ctx.insert("q", &query.q.unwrap_or_default());
    ctx.insert("min_rent", &query.min_rent);
    ctx.insert("max_rent", &query.max_rent);
    render(&state, "browse.html", &ctx)
}
