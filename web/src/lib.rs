// Library interface for hearth-web

pub mod auth;
pub mod join_requests;
pub mod maintenance;
pub mod momo;
pub mod pages;
pub mod payments;
pub mod properties;
pub mod stats;
pub mod stream;
pub mod tenancies;
pub mod units;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::{
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hearth_store::{Store, StoreError};
use porter::{Action, QuotaKernel};
use serde_json::json;
use settings::Settings;
use tera::Tera;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tera: Tera,
    pub auth: settings::AuthSettings,
    pub quotas: Arc<Mutex<QuotaKernel>>,
    pub momo: Option<momo::MomoClient>,
}

impl AppState {
    pub fn new(settings: &Settings, store: Store) -> Result<Self> {
        // Load templates using crate-absolute path for deterministic resolution
        let tpl_glob = format!("{}/templates/**/*.html", env!("CARGO_MANIFEST_DIR"));
        let mut tera =
            Tera::new(&tpl_glob).with_context(|| format!("parsing Tera templates ({tpl_glob})"))?;

        // Register JSON filters for template rendering (`json` and `tojson` aliases)
        let tojson = |value: &tera::Value,
                      _: &std::collections::HashMap<String, tera::Value>|
         -> tera::Result<tera::Value> {
            match serde_json::to_string_pretty(value) {
                Ok(json_string) => Ok(tera::Value::String(json_string)),
                Err(e) => Err(tera::Error::msg(format!(
                    "Failed to serialize to JSON: {}",
                    e
                ))),
            }
        };
        tera.register_filter("json", tojson);
        tera.register_filter("tojson", tojson);

        let quotas = QuotaKernel::new()
            .with_limit(
                Action::FileJoinRequest,
                settings.quotas.join_requests,
                settings.quotas.window,
            )
            .with_limit(
                Action::FileMaintenance,
                settings.quotas.maintenance,
                settings.quotas.window,
            );

        let momo = settings
            .momo
            .enabled
            .then(|| momo::MomoClient::new(&settings.momo));

        Ok(Self {
            store,
            tera,
            auth: settings.auth.clone(),
            quotas: Arc::new(Mutex::new(quotas)),
            momo,
        })
    }

    /// Run a synchronous store call on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| AppError {
                status_code: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Internal server error: store task failed: {}", e),
            })?;
        result.map_err(AppError::from)
    }
}

// Custom error type for better error handling
#[derive(Debug)]
pub struct AppError {
    pub status_code: StatusCode,
    pub message: String,
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Internal server error: {}", err),
        }
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Template rendering error: {}", err),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status_code = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Denied(_) => StatusCode::FORBIDDEN,
            StoreError::Sqlite(_) | StoreError::LockPoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            format!("Internal server error: {}", err)
        } else {
            err.to_string()
        };
        AppError {
            status_code,
            message,
        }
    }
}

impl From<porter::PorterError> for AppError {
    fn from(err: porter::PorterError) -> Self {
        AppError {
            status_code: StatusCode::FORBIDDEN,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// Health check endpoint
async fn health() -> impl IntoResponse {
    "OK"
}

// Fallback handler for 404s: JSON under /api, a small HTML page elsewhere
async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/api/") {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response();
    }
    (
        StatusCode::NOT_FOUND,
        Html(
            r#"
<!DOCTYPE html>
<html>
<head>
    <title>404 - Not Found</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        .error { color: #d32f2f; }
    </style>
</head>
<body>
    <h1 class="error">404 - Page Not Found</h1>
    <p><a href="/">&larr; Back to Hearth</a></p>
</body>
</html>
    "#,
        ),
    )
        .into_response()
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        // HTML pages
        .route("/", get(pages::login_page))
        .route("/dashboard", get(pages::dashboard_page))
        .route("/browse", get(pages::browse_page))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        // Properties
        .route(
            "/api/properties",
            get(properties::list_properties).post(properties::create_property),
        )
        .route(
            "/api/properties/:id",
            get(properties::get_property).put(properties::update_property),
        )
        .route(
            "/api/properties/:id/units",
            get(units::list_units).post(units::create_unit),
        )
        // Units
        .route("/api/units/vacant", get(units::browse_vacant))
        .route(
            "/api/units/:id",
            get(units::get_unit).patch(units::update_unit),
        )
        .route(
            "/api/units/:id/join-requests",
            post(join_requests::file_join_request),
        )
        .route(
            "/api/units/:id/maintenance",
            post(maintenance::file_maintenance),
        )
        // Join requests
        .route("/api/join-requests", get(join_requests::list_join_requests))
        .route(
            "/api/join-requests/:id/approve",
            post(join_requests::approve_join_request),
        )
        .route(
            "/api/join-requests/:id/reject",
            post(join_requests::reject_join_request),
        )
        // Tenancies
        .route("/api/tenancies", get(tenancies::list_tenancies))
        .route("/api/tenancies/:id", get(tenancies::get_tenancy))
        .route("/api/tenancies/:id/end", post(tenancies::end_tenancy))
        .route(
            "/api/tenancies/:id/payments",
            get(payments::payments_for_tenancy).post(payments::record_payment),
        )
        .route(
            "/api/tenancies/:id/payments/momo",
            post(payments::initiate_momo_payment),
        )
        // Payments
        .route("/api/payments", get(payments::list_payments))
        .route("/api/payments/:id/settle", post(payments::settle_payment))
        // Maintenance
        .route("/api/maintenance", get(maintenance::list_maintenance))
        .route(
            "/api/maintenance/:id/status",
            post(maintenance::advance_maintenance),
        )
        // Stats
        .route("/api/stats/portfolio", get(stats::portfolio_stats))
        .route("/api/stats/platform", get(stats::platform_stats))
        // Change feed
        .route("/api/events/stream", get(stream::events_stream))
        .fallback(not_found)
        // Bearer tokens ride the Authorization header; keep headers out of spans.
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new()))
        .with_state(state)
}
