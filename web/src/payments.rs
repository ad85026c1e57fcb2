//! Rent payments: landlord-recorded cash/bank, tenant-initiated mobile
//! money, and settlement of pending gateway payments.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{NaiveDate, Utc};
use hearth_store::{NewManualPayment, NewMomoPayment};
use letting::{stats::Month, Payment, PaymentMethod, PaymentStatus, TenancyStatus};
use porter::Action;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{require_requested_with, AuthSession};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentBody {
    pub amount: i64,
    pub method: String,
    #[serde(rename = "paidOn")]
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MomoPaymentBody {
    pub amount: i64,
    /// Payer MSISDN passed through to the gateway.
    pub phone: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SettleBody {
    /// `confirmed` or `failed`. Omitted means "poll the gateway".
    pub outcome: Option<String>,
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status_code: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn parse_month(raw: Option<String>) -> Result<Option<Month>, AppError> {
    raw.map(|m| m.parse::<Month>())
        .transpose()
        .map_err(|e| bad_request(e.to_string()))
}

pub async fn list_payments(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<ListPaymentsQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    let month = parse_month(query.month)?;
    let scope = session.scope();
    let payments = state
        .with_store(move |store| store.list_payments(&scope, month.as_ref()))
        .await?;
    Ok(Json(payments))
}

pub async fn payments_for_tenancy(
    State(state): State<AppState>,
    session: AuthSession,
    Path(tenancy_id): Path<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    let scope = session.scope();
    let payments = state
        .with_store(move |store| store.payments_for_tenancy(&scope, tenancy_id))
        .await?;
    Ok(Json(payments))
}

#[axum::debug_handler]
pub async fn record_payment(
    State(state): State<AppState>,
    session: AuthSession,
    Path(tenancy_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<RecordPaymentBody>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    require_requested_with(&headers)?;
    session.require(Action::RecordPayment)?;

    let method: PaymentMethod = body
        .method
        .parse()
        .map_err(|e: letting::UnknownVariant| bad_request(e.to_string()))?;
    if method == PaymentMethod::Momo {
        return Err(bad_request(
            "momo payments are initiated by the tenant, not recorded here",
        ));
    }
    if body.amount <= 0 {
        return Err(bad_request("amount must be positive"));
    }

    let new = NewManualPayment {
        tenancy_id,
        amount: body.amount,
        method,
        paid_on: body.paid_on.unwrap_or_else(|| Utc::now().date_naive()),
    };
    let landlord = session.profile_id;
    let payment = state
        .with_store(move |store| store.record_payment(landlord, new))
        .await?;
    info!(payment = %payment.id, tenancy = %tenancy_id, amount = payment.amount, "payment recorded");
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Tenant kicks off a mobile-money request-to-pay for their own active
/// tenancy. The pending payment is stored under the gateway reference;
/// the landlord settles it later, by hand or by polling the gateway.
#[axum::debug_handler]
pub async fn initiate_momo_payment(
    State(state): State<AppState>,
    session: AuthSession,
    Path(tenancy_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<MomoPaymentBody>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    require_requested_with(&headers)?;
    session.require(Action::InitiateMomoPayment)?;

    if body.amount <= 0 {
        return Err(bad_request("amount must be positive"));
    }
    let phone = body.phone.trim().to_string();
    if phone.is_empty() {
        return Err(bad_request("phone must not be empty"));
    }

    // Visibility and liveness checks before touching the gateway.
    let scope = session.scope();
    let detail = state
        .with_store(move |store| store.tenancy_by_id(&scope, tenancy_id))
        .await?;
    if detail.tenancy.status != TenancyStatus::Active {
        return Err(AppError {
            status_code: StatusCode::CONFLICT,
            message: "tenancy is not active".to_string(),
        });
    }

    let Some(client) = state.momo.clone() else {
        return Err(AppError {
            status_code: StatusCode::BAD_GATEWAY,
            message: "mobile money gateway is not configured".to_string(),
        });
    };

    let reference = Uuid::new_v4();
    let note = body
        .note
        .unwrap_or_else(|| format!("rent for {}", detail.unit.label));
    client
        .request_to_pay(reference, body.amount, &phone, &note)
        .await
        .map_err(|e| {
            error!(tenancy = %tenancy_id, "momo request-to-pay failed: {}", e);
            AppError {
                status_code: StatusCode::BAD_GATEWAY,
                message: format!("mobile money gateway: {}", e),
            }
        })?;

    let new = NewMomoPayment {
        tenancy_id,
        amount: body.amount,
        reference: reference.to_string(),
    };
    let tenant = session.profile_id;
    let payment = state
        .with_store(move |store| store.initiate_momo_payment(tenant, new))
        .await?;
    info!(payment = %payment.id, %reference, "momo payment initiated");
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Settle a pending payment. With an explicit `outcome` the landlord
/// confirms or fails it directly; without one the gateway is polled for
/// the payment's reference and its answer applied.
#[axum::debug_handler]
pub async fn settle_payment(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SettleBody>,
) -> AppResult<Json<Payment>> {
    require_requested_with(&headers)?;
    session.require(Action::SettlePayment)?;

    let landlord = session.profile_id;
    let outcome = match body.outcome {
        Some(raw) => raw
            .parse::<PaymentStatus>()
            .map_err(|e: letting::UnknownVariant| bad_request(e.to_string()))?,
        None => poll_gateway_outcome(&state, &session, id).await?,
    };

    let payment = state
        .with_store(move |store| store.settle_payment(landlord, id, outcome))
        .await?;
    info!(payment = %payment.id, status = %payment.status, "payment settled");
    Ok(Json(payment))
}

async fn poll_gateway_outcome(
    state: &AppState,
    session: &AuthSession,
    payment_id: Uuid,
) -> Result<PaymentStatus, AppError> {
    let scope = session.scope();
    let payment = state
        .with_store(move |store| store.payment_by_id(&scope, payment_id))
        .await?;
    let Some(reference) = payment.reference.clone() else {
        return Err(bad_request(
            "payment has no gateway reference; pass an explicit outcome",
        ));
    };
    let Some(client) = state.momo.clone() else {
        return Err(AppError {
            status_code: StatusCode::BAD_GATEWAY,
            message: "mobile money gateway is not configured".to_string(),
        });
    };
    let status = client.payment_status(&reference).await.map_err(|e| {
        error!(payment = %payment_id, "momo status poll failed: {}", e);
        AppError {
            status_code: StatusCode::BAD_GATEWAY,
            message: format!("mobile money gateway: {}", e),
        }
    })?;
    if status == PaymentStatus::Pending {
        return Err(AppError {
            status_code: StatusCode::CONFLICT,
            message: "gateway still reports the payment pending".to_string(),
        });
    }
    Ok(status)
}
