//! Client for the MTN MoMo sandbox collection API.
//!
//! Two calls only: request-to-pay initiation and the status poll. The
//! access token is fetched per call with basic auth from the API user
//! and key; the subscription key rides every request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use letting::PaymentStatus;
use serde::Deserialize;
use settings::MomoSettings;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MomoError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway refused ({status}): {body}")]
    Refused {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Clone)]
pub struct MomoClient {
    http: reqwest::Client,
    base_url: String,
    currency: String,
    target_env: String,
    subscription_key: String,
    api_user: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

fn basic_credentials(user: &str, key: &str) -> String {
    STANDARD.encode(format!("{user}:{key}"))
}

/// The gateway reports SUCCESSFUL/FAILED/PENDING plus a few terminal
/// rejection states; anything unrecognized stays pending.
fn map_gateway_status(raw: &str) -> PaymentStatus {
    match raw {
        "SUCCESSFUL" => PaymentStatus::Confirmed,
        "FAILED" | "REJECTED" | "TIMEOUT" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

impl MomoClient {
    pub fn new(settings: &MomoSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            currency: settings.currency.clone(),
            target_env: settings.target_env.clone(),
            subscription_key: settings.subscription_key.clone(),
            api_user: settings.api_user.clone(),
            api_key: settings.api_key.clone(),
        }
    }

    async fn access_token(&self) -> Result<String, MomoError> {
        let credentials = basic_credentials(&self.api_user, &self.api_key);
        let resp = self
            .http
            .post(format!("{}/collection/token/", self.base_url))
            .header("Authorization", format!("Basic {credentials}"))
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MomoError::Refused { status, body });
        }
        let token: TokenResponse = resp.json().await?;
        Ok(token.access_token)
    }

    /// Ask the gateway to pull `amount` from the payer's wallet. The
    /// reference becomes `X-Reference-Id` and is how the payment is
    /// looked up afterwards.
    pub async fn request_to_pay(
        &self,
        reference: Uuid,
        amount: i64,
        payer_phone: &str,
        note: &str,
    ) -> Result<(), MomoError> {
        let token = self.access_token().await?;
        let payload = serde_json::json!({
            "amount": amount.to_string(),
            "currency": self.currency,
            "externalId": reference.to_string(),
            "payer": { "partyIdType": "MSISDN", "partyId": payer_phone },
            "payerMessage": note,
            "payeeNote": note,
        });
        let resp = self
            .http
            .post(format!("{}/collection/v1_0/requesttopay", self.base_url))
            .bearer_auth(&token)
            .header("X-Reference-Id", reference.to_string())
            .header("X-Target-Environment", &self.target_env)
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MomoError::Refused { status, body });
        }
        debug!(%reference, amount, "request-to-pay accepted");
        Ok(())
    }

    /// Poll the gateway for a request-to-pay by its reference.
    pub async fn payment_status(&self, reference: &str) -> Result<PaymentStatus, MomoError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!(
                "{}/collection/v1_0/requesttopay/{}",
                self.base_url, reference
            ))
            .bearer_auth(&token)
            .header("X-Target-Environment", &self.target_env)
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MomoError::Refused { status, body });
        }
        let parsed: StatusResponse = resp.json().await?;
        debug!(%reference, gateway_status = %parsed.status, "request-to-pay status");
        Ok(map_gateway_status(&parsed.status))
    }
}
