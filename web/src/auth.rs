//! Registration, login and the session token.
//!
//! Passwords are stored as Argon2id PHC hashes with an optional
//! server-side pepper. Sessions are HS256 JWTs; API calls carry them in
//! the `Authorization` header, HTML pages and the event stream fall
//! back to the `hearth_token` cookie because `EventSource` cannot set
//! headers.

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use hearth_store::NewProfile;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use letting::{Profile, Role};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

/// JWT claims carried by every session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a signed HS256 session token for a profile.
pub fn issue_token(profile: &Profile, secret: &str, ttl: Duration) -> anyhow::Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: profile.id.to_string(),
        role: profile.role.to_string(),
        name: profile.display_name.clone(),
        iat: now,
        exp: now + ttl.as_secs() as i64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("JWT encode: {e}"))
}

/// Decode and validate a session token.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Hash a password with Argon2id. If `pepper` is set it is prepended
/// to the password before hashing.
pub fn hash_password(password: &str, pepper: Option<&str>) -> anyhow::Result<String> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(input, &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))
}

/// Verify a plaintext password against a stored PHC hash. The pepper
/// must match the one used during hashing.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> anyhow::Result<bool> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("invalid hash format: {e}"))?;
    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("verify error: {e}")),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

pub(crate) fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("Cookie")?.to_str().ok()?;
    raw.split(';')
        .find_map(|part| part.trim().strip_prefix("hearth_token="))
        .map(|v| v.to_string())
}

/// The authenticated caller, decoded from the session token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub profile_id: Uuid,
    pub role: Role,
    pub name: String,
}

impl AuthSession {
    /// The row-visibility scope this caller reads under.
    pub fn scope(&self) -> porter::RowScope {
        porter::RowScope::for_profile(self.role, self.profile_id)
    }

    /// Check the caller's role against the grants table.
    pub fn require(&self, action: porter::Action) -> Result<(), AppError> {
        porter::require(self.role, action).map_err(AppError::from)
    }
}

pub(crate) fn session_from_token(token: &str, secret: &str) -> Result<AuthSession, AppError> {
    let claims = decode_token(token, secret).map_err(|e| {
        warn!("session token validation failed: {}", e);
        AppError {
            status_code: StatusCode::UNAUTHORIZED,
            message: "session token is invalid or expired".to_string(),
        }
    })?;
    let profile_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError {
        status_code: StatusCode::UNAUTHORIZED,
        message: "session token is invalid or expired".to_string(),
    })?;
    let role: Role = claims.role.parse().map_err(|_| AppError {
        status_code: StatusCode::UNAUTHORIZED,
        message: "session token is invalid or expired".to_string(),
    })?;
    Ok(AuthSession {
        profile_id,
        role,
        name: claims.name,
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cookie = cookie_token(&parts.headers);
        let token = bearer_token(&parts.headers)
            .or(cookie.as_deref())
            .ok_or_else(|| AppError {
                status_code: StatusCode::UNAUTHORIZED,
                message: "Authorization header with Bearer token is required".to_string(),
            })?;
        session_from_token(token, &state.auth.jwt_secret)
    }
}

/// CSRF guard for mutating endpoints: the request must carry an
/// `X-Requested-With` header, which browsers will not attach to
/// cross-site form posts.
pub fn require_requested_with(headers: &HeaderMap) -> Result<(), AppError> {
    if headers.get("X-Requested-With").is_none() {
        return Err(AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: "X-Requested-With header required".to_string(),
        });
    }
    Ok(())
}

async fn run_blocking<T: Send + 'static>(
    f: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
) -> AppResult<T> {
    let result = tokio::task::spawn_blocking(f).await.map_err(|e| AppError {
        status_code: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("Internal server error: hashing task failed: {}", e),
    })?;
    result.map_err(AppError::from)
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub phone: Option<String>,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status_code: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterBody>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    require_requested_with(&headers)?;

    let email = body.email.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@').unwrap_or(("", ""));
    if local.is_empty() || domain.is_empty() {
        return Err(bad_request("email looks invalid"));
    }
    if body.password.chars().count() < 8 {
        return Err(bad_request("password must be at least 8 characters"));
    }
    let display_name = body.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(bad_request("displayName must not be empty"));
    }
    let role: Role = body
        .role
        .parse()
        .map_err(|e: letting::UnknownVariant| bad_request(e.to_string()))?;
    if role == Role::Admin {
        return Err(bad_request("admin profiles are provisioned from the CLI"));
    }

    // Argon2 is CPU-bound; keep it off the async workers.
    let pepper = state.auth.pepper.clone();
    let password = body.password;
    let password_hash = run_blocking(move || hash_password(&password, pepper.as_deref())).await?;

    let new = NewProfile {
        email,
        password_hash,
        display_name,
        phone: body.phone.filter(|p| !p.trim().is_empty()),
        role,
    };
    let profile = state.with_store(move |store| store.create_profile(new)).await?;
    info!(profile = %profile.id, role = %profile.role, "profile registered");

    let token = issue_token(&profile, &state.auth.jwt_secret, state.auth.token_ttl)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": token, "profile": profile })),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> AppResult<Json<serde_json::Value>> {
    require_requested_with(&headers)?;

    let email = body.email.trim().to_ascii_lowercase();
    let found = {
        let email = email.clone();
        state
            .with_store(move |store| store.credentials_by_email(&email))
            .await?
    };
    let Some((profile, password_hash)) = found else {
        warn!("login failed: unknown email");
        return Err(AppError {
            status_code: StatusCode::UNAUTHORIZED,
            message: "invalid email or password".to_string(),
        });
    };

    let pepper = state.auth.pepper.clone();
    let password = body.password;
    let matches =
        run_blocking(move || verify_password(&password, &password_hash, pepper.as_deref())).await?;
    if !matches {
        warn!(profile = %profile.id, "login failed: wrong password");
        return Err(AppError {
            status_code: StatusCode::UNAUTHORIZED,
            message: "invalid email or password".to_string(),
        });
    }

    debug!(profile = %profile.id, role = %profile.role, "login succeeded");
    let token = issue_token(&profile, &state.auth.jwt_secret, state.auth.token_ttl)?;
    Ok(Json(json!({ "token": token, "profile": profile })))
}
