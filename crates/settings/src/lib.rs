//! Layered configuration for Hearth services.
//!
//! Settings are assembled from three layers, later layers winning:
//! compiled defaults, an optional YAML file (`HEARTH_CONFIG` or
//! `./hearth.yaml`), and `HEARTH_*` / well-known environment overrides.
//! String values of the form `${env://VAR}` are resolved from the
//! environment before deserialization so secrets never live in files.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Matches a whole-string environment reference: `${env://VAR}`.
static ENV_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{env://([A-Za-z_][A-Za-z0-9_]*)\}$").unwrap());

const DEFAULT_CONFIG_FILE: &str = "hearth.yaml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("environment variable {var} referenced by ${{env://{var}}} is not set")]
    MissingEnv { var: String },
    #[error("invalid override {var}: {reason}")]
    InvalidOverride { var: String, reason: String },
    #[error("invalid configuration: {}", issues.join("; "))]
    Invalid { issues: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub quotas: QuotaSettings,
    #[serde(default)]
    pub momo: MomoSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AuthSettings {
    /// HS256 signing secret. No compiled default; must come from the
    /// file or the `JWT_SECRET` environment variable.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl", with = "duration_str")]
    pub token_ttl: Duration,
    /// Optional server-side pepper mixed into password hashes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pepper: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QuotaSettings {
    /// Join requests a tenant may file per window.
    #[serde(default = "default_join_quota")]
    pub join_requests: u32,
    /// Maintenance requests a tenant may file per window.
    #[serde(default = "default_maintenance_quota")]
    pub maintenance: u32,
    #[serde(default = "default_quota_window", with = "duration_str")]
    pub window: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MomoSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_momo_base_url")]
    pub base_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_target_env")]
    pub target_env: String,
    #[serde(default)]
    pub subscription_key: String,
    #[serde(default)]
    pub api_user: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

fn default_db_path() -> PathBuf {
    PathBuf::from("hearth.db")
}

fn default_token_ttl() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

fn default_join_quota() -> u32 {
    5
}

fn default_maintenance_quota() -> u32 {
    10
}

fn default_quota_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_momo_base_url() -> String {
    "https://sandbox.momodeveloper.mtn.com".to_string()
}

fn default_currency() -> String {
    "UGX".to_string()
}

fn default_target_env() -> String {
    "sandbox".to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl: default_token_ttl(),
            pepper: None,
        }
    }
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            join_requests: default_join_quota(),
            maintenance: default_maintenance_quota(),
            window: default_quota_window(),
        }
    }
}

impl Default for MomoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_momo_base_url(),
            currency: default_currency(),
            target_env: default_target_env(),
            subscription_key: String::new(),
            api_user: String::new(),
            api_key: String::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            database: DatabaseSettings::default(),
            auth: AuthSettings::default(),
            quotas: QuotaSettings::default(),
            momo: MomoSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the discovered config file (if any), apply
    /// environment overrides, and validate the result.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match discover_config_path() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::parse_file(&path)?
            }
            None => Settings::default(),
        };
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from an explicit file, apply environment overrides, validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let mut settings = Self::parse_file(path.as_ref())?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    fn parse_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse a YAML document, resolving `${env://VAR}` references first.
    pub fn from_yaml(raw: &str) -> Result<Self, SettingsError> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(raw)?;
        resolve_env_refs(&mut value)?;
        Ok(serde_yaml::from_value(value)?)
    }

    /// Apply well-known environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), SettingsError> {
        if let Ok(bind) = env::var("BIND_ADDR") {
            self.http.bind = bind;
        }
        if let Ok(port) = env::var("PORT") {
            self.http.port = port.parse().map_err(|_| SettingsError::InvalidOverride {
                var: "PORT".to_string(),
                reason: format!("expected a port number, got {port:?}"),
            })?;
        }
        if let Ok(path) = env::var("HEARTH_DB") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(secret) = env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(ttl) = env::var("HEARTH_TOKEN_TTL") {
            self.auth.token_ttl =
                humantime::parse_duration(&ttl).map_err(|e| SettingsError::InvalidOverride {
                    var: "HEARTH_TOKEN_TTL".to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Ok(pepper) = env::var("HEARTH_PEPPER") {
            self.auth.pepper = Some(pepper);
        }
        Ok(())
    }

    /// Validate the assembled settings, reporting every problem at once.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut issues = Vec::new();
        if self.http.bind.trim().is_empty() {
            issues.push("http.bind must not be empty".to_string());
        }
        if self.http.port == 0 {
            issues.push("http.port must be non-zero".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            issues.push("database.path must not be empty".to_string());
        }
        if self.auth.jwt_secret.len() < 32 {
            issues.push(
                "auth.jwt_secret must be at least 32 bytes (set JWT_SECRET or auth.jwt_secret)"
                    .to_string(),
            );
        }
        if self.auth.token_ttl.is_zero() {
            issues.push("auth.token_ttl must be positive".to_string());
        }
        if self.quotas.join_requests == 0 {
            issues.push("quotas.join_requests must be positive".to_string());
        }
        if self.quotas.maintenance == 0 {
            issues.push("quotas.maintenance must be positive".to_string());
        }
        if self.quotas.window.is_zero() {
            issues.push("quotas.window must be positive".to_string());
        }
        if self.momo.enabled {
            if self.momo.base_url.trim().is_empty() {
                issues.push("momo.base_url must not be empty when momo is enabled".to_string());
            }
            if self.momo.subscription_key.is_empty()
                || self.momo.api_user.is_empty()
                || self.momo.api_key.is_empty()
            {
                issues.push(
                    "momo requires subscription_key, api_user and api_key when enabled"
                        .to_string(),
                );
            }
            if self.momo.currency.trim().is_empty() {
                issues.push("momo.currency must not be empty".to_string());
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Invalid { issues })
        }
    }

    /// Serialize for startup logging with secret-bearing values masked.
    pub fn redacted(&self) -> serde_yaml::Value {
        let mut value = serde_yaml::to_value(self).unwrap_or(serde_yaml::Value::Null);
        redact_in_place(&mut value);
        value
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_yaml::to_string(&self.redacted()) {
            Ok(s) => f.write_str(s.trim_end()),
            Err(_) => f.write_str("<unprintable settings>"),
        }
    }
}

/// Locate the config file: `HEARTH_CONFIG` wins, else `./hearth.yaml`
/// when present, else no file.
fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("HEARTH_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

/// Walk a YAML tree and replace `${env://VAR}` string scalars with the
/// named environment variable's value.
fn resolve_env_refs(value: &mut serde_yaml::Value) -> Result<(), SettingsError> {
    match value {
        serde_yaml::Value::String(s) => {
            if let Some(caps) = ENV_REF_RE.captures(s) {
                let var = caps[1].to_string();
                match env::var(&var) {
                    Ok(resolved) => *s = resolved,
                    Err(_) => return Err(SettingsError::MissingEnv { var }),
                }
            }
            Ok(())
        }
        serde_yaml::Value::Mapping(map) => {
            for (_k, v) in map.iter_mut() {
                resolve_env_refs(v)?;
            }
            Ok(())
        }
        serde_yaml::Value::Sequence(seq) => {
            for v in seq.iter_mut() {
                resolve_env_refs(v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn redact_in_place(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map.iter_mut() {
                let sensitive = k
                    .as_str()
                    .map(|k| {
                        let k = k.to_ascii_lowercase();
                        k.contains("secret") || k.contains("key") || k.contains("pepper")
                    })
                    .unwrap_or(false);
                if sensitive {
                    if let serde_yaml::Value::String(s) = v {
                        if !s.is_empty() {
                            *s = "***".to_string();
                        }
                    }
                } else {
                    redact_in_place(v);
                }
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for v in seq.iter_mut() {
                redact_in_place(v);
            }
        }
        _ => {}
    }
}

/// Serde adapter for humantime duration strings (`12h`, `30m`, `90s`).
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(de)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
