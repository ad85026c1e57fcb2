use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a status or role string from the wire or the
/// database does not name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $( $name::$variant => $text, )+
                };
                write!(f, "{}", s)
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Platform role carried in the profile row and the JWT `role` claim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tenant,
    Landlord,
    Admin,
}

text_enum!(Role, "role", {
    Tenant => "tenant",
    Landlord => "landlord",
    Admin => "admin",
});

/// A registered user. The argon2 credential hash lives in its own column
/// and is never part of this struct, so a profile can always be serialized
/// straight onto the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A building or compound owned by one landlord.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    #[serde(rename = "landlordId")]
    pub landlord_id: Uuid,
    pub name: String,
    pub address: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyStatus {
    Vacant,
    Occupied,
}

text_enum!(OccupancyStatus, "occupancy status", {
    Vacant => "vacant",
    Occupied => "occupied",
});

/// A lettable unit inside a property. `occupancy` tracks whether an
/// active tenancy references the unit; the store keeps the two in step
/// inside the same transaction that creates or ends a tenancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    #[serde(rename = "propertyId")]
    pub property_id: Uuid,
    pub label: String,
    #[serde(rename = "rentAmount")]
    pub rent_amount: i64,
    pub occupancy: OccupancyStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TenancyStatus {
    Active,
    Ended,
}

text_enum!(TenancyStatus, "tenancy status", {
    Active => "active",
    Ended => "ended",
});

/// An active or historical lease linking a tenant to a unit. The rent
/// amount is copied from the unit at approval time so later rent edits do
/// not rewrite running leases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenancy {
    pub id: Uuid,
    #[serde(rename = "unitId")]
    pub unit_id: Uuid,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(rename = "rentAmount")]
    pub rent_amount: i64,
    #[serde(rename = "startedOn")]
    pub started_on: NaiveDate,
    #[serde(rename = "endedOn", skip_serializing_if = "Option::is_none")]
    pub ended_on: Option<NaiveDate>,
    pub status: TenancyStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Bank,
    Momo,
}

text_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    Bank => "bank",
    Momo => "momo",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Failed => "failed",
});

/// A rent payment against a tenancy. Landlord-recorded cash/bank payments
/// are confirmed on insert; gateway-initiated payments start pending and
/// are settled by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    #[serde(rename = "tenancyId")]
    pub tenancy_id: Uuid,
    pub amount: i64,
    #[serde(rename = "paidOn")]
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "recordedAt")]
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(JoinRequestStatus, "join request status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl JoinRequestStatus {
    /// Approved and rejected are terminal; only pending requests can move.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JoinRequestStatus::Pending)
    }
}

/// A tenant's application to occupy a unit, resolved by the landlord.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: Uuid,
    #[serde(rename = "unitId")]
    pub unit_id: Uuid,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "decidedBy", skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<Uuid>,
    #[serde(rename = "decidedAt", skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(rename = "decisionNote", skip_serializing_if = "Option::is_none")]
    pub decision_note: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Open,
    InProgress,
    Resolved,
}

text_enum!(MaintenanceStatus, "maintenance status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
});

/// A tenant-filed maintenance issue against a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub id: Uuid,
    #[serde(rename = "unitId")]
    pub unit_id: Uuid,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub status: MaintenanceStatus,
    #[serde(rename = "openedAt")]
    pub opened_at: DateTime<Utc>,
    #[serde(rename = "resolvedAt", skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}
