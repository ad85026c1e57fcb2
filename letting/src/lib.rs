//! Domain model for the Hearth letting platform.
//!
//! Entities, status enums, and the pure lifecycle rules the store enforces
//! transactionally. Nothing in this crate touches I/O; it exists so the
//! persistence and HTTP layers agree on one vocabulary.

pub mod lifecycle;
pub mod model;
pub mod stats;

pub use lifecycle::{DecisionOutcome, Verdict};
pub use model::{
    JoinRequest, JoinRequestStatus, MaintenanceRequest, MaintenanceStatus, OccupancyStatus,
    Payment, PaymentMethod, PaymentStatus, Profile, Property, Role, Tenancy, TenancyStatus, Unit,
    UnknownVariant,
};
pub use stats::{Month, PlatformStats, PortfolioStats};
