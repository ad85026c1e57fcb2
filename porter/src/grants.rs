use letting::Role;
use thiserror::Error;

/// Mutating or privileged operations gated by role.
///
/// Admin profiles observe the platform; they hold no domain-mutation
/// grants here, and new admins are minted from the CLI only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateProperty,
    UpdateProperty,
    CreateUnit,
    UpdateUnit,
    FileJoinRequest,
    DecideJoinRequest,
    EndTenancy,
    RecordPayment,
    InitiateMomoPayment,
    SettlePayment,
    FileMaintenance,
    AdvanceMaintenance,
    ViewPortfolioStats,
    ViewPlatformStats,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateProperty => "property.create",
            Action::UpdateProperty => "property.update",
            Action::CreateUnit => "unit.create",
            Action::UpdateUnit => "unit.update",
            Action::FileJoinRequest => "join_request.file",
            Action::DecideJoinRequest => "join_request.decide",
            Action::EndTenancy => "tenancy.end",
            Action::RecordPayment => "payment.record",
            Action::InitiateMomoPayment => "payment.momo",
            Action::SettlePayment => "payment.settle",
            Action::FileMaintenance => "maintenance.file",
            Action::AdvanceMaintenance => "maintenance.advance",
            Action::ViewPortfolioStats => "stats.portfolio",
            Action::ViewPlatformStats => "stats.platform",
        }
    }
}

#[derive(Debug, Error)]
pub enum PorterError {
    #[error("role {role} may not perform {action}")]
    Forbidden { role: Role, action: &'static str },
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    pub reason: &'static str,
}

fn role_allows(role: Role, action: Action) -> bool {
    use Action::*;
    match role {
        Role::Landlord => matches!(
            action,
            CreateProperty
                | UpdateProperty
                | CreateUnit
                | UpdateUnit
                | DecideJoinRequest
                | EndTenancy
                | RecordPayment
                | SettlePayment
                | AdvanceMaintenance
                | ViewPortfolioStats
        ),
        Role::Tenant => matches!(
            action,
            FileJoinRequest | InitiateMomoPayment | FileMaintenance
        ),
        Role::Admin => matches!(action, ViewPlatformStats),
    }
}

/// Role-level capability check. Row ownership is the store's business.
pub fn check(role: Role, action: Action) -> Decision {
    if role_allows(role, action) {
        Decision {
            allowed: true,
            reason: "granted",
        }
    } else {
        Decision {
            allowed: false,
            reason: action.as_str(),
        }
    }
}

pub fn require(role: Role, action: Action) -> Result<(), PorterError> {
    if role_allows(role, action) {
        Ok(())
    } else {
        Err(PorterError::Forbidden {
            role,
            action: action.as_str(),
        })
    }
}
