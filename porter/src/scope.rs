use letting::Role;
use uuid::Uuid;

/// The set of rows a profile may see. The store compiles this into SQL
/// predicates; `All` is reserved for admins and internal jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    /// Every row. Admin reads and trusted internal callers.
    All,
    /// Rows reachable from properties owned by this landlord.
    Landlord(Uuid),
    /// Rows filed by or belonging to this tenant's tenancies.
    Tenant(Uuid),
}

impl RowScope {
    /// Read scope for an authenticated profile.
    pub fn for_profile(role: Role, profile_id: Uuid) -> Self {
        match role {
            Role::Admin => RowScope::All,
            Role::Landlord => RowScope::Landlord(profile_id),
            Role::Tenant => RowScope::Tenant(profile_id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, RowScope::All)
    }

    pub fn landlord_id(&self) -> Option<Uuid> {
        match self {
            RowScope::Landlord(id) => Some(*id),
            _ => None,
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            RowScope::Tenant(id) => Some(*id),
            _ => None,
        }
    }
}
