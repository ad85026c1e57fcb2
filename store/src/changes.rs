use porter::RowScope;
use serde::Serialize;
use uuid::Uuid;

/// A hint that a row changed. Carries identity and scope keys only;
/// consumers re-run their queries rather than patching state from the
/// event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub entity: &'static str,
    pub op: &'static str,
    pub id: Uuid,
    #[serde(rename = "landlordId", skip_serializing_if = "Option::is_none")]
    pub landlord_id: Option<Uuid>,
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn new(entity: &'static str, op: &'static str, id: Uuid) -> Self {
        Self {
            entity,
            op,
            id,
            landlord_id: None,
            tenant_id: None,
        }
    }

    pub fn landlord(mut self, id: Uuid) -> Self {
        self.landlord_id = Some(id);
        self
    }

    pub fn tenant(mut self, id: Uuid) -> Self {
        self.tenant_id = Some(id);
        self
    }

    /// Whether a subscriber with this scope should be told. Unit events
    /// reach every tenant because the vacant listing is public.
    pub fn visible_to(&self, scope: &RowScope) -> bool {
        match scope {
            RowScope::All => true,
            RowScope::Landlord(id) => self.landlord_id == Some(*id),
            RowScope::Tenant(id) => self.tenant_id == Some(*id) || self.entity == "unit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_their_landlord_and_tenant() {
        let landlord = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let ev = ChangeEvent::new("join_request", "created", Uuid::new_v4())
            .landlord(landlord)
            .tenant(tenant);
        assert!(ev.visible_to(&RowScope::All));
        assert!(ev.visible_to(&RowScope::Landlord(landlord)));
        assert!(ev.visible_to(&RowScope::Tenant(tenant)));
        assert!(!ev.visible_to(&RowScope::Landlord(Uuid::new_v4())));
        assert!(!ev.visible_to(&RowScope::Tenant(Uuid::new_v4())));
    }

    #[test]
    fn test_unit_events_are_public_to_tenants() {
        let ev = ChangeEvent::new("unit", "updated", Uuid::new_v4()).landlord(Uuid::new_v4());
        assert!(ev.visible_to(&RowScope::Tenant(Uuid::new_v4())));
        assert!(!ev.visible_to(&RowScope::Landlord(Uuid::new_v4())));
    }

    #[test]
    fn test_serializes_scope_keys_in_camel_case() {
        let tenant = Uuid::new_v4();
        let ev = ChangeEvent::new("payment", "updated", Uuid::new_v4()).tenant(tenant);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["entity"], "payment");
        assert_eq!(json["tenantId"], tenant.to_string());
        assert!(json.get("landlordId").is_none());
    }
}
