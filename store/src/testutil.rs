//! Fixture builders shared by the per-module tests.

use letting::{Profile, Property, Role, Tenancy, Unit, Verdict};
use uuid::Uuid;

use crate::{NewJoinRequest, NewProfile, Store};

pub(crate) fn store() -> Store {
    Store::open_in_memory().unwrap()
}

pub(crate) fn profile(store: &Store, email: &str, role: Role) -> Profile {
    store
        .create_profile(NewProfile {
            email: email.to_string(),
            password_hash: "test-hash".to_string(),
            display_name: email.split('@').next().unwrap_or("someone").to_string(),
            phone: None,
            role,
        })
        .unwrap()
}

pub(crate) fn property(store: &Store, landlord: Uuid) -> Property {
    store
        .create_property(landlord, "Kisementi Court", "Plot 12, Kampala")
        .unwrap()
}

pub(crate) fn unit(store: &Store, landlord: Uuid, property: Uuid, label: &str, rent: i64) -> Unit {
    store.create_unit(landlord, property, label, rent).unwrap()
}

/// File and approve a join request, returning the resulting tenancy.
pub(crate) fn active_tenancy(
    store: &Store,
    landlord: Uuid,
    tenant: Uuid,
    unit: Uuid,
) -> Tenancy {
    let request = store
        .file_join_request(NewJoinRequest {
            tenant_id: tenant,
            unit_id: unit,
            message: None,
        })
        .unwrap();
    store
        .decide_join_request(landlord, request.id, Verdict::Approve, None)
        .unwrap();
    store
        .list_tenancies(&porter::RowScope::Tenant(tenant))
        .unwrap()
        .into_iter()
        .find(|t| t.unit_id == unit)
        .expect("approval creates a tenancy")
}
