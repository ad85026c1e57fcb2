//! End-to-end walk through the letting workflow against a real
//! database file: register, list, file, approve, pay, maintain, end.

use chrono::Datelike;
use hearth_store::{
    NewJoinRequest, NewManualPayment, NewMomoPayment, NewProfile, Store, StoreError, VacantFilter,
};
use letting::{
    DecisionOutcome, JoinRequestStatus, Month, OccupancyStatus, PaymentMethod, PaymentStatus,
    Role, TenancyStatus, Verdict,
};
use porter::RowScope;

fn profile(store: &Store, email: &str, role: Role) -> letting::Profile {
    store
        .create_profile(NewProfile {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            display_name: email.split('@').next().unwrap().to_string(),
            phone: None,
            role,
        })
        .unwrap()
}

#[test]
fn test_full_letting_workflow_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hearth.db");
    let store = Store::open(&db_path).unwrap();
    assert!(store.schema_version().unwrap() >= 1);

    let landlord = profile(&store, "landlord@example.com", Role::Landlord);
    let amina = profile(&store, "amina@example.com", Role::Tenant);
    let brian = profile(&store, "brian@example.com", Role::Tenant);

    let property = store
        .create_property(landlord.id, "Kisementi Court", "Plot 12, Kampala")
        .unwrap();
    let a1 = store
        .create_unit(landlord.id, property.id, "A1", 450_000)
        .unwrap();
    store
        .create_unit(landlord.id, property.id, "A2", 600_000)
        .unwrap();

    // Both tenants want A1.
    let amina_req = store
        .file_join_request(NewJoinRequest {
            tenant_id: amina.id,
            unit_id: a1.id,
            message: Some("Three of us, quiet family".to_string()),
        })
        .unwrap();
    let brian_req = store
        .file_join_request(NewJoinRequest {
            tenant_id: brian.id,
            unit_id: a1.id,
            message: None,
        })
        .unwrap();

    let mut changes = store.subscribe();

    // First verdict wins; the rival approval conflicts, rejection still works.
    let (approved, outcome) = store
        .decide_join_request(landlord.id, amina_req.id, Verdict::Approve, None)
        .unwrap();
    assert_eq!(outcome, DecisionOutcome::Applied);
    assert_eq!(approved.status, JoinRequestStatus::Approved);
    let err = store
        .decide_join_request(landlord.id, brian_req.id, Verdict::Approve, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    let (_, outcome) = store
        .decide_join_request(landlord.id, brian_req.id, Verdict::Reject, Some("Taken"))
        .unwrap();
    assert_eq!(outcome, DecisionOutcome::Applied);

    // The approval flipped the unit and created the tenancy atomically.
    let unit = store.unit_by_id(&RowScope::All, a1.id).unwrap();
    assert_eq!(unit.occupancy, OccupancyStatus::Occupied);
    let tenancy = store
        .list_tenancies(&RowScope::Tenant(amina.id))
        .unwrap()
        .remove(0);
    assert_eq!(tenancy.rent_amount, 450_000);
    assert_eq!(tenancy.status, TenancyStatus::Active);

    // Change hints went out for everything the decision touched.
    let mut seen = Vec::new();
    while let Ok(event) = changes.try_recv() {
        seen.push((event.entity, event.op));
    }
    assert!(seen.contains(&("tenancy", "created")));
    assert!(seen.contains(&("unit", "updated")));
    assert!(seen.contains(&("join_request", "decided")));

    // Only A2 is left on the browse page.
    let listings = store.browse_vacant(&VacantFilter::default()).unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].unit.label, "A2");

    // Rent: one momo payment settled, one cash payment recorded.
    let momo = store
        .initiate_momo_payment(
            amina.id,
            NewMomoPayment {
                tenancy_id: tenancy.id,
                amount: 450_000,
                reference: "momo-ref-1".to_string(),
            },
        )
        .unwrap();
    assert_eq!(momo.status, PaymentStatus::Pending);
    store
        .settle_payment(landlord.id, momo.id, PaymentStatus::Confirmed)
        .unwrap();
    store
        .record_payment(
            landlord.id,
            NewManualPayment {
                tenancy_id: tenancy.id,
                amount: 50_000,
                method: PaymentMethod::Cash,
                paid_on: tenancy.started_on,
            },
        )
        .unwrap();

    // Maintenance while renting.
    let ticket = store
        .file_maintenance(amina.id, a1.id, "Leaking tap", None)
        .unwrap();
    store
        .advance_maintenance(landlord.id, ticket.id, letting::MaintenanceStatus::Resolved)
        .unwrap();

    let month = Month {
        year: tenancy.started_on.year(),
        month: tenancy.started_on.month(),
    };
    let portfolio = store.portfolio_stats(landlord.id, &month).unwrap();
    assert_eq!(portfolio.units, 2);
    assert_eq!(portfolio.occupied_units, 1);
    assert_eq!(portfolio.expected_rent, 450_000);
    assert_eq!(portfolio.collected, 500_000);
    assert_eq!(portfolio.outstanding, 0);
    assert_eq!(portfolio.collection_rate, 1.0);
    assert_eq!(portfolio.open_maintenance, 0);

    let platform = store.platform_stats(&month).unwrap();
    assert_eq!(platform.landlords, 1);
    assert_eq!(platform.tenants, 2);
    assert_eq!(platform.payments_in_month, 2);
    assert_eq!(platform.collected_in_month, 500_000);

    // Ending the tenancy frees the unit for the next cycle.
    store
        .end_tenancy(landlord.id, tenancy.id, tenancy.started_on)
        .unwrap();
    let unit = store.unit_by_id(&RowScope::All, a1.id).unwrap();
    assert_eq!(unit.occupancy, OccupancyStatus::Vacant);

    // Everything survives a reopen.
    drop(store);
    let reopened = Store::open(&db_path).unwrap();
    assert_eq!(reopened.list_profiles(None).unwrap().len(), 3);
    assert_eq!(
        reopened
            .list_tenancies(&RowScope::Tenant(amina.id))
            .unwrap()
            .len(),
        1
    );
    assert_eq!(reopened.browse_vacant(&VacantFilter::default()).unwrap().len(), 2);
}
