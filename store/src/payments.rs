use chrono::{NaiveDate, Utc};
use letting::{lifecycle, Month, Payment, PaymentMethod, PaymentStatus};
use porter::RowScope;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use uuid::Uuid;

use crate::changes::ChangeEvent;
use crate::error::{constraint_to_conflict, StoreError, StoreResult};
use crate::row::{get_parsed, get_uuid};
use crate::Store;

const PAYMENT_COLS: &str = "pay.id, pay.tenancy_id, pay.amount, pay.paid_on, pay.method, \
     pay.status, pay.reference, pay.recorded_at";

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: get_uuid(row, 0)?,
        tenancy_id: get_uuid(row, 1)?,
        amount: row.get(2)?,
        paid_on: row.get(3)?,
        method: get_parsed(row, 4)?,
        status: get_parsed(row, 5)?,
        reference: row.get(6)?,
        recorded_at: row.get(7)?,
    })
}

/// A rent payment the landlord took offline (cash or bank transfer);
/// recorded as already confirmed.
#[derive(Debug, Clone)]
pub struct NewManualPayment {
    pub tenancy_id: Uuid,
    pub amount: i64,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
}

/// A mobile-money payment the tenant initiated; stored pending under
/// the gateway reference until settled.
#[derive(Debug, Clone)]
pub struct NewMomoPayment {
    pub tenancy_id: Uuid,
    pub amount: i64,
    pub reference: String,
}

impl Store {
    pub fn record_payment(&self, landlord_id: Uuid, new: NewManualPayment) -> StoreResult<Payment> {
        if new.amount <= 0 {
            return Err(StoreError::Conflict(
                "payment amount must be positive".to_string(),
            ));
        }
        let id = Uuid::new_v4();
        let recorded_at = Utc::now();
        let tenant_id = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let row = tx
                .query_row(
                    "SELECT t.tenant_id, p.landlord_id FROM tenancies t
                     JOIN units u ON u.id = t.unit_id
                     JOIN properties p ON p.id = u.property_id
                     WHERE t.id = ?1",
                    params![new.tenancy_id.to_string()],
                    |row| Ok((get_uuid(row, 0)?, get_uuid(row, 1)?)),
                )
                .optional()?;
            let Some((tenant_id, owner)) = row else {
                return Err(StoreError::NotFound("tenancy"));
            };
            if owner != landlord_id {
                return Err(StoreError::Denied(
                    "tenancy belongs to another landlord's unit",
                ));
            }
            tx.execute(
                "INSERT INTO payments (id, tenancy_id, amount, paid_on, method, status, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'confirmed', ?6)",
                params![
                    id.to_string(),
                    new.tenancy_id.to_string(),
                    new.amount,
                    new.paid_on,
                    new.method.to_string(),
                    recorded_at
                ],
            )?;
            tx.commit()?;
            tenant_id
        };
        self.publish(vec![ChangeEvent::new("payment", "created", id)
            .landlord(landlord_id)
            .tenant(tenant_id)]);
        Ok(Payment {
            id,
            tenancy_id: new.tenancy_id,
            amount: new.amount,
            paid_on: new.paid_on,
            method: new.method,
            status: PaymentStatus::Confirmed,
            reference: None,
            recorded_at,
        })
    }

    /// Store the pending leg of a mobile-money request-to-pay. The
    /// tenancy must be the tenant's own and still active.
    pub fn initiate_momo_payment(
        &self,
        tenant_id: Uuid,
        new: NewMomoPayment,
    ) -> StoreResult<Payment> {
        if new.amount <= 0 {
            return Err(StoreError::Conflict(
                "payment amount must be positive".to_string(),
            ));
        }
        let id = Uuid::new_v4();
        let recorded_at = Utc::now();
        let paid_on = recorded_at.date_naive();
        let landlord_id = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let row = tx
                .query_row(
                    "SELECT t.tenant_id, t.status, p.landlord_id FROM tenancies t
                     JOIN units u ON u.id = t.unit_id
                     JOIN properties p ON p.id = u.property_id
                     WHERE t.id = ?1",
                    params![new.tenancy_id.to_string()],
                    |row| {
                        let holder = get_uuid(row, 0)?;
                        let status: letting::TenancyStatus = get_parsed(row, 1)?;
                        let owner = get_uuid(row, 2)?;
                        Ok((holder, status, owner))
                    },
                )
                .optional()?;
            let Some((holder, status, owner)) = row else {
                return Err(StoreError::NotFound("tenancy"));
            };
            if holder != tenant_id {
                // Outside the tenant's scope: indistinguishable from absent.
                return Err(StoreError::NotFound("tenancy"));
            }
            if status != letting::TenancyStatus::Active {
                return Err(StoreError::Conflict("tenancy is not active".to_string()));
            }
            tx.execute(
                "INSERT INTO payments (id, tenancy_id, amount, paid_on, method, status, reference, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, 'momo', 'pending', ?5, ?6)",
                params![
                    id.to_string(),
                    new.tenancy_id.to_string(),
                    new.amount,
                    paid_on,
                    new.reference,
                    recorded_at
                ],
            )
            .map_err(|e| constraint_to_conflict(e, "payment reference already used"))?;
            tx.commit()?;
            owner
        };
        self.publish(vec![ChangeEvent::new("payment", "created", id)
            .landlord(landlord_id)
            .tenant(tenant_id)]);
        Ok(Payment {
            id,
            tenancy_id: new.tenancy_id,
            amount: new.amount,
            paid_on,
            method: PaymentMethod::Momo,
            status: PaymentStatus::Pending,
            reference: Some(new.reference),
            recorded_at,
        })
    }

    /// Confirm or fail a pending payment. Settled payments stay settled.
    pub fn settle_payment(
        &self,
        landlord_id: Uuid,
        payment_id: Uuid,
        outcome: PaymentStatus,
    ) -> StoreResult<Payment> {
        if outcome == PaymentStatus::Pending {
            return Err(StoreError::Conflict(
                "settlement must confirm or fail the payment".to_string(),
            ));
        }
        let (payment, tenant_id) = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let row = tx
                .query_row(
                    &format!(
                        "SELECT {PAYMENT_COLS}, t.tenant_id, p.landlord_id FROM payments pay
                         JOIN tenancies t ON t.id = pay.tenancy_id
                         JOIN units u ON u.id = t.unit_id
                         JOIN properties p ON p.id = u.property_id
                         WHERE pay.id = ?1"
                    ),
                    params![payment_id.to_string()],
                    |row| {
                        let payment = payment_from_row(row)?;
                        let tenant = get_uuid(row, 8)?;
                        let owner = get_uuid(row, 9)?;
                        Ok((payment, tenant, owner))
                    },
                )
                .optional()?;
            let Some((mut payment, tenant_id, owner)) = row else {
                return Err(StoreError::NotFound("payment"));
            };
            if owner != landlord_id {
                return Err(StoreError::Denied(
                    "payment belongs to another landlord's tenancy",
                ));
            }
            if !lifecycle::payment_settle_allowed(payment.status) {
                return Err(StoreError::Conflict(format!(
                    "payment is already {}",
                    payment.status
                )));
            }
            tx.execute(
                "UPDATE payments SET status = ?2 WHERE id = ?1",
                params![payment_id.to_string(), outcome.to_string()],
            )?;
            tx.commit()?;
            payment.status = outcome;
            (payment, tenant_id)
        };
        self.publish(vec![ChangeEvent::new("payment", "updated", payment_id)
            .landlord(landlord_id)
            .tenant(tenant_id)]);
        Ok(payment)
    }

    pub fn payment_by_id(&self, scope: &RowScope, id: Uuid) -> StoreResult<Payment> {
        let mut sql = format!(
            "SELECT {PAYMENT_COLS} FROM payments pay
             JOIN tenancies t ON t.id = pay.tenancy_id
             JOIN units u ON u.id = t.unit_id
             JOIN properties p ON p.id = u.property_id
             WHERE pay.id = ?"
        );
        let mut args: Vec<Value> = vec![Value::Text(id.to_string())];
        match scope {
            RowScope::All => {}
            RowScope::Landlord(landlord) => {
                sql.push_str(" AND p.landlord_id = ?");
                args.push(Value::Text(landlord.to_string()));
            }
            RowScope::Tenant(tenant) => {
                sql.push_str(" AND t.tenant_id = ?");
                args.push(Value::Text(tenant.to_string()));
            }
        }
        let conn = self.conn()?;
        let found = conn
            .query_row(&sql, params_from_iter(args.iter()), payment_from_row)
            .optional()?;
        found.ok_or(StoreError::NotFound("payment"))
    }

    pub fn list_payments(
        &self,
        scope: &RowScope,
        month: Option<&Month>,
    ) -> StoreResult<Vec<Payment>> {
        let mut sql = format!(
            "SELECT {PAYMENT_COLS} FROM payments pay
             JOIN tenancies t ON t.id = pay.tenancy_id
             JOIN units u ON u.id = t.unit_id
             JOIN properties p ON p.id = u.property_id
             WHERE 1=1"
        );
        let mut args: Vec<Value> = Vec::new();
        match scope {
            RowScope::All => {}
            RowScope::Landlord(landlord) => {
                sql.push_str(" AND p.landlord_id = ?");
                args.push(Value::Text(landlord.to_string()));
            }
            RowScope::Tenant(tenant) => {
                sql.push_str(" AND t.tenant_id = ?");
                args.push(Value::Text(tenant.to_string()));
            }
        }
        if let Some(month) = month {
            sql.push_str(" AND pay.paid_on >= ? AND pay.paid_on < ?");
            args.push(Value::Text(month.first_day().to_string()));
            args.push(Value::Text(month.next_first_day().to_string()));
        }
        sql.push_str(" ORDER BY pay.paid_on DESC, pay.recorded_at DESC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), payment_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn payments_for_tenancy(
        &self,
        scope: &RowScope,
        tenancy_id: Uuid,
    ) -> StoreResult<Vec<Payment>> {
        // Visibility first: an out-of-scope tenancy 404s.
        self.tenancy_by_id(scope, tenancy_id)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAYMENT_COLS} FROM payments pay
             WHERE pay.tenancy_id = ?1
             ORDER BY pay.paid_on DESC, pay.recorded_at DESC"
        ))?;
        let rows = stmt.query_map(params![tenancy_id.to_string()], payment_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use letting::Role;

    fn setup() -> (Store, letting::Profile, letting::Profile, letting::Tenancy) {
        let store = testutil::store();
        let landlord = testutil::profile(&store, "owner@example.com", Role::Landlord);
        let tenant = testutil::profile(&store, "tenant@example.com", Role::Tenant);
        let property = testutil::property(&store, landlord.id);
        let unit = testutil::unit(&store, landlord.id, property.id, "A1", 450_000);
        let tenancy = testutil::active_tenancy(&store, landlord.id, tenant.id, unit.id);
        (store, landlord, tenant, tenancy)
    }

    #[test]
    fn test_recorded_cash_payment_is_confirmed() {
        let (store, landlord, tenant, tenancy) = setup();
        let paid_on = tenancy.started_on;
        let payment = store
            .record_payment(
                landlord.id,
                NewManualPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    method: PaymentMethod::Cash,
                    paid_on,
                },
            )
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert!(payment.reference.is_none());

        let listed = store
            .payments_for_tenancy(&RowScope::Tenant(tenant.id), tenancy.id)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, 450_000);
    }

    #[test]
    fn test_momo_payment_starts_pending_and_settles() {
        let (store, landlord, tenant, tenancy) = setup();
        let reference = Uuid::new_v4().to_string();
        let payment = store
            .initiate_momo_payment(
                tenant.id,
                NewMomoPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    reference: reference.clone(),
                },
            )
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.method, PaymentMethod::Momo);
        assert_eq!(payment.reference.as_deref(), Some(reference.as_str()));

        let settled = store
            .settle_payment(landlord.id, payment.id, PaymentStatus::Confirmed)
            .unwrap();
        assert_eq!(settled.status, PaymentStatus::Confirmed);

        let err = store
            .settle_payment(landlord.id, payment.id, PaymentStatus::Failed)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_momo_requires_own_active_tenancy() {
        let (store, landlord, _tenant, tenancy) = setup();
        let stranger = testutil::profile(&store, "stranger@example.com", Role::Tenant);

        let err = store
            .initiate_momo_payment(
                stranger.id,
                NewMomoPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    reference: "ref-1".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("tenancy")));

        store
            .end_tenancy(landlord.id, tenancy.id, tenancy.started_on)
            .unwrap();
        let holder_err = store
            .initiate_momo_payment(
                _tenant.id,
                NewMomoPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    reference: "ref-2".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(holder_err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_payment_lookup_follows_scope() {
        let (store, landlord, tenant, tenancy) = setup();
        let payment = store
            .record_payment(
                landlord.id,
                NewManualPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    method: PaymentMethod::Bank,
                    paid_on: tenancy.started_on,
                },
            )
            .unwrap();

        let mine = store
            .payment_by_id(&RowScope::Tenant(tenant.id), payment.id)
            .unwrap();
        assert_eq!(mine.id, payment.id);

        let other = testutil::profile(&store, "other@example.com", Role::Landlord);
        let err = store
            .payment_by_id(&RowScope::Landlord(other.id), payment.id)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("payment")));
    }

    #[test]
    fn test_duplicate_momo_reference_conflicts() {
        let (store, _landlord, tenant, tenancy) = setup();
        store
            .initiate_momo_payment(
                tenant.id,
                NewMomoPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    reference: "ref-dup".to_string(),
                },
            )
            .unwrap();
        let err = store
            .initiate_momo_payment(
                tenant.id,
                NewMomoPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    reference: "ref-dup".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_settlement_requires_the_owning_landlord() {
        let (store, _landlord, tenant, tenancy) = setup();
        let other = testutil::profile(&store, "other@example.com", Role::Landlord);
        let payment = store
            .initiate_momo_payment(
                tenant.id,
                NewMomoPayment {
                    tenancy_id: tenancy.id,
                    amount: 450_000,
                    reference: "ref-3".to_string(),
                },
            )
            .unwrap();
        let err = store
            .settle_payment(other.id, payment.id, PaymentStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, StoreError::Denied(_)));
    }

    #[test]
    fn test_month_filter_bounds_are_half_open() {
        let (store, landlord, _tenant, tenancy) = setup();
        for (day, amount) in [("2025-03-01", 1), ("2025-03-31", 2), ("2025-04-01", 4)] {
            store
                .record_payment(
                    landlord.id,
                    NewManualPayment {
                        tenancy_id: tenancy.id,
                        amount,
                        method: PaymentMethod::Bank,
                        paid_on: day.parse().unwrap(),
                    },
                )
                .unwrap();
        }
        let march: Month = "2025-03".parse().unwrap();
        let in_march = store
            .list_payments(&RowScope::Landlord(landlord.id), Some(&march))
            .unwrap();
        let total: i64 = in_march.iter().map(|p| p.amount).sum();
        assert_eq!(total, 3);
        assert_eq!(
            store
                .list_payments(&RowScope::Landlord(landlord.id), None)
                .unwrap()
                .len(),
            3
        );
    }
}
