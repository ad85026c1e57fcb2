//! SQL-side rollups for the landlord and admin dashboards.

use letting::stats::{collection_rate, occupancy_rate, outstanding};
use letting::{Month, PlatformStats, PortfolioStats};
use rusqlite::params;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::Store;

impl Store {
    /// One landlord's portfolio rolled up for a month: occupancy,
    /// expected rent over active tenancies, collected volume, backlog.
    pub fn portfolio_stats(&self, landlord_id: Uuid, month: &Month) -> StoreResult<PortfolioStats> {
        let conn = self.conn()?;
        let landlord = landlord_id.to_string();
        let start = month.first_day().to_string();
        let end = month.next_first_day().to_string();

        let properties: i64 = conn.query_row(
            "SELECT COUNT(*) FROM properties WHERE landlord_id = ?1",
            params![landlord],
            |row| row.get(0),
        )?;
        let (units, occupied_units): (i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN u.occupancy = 'occupied' THEN 1 ELSE 0 END), 0)
             FROM units u
             JOIN properties p ON p.id = u.property_id
             WHERE p.landlord_id = ?1",
            params![landlord],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let (active_tenancies, expected_rent): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(t.rent_amount), 0)
             FROM tenancies t
             JOIN units u ON u.id = t.unit_id
             JOIN properties p ON p.id = u.property_id
             WHERE p.landlord_id = ?1 AND t.status = 'active'",
            params![landlord],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let collected: i64 = conn.query_row(
            "SELECT COALESCE(SUM(pay.amount), 0)
             FROM payments pay
             JOIN tenancies t ON t.id = pay.tenancy_id
             JOIN units u ON u.id = t.unit_id
             JOIN properties p ON p.id = u.property_id
             WHERE p.landlord_id = ?1 AND pay.status = 'confirmed'
               AND pay.paid_on >= ?2 AND pay.paid_on < ?3",
            params![landlord, start, end],
            |row| row.get(0),
        )?;
        let pending_join_requests: i64 = conn.query_row(
            "SELECT COUNT(*) FROM join_requests jr
             JOIN units u ON u.id = jr.unit_id
             JOIN properties p ON p.id = u.property_id
             WHERE p.landlord_id = ?1 AND jr.status = 'pending'",
            params![landlord],
            |row| row.get(0),
        )?;
        let open_maintenance: i64 = conn.query_row(
            "SELECT COUNT(*) FROM maintenance_requests m
             JOIN units u ON u.id = m.unit_id
             JOIN properties p ON p.id = u.property_id
             WHERE p.landlord_id = ?1 AND m.status != 'resolved'",
            params![landlord],
            |row| row.get(0),
        )?;

        Ok(PortfolioStats {
            month: month.to_string(),
            properties: properties as u64,
            units: units as u64,
            occupied_units: occupied_units as u64,
            vacant_units: (units - occupied_units) as u64,
            active_tenancies: active_tenancies as u64,
            expected_rent,
            collected,
            outstanding: outstanding(expected_rent, collected),
            collection_rate: collection_rate(expected_rent, collected),
            pending_join_requests: pending_join_requests as u64,
            open_maintenance: open_maintenance as u64,
        })
    }

    /// Platform-wide counts and the month's confirmed payment volume.
    pub fn platform_stats(&self, month: &Month) -> StoreResult<PlatformStats> {
        let conn = self.conn()?;
        let start = month.first_day().to_string();
        let end = month.next_first_day().to_string();

        let (landlords, tenants): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN role = 'landlord' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN role = 'tenant' THEN 1 ELSE 0 END), 0)
             FROM profiles",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let properties: i64 =
            conn.query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
        let (units, occupied_units): (i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN occupancy = 'occupied' THEN 1 ELSE 0 END), 0)
             FROM units",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let active_tenancies: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tenancies WHERE status = 'active'",
            [],
            |row| row.get(0),
        )?;
        let pending_join_requests: i64 = conn.query_row(
            "SELECT COUNT(*) FROM join_requests WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )?;
        let open_maintenance: i64 = conn.query_row(
            "SELECT COUNT(*) FROM maintenance_requests WHERE status != 'resolved'",
            [],
            |row| row.get(0),
        )?;
        let (payments_in_month, collected_in_month): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM payments
             WHERE status = 'confirmed' AND paid_on >= ?1 AND paid_on < ?2",
            params![start, end],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(PlatformStats {
            month: month.to_string(),
            landlords: landlords as u64,
            tenants: tenants as u64,
            properties: properties as u64,
            units: units as u64,
            occupied_units: occupied_units as u64,
            occupancy_rate: occupancy_rate(units as u64, occupied_units as u64),
            active_tenancies: active_tenancies as u64,
            pending_join_requests: pending_join_requests as u64,
            open_maintenance: open_maintenance as u64,
            collected_in_month,
            payments_in_month: payments_in_month as u64,
        })
    }
}
