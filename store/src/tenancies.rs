use chrono::NaiveDate;
use letting::{lifecycle, Property, Tenancy, TenancyStatus, Unit};
use porter::RowScope;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::changes::ChangeEvent;
use crate::error::{StoreError, StoreResult};
use crate::row::{get_parsed, get_uuid};
use crate::Store;

const TENANCY_COLS: &str =
    "t.id, t.unit_id, t.tenant_id, t.rent_amount, t.started_on, t.ended_on, t.status";

fn tenancy_from_row(row: &Row<'_>) -> rusqlite::Result<Tenancy> {
    Ok(Tenancy {
        id: get_uuid(row, 0)?,
        unit_id: get_uuid(row, 1)?,
        tenant_id: get_uuid(row, 2)?,
        rent_amount: row.get(3)?,
        started_on: row.get(4)?,
        ended_on: row.get(5)?,
        status: get_parsed(row, 6)?,
    })
}

/// A tenancy with its unit, property and tenant context, as shown on
/// dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct TenancyDetail {
    pub tenancy: Tenancy,
    pub unit: Unit,
    pub property: Property,
    #[serde(rename = "tenantName")]
    pub tenant_name: String,
}

impl Store {
    pub fn list_tenancies(&self, scope: &RowScope) -> StoreResult<Vec<Tenancy>> {
        let mut sql = format!(
            "SELECT {TENANCY_COLS} FROM tenancies t
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
        sql.push_str(" ORDER BY t.started_on DESC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), tenancy_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn tenancy_by_id(&self, scope: &RowScope, id: Uuid) -> StoreResult<TenancyDetail> {
        let mut sql = format!(
            "SELECT {TENANCY_COLS},
                    u.id, u.property_id, u.label, u.rent_amount, u.occupancy, u.created_at,
                    p.id, p.landlord_id, p.name, p.address, p.created_at,
                    prof.display_name
             FROM tenancies t
             JOIN units u ON u.id = t.unit_id
             JOIN properties p ON p.id = u.property_id
             JOIN profiles prof ON prof.id = t.tenant_id
             WHERE t.id = ?"
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
            .query_row(&sql, params_from_iter(args.iter()), |row| {
                let tenancy = tenancy_from_row(row)?;
                let unit = Unit {
                    id: get_uuid(row, 7)?,
                    property_id: get_uuid(row, 8)?,
                    label: row.get(9)?,
                    rent_amount: row.get(10)?,
                    occupancy: get_parsed(row, 11)?,
                    created_at: row.get(12)?,
                };
                let property = Property {
                    id: get_uuid(row, 13)?,
                    landlord_id: get_uuid(row, 14)?,
                    name: row.get(15)?,
                    address: row.get(16)?,
                    created_at: row.get(17)?,
                };
                let tenant_name: String = row.get(18)?;
                Ok(TenancyDetail {
                    tenancy,
                    unit,
                    property,
                    tenant_name,
                })
            })
            .optional()?;
        found.ok_or(StoreError::NotFound("tenancy"))
    }

    /// End an active tenancy and free its unit, atomically.
    pub fn end_tenancy(
        &self,
        landlord_id: Uuid,
        id: Uuid,
        ended_on: NaiveDate,
    ) -> StoreResult<Tenancy> {
        let (tenancy, events) = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let row = tx
                .query_row(
                    &format!(
                        "SELECT {TENANCY_COLS}, p.landlord_id FROM tenancies t
                         JOIN units u ON u.id = t.unit_id
                         JOIN properties p ON p.id = u.property_id
                         WHERE t.id = ?1"
                    ),
                    params![id.to_string()],
                    |row| {
                        let tenancy = tenancy_from_row(row)?;
                        let owner = get_uuid(row, 7)?;
                        Ok((tenancy, owner))
                    },
                )
                .optional()?;
            let Some((mut tenancy, owner)) = row else {
                return Err(StoreError::NotFound("tenancy"));
            };
            if owner != landlord_id {
                return Err(StoreError::Denied(
                    "tenancy belongs to another landlord's unit",
                ));
            }
            if !lifecycle::tenancy_end_allowed(tenancy.status) {
                return Err(StoreError::Conflict("tenancy already ended".to_string()));
            }
            if ended_on < tenancy.started_on {
                return Err(StoreError::Conflict(
                    "tenancy cannot end before it starts".to_string(),
                ));
            }
            tx.execute(
                "UPDATE tenancies SET status = 'ended', ended_on = ?2 WHERE id = ?1",
                params![id.to_string(), ended_on],
            )?;
            tx.execute(
                "UPDATE units SET occupancy = 'vacant' WHERE id = ?1",
                params![tenancy.unit_id.to_string()],
            )?;
            tx.commit()?;
            tenancy.status = TenancyStatus::Ended;
            tenancy.ended_on = Some(ended_on);
            let events = vec![
                ChangeEvent::new("tenancy", "updated", id)
                    .landlord(landlord_id)
                    .tenant(tenancy.tenant_id),
                ChangeEvent::new("unit", "updated", tenancy.unit_id).landlord(landlord_id),
            ];
            (tenancy, events)
        };
        self.publish(events);
        Ok(tenancy)
    }
}
