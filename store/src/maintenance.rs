use chrono::Utc;
use letting::{lifecycle, MaintenanceRequest, MaintenanceStatus};
use porter::RowScope;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use uuid::Uuid;

use crate::changes::ChangeEvent;
use crate::error::{StoreError, StoreResult};
use crate::row::{get_parsed, get_uuid};
use crate::units::unit_with_owner;
use crate::Store;

const MAINTENANCE_COLS: &str =
    "m.id, m.unit_id, m.tenant_id, m.summary, m.detail, m.status, m.opened_at, m.resolved_at";

fn maintenance_from_row(row: &Row<'_>) -> rusqlite::Result<MaintenanceRequest> {
    Ok(MaintenanceRequest {
        id: get_uuid(row, 0)?,
        unit_id: get_uuid(row, 1)?,
        tenant_id: get_uuid(row, 2)?,
        summary: row.get(3)?,
        detail: row.get(4)?,
        status: get_parsed(row, 5)?,
        opened_at: row.get(6)?,
        resolved_at: row.get(7)?,
    })
}

impl Store {
    /// File a maintenance request. Only the tenant currently renting
    /// the unit can file against it.
    pub fn file_maintenance(
        &self,
        tenant_id: Uuid,
        unit_id: Uuid,
        summary: &str,
        detail: Option<String>,
    ) -> StoreResult<MaintenanceRequest> {
        let id = Uuid::new_v4();
        let opened_at = Utc::now();
        let owner = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let Some((_, owner)) = unit_with_owner(&tx, unit_id)? else {
                return Err(StoreError::NotFound("unit"));
            };
            let renting: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM tenancies
                     WHERE unit_id = ?1 AND tenant_id = ?2 AND status = 'active'",
                    params![unit_id.to_string(), tenant_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if renting.is_none() {
                return Err(StoreError::Denied("no active tenancy for this unit"));
            }
            tx.execute(
                "INSERT INTO maintenance_requests
                   (id, unit_id, tenant_id, summary, detail, status, opened_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6)",
                params![
                    id.to_string(),
                    unit_id.to_string(),
                    tenant_id.to_string(),
                    summary,
                    detail,
                    opened_at
                ],
            )?;
            tx.commit()?;
            owner
        };
        self.publish(vec![ChangeEvent::new("maintenance", "created", id)
            .landlord(owner)
            .tenant(tenant_id)]);
        Ok(MaintenanceRequest {
            id,
            unit_id,
            tenant_id,
            summary: summary.to_string(),
            detail,
            status: MaintenanceStatus::Open,
            opened_at,
            resolved_at: None,
        })
    }

    pub fn list_maintenance(
        &self,
        scope: &RowScope,
        status: Option<MaintenanceStatus>,
    ) -> StoreResult<Vec<MaintenanceRequest>> {
        let mut sql = format!(
            "SELECT {MAINTENANCE_COLS} FROM maintenance_requests m
             JOIN units u ON u.id = m.unit_id
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
                sql.push_str(" AND m.tenant_id = ?");
                args.push(Value::Text(tenant.to_string()));
            }
        }
        if let Some(status) = status {
            sql.push_str(" AND m.status = ?");
            args.push(Value::Text(status.to_string()));
        }
        sql.push_str(" ORDER BY m.opened_at DESC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), maintenance_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Move a request along its lifecycle. Backward moves and repeats
    /// are conflicts; resolving stamps `resolved_at`.
    pub fn advance_maintenance(
        &self,
        landlord_id: Uuid,
        id: Uuid,
        to: MaintenanceStatus,
    ) -> StoreResult<MaintenanceRequest> {
        let (request, tenant_id) = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let row = tx
                .query_row(
                    &format!(
                        "SELECT {MAINTENANCE_COLS}, p.landlord_id FROM maintenance_requests m
                         JOIN units u ON u.id = m.unit_id
                         JOIN properties p ON p.id = u.property_id
                         WHERE m.id = ?1"
                    ),
                    params![id.to_string()],
                    |row| {
                        let request = maintenance_from_row(row)?;
                        let owner = get_uuid(row, 8)?;
                        Ok((request, owner))
                    },
                )
                .optional()?;
            let Some((mut request, owner)) = row else {
                return Err(StoreError::NotFound("maintenance request"));
            };
            if owner != landlord_id {
                return Err(StoreError::Denied(
                    "maintenance request belongs to another landlord's unit",
                ));
            }
            if !lifecycle::maintenance_transition_allowed(request.status, to) {
                return Err(StoreError::Conflict(format!(
                    "cannot move maintenance from {} to {}",
                    request.status, to
                )));
            }
            let resolved_at = (to == MaintenanceStatus::Resolved).then(Utc::now);
            tx.execute(
                "UPDATE maintenance_requests SET status = ?2, resolved_at = ?3 WHERE id = ?1",
                params![id.to_string(), to.to_string(), resolved_at],
            )?;
            tx.commit()?;
            let tenant_id = request.tenant_id;
            request.status = to;
            request.resolved_at = resolved_at;
            (request, tenant_id)
        };
        self.publish(vec![ChangeEvent::new("maintenance", "updated", id)
            .landlord(landlord_id)
            .tenant(tenant_id)]);
        Ok(request)
    }
}
