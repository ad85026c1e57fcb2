use chrono::Utc;
use letting::{lifecycle, DecisionOutcome, JoinRequest, JoinRequestStatus, OccupancyStatus, Verdict};
use porter::RowScope;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use uuid::Uuid;

use crate::changes::ChangeEvent;
use crate::error::{constraint_to_conflict, StoreError, StoreResult};
use crate::row::{get_opt_uuid, get_parsed, get_uuid};
use crate::units::unit_with_owner;
use crate::Store;

const JOIN_REQUEST_COLS: &str = "jr.id, jr.unit_id, jr.tenant_id, jr.message, jr.status, \
     jr.created_at, jr.decided_by, jr.decided_at, jr.decision_note";

fn join_request_from_row(row: &Row<'_>) -> rusqlite::Result<JoinRequest> {
    Ok(JoinRequest {
        id: get_uuid(row, 0)?,
        unit_id: get_uuid(row, 1)?,
        tenant_id: get_uuid(row, 2)?,
        message: row.get(3)?,
        status: get_parsed(row, 4)?,
        created_at: row.get(5)?,
        decided_by: get_opt_uuid(row, 6)?,
        decided_at: row.get(7)?,
        decision_note: row.get(8)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewJoinRequest {
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub message: Option<String>,
}

impl Store {
    /// File a join request for a vacant unit. Occupied units and
    /// duplicate pending filings are conflicts.
    pub fn file_join_request(&self, new: NewJoinRequest) -> StoreResult<JoinRequest> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let owner = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let Some((unit, owner)) = unit_with_owner(&tx, new.unit_id)? else {
                return Err(StoreError::NotFound("unit"));
            };
            if unit.occupancy == OccupancyStatus::Occupied {
                return Err(StoreError::Conflict("unit is occupied".to_string()));
            }
            tx.execute(
                "INSERT INTO join_requests (id, unit_id, tenant_id, message, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                params![
                    id.to_string(),
                    new.unit_id.to_string(),
                    new.tenant_id.to_string(),
                    new.message,
                    created_at
                ],
            )
            .map_err(|e| {
                constraint_to_conflict(e, "a pending request for this unit already exists")
            })?;
            tx.commit()?;
            owner
        };
        self.publish(vec![ChangeEvent::new("join_request", "created", id)
            .landlord(owner)
            .tenant(new.tenant_id)]);
        Ok(JoinRequest {
            id,
            unit_id: new.unit_id,
            tenant_id: new.tenant_id,
            message: new.message,
            status: JoinRequestStatus::Pending,
            created_at,
            decided_by: None,
            decided_at: None,
            decision_note: None,
        })
    }

    pub fn list_join_requests(
        &self,
        scope: &RowScope,
        status: Option<JoinRequestStatus>,
    ) -> StoreResult<Vec<JoinRequest>> {
        let mut sql = format!(
            "SELECT {JOIN_REQUEST_COLS} FROM join_requests jr
             JOIN units u ON u.id = jr.unit_id
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
                sql.push_str(" AND jr.tenant_id = ?");
                args.push(Value::Text(tenant.to_string()));
            }
        }
        if let Some(status) = status {
            sql.push_str(" AND jr.status = ?");
            args.push(Value::Text(status.to_string()));
        }
        sql.push_str(" ORDER BY jr.created_at DESC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), join_request_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Apply a landlord's verdict. First writer wins: a pending request
    /// is decided; repeating the same verdict is a no-op; the opposite
    /// verdict reports the already-recorded state. Approval creates the
    /// tenancy and flips the unit to occupied in the same transaction.
    pub fn decide_join_request(
        &self,
        landlord_id: Uuid,
        request_id: Uuid,
        verdict: Verdict,
        note: Option<&str>,
    ) -> StoreResult<(JoinRequest, DecisionOutcome)> {
        let mut events = Vec::new();
        let result = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let row = tx
                .query_row(
                    &format!(
                        "SELECT {JOIN_REQUEST_COLS}, u.rent_amount, u.occupancy, p.landlord_id
                         FROM join_requests jr
                         JOIN units u ON u.id = jr.unit_id
                         JOIN properties p ON p.id = u.property_id
                         WHERE jr.id = ?1"
                    ),
                    params![request_id.to_string()],
                    |row| {
                        let request = join_request_from_row(row)?;
                        let rent: i64 = row.get(9)?;
                        let occupancy: OccupancyStatus = get_parsed(row, 10)?;
                        let owner = get_uuid(row, 11)?;
                        Ok((request, rent, occupancy, owner))
                    },
                )
                .optional()?;
            let Some((mut request, rent_amount, occupancy, owner)) = row else {
                return Err(StoreError::NotFound("join request"));
            };
            if owner != landlord_id {
                return Err(StoreError::Denied(
                    "join request belongs to another landlord's unit",
                ));
            }
            let outcome = lifecycle::decide_join_request(request.status, verdict);
            if let DecisionOutcome::Applied = outcome {
                let decided_at = Utc::now();
                if verdict == Verdict::Approve {
                    if occupancy == OccupancyStatus::Occupied {
                        return Err(StoreError::Conflict("unit is already occupied".to_string()));
                    }
                    let tenancy_id = Uuid::new_v4();
                    let started_on = decided_at.date_naive();
                    tx.execute(
                        "INSERT INTO tenancies (id, unit_id, tenant_id, rent_amount, started_on, status)
                         VALUES (?1, ?2, ?3, ?4, ?5, 'active')",
                        params![
                            tenancy_id.to_string(),
                            request.unit_id.to_string(),
                            request.tenant_id.to_string(),
                            rent_amount,
                            started_on
                        ],
                    )
                    .map_err(|e| constraint_to_conflict(e, "unit is already occupied"))?;
                    tx.execute(
                        "UPDATE units SET occupancy = 'occupied' WHERE id = ?1",
                        params![request.unit_id.to_string()],
                    )?;
                    events.push(
                        ChangeEvent::new("tenancy", "created", tenancy_id)
                            .landlord(landlord_id)
                            .tenant(request.tenant_id),
                    );
                    events.push(
                        ChangeEvent::new("unit", "updated", request.unit_id).landlord(landlord_id),
                    );
                }
                tx.execute(
                    "UPDATE join_requests
                     SET status = ?2, decided_by = ?3, decided_at = ?4, decision_note = ?5
                     WHERE id = ?1",
                    params![
                        request_id.to_string(),
                        verdict.target().to_string(),
                        landlord_id.to_string(),
                        decided_at,
                        note
                    ],
                )?;
                tx.commit()?;
                request.status = verdict.target();
                request.decided_by = Some(landlord_id);
                request.decided_at = Some(decided_at);
                request.decision_note = note.map(str::to_string);
                events.push(
                    ChangeEvent::new("join_request", "decided", request_id)
                        .landlord(landlord_id)
                        .tenant(request.tenant_id),
                );
            }
            (request, outcome)
        };
        self.publish(events);
        Ok(result)
    }
}
