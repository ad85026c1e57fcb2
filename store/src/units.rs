use chrono::Utc;
use letting::{OccupancyStatus, Unit};
use porter::RowScope;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::changes::ChangeEvent;
use crate::error::{constraint_to_conflict, StoreError, StoreResult};
use crate::row::{get_parsed, get_uuid, like_contains};
use crate::Store;

const UNIT_COLS: &str = "u.id, u.property_id, u.label, u.rent_amount, u.occupancy, u.created_at";

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: get_uuid(row, 0)?,
        property_id: get_uuid(row, 1)?,
        label: row.get(2)?,
        rent_amount: row.get(3)?,
        occupancy: get_parsed(row, 4)?,
        created_at: row.get(5)?,
    })
}

/// Unit plus the owning landlord, for ownership checks inside write
/// transactions.
pub(crate) fn unit_with_owner(
    conn: &Connection,
    unit_id: Uuid,
) -> rusqlite::Result<Option<(Unit, Uuid)>> {
    conn.query_row(
        &format!(
            "SELECT {UNIT_COLS}, p.landlord_id FROM units u
             JOIN properties p ON p.id = u.property_id
             WHERE u.id = ?1"
        ),
        params![unit_id.to_string()],
        |row| {
            let unit = unit_from_row(row)?;
            let owner = get_uuid(row, 6)?;
            Ok((unit, owner))
        },
    )
    .optional()
}

/// A vacant unit with its property context, as shown on the browse page.
#[derive(Debug, Clone, Serialize)]
pub struct UnitListing {
    #[serde(flatten)]
    pub unit: Unit,
    #[serde(rename = "propertyName")]
    pub property_name: String,
    #[serde(rename = "propertyAddress")]
    pub property_address: String,
}

#[derive(Debug, Clone, Default)]
pub struct VacantFilter {
    pub min_rent: Option<i64>,
    pub max_rent: Option<i64>,
    pub property_id: Option<Uuid>,
    /// Substring match over property name, address and unit label.
    pub query: Option<String>,
}

impl Store {
    pub fn create_unit(
        &self,
        landlord_id: Uuid,
        property_id: Uuid,
        label: &str,
        rent_amount: i64,
    ) -> StoreResult<Unit> {
        // Creating under someone else's property reads as absent.
        self.property_by_id(&RowScope::Landlord(landlord_id), property_id)?;
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO units (id, property_id, label, rent_amount, occupancy, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'vacant', ?5)",
                params![
                    id.to_string(),
                    property_id.to_string(),
                    label,
                    rent_amount,
                    created_at
                ],
            )
            .map_err(|e| constraint_to_conflict(e, "unit label already exists in this property"))?;
        }
        self.publish(vec![ChangeEvent::new("unit", "created", id).landlord(landlord_id)]);
        Ok(Unit {
            id,
            property_id,
            label: label.to_string(),
            rent_amount,
            occupancy: OccupancyStatus::Vacant,
            created_at,
        })
    }

    pub fn unit_by_id(&self, scope: &RowScope, id: Uuid) -> StoreResult<Unit> {
        let conn = self.conn()?;
        let found = match scope {
            RowScope::All => conn
                .query_row(
                    &format!("SELECT {UNIT_COLS} FROM units u WHERE u.id = ?1"),
                    params![id.to_string()],
                    unit_from_row,
                )
                .optional()?,
            RowScope::Landlord(landlord) => conn
                .query_row(
                    &format!(
                        "SELECT {UNIT_COLS} FROM units u
                         JOIN properties p ON p.id = u.property_id
                         WHERE u.id = ?1 AND p.landlord_id = ?2"
                    ),
                    params![id.to_string(), landlord.to_string()],
                    unit_from_row,
                )
                .optional()?,
            // Tenants see any vacant unit (public listing) plus units
            // they filed against or rent.
            RowScope::Tenant(tenant) => conn
                .query_row(
                    &format!(
                        "SELECT {UNIT_COLS} FROM units u
                         WHERE u.id = ?1 AND (u.occupancy = 'vacant'
                            OR EXISTS (SELECT 1 FROM tenancies t
                                       WHERE t.unit_id = u.id AND t.tenant_id = ?2)
                            OR EXISTS (SELECT 1 FROM join_requests jr
                                       WHERE jr.unit_id = u.id AND jr.tenant_id = ?2))"
                    ),
                    params![id.to_string(), tenant.to_string()],
                    unit_from_row,
                )
                .optional()?,
        };
        found.ok_or(StoreError::NotFound("unit"))
    }

    /// Units of one property. Tenants get the vacant subset only.
    pub fn list_units(&self, scope: &RowScope, property_id: Uuid) -> StoreResult<Vec<Unit>> {
        // Property visibility first, so an out-of-scope property 404s
        // rather than returning an empty list.
        self.property_by_id(scope, property_id)?;
        let conn = self.conn()?;
        let sql = match scope {
            RowScope::Tenant(_) => format!(
                "SELECT {UNIT_COLS} FROM units u
                 WHERE u.property_id = ?1 AND u.occupancy = 'vacant' ORDER BY u.label"
            ),
            _ => format!(
                "SELECT {UNIT_COLS} FROM units u WHERE u.property_id = ?1 ORDER BY u.label"
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![property_id.to_string()], unit_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The public vacant listing: every vacant unit matching the filter,
    /// with property context for display.
    pub fn browse_vacant(&self, filter: &VacantFilter) -> StoreResult<Vec<UnitListing>> {
        let mut sql = format!(
            "SELECT {UNIT_COLS}, p.name, p.address FROM units u
             JOIN properties p ON p.id = u.property_id
             WHERE u.occupancy = 'vacant'"
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(min) = filter.min_rent {
            sql.push_str(" AND u.rent_amount >= ?");
            args.push(Value::Integer(min));
        }
        if let Some(max) = filter.max_rent {
            sql.push_str(" AND u.rent_amount <= ?");
            args.push(Value::Integer(max));
        }
        if let Some(property_id) = filter.property_id {
            sql.push_str(" AND u.property_id = ?");
            args.push(Value::Text(property_id.to_string()));
        }
        if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
            sql.push_str(
                " AND (p.name LIKE ? ESCAPE '\\'
                   OR p.address LIKE ? ESCAPE '\\'
                   OR u.label LIKE ? ESCAPE '\\')",
            );
            let pattern = like_contains(query.trim());
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }
        sql.push_str(" ORDER BY p.name, u.label");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let unit = unit_from_row(row)?;
            let property_name: String = row.get(6)?;
            let property_address: String = row.get(7)?;
            Ok(UnitListing {
                unit,
                property_name,
                property_address,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn update_unit(
        &self,
        landlord_id: Uuid,
        id: Uuid,
        label: Option<&str>,
        rent_amount: Option<i64>,
    ) -> StoreResult<Unit> {
        let affected = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE units
                 SET label = COALESCE(?3, label), rent_amount = COALESCE(?4, rent_amount)
                 WHERE id = ?1 AND property_id IN
                   (SELECT id FROM properties WHERE landlord_id = ?2)",
                params![id.to_string(), landlord_id.to_string(), label, rent_amount],
            )
            .map_err(|e| constraint_to_conflict(e, "unit label already exists in this property"))?
        };
        if affected == 0 {
            return Err(StoreError::NotFound("unit"));
        }
        self.publish(vec![ChangeEvent::new("unit", "updated", id).landlord(landlord_id)]);
        self.unit_by_id(&RowScope::Landlord(landlord_id), id)
    }
}
