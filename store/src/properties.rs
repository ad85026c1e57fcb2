use chrono::Utc;
use letting::Property;
use porter::RowScope;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::changes::ChangeEvent;
use crate::error::{StoreError, StoreResult};
use crate::row::get_uuid;
use crate::Store;

const PROPERTY_COLS: &str = "p.id, p.landlord_id, p.name, p.address, p.created_at";

/// Reachability predicate for tenants: properties they hold (or held) a
/// tenancy in, or have filed a join request against.
const TENANT_REACH: &str = "(EXISTS (
        SELECT 1 FROM units u JOIN tenancies t ON t.unit_id = u.id
        WHERE u.property_id = p.id AND t.tenant_id = ?1
    ) OR EXISTS (
        SELECT 1 FROM units u JOIN join_requests jr ON jr.unit_id = u.id
        WHERE u.property_id = p.id AND jr.tenant_id = ?1
    ))";

fn property_from_row(row: &Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: get_uuid(row, 0)?,
        landlord_id: get_uuid(row, 1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Store {
    pub fn create_property(
        &self,
        landlord_id: Uuid,
        name: &str,
        address: &str,
    ) -> StoreResult<Property> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO properties (id, landlord_id, name, address, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    landlord_id.to_string(),
                    name,
                    address,
                    created_at
                ],
            )?;
        }
        self.publish(vec![
            ChangeEvent::new("property", "created", id).landlord(landlord_id)
        ]);
        Ok(Property {
            id,
            landlord_id,
            name: name.to_string(),
            address: address.to_string(),
            created_at,
        })
    }

    pub fn property_by_id(&self, scope: &RowScope, id: Uuid) -> StoreResult<Property> {
        let conn = self.conn()?;
        let found = match scope {
            RowScope::All => conn
                .query_row(
                    &format!("SELECT {PROPERTY_COLS} FROM properties p WHERE p.id = ?1"),
                    params![id.to_string()],
                    property_from_row,
                )
                .optional()?,
            RowScope::Landlord(landlord) => conn
                .query_row(
                    &format!(
                        "SELECT {PROPERTY_COLS} FROM properties p
                         WHERE p.id = ?1 AND p.landlord_id = ?2"
                    ),
                    params![id.to_string(), landlord.to_string()],
                    property_from_row,
                )
                .optional()?,
            RowScope::Tenant(tenant) => conn
                .query_row(
                    &format!(
                        "SELECT {PROPERTY_COLS} FROM properties p
                         WHERE p.id = ?2 AND {TENANT_REACH}"
                    ),
                    params![tenant.to_string(), id.to_string()],
                    property_from_row,
                )
                .optional()?,
        };
        found.ok_or(StoreError::NotFound("property"))
    }

    pub fn list_properties(&self, scope: &RowScope) -> StoreResult<Vec<Property>> {
        let conn = self.conn()?;
        let mut out = Vec::new();
        match scope {
            RowScope::All => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PROPERTY_COLS} FROM properties p ORDER BY p.name"
                ))?;
                let rows = stmt.query_map([], property_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            RowScope::Landlord(landlord) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PROPERTY_COLS} FROM properties p
                     WHERE p.landlord_id = ?1 ORDER BY p.name"
                ))?;
                let rows = stmt.query_map(params![landlord.to_string()], property_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            RowScope::Tenant(tenant) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PROPERTY_COLS} FROM properties p
                     WHERE {TENANT_REACH} ORDER BY p.name"
                ))?;
                let rows = stmt.query_map(params![tenant.to_string()], property_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Rename or re-address a property. The write is scoped to the
    /// owner, so someone else's property reads as absent.
    pub fn update_property(
        &self,
        landlord_id: Uuid,
        id: Uuid,
        name: Option<&str>,
        address: Option<&str>,
    ) -> StoreResult<Property> {
        let affected = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE properties
                 SET name = COALESCE(?3, name), address = COALESCE(?4, address)
                 WHERE id = ?1 AND landlord_id = ?2",
                params![id.to_string(), landlord_id.to_string(), name, address],
            )?
        };
        if affected == 0 {
            return Err(StoreError::NotFound("property"));
        }
        self.publish(vec![
            ChangeEvent::new("property", "updated", id).landlord(landlord_id)
        ]);
        self.property_by_id(&RowScope::Landlord(landlord_id), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use letting::Role;

    #[test]
    fn test_landlords_see_only_their_properties() {
        let store = testutil::store();
        let alice = testutil::profile(&store, "alice@example.com", Role::Landlord);
        let bob = testutil::profile(&store, "bob@example.com", Role::Landlord);
        let mine = store
            .create_property(alice.id, "Kisementi Court", "Plot 12, Kampala")
            .unwrap();
        store
            .create_property(bob.id, "Hilltop Flats", "Plot 3, Mbarara")
            .unwrap();

        let listed = store.list_properties(&RowScope::Landlord(alice.id)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        let err = store
            .property_by_id(&RowScope::Landlord(bob.id), mine.id)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("property")));
        assert_eq!(store.list_properties(&RowScope::All).unwrap().len(), 2);
    }

    #[test]
    fn test_update_is_scoped_to_the_owner() {
        let store = testutil::store();
        let alice = testutil::profile(&store, "alice@example.com", Role::Landlord);
        let bob = testutil::profile(&store, "bob@example.com", Role::Landlord);
        let property = testutil::property(&store, alice.id);

        let renamed = store
            .update_property(alice.id, property.id, Some("Kisementi Annex"), None)
            .unwrap();
        assert_eq!(renamed.name, "Kisementi Annex");
        assert_eq!(renamed.address, property.address);

        let err = store
            .update_property(bob.id, property.id, Some("Stolen"), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("property")));
    }

    #[test]
    fn test_tenant_reaches_property_through_join_request() {
        let store = testutil::store();
        let landlord = testutil::profile(&store, "owner@example.com", Role::Landlord);
        let tenant = testutil::profile(&store, "tenant@example.com", Role::Tenant);
        let property = testutil::property(&store, landlord.id);
        let unit = testutil::unit(&store, landlord.id, property.id, "A1", 450_000);

        let scope = RowScope::Tenant(tenant.id);
        assert!(store.property_by_id(&scope, property.id).is_err());

        store
            .file_join_request(crate::NewJoinRequest {
                tenant_id: tenant.id,
                unit_id: unit.id,
                message: None,
            })
            .unwrap();
        let reached = store.property_by_id(&scope, property.id).unwrap();
        assert_eq!(reached.id, property.id);
        assert_eq!(store.list_properties(&scope).unwrap().len(), 1);
    }
}
