use chrono::Utc;
use letting::{Profile, Role};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::changes::ChangeEvent;
use crate::error::{constraint_to_conflict, StoreError, StoreResult};
use crate::row::{get_parsed, get_uuid};
use crate::Store;

const PROFILE_COLS: &str = "id, email, display_name, phone, role, created_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: get_uuid(row, 0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        phone: row.get(3)?,
        role: get_parsed(row, 4)?,
        created_at: row.get(5)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

impl Store {
    pub fn create_profile(&self, new: NewProfile) -> StoreResult<Profile> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO profiles (id, email, password_hash, display_name, phone, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    new.email,
                    new.password_hash,
                    new.display_name,
                    new.phone,
                    new.role.to_string(),
                    created_at,
                ],
            )
            .map_err(|e| constraint_to_conflict(e, "email already registered"))?;
        }
        let profile = Profile {
            id,
            email: new.email,
            display_name: new.display_name,
            phone: new.phone,
            role: new.role,
            created_at,
        };
        let mut event = ChangeEvent::new("profile", "created", id);
        match new.role {
            Role::Landlord => event = event.landlord(id),
            Role::Tenant => event = event.tenant(id),
            Role::Admin => {}
        }
        self.publish(vec![event]);
        Ok(profile)
    }

    pub fn profile_by_id(&self, id: Uuid) -> StoreResult<Profile> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {PROFILE_COLS} FROM profiles WHERE id = ?1"),
            params![id.to_string()],
            profile_from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound("profile"))
    }

    pub fn profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {PROFILE_COLS} FROM profiles WHERE email = ?1"),
                params![email],
                profile_from_row,
            )
            .optional()?)
    }

    /// Login lookup: the profile together with its password hash.
    pub fn credentials_by_email(&self, email: &str) -> StoreResult<Option<(Profile, String)>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {PROFILE_COLS}, password_hash FROM profiles WHERE email = ?1"),
                params![email],
                |row| {
                    let profile = profile_from_row(row)?;
                    let hash: String = row.get(6)?;
                    Ok((profile, hash))
                },
            )
            .optional()?)
    }

    pub fn list_profiles(&self, role: Option<Role>) -> StoreResult<Vec<Profile>> {
        let conn = self.conn()?;
        let mut out = Vec::new();
        match role {
            Some(role) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PROFILE_COLS} FROM profiles WHERE role = ?1 ORDER BY created_at"
                ))?;
                let rows = stmt.query_map(params![role.to_string()], profile_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PROFILE_COLS} FROM profiles ORDER BY created_at"
                ))?;
                let rows = stmt.query_map([], profile_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_profile(email: &str, role: Role) -> NewProfile {
        NewProfile {
            email: email.to_string(),
            password_hash: "argon2-hash".to_string(),
            display_name: "Someone".to_string(),
            phone: None,
            role,
        }
    }

    #[test]
    fn test_create_and_fetch_profile() {
        let store = Store::open_in_memory().unwrap();
        let created = store
            .create_profile(new_profile("amina@example.com", Role::Tenant))
            .unwrap();
        let fetched = store.profile_by_id(created.id).unwrap();
        assert_eq!(fetched.email, "amina@example.com");
        assert_eq!(fetched.role, Role::Tenant);
    }

    #[test]
    fn test_email_lookup_is_case_insensitive() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_profile(new_profile("Amina@Example.com", Role::Tenant))
            .unwrap();
        let found = store.profile_by_email("amina@example.com").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_duplicate_email_is_a_conflict() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_profile(new_profile("amina@example.com", Role::Tenant))
            .unwrap();
        let err = store
            .create_profile(new_profile("AMINA@example.com", Role::Landlord))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_credentials_carry_the_stored_hash() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_profile(new_profile("owner@example.com", Role::Landlord))
            .unwrap();
        let (profile, hash) = store
            .credentials_by_email("owner@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(profile.role, Role::Landlord);
        assert_eq!(hash, "argon2-hash");
    }

    #[test]
    fn test_list_profiles_filters_by_role() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_profile(new_profile("a@example.com", Role::Tenant))
            .unwrap();
        store
            .create_profile(new_profile("b@example.com", Role::Landlord))
            .unwrap();
        assert_eq!(store.list_profiles(Some(Role::Tenant)).unwrap().len(), 1);
        assert_eq!(store.list_profiles(None).unwrap().len(), 2);
    }
}
