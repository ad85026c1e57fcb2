//! Schema migrations, versioned through `PRAGMA user_version`.
//!
//! Each entry runs inside its own transaction; the version pragma is
//! bumped in the same transaction so a crash never leaves a half-applied
//! migration behind.

use rusqlite::Connection;
use tracing::info;

use crate::error::StoreResult;

const MIGRATIONS: &[&str] = &[
    // v1: full letting schema.
    "
    CREATE TABLE profiles (
      id TEXT PRIMARY KEY,
      email TEXT NOT NULL UNIQUE COLLATE NOCASE,
      password_hash TEXT NOT NULL,
      display_name TEXT NOT NULL,
      phone TEXT,
      role TEXT NOT NULL CHECK (role IN ('tenant','landlord','admin')),
      created_at TEXT NOT NULL
    );

    CREATE TABLE properties (
      id TEXT PRIMARY KEY,
      landlord_id TEXT NOT NULL REFERENCES profiles(id),
      name TEXT NOT NULL,
      address TEXT NOT NULL,
      created_at TEXT NOT NULL
    );
    CREATE INDEX idx_properties_landlord ON properties(landlord_id);

    CREATE TABLE units (
      id TEXT PRIMARY KEY,
      property_id TEXT NOT NULL REFERENCES properties(id),
      label TEXT NOT NULL,
      rent_amount INTEGER NOT NULL CHECK (rent_amount >= 0),
      occupancy TEXT NOT NULL DEFAULT 'vacant' CHECK (occupancy IN ('vacant','occupied')),
      created_at TEXT NOT NULL,
      UNIQUE (property_id, label)
    );
    CREATE INDEX idx_units_property ON units(property_id);
    CREATE INDEX idx_units_occupancy ON units(occupancy);

    CREATE TABLE join_requests (
      id TEXT PRIMARY KEY,
      unit_id TEXT NOT NULL REFERENCES units(id),
      tenant_id TEXT NOT NULL REFERENCES profiles(id),
      message TEXT,
      status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending','approved','rejected')),
      created_at TEXT NOT NULL,
      decided_by TEXT REFERENCES profiles(id),
      decided_at TEXT,
      decision_note TEXT
    );
    CREATE INDEX idx_join_requests_unit ON join_requests(unit_id);
    CREATE INDEX idx_join_requests_tenant ON join_requests(tenant_id);
    CREATE UNIQUE INDEX idx_join_requests_one_pending
      ON join_requests(unit_id, tenant_id) WHERE status = 'pending';

    CREATE TABLE tenancies (
      id TEXT PRIMARY KEY,
      unit_id TEXT NOT NULL REFERENCES units(id),
      tenant_id TEXT NOT NULL REFERENCES profiles(id),
      rent_amount INTEGER NOT NULL CHECK (rent_amount >= 0),
      started_on TEXT NOT NULL,
      ended_on TEXT,
      status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active','ended'))
    );
    CREATE INDEX idx_tenancies_unit ON tenancies(unit_id);
    CREATE INDEX idx_tenancies_tenant ON tenancies(tenant_id);
    CREATE UNIQUE INDEX idx_tenancies_one_active_per_unit
      ON tenancies(unit_id) WHERE status = 'active';

    CREATE TABLE payments (
      id TEXT PRIMARY KEY,
      tenancy_id TEXT NOT NULL REFERENCES tenancies(id),
      amount INTEGER NOT NULL CHECK (amount > 0),
      paid_on TEXT NOT NULL,
      method TEXT NOT NULL CHECK (method IN ('cash','bank','momo')),
      status TEXT NOT NULL CHECK (status IN ('pending','confirmed','failed')),
      reference TEXT UNIQUE,
      recorded_at TEXT NOT NULL
    );
    CREATE INDEX idx_payments_tenancy ON payments(tenancy_id);
    CREATE INDEX idx_payments_paid_on ON payments(paid_on);

    CREATE TABLE maintenance_requests (
      id TEXT PRIMARY KEY,
      unit_id TEXT NOT NULL REFERENCES units(id),
      tenant_id TEXT NOT NULL REFERENCES profiles(id),
      summary TEXT NOT NULL,
      detail TEXT,
      status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open','in_progress','resolved')),
      opened_at TEXT NOT NULL,
      resolved_at TEXT
    );
    CREATE INDEX idx_maintenance_unit ON maintenance_requests(unit_id);
    CREATE INDEX idx_maintenance_tenant ON maintenance_requests(tenant_id);
    ",
];

pub(crate) fn current_version(conn: &Connection) -> StoreResult<i64> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Apply every migration past the database's recorded version. Returns
/// the version after migration.
pub(crate) fn migrate(conn: &mut Connection) -> StoreResult<i64> {
    let mut version = current_version(conn)?;
    while (version as usize) < MIGRATIONS.len() {
        let next = version + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(MIGRATIONS[version as usize])?;
        tx.pragma_update(None, "user_version", next)?;
        tx.commit()?;
        info!(from = version, to = next, "applied schema migration");
        version = next;
    }
    Ok(version)
}
