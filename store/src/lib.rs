//! Embedded SQLite persistence for Hearth.
//!
//! One connection behind a mutex, shared by cloning the [`Store`]
//! handle; async callers bridge with `tokio::task::spawn_blocking`.
//! Every committed write publishes a [`ChangeEvent`] on a broadcast
//! channel so the SSE layer can nudge clients to refetch.
//!
//! Reads take a [`porter::RowScope`] and compile it into SQL
//! predicates; a row outside the caller's scope is indistinguishable
//! from an absent row.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;
use tracing::debug;

mod changes;
mod error;
mod join_requests;
mod maintenance;
mod payments;
mod profiles;
mod properties;
mod row;
mod schema;
mod stats;
mod tenancies;
#[cfg(test)]
mod testutil;
mod units;

pub use changes::ChangeEvent;
pub use error::{StoreError, StoreResult};
pub use porter::RowScope;
pub use join_requests::NewJoinRequest;
pub use payments::{NewManualPayment, NewMomoPayment};
pub use profiles::NewProfile;
pub use tenancies::TenancyDetail;
pub use units::{UnitListing, VacantFilter};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Store {
    /// Open (creating if absent) and migrate the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=5000;
            ",
        )?;
        let version = schema::migrate(&mut conn)?;
        debug!(version, "store opened");
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    pub fn schema_version(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        schema::current_version(&conn)
    }

    /// Subscribe to committed-write hints. Lagging receivers drop the
    /// oldest events; that is harmless because events only trigger
    /// refetches.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub(crate) fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Publish change hints after the transaction that produced them
    /// has committed and the connection lock is released.
    pub(crate) fn publish(&self, events: Vec<ChangeEvent>) {
        for event in events {
            debug!(entity = event.entity, op = event.op, id = %event.id, "change");
            let _ = self.changes.send(event);
        }
    }
}
