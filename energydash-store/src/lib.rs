// EnergyDash Store - SQLite persistence adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EnergyDash Store
//!
//! SQLite persistence for measurement rows and notifications.
//!
//! [`SqliteStore`] implements [`energydash::MeasurementSink`], so an
//! [`energydash::IngestPipeline`] can load parsed exports straight into it.
//! Every batch insert runs in one transaction.
//!
//! ## Example
//!
//! ```rust
//! use energydash::{NewNotification, NotificationCategory};
//! use energydash_store::SqliteStore;
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! let event = store
//!     .insert_notification(&NewNotification::new(
//!         "Accu bijna leeg",
//!         "Het accuniveau is gedaald tot 12,00 %.",
//!         NotificationCategory::Warning,
//!     ))
//!     .unwrap();
//!
//! assert!(store.mark_notification_read(event.id).unwrap());
//! assert!(store.notification(event.id).unwrap().unwrap().read);
//! ```

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{info, warn};
use rusqlite::Connection;

pub mod error;
pub mod measurements;
pub mod notifications;
pub mod schema;

pub use error::{Result, StoreError};
pub use measurements::{DailyAverage, StoredMeasurement};
pub use schema::MEASUREMENT_FIELDS;

/// SQLite-backed store shared by all request handlers
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the tables exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        if let Err(e) =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        {
            warn!("Failed to enable WAL mode: {}", e);
        }

        let store = Self::from_connection(conn)?;
        info!("Opened database {}", path.display());
        Ok(store)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Create the fixed tables if absent
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::ensure_schema(&conn)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Cap a caller-supplied limit to SQLite's integer range
pub(crate) fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("energy.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.measurement_count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("energy.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_notification(&energydash::NewNotification::new(
                    "t",
                    "m",
                    energydash::NotificationCategory::Info,
                ))
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.notifications(10).unwrap().len(), 1);
    }
}
