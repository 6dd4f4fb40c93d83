//! SQLite-backed slot storage over a `kv_slots` table.
//!
//! # Invariants
//! - The table layout is versioned through `PRAGMA user_version`; a file
//!   written by a newer layout is refused instead of being reinterpreted.
//! - Slots are never read or written before the layout is in place.

use super::{validate_key, StorageBackend, StorageError, StorageResult};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::path::Path;
use std::time::{Duration, Instant};

/// Slot table layout version written to `PRAGMA user_version`.
pub const SLOT_SCHEMA_VERSION: u32 = 1;

const KV_SLOTS_SQL: &str = include_str!("kv_slots.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Slot storage owning one SQLite connection.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens a database file and creates the slot table when missing.
    ///
    /// # Errors
    /// - `UnsupportedSchema` when the file carries a newer layout version.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::bootstrap("file", || Connection::open(path))
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::bootstrap("memory", Connection::open_in_memory)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn bootstrap(
        mode: &'static str,
        open: impl FnOnce() -> rusqlite::Result<Connection>,
    ) -> StorageResult<Self> {
        let started_at = Instant::now();
        let prepared = open()
            .map_err(StorageError::from)
            .and_then(|mut conn| prepare_slot_table(&mut conn).map(|()| conn));

        match prepared {
            Ok(conn) => {
                info!(
                    "event=slot_db_open module=storage status=ok mode={} schema_version={} duration_ms={}",
                    mode,
                    SLOT_SCHEMA_VERSION,
                    started_at.elapsed().as_millis()
                );
                Ok(Self { conn })
            }
            Err(err) => {
                error!(
                    "event=slot_db_open module=storage status=error mode={} duration_ms={} error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn prepare_slot_table(conn: &mut Connection) -> StorageResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    match found.cmp(&SLOT_SCHEMA_VERSION) {
        Ordering::Greater => Err(StorageError::UnsupportedSchema {
            found,
            supported: SLOT_SCHEMA_VERSION,
        }),
        Ordering::Equal => Ok(()),
        Ordering::Less => {
            let tx = conn.transaction()?;
            tx.execute_batch(KV_SLOTS_SQL)?;
            tx.pragma_update(None, "user_version", SLOT_SCHEMA_VERSION)?;
            tx.commit()?;
            Ok(())
        }
    }
}

impl StorageBackend for SqliteStorage {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let value = self
            .conn
            .query_row(
                "SELECT slot_value FROM kv_slots WHERE slot_key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.conn.execute(
            "INSERT INTO kv_slots (slot_key, slot_value)
             VALUES (?1, ?2)
             ON CONFLICT(slot_key) DO UPDATE SET
                slot_value = excluded.slot_value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.conn
            .execute("DELETE FROM kv_slots WHERE slot_key = ?1;", [key])?;
        Ok(())
    }
}
