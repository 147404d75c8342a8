//! Durable SQLite-backed log of sensor readings.
//!
//! One `LocalStore` per sensor kind, identical schema, following the
//! teacher's `forwarder::storage::journal`: WAL mode, `synchronous=FULL`,
//! `PRAGMA integrity_check` at open, schema applied from an embedded
//! `schema.sql`.

use chrono::{Duration as ChronoDuration, Utc};
use fireline_protocol::Reading;
use rusqlite::{params, Connection};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),
    #[error("stored payload could not be decoded: {0}")]
    Corrupt(String),
}

/// One unsent row, as handed to the Retry Sender.
#[derive(Debug, Clone)]
pub struct UnsentRow {
    pub id: i64,
    pub reading: Reading,
}

pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Open (or create) the store at `path`, applying pragmas and the
    /// schema and verifying integrity. Fails fast if the file is corrupt.
    pub fn open(path: &Path) -> Result<Self, LocalStoreError> {
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        run_integrity_check(&conn)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(LocalStore { conn })
    }

    /// Persist a reading. Commits before returning; returns the row id.
    pub fn save(&mut self, reading: &Reading) -> Result<i64, LocalStoreError> {
        let payload = serde_json::to_string(reading)
            .map_err(|e| LocalStoreError::Corrupt(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO readings (timestamp, device, payload, sent, received_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                reading.timestamp(),
                reading.device().as_str(),
                payload,
                now_iso8601(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Up to `limit` unsent rows, oldest (lowest `id`) first.
    pub fn fetch_unsent(&self, limit: u32) -> Result<Vec<UnsentRow>, LocalStoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, payload FROM readings WHERE sent = 0 ORDER BY id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let id: i64 = row.get(0)?;
            let payload: String = row.get(1)?;
            Ok((id, payload))
        })?;

        let mut out = Vec::new();
        for r in rows {
            let (id, payload) = r?;
            let reading: Reading = serde_json::from_str(&payload)
                .map_err(|e| LocalStoreError::Corrupt(e.to_string()))?;
            out.push(UnsentRow { id, reading });
        }
        Ok(out)
    }

    /// Atomically flip `sent` 0→1 for every id. All-or-nothing.
    pub fn mark_sent(&mut self, ids: &[i64]) -> Result<(), LocalStoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for id in ids {
            tx.execute("UPDATE readings SET sent = 1 WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete sent rows older than `retention`. Never touches `sent = 0`
    /// rows.
    pub fn prune(&mut self, retention: std::time::Duration) -> Result<i64, LocalStoreError> {
        let cutoff = now_iso8601_minus(retention);
        let deleted = self.conn.execute(
            "DELETE FROM readings WHERE sent = 1 AND received_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted as i64)
    }

    pub fn count_unsent(&self) -> Result<i64, LocalStoreError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM readings WHERE sent = 0", [], |row| {
                    row.get(0)
                })?;
        Ok(count)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), LocalStoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=FULL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

fn run_integrity_check(conn: &Connection) -> Result<(), LocalStoreError> {
    let result: String = conn.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
    if result != "ok" {
        return Err(LocalStoreError::IntegrityCheckFailed(result));
    }
    Ok(())
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn now_iso8601_minus(duration: std::time::Duration) -> String {
    let delta = ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero());
    (Utc::now() - delta).to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fireline_protocol::{AccelReading, Triple};
    use tempfile::tempdir;

    fn sample_reading(ts: &str) -> Reading {
        Reading::Accel(AccelReading {
            timestamp: ts.to_owned(),
            acc: Triple::new(0.0, 0.0, 8.0),
            gyro: Triple::new(0.0, 0.0, 0.0),
            angle: Triple::new(0.0, 0.0, 0.0),
        })
    }

    #[test]
    fn save_then_fetch_unsent_round_trips() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::open(&dir.path().join("accel.sqlite3")).unwrap();
        let id = store.save(&sample_reading("2026-01-01T00:00:00.000Z")).unwrap();
        assert_eq!(id, 1);

        let unsent = store.fetch_unsent(10).unwrap();
        assert_eq!(unsent.len(), 1);
        assert_eq!(unsent[0].id, 1);
        assert_eq!(unsent[0].reading, sample_reading("2026-01-01T00:00:00.000Z"));
    }

    #[test]
    fn mark_sent_removes_rows_from_unsent_fetch() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::open(&dir.path().join("accel.sqlite3")).unwrap();
        let id = store.save(&sample_reading("2026-01-01T00:00:00.000Z")).unwrap();
        store.mark_sent(&[id]).unwrap();
        assert_eq!(store.fetch_unsent(10).unwrap().len(), 0);
        assert_eq!(store.count_unsent().unwrap(), 0);
    }

    #[test]
    fn prune_never_deletes_unsent_rows() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::open(&dir.path().join("accel.sqlite3")).unwrap();
        store.save(&sample_reading("2026-01-01T00:00:00.000Z")).unwrap();
        let deleted = store.prune(std::time::Duration::from_secs(0)).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(store.count_unsent().unwrap(), 1);
    }

    #[test]
    fn fetch_unsent_orders_by_id_ascending() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::open(&dir.path().join("accel.sqlite3")).unwrap();
        store.save(&sample_reading("2026-01-01T00:00:00.100Z")).unwrap();
        store.save(&sample_reading("2026-01-01T00:00:00.200Z")).unwrap();
        let rows = store.fetch_unsent(10).unwrap();
        assert!(rows[0].id < rows[1].id);
    }
}
