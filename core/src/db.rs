use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::AppState;

/// Fixed key under which the whole application state blob is stored.
pub const STORAGE_KEY: &str = "psmf_app_data_v3";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Raw blobs ---

    pub fn put_blob(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_blob(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete_blob(&self, key: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    // --- Application state ---

    pub fn save_state(&self, state: &AppState) -> Result<()> {
        let json = serde_json::to_string(state).context("Failed to serialize app state")?;
        self.put_blob(STORAGE_KEY, &json)?;
        tracing::debug!(bytes = json.len(), "saved app state");
        Ok(())
    }

    /// Load the saved state. A missing or malformed blob yields `None` so the
    /// caller falls back to onboarding; only storage failures are errors.
    pub fn load_state(&self) -> Result<Option<AppState>> {
        let Some(json) = self.get_blob(STORAGE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<AppState>(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(error = %e, "stored app state is malformed, ignoring it");
                Ok(None)
            }
        }
    }

    pub fn clear_state(&self) -> Result<bool> {
        self.delete_blob(STORAGE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayLog, DayStatus, Gender, HabitState, UserProfile};
    use chrono::NaiveDate;

    fn sample_state() -> AppState {
        AppState {
            profile: Some(UserProfile {
                start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                target_date: NaiveDate::from_ymd_opt(2024, 7, 31).unwrap(),
                height_cm: 180.0,
                start_weight: 95.0,
                current_weight: 94.0,
                target_weight: 85.0,
                age: 34,
                gender: Gender::Male,
            }),
            entries: Vec::new(),
            habits: HabitState {
                water_ml: 1500,
                sleep_start: Some("23:30".to_string()),
                ..HabitState::default()
            },
            history: vec![DayLog {
                date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                score: 63,
                weight: 95.0,
                status: DayStatus::Good,
                details: None,
            }],
        }
    }

    #[test]
    fn test_migrate_sets_version() {
        let db = Database::open_in_memory().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_blob_put_get_delete() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_blob("k").unwrap().is_none());

        db.put_blob("k", "one").unwrap();
        assert_eq!(db.get_blob("k").unwrap().as_deref(), Some("one"));

        db.put_blob("k", "two").unwrap();
        assert_eq!(db.get_blob("k").unwrap().as_deref(), Some("two"));

        assert!(db.delete_blob("k").unwrap());
        assert!(!db.delete_blob("k").unwrap());
        assert!(db.get_blob("k").unwrap().is_none());
    }

    #[test]
    fn test_state_absent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_state().unwrap().is_none());
    }

    #[test]
    fn test_state_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let state = sample_state();
        db.save_state(&state).unwrap();
        assert_eq!(db.load_state().unwrap(), Some(state));
    }

    #[test]
    fn test_malformed_state_is_absent() {
        let db = Database::open_in_memory().unwrap();
        db.put_blob(STORAGE_KEY, "{not json").unwrap();
        assert!(db.load_state().unwrap().is_none());

        db.put_blob(STORAGE_KEY, r#"{"profile": {"age": "old"}}"#).unwrap();
        assert!(db.load_state().unwrap().is_none());
    }

    #[test]
    fn test_clear_state() {
        let db = Database::open_in_memory().unwrap();
        db.save_state(&sample_state()).unwrap();
        assert!(db.clear_state().unwrap());
        assert!(db.load_state().unwrap().is_none());
    }

    #[test]
    fn test_state_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psmf.db");
        {
            let db = Database::open(&path).unwrap();
            db.save_state(&sample_state()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.load_state().unwrap(), Some(sample_state()));
    }
}
