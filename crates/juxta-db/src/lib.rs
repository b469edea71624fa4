// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use juxta_app::{
    HistoryStore, SaveOutcome, SnapshotPayload, VersionSnapshot, normalize_entity_name,
    save_if_changed,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "juxta";
pub const ACTIVE_ENTITIES_KEY: &str = "active-entities";
pub const HISTORY_KEY_PREFIX: &str = "versions:";

const KV_TABLE: &str = "kv_entries";
const KV_COLUMNS: [&str; 3] = ["key", "value", "updated_at"];

/// Key/value persistence for history and session state.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        validate_db_path(&path.to_string_lossy())?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the schema in an empty database, else checks the existing one.
    pub fn bootstrap(&self) -> Result<()> {
        let tables = user_tables(&self.conn)?;
        if tables.is_empty() {
            return self
                .conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema");
        }
        validate_schema(&self.conn, &tables)
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read entry {key}"))
    }

    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO kv_entries (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert entry {key}"))?;
        Ok(())
    }

    pub fn delete_raw(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM kv_entries WHERE key = ?", params![key])
            .with_context(|| format!("delete entry {key}"))?;
        Ok(removed > 0)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_entries WHERE substr(key, 1, ?) = ? ORDER BY key ASC")
            .context("prepare key listing")?;
        let rows = stmt
            .query_map(params![prefix.len() as i64, prefix], |row| {
                row.get::<_, String>(0)
            })
            .with_context(|| format!("list keys under {prefix}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect keys under {prefix}"))
    }

    /// Entities that have at least one stored version, alphabetically.
    pub fn history_entities(&self) -> Result<Vec<String>> {
        Ok(self
            .keys_with_prefix(HISTORY_KEY_PREFIX)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(HISTORY_KEY_PREFIX).map(str::to_owned))
            .collect())
    }

    pub fn clear_history(&self, entity: &str) -> Result<bool> {
        let removed = self.delete_raw(&history_key(entity))?;
        if removed {
            tracing::info!(entity, "history cleared");
        }
        Ok(removed)
    }

    pub fn save_version_if_changed(
        &self,
        entity: &str,
        payload: SnapshotPayload,
    ) -> Result<SaveOutcome> {
        save_if_changed(self, entity, payload, OffsetDateTime::now_utc())
    }

    pub fn load_active_entities(&self) -> Result<Vec<String>> {
        let Some(raw) = self.get_raw(ACTIVE_ENTITIES_KEY)? else {
            return Ok(Vec::new());
        };
        let names: Vec<String> = serde_json::from_str(&raw).with_context(|| {
            format!(
                "entry `{ACTIVE_ENTITIES_KEY}` is not a JSON list of names; run `juxta --reset-session` to clear it"
            )
        })?;
        let mut seen = BTreeSet::new();
        Ok(names
            .iter()
            .map(|name| normalize_entity_name(name))
            .filter(|name| !name.is_empty() && seen.insert(name.clone()))
            .collect())
    }

    pub fn reset_session(&self) -> Result<bool> {
        self.delete_raw(ACTIVE_ENTITIES_KEY)
    }

    pub fn save_active_entities(&self, names: &[String]) -> Result<()> {
        let raw = serde_json::to_string(names).context("encode active entity list")?;
        self.put_raw(ACTIVE_ENTITIES_KEY, &raw)
    }
}

impl HistoryStore for Store {
    fn load_history(&self, entity: &str) -> Result<Vec<VersionSnapshot>> {
        let key = history_key(entity);
        let Some(raw) = self.get_raw(&key)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).with_context(|| {
            format!(
                "stored history `{key}` is corrupt; delete it with `juxta --clear-history {entity}`"
            )
        })
    }

    fn save_history(&self, entity: &str, history: &[VersionSnapshot]) -> Result<()> {
        let raw = serde_json::to_string(history)
            .with_context(|| format!("encode history for {entity}"))?;
        tracing::debug!(entity, versions = history.len(), bytes = raw.len(), "writing history");
        self.put_raw(&history_key(entity), &raw)
    }
}

pub fn history_key(entity: &str) -> String {
    format!("{HISTORY_KEY_PREFIX}{entity}")
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("JUXTA_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set JUXTA_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("juxta.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("database path must not be empty -- set [storage].db_path or JUXTA_DB_PATH");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some((scheme, _)) = path.split_once("://")
        && !scheme.is_empty()
        && scheme.chars().all(|ch| ch.is_ascii_alphabetic())
    {
        bail!("database path {path:?} looks like a URI ({scheme}://) -- use a filesystem path");
    }
    if path.starts_with("file:") || path.contains('?') {
        bail!(
            "database path {path:?} uses SQLite URI syntax -- drop the file: prefix and any ?query"
        );
    }
    Ok(())
}

fn user_tables(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .context("prepare table listing")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("list tables")?;
    names
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect table names")
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?)")
        .with_context(|| format!("inspect columns of {table}"))?;
    let names = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))
        .with_context(|| format!("list columns of {table}"))?;
    names
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns of {table}"))
}

/// Existing databases must carry the key/value table this crate writes.
fn validate_schema(conn: &Connection, tables: &BTreeSet<String>) -> Result<()> {
    if !tables.contains(KV_TABLE) {
        bail!(
            "database is missing required table `{KV_TABLE}` -- point [storage].db_path at a juxta database or remove the file"
        );
    }

    let columns = table_columns(conn, KV_TABLE)?;
    let missing = KV_COLUMNS
        .into_iter()
        .filter(|column| !columns.contains(*column))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "table `{KV_TABLE}` lacks columns {} -- remove the database file and relaunch",
            missing.join(", ")
        );
    }
    Ok(())
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(5))
        .context("set sqlite busy timeout")?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
        .context("configure sqlite journal")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

#[cfg(test)]
mod tests {
    use super::{ACTIVE_ENTITIES_KEY, Store, history_key};
    use anyhow::Result;
    use juxta_app::HistoryStore;

    #[test]
    fn raw_entries_upsert() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;

        assert_eq!(store.get_raw("k")?, None);
        store.put_raw("k", "one")?;
        store.put_raw("k", "two")?;
        assert_eq!(store.get_raw("k")?.as_deref(), Some("two"));
        assert!(store.delete_raw("k")?);
        assert!(!store.delete_raw("k")?);
        Ok(())
    }

    #[test]
    fn active_entities_are_normalized_on_load() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;

        assert!(store.load_active_entities()?.is_empty());
        store.put_raw(ACTIVE_ENTITIES_KEY, r#"["Acme", " acme ", "", "globex"]"#)?;
        assert_eq!(store.load_active_entities()?, vec!["acme", "globex"]);
        Ok(())
    }

    #[test]
    fn corrupt_history_is_actionable() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;

        store.put_raw(&history_key("acme"), "{not json")?;
        let error = store
            .load_history("acme")
            .expect_err("corrupt history should fail");
        assert!(error.to_string().contains("--clear-history acme"));
        Ok(())
    }
}
