//! SQLite-backed document store.
//!
//! Every document lives in one table keyed by `(collection, record_id)` with
//! its JSON body stored as text. Collections are read back in insertion
//! order. The store is opt-in via the `store` feature.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Document collections persisted in a single SQLite database.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    /// Open (or create) a store at the given path. `":memory:"` gives a
    /// throwaway in-memory store.
    pub fn open_or_create(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection  TEXT NOT NULL,
                record_id   TEXT NOT NULL,
                body        TEXT NOT NULL,
                PRIMARY KEY (collection, record_id)
            );",
        )?;

        tracing::debug!(path, "opened document store");
        Ok(Self { conn })
    }

    /// All documents of a collection, oldest first.
    pub fn load(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;

        let mut docs = Vec::new();
        for body in rows {
            docs.push(serde_json::from_str(&body?)?);
        }
        Ok(docs)
    }

    pub fn get(&self, collection: &str, record_id: &str) -> Result<Option<Value>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND record_id = ?2",
                params![collection, record_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    pub fn record_ids(&self, collection: &str) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT record_id FROM documents WHERE collection = ?1")?;
        let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for id in rows {
            ids.insert(id?);
        }
        Ok(ids)
    }

    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Insert documents whose `record_id` is not yet in the collection.
    /// Returns how many were inserted; existing records are left as they are.
    pub fn insert_new(&mut self, collection: &str, docs: &[Value]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO documents (collection, record_id, body) VALUES (?1, ?2, ?3)",
            )?;
            for doc in docs {
                let id = record_id(doc)?;
                inserted += stmt.execute(params![collection, id, serde_json::to_string(doc)?])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Merge field maps into existing documents, one update per record.
    ///
    /// Fields not named in an update are kept. Updates for unknown records
    /// are skipped. Applying the same updates twice leaves the same bodies.
    pub fn update_fields(
        &mut self,
        collection: &str,
        updates: &[(String, Map<String, Value>)],
    ) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut updated = 0;
        {
            let mut select = tx.prepare(
                "SELECT body FROM documents WHERE collection = ?1 AND record_id = ?2",
            )?;
            let mut write = tx.prepare(
                "UPDATE documents SET body = ?3 WHERE collection = ?1 AND record_id = ?2",
            )?;
            for (id, fields) in updates {
                let body: Option<String> = select
                    .query_row(params![collection, id], |row| row.get(0))
                    .optional()?;
                let Some(body) = body else {
                    tracing::warn!(record_id = %id, collection, "update for unknown record skipped");
                    continue;
                };
                let mut doc: Value = serde_json::from_str(&body)?;
                let obj = doc.as_object_mut().ok_or(StoreError::NotAnObject)?;
                for (k, v) in fields {
                    obj.insert(k.clone(), v.clone());
                }
                updated += write.execute(params![collection, id, serde_json::to_string(&doc)?])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    /// Replace a collection's entire contents in one transaction.
    pub fn replace_collection(&mut self, collection: &str, docs: &[Value]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM documents WHERE collection = ?1", params![collection])?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO documents (collection, record_id, body) VALUES (?1, ?2, ?3)",
            )?;
            for doc in docs {
                let id = record_id(doc)?;
                written += stmt.execute(params![collection, id, serde_json::to_string(doc)?])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}

fn record_id(doc: &Value) -> Result<&str, StoreError> {
    if !doc.is_object() {
        return Err(StoreError::NotAnObject);
    }
    doc.get("record_id")
        .and_then(Value::as_str)
        .ok_or(StoreError::MissingRecordId)
}
