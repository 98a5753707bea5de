//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the DocumentStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Document, DocumentStore, Filter, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite document store backend
///
/// The connection sits behind a mutex so one store can be shared by every
/// pipeline of a cycle; each call holds the lock for a single statement or
/// transaction.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Opens or creates a store at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Loads `(id, document)` pairs matching the filter, in insertion order
    fn select(
        conn: &Connection,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> StorageResult<Vec<(i64, Document)>> {
        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        let mut bind: Vec<SqlValue> = vec![SqlValue::Text(collection.to_string())];

        // String equality is pushed down; everything else is checked below.
        let mut pushed_all = true;
        for (field, value) in filter.conditions() {
            match value {
                Value::String(s) if !field.contains('"') => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                    bind.push(SqlValue::Text(format!("$.\"{}\"", field)));
                    bind.push(SqlValue::Text(s.clone()));
                }
                _ => pushed_all = false,
            }
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let document = parse_body(collection, &body)?;
            if pushed_all || filter.matches(&document) {
                documents.push((id, document));
                if limit.is_some_and(|n| documents.len() >= n) {
                    break;
                }
            }
        }

        Ok(documents)
    }
}

fn parse_body(collection: &str, body: &str) -> StorageResult<Document> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::InvalidDocument {
            collection: collection.to_string(),
            message: format!("stored body is not an object: {}", other),
        }),
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn store(&self, collection: &str, documents: &[Document]) -> StorageResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let now = Utc::now().to_rfc3339();
            let mut stmt = tx.prepare(
                "INSERT INTO documents (collection, body, inserted_at) VALUES (?1, ?2, ?3)",
            )?;
            for document in documents {
                let body = serde_json::to_string(document)?;
                stmt.execute(params![collection, body, now])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<Document>> {
        let conn = self.lock()?;
        let rows = Self::select(&conn, collection, filter, None)?;
        Ok(rows.into_iter().map(|(_, document)| document).collect())
    }

    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        document: Document,
    ) -> StorageResult<usize> {
        let conn = self.lock()?;
        let Some((id, _)) = Self::select(&conn, collection, filter, Some(1))?
            .into_iter()
            .next()
        else {
            return Ok(0);
        };

        let body = serde_json::to_string(&document)?;
        let updated = conn.execute(
            "UPDATE documents SET body = ?1 WHERE id = ?2",
            params![body, id],
        )?;
        Ok(updated)
    }

    fn collections(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}
