//! Per-entity document store
//!
//! Each media record and each category is its own JSON document, kept in a
//! SQLite table keyed by id. Updates touch one document at a time; there is no
//! transaction spanning several documents, so a multi-step operation that is
//! interrupted leaves the earlier steps applied. Catalog operations are written
//! to be re-runnable, and re-running one finishes the job.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::CatalogRepository;
use crate::error::StorageError;
use crate::state::{CatalogDocument, CategoryNode, CategoryPatch, MediaPatch, MediaRecord};

/// Catalog stored as one SQLite row per entity
pub struct DocumentStore {
    conn: Connection,
    db_path: PathBuf,
}

impl DocumentStore {
    pub const FILE_NAME: &'static str = "catalog.db";

    /// Open (or create) the store at `db_path` and initialize the schema
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.into();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!("Document store opened at {}", db_path.display());

        let store = DocumentStore { conn, db_path };
        store.init_schema()?;
        Ok(store)
    }

    /// A throwaway store, useful for testing
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = DocumentStore {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create the document tables if they don't exist.
    /// `position` keeps the insertion order stable across loads.
    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS media (
                id          TEXT PRIMARY KEY,
                position    INTEGER NOT NULL,
                document    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS categories (
                id          TEXT PRIMARY KEY,
                position    INTEGER NOT NULL,
                document    TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn upsert(&self, table: Table, id: &str, json: &str) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {table} (id, position, document)
             VALUES (?1, (SELECT COALESCE(MAX(position), 0) + 1 FROM {table}), ?2)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document",
            table = table.name()
        );
        self.conn.execute(&sql, params![id, json])?;
        Ok(())
    }

    fn read(&self, table: Table, id: &str) -> Result<Option<String>, StorageError> {
        let sql = format!("SELECT document FROM {} WHERE id = ?1", table.name());
        Ok(self
            .conn
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()?)
    }

    fn remove(&self, table: Table, id: &str) -> Result<(), StorageError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table.name());
        self.conn.execute(&sql, params![id])?;
        Ok(())
    }

    /// Every document of a table in insertion order. Documents that fail to
    /// parse are skipped and logged.
    fn load_table<T: serde::de::DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, StorageError> {
        let sql = format!("SELECT id, document FROM {} ORDER BY position", table.name());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;

        let mut documents = Vec::with_capacity(rows.len());
        for (id, json) in rows {
            match serde_json::from_str(&json) {
                Ok(document) => documents.push(document),
                Err(e) => warn!("Skipping malformed {} document {}: {}", table.name(), id, e),
            }
        }
        Ok(documents)
    }

    fn patch<T, F>(&self, table: Table, id: &str, apply: F) -> Result<(), StorageError>
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
        F: FnOnce(&mut T),
    {
        let json = self.read(table, id)?.ok_or_else(|| StorageError::MissingDocument {
            kind: table.kind(),
            id: id.to_string(),
        })?;
        let mut document: T = serde_json::from_str(&json)?;
        apply(&mut document);
        self.upsert(table, id, &serde_json::to_string(&document)?)
    }
}

#[derive(Debug, Clone, Copy)]
enum Table {
    Media,
    Categories,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Media => "media",
            Table::Categories => "categories",
        }
    }

    fn kind(self) -> &'static str {
        match self {
            Table::Media => "media",
            Table::Categories => "category",
        }
    }
}

impl CatalogRepository for DocumentStore {
    fn load_all(&mut self) -> Result<CatalogDocument, StorageError> {
        let images: Vec<MediaRecord> = self.load_table(Table::Media)?;
        let categories: Vec<CategoryNode> = self.load_table(Table::Categories)?;
        debug!(
            "Loaded {} images and {} categories from {}",
            images.len(),
            categories.len(),
            self.db_path.display()
        );
        Ok(CatalogDocument { images, categories })
    }

    fn create_media(&mut self, record: &MediaRecord) -> Result<(), StorageError> {
        self.upsert(Table::Media, &record.id, &serde_json::to_string(record)?)
    }

    fn update_media(&mut self, id: &str, patch: &MediaPatch) -> Result<(), StorageError> {
        self.patch(Table::Media, id, |record: &mut MediaRecord| patch.apply(record))
    }

    fn delete_media(&mut self, id: &str) -> Result<(), StorageError> {
        self.remove(Table::Media, id)
    }

    fn create_category(&mut self, node: &CategoryNode) -> Result<(), StorageError> {
        self.upsert(Table::Categories, &node.id, &serde_json::to_string(node)?)
    }

    fn update_category(&mut self, id: &str, patch: &CategoryPatch) -> Result<(), StorageError> {
        self.patch(Table::Categories, id, |node: &mut CategoryNode| patch.apply(node))
    }

    fn delete_category(&mut self, id: &str) -> Result<(), StorageError> {
        self.remove(Table::Categories, id)
    }

    fn location(&self) -> String {
        self.db_path.display().to_string()
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}
