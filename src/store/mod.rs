//! Catalog repositories
//!
//! One contract, two back ends:
//! - [`FlatFileStore`]: the whole catalog in one JSON document, rewritten
//!   atomically on every mutating call
//! - [`DocumentStore`]: one SQLite row per record/category, updated individually
//!
//! Engines never write through a repository directly; they build the next
//! catalog state and hand the difference over as a list of [`Change`]s.

pub mod document;
pub mod flat_file;

use std::path::Path;

use crate::config::Backend;
use crate::error::StorageError;
use crate::state::{CatalogDocument, CategoryNode, CategoryPatch, MediaPatch, MediaRecord};

pub use document::DocumentStore;
pub use flat_file::FlatFileStore;

/// One step of a catalog mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    CreateMedia(MediaRecord),
    UpdateMedia { id: String, patch: MediaPatch },
    DeleteMedia(String),
    CreateCategory(CategoryNode),
    UpdateCategory { id: String, patch: CategoryPatch },
    DeleteCategory(String),
}

impl Change {
    /// Apply this change to an in-memory document.
    ///
    /// Creates replace an existing document with the same id and deletes of
    /// unknown ids are no-ops, so a change list can be re-applied safely.
    pub fn apply_to(&self, document: &mut CatalogDocument) -> Result<(), StorageError> {
        match self {
            Change::CreateMedia(record) => {
                match document.images.iter_mut().find(|r| r.id == record.id) {
                    Some(existing) => *existing = record.clone(),
                    None => document.images.push(record.clone()),
                }
            }
            Change::UpdateMedia { id, patch } => {
                let record = document
                    .images
                    .iter_mut()
                    .find(|r| &r.id == id)
                    .ok_or_else(|| StorageError::MissingDocument {
                        kind: "media",
                        id: id.clone(),
                    })?;
                patch.apply(record);
            }
            Change::DeleteMedia(id) => document.images.retain(|r| &r.id != id),
            Change::CreateCategory(node) => {
                match document.categories.iter_mut().find(|c| c.id == node.id) {
                    Some(existing) => *existing = node.clone(),
                    None => document.categories.push(node.clone()),
                }
            }
            Change::UpdateCategory { id, patch } => {
                let node = document
                    .categories
                    .iter_mut()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| StorageError::MissingDocument {
                        kind: "category",
                        id: id.clone(),
                    })?;
                patch.apply(node);
            }
            Change::DeleteCategory(id) => document.categories.retain(|c| &c.id != id),
        }
        Ok(())
    }
}

/// CRUD contract for media and category documents
pub trait CatalogRepository: Send {
    /// Load every record and category
    fn load_all(&mut self) -> Result<CatalogDocument, StorageError>;

    fn create_media(&mut self, record: &MediaRecord) -> Result<(), StorageError>;
    fn update_media(&mut self, id: &str, patch: &MediaPatch) -> Result<(), StorageError>;
    fn delete_media(&mut self, id: &str) -> Result<(), StorageError>;

    fn create_category(&mut self, node: &CategoryNode) -> Result<(), StorageError>;
    fn update_category(&mut self, id: &str, patch: &CategoryPatch) -> Result<(), StorageError>;
    fn delete_category(&mut self, id: &str) -> Result<(), StorageError>;

    /// Apply a change list.
    ///
    /// The default applies changes one by one and stops at the first failure,
    /// leaving earlier steps in place. Back ends that can do better override it.
    fn apply(&mut self, changes: &[Change]) -> Result<(), StorageError> {
        for change in changes {
            match change {
                Change::CreateMedia(record) => self.create_media(record)?,
                Change::UpdateMedia { id, patch } => self.update_media(id, patch)?,
                Change::DeleteMedia(id) => self.delete_media(id)?,
                Change::CreateCategory(node) => self.create_category(node)?,
                Change::UpdateCategory { id, patch } => self.update_category(id, patch)?,
                Change::DeleteCategory(id) => self.delete_category(id)?,
            }
        }
        Ok(())
    }

    /// Human-readable location of the storage medium
    fn location(&self) -> String;
}

/// Open the repository selected by `backend` inside `data_dir`
pub fn open_repository(
    backend: Backend,
    data_dir: &Path,
) -> Result<Box<dyn CatalogRepository>, StorageError> {
    match backend {
        Backend::Flat => Ok(Box::new(FlatFileStore::in_dir(data_dir))),
        Backend::Document => Ok(Box::new(DocumentStore::open(
            data_dir.join(DocumentStore::FILE_NAME),
        )?)),
    }
}
