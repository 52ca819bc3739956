//! Single-document catalog store
//!
//! The whole catalog lives in one JSON file (`images.json`). Every mutating
//! call rewrites it: the new document goes to a temporary sibling file, is
//! read back and parsed, and only then renamed over the real file. The file on
//! disk is therefore always either the previous or the new complete state.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::{CatalogRepository, Change};
use crate::error::{StorageError, ValidationError};
use crate::state::{CatalogDocument, CategoryNode, CategoryPatch, MediaPatch, MediaRecord};

/// Catalog stored as one JSON document
pub struct FlatFileStore {
    path: PathBuf,
    /// Last state known to be on disk
    document: CatalogDocument,
    loaded: bool,
}

impl FlatFileStore {
    pub const FILE_NAME: &'static str = "images.json";

    /// Create a store backed by the file at `path`. Nothing is read until
    /// the first load or mutation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: CatalogDocument::default(),
            loaded: false,
        }
    }

    /// Create a store for `<dir>/images.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    /// Get the path to the catalog document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the document on disk.
    ///
    /// Returns `Ok(None)` when the file is missing or blank.
    fn read_document(&self) -> Result<Option<Result<CatalogDocument, ValidationError>>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path).map_err(|e| StorageError::io(&self.path, e))?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&text).map_err(|e| ValidationError {
            path: self.path.clone(),
            reason: e.to_string(),
        })))
    }

    /// Write `document` atomically: temp sibling, verify, rename.
    pub fn write_document(&self, document: &CatalogDocument) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let json = serde_json::to_string_pretty(document)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".images.json.")
            .suffix(".temp")
            .tempfile_in(&dir)
            .map_err(|e| StorageError::io(&dir, e))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| StorageError::io(temp.path(), e))?;

        // Read back what actually landed on disk before replacing the real file
        let written = fs::read_to_string(temp.path()).map_err(|e| StorageError::io(temp.path(), e))?;
        if let Err(e) = serde_json::from_str::<CatalogDocument>(&written) {
            return Err(StorageError::Verification {
                path: temp.path().to_path_buf(),
                reason: e.to_string(),
            });
        }

        temp.persist(&self.path)
            .map_err(|e| StorageError::io(&self.path, e.error))?;

        debug!(
            "Wrote catalog document {} ({} images, {} categories)",
            self.path.display(),
            document.images.len(),
            document.categories.len()
        );
        Ok(())
    }

    fn ensure_loaded(&mut self) -> Result<(), StorageError> {
        if !self.loaded {
            self.load_all()?;
        }
        Ok(())
    }

    /// Build the next document from the cached one, write it, and only then
    /// adopt it. A failed write leaves both disk and cache untouched.
    fn commit<F>(&mut self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut CatalogDocument) -> Result<(), StorageError>,
    {
        self.ensure_loaded()?;
        let mut next = self.document.clone();
        mutate(&mut next)?;
        self.write_document(&next)?;
        self.document = next;
        Ok(())
    }
}

impl CatalogRepository for FlatFileStore {
    fn load_all(&mut self) -> Result<CatalogDocument, StorageError> {
        let document = match self.read_document()? {
            Some(Ok(document)) => document,
            Some(Err(validation)) => {
                error!("{}; resetting to an empty catalog", validation);
                let empty = CatalogDocument::default();
                self.write_document(&empty)?;
                empty
            }
            None => {
                info!("No catalog at {}, starting empty", self.path.display());
                let empty = CatalogDocument::default();
                self.write_document(&empty)?;
                empty
            }
        };

        self.document = document.clone();
        self.loaded = true;
        Ok(document)
    }

    fn create_media(&mut self, record: &MediaRecord) -> Result<(), StorageError> {
        self.apply(&[Change::CreateMedia(record.clone())])
    }

    fn update_media(&mut self, id: &str, patch: &MediaPatch) -> Result<(), StorageError> {
        self.apply(&[Change::UpdateMedia {
            id: id.to_string(),
            patch: patch.clone(),
        }])
    }

    fn delete_media(&mut self, id: &str) -> Result<(), StorageError> {
        self.apply(&[Change::DeleteMedia(id.to_string())])
    }

    fn create_category(&mut self, node: &CategoryNode) -> Result<(), StorageError> {
        self.apply(&[Change::CreateCategory(node.clone())])
    }

    fn update_category(&mut self, id: &str, patch: &CategoryPatch) -> Result<(), StorageError> {
        self.apply(&[Change::UpdateCategory {
            id: id.to_string(),
            patch: patch.clone(),
        }])
    }

    fn delete_category(&mut self, id: &str) -> Result<(), StorageError> {
        self.apply(&[Change::DeleteCategory(id.to_string())])
    }

    /// All changes land in a single rewrite: either all of them or none.
    fn apply(&mut self, changes: &[Change]) -> Result<(), StorageError> {
        if changes.is_empty() {
            return Ok(());
        }
        self.commit(|document| {
            for change in changes {
                change.apply_to(document)?;
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("Catalog write to {} failed: {}", self.path.display(), e);
            e
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

impl std::fmt::Debug for FlatFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatFileStore")
            .field("path", &self.path)
            .field("loaded", &self.loaded)
            .finish()
    }
}
