//! Folder import
//!
//! A folder import has two halves:
//! - `scan_folder` reads the directory and builds records (plain data, safe to
//!   run on a blocking worker)
//! - `CatalogState::merge_folder` turns a scan into a folder-bound category and
//!   merges the records into the catalog
//!
//! Only direct entries with a supported image extension are picked up.
//! Width/height are left unset; a probe fills them in later.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::association::record_from_file;
use super::CatalogState;
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::media::MediaFiles;
use crate::state::{CategoryNode, MediaKind, MediaRecord};

/// Records found in one folder
#[derive(Debug, Clone)]
pub struct FolderScan {
    pub folder: PathBuf,
    /// Category name: the folder's base name
    pub name: String,
    pub records: Vec<MediaRecord>,
    /// Entries ignored for having an unsupported extension
    pub ignored: usize,
}

/// What a folder import did to the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct FolderImport {
    pub category_id: String,
    /// Records that were new to the catalog
    pub added: Vec<String>,
    /// Records that were already present and are now folder-bound
    pub rebound: Vec<String>,
}

/// Scan `folder` for supported images
pub fn scan_folder(
    folder: &Path,
    files: &dyn MediaFiles,
    config: &CatalogConfig,
) -> Result<FolderScan, CatalogError> {
    info!("🔍 Scanning folder: {}", folder.display());

    let entries = files.list_dir(folder).map_err(|source| CatalogError::Folder {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    let mut ignored = 0;
    for entry in &entries {
        if !config.is_image_extension(&entry.extension) {
            debug!("Ignoring {}", entry.path.display());
            ignored += 1;
            continue;
        }
        let mut record = record_from_file(entry, MediaKind::Image);
        record.is_bind_in_folder = true;
        records.push(record);
    }

    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.to_string_lossy().to_string());

    info!(
        "Scan of {} complete: {} images, {} ignored",
        folder.display(),
        records.len(),
        ignored
    );

    Ok(FolderScan {
        folder: folder.to_path_buf(),
        name,
        records,
        ignored,
    })
}

/// Run [`scan_folder`] on tokio's blocking pool so the caller's task keeps going
pub async fn scan_folder_in_background(
    folder: PathBuf,
    files: Arc<dyn MediaFiles>,
    config: CatalogConfig,
) -> Result<FolderScan, CatalogError> {
    let path = folder.clone();
    tokio::task::spawn_blocking(move || scan_folder(&folder, files.as_ref(), &config))
        .await
        .map_err(|e| CatalogError::Folder {
            path,
            source: std::io::Error::other(e),
        })?
}

impl CatalogState {
    /// Create the folder category for `scan` and file its records under it.
    ///
    /// Records already in the catalog (same id) are kept as they are, apart
    /// from becoming folder-bound and joining the new category.
    pub fn merge_folder(&mut self, scan: FolderScan) -> FolderImport {
        let mut node = CategoryNode::new(format!("category-{}", Uuid::new_v4()), &scan.name);
        node.folder_path = Some(scan.folder.to_string_lossy().to_string());
        node.is_import_from_folder = true;
        node.order = self
            .tree
            .roots()
            .iter()
            .map(|n| n.order + 1)
            .max()
            .unwrap_or(0);
        let category_id = node.id.clone();
        self.tree.insert(node);

        let ids: Vec<String> = scan.records.iter().map(|r| r.id.clone()).collect();
        let added = self.add_records(scan.records);

        let mut rebound = Vec::new();
        for record in &mut self.records {
            if ids.contains(&record.id) && !added.contains(&record.id) && !record.is_bind_in_folder {
                record.is_bind_in_folder = true;
                record.is_dirty = true;
                rebound.push(record.id.clone());
            }
        }

        self.assign(&ids, std::slice::from_ref(&category_id));

        info!(
            "✅ Import complete: {} new, {} already present",
            added.len(),
            ids.len() - added.len()
        );

        FolderImport {
            category_id,
            added,
            rebound,
        }
    }
}
