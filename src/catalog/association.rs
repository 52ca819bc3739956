//! Media-category association engine
//!
//! Everything here edits a [`CatalogState`] snapshot in memory. The catalog
//! then diffs the edited snapshot against the stored one and persists only
//! the difference, so none of these functions touch the repository.

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::tree::AssignOutcome;
use super::CatalogState;
use crate::config::CatalogConfig;
use crate::error::{AssociationError, PhysicalFileError};
use crate::media::{hash_id, to_local_uri, FileEntry, MediaFiles, MediaProbe};
use crate::state::{CategoryNode, MediaKind, MediaRecord};

/// Result of a bulk delete
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    /// Ids removed from the catalog
    pub removed: Vec<String>,
    /// Requested ids that did not exist
    pub skipped: Vec<AssociationError>,
    /// Files removed from disk (hard delete only)
    pub files_deleted: Vec<PathBuf>,
    /// Files that could not be removed (hard delete only)
    pub file_errors: Vec<PhysicalFileError>,
}

/// Short description of a direct child category
#[derive(Debug, Clone, PartialEq)]
pub struct SubcategorySummary {
    pub id: String,
    pub name: String,
    pub count: usize,
    /// Path of the first record in the category, for a thumbnail
    pub thumbnail: Option<String>,
}

/// Build a record for a file on disk. The id is stable for a given path and size.
pub fn record_from_file(entry: &FileEntry, kind: MediaKind) -> MediaRecord {
    let path = entry.path.to_string_lossy();
    let mut record = MediaRecord::new(
        hash_id(&path, entry.size),
        to_local_uri(&entry.path),
        entry.stem(),
    );
    record.extension = entry.extension.clone();
    record.size = entry.size;
    record.date_created = entry.created;
    record.date_modified = entry.modified;
    record.kind = kind;
    record
}

/// Build records for user-picked files, probing dimensions where possible.
///
/// Files that cannot be read are skipped and returned separately.
pub fn records_from_files(
    paths: &[PathBuf],
    files: &dyn MediaFiles,
    probe: &dyn MediaProbe,
    config: &CatalogConfig,
) -> (Vec<MediaRecord>, Vec<PathBuf>) {
    let mut records = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();

    for path in paths {
        let entry = match files.stat(path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                unreadable.push(path.clone());
                continue;
            }
        };

        let kind = if config.is_video_extension(&entry.extension) {
            MediaKind::video()
        } else {
            MediaKind::Image
        };
        let mut record = record_from_file(&entry, kind);

        if let Some(dims) = probe.probe(path) {
            record.width = Some(dims.width);
            record.height = Some(dims.height);
            if let MediaKind::Video { duration, .. } = &mut record.kind {
                *duration = dims.duration;
            }
        }
        records.push(record);
    }

    (records, unreadable)
}

impl CatalogState {
    pub fn record(&self, id: &str) -> Option<&MediaRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut MediaRecord, AssociationError> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AssociationError::UnknownMedia(id.to_string()))
    }

    /// Append records whose id is not already present. Returns the added ids.
    pub fn add_records(&mut self, new: Vec<MediaRecord>) -> Vec<String> {
        let mut known: HashSet<String> = self.records.iter().map(|r| r.id.clone()).collect();
        let mut added = Vec::new();

        for mut record in new {
            if !known.insert(record.id.clone()) {
                debug!("Record {} already in catalog, keeping existing", record.id);
                continue;
            }
            record.is_dirty = true;
            added.push(record.id.clone());
            self.records.push(record);
        }
        added
    }

    /// Remove records from the catalog and from every category
    pub fn remove_records(&mut self, ids: &[String]) -> (Vec<MediaRecord>, Vec<AssociationError>) {
        let wanted: HashSet<String> = ids.iter().cloned().collect();
        let skipped = ids
            .iter()
            .filter(|id| self.record(id).is_none())
            .map(|id| AssociationError::UnknownMedia(id.clone()))
            .collect();

        let (removed, kept): (Vec<MediaRecord>, Vec<MediaRecord>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| wanted.contains(&r.id));
        self.records = kept;
        self.tree.remove_images(&wanted);

        (removed, skipped)
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool, AssociationError> {
        let record = self.record_mut(id)?;
        record.favorite = !record.favorite;
        record.is_dirty = true;
        Ok(record.favorite)
    }

    /// Replace a record's tags with the trimmed, non-empty given tags
    pub fn set_tags(&mut self, id: &str, tags: &[String]) -> Result<(), AssociationError> {
        let record = self.record_mut(id)?;
        record.tags = tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        record.is_dirty = true;
        Ok(())
    }

    /// Set a 0 - 5 rating (values above 5 are capped)
    pub fn set_rating(&mut self, id: &str, rating: u8) -> Result<&MediaRecord, AssociationError> {
        let record = self.record_mut(id)?;
        record.rating = rating.min(5);
        record.is_dirty = true;
        Ok(record)
    }

    /// Bring each record's `categories` in line with the tree
    pub fn sync_memberships<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) {
        for id in ids {
            let memberships = self.tree.memberships_of(id);
            if let Ok(record) = self.record_mut(id) {
                if record.categories != memberships {
                    record.categories = memberships;
                    record.is_dirty = true;
                }
            }
        }
    }

    /// File records under categories, keeping the exclusivity invariant
    pub fn assign(&mut self, image_ids: &[String], category_ids: &[String]) -> AssignOutcome {
        let mut skipped = Vec::new();
        let mut known = Vec::new();
        for id in image_ids {
            if self.record(id).is_some() {
                if !known.contains(id) {
                    known.push(id.clone());
                }
            } else {
                warn!("Skipping unknown record {}", id);
                skipped.push(AssociationError::UnknownMedia(id.clone()));
            }
        }

        let mut outcome = if known.is_empty() {
            AssignOutcome::default()
        } else {
            self.tree.assign(&known, category_ids)
        };
        self.sync_memberships(&known);

        skipped.append(&mut outcome.skipped);
        outcome.skipped = skipped;
        outcome
    }

    /// Delete a category subtree. Folder-bound records it held are unbound,
    /// never deleted. Returns the removed nodes.
    pub fn delete_category(&mut self, id: &str) -> Result<Vec<CategoryNode>, AssociationError> {
        let removed = self.tree.remove_subtree(id)?;
        let removed_ids: HashSet<&str> = removed.iter().map(|n| n.id.as_str()).collect();

        // Assigning into a subcategory retracts a record from the folder node
        // itself, so every node of a removed folder subtree counts as holding it
        let unbinds = removed.iter().any(|n| n.is_import_from_folder);
        let members: HashSet<&str> = removed
            .iter()
            .flat_map(|n| n.images.iter().map(String::as_str))
            .collect();

        for record in &mut self.records {
            let held_by_folder = unbinds
                && (members.contains(record.id.as_str())
                    || record.categories.iter().any(|c| removed_ids.contains(c.as_str())));
            if held_by_folder && record.is_bind_in_folder {
                record.is_bind_in_folder = false;
                record.is_dirty = true;
            }

            let before = record.categories.len();
            record.categories.retain(|c| !removed_ids.contains(c.as_str()));
            if record.categories.len() != before {
                record.is_dirty = true;
            }
        }

        Ok(removed)
    }

    /// Direct children of a category with their first record as thumbnail
    pub fn subcategories(&self, id: &str) -> Result<Vec<SubcategorySummary>, AssociationError> {
        if !self.tree.contains(id) {
            return Err(AssociationError::UnknownCategory(id.to_string()));
        }

        Ok(self
            .tree
            .children(id)
            .into_iter()
            .map(|child| SubcategorySummary {
                id: child.id.clone(),
                name: child.name.clone(),
                count: child.count,
                thumbnail: child
                    .images
                    .iter()
                    .find_map(|image| self.record(image))
                    .map(|r| r.path.clone()),
            })
            .collect())
    }

    /// Fill unset width/height of local images. Returns the number updated.
    pub fn refresh_dimensions(&mut self, probe: &dyn MediaProbe) -> usize {
        let mut updated = 0;
        for record in &mut self.records {
            if record.is_video() || (record.width.is_some() && record.height.is_some()) {
                continue;
            }
            let Some(path) = record.local_path() else { continue };
            if let Some(dims) = probe.probe(&path) {
                record.width = Some(dims.width);
                record.height = Some(dims.height);
                record.is_dirty = true;
                updated += 1;
            }
        }
        updated
    }
}

/// Remove the files of hard-deleted, folder-bound local records.
///
/// Failures are logged and collected; they never undo the catalog removal.
pub fn delete_bound_files(
    removed: &[MediaRecord],
    files: &dyn MediaFiles,
    outcome: &mut DeleteOutcome,
) {
    for record in removed {
        if !record.is_bind_in_folder {
            continue;
        }
        let Some(path) = record.local_path() else { continue };

        match files.delete_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                outcome.files_deleted.push(path);
            }
            Err(source) => {
                let error = PhysicalFileError { path, source };
                warn!("{}", error);
                outcome.file_errors.push(error);
            }
        }
    }
}
