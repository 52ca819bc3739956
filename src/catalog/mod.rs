//! Catalog module
//!
//! This module handles:
//! - The category tree and its exclusivity invariant (tree.rs)
//! - Bulk add/delete and per-record field edits (association.rs)
//! - Folder scanning and folder-bound categories (import.rs)
//!
//! [`MediaCatalog`] ties them to a repository. Every operation builds the next
//! [`CatalogState`] from a copy of the current one, persists the difference,
//! and only then adopts it. A failed write leaves the in-memory catalog as it
//! was.

pub mod association;
pub mod import;
pub mod tree;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub use association::{records_from_files, DeleteOutcome, SubcategorySummary};
pub use import::{scan_folder, scan_folder_in_background, FolderImport, FolderScan};
pub use tree::{AssignOutcome, CategoryTree};

use crate::config::CatalogConfig;
use crate::error::{AssociationError, Result};
use crate::media::{MediaFiles, MediaProbe};
use crate::query::Query;
use crate::queue::{merge_analysis, Analysis, Analyzer};
use crate::state::{CatalogDocument, CategoryNode, CategoryPatch, MediaPatch, MediaRecord};
use crate::store::{open_repository, CatalogRepository, Change};

/// In-memory snapshot of the catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub records: Vec<MediaRecord>,
    pub tree: CategoryTree,
}

impl CatalogState {
    pub fn from_document(document: CatalogDocument) -> Self {
        Self {
            records: document.images,
            tree: CategoryTree::from_nodes(document.categories),
        }
    }

    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            images: self.records.clone(),
            categories: self.tree.nodes().to_vec(),
        }
    }

    /// Drop dangling references left by an interrupted or hand-edited catalog.
    /// Returns true if anything changed.
    pub fn repair(&mut self) -> bool {
        let known: HashSet<String> = self.records.iter().map(|r| r.id.clone()).collect();
        let mut changed = self.tree.repair(&known);

        for record in &mut self.records {
            let before = record.categories.len();
            let tree = &self.tree;
            record.categories.retain(|c| tree.contains(c));
            if record.categories.len() != before {
                changed = true;
            }
        }
        changed
    }
}

/// Compute the change list that turns `old` into `new`.
///
/// Creates come first and deletes last, so an interrupted apply never leaves
/// a category pointing at a record that was not written yet.
pub fn diff(old: &CatalogState, new: &CatalogState) -> Vec<Change> {
    let old_records: HashMap<&str, &MediaRecord> =
        old.records.iter().map(|r| (r.id.as_str(), r)).collect();
    let new_records: HashSet<&str> = new.records.iter().map(|r| r.id.as_str()).collect();
    let old_nodes: HashMap<&str, &CategoryNode> =
        old.tree.nodes().iter().map(|n| (n.id.as_str(), n)).collect();
    let new_nodes: HashSet<&str> = new.tree.nodes().iter().map(|n| n.id.as_str()).collect();

    let mut create_media = Vec::new();
    let mut update_media = Vec::new();
    for record in &new.records {
        match old_records.get(record.id.as_str()) {
            None => create_media.push(Change::CreateMedia(record.clone())),
            Some(previous) => {
                if let Some(change) = media_change(previous, record) {
                    update_media.push(change);
                }
            }
        }
    }

    let mut create_categories = Vec::new();
    let mut update_categories = Vec::new();
    for node in new.tree.nodes() {
        match old_nodes.get(node.id.as_str()) {
            None => create_categories.push(Change::CreateCategory(node.clone())),
            Some(previous) => {
                if let Some(change) = category_change(previous, node) {
                    update_categories.push(change);
                }
            }
        }
    }

    let delete_categories = old
        .tree
        .nodes()
        .iter()
        .filter(|n| !new_nodes.contains(n.id.as_str()))
        .map(|n| Change::DeleteCategory(n.id.clone()));
    let delete_media = old
        .records
        .iter()
        .filter(|r| !new_records.contains(r.id.as_str()))
        .map(|r| Change::DeleteMedia(r.id.clone()));

    create_media
        .into_iter()
        .chain(create_categories)
        .chain(update_categories)
        .chain(update_media)
        .chain(delete_categories)
        .chain(delete_media)
        .collect()
}

/// A patch when one expresses the edit, a full replacement otherwise
fn media_change(old: &MediaRecord, new: &MediaRecord) -> Option<Change> {
    let Some(patch) = MediaPatch::between(old, new) else {
        let mut clean = old.clone();
        clean.is_dirty = new.is_dirty;
        return (clean != *new).then(|| Change::CreateMedia(new.clone()));
    };
    let mut patched = old.clone();
    patch.apply(&mut patched);
    patched.is_dirty = new.is_dirty;

    if patched == *new {
        Some(Change::UpdateMedia {
            id: new.id.clone(),
            patch,
        })
    } else {
        Some(Change::CreateMedia(new.clone()))
    }
}

fn category_change(old: &CategoryNode, new: &CategoryNode) -> Option<Change> {
    if old == new {
        return None;
    }
    match CategoryPatch::between(old, new) {
        Some(patch) => {
            let mut patched = old.clone();
            patch.apply(&mut patched);
            if patched == *new {
                Some(Change::UpdateCategory {
                    id: new.id.clone(),
                    patch,
                })
            } else {
                Some(Change::CreateCategory(new.clone()))
            }
        }
        None => Some(Change::CreateCategory(new.clone())),
    }
}

/// A media catalog bound to one repository.
///
/// Mutations take `&mut self`: one writer per catalog. Share it across tasks
/// behind a mutex.
pub struct MediaCatalog {
    repo: Box<dyn CatalogRepository>,
    state: CatalogState,
    config: CatalogConfig,
}

impl MediaCatalog {
    /// Open the repository selected by `config` and load it.
    ///
    /// Only failing to open the storage medium is an error. A catalog that
    /// cannot be read is logged and starts out empty.
    pub fn open(config: CatalogConfig) -> Result<Self> {
        let repo = open_repository(config.backend, &config.data_dir)?;
        Ok(Self::with_repository(repo, config))
    }

    /// Wrap an already constructed repository and load it
    pub fn with_repository(repo: Box<dyn CatalogRepository>, config: CatalogConfig) -> Self {
        let mut catalog = Self {
            repo,
            state: CatalogState::default(),
            config,
        };
        catalog.load();
        catalog
    }

    fn load(&mut self) {
        let document = match self.repo.load_all() {
            Ok(document) => document,
            Err(e) => {
                error!(
                    "Failed to load catalog from {}: {}; starting empty",
                    self.repo.location(),
                    e
                );
                CatalogDocument::default()
            }
        };

        let loaded = CatalogState::from_document(document);
        let mut repaired = loaded.clone();
        self.state = loaded;

        if repaired.repair() {
            info!("Repairing dangling references in {}", self.repo.location());
            if let Err(e) = self.commit(repaired.clone()) {
                warn!("Could not persist catalog repair: {}", e);
                for record in &mut repaired.records {
                    record.is_dirty = false;
                }
                self.state = repaired;
            }
        }

        info!(
            "📚 Catalog loaded from {} with {} images and {} categories",
            self.repo.location(),
            self.state.records.len(),
            self.state.tree.len()
        );
    }

    /// Persist the difference between the current and `next` state, then adopt `next`
    fn commit(&mut self, mut next: CatalogState) -> Result<()> {
        let changes = diff(&self.state, &next);
        if changes.is_empty() {
            debug!("Nothing to persist");
        } else {
            debug!("Persisting {} changes", changes.len());
            self.repo.apply(&changes)?;
        }

        for record in &mut next.records {
            record.is_dirty = false;
        }
        self.state = next;
        Ok(())
    }

    fn next_state(&self) -> CatalogState {
        self.state.clone()
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn location(&self) -> String {
        self.repo.location()
    }

    /// Current records and categories
    pub fn get_images_and_categories(&self) -> (&[MediaRecord], &[CategoryNode]) {
        (&self.state.records, self.state.tree.nodes())
    }

    pub fn records(&self) -> &[MediaRecord] {
        &self.state.records
    }

    pub fn categories(&self) -> &[CategoryNode] {
        self.state.tree.nodes()
    }

    pub fn tree(&self) -> &CategoryTree {
        &self.state.tree
    }

    pub fn get(&self, id: &str) -> Option<&MediaRecord> {
        self.state.record(id)
    }

    /// A query preset with the configured recent window and precision
    pub fn new_query(&self) -> Query {
        Query {
            recent_days: self.config.recent_days,
            default_precision: self.config.default_precision,
            ..Default::default()
        }
    }

    pub fn query(&self, query: &Query) -> Vec<&MediaRecord> {
        query.run(&self.state.records, self.state.tree.nodes())
    }

    /// Flip a record's favorite flag; returns the new value
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let mut next = self.next_state();
        let favorite = next.toggle_favorite(id)?;
        self.commit(next)?;
        Ok(favorite)
    }

    pub fn update_tags(&mut self, id: &str, tags: &[String]) -> Result<()> {
        let mut next = self.next_state();
        next.set_tags(id, tags)?;
        self.commit(next)
    }

    /// Set a record's rating and return the updated record
    pub fn update_rating(&mut self, id: &str, rating: u8) -> Result<MediaRecord> {
        let mut next = self.next_state();
        let updated = next.set_rating(id, rating)?.clone();
        self.commit(next)?;
        Ok(MediaRecord {
            is_dirty: false,
            ..updated
        })
    }

    /// Add records not already in the catalog; returns the ids added
    pub fn add_images(&mut self, records: Vec<MediaRecord>) -> Result<Vec<String>> {
        let mut next = self.next_state();
        let added = next.add_records(records);
        self.commit(next)?;
        info!("Added {} records", added.len());
        Ok(added)
    }

    /// Build records for picked files and add them. Returns the ids added and
    /// the paths that could not be read.
    pub fn add_files(
        &mut self,
        paths: &[PathBuf],
        files: &dyn MediaFiles,
        probe: &dyn MediaProbe,
    ) -> Result<(Vec<String>, Vec<PathBuf>)> {
        let (records, unreadable) = records_from_files(paths, files, probe, &self.config);
        let added = self.add_images(records)?;
        Ok((added, unreadable))
    }

    /// Remove records from the catalog; files stay on disk
    pub fn bulk_delete_soft(&mut self, ids: &[String]) -> Result<DeleteOutcome> {
        let mut next = self.next_state();
        let (removed, skipped) = next.remove_records(ids);
        self.commit(next)?;

        info!("Removed {} records from the catalog", removed.len());
        Ok(DeleteOutcome {
            removed: removed.into_iter().map(|r| r.id).collect(),
            skipped,
            ..Default::default()
        })
    }

    /// Remove records and delete the files of folder-bound local ones.
    ///
    /// The catalog removal is persisted first; file failures are reported in
    /// the outcome and do not fail the call.
    pub fn bulk_delete_hard(&mut self, ids: &[String], files: &dyn MediaFiles) -> Result<DeleteOutcome> {
        let mut next = self.next_state();
        let (removed, skipped) = next.remove_records(ids);
        self.commit(next)?;

        let mut outcome = DeleteOutcome {
            removed: removed.iter().map(|r| r.id.clone()).collect(),
            skipped,
            ..Default::default()
        };
        association::delete_bound_files(&removed, files, &mut outcome);

        info!(
            "Removed {} records, deleted {} files ({} failed)",
            outcome.removed.len(),
            outcome.files_deleted.len(),
            outcome.file_errors.len()
        );
        Ok(outcome)
    }

    /// Create an empty category; returns its id
    pub fn add_category(&mut self, name: &str, parent: Option<&str>) -> Result<String> {
        let mut next = self.next_state();
        let id = next.tree.add_category(name, parent)?;
        self.commit(next)?;
        info!("Created category {} ({})", name, id);
        Ok(id)
    }

    pub fn rename_category(&mut self, id: &str, name: &str) -> Result<()> {
        let mut next = self.next_state();
        next.tree.rename(id, name)?;
        self.commit(next)
    }

    /// Delete a category and its subtree; returns the removed ids, children first
    pub fn delete_category(&mut self, id: &str) -> Result<Vec<String>> {
        let mut next = self.next_state();
        let removed = next.delete_category(id)?;
        self.commit(next)?;

        let removed: Vec<String> = removed.into_iter().map(|n| n.id).collect();
        info!("Deleted {} categories", removed.len());
        Ok(removed)
    }

    /// File records under categories, keeping one holder per ancestor chain
    pub fn add_to_category(&mut self, image_ids: &[String], category_ids: &[String]) -> Result<AssignOutcome> {
        let mut next = self.next_state();
        let outcome = next.assign(image_ids, category_ids);
        self.commit(next)?;
        Ok(outcome)
    }

    /// Scan `folder`, create its category and merge the records
    pub fn import_folder_from_path(&mut self, folder: &Path, files: &dyn MediaFiles) -> Result<FolderImport> {
        let scan = scan_folder(folder, files, &self.config)?;
        self.merge_scan(scan)
    }

    /// Like [`Self::import_folder_from_path`], with the scan on the blocking pool
    pub async fn import_folder(&mut self, folder: PathBuf, files: Arc<dyn MediaFiles>) -> Result<FolderImport> {
        let scan = scan_folder_in_background(folder, files, self.config.clone()).await?;
        self.merge_scan(scan)
    }

    /// Merge a finished scan into the catalog
    pub fn merge_scan(&mut self, scan: FolderScan) -> Result<FolderImport> {
        let mut next = self.next_state();
        let import = next.merge_folder(scan);
        self.commit(next)?;
        Ok(import)
    }

    /// Reorder siblings: each listed category gets `order` = its position
    pub fn save_categories(&mut self, order: &[String]) -> Result<Vec<AssociationError>> {
        let mut next = self.next_state();
        let skipped = next.tree.reorder(order);
        self.commit(next)?;
        Ok(skipped)
    }

    pub fn subcategories(&self, id: &str) -> Result<Vec<SubcategorySummary>> {
        Ok(self.state.subcategories(id)?)
    }

    /// Tagging and color queues sized from the configuration
    pub fn analyzer(&self) -> Analyzer {
        Analyzer::new(self.config.tag_concurrency, self.config.color_concurrency)
    }

    /// Merge tagging / color results; returns the number of records changed
    pub fn apply_analysis(&mut self, results: &[Analysis]) -> Result<usize> {
        let mut next = self.next_state();
        let mut changed = 0;
        for analysis in results {
            match next.records.iter_mut().find(|r| r.id == analysis.id) {
                Some(record) => {
                    if merge_analysis(record, analysis) {
                        record.is_dirty = true;
                        changed += 1;
                    }
                }
                None => warn!("Analysis for unknown record {}", analysis.id),
            }
        }
        self.commit(next)?;
        Ok(changed)
    }

    /// Fill in missing image dimensions; returns the number of records updated
    pub fn refresh_dimensions(&mut self, probe: &dyn MediaProbe) -> Result<usize> {
        let mut next = self.next_state();
        let updated = next.refresh_dimensions(probe);
        self.commit(next)?;
        Ok(updated)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for MediaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCatalog")
            .field("location", &self.repo.location())
            .field("records", &self.state.records.len())
            .field("categories", &self.state.tree.len())
            .finish()
    }
}
