//! End-to-end catalog scenarios against real repositories in temp directories

use chrono::{Duration, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::tempdir;

use media_catalog::catalog::MediaCatalog;
use media_catalog::config::{Backend, CatalogConfig};
use media_catalog::media::{to_local_uri, FileEntry, MediaFiles};
use media_catalog::query::{MultiFilter, PrimaryFilter};
use media_catalog::state::{CatalogDocument, CategoryNode, ColorInfo, MediaKind, MediaRecord};
use media_catalog::store::{open_repository, CatalogRepository, FlatFileStore};

fn config_in(dir: &Path, backend: Backend) -> CatalogConfig {
    CatalogConfig {
        data_dir: dir.to_path_buf(),
        backend,
        ..Default::default()
    }
}

fn record(id: &str) -> MediaRecord {
    MediaRecord::new(id, format!("https://example.com/{}.jpg", id), id)
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// In-memory file system with a fixed directory listing
#[derive(Default)]
struct FakeFiles {
    listing: Vec<FileEntry>,
    fail_deletes: bool,
    delete_attempts: Mutex<Vec<PathBuf>>,
}

impl FakeFiles {
    fn with_files(dir: &str, names: &[&str]) -> Self {
        let now = Utc::now();
        let listing = names
            .iter()
            .map(|name| {
                let path = Path::new(dir).join(name);
                FileEntry {
                    extension: path
                        .extension()
                        .map(|e| e.to_string_lossy().to_lowercase())
                        .unwrap_or_default(),
                    path,
                    size: 1024,
                    created: now,
                    modified: now,
                }
            })
            .collect();
        Self {
            listing,
            ..Default::default()
        }
    }
}

impl MediaFiles for FakeFiles {
    fn list_dir(&self, _dir: &Path) -> io::Result<Vec<FileEntry>> {
        Ok(self.listing.clone())
    }

    fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        self.listing
            .iter()
            .find(|e| e.path == path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.delete_attempts.lock().unwrap().push(path.to_path_buf());
        if self.fail_deletes {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "file is locked"))
        } else {
            Ok(())
        }
    }
}

/// Scenario A: i1 in A and C (A -> B -> C); assigning i1 to B leaves it only in B
#[test]
fn scenario_assign_retracts_from_ancestor_and_descendant() {
    for backend in [Backend::Flat, Backend::Document] {
        let temp_dir = tempdir().unwrap();

        // A catalog where i1 sits in both A and its grandchild C
        let mut a = CategoryNode::new("A", "A");
        a.set_images(strings(&["i1"]));
        a.children = strings(&["B"]);
        let mut b = CategoryNode::new("B", "B");
        b.father = Some("A".to_string());
        b.children = strings(&["C"]);
        b.level = 1;
        let mut c = CategoryNode::new("C", "C");
        c.father = Some("B".to_string());
        c.set_images(strings(&["i1"]));
        c.level = 2;
        let mut i1 = record("i1");
        i1.categories = ["A".to_string(), "C".to_string()].into_iter().collect();

        let mut repo = open_repository(backend, temp_dir.path()).unwrap();
        repo.create_media(&i1).unwrap();
        for node in [&a, &b, &c] {
            repo.create_category(node).unwrap();
        }

        let mut catalog =
            MediaCatalog::with_repository(repo, config_in(temp_dir.path(), backend));
        assert!(catalog.tree().get("A").unwrap().contains("i1"));
        assert!(catalog.tree().get("C").unwrap().contains("i1"));

        catalog
            .add_to_category(&strings(&["i1"]), &strings(&["B"]))
            .unwrap();

        // Both in memory and after a reload
        let reloaded = MediaCatalog::open(config_in(temp_dir.path(), backend)).unwrap();
        for view in [&catalog, &reloaded] {
            let tree = view.tree();
            assert_eq!(tree.get("B").unwrap().images, strings(&["i1"]));
            assert!(!tree.get("A").unwrap().contains("i1"));
            assert!(!tree.get("C").unwrap().contains("i1"));
            assert_eq!(tree.get("A").unwrap().count, 0);
            assert_eq!(tree.get("C").unwrap().count, 0);
            assert_eq!(
                view.get("i1").unwrap().categories,
                ["B".to_string()].into_iter().collect()
            );
        }
    }
}

/// Scenario B: hard delete of a folder-bound local record whose file cannot be removed
#[test]
fn scenario_hard_delete_survives_file_failure() {
    let temp_dir = tempdir().unwrap();
    let mut catalog = MediaCatalog::open(config_in(temp_dir.path(), Backend::Flat)).unwrap();

    let mut bound = MediaRecord::new("bound", to_local_uri(Path::new("/photos/a.jpg")), "a");
    bound.is_bind_in_folder = true;
    catalog.add_images(vec![bound, record("other")]).unwrap();

    let files = FakeFiles {
        fail_deletes: true,
        ..Default::default()
    };
    let outcome = catalog
        .bulk_delete_hard(&strings(&["bound"]), &files)
        .unwrap();

    assert_eq!(outcome.removed, strings(&["bound"]));
    assert_eq!(outcome.file_errors.len(), 1);
    assert_eq!(
        *files.delete_attempts.lock().unwrap(),
        vec![PathBuf::from("/photos/a.jpg")]
    );
    assert!(catalog.get("bound").is_none());

    // The removal is on disk too
    let reopened = MediaCatalog::open(config_in(temp_dir.path(), Backend::Flat)).unwrap();
    assert!(reopened.get("bound").is_none());
    assert!(reopened.get("other").is_some());
}

#[test]
fn hard_delete_leaves_picked_and_remote_files_alone() {
    let temp_dir = tempdir().unwrap();
    let mut catalog = MediaCatalog::open(config_in(temp_dir.path(), Backend::Flat)).unwrap();
    let picked = MediaRecord::new("picked", to_local_uri(Path::new("/home/me/b.jpg")), "b");
    catalog.add_images(vec![picked, record("remote")]).unwrap();

    let files = FakeFiles::default();
    let outcome = catalog
        .bulk_delete_hard(&strings(&["picked", "remote", "ghost"]), &files)
        .unwrap();

    assert_eq!(outcome.removed.len(), 2);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(files.delete_attempts.lock().unwrap().is_empty());
}

/// Scenario C: 3 supported files and 1 unsupported give a category of 3 bound records
#[test]
fn scenario_import_folder() {
    let temp_dir = tempdir().unwrap();
    let mut catalog = MediaCatalog::open(config_in(temp_dir.path(), Backend::Document)).unwrap();
    let files = FakeFiles::with_files("/photos", &["a.jpg", "b.png", "c.webp", "notes.txt"]);

    let import = catalog
        .import_folder_from_path(Path::new("/photos"), &files)
        .unwrap();

    let node = catalog.tree().get(&import.category_id).unwrap();
    assert_eq!(node.count, 3);
    assert_eq!(node.name, "photos");
    assert_eq!(node.folder_path.as_deref(), Some("/photos"));
    assert!(node.is_import_from_folder);
    assert_eq!(import.added.len(), 3);
    assert_eq!(catalog.records().len(), 3);
    assert!(catalog.records().iter().all(|r| r.is_bind_in_folder));
    assert!(catalog.records().iter().all(|r| r.width.is_none()));

    // Importing again yields the same ids, so nothing is duplicated
    let again = catalog
        .import_folder_from_path(Path::new("/photos"), &files)
        .unwrap();
    assert!(again.added.is_empty());
    assert_eq!(catalog.records().len(), 3);

    // Deleting the folder category unbinds without deleting
    catalog.delete_category(&import.category_id).unwrap();
    catalog.delete_category(&again.category_id).unwrap();
    assert_eq!(catalog.records().len(), 3);
    assert!(catalog.records().iter().all(|r| !r.is_bind_in_folder));
    assert!(catalog.records().iter().all(|r| r.categories.is_empty()));
}

/// A record filed into a subcategory of a folder import is unbound when the folder goes
#[test]
fn deleting_folder_unbinds_records_filed_in_subcategories() {
    let temp_dir = tempdir().unwrap();
    for backend in [Backend::Flat, Backend::Document] {
        let data_dir = temp_dir.path().join(format!("{:?}", backend));
        let mut catalog = MediaCatalog::open(config_in(&data_dir, backend)).unwrap();
        let files = FakeFiles::with_files("/photos", &["a.jpg", "b.jpg"]);

        let import = catalog
            .import_folder_from_path(Path::new("/photos"), &files)
            .unwrap();
        let best = catalog
            .add_category("best", Some(&import.category_id))
            .unwrap();
        let a = catalog
            .records()
            .iter()
            .find(|r| r.name == "a")
            .map(|r| r.id.clone())
            .unwrap();
        catalog
            .add_to_category(std::slice::from_ref(&a), std::slice::from_ref(&best))
            .unwrap();
        assert!(!catalog.tree().get(&import.category_id).unwrap().images.contains(&a));

        catalog.delete_category(&import.category_id).unwrap();
        assert!(catalog.records().iter().all(|r| !r.is_bind_in_folder));
        assert!(catalog.get(&a).unwrap().categories.is_empty());

        // Unbound records keep their files on hard delete
        let outcome = catalog.bulk_delete_hard(&[a.clone()], &files).unwrap();
        assert_eq!(outcome.removed, vec![a.clone()]);
        assert!(outcome.files_deleted.is_empty());
        assert!(files.delete_attempts.lock().unwrap().is_empty());

        let reopened = MediaCatalog::open(config_in(&data_dir, backend)).unwrap();
        assert_eq!(reopened.records().len(), 1);
        assert!(reopened.records().iter().all(|r| !r.is_bind_in_folder));
    }
}

/// Scenario D: Recent ignores tag search and keeps only recently modified records
#[test]
fn scenario_recent_ignores_tag_search() {
    let now = Utc::now();
    let mut old = record("old");
    old.date_modified = now - Duration::days(10);
    old.tags.insert("beach".to_string());
    let mut fresh = record("fresh");
    fresh.date_modified = now - Duration::days(2);

    let temp_dir = tempdir().unwrap();
    let mut catalog = MediaCatalog::open(config_in(temp_dir.path(), Backend::Flat)).unwrap();
    catalog.add_images(vec![old, fresh]).unwrap();

    let mut query = catalog.new_query();
    query.now = now;
    query.filter = PrimaryFilter::Recent;
    query.tags = strings(&["beach"]);

    let ids: Vec<&str> = catalog.query(&query).iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh"]);
}

/// Scenario E: colors and rating together apply only the color predicate
#[test]
fn scenario_colors_win_over_rating() {
    let mut red = record("red");
    red.rating = 1;
    red.colors.push(ColorInfo {
        color: "#FF0000".to_string(),
        percentage: 0.6,
    });
    let mut rated = record("rated");
    rated.rating = 5;

    let temp_dir = tempdir().unwrap();
    let mut catalog = MediaCatalog::open(config_in(temp_dir.path(), Backend::Flat)).unwrap();
    catalog.add_images(vec![red, rated]).unwrap();

    let mut query = catalog.new_query();
    query.multi = MultiFilter {
        colors: strings(&["#FE0101"]),
        rating: Some(5),
        ..Default::default()
    };

    let ids: Vec<&str> = catalog.query(&query).iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["red"]);
}

/// Writing then reloading the flat document gives back the same records and categories
#[test]
fn flat_document_round_trip() {
    let temp_dir = tempdir().unwrap();

    let mut video = record("clip");
    video.kind = MediaKind::Video {
        duration: Some(31.5),
        thumbnail: Some("https://example.com/clip.png".to_string()),
    };
    video.tags = ["night".to_string(), "city".to_string()].into_iter().collect();
    let mut image = record("pic");
    image.width = Some(1024);
    image.height = Some(768);
    image.favorite = true;
    image.rating = 3;
    image.categories.insert("root".to_string());
    image.colors.push(ColorInfo {
        color: "#102030".to_string(),
        percentage: 0.25,
    });

    let mut root = CategoryNode::new("root", "Root");
    root.set_images(strings(&["pic"]));
    root.children = strings(&["child"]);
    let mut child = CategoryNode::new("child", "Child");
    child.father = Some("root".to_string());
    child.level = 1;
    child.order = 2;

    let document = CatalogDocument {
        images: vec![video, image],
        categories: vec![root, child],
    };

    let store = FlatFileStore::in_dir(temp_dir.path());
    store.write_document(&document).unwrap();

    let mut reopened = FlatFileStore::in_dir(temp_dir.path());
    assert_eq!(reopened.load_all().unwrap(), document);

    // And through the catalog, nothing needs repairing
    let catalog = MediaCatalog::with_repository(
        Box::new(FlatFileStore::in_dir(temp_dir.path())),
        config_in(temp_dir.path(), Backend::Flat),
    );
    let (records, categories) = catalog.get_images_and_categories();
    assert_eq!(records, document.images.as_slice());
    assert_eq!(categories, document.categories.as_slice());
}

#[test]
fn malformed_flat_document_starts_empty() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join(FlatFileStore::FILE_NAME), "{{{ not json").unwrap();

    let catalog = MediaCatalog::open(config_in(temp_dir.path(), Backend::Flat)).unwrap();
    assert!(catalog.records().is_empty());
    assert!(catalog.categories().is_empty());
}

#[test]
fn category_lifecycle_persists() {
    let temp_dir = tempdir().unwrap();
    let config = config_in(temp_dir.path(), Backend::Document);
    let mut catalog = MediaCatalog::open(config.clone()).unwrap();
    catalog.add_images(vec![record("a"), record("b")]).unwrap();

    let travel = catalog.add_category("Travel", None).unwrap();
    let food = catalog.add_category("Food", None).unwrap();
    let paris = catalog.add_category("Paris", Some(&travel)).unwrap();
    catalog.rename_category(&paris, "Paris 2024").unwrap();
    catalog
        .add_to_category(&strings(&["a", "b"]), &[paris.clone(), food.clone()])
        .unwrap();
    catalog.save_categories(&[food.clone(), travel.clone()]).unwrap();

    let summary = catalog.subcategories(&travel).unwrap();
    assert_eq!(summary[0].name, "Paris 2024");
    assert_eq!(summary[0].count, 2);
    assert_eq!(summary[0].thumbnail.as_deref(), Some("https://example.com/a.jpg"));

    let removed = catalog.delete_category(&travel).unwrap();
    assert_eq!(removed, vec![paris.clone(), travel.clone()]);

    let reopened = MediaCatalog::open(config).unwrap();
    let roots: Vec<&str> = reopened.tree().roots().iter().map(|n| n.name.as_str()).collect();
    assert_eq!(roots, vec!["Food"]);
    assert_eq!(
        reopened.get("a").unwrap().categories,
        [food.clone()].into_iter().collect()
    );
}
