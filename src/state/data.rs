//! Shared data structures for the catalog
//!
//! These structs represent the data model that flows between
//! the storage back ends, the catalog engines and the query layer.
//! Field names serialize in camelCase to match the persisted document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use crate::media::path::MediaLocation;

/// Kind-specific part of a media record
///
/// Serialized inline with the record under a `type` discriminant
/// (`"image"` or `"video"`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video {
        /// Duration in seconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        /// Path or URI of a generated poster frame
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<String>,
    },
}

impl MediaKind {
    pub fn video() -> Self {
        MediaKind::Video {
            duration: None,
            thumbnail: None,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video { .. })
    }
}

/// A dominant color of an image and its share of the pixels
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "ColorEntry")]
pub struct ColorInfo {
    /// Hex color, e.g. "#3A7BD5"
    pub color: String,
    /// Share of the image covered by this color (0.0 - 1.0)
    pub percentage: f64,
}

/// Older catalogs stored colors as bare hex strings
#[derive(Deserialize)]
#[serde(untagged)]
enum ColorEntry {
    Hex(String),
    Full { color: String, percentage: f64 },
}

impl From<ColorEntry> for ColorInfo {
    fn from(entry: ColorEntry) -> Self {
        match entry {
            ColorEntry::Hex(color) => ColorInfo {
                color,
                percentage: 0.0,
            },
            ColorEntry::Full { color, percentage } => ColorInfo { color, percentage },
        }
    }
}

/// Represents a single image or video in the catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Stable unique id
    pub id: String,
    /// local-image:// URI or remote http(s) URL
    pub path: String,
    /// Display name, without extension
    pub name: String,
    /// Lowercase extension without the dot (e.g. "jpg")
    #[serde(default)]
    pub extension: String,
    /// File size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub date_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Aspect ratio as "W:H"; derived from width/height when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub favorite: bool,
    /// 0 = unrated, 1 - 5 stars
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub colors: Vec<ColorInfo>,
    /// Ids of the categories currently holding this record
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Lifecycle owned by a folder-import category
    #[serde(default)]
    pub is_bind_in_folder: bool,
    /// Unsaved-mutation marker, never persisted
    #[serde(skip)]
    pub is_dirty: bool,
}

impl MediaRecord {
    /// Create a bare image record
    pub fn new(id: impl Into<String>, path: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            path: path.into(),
            name: name.into(),
            extension: String::new(),
            size: 0,
            date_created: now,
            date_modified: now,
            kind: MediaKind::Image,
            width: None,
            height: None,
            ratio: None,
            tags: BTreeSet::new(),
            favorite: false,
            rating: 0,
            colors: Vec::new(),
            categories: BTreeSet::new(),
            is_bind_in_folder: false,
            is_dirty: false,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind.is_video()
    }

    /// Aspect ratio, reduced by the greatest common divisor ("1920x1080" -> "16:9")
    pub fn ratio(&self) -> Option<String> {
        if let Some(ratio) = &self.ratio {
            return Some(ratio.clone());
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => {
                let divisor = gcd(w, h);
                Some(format!("{}:{}", w / divisor, h / divisor))
            }
            _ => None,
        }
    }

    pub fn location(&self) -> MediaLocation {
        MediaLocation::parse(&self.path)
    }

    /// Filesystem path, if the record points at a local file
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.location() {
            MediaLocation::Local(path) => Some(path),
            MediaLocation::Remote(_) => None,
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// A user-defined category in the tree
///
/// `images` is the authoritative membership list; `count` mirrors its length.
/// Tree links are ids only: `father` points up, `children` points down.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub count: usize,
    /// Source directory for folder-import categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(default)]
    pub is_import_from_folder: bool,
    /// Sibling ordering key
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub father: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    /// Depth in the tree, 0 for roots
    #[serde(default)]
    pub level: u32,
}

impl CategoryNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            images: Vec::new(),
            count: 0,
            folder_path: None,
            is_import_from_folder: false,
            order: 0,
            father: None,
            children: Vec::new(),
            level: 0,
        }
    }

    pub fn contains(&self, image_id: &str) -> bool {
        self.images.iter().any(|id| id == image_id)
    }

    /// Replace the membership list and keep `count` in step
    pub fn set_images(&mut self, images: Vec<String>) {
        self.count = images.len();
        self.images = images;
    }

    /// Append ids not already present, preserving existing order
    pub fn add_images<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) -> bool {
        let mut next = self.images.clone();
        for id in ids {
            if !next.contains(id) {
                next.push(id.clone());
            }
        }
        let changed = next.len() != self.images.len();
        self.set_images(next);
        changed
    }

    /// Drop the given ids; returns true if anything was removed
    pub fn remove_images(&mut self, ids: &HashSet<String>) -> bool {
        let next: Vec<String> = self
            .images
            .iter()
            .filter(|id| !ids.contains(*id))
            .cloned()
            .collect();
        let changed = next.len() != self.images.len();
        self.set_images(next);
        changed
    }
}

/// The whole catalog as persisted: `{ images: [...], categories: [...] }`
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CatalogDocument {
    #[serde(default)]
    pub images: Vec<MediaRecord>,
    #[serde(default)]
    pub categories: Vec<CategoryNode>,
}

impl CatalogDocument {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.categories.is_empty()
    }
}
