//! Partial updates for catalog documents
//!
//! A patch carries only the fields an operation changed. Patches are what the
//! repositories receive for `update_media` / `update_category`, and they are
//! serialized to JSON alongside the rest of a change set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::data::{CategoryNode, ColorInfo, MediaRecord};

/// Changed fields of a media record
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<ColorInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bind_in_folder: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaPatch {
    /// Check if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Compute the patch that turns `old` into `new`, or None if they agree
    /// on every patchable field.
    pub fn between(old: &MediaRecord, new: &MediaRecord) -> Option<Self> {
        let patch = Self {
            name: changed(&old.name, &new.name),
            favorite: changed(&old.favorite, &new.favorite),
            rating: changed(&old.rating, &new.rating),
            tags: changed(&old.tags, &new.tags),
            colors: changed(&old.colors, &new.colors),
            categories: changed(&old.categories, &new.categories),
            is_bind_in_folder: changed(&old.is_bind_in_folder, &new.is_bind_in_folder),
            width: changed(&old.width, &new.width).flatten(),
            height: changed(&old.height, &new.height).flatten(),
        };
        (!patch.is_empty()).then_some(patch)
    }

    /// Apply the patch in place
    pub fn apply(&self, record: &mut MediaRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(favorite) = self.favorite {
            record.favorite = favorite;
        }
        if let Some(rating) = self.rating {
            record.rating = rating;
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(colors) = &self.colors {
            record.colors = colors.clone();
        }
        if let Some(categories) = &self.categories {
            record.categories = categories.clone();
        }
        if let Some(bound) = self.is_bind_in_folder {
            record.is_bind_in_folder = bound;
        }
        if let Some(width) = self.width {
            record.width = Some(width);
        }
        if let Some(height) = self.height {
            record.height = Some(height);
        }
    }
}

/// Changed fields of a category node
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New membership list; `count` is recomputed from it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
}

impl CategoryPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Compute the patch that turns `old` into `new`, or None if nothing changed
    pub fn between(old: &CategoryNode, new: &CategoryNode) -> Option<Self> {
        let patch = Self {
            name: changed(&old.name, &new.name),
            images: changed(&old.images, &new.images),
            order: changed(&old.order, &new.order),
            children: changed(&old.children, &new.children),
        };
        (!patch.is_empty()).then_some(patch)
    }

    /// Apply the patch in place, keeping `count == images.len()`
    pub fn apply(&self, node: &mut CategoryNode) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(images) = &self.images {
            node.set_images(images.clone());
        }
        if let Some(order) = self.order {
            node.order = order;
        }
        if let Some(children) = &self.children {
            node.children = children.clone();
        }
    }
}

fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}
