//! State module
//!
//! This module holds the catalog's data model:
//! - Media records, category nodes and the persisted document (data.rs)
//! - Partial updates applied by the repositories (edit.rs)

pub mod data;
pub mod edit;

pub use data::{CatalogDocument, CategoryNode, ColorInfo, MediaKind, MediaRecord};
pub use edit::{CategoryPatch, MediaPatch};
