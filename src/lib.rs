//! Local-first media catalog
//!
//! Persists media records and a tree of user categories, keeps the
//! record/category links consistent through cascading edits, and answers
//! filtered, sorted queries over the loaded snapshot.

pub mod catalog;
pub mod color;
pub mod config;
pub mod error;
pub mod media;
pub mod query;
pub mod queue;
pub mod state;
pub mod store;

pub use catalog::MediaCatalog;
pub use config::{Backend, CatalogConfig};
pub use error::{CatalogError, Result};
