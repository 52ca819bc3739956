//! File-system collaborators of the catalog
//!
//! This module handles:
//! - The local-image:// URI scheme and stable record ids (path.rs)
//! - Directory listing and physical file deletion (files.rs)
//! - Width/height/duration probing (probe.rs)

pub mod files;
pub mod path;
pub mod probe;

pub use files::{FileEntry, LocalFiles, MediaFiles};
pub use path::{hash_id, to_local_uri, MediaLocation, LOCAL_SCHEME};
pub use probe::{ImageProbe, MediaDimensions, MediaProbe};
