//! Media locations
//!
//! Local files are referenced as `local-image://<percent-encoded path>`,
//! remote media keeps its http(s) URL.

use std::path::{Path, PathBuf};

/// URI scheme for files on the local disk
pub const LOCAL_SCHEME: &str = "local-image://";

/// Where a record's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocation {
    Local(PathBuf),
    Remote(String),
}

impl MediaLocation {
    /// Parse a record path. Strings without a known scheme are plain local paths.
    pub fn parse(uri: &str) -> Self {
        if let Some(encoded) = uri.strip_prefix(LOCAL_SCHEME) {
            let decoded = urlencoding::decode(encoded)
                .map(|path| path.into_owned())
                .unwrap_or_else(|_| encoded.to_string());
            MediaLocation::Local(PathBuf::from(decoded))
        } else if uri.starts_with("http://") || uri.starts_with("https://") {
            MediaLocation::Remote(uri.to_string())
        } else {
            MediaLocation::Local(PathBuf::from(uri))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MediaLocation::Local(_))
    }
}

/// Build the local-image:// URI for a file on disk
pub fn to_local_uri(path: &Path) -> String {
    format!(
        "{}{}",
        LOCAL_SCHEME,
        urlencoding::encode(&path.to_string_lossy())
    )
}

/// Stable id for a file: a 32-bit string hash of "<path>-<size>", in hex.
///
/// Hashes UTF-16 code units with `h = h * 31 + c` in wrapping i32 arithmetic,
/// so ids match the ones already stored in existing catalogs.
pub fn hash_id(path: &str, size: u64) -> String {
    let key = format!("{}-{}", path, size);
    let mut hash: i32 = 0;
    for unit in key.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    format!("{:x}", (hash as i64).abs())
}
