//! Directory listing and file deletion
//!
//! The catalog only talks to the disk through [`MediaFiles`], so tests can
//! swap in a fake that fails on purpose.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// A regular file found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Lowercase extension without the dot, empty if none
    pub extension: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl FileEntry {
    /// File name without its extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// File-system primitives used by import and hard delete
pub trait MediaFiles: Send + Sync {
    /// Direct (non-recursive) file entries of a directory
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<FileEntry>>;

    /// Metadata of a single file
    fn stat(&self, path: &Path) -> io::Result<FileEntry>;

    /// Remove a file from disk
    fn delete_file(&self, path: &Path) -> io::Result<()>;
}

/// The real file system
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl MediaFiles for LocalFiles {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        if !fs::metadata(dir)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", dir.display()),
            ));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            match self.stat(entry.path()) {
                Ok(file) => entries.push(file),
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        let metadata = fs::metadata(path)?;
        let modified: DateTime<Utc> = metadata.modified()?.into();
        // Not every file system records a birth time
        let created = metadata
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified);

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Ok(FileEntry {
            path: path.to_path_buf(),
            extension,
            size: metadata.len(),
            created,
            modified,
        })
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_dir_is_not_recursive() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.JPG"), b"abc").unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("nested").join("b.jpg"), b"abc").unwrap();

        let entries = LocalFiles.list_dir(temp_dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].extension, "jpg");
        assert_eq!(entries[0].size, 3);
        assert_eq!(entries[0].stem(), "a");
    }

    #[test]
    fn test_list_dir_missing_directory() {
        let temp_dir = tempdir().unwrap();
        assert!(LocalFiles.list_dir(&temp_dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_delete_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gone.png");
        fs::write(&path, b"x").unwrap();

        LocalFiles.delete_file(&path).unwrap();
        assert!(!path.exists());
        assert!(LocalFiles.delete_file(&path).is_err());
    }
}
