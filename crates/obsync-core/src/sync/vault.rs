//! Local document sources

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::{DirEntry, WalkDir};

use crate::config::VaultConfig;
use crate::error::{Error, Result};
use crate::util::canonical_path;

/// A document found in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFile {
    /// Vault-relative path with forward slashes; the state key
    pub path: String,
    pub absolute_path: PathBuf,
    pub mtime: Option<DateTime<Utc>>,
}

/// Enumerates and reads the local documents.
pub trait VaultSource: Send + Sync {
    /// Every tracked document, ordered by path
    fn list_files(&self) -> Result<Vec<VaultFile>>;

    /// Raw bytes of a document
    fn read(&self, file: &VaultFile) -> Result<Vec<u8>>;
}

/// Vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryVault {
    root: PathBuf,
    config: VaultConfig,
}

impl DirectoryVault {
    pub fn new(root: impl Into<PathBuf>, config: VaultConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.'))
    }

    fn has_tracked_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|tracked| tracked.eq_ignore_ascii_case(ext))
            })
    }
}

impl VaultSource for DirectoryVault {
    fn list_files(&self) -> Result<Vec<VaultFile>> {
        if !self.root.is_dir() {
            return Err(Error::InvalidInput(format!(
                "vault root is not a directory: {}",
                self.root.display()
            )));
        }

        let skip_hidden = self.config.skip_hidden;
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !(skip_hidden && Self::is_hidden(entry)))
        {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() || !self.has_tracked_extension(entry.path()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| Error::InvalidInput(e.to_string()))?;
            let mtime = entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .map(DateTime::<Utc>::from);

            files.push(VaultFile {
                path: canonical_path(relative),
                absolute_path: entry.path().to_path_buf(),
                mtime,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("Found {} documents under {}", files.len(), self.root.display());
        Ok(files)
    }

    fn read(&self, file: &VaultFile) -> Result<Vec<u8>> {
        Ok(std::fs::read(&file.absolute_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn lists_markdown_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.md", "b");
        write(dir.path(), "folder/a.md", "a");
        write(dir.path(), "folder/image.png", "png");
        write(dir.path(), ".obsidian/workspace.md", "hidden");
        write(dir.path(), "folder/.draft.md", "hidden");
        write(dir.path(), "UPPER.MD", "upper");

        let vault = DirectoryVault::new(dir.path(), VaultConfig::default());
        let paths: Vec<_> = vault
            .list_files()
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["UPPER.MD", "b.md", "folder/a.md"]);
    }

    #[test]
    fn hidden_entries_included_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".hidden/note.md", "x");

        let config = VaultConfig {
            skip_hidden: false,
            ..VaultConfig::default()
        };
        let files = DirectoryVault::new(dir.path(), config).list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, ".hidden/note.md");
    }

    #[test]
    fn reads_bytes_and_reports_mtime() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "note.md", "hello");

        let vault = DirectoryVault::new(dir.path(), VaultConfig::default());
        let files = vault.list_files().unwrap();
        assert!(files[0].mtime.is_some());
        assert_eq!(vault.read(&files[0]).unwrap(), b"hello");
    }

    #[test]
    fn missing_root_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let vault = DirectoryVault::new(dir.path().join("missing"), VaultConfig::default());
        assert!(matches!(vault.list_files(), Err(Error::InvalidInput(_))));
    }
}
