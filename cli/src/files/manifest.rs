//! Hashed inventories of a file tree and the differences between two of them

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::errors::CliError;
use crate::files::hash::hash_file;
use crate::files::matcher::IgnoreRuleSet;
use crate::files::to_slash;

pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    /// MD5 hex digest
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    pub version: String,
    pub files: Vec<FileEntry>,
}

/// Paths that differ between two manifests, each list sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

impl FileManifest {
    pub fn new(files: Vec<FileEntry>) -> Self {
        let mut files = files;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            version: MANIFEST_VERSION.to_string(),
            files,
        }
    }

    /// Hash every file under `root` that `rules` does not ignore
    pub fn build(root: &Path, rules: &IgnoreRuleSet) -> Result<Self, CliError> {
        let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match entry.path().strip_prefix(root) {
                Ok(rel) => !rules.should_ignore(&format!("{}/", to_slash(rel))),
                Err(_) => true,
            }
        });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| CliError::Internal(e.to_string()))?;
            let path = to_slash(rel);
            if rules.should_ignore(&path) {
                continue;
            }
            let size = entry.metadata()?.len();
            files.push(FileEntry {
                hash: hash_file(entry.path())?,
                path,
                size,
            });
        }
        Ok(Self::new(files))
    }

    /// Compare against an earlier snapshot
    pub fn diff(&self, previous: &FileManifest) -> ManifestDiff {
        let current: HashMap<&str, &FileEntry> =
            self.files.iter().map(|f| (f.path.as_str(), f)).collect();
        let before: HashMap<&str, &FileEntry> =
            previous.files.iter().map(|f| (f.path.as_str(), f)).collect();

        let mut diff = ManifestDiff::default();
        for (path, entry) in &current {
            match before.get(path) {
                None => diff.added.push(path.to_string()),
                Some(old) if old.hash != entry.hash => diff.modified.push(path.to_string()),
                Some(_) => {}
            }
        }
        diff.deleted = before
            .keys()
            .filter(|path| !current.contains_key(*path))
            .map(|path| path.to_string())
            .collect();

        diff.added.sort();
        diff.modified.sort();
        diff.deleted.sort();
        diff
    }
}

