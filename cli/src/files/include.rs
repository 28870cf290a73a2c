//! Resolving which project files get shipped

use std::collections::BTreeSet;
use std::path::Path;

use globset::{GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::errors::CliError;
use crate::files::{compile_glob, to_slash};

/// Top-level folders that usually should not be deployed
pub const DEV_FOLDERS: [&str; 6] = ["venv", "virtualenv", ".venv", ".git", "node_modules", "__pycache__"];

/// Normalize user patterns for matching.
///
/// `*` and `./*` mean every file recursively, a leading `./` is dropped and a
/// trailing `/` covers everything under that directory.
pub fn normalize_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.as_ref().trim().replace('\\', "/"))
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p == "*" || p == "./*" {
                return "**/*".to_string();
            }
            let p = p.strip_prefix("./").unwrap_or(&p).to_string();
            if p.ends_with('/') {
                format!("{p}**")
            } else {
                p
            }
        })
        .collect()
}

fn build_set(patterns: &[String]) -> Result<GlobSet, CliError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern)?);
    }
    builder
        .build()
        .map_err(|e| CliError::Validation(format!("invalid pattern set: {e}")))
}

/// Walk `root` and return every file matching an include pattern and no
/// exclude pattern, as relative `/`-separated paths.
pub fn determine_included_files<I: AsRef<str>, E: AsRef<str>>(
    root: &Path,
    include: &[I],
    exclude: &[E],
) -> Result<Vec<String>, CliError> {
    let include = build_set(&normalize_patterns(include))?;
    let exclude = build_set(&normalize_patterns(exclude))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| CliError::Internal(e.to_string()))?;
        let path = to_slash(relative);
        if include.is_match(&path) && !exclude.is_match(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Development folders found at the top level of `files`
pub fn detect_dev_folders<S: AsRef<str>>(files: &[S]) -> Vec<String> {
    let found: BTreeSet<&str> = files
        .iter()
        .filter_map(|f| f.as_ref().split('/').next())
        .filter_map(|root| DEV_FOLDERS.iter().copied().find(|dev| *dev == root))
        .collect();
    found.into_iter().map(String::from).collect()
}
