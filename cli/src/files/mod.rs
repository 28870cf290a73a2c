//! Selecting, hashing and packaging the files of a project

pub mod archive;
pub mod dependencies;
pub mod hash;
pub mod include;
pub mod manifest;
pub mod matcher;

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::errors::CliError;

/// Compile a glob where `*` never crosses a `/`
pub(crate) fn compile_glob(pattern: &str) -> Result<Glob, CliError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| CliError::Validation(format!("invalid pattern '{pattern}': {}", e.kind())))
}

pub(crate) fn compile_matcher(pattern: &str) -> Result<GlobMatcher, CliError> {
    Ok(compile_glob(pattern)?.compile_matcher())
}

/// Relative path with `/` separators regardless of platform
pub(crate) fn to_slash(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
