//! Building the deployment zip

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::CliError;
use crate::files::dependencies::DependencyFiles;

const GIB: u64 = 1024 * 1024 * 1024;

/// Archives above this size deploy with a warning
pub const SOFT_SIZE_LIMIT: u64 = GIB;
/// Archives above this size are refused
pub const HARD_SIZE_LIMIT: u64 = 2 * GIB;
/// Ceiling on the uncompressed bytes written into one archive
pub const MAX_UNCOMPRESSED_BYTES: u64 = 100 * GIB;

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub max_uncompressed_bytes: u64,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            max_uncompressed_bytes: MAX_UNCOMPRESSED_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Compressed size on disk
    pub size: u64,
    pub entries: usize,
    pub uncompressed_bytes: u64,
}

/// Write `dep_files` followed by `files` (relative to `root`) into a zip at `dest`.
///
/// A partially written archive is removed on failure.
pub fn create_archive(
    root: &Path,
    files: &[String],
    dep_files: &DependencyFiles,
    dest: &Path,
    options: &ArchiveOptions,
) -> Result<ArchiveSummary, CliError> {
    let result = write_archive(root, files, dep_files, dest, options);
    if result.is_err() {
        if let Err(e) = fs::remove_file(dest) {
            debug!("failed to remove partial archive {}: {}", dest.display(), e);
        }
    }
    result
}

fn write_archive(
    root: &Path,
    files: &[String],
    dep_files: &DependencyFiles,
    dest: &Path,
    options: &ArchiveOptions,
) -> Result<ArchiveSummary, CliError> {
    let out = fs::File::create(dest).map_err(|e| {
        CliError::FileSystem(format!("failed to create archive {}: {e}", dest.display()))
    })?;
    let mut writer = ZipWriter::new(out);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut total: u64 = 0;
    let mut entries = 0;

    let now = zip_time(Utc::now());
    for (name, contents) in dep_files {
        total = check_ceiling(total, contents.len() as u64, name, options)?;
        writer.start_file(name.as_str(), base.last_modified_time(now))?;
        writer.write_all(contents.as_bytes())?;
        entries += 1;
    }

    for rel in files {
        let path = root.join(rel);
        let mut file = fs::File::open(&path)
            .map_err(|e| CliError::FileSystem(format!("failed to open {rel}: {e}")))?;
        let metadata = file.metadata()?;
        let before = total;
        check_ceiling(before, metadata.len(), rel, options)?;

        let modified: DateTime<Utc> = metadata.modified().map(Into::into).unwrap_or_else(|_| Utc::now());
        let mut entry_options = base
            .last_modified_time(zip_time(modified))
            .large_file(metadata.len() > u32::MAX as u64);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            entry_options = entry_options.unix_permissions(metadata.permissions().mode());
        }

        writer.start_file(rel.as_str(), entry_options)?;
        // a file can keep growing after its size was checked, never read past the budget
        let budget = options.max_uncompressed_bytes - before;
        let copied = io::copy(&mut (&mut file).take(budget.saturating_add(1)), &mut writer)
            .map_err(|e| CliError::FileSystem(format!("failed to add {rel} to archive: {e}")))?;
        if copied > budget {
            debug!("ceiling reached while copying {rel}");
            return Err(bomb_error(options));
        }
        if copied != metadata.len() {
            warn!("{rel} changed size while archiving ({} -> {copied} bytes)", metadata.len());
        }
        total = before + copied;
        entries += 1;
    }

    writer.finish()?;
    let size = fs::metadata(dest)?.len();
    debug!("archived {entries} entries ({total} bytes) into {} ({size} bytes)", dest.display());

    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        size,
        entries,
        uncompressed_bytes: total,
    })
}

fn check_ceiling(total: u64, next: u64, name: &str, options: &ArchiveOptions) -> Result<u64, CliError> {
    let total = total.saturating_add(next);
    if total > options.max_uncompressed_bytes {
        debug!("ceiling reached while adding {name}");
        return Err(bomb_error(options));
    }
    Ok(total)
}

fn bomb_error(options: &ArchiveOptions) -> CliError {
    CliError::FileSystem(format!(
        "zip bomb protection: uncompressed size exceeds {} bytes",
        options.max_uncompressed_bytes
    ))
}

fn zip_time(time: DateTime<Utc>) -> zip::DateTime {
    // zip timestamps cannot represent dates before 1980
    zip::DateTime::from_date_and_time(
        time.year().clamp(1980, 2107) as u16,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .unwrap_or_default()
}

/// Check the finished archive size. Returns a warning above the soft limit.
pub fn validate_archive_size(size: u64) -> Result<Option<String>, CliError> {
    if size > HARD_SIZE_LIMIT {
        return Err(CliError::FileSystem(format!(
            "project archive is over 2 GiB ({size} bytes). Use `buildship cp` to upload large files instead"
        )));
    }
    if size > SOFT_SIZE_LIMIT {
        return Ok(Some(format!(
            "project archive is over 1 GiB ({size} bytes). The deployment should work but may be slow; consider `buildship cp` for large files"
        )));
    }
    Ok(None)
}
