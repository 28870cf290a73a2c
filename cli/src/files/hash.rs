//! MD5 content hashes, matching the ETags object storage reports

use std::fs;
use std::io;
use std::path::Path;

use md5::{Digest, Md5};

use crate::errors::CliError;
use crate::utils::hex;

pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

pub fn hash_file(path: &Path) -> Result<String, CliError> {
    let mut file = fs::File::open(path)
        .map_err(|e| CliError::FileSystem(format!("failed to open {}: {e}", path.display())))?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CliError::FileSystem(format!("failed to hash {}: {e}", path.display())))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Fails unless the file's hash equals `expected`
pub fn verify_file_hash(path: &Path, expected: &str) -> Result<(), CliError> {
    let actual = hash_file(path)?;
    if actual != expected {
        return Err(CliError::Validation(format!(
            "hash mismatch for {}: expected {expected}, got {actual}",
            path.display()
        )));
    }
    Ok(())
}
