//! SHA-256 checksums for downloaded export files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{AcdbError, AcdbResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the lowercase hexadecimal SHA-256 of a file.
///
/// # Errors
///
/// Returns `InstallFailure` if the file cannot be read.
pub fn calculate_file_checksum(path: &Path) -> AcdbResult<String> {
    let mut file = File::open(path).map_err(|e| AcdbError::install(path, e.to_string()))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| AcdbError::install(path, e.to_string()))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a file against an expected checksum (hex, any case).
pub fn verify_checksum(path: &Path, expected: &str) -> AcdbResult<()> {
    let actual = calculate_file_checksum(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(AcdbError::install(
            path,
            format!("checksum mismatch: expected {}, got {}", expected, actual),
        ));
    }
    Ok(())
}
