use std::io;
use std::path::Path;

use crate::error::AppError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Size of the file at `path` in bytes. A missing file is `InputNotFound`.
pub fn file_size(path: &Path) -> Result<u64, AppError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(AppError::InputNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// A target as shown in report lines. Whole numbers keep one decimal (`15.0`).
pub fn format_target_mb(target_mb: f64) -> String {
    // f64's Debug output always carries a fractional part.
    format!("{:?}", target_mb)
}

pub fn is_within_target(bytes: u64, target_mb: f64) -> bool {
    bytes_to_mb(bytes) <= target_mb
}
