//! Output integrity check via FFmpeg decode-to-null.
//!
//! A valid file decodes without errors; truncation or corruption produces
//! FFmpeg error lines and usually a non-zero exit.

use std::path::Path;
use std::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use super::discovery::get_ffmpeg_path;
use crate::error::AppError;

fn decode_to_null_args(path_str: &str) -> [&str; 7] {
    ["-v", "error", "-i", path_str, "-f", "null", "-"]
}

/// Decode the whole file with FFmpeg, discarding frames.
pub fn verify_output(path: &Path) -> Result<(), AppError> {
    let ffmpeg = get_ffmpeg_path()?;
    verify_with(ffmpeg, path)
}

pub(crate) fn verify_with(ffmpeg: &Path, path: &Path) -> Result<(), AppError> {
    let path_str = path.to_string_lossy();
    log::debug!(
        target: "vid_target::ffmpeg::verify",
        "Verifying output by decode-to-null: {}",
        path_str
    );
    let mut cmd = Command::new(ffmpeg);
    cmd.args(decode_to_null_args(&path_str));
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    let output = cmd.output().map_err(|e| {
        AppError::VerificationFailed(format!("Failed to run FFmpeg for verification: {}", e))
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() && !stderr.to_lowercase().contains("error") {
        return Ok(());
    }
    Err(AppError::VerificationFailed(format!(
        "Video verification failed (exit {}): {}",
        output.status.code().unwrap_or(-1),
        stderr.trim()
    )))
}
