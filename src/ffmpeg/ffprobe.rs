//! FFprobe-based duration lookup.
//!
//! Uses the flat `default=noprint_wrappers=1:nokey=1` writer so the output is
//! just the container duration in seconds on one line.

use std::path::Path;
use std::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use super::discovery::get_ffprobe_path;
use crate::error::AppError;

pub(crate) fn duration_probe_args(path_str: &str) -> [&str; 7] {
    [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        path_str,
    ]
}

/// Parse ffprobe's duration output (e.g. `"30.500000\n"`) into seconds.
pub fn parse_duration_output(stdout: &str) -> Result<f64, AppError> {
    let text = stdout.trim();
    if text.is_empty() {
        return Err(AppError::probe_failed("ffprobe returned no duration"));
    }
    let duration: f64 = text
        .parse()
        .map_err(|_| AppError::probe_failed(format!("could not parse duration '{}'", text)))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(AppError::probe_failed(format!(
            "ffprobe reported a non-positive duration '{}'",
            text
        )));
    }
    Ok(duration)
}

/// Run ffprobe on a media file and return its container duration in seconds.
pub fn probe_duration(path: &Path) -> Result<f64, AppError> {
    let ffprobe = get_ffprobe_path().map_err(|e| AppError::probe_failed(e.to_string()))?;
    probe_duration_with(&ffprobe, path)
}

pub(crate) fn probe_duration_with(ffprobe: &Path, path: &Path) -> Result<f64, AppError> {
    let path_str = path.to_string_lossy();

    log::debug!(
        target: "vid_target::ffmpeg::ffprobe",
        "probe_duration: ffprobe={}, path={}",
        ffprobe.display(),
        path_str
    );

    let mut cmd = Command::new(ffprobe);
    cmd.args(duration_probe_args(&path_str));
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    let output = cmd
        .output()
        .map_err(|e| AppError::probe_failed(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::probe_failed(format!(
            "ffprobe failed (code {}): {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|_| AppError::probe_failed("ffprobe output was not valid UTF-8"))?;
    let duration = parse_duration_output(&stdout)?;
    log::debug!(
        target: "vid_target::ffmpeg::ffprobe",
        "probe_duration: {:.3}s",
        duration
    );
    Ok(duration)
}
