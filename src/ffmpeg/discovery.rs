use crate::error::AppError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// Env override for the ffmpeg binary (tests/CI or custom builds).
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";
/// Env override for the ffprobe binary.
pub const FFPROBE_PATH_ENV: &str = "FFPROBE_PATH";

static FFMPEG_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();

#[cfg(target_os = "windows")]
fn find_in_path(tool: &str) -> Option<PathBuf> {
    let output = Command::new("where").arg(tool).output().ok()?;
    first_existing_line(&output)
}

#[cfg(not(target_os = "windows"))]
fn find_in_path(tool: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(tool).output().ok()?;
    first_existing_line(&output)
}

fn first_existing_line(output: &std::process::Output) -> Option<PathBuf> {
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next()?.trim();
    if first.is_empty() {
        return None;
    }
    let path = PathBuf::from(first);
    path.exists().then_some(path)
}

fn common_dirs() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/opt/local/bin"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin"),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![PathBuf::from("/usr/bin"), PathBuf::from("/usr/local/bin")]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

fn executable_name(tool: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{tool}.exe")
    } else {
        tool.to_string()
    }
}

/// Path from an env override, if set and pointing at an existing file.
fn path_from_env(var: &str) -> Option<PathBuf> {
    let value = std::env::var_os(var)?;
    let path = PathBuf::from(value);
    if path.exists() {
        log::debug!(
            target: "vid_target::ffmpeg::discovery",
            "{} from {} env: {}",
            var.trim_end_matches("_PATH").to_lowercase(),
            var,
            path.display()
        );
        Some(path)
    } else {
        log::warn!(
            target: "vid_target::ffmpeg::discovery",
            "{} points to a missing file, ignoring: {}",
            var,
            path.display()
        );
        None
    }
}

/// Common install locations first, then a PATH lookup.
fn locate_installed(tool: &str) -> Option<PathBuf> {
    let exe = executable_name(tool);
    for dir in common_dirs() {
        let path = dir.join(&exe);
        if path.exists() {
            log::debug!(
                target: "vid_target::ffmpeg::discovery",
                "{} found in common path: {}",
                tool,
                path.display()
            );
            return Some(path);
        }
    }
    let found = find_in_path(tool);
    if let Some(ref p) = found {
        log::debug!(
            target: "vid_target::ffmpeg::discovery",
            "{} found in PATH: {}",
            tool,
            p.display()
        );
    }
    found
}

fn not_found_error(tool: &str) -> AppError {
    AppError::FfmpegNotFound(format!(
        "{tool} not found. Please install FFmpeg on your system:\n  - macOS: brew install ffmpeg\n  - Linux: sudo apt install ffmpeg\n  - Windows: Download from https://ffmpeg.org/download.html"
    ))
}

/// Get FFmpeg path. Cached for process lifetime.
/// `FFMPEG_PATH` takes precedence, then common installation paths, then PATH.
pub fn get_ffmpeg_path() -> Result<&'static Path, AppError> {
    if let Some(path) = FFMPEG_PATH_CACHE.get() {
        return Ok(path.as_path());
    }
    let path = path_from_env(FFMPEG_PATH_ENV)
        .or_else(|| locate_installed("ffmpeg"))
        .ok_or_else(|| {
            log::error!(
                target: "vid_target::ffmpeg::discovery",
                "FFmpeg not found in PATH or common locations"
            );
            not_found_error("FFmpeg")
        })?;
    Ok(FFMPEG_PATH_CACHE.get_or_init(|| path).as_path())
}

/// Paths to try for ffprobe given an ffmpeg binary path (suffixed first, then plain).
pub fn ffprobe_candidates(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let Some(parent) = ffmpeg_path.parent() else {
        return vec![];
    };
    let mut candidates = Vec::with_capacity(2);
    if let Some(suffix) = ffmpeg_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.strip_prefix("ffmpeg"))
        .filter(|suffix| !suffix.is_empty())
    {
        candidates.push(parent.join(executable_name(&format!("ffprobe{suffix}"))));
    }
    candidates.push(parent.join(executable_name("ffprobe")));
    candidates
}

/// Get ffprobe path.
/// `FFPROBE_PATH` takes precedence, then the directory of the resolved ffmpeg
/// (ffmpeg/ffprobe ship together), then common installation paths and PATH.
pub fn get_ffprobe_path() -> Result<PathBuf, AppError> {
    if let Some(path) = path_from_env(FFPROBE_PATH_ENV) {
        return Ok(path);
    }
    if let Ok(ffmpeg) = get_ffmpeg_path()
        && let Some(sibling) = ffprobe_candidates(ffmpeg).into_iter().find(|c| c.exists())
    {
        return Ok(sibling);
    }
    locate_installed("ffprobe").ok_or_else(|| not_found_error("ffprobe"))
}
