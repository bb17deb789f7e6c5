//! Map FFmpeg exit codes to short report summaries.
//!
//! Exit codes are from ffmpeg.c: 1 (general), 69 (rate exceeded),
//! 123 (hard exit), 255 (signal). -1 is used for spawn failure.
//! Stderr is kept as detail so the full diagnostic can be printed.

use serde::Serialize;

/// Summary plus full diagnostic text for a failed FFmpeg run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegErrorPayload {
    pub summary: String,
    pub detail: String,
}

/// Maps FFmpeg exit code to a short summary. Stderr is passed through as detail.
pub fn parse_ffmpeg_error(stderr: &str, exit_code: i32) -> FfmpegErrorPayload {
    let summary = known_exit_code_summary(exit_code)
        .unwrap_or_else(|| format!("FFmpeg failed (exit code {}).", exit_code));
    FfmpegErrorPayload {
        summary,
        detail: stderr.trim().to_string(),
    }
}

fn known_exit_code_summary(code: i32) -> Option<String> {
    match code {
        -1 => Some("FFmpeg not found or failed to start.".into()),
        1 => Some("FFmpeg failed.".into()),
        69 => Some("Encoding rate limit exceeded.".into()),
        123 | 255 => Some("Encoding was stopped.".into()),
        _ => None,
    }
}

/// Last `n` non-empty stderr lines joined with "; ", newest first. Used for log previews.
pub fn stderr_tail(stderr: &str, n: usize) -> String {
    stderr
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(n)
        .collect::<Vec<_>>()
        .join("; ")
}
