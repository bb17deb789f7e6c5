//! App error type for compress runs. Implements Display and Serialize for JSON reports.

use std::path::PathBuf;

use crate::ffmpeg::parse_ffmpeg_error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Input file '{}' not found", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid target size: {0} MB (must be a positive number)")]
    InvalidTarget(f64),

    #[error("Output path '{}' is the same file as the input", .0.display())]
    SameInputOutput(PathBuf),

    #[error("{0}")]
    FfmpegNotFound(String),

    #[error("{0}")]
    ProbeFailed(String),

    #[error("Invalid media duration: {0} seconds")]
    InvalidDuration(f64),

    #[error(
        "Target size {target_mb} MB is too small for {duration_secs:.2} seconds of video \
         (computed video bitrate {kbps} kbps)"
    )]
    BitrateTooLow {
        target_mb: f64,
        duration_secs: f64,
        kbps: i64,
    },

    #[error("FFmpeg failed (code {code}): {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    #[error("{0}")]
    VerificationFailed(String),

    #[error("Invalid options file: {0}")]
    InvalidOptions(String),
}

impl AppError {
    pub fn ffmpeg_failed(code: i32, stderr: impl Into<String>) -> Self {
        Self::FfmpegFailed {
            code,
            stderr: stderr.into(),
        }
    }

    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed(reason.into())
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AppError::FfmpegFailed { code, stderr } => {
                let payload = parse_ffmpeg_error(stderr, *code);
                let json =
                    serde_json::json!({ "summary": payload.summary, "detail": payload.detail });
                serializer.serialize_str(&json.to_string())
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::FfmpegFailed {
            code: -1,
            stderr: s,
        }
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}
