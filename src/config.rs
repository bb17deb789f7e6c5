//! Compression options. Every field is optional so partial JSON option files
//! and CLI flags can be layered; `effective_*` accessors apply defaults.

use std::path::Path;

use serde::Deserialize;

use crate::bitrate::{DEFAULT_AUDIO_BITRATE_KBPS, DEFAULT_TARGET_SIZE_MB};
use crate::error::AppError;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompressOptions {
    /// Desired upper bound on output size in MB (1 MB = 1024 * 1024 bytes). Default 14.5.
    pub target_size_mb: Option<f64>,
    /// Audio bitrate in kbps; also reserved out of the size budget. Default 128.
    pub audio_bitrate_kbps: Option<u32>,
    /// Video encoder passed to `-c:v`. Default libx264.
    pub video_codec: Option<String>,
    /// Audio encoder passed to `-c:a`. Default aac.
    pub audio_codec: Option<String>,
    /// Encoder preset. Default medium.
    pub preset: Option<String>,
    /// Move the moov atom to the front (`-movflags +faststart`). Default true.
    pub faststart: Option<bool>,
}

impl CompressOptions {
    pub fn effective_target_size_mb(&self) -> f64 {
        self.target_size_mb.unwrap_or(DEFAULT_TARGET_SIZE_MB)
    }

    pub fn effective_audio_bitrate_kbps(&self) -> u32 {
        self.audio_bitrate_kbps.unwrap_or(DEFAULT_AUDIO_BITRATE_KBPS)
    }

    pub fn effective_video_codec(&self) -> &str {
        non_empty(self.video_codec.as_deref()).unwrap_or("libx264")
    }

    pub fn effective_audio_codec(&self) -> &str {
        non_empty(self.audio_codec.as_deref()).unwrap_or("aac")
    }

    pub fn effective_preset(&self) -> &str {
        non_empty(self.preset.as_deref()).unwrap_or("medium")
    }

    pub fn effective_faststart(&self) -> bool {
        self.faststart.unwrap_or(true)
    }

    /// Rejects a target that is not a positive, finite number of megabytes.
    pub fn validate(&self) -> Result<(), AppError> {
        let target = self.effective_target_size_mb();
        if !target.is_finite() || target <= 0.0 {
            return Err(AppError::InvalidTarget(target));
        }
        Ok(())
    }

    /// Fields set in `overrides` win over fields set in `self`.
    pub fn merged_with(self, overrides: CompressOptions) -> CompressOptions {
        CompressOptions {
            target_size_mb: overrides.target_size_mb.or(self.target_size_mb),
            audio_bitrate_kbps: overrides.audio_bitrate_kbps.or(self.audio_bitrate_kbps),
            video_codec: overrides.video_codec.or(self.video_codec),
            audio_codec: overrides.audio_codec.or(self.audio_codec),
            preset: overrides.preset.or(self.preset),
            faststart: overrides.faststart.or(self.faststart),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|e| AppError::InvalidOptions(e.to_string()))
    }

    pub fn load_json_file(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AppError::InvalidOptions(format!("{}: {}", path.display(), e)))?;
        log::debug!(
            target: "vid_target::config",
            "Loaded options file: {}",
            path.display()
        );
        Self::from_json_str(&json)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
