//! Target bitrate arithmetic.

use crate::error::AppError;

/// Kilobits per megabyte (1024 * 1024 * 8 / 1024).
pub const KBITS_PER_MB: f64 = 8192.0;
pub const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 128;
pub const DEFAULT_TARGET_SIZE_MB: f64 = 14.5;

/// Video bitrate in kbps that fills `target_mb` over `duration_secs`,
/// after reserving `audio_kbps` for the audio track:
/// `floor(target_mb * 8192 / duration_secs - audio_kbps)`.
pub fn target_video_bitrate_kbps(
    target_mb: f64,
    duration_secs: f64,
    audio_kbps: u32,
) -> Result<u32, AppError> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(AppError::InvalidDuration(duration_secs));
    }
    if !target_mb.is_finite() || target_mb <= 0.0 {
        return Err(AppError::InvalidTarget(target_mb));
    }
    let total_kbps = target_mb * KBITS_PER_MB / duration_secs;
    let video_kbps = (total_kbps - f64::from(audio_kbps)).floor();
    if video_kbps < 1.0 {
        return Err(AppError::BitrateTooLow {
            target_mb,
            duration_secs,
            kbps: video_kbps as i64,
        });
    }
    Ok(video_kbps.min(f64::from(u32::MAX)) as u32)
}
