use regex::Regex;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d+):(\d+):([\d.]+)").expect("invalid duration regex")
});
static OUT_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^out_time_(?:ms|us)=(\d+)").expect("invalid time regex"));

/// One parsed line of FFmpeg output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Fraction in [0, 1], when the line carried an output timestamp and duration is known.
    pub progress: Option<f64>,
    /// Duration in seconds, either just parsed or carried over from `current_duration`.
    pub duration: Option<f64>,
}

/// Parse one line of FFmpeg stderr or `-progress pipe:1` output.
///
/// `out_time_ms` is in microseconds despite its name (same as `out_time_us`).
/// `progress=end` is reported as 1.0.
pub fn parse_ffmpeg_progress(line: &str, current_duration: Option<f64>) -> ProgressUpdate {
    if let Some(caps) = DURATION_RE.captures(line) {
        let hours: f64 = caps[1].parse().unwrap_or(0.0);
        let minutes: f64 = caps[2].parse().unwrap_or(0.0);
        let seconds: f64 = caps[3].parse().unwrap_or(0.0);
        return ProgressUpdate {
            progress: None,
            duration: Some(hours * 3600.0 + minutes * 60.0 + seconds),
        };
    }

    if line.trim() == "progress=end" {
        return ProgressUpdate {
            progress: Some(1.0),
            duration: current_duration,
        };
    }

    if let Some(caps) = OUT_TIME_RE.captures(line.trim())
        && let Some(dur) = current_duration.filter(|&d| d > 0.0)
    {
        let micros: i64 = caps[1].parse().unwrap_or(0);
        let elapsed = micros as f64 / 1_000_000.0;
        return ProgressUpdate {
            progress: Some((elapsed / dur).clamp(0.0, 1.0)),
            duration: Some(dur),
        };
    }

    ProgressUpdate {
        progress: None,
        duration: current_duration,
    }
}
