mod builder;
pub mod discovery;
mod error;
pub mod ffprobe;
mod progress;
mod runner;
mod verify;

use std::path::Path;

pub use builder::{build_compress_command, format_args_for_display_multiline};
pub use error::{FfmpegErrorPayload, parse_ffmpeg_error, stderr_tail};
pub use progress::{ProgressUpdate, parse_ffmpeg_progress};
pub use runner::{ProgressCallback, run_ffmpeg_blocking};
pub use verify::verify_output;

use crate::error::AppError;

/// The two external tools a compress run depends on.
///
/// `SystemTools` shells out to ffprobe/ffmpeg; tests substitute fakes.
pub trait MediaTools {
    /// Container duration of `input` in seconds.
    fn probe_duration(&self, input: &Path) -> Result<f64, AppError>;

    /// Run an encode with the given FFmpeg arguments and block until it finishes.
    fn encode(
        &self,
        args: Vec<String>,
        duration_secs: Option<f64>,
        progress: Option<ProgressCallback>,
    ) -> Result<(), AppError>;
}

/// ffprobe/ffmpeg resolved via [`discovery`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTools;

impl MediaTools for SystemTools {
    fn probe_duration(&self, input: &Path) -> Result<f64, AppError> {
        ffprobe::probe_duration(input)
    }

    fn encode(
        &self,
        args: Vec<String>,
        duration_secs: Option<f64>,
        progress: Option<ProgressCallback>,
    ) -> Result<(), AppError> {
        run_ffmpeg_blocking(args, duration_secs, progress)
    }
}

/// Path to string for FFmpeg args or logging.
pub fn path_to_string(path: &(impl AsRef<Path> + ?Sized)) -> String {
    path.as_ref().to_string_lossy().to_string()
}
