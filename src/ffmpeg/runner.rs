//! FFmpeg process spawning and progress parsing.
//!
//! Spawns FFmpeg as a child process, parses progress from stdout (pipe:1)
//! and keeps a bounded tail of stderr for error reporting. Each stream is
//! drained on its own thread while the caller blocks until completion.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

#[cfg(windows)]
use std::os::windows::process::CommandExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::discovery::get_ffmpeg_path;
use super::error::stderr_tail;
use super::progress::parse_ffmpeg_progress;
use crate::error::AppError;

/// Receives normalized encode progress in [0, 1].
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// AtomicU64 cannot hold Option<f64>, so duration is stored as f64 bits
/// and u64::MAX means "not yet known".
const NONE_DURATION_BITS: u64 = u64::MAX;

/// Minimum interval between progress callbacks.
const PROGRESS_EMIT_INTERVAL: Duration = Duration::from_millis(150);
/// Keep only the last N bytes of stderr to avoid unbounded memory growth.
const MAX_STDERR_BYTES: usize = 64 * 1024;

struct ReadStreamConfig {
    collect_stderr: Option<Arc<Mutex<Vec<u8>>>>,
    duration: Arc<AtomicU64>,
    progress_callback: Option<ProgressCallback>,
}

fn load_duration(bits: &AtomicU64) -> Option<f64> {
    match bits.load(Ordering::Relaxed) {
        NONE_DURATION_BITS => None,
        b => Some(f64::from_bits(b)),
    }
}

fn read_stream<R: Read + Send + 'static>(
    reader: R,
    config: ReadStreamConfig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut last_emit = Instant::now();
        let mut last_progress = 0.0_f64;
        let mut stream_reader = BufReader::new(reader);
        let mut line_buf = Vec::with_capacity(256);
        while stream_reader.read_until(b'\n', &mut line_buf).unwrap_or(0) > 0 {
            {
                let text = String::from_utf8_lossy(&line_buf);
                let line = text.trim_end_matches(['\n', '\r']);
                if let Some(ref buf) = config.collect_stderr {
                    let mut guard = buf.lock();
                    guard.extend_from_slice(line.as_bytes());
                    guard.push(b'\n');
                    if guard.len() > MAX_STDERR_BYTES {
                        let excess = guard.len() - MAX_STDERR_BYTES;
                        guard.drain(..excess);
                    }
                }
                let update = parse_ffmpeg_progress(line, load_duration(&config.duration));
                if let Some(d) = update.duration {
                    config.duration.store(d.to_bits(), Ordering::Relaxed);
                }
                if let (Some(p), Some(cb)) = (update.progress, config.progress_callback.as_ref()) {
                    let now = Instant::now();
                    let should_emit = now.duration_since(last_emit) >= PROGRESS_EMIT_INTERVAL
                        || (p - last_progress).abs() >= 0.01
                        || p >= 1.0;
                    if should_emit {
                        last_emit = now;
                        last_progress = p;
                        cb(p);
                    }
                }
            }
            line_buf.clear();
        }
    })
}

/// Run FFmpeg and block until completion.
///
/// - `duration_secs`: if provided, progress can be computed from `out_time_ms`
///   immediately instead of waiting for the `Duration:` line on stderr.
/// - `progress_callback`: receives throttled progress values in [0, 1].
///
/// A non-zero exit returns `AppError::FfmpegFailed` with the captured stderr.
pub fn run_ffmpeg_blocking(
    args: Vec<String>,
    duration_secs: Option<f64>,
    progress_callback: Option<ProgressCallback>,
) -> Result<(), AppError> {
    let ffmpeg_path = get_ffmpeg_path()?;
    run_program_blocking(ffmpeg_path, &args, duration_secs, progress_callback)
}

pub(crate) fn run_program_blocking(
    program: &Path,
    args: &[String],
    duration_secs: Option<f64>,
    progress_callback: Option<ProgressCallback>,
) -> Result<(), AppError> {
    let input_arg = args
        .iter()
        .position(|a| a == "-i")
        .and_then(|i| args.get(i + 1));
    log::debug!(
        target: "vid_target::ffmpeg::runner",
        "Spawning FFmpeg: path={}, input={:?}, output={:?}",
        program.display(),
        input_arg,
        args.last()
    );

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    let mut child = cmd
        .spawn()
        .map_err(|e| AppError::from(format!("Failed to spawn FFmpeg: {}", e)))?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(AppError::from("Failed to capture FFmpeg output"));
    };

    let duration = Arc::new(AtomicU64::new(
        duration_secs
            .filter(|&d| d > 0.0)
            .map(f64::to_bits)
            .unwrap_or(NONE_DURATION_BITS),
    ));
    let stderr_buffer = Arc::new(Mutex::new(Vec::new()));

    let stdout_handle = read_stream(
        stdout,
        ReadStreamConfig {
            collect_stderr: None,
            duration: Arc::clone(&duration),
            progress_callback,
        },
    );
    let stderr_handle = read_stream(
        stderr,
        ReadStreamConfig {
            collect_stderr: Some(Arc::clone(&stderr_buffer)),
            duration: Arc::clone(&duration),
            progress_callback: None,
        },
    );

    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let status = child.wait()?;
    let stderr_str = String::from_utf8_lossy(&stderr_buffer.lock()).to_string();

    if status.success() {
        log::info!(
            target: "vid_target::ffmpeg::runner",
            "FFmpeg completed successfully"
        );
        return Ok(());
    }

    // No exit code means the process was killed by a signal.
    let code = status.code().unwrap_or(255);
    log::error!(
        target: "vid_target::ffmpeg::runner",
        "FFmpeg failed (code={}): {}",
        code,
        stderr_tail(&stderr_str, 3)
    );
    Err(AppError::FfmpegFailed {
        code,
        stderr: stderr_str,
    })
}
