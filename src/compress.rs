//! Size-targeted compression: measure, probe, compute bitrate, encode, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bitrate::target_video_bitrate_kbps;
use crate::config::CompressOptions;
use crate::error::AppError;
use crate::ffmpeg::{MediaTools, ProgressCallback, build_compress_command, path_to_string};
use crate::size::{bytes_to_mb, file_size, is_within_target};

/// Step notifications for a compress run, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressEvent {
    InputMeasured { size_bytes: u64 },
    AlreadyWithinTarget { target_size_mb: f64 },
    DurationProbed { duration_secs: f64 },
    BitrateComputed { video_bitrate_kbps: u32 },
    EncodeStarted,
    /// Encoder progress in [0, 1]. Delivered from the runner's reader thread.
    EncodeProgress(f64),
    Finished(CompressReport),
}

pub type CompressEventSink = Arc<dyn Fn(CompressEvent) + Send + Sync>;

/// Input already fits; nothing was encoded.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipReport {
    pub input_path: PathBuf,
    pub input_size: u64,
    pub target_size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub input_size: u64,
    pub output_size: u64,
    pub target_size_mb: f64,
    pub duration_secs: f64,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    /// `input_size / output_size`; None when the output is empty.
    pub ratio: Option<f64>,
}

impl CompressReport {
    pub fn output_size_mb(&self) -> f64 {
        bytes_to_mb(self.output_size)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CompressOutcome {
    AlreadyWithinTarget(SkipReport),
    Compressed(CompressReport),
}

/// Everything needed to run the encode, computed without running it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    pub input_size: u64,
    pub duration_secs: f64,
    pub video_bitrate_kbps: u32,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompressPlan {
    WithinTarget(SkipReport),
    Encode(EncodePlan),
}

fn emit(events: Option<&CompressEventSink>, event: CompressEvent) {
    if let Some(sink) = events {
        sink(event);
    }
}

fn is_same_file(input: &Path, output: &Path) -> bool {
    match (std::fs::canonicalize(input), std::fs::canonicalize(output)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn prepare(
    input: &Path,
    output: &Path,
    options: &CompressOptions,
    tools: &dyn MediaTools,
    events: Option<&CompressEventSink>,
) -> Result<CompressPlan, AppError> {
    options.validate()?;
    let target_mb = options.effective_target_size_mb();

    let input_size = file_size(input)?;
    emit(events, CompressEvent::InputMeasured { size_bytes: input_size });

    if is_within_target(input_size, target_mb) {
        log::info!(
            target: "vid_target::compress",
            "Input {:.2} MB already within {} MB target, skipping encode",
            bytes_to_mb(input_size),
            target_mb
        );
        emit(
            events,
            CompressEvent::AlreadyWithinTarget {
                target_size_mb: target_mb,
            },
        );
        return Ok(CompressPlan::WithinTarget(SkipReport {
            input_path: input.to_path_buf(),
            input_size,
            target_size_mb: target_mb,
        }));
    }

    if is_same_file(input, output) {
        return Err(AppError::SameInputOutput(output.to_path_buf()));
    }

    let duration_secs = tools.probe_duration(input)?;
    emit(events, CompressEvent::DurationProbed { duration_secs });

    let video_bitrate_kbps =
        target_video_bitrate_kbps(target_mb, duration_secs, options.effective_audio_bitrate_kbps())?;
    emit(events, CompressEvent::BitrateComputed { video_bitrate_kbps });

    let args = build_compress_command(
        &path_to_string(input),
        &path_to_string(output),
        options,
        video_bitrate_kbps,
    );
    Ok(CompressPlan::Encode(EncodePlan {
        input_size,
        duration_secs,
        video_bitrate_kbps,
        args,
    }))
}

/// Measure, probe and compute the encode without running it.
pub fn plan_compression(
    input: &Path,
    output: &Path,
    options: &CompressOptions,
    tools: &dyn MediaTools,
) -> Result<CompressPlan, AppError> {
    prepare(input, output, options, tools, None)
}

/// Re-encode `input` into `output` so it lands near the target size.
///
/// Returns early without touching either tool when the input is missing or
/// already within the target. Any failure aborts the run; nothing is retried.
pub fn compress_video(
    input: &Path,
    output: &Path,
    options: &CompressOptions,
    tools: &dyn MediaTools,
    events: Option<CompressEventSink>,
) -> Result<CompressOutcome, AppError> {
    let plan = match prepare(input, output, options, tools, events.as_ref())? {
        CompressPlan::WithinTarget(skip) => return Ok(CompressOutcome::AlreadyWithinTarget(skip)),
        CompressPlan::Encode(plan) => plan,
    };

    log::info!(
        target: "vid_target::compress",
        "Encoding {} -> {} at {} kbps ({:.2}s)",
        input.display(),
        output.display(),
        plan.video_bitrate_kbps,
        plan.duration_secs
    );
    emit(events.as_ref(), CompressEvent::EncodeStarted);

    let progress: Option<ProgressCallback> = events.clone().map(|sink| {
        Arc::new(move |p: f64| sink(CompressEvent::EncodeProgress(p))) as ProgressCallback
    });
    tools.encode(plan.args, Some(plan.duration_secs), progress)?;

    let output_size = std::fs::metadata(output)?.len();
    let ratio = (output_size > 0).then(|| plan.input_size as f64 / output_size as f64);
    let report = CompressReport {
        input_path: input.to_path_buf(),
        output_path: output.to_path_buf(),
        input_size: plan.input_size,
        output_size,
        target_size_mb: options.effective_target_size_mb(),
        duration_secs: plan.duration_secs,
        video_bitrate_kbps: plan.video_bitrate_kbps,
        audio_bitrate_kbps: options.effective_audio_bitrate_kbps(),
        ratio,
    };
    if report.output_size_mb() > report.target_size_mb {
        log::warn!(
            target: "vid_target::compress",
            "Output {:.2} MB exceeds {} MB target",
            report.output_size_mb(),
            report.target_size_mb
        );
    }
    emit(events.as_ref(), CompressEvent::Finished(report.clone()));
    Ok(CompressOutcome::Compressed(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::cell::{Cell, RefCell};

    const MIB: usize = 1024 * 1024;

    struct FakeTools {
        duration: Result<f64, String>,
        encode_failure: Option<(i32, String)>,
        output_bytes: usize,
        probe_calls: Cell<u32>,
        encode_calls: RefCell<Vec<Vec<String>>>,
    }

    impl FakeTools {
        fn new(duration: f64, output_bytes: usize) -> Self {
            Self {
                duration: Ok(duration),
                encode_failure: None,
                output_bytes,
                probe_calls: Cell::new(0),
                encode_calls: RefCell::new(Vec::new()),
            }
        }

        fn encode_count(&self) -> usize {
            self.encode_calls.borrow().len()
        }
    }

    impl MediaTools for FakeTools {
        fn probe_duration(&self, _input: &Path) -> Result<f64, AppError> {
            self.probe_calls.set(self.probe_calls.get() + 1);
            self.duration.clone().map_err(AppError::ProbeFailed)
        }

        fn encode(
            &self,
            args: Vec<String>,
            _duration_secs: Option<f64>,
            progress: Option<ProgressCallback>,
        ) -> Result<(), AppError> {
            self.encode_calls.borrow_mut().push(args.clone());
            if let Some((code, stderr)) = &self.encode_failure {
                return Err(AppError::ffmpeg_failed(*code, stderr.clone()));
            }
            if let Some(cb) = progress {
                cb(0.5);
                cb(1.0);
            }
            let output = args.last().expect("output path arg");
            std::fs::write(output, vec![0u8; self.output_bytes])?;
            Ok(())
        }
    }

    struct Workspace {
        _dir: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    fn workspace(input_bytes: usize) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        let output = dir.path().join("output.mp4");
        std::fs::write(&input, vec![1u8; input_bytes]).unwrap();
        Workspace {
            _dir: dir,
            input,
            output,
        }
    }

    fn target(mb: f64) -> CompressOptions {
        CompressOptions {
            target_size_mb: Some(mb),
            ..Default::default()
        }
    }

    fn recording_sink() -> (CompressEventSink, Arc<Mutex<Vec<CompressEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: CompressEventSink = Arc::new(move |e: CompressEvent| sink_seen.lock().push(e));
        (sink, seen)
    }

    #[test]
    fn input_within_target_skips_both_tools() {
        let ws = workspace(MIB);
        let tools = FakeTools::new(10.0, 0);
        let (sink, seen) = recording_sink();

        let outcome = compress_video(&ws.input, &ws.output, &target(2.0), &tools, Some(sink)).unwrap();

        assert!(matches!(
            outcome,
            CompressOutcome::AlreadyWithinTarget(SkipReport { input_size, .. }) if input_size == MIB as u64
        ));
        assert_eq!(tools.probe_calls.get(), 0);
        assert_eq!(tools.encode_count(), 0);
        assert!(!ws.output.exists());
        assert_eq!(
            *seen.lock(),
            vec![
                CompressEvent::InputMeasured {
                    size_bytes: MIB as u64
                },
                CompressEvent::AlreadyWithinTarget {
                    target_size_mb: 2.0
                },
            ]
        );
    }

    #[test]
    fn bitrate_from_formula_is_passed_to_encoder() {
        let ws = workspace(2 * MIB);
        let tools = FakeTools::new(2.0, MIB / 2);

        let outcome = compress_video(&ws.input, &ws.output, &target(1.0), &tools, None).unwrap();

        // floor(1.0 * 8192 / 2.0 - 128) = 3968
        let calls = tools.encode_calls.borrow();
        assert_eq!(calls.len(), 1);
        let args = &calls[0];
        let bv = args.iter().position(|a| a == "-b:v").unwrap();
        assert_eq!(args[bv + 1], "3968k");
        assert_eq!(args.last().unwrap(), &path_to_string(&ws.output));
        match outcome {
            CompressOutcome::Compressed(report) => {
                assert_eq!(report.video_bitrate_kbps, 3968);
                assert_eq!(report.duration_secs, 2.0);
                assert_eq!(report.output_size, (MIB / 2) as u64);
                assert_eq!(report.ratio, Some(4.0));
            }
            other => panic!("expected Compressed, got {other:?}"),
        }
    }

    #[test]
    fn missing_input_invokes_no_tools() {
        let ws = workspace(0);
        let missing = ws.input.with_file_name("missing.mp4");
        let tools = FakeTools::new(10.0, 0);

        let err = compress_video(&missing, &ws.output, &target(1.0), &tools, None).unwrap_err();

        assert!(matches!(err, AppError::InputNotFound(ref p) if *p == missing));
        assert_eq!(tools.probe_calls.get(), 0);
        assert_eq!(tools.encode_count(), 0);
    }

    #[test]
    fn failing_encode_surfaces_diagnostics() {
        let ws = workspace(2 * MIB);
        let mut tools = FakeTools::new(2.0, 0);
        tools.encode_failure = Some((1, "Unknown encoder 'libx264'".to_string()));
        let (sink, seen) = recording_sink();

        let err = compress_video(&ws.input, &ws.output, &target(1.0), &tools, Some(sink)).unwrap_err();

        match err {
            AppError::FfmpegFailed { code, stderr } => {
                assert_eq!(code, 1);
                assert!(stderr.contains("Unknown encoder"));
            }
            other => panic!("expected FfmpegFailed, got {other:?}"),
        }
        assert!(
            !seen
                .lock()
                .iter()
                .any(|e| matches!(e, CompressEvent::Finished(_)))
        );
    }

    #[test]
    fn probe_failure_skips_encode() {
        let ws = workspace(2 * MIB);
        let mut tools = FakeTools::new(0.0, 0);
        tools.duration = Err("ffprobe failed (code 1): Invalid data".into());

        let err = compress_video(&ws.input, &ws.output, &target(1.0), &tools, None).unwrap_err();

        assert!(matches!(err, AppError::ProbeFailed(_)));
        assert_eq!(tools.probe_calls.get(), 1);
        assert_eq!(tools.encode_count(), 0);
    }

    #[test]
    fn target_too_small_for_duration_skips_encode() {
        let ws = workspace(2 * MIB);
        let tools = FakeTools::new(600.0, 0);

        let err = compress_video(&ws.input, &ws.output, &target(1.0), &tools, None).unwrap_err();

        assert!(matches!(err, AppError::BitrateTooLow { .. }));
        assert_eq!(tools.encode_count(), 0);
    }

    #[test]
    fn output_same_as_input_is_rejected() {
        let ws = workspace(2 * MIB);
        let tools = FakeTools::new(2.0, 0);

        let err = compress_video(&ws.input, &ws.input, &target(1.0), &tools, None).unwrap_err();

        assert!(matches!(err, AppError::SameInputOutput(_)));
        assert_eq!(tools.probe_calls.get(), 0);
        assert_eq!(tools.encode_count(), 0);
    }

    #[test]
    fn invalid_target_is_rejected_before_measuring() {
        let ws = workspace(0);
        let missing = ws.input.with_file_name("missing.mp4");
        let tools = FakeTools::new(2.0, 0);

        let err = compress_video(&missing, &ws.output, &target(-1.0), &tools, None).unwrap_err();

        assert!(matches!(err, AppError::InvalidTarget(_)));
    }

    #[test]
    fn empty_output_has_no_ratio() {
        let ws = workspace(2 * MIB);
        let tools = FakeTools::new(2.0, 0);

        let outcome = compress_video(&ws.input, &ws.output, &target(1.0), &tools, None).unwrap();

        match outcome {
            CompressOutcome::Compressed(report) => assert_eq!(report.ratio, None),
            other => panic!("expected Compressed, got {other:?}"),
        }
    }

    #[test]
    fn events_follow_pipeline_order() {
        let ws = workspace(2 * MIB);
        let tools = FakeTools::new(2.0, MIB);
        let (sink, seen) = recording_sink();

        compress_video(&ws.input, &ws.output, &target(1.0), &tools, Some(sink)).unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0], CompressEvent::InputMeasured { size_bytes: 2 * MIB as u64 });
        assert_eq!(seen[1], CompressEvent::DurationProbed { duration_secs: 2.0 });
        assert_eq!(seen[2], CompressEvent::BitrateComputed { video_bitrate_kbps: 3968 });
        assert_eq!(seen[3], CompressEvent::EncodeStarted);
        assert_eq!(seen[4], CompressEvent::EncodeProgress(0.5));
        assert_eq!(seen[5], CompressEvent::EncodeProgress(1.0));
        assert!(matches!(&seen[6], CompressEvent::Finished(r) if r.ratio == Some(2.0)));
    }

    #[test]
    fn plan_does_not_encode() {
        let ws = workspace(2 * MIB);
        let tools = FakeTools::new(2.0, 0);

        let plan = plan_compression(&ws.input, &ws.output, &target(1.0), &tools).unwrap();

        match plan {
            CompressPlan::Encode(plan) => {
                assert_eq!(plan.video_bitrate_kbps, 3968);
                assert!(plan.args.contains(&"3968k".to_string()));
            }
            other => panic!("expected Encode plan, got {other:?}"),
        }
        assert_eq!(tools.encode_count(), 0);
        assert!(!ws.output.exists());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = CompressOutcome::AlreadyWithinTarget(SkipReport {
            input_path: PathBuf::from("in.mp4"),
            input_size: 10,
            target_size_mb: 14.5,
        });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "alreadyWithinTarget");
        assert_eq!(value["inputSize"], 10);
        assert_eq!(value["targetSizeMb"], 14.5);
    }
}
