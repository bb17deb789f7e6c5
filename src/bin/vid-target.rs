use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use vid_target_core::ffmpeg::{
    SystemTools, format_args_for_display_multiline, parse_ffmpeg_error, verify_output,
};
use vid_target_core::size::{bytes_to_mb, format_target_mb};
use vid_target_core::{
    AppError, CompressEvent, CompressEventSink, CompressOptions, CompressOutcome, CompressPlan,
    compress_video, plan_compression,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vid-target input.mp4 output.mp4\n  vid-target input.mp4 output.mp4 8 --preset slow\n  vid-target input.mov output.mp4 25 --dry-run\n\nEnvironment:\n  FFMPEG_PATH, FFPROBE_PATH  override tool discovery\n  RUST_LOG                   log filter (logs go to stderr)";

#[derive(Debug, Parser)]
#[command(
    name = "vid-target",
    version,
    about = "Re-encode a video so it lands close to a target file size",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Video to compress.
    input_file: PathBuf,

    /// Where to write the re-encoded video (overwritten if it exists).
    output_file: PathBuf,

    /// Target size in megabytes (1 MB = 1024 * 1024 bytes). Default 14.5.
    target_size_mb: Option<f64>,

    /// Audio bitrate in kbps, reserved out of the size budget. Default 128.
    #[arg(long, value_name = "KBPS")]
    audio_bitrate: Option<u32>,

    /// Video encoder. Default libx264.
    #[arg(long, value_name = "ENCODER")]
    codec: Option<String>,

    /// Audio encoder. Default aac.
    #[arg(long, value_name = "ENCODER")]
    audio_codec: Option<String>,

    /// Encoder preset. Default medium.
    #[arg(long)]
    preset: Option<String>,

    /// Do not move the moov atom to the front of the file.
    #[arg(long)]
    no_faststart: bool,

    /// JSON options file (camelCase keys); flags given on the command line win.
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Measure, probe and print the FFmpeg command without encoding.
    #[arg(long)]
    dry_run: bool,

    /// Decode the output after encoding to check it is not corrupt.
    #[arg(long)]
    verify: bool,

    /// Show encode progress on stderr.
    #[arg(long)]
    progress: bool,

    /// Print the result as one JSON object instead of report lines.
    #[arg(long)]
    json: bool,

    /// Show debug logging on stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn flag_options(&self) -> CompressOptions {
        CompressOptions {
            target_size_mb: self.target_size_mb,
            audio_bitrate_kbps: self.audio_bitrate,
            video_codec: self.codec.clone(),
            audio_codec: self.audio_codec.clone(),
            preset: self.preset.clone(),
            faststart: self.no_faststart.then_some(false),
        }
    }

    fn resolve_options(&self) -> Result<CompressOptions, AppError> {
        let base = match &self.options {
            Some(path) => CompressOptions::load_json_file(path)?,
            None => CompressOptions::default(),
        };
        Ok(base.merged_with(self.flag_options()))
    }
}

fn init_logging(verbose: bool) {
    // Library log targets are all prefixed `vid_target::`.
    let default_filter = if verbose { "warn,vid_target=debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .try_init();
}

fn report_sink(show_progress: bool) -> CompressEventSink {
    Arc::new(move |event: CompressEvent| match event {
        CompressEvent::InputMeasured { size_bytes } => {
            println!("Input file size: {:.2} MB", bytes_to_mb(size_bytes));
        }
        CompressEvent::AlreadyWithinTarget { target_size_mb } => {
            println!(
                "File is already smaller than {}MB. No compression needed.",
                format_target_mb(target_size_mb)
            );
        }
        CompressEvent::DurationProbed { duration_secs } => {
            println!("Video duration: {:.2} seconds", duration_secs);
        }
        CompressEvent::BitrateComputed { video_bitrate_kbps } => {
            println!("Target video bitrate: {} kbps", video_bitrate_kbps);
        }
        CompressEvent::EncodeStarted => {
            println!("Compressing video...");
        }
        CompressEvent::EncodeProgress(p) => {
            if show_progress {
                let mut stderr = std::io::stderr().lock();
                let _ = write!(stderr, "\rEncoding: {:>3.0}%", p * 100.0);
                let _ = stderr.flush();
            }
        }
        CompressEvent::Finished(report) => {
            if show_progress {
                eprintln!();
            }
            println!("Output file size: {:.2} MB", report.output_size_mb());
            match report.ratio {
                Some(ratio) => println!("Compression ratio: {:.2}x", ratio),
                None => println!("Compression ratio: n/a (empty output)"),
            }
            println!("Compression completed successfully!");
        }
    })
}

fn print_error(err: &AppError, json_output: bool) {
    if json_output {
        let detail = match err {
            AppError::FfmpegFailed { code, stderr } => {
                let payload = parse_ffmpeg_error(stderr, *code);
                json!({ "summary": payload.summary, "detail": payload.detail })
            }
            other => json!({ "summary": other.to_string(), "detail": other.to_string() }),
        };
        println!("{}", json!({ "status": "error", "error": detail }));
        return;
    }
    match err {
        AppError::InputNotFound(path) => {
            println!("Error: Input file '{}' not found", path.display());
        }
        AppError::ProbeFailed(reason) => {
            println!("Error getting video duration: {}", reason);
        }
        AppError::InvalidDuration(_) => {
            println!("Error getting video duration: {}", err);
        }
        AppError::FfmpegFailed { code, stderr } => {
            let payload = parse_ffmpeg_error(stderr, *code);
            println!("Error during compression: {}", payload.summary);
            println!("FFmpeg output: {}", payload.detail);
        }
        other => println!("Error: {}", other),
    }
}

fn run_dry(cli: &Cli, options: &CompressOptions) -> Result<(), AppError> {
    let plan = plan_compression(&cli.input_file, &cli.output_file, options, &SystemTools)?;
    match plan {
        CompressPlan::WithinTarget(skip) => {
            if cli.json {
                let value = serde_json::to_value(CompressOutcome::AlreadyWithinTarget(skip))
                    .map_err(std::io::Error::from)?;
                println!("{}", value);
            } else {
                println!("Input file size: {:.2} MB", bytes_to_mb(skip.input_size));
                println!(
                    "File is already smaller than {}MB. No compression needed.",
                    format_target_mb(skip.target_size_mb)
                );
            }
        }
        CompressPlan::Encode(plan) => {
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "status": "planned",
                        "inputSize": plan.input_size,
                        "durationSecs": plan.duration_secs,
                        "videoBitrateKbps": plan.video_bitrate_kbps,
                        "args": plan.args,
                    })
                );
            } else {
                println!("Input file size: {:.2} MB", bytes_to_mb(plan.input_size));
                println!("Video duration: {:.2} seconds", plan.duration_secs);
                println!("Target video bitrate: {} kbps", plan.video_bitrate_kbps);
                println!("FFmpeg command:\n{}", format_args_for_display_multiline(&plan.args));
            }
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let options = cli.resolve_options()?;
    if cli.dry_run {
        return run_dry(cli, &options);
    }

    let events = (!cli.json).then(|| report_sink(cli.progress));
    let outcome = compress_video(
        &cli.input_file,
        &cli.output_file,
        &options,
        &SystemTools,
        events,
    )?;

    if cli.verify
        && let CompressOutcome::Compressed(report) = &outcome
    {
        verify_output(&report.output_path)?;
        if !cli.json {
            println!("Output verified: decodes without errors");
        }
    }

    if cli.json {
        let value = serde_json::to_value(&outcome)
            .map_err(std::io::Error::from)?;
        println!("{}", value);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not failures; usage errors exit 1 like every other failure.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!(target: "vid_target::cli", "run failed: {:?}", err);
            print_error(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}
