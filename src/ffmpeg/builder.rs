use crate::config::CompressOptions;

/// Build the FFmpeg argument list for a bitrate-targeted re-encode.
///
/// `-progress pipe:1` makes FFmpeg write key=value progress lines to stdout,
/// which the runner parses; `-y` overwrites an existing output.
pub fn build_compress_command(
    input_path: &str,
    output_path: &str,
    options: &CompressOptions,
    video_bitrate_kbps: u32,
) -> Vec<String> {
    let video_codec = options.effective_video_codec();
    let audio_codec = options.effective_audio_codec();
    let audio_kbps = options.effective_audio_bitrate_kbps();
    let preset = options.effective_preset();

    log::debug!(
        target: "vid_target::ffmpeg::builder",
        "Building FFmpeg command: codec={}, video={}k, audio={} {}k, preset={}, input={} -> output={}",
        video_codec,
        video_bitrate_kbps,
        audio_codec,
        audio_kbps,
        preset,
        input_path,
        output_path
    );

    let mut args: Vec<String> = [
        "-nostdin",
        "-progress",
        "pipe:1",
        "-i",
        input_path,
        "-c:v",
        video_codec,
    ]
    .into_iter()
    .map(String::from)
    .collect();

    args.extend([
        "-b:v".to_string(),
        format!("{}k", video_bitrate_kbps),
        "-c:a".to_string(),
        audio_codec.to_string(),
        "-b:a".to_string(),
        format!("{}k", audio_kbps),
        "-preset".to_string(),
        preset.to_string(),
    ]);

    if options.effective_faststart() {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }

    args.push("-y".to_string());
    args.push(output_path.to_string());
    args
}

/// Formats args for readable display: option and value on the same line when the next arg is a value.
pub fn format_args_for_display_multiline(args: &[String]) -> String {
    let mut lines = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let line = match args.get(i + 1) {
            Some(value) if arg.starts_with('-') && !value.starts_with('-') => {
                i += 2;
                format!("  {} {}", arg, value)
            }
            _ => {
                i += 1;
                format!("  {}", arg)
            }
        };
        lines.push(line);
    }
    lines.join("\n")
}
