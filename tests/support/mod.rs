#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

pub const MIB: usize = 1024 * 1024;

/// Scratch directory with fake `ffprobe`/`ffmpeg` shell scripts.
///
/// The fake ffmpeg logs its arguments (one per line) to `ffmpeg-args.log`
/// so tests can assert what was, or was not, invoked.
pub struct FakeToolchain {
    dir: TempDir,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FakeToolchain {
    pub fn new(ffprobe_body: &str, ffmpeg_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ffprobe = dir.path().join("ffprobe");
        let ffmpeg = dir.path().join("ffmpeg");
        let probe_log = dir.path().join("ffprobe-args.log");
        let args_log = dir.path().join("ffmpeg-args.log");
        write_script(
            &ffprobe,
            &format!(
                "printf '%s\\n' \"$@\" > '{}'\n{}",
                probe_log.display(),
                ffprobe_body
            ),
        );
        write_script(
            &ffmpeg,
            &format!(
                "case \" $* \" in *\" -f null \"*) exit 0;; esac\nprintf '%s\\n' \"$@\" > '{}'\n{}",
                args_log.display(),
                ffmpeg_body
            ),
        );
        Self {
            dir,
            ffmpeg,
            ffprobe,
        }
    }

    /// ffprobe reports `duration`; ffmpeg writes `output_bytes` zero bytes to its last arg.
    pub fn succeeding(duration: &str, output_bytes: usize) -> Self {
        Self::new(
            &format!("echo {duration}"),
            &format!("for last in \"$@\"; do :; done\nhead -c {output_bytes} /dev/zero > \"$last\""),
        )
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_input(&self, name: &str, bytes: usize) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, vec![7u8; bytes]).expect("write input");
        path
    }

    pub fn ffmpeg_args(&self) -> Option<Vec<String>> {
        read_lines(&self.path("ffmpeg-args.log"))
    }

    pub fn ffprobe_args(&self) -> Option<Vec<String>> {
        read_lines(&self.path("ffprobe-args.log"))
    }

    pub fn run(&self, args: &[&str]) -> RunOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_vid-target"))
            .args(args)
            .env("FFMPEG_PATH", &self.ffmpeg)
            .env("FFPROBE_PATH", &self.ffprobe)
            .env_remove("RUST_LOG")
            .output()
            .expect("run vid-target");
        RunOutput::from(output)
    }
}

pub struct RunOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for RunOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl RunOutput {
    pub fn assert_code(&self, expected: i32) -> &Self {
        assert_eq!(
            self.code,
            Some(expected),
            "unexpected exit code\nstdout:\n{}\nstderr:\n{}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, needle: &str) -> &Self {
        assert!(
            self.stdout.contains(needle),
            "stdout missing {:?}\nstdout:\n{}\nstderr:\n{}",
            needle,
            self.stdout,
            self.stderr
        );
        self
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
}

fn read_lines(path: &Path) -> Option<Vec<String>> {
    let text = fs::read_to_string(path).ok()?;
    Some(text.lines().map(String::from).collect())
}
