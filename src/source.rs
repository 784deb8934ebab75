//! Frame source: decodes an input video file to a stream of packed BGR24
//! frames via an `ffmpeg` subprocess, after querying its geometry with
//! `ffprobe`.
//!
//! Grounded in this workspace's `capture_scrap_ffmpeg`, which drives
//! `ffmpeg` as a child process connected via piped stdio rather than linking
//! a decoding library directly. Here the direction is reversed: frames are
//! read from the child's stdout instead of written to its stdin.

use crate::error::PipelineError;
use crate::types::Frame;
use serde::Deserialize;
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    r_frame_rate: String,
    #[serde(default)]
    nb_frames: Option<String>,
}

/// Geometry and frame-rate facts about a source video, queried up front so
/// the pipeline can size its GPU target and encoder invocation before the
/// first frame arrives.
#[derive(Debug, Clone, Copy)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Best-effort frame count from the container's metadata; `0` if the
    /// container does not report one (progress then reports `NaN`).
    pub frame_count_hint: u64,
}

fn probe(input_path: &str) -> Result<SourceInfo, PipelineError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "v:0",
            input_path,
        ])
        .output()
        .map_err(|e| {
            PipelineError::source_unavailable(format!("failed to run ffprobe: {e}"))
        })?;

    if !output.status.success() {
        return Err(PipelineError::source_unavailable(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
        PipelineError::source_unavailable(format!("failed to parse ffprobe output: {e}"))
    })?;

    let stream = parsed.streams.into_iter().next().ok_or_else(|| {
        PipelineError::source_unavailable("input has no video stream".to_string())
    })?;

    let fps = parse_frame_rate(&stream.r_frame_rate).ok_or_else(|| {
        PipelineError::source_unavailable(format!(
            "could not parse frame rate '{}'",
            stream.r_frame_rate
        ))
    })?;

    let frame_count_hint = stream
        .nb_frames
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(SourceInfo {
        width: stream.width,
        height: stream.height,
        fps,
        frame_count_hint,
    })
}

fn parse_frame_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => raw.parse().ok(),
    }
}

/// Decodes an input file to packed BGR24 frames, one `ffmpeg` subprocess per
/// source, held open for the lifetime of the job.
pub struct FrameSource {
    info: SourceInfo,
    child: Child,
    stdout: ChildStdout,
    frame_len: usize,
}

impl FrameSource {
    pub fn open(input_path: &str) -> Result<Self, PipelineError> {
        let info = probe(input_path)?;

        let mut child = Command::new("ffmpeg")
            .args([
                "-v",
                "error",
                "-i",
                input_path,
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PipelineError::source_unavailable(format!("failed to spawn ffmpeg: {e}"))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            PipelineError::source_unavailable("ffmpeg child has no stdout pipe".to_string())
        })?;

        debug!(width = info.width, height = info.height, fps = info.fps, "opened frame source");

        Ok(Self {
            info,
            child,
            stdout,
            frame_len: Frame::expected_len(info.width, info.height),
        })
    }

    pub fn info(&self) -> SourceInfo {
        self.info
    }

    /// Reads the next full frame, or `None` at end of stream. A short read
    /// partway through a frame is reported as `SourceDecode`, since it means
    /// the encoder died or produced a malformed stream mid-frame rather than
    /// stopping cleanly on a frame boundary.
    pub fn next(&mut self) -> Result<Option<Frame>, PipelineError> {
        let mut buf = vec![0u8; self.frame_len];
        let mut read_so_far = 0;

        while read_so_far < self.frame_len {
            match self.stdout.read(&mut buf[read_so_far..]) {
                Ok(0) => break,
                Ok(n) => read_so_far += n,
                Err(e) => {
                    return Err(PipelineError::source_decode(format!(
                        "error reading decoded frame data: {e}"
                    )));
                }
            }
        }

        if read_so_far == 0 {
            // A closed stdout at a frame boundary is ambiguous: it's either a
            // clean end of stream or a decoder that died early without
            // writing a partial frame. Check the child's exit status before
            // trusting it, since the former reports success and the latter
            // must surface as `SourceDecode` rather than a quiet short file.
            return match self.child.try_wait() {
                Ok(Some(status)) if !status.success() => Err(PipelineError::source_decode(
                    format!("decoder exited with {status} before producing the next frame"),
                )),
                Ok(_) => Ok(None),
                Err(e) => Err(PipelineError::source_decode(format!(
                    "failed to check decoder exit status: {e}"
                ))),
            };
        }
        if read_so_far != self.frame_len {
            return Err(PipelineError::source_decode(format!(
                "truncated frame: got {read_so_far} of {} bytes",
                self.frame_len
            )));
        }

        Ok(Some(Frame::new(self.info.width, self.info.height, buf)))
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            if e.kind() != std::io::ErrorKind::InvalidInput {
                warn!("failed to kill ffmpeg decode child: {e}");
            }
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_frame_rate() {
        assert_eq!(parse_frame_rate("30000/1001"), Some(30000.0 / 1001.0));
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("30"), Some(30.0));
        assert_eq!(parse_frame_rate("1/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }

    #[test]
    fn missing_input_yields_source_unavailable() {
        let err = FrameSource::open("/nonexistent/path/does-not-exist.mp4")
            .expect_err("opening a nonexistent file must fail");
        assert_eq!(err.kind, crate::error::PipelineErrorKind::SourceUnavailable);
    }

    /// A decoder child that dies before writing a full frame must not be
    /// mistaken for a clean end of stream just because its stdout closed at
    /// a frame boundary (zero bytes read).
    #[test]
    fn next_surfaces_source_decode_when_decoder_exits_non_zero() {
        let mut child = Command::new("sh")
            .args(["-c", "exit 1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawning a shell should always succeed in this environment");
        let stdout = child.stdout.take().expect("piped stdout must be present");

        // Give the shell a moment to actually exit before reading, so the
        // first `try_wait` inside `next` observes its exit status rather
        // than racing it.
        std::thread::sleep(std::time::Duration::from_millis(50));

        let mut source = FrameSource {
            info: SourceInfo {
                width: 2,
                height: 2,
                fps: 30.0,
                frame_count_hint: 0,
            },
            child,
            stdout,
            frame_len: Frame::expected_len(2, 2),
        };

        let err = source
            .next()
            .expect_err("a decoder that exited non-zero must surface SourceDecode");
        assert_eq!(err.kind, crate::error::PipelineErrorKind::SourceDecode);
    }
}
