//! Frame encoder: writes planar YUV 4:2:0 payloads to an `ffmpeg` subprocess
//! configured for libx264, piped the same way this workspace's
//! `capture_scrap_ffmpeg` feeds raw frames to its own encoder child.

use crate::config::JobParams;
use crate::error::PipelineError;
use crate::types::YuvPayload;
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, warn};

pub struct FrameEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    finished: bool,
}

impl FrameEncoder {
    pub fn open(params: &JobParams, width: u32, height: u32, fps: f64) -> Result<Self, PipelineError> {
        let size = format!("{width}x{height}");
        let fps_arg = format!("{fps}");
        let crf_arg = params.crf.to_string();

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "yuv420p",
                "-s",
                &size,
                "-r",
                &fps_arg,
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                params.preset_name(),
                "-crf",
                &crf_arg,
                &params.output_path,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::encoder_init(format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            PipelineError::encoder_init("ffmpeg child has no stdin pipe".to_string())
        })?;

        debug!(
            width,
            height,
            fps,
            preset = params.preset_name(),
            crf = params.crf,
            "opened frame encoder"
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            finished: false,
        })
    }

    pub fn write(&mut self, payload: &YuvPayload) -> Result<(), PipelineError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PipelineError::encoder_io("write after encoder was finished"))?;

        stdin
            .write_all(&payload.data)
            .map_err(|e| PipelineError::encoder_io(format!("writing frame to ffmpeg: {e}")))
    }

    /// Closes the encoder's stdin and waits for it to exit. Idempotent:
    /// calling this more than once is a no-op after the first call.
    pub fn finish(&mut self) -> Result<(), PipelineError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // Dropping stdin signals EOF to ffmpeg, same as `capture_scrap_ffmpeg`
        // finalizing its recording by dropping the piped stdin handle.
        self.stdin.take();

        let status = self
            .child
            .wait()
            .map_err(|e| PipelineError::encoder_io(format!("waiting for ffmpeg: {e}")))?;

        if !status.success() {
            return Err(PipelineError::encoder_io(format!(
                "ffmpeg exited with {status}"
            )));
        }
        Ok(())
    }
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("encoder cleanup on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_output_directory_yields_encoder_init_error() {
        let params = JobParams {
            input_path: "in.mp4".into(),
            output_path: "/definitely/not/a/real/dir/out.mp4".into(),
            ..JobParams::default()
        };
        // ffmpeg itself may or may not be on PATH in a given environment; in
        // either case opening against an unwritable path must not succeed.
        if let Ok(mut encoder) = FrameEncoder::open(&params, 320, 240, 30.0) {
            assert!(encoder.finish().is_err());
        }
    }
}
