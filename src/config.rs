//! Job configuration and CLI-facing validation.
//!
//! `JobParams` is the internal, already-validated configuration a
//! [`crate::pipeline::PipelineEngine`] is built from. `main.rs` owns turning
//! `clap` arguments into a `JobParams` and reporting `validate()` failures
//! as `PipelineError::invalid_args`.

use crate::error::PipelineError;

/// x264 preset names, fastest (lowest quality per bit) to slowest (highest),
/// in the exact order x264 itself defines them.
pub const PRESET_NAMES: [&str; 10] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Validated parameters for a single transcode job.
#[derive(Debug, Clone)]
pub struct JobParams {
    pub input_path: String,
    pub output_path: String,
    /// x264 Constant Rate Factor, 0-51 (lower is higher quality).
    pub crf: u8,
    /// Index into [`PRESET_NAMES`].
    pub preset_index: usize,
    /// Capacity of each of the two inter-stage queues.
    pub queue_capacity: usize,
}

impl JobParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.input_path.is_empty() {
            return Err(PipelineError::invalid_args("input path must not be empty"));
        }
        if self.output_path.is_empty() {
            return Err(PipelineError::invalid_args(
                "output path must not be empty",
            ));
        }
        if self.crf > 51 {
            return Err(PipelineError::invalid_args(format!(
                "crf must be between 0 and 51, got {}",
                self.crf
            )));
        }
        if self.preset_index >= PRESET_NAMES.len() {
            return Err(PipelineError::invalid_args(format!(
                "preset index must be between 0 and {}, got {}",
                PRESET_NAMES.len() - 1,
                self.preset_index
            )));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::invalid_args(
                "queue capacity must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn preset_name(&self) -> &'static str {
        PRESET_NAMES[self.preset_index]
    }
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            output_path: String::new(),
            crf: 23,
            preset_index: preset_index_of("veryfast").expect("veryfast is always present"),
            queue_capacity: 4,
        }
    }
}

/// Resolves a preset name (case-insensitive) to its index in [`PRESET_NAMES`].
pub fn preset_index_of(name: &str) -> Option<usize> {
    PRESET_NAMES
        .iter()
        .position(|p| p.eq_ignore_ascii_case(name))
}

/// Output geometry for a source frame of `src_w`x`src_h`: each dimension
/// halved, then rounded down to even. `641x481` yields `320x240`.
pub fn output_geometry(src_w: u32, src_h: u32) -> (u32, u32) {
    let half_w = (src_w / 2) & !1;
    let half_h = (src_h / 2) & !1;
    (half_w, half_h)
}
