//! Error taxonomy for the transcoding pipeline.
//!
//! A single tagged [`PipelineError`] carries a [`PipelineErrorKind`], a
//! human-readable message, the stage that raised it, and an optional boxed
//! source — in the style of this workspace's `CaptureError`, trimmed to the
//! ten kinds this pipeline actually raises. Stage workers convert native
//! faults into this type and report them through a single-writer result
//! cell rather than letting them escape a thread.

use std::error::Error as StdError;
use std::fmt;

/// The ten terminal error kinds a job can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidArgs,
    SourceUnavailable,
    SourceDecode,
    GpuInit,
    GpuRuntime,
    InvalidGeometry,
    EncoderInit,
    EncoderIo,
    Canceled,
    Internal,
}

impl PipelineErrorKind {
    /// CLI exit code for this kind, per the 0-4 scheme; kinds with no
    /// dedicated code in that scheme (`Canceled`, `Internal`) fall back to
    /// the generic non-success code 1. See `DESIGN.md` for this resolution.
    pub fn exit_code(self) -> i32 {
        match self {
            PipelineErrorKind::InvalidArgs => 1,
            PipelineErrorKind::SourceUnavailable | PipelineErrorKind::SourceDecode => 2,
            PipelineErrorKind::GpuInit
            | PipelineErrorKind::GpuRuntime
            | PipelineErrorKind::InvalidGeometry => 3,
            PipelineErrorKind::EncoderInit | PipelineErrorKind::EncoderIo => 4,
            PipelineErrorKind::Canceled | PipelineErrorKind::Internal => 1,
        }
    }
}

impl fmt::Display for PipelineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineErrorKind::InvalidArgs => "invalid arguments",
            PipelineErrorKind::SourceUnavailable => "source unavailable",
            PipelineErrorKind::SourceDecode => "source decode error",
            PipelineErrorKind::GpuInit => "GPU initialization error",
            PipelineErrorKind::GpuRuntime => "GPU runtime error",
            PipelineErrorKind::InvalidGeometry => "invalid geometry",
            PipelineErrorKind::EncoderInit => "encoder initialization error",
            PipelineErrorKind::EncoderIo => "encoder I/O error",
            PipelineErrorKind::Canceled => "canceled",
            PipelineErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// The single terminal error type for a job: exactly one of these is ever
/// returned as the job result.
#[derive(Debug)]
pub struct PipelineError {
    pub kind: PipelineErrorKind,
    pub message: String,
    pub stage: Option<&'static str>,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl PipelineError {
    pub fn new(kind: PipelineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stage: None,
            source: None,
        }
    }

    pub fn with_stage(mut self, stage: &'static str) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::InvalidArgs, message)
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::SourceUnavailable, message).with_stage("reader")
    }

    pub fn source_decode(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::SourceDecode, message).with_stage("reader")
    }

    pub fn gpu_init(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::GpuInit, message).with_stage("preprocessor")
    }

    pub fn gpu_runtime(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::GpuRuntime, message).with_stage("preprocessor")
    }

    pub fn invalid_geometry(width: u32, height: u32) -> Self {
        Self::new(
            PipelineErrorKind::InvalidGeometry,
            format!("target geometry {width}x{height} must be even and positive"),
        )
        .with_stage("preprocessor")
    }

    pub fn encoder_init(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::EncoderInit, message).with_stage("encoder")
    }

    pub fn encoder_io(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::EncoderIo, message).with_stage("encoder")
    }

    pub fn canceled() -> Self {
        Self::new(PipelineErrorKind::Canceled, "job was canceled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Internal, message)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{} ({stage}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::internal(e.to_string()).with_source(e)
    }
}

impl From<gpu_preprocess::GpuError> for PipelineError {
    fn from(e: gpu_preprocess::GpuError) -> Self {
        match e {
            gpu_preprocess::GpuError::Init(msg) => PipelineError::gpu_init(msg),
            gpu_preprocess::GpuError::Runtime(msg) => PipelineError::gpu_runtime(msg),
            gpu_preprocess::GpuError::InvalidGeometry { width, height } => {
                PipelineError::invalid_geometry(width, height)
            }
        }
    }
}
