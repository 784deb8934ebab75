//! # GPU Transcode Pipeline
//!
//! A three-stage, GPU-accelerated video transcoding pipeline: a decoder
//! stage reads raw frames from a source file, a GPU preprocessor resizes
//! and converts them to planar YUV 4:2:0, and an encoder stage writes the
//! result to an H.264 file via `ffmpeg`. Each stage runs on its own OS
//! thread, connected by bounded queues that apply backpressure rather than
//! growing without bound.
//!
//! ## Architecture
//!
//! ```text
//! FrameSource --[Q1: BoundedQueue<Frame>]--> GpuPreprocessor --[Q2: BoundedQueue<YuvPayload>]--> FrameEncoder
//! ```
//!
//! The GPU-facing resize and color-space conversion live in the sibling
//! `gpu-preprocess` crate, which knows nothing about this crate's own frame
//! types or about `ffmpeg` subprocesses — it operates on raw byte buffers
//! and geometry, so it is independently testable against an OpenCL device.
//!
//! ## Cancellation
//!
//! [`pipeline::PipelineEngine::cancel_handle`] returns a [`pipeline::CancelHandle`]
//! that closes the first queue from outside the running threads. Each
//! downstream stage treats a closed, empty queue the same as a clean end of
//! stream; after the threads join, a canceled job surfaces as
//! [`error::PipelineErrorKind::Canceled`] rather than `Ok(())`.

pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod source;
pub mod types;

pub use config::JobParams;
pub use error::{PipelineError, PipelineErrorKind};
pub use pipeline::{CancelHandle, PipelineEngine};
pub use progress::ProgressSample;
