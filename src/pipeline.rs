//! The three-stage pipeline: reader, GPU preprocessor, encoder, connected by
//! two bounded queues and run one OS thread per stage.
//!
//! Shaped directly after this workspace's producer/consumer threads around
//! `RingBuffer` and `BufferPool`: each stage owns its resource for the
//! thread's lifetime and communicates only through the queues, so no stage
//! needs a lock on another stage's state.

use crate::config::{output_geometry, JobParams};
use crate::encoder::FrameEncoder;
use crate::error::PipelineError;
use crate::progress::{ProgressReporter, ProgressSample};
use crate::queue::{BoundedQueue, PushOutcome};
use crate::source::FrameSource;
use crate::types::{Frame, YuvPayload};
use gpu_preprocess::GpuPreprocessor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A handle external callers use to request early termination of a running
/// job. Closing Q1 directly is enough: the reader stops being able to push,
/// the preprocessor drains what remains and then sees end of stream, and so
/// does the encoder behind it. No stage needs to poll a flag of its own.
#[derive(Clone)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
    q1: Arc<BoundedQueue<Frame>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.q1.close();
    }
}

/// Owns every stage and the queues between them for a single job.
pub struct PipelineEngine {
    source: FrameSource,
    gpu: GpuPreprocessor,
    encoder: FrameEncoder,
    q1: Arc<BoundedQueue<Frame>>,
    q2: Arc<BoundedQueue<YuvPayload>>,
    frame_count_hint: u64,
    target: (u32, u32),
    canceled: Arc<AtomicBool>,
}

impl PipelineEngine {
    pub fn new(params: &JobParams) -> Result<Self, PipelineError> {
        params.validate()?;

        let source = FrameSource::open(&params.input_path)?;
        let info = source.info();
        let target = output_geometry(info.width, info.height);
        if target.0 == 0 || target.1 == 0 {
            return Err(PipelineError::invalid_geometry(target.0, target.1));
        }

        let gpu = GpuPreprocessor::new()?;
        let encoder = FrameEncoder::open(params, target.0, target.1, info.fps)?;

        Ok(Self {
            source,
            gpu,
            encoder,
            q1: Arc::new(BoundedQueue::new(params.queue_capacity)),
            q2: Arc::new(BoundedQueue::new(params.queue_capacity)),
            frame_count_hint: info.frame_count_hint,
            target,
            canceled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            canceled: self.canceled.clone(),
            q1: self.q1.clone(),
        }
    }

    /// Runs all three stages to completion (or failure), invoking `progress`
    /// from the encoder thread after every successfully encoded frame.
    ///
    /// On success: `Ok(())`.
    /// On a stage failure: the `PipelineError` that stage raised, whichever
    /// stage it was.
    /// On cancellation with no stage failure: `Err(PipelineError::canceled())`.
    pub fn run<F>(&mut self, progress: F) -> Result<(), PipelineError>
    where
        F: ProgressReporter,
    {
        let Self {
            source,
            gpu,
            encoder,
            q1,
            q2,
            frame_count_hint,
            target,
            canceled,
        } = self;

        let (target_w, target_h) = *target;
        let frame_count_hint = *frame_count_hint;
        let processed = AtomicU64::new(0);
        let start = Instant::now();

        // Stage objects (`source`, `gpu`, `encoder`) are borrowed uniquely by
        // exactly one thread each. The queues are shared by two neighboring
        // stages plus `CancelHandle`, so each thread gets its own clone of
        // the `Arc` rather than a borrow of the field.
        let q1_reader = q1.clone();
        let q2_reader = q2.clone();
        let q1_preprocessor = q1.clone();
        let q2_preprocessor = q2.clone();
        let q2_encoder = q2.clone();

        let reader_result = std::sync::Mutex::new(None::<PipelineError>);
        let preprocessor_result = std::sync::Mutex::new(None::<PipelineError>);
        let encoder_result = std::sync::Mutex::new(None::<PipelineError>);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let outcome = run_reader(source, &q1_reader, &q2_reader);
                if let Some(err) = outcome {
                    *reader_result.lock().unwrap() = Some(err);
                }
            });

            scope.spawn(|| {
                let outcome =
                    run_preprocessor(gpu, &q1_preprocessor, &q2_preprocessor, target_w, target_h);
                if let Some(err) = outcome {
                    *preprocessor_result.lock().unwrap() = Some(err);
                }
            });

            scope.spawn(|| {
                let outcome = run_encoder(
                    encoder,
                    &q2_encoder,
                    &processed,
                    frame_count_hint,
                    start,
                    &progress,
                );
                if let Some(err) = outcome {
                    *encoder_result.lock().unwrap() = Some(err);
                }
            });
        });

        // First stage with a real failure wins; a stage that exits cleanly
        // because its upstream queue closed (cancellation or a sibling
        // stage's own failure) reports no error of its own.
        if let Some(err) = reader_result.into_inner().unwrap() {
            return Err(err);
        }
        if let Some(err) = preprocessor_result.into_inner().unwrap() {
            return Err(err);
        }
        if let Some(err) = encoder_result.into_inner().unwrap() {
            return Err(err);
        }

        if canceled.load(Ordering::SeqCst) {
            return Err(PipelineError::canceled());
        }

        info!(frames = processed.load(Ordering::SeqCst), "transcode finished");
        Ok(())
    }
}

fn run_reader(
    source: &mut FrameSource,
    q1: &BoundedQueue<Frame>,
    q2: &BoundedQueue<YuvPayload>,
) -> Option<PipelineError> {
    loop {
        let frame = match source.next() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                q1.close();
                return None;
            }
            Err(err) => {
                // Close both queues directly rather than relying on the
                // preprocessor to propagate the close after draining Q1;
                // that indirection would leave the encoder blocked on Q2
                // for as long as Q1 takes to drain.
                q1.close();
                q2.close();
                return Some(err);
            }
        };

        if q1.push(frame) == PushOutcome::Rejected {
            // Q1 was closed externally (cancellation) or by another stage's
            // failure; this is not this stage's error to report.
            return None;
        }
    }
}

fn run_preprocessor(
    gpu: &GpuPreprocessor,
    q1: &BoundedQueue<Frame>,
    q2: &BoundedQueue<YuvPayload>,
    target_w: u32,
    target_h: u32,
) -> Option<PipelineError> {
    loop {
        let frame = match q1.pop() {
            Some(frame) => frame,
            None => {
                q2.close();
                return None;
            }
        };

        let yuv = match gpu.process(&frame.data, frame.width, frame.height, target_w, target_h) {
            Ok(bytes) => bytes,
            Err(e) => {
                q1.close();
                q2.close();
                return Some(PipelineError::from(e));
            }
        };

        let payload = YuvPayload::new(target_w, target_h, yuv);
        if q2.push(payload) == PushOutcome::Rejected {
            q1.close();
            return None;
        }
    }
}

fn run_encoder<F>(
    encoder: &mut FrameEncoder,
    q2: &BoundedQueue<YuvPayload>,
    processed: &AtomicU64,
    frame_count_hint: u64,
    start: Instant,
    progress: &F,
) -> Option<PipelineError>
where
    F: Fn(ProgressSample) + Send + Sync,
{
    loop {
        let payload = match q2.pop() {
            Some(payload) => payload,
            None => {
                return encoder.finish().err();
            }
        };

        if let Err(e) = encoder.write(&payload) {
            q2.close();
            // Best effort: the write failure is the error that matters; a
            // secondary failure tearing down the child process doesn't
            // override it.
            let _ = encoder.finish();
            return Some(e);
        }

        let count = processed.fetch_add(1, Ordering::SeqCst) + 1;
        let elapsed_secs = start.elapsed().as_secs_f64();
        let sample = if frame_count_hint == 0 {
            ProgressSample::undefined(elapsed_secs)
        } else {
            let fraction = (count as f64 / frame_count_hint as f64).min(1.0);
            let eta_secs = if fraction > 0.0 {
                elapsed_secs * (1.0 / fraction - 1.0)
            } else {
                f64::NAN
            };
            ProgressSample::known(fraction, elapsed_secs, eta_secs)
        };
        progress(sample);
    }
}
