//! End-to-end scenario tests driven against the real `ffmpeg`/`ffprobe`
//! subprocesses and a real OpenCL device. Skipped (with a message on
//! stderr) when either precondition is missing from the environment,
//! following the same environment-probing style as this workspace's
//! `tests/common/mod.rs` helpers.

use gpu_transcode_pipeline::config::JobParams;
use gpu_transcode_pipeline::error::PipelineErrorKind;
use gpu_transcode_pipeline::PipelineEngine;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn have_binary(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn ffmpeg_tooling_available() -> bool {
    have_binary("ffmpeg") && have_binary("ffprobe")
}

fn gpu_available() -> bool {
    gpu_preprocess::GpuPreprocessor::new().is_ok()
}

/// Generates a tiny synthetic test video via ffmpeg's `testsrc` source, so
/// the scenario tests need no checked-in binary fixture.
fn generate_test_input(path: &std::path::Path, width: u32, height: u32, fps: u32, frames: u32) {
    let duration = frames as f64 / fps as f64;
    let status = Command::new("ffmpeg")
        .args([
            "-y",
            "-v",
            "error",
            "-f",
            "lavfi",
            "-i",
            &format!("testsrc=size={width}x{height}:rate={fps}:duration={duration}"),
            "-pix_fmt",
            "yuv420p",
            path.to_str().unwrap(),
        ])
        .status()
        .expect("failed to spawn ffmpeg to generate test input");
    assert!(status.success(), "ffmpeg failed to generate test input");
}

/// S1: happy path, tiny solid/synthetic input, verifies output exists at the
/// halved geometry with no error.
#[test]
fn s1_happy_path_tiny_input_produces_output_at_halved_geometry() {
    if !ffmpeg_tooling_available() || !gpu_available() {
        eprintln!("skipping: ffmpeg/ffprobe or a GPU device is not available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.mp4");
    let output = dir.path().join("output.mp4");
    generate_test_input(&input, 320, 240, 30, 90);

    let params = JobParams {
        input_path: input.to_str().unwrap().to_string(),
        output_path: output.to_str().unwrap().to_string(),
        crf: 23,
        preset_index: gpu_transcode_pipeline::config::preset_index_of("ultrafast").unwrap(),
        queue_capacity: 4,
    };

    let mut engine = PipelineEngine::new(&params).expect("engine construction should succeed");
    engine.run(|_sample| {}).expect("run should succeed");

    assert!(output.exists(), "output file should have been created");

    let probed = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,nb_frames",
            "-of",
            "csv=p=0",
            output.to_str().unwrap(),
        ])
        .output()
        .expect("ffprobe on output should run");
    let probed = String::from_utf8_lossy(&probed.stdout);
    assert!(probed.contains("160,120"), "expected 160x120, got: {probed}");
}

/// S2: odd source geometry halves and rounds down to even without
/// triggering `InvalidGeometry`.
#[test]
fn s2_odd_geometry_rounds_down_to_even() {
    if !ffmpeg_tooling_available() || !gpu_available() {
        eprintln!("skipping: ffmpeg/ffprobe or a GPU device is not available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.mp4");
    let output = dir.path().join("output.mp4");
    generate_test_input(&input, 642, 482, 30, 10);

    let params = JobParams {
        input_path: input.to_str().unwrap().to_string(),
        output_path: output.to_str().unwrap().to_string(),
        ..JobParams::default()
    };

    let mut engine = PipelineEngine::new(&params).expect("engine construction should succeed");
    engine.run(|_sample| {}).expect("run should succeed");
    assert!(output.exists());
}

/// S3: a nonexistent input path fails at construction with
/// `SourceUnavailable` and starts no worker threads or output file.
#[test]
fn s3_missing_source_fails_at_construction() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.mp4");

    let params = JobParams {
        input_path: dir.path().join("does-not-exist.mp4").to_str().unwrap().to_string(),
        output_path: output.to_str().unwrap().to_string(),
        ..JobParams::default()
    };

    let err = PipelineEngine::new(&params).expect_err("construction must fail");
    assert_eq!(err.kind, PipelineErrorKind::SourceUnavailable);
    assert!(!output.exists(), "no output file should have been created");
}

/// S5: canceling mid-stream yields `Canceled` and every worker joins.
#[test]
fn s5_cancel_mid_stream_yields_canceled() {
    if !ffmpeg_tooling_available() || !gpu_available() {
        eprintln!("skipping: ffmpeg/ffprobe or a GPU device is not available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.mp4");
    let output = dir.path().join("output.mp4");
    // Generous frame count so cancellation reliably lands mid-stream rather
    // than racing the natural end of the job.
    generate_test_input(&input, 320, 240, 30, 600);

    let params = JobParams {
        input_path: input.to_str().unwrap().to_string(),
        output_path: output.to_str().unwrap().to_string(),
        ..JobParams::default()
    };

    let mut engine = PipelineEngine::new(&params).expect("engine construction should succeed");
    let cancel_handle = engine.cancel_handle();
    let frames_seen = Arc::new(AtomicU32::new(0));
    let frames_seen_cb = frames_seen.clone();

    std::thread::scope(|scope| {
        let canceler = scope.spawn(|| {
            // Give the pipeline a moment to process some frames before
            // canceling, per the scenario's "after 10 frames" framing.
            while frames_seen.load(Ordering::SeqCst) < 10 {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            cancel_handle.cancel();
        });

        let result = engine.run(move |_sample| {
            frames_seen_cb.fetch_add(1, Ordering::SeqCst);
        });

        canceler.join().unwrap();
        let err = result.expect_err("a canceled run must yield an error result");
        assert_eq!(err.kind, PipelineErrorKind::Canceled);
    });
}
