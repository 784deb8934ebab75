use clap::Parser;
use gpu_transcode_pipeline::config::{preset_index_of, JobParams, PRESET_NAMES};
use gpu_transcode_pipeline::progress::ProgressSample;
use gpu_transcode_pipeline::{PipelineEngine, PipelineError};
use tracing::{error, info};

/// GPU-accelerated video transcoder: decode, resize and convert on the GPU,
/// re-encode to H.264.
#[derive(Parser, Debug)]
#[command(name = "transcode")]
#[command(about = "Transcode a video through a GPU resize/color-convert stage into H.264")]
struct Args {
    /// Input video file path
    input: String,

    /// Output video file path
    output: String,

    /// x264 Constant Rate Factor, 0-51 (lower is higher quality)
    #[arg(long, default_value_t = 23, help = "x264 CRF, 0 (lossless) to 51 (worst)")]
    crf: u8,

    /// x264 encoding preset, by name
    #[arg(
        long,
        default_value = "veryfast",
        help = "x264 preset: ultrafast, superfast, veryfast, faster, fast, medium, slow, slower, veryslow, placebo"
    )]
    preset: String,

    /// Capacity of each inter-stage queue
    #[arg(long, default_value_t = 4, help = "Bounded queue capacity between stages")]
    queue_capacity: usize,

    /// Print progress fraction and ETA to stderr as the job runs
    #[arg(long, help = "Print progress updates to stderr")]
    progress: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            err.kind.exit_code()
        }
    };

    std::process::exit(exit_code);
}

fn run(args: Args) -> Result<(), PipelineError> {
    let preset_index = preset_index_of(&args.preset).ok_or_else(|| {
        PipelineError::invalid_args(format!(
            "unknown preset '{}'; expected one of {:?}",
            args.preset, PRESET_NAMES
        ))
    })?;

    let params = JobParams {
        input_path: args.input,
        output_path: args.output,
        crf: args.crf,
        preset_index,
        queue_capacity: args.queue_capacity,
    };
    params.validate()?;

    let mut engine = PipelineEngine::new(&params)?;
    let show_progress = args.progress;

    engine.run(move |sample: ProgressSample| {
        if show_progress {
            report_progress(sample);
        }
    })?;

    info!(output = %params.output_path, "transcode complete");
    Ok(())
}

fn report_progress(sample: ProgressSample) {
    if sample.fraction.is_nan() {
        eprintln!("progress: unknown ({:.1}s elapsed)", sample.elapsed_secs);
    } else {
        eprintln!(
            "progress: {:.1}% ({:.1}s elapsed, eta {:.1}s)",
            sample.fraction * 100.0,
            sample.elapsed_secs,
            sample.eta_secs
        );
    }
}

fn init_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
