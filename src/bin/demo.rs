//! demo - end-to-end synthetic run of the monitoring pipeline
//!
//! Runs the full pipeline against the synthetic source and the stub
//! detector with an in-memory evidence sink, then prints the violation log.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use helmet_sentinel::{
    open_source, pace_for_fps, Analyzer, ClassifyConfig, MemoryEvidenceSink, Pipeline,
    PipelineConfig, SourceConfig, StreamOutput, StubBackend, ThrottleConfig, ThrottleMode,
    ViolationLog,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration of the synthetic run in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Minimum seconds between evidence uploads.
    #[arg(long, default_value_t = 2)]
    min_upload_secs: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let width = 320;
    let height = 240;

    let source = open_source(SourceConfig {
        url: "stub://demo".to_string(),
        target_fps: args.fps,
        width,
        height,
    })
    .context("open synthetic source")?;

    let analyzer = Analyzer::new(Box::new(StubBackend::new()), ClassifyConfig::default());
    let sink = Arc::new(MemoryEvidenceSink::new());
    let violation_log = Arc::new(ViolationLog::new());

    log::info!(
        "demo: running {}s at {} fps, evidence every >= {}s",
        args.seconds,
        args.fps,
        args.min_upload_secs
    );

    let mut pipeline = Pipeline::spawn(
        source,
        analyzer,
        sink.clone(),
        violation_log.clone(),
        PipelineConfig {
            capture_pace: pace_for_fps(args.fps),
            inference_interval: pace_for_fps(args.fps).max(Duration::from_millis(50)),
            throttle: ThrottleConfig {
                mode: ThrottleMode::Debounce,
                min_interval: Duration::from_secs(args.min_upload_secs),
            },
        },
    )
    .context("start pipeline")?;

    let stream = StreamOutput::new(
        pipeline.processed_cell(),
        pipeline.raw_cell(),
        width,
        height,
    );

    std::thread::sleep(Duration::from_secs(args.seconds));
    pipeline.stop().context("stop pipeline")?;

    // One transport tick after shutdown still yields a frame.
    let jpeg = stream.next_jpeg().context("encode final frame")?;
    log::info!("final stream frame: {} bytes", jpeg.len());
    log::info!("uploads performed: {}", sink.uploads().len());

    let events = violation_log.recent(helmet_sentinel::DEFAULT_LOG_LIMIT);
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}
