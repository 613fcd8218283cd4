//! sentineld - safety-equipment monitoring daemon
//!
//! This daemon:
//! 1. Opens the configured frame source (synthetic, device, file, or stream)
//! 2. Runs the capture/inference pipeline with throttled evidence uploads
//! 3. Serves the violation log and the annotated MJPEG stream over HTTP
//! 4. Shuts the pipeline down cooperatively on ctrl-c

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use helmet_sentinel::api::{ApiConfig, ApiServer};
use helmet_sentinel::evidence::sink::open_sink;
use helmet_sentinel::{
    open_source, pace_for_fps, select_backend, Analyzer, BackendConfig, Pipeline, PipelineConfig,
    SentineldConfig, SourceConfig, StreamOutput, ViolationLog,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SentineldConfig::load().context("load configuration")?;
    log::info!(
        "sentineld {} starting: source={} detector={} evidence={}",
        env!("CARGO_PKG_VERSION"),
        cfg.source.url,
        cfg.detector.backend,
        cfg.evidence.endpoint
    );

    let source = open_source(SourceConfig {
        url: cfg.source.url.clone(),
        target_fps: cfg.source.target_fps,
        width: cfg.source.width,
        height: cfg.source.height,
    })
    .context("open frame source")?;

    let mut backend = select_backend(
        &cfg.detector.backend,
        &BackendConfig {
            model_path: cfg.detector.model_path.clone(),
            width: cfg.source.width,
            height: cfg.source.height,
        },
    )
    .context("initialize detector backend")?;
    backend.warm_up().context("warm up detector backend")?;
    let analyzer = Analyzer::new(backend, cfg.classify_config());

    let sink = open_sink(&cfg.evidence.endpoint).context("open evidence sink")?;
    let violation_log = Arc::new(ViolationLog::new());

    let mut pipeline = Pipeline::spawn(
        source,
        analyzer,
        sink,
        violation_log.clone(),
        PipelineConfig {
            capture_pace: pace_for_fps(cfg.source.target_fps),
            inference_interval: cfg.detector.interval,
            throttle: cfg.evidence.throttle,
        },
    )
    .context("start pipeline")?;

    let stream = StreamOutput::new(
        pipeline.processed_cell(),
        pipeline.raw_cell(),
        cfg.source.width,
        cfg.source.height,
    );
    let api = ApiServer::new(
        ApiConfig {
            addr: cfg.api_addr.clone(),
            stream_fps: cfg.source.target_fps,
        },
        violation_log.clone(),
        stream,
    )
    .spawn()
    .context("start api server")?;
    log::info!("api listening on {}", api.addr);

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_handler = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_handler.store(true, Ordering::SeqCst);
    })
    .context("install ctrl-c handler")?;

    let raw = pipeline.raw_cell();
    let processed = pipeline.processed_cell();
    let mut last_health_log = Instant::now();
    let mut capture_end_logged = false;
    while !interrupted.load(Ordering::SeqCst) {
        if pipeline.capture_done() && !capture_end_logged {
            capture_end_logged = true;
            log::info!("capture finished; viewers keep the last frame until shutdown");
        }
        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log::info!(
                "health: captured={} processed={} events={}",
                raw.publish_count(),
                processed.publish_count(),
                violation_log.len()
            );
            last_health_log = Instant::now();
        }
        if pipeline.capture_done() {
            // Idle until ctrl-c; the log and stream stay queryable.
            std::thread::sleep(Duration::from_millis(500));
            continue;
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    pipeline.stop().context("stop pipeline")?;
    api.stop().context("stop api server")?;
    Ok(())
}
