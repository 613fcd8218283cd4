//! The frame pipeline: capture, inference, and evidence dispatch.
//!
//! Three concerns, three threads:
//! - the capture loop blocks on source I/O
//! - the inference loop blocks on the detector (the expensive step)
//! - the dispatcher thread serializes throttling and fires upload threads
//!
//! They share nothing but the two frame cells and the signal channel, so no
//! lock is ever held across I/O. Stopping is cooperative: the running flag
//! is checked once per loop iteration, and `stop` joins the capture loop
//! first so the source handle is guaranteed released before `stop` returns
//! (required when switching a camera to another descriptor).

pub mod capture;
pub mod inference;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::Analyzer;
use crate::evidence::{EvidenceDispatcher, EvidenceSink, ViolationLog};
use crate::frame::FrameCell;
use crate::ingest::FrameSource;
use crate::throttle::ThrottleConfig;

pub use capture::pace_for_fps;

/// Pipeline cadence and throttling settings.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Sleep between source reads.
    pub capture_pace: Duration,
    /// Sleep between inference cycles; at least the capture pace.
    pub inference_interval: Duration,
    pub throttle: ThrottleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_pace: Duration::from_millis(100),
            inference_interval: Duration::from_millis(200),
            throttle: ThrottleConfig::default(),
        }
    }
}

/// A running pipeline for exactly one source.
pub struct Pipeline {
    running: Arc<AtomicBool>,
    raw: Arc<FrameCell>,
    processed: Arc<FrameCell>,
    log: Arc<ViolationLog>,
    capture: Option<JoinHandle<()>>,
    inference: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Connect the source and start all three threads.
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        analyzer: Analyzer,
        sink: Arc<dyn EvidenceSink>,
        log: Arc<ViolationLog>,
        config: PipelineConfig,
    ) -> Result<Self> {
        source.connect()?;

        let running = Arc::new(AtomicBool::new(true));
        let raw = Arc::new(FrameCell::new());
        let processed = Arc::new(FrameCell::new());
        let (signal_tx, signal_rx) = mpsc::channel();

        let capture = {
            let raw = raw.clone();
            let running = running.clone();
            let pace = config.capture_pace;
            std::thread::spawn(move || capture::run_capture_loop(source, raw, running, pace))
        };

        let inference = {
            let raw = raw.clone();
            let processed = processed.clone();
            let running = running.clone();
            let interval = config.inference_interval;
            std::thread::spawn(move || {
                inference::run_inference_loop(
                    analyzer, raw, processed, signal_tx, running, interval,
                )
            })
        };

        let dispatcher =
            EvidenceDispatcher::new(sink, log.clone(), config.throttle).spawn(signal_rx);

        Ok(Self {
            running,
            raw,
            processed,
            log,
            capture: Some(capture),
            inference: Some(inference),
            dispatcher: Some(dispatcher),
        })
    }

    /// Cell holding the freshest captured frame.
    pub fn raw_cell(&self) -> Arc<FrameCell> {
        self.raw.clone()
    }

    /// Cell holding the freshest annotated frame.
    pub fn processed_cell(&self) -> Arc<FrameCell> {
        self.processed.clone()
    }

    pub fn violation_log(&self) -> Arc<ViolationLog> {
        self.log.clone()
    }

    /// Whether a stop has been requested. The loops may still be finishing
    /// their current iteration.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once the capture loop has exited (stream ended or stopped).
    pub fn capture_done(&self) -> bool {
        self.capture
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Request a stop and wait for the loops to wind down.
    ///
    /// Join order matters: capture first (source released synchronously),
    /// then inference (dropping the signal sender), then the dispatcher
    /// (drains remaining signals and exits on channel close). In-flight
    /// upload threads are detached and not waited for.
    pub fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        for (name, handle) in [
            ("capture", self.capture.take()),
            ("inference", self.inference.take()),
            ("dispatcher", self.dispatcher.take()),
        ] {
            if let Some(handle) = handle {
                handle
                    .join()
                    .map_err(|_| anyhow!("{} thread panicked", name))?;
            }
        }
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Cooperative stop on drop; errors only mean a thread already died.
        let _ = self.stop();
    }
}
