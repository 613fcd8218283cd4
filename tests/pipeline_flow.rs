//! End-to-end pipeline scenarios with scripted sources and detectors.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use helmet_sentinel::{
    Analyzer, ClassifyConfig, Frame, FrameRead, FrameSource, MemoryEvidenceSink, Pipeline,
    PipelineConfig, RawDetection, StreamOutput, ThrottleConfig, ThrottleMode, ViolationLog,
};

/// Source that yields a fixed number of frames, then ends the stream.
/// Frames are tagged through their first pixel so tests can tell them apart.
struct ScriptedSource {
    total: usize,
    read: usize,
    released: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(total: usize) -> (Self, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        (
            Self {
                total,
                read: 0,
                released: released.clone(),
            },
            released,
        )
    }
}

impl FrameSource for ScriptedSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<FrameRead> {
        if self.read >= self.total {
            return Ok(FrameRead::EndOfStream);
        }
        self.read += 1;
        let mut frame = Frame::blank(16, 16);
        frame.pixels[0] = self.read as u8;
        Ok(FrameRead::Frame(frame))
    }

    fn close(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn descriptor(&self) -> &str {
        "scripted://test"
    }
}

/// Detector that reports a confident bare head on every frame.
struct AlwaysViolation {
    calls: Arc<AtomicUsize>,
}

impl helmet_sentinel::DetectorBackend for AlwaysViolation {
    fn name(&self) -> &'static str {
        "always-violation"
    }

    fn detect(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
        _confidence_floor: f32,
    ) -> Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![RawDetection {
            bbox: helmet_sentinel::detect::BoundingBox {
                x1: 1.0,
                y1: 1.0,
                x2: 10.0,
                y2: 10.0,
            },
            class_id: 0,
            confidence: 0.6,
        }])
    }

    fn label(&self, class_id: usize) -> Option<&str> {
        (class_id == 0).then_some("no-helmet")
    }
}

fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {}", what);
}

fn fast_config(min_upload: Duration) -> PipelineConfig {
    PipelineConfig {
        capture_pace: Duration::from_millis(10),
        inference_interval: Duration::from_millis(10),
        throttle: ThrottleConfig {
            mode: ThrottleMode::Debounce,
            min_interval: min_upload,
        },
    }
}

#[test]
fn end_of_stream_releases_source_and_keeps_last_frame() -> Result<()> {
    let (source, released) = ScriptedSource::new(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let analyzer = Analyzer::new(
        Box::new(AlwaysViolation {
            calls: calls.clone(),
        }),
        ClassifyConfig::default(),
    );
    let log = Arc::new(ViolationLog::new());

    let mut pipeline = Pipeline::spawn(
        Box::new(source),
        analyzer,
        Arc::new(MemoryEvidenceSink::new()),
        log,
        fast_config(Duration::from_secs(60)),
    )?;

    // Capture exits on its own after the third frame.
    wait_for("capture to finish", || pipeline.capture_done());
    assert!(released.load(Ordering::SeqCst), "source handle not released");

    // The raw cell retains the final frame rather than being cleared.
    let last = pipeline.raw_cell().latest().expect("raw cell keeps a frame");
    assert_eq!(last.pixels[0], 3);

    pipeline.stop()?;
    Ok(())
}

#[test]
fn sustained_violation_yields_one_throttled_event() -> Result<()> {
    let (source, _released) = ScriptedSource::new(30);
    let calls = Arc::new(AtomicUsize::new(0));
    let analyzer = Analyzer::new(
        Box::new(AlwaysViolation {
            calls: calls.clone(),
        }),
        ClassifyConfig::default(),
    );
    let sink = Arc::new(MemoryEvidenceSink::new());
    let log = Arc::new(ViolationLog::new());

    let mut pipeline = Pipeline::spawn(
        Box::new(source),
        analyzer,
        sink.clone(),
        log.clone(),
        // Window far wider than the run: only the first signal may fire.
        fast_config(Duration::from_secs(3600)),
    )?;

    wait_for("capture to finish", || pipeline.capture_done());
    wait_for("first evidence upload", || log.len() >= 1);
    pipeline.stop()?;

    assert!(
        calls.load(Ordering::SeqCst) > 1,
        "detector should have run on multiple frames"
    );
    assert_eq!(log.len(), 1, "throttle admitted more than one signal");
    assert_eq!(sink.uploads().len(), 1);

    let event = &log.recent(10)[0];
    assert_eq!(event.id, 1);
    assert!(event.url.starts_with("mem://"));
    assert!(event.name.starts_with("evidence_"));
    Ok(())
}

#[test]
fn processed_frames_reach_the_stream_output() -> Result<()> {
    let (source, _released) = ScriptedSource::new(20);
    let calls = Arc::new(AtomicUsize::new(0));
    let analyzer = Analyzer::new(
        Box::new(AlwaysViolation { calls }),
        ClassifyConfig::default(),
    );
    let log = Arc::new(ViolationLog::new());

    let mut pipeline = Pipeline::spawn(
        Box::new(source),
        analyzer,
        Arc::new(MemoryEvidenceSink::new()),
        log,
        fast_config(Duration::from_secs(3600)),
    )?;

    let stream = StreamOutput::new(pipeline.processed_cell(), pipeline.raw_cell(), 16, 16);

    wait_for("a processed frame", || {
        pipeline.processed_cell().latest().is_some()
    });

    // The annotated copy differs from the raw frame: the overlay drew on it.
    let processed = pipeline.processed_cell().latest().expect("processed frame");
    let raw = pipeline.raw_cell().latest().expect("raw frame");
    assert_ne!(processed.pixels, raw.pixels);

    // Viewers always get a frame, before and after shutdown.
    assert!(!stream.next_jpeg()?.is_empty());
    pipeline.stop()?;
    assert!(!stream.next_jpeg()?.is_empty());
    Ok(())
}

#[test]
fn detector_failure_does_not_kill_the_pipeline() -> Result<()> {
    /// Fails on the first calls, then recovers.
    struct Flaky {
        calls: Arc<AtomicUsize>,
    }

    impl helmet_sentinel::DetectorBackend for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn detect(
            &mut self,
            _pixels: &[u8],
            _width: u32,
            _height: u32,
            _confidence_floor: f32,
        ) -> Result<Vec<RawDetection>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < 2 {
                anyhow::bail!("transient detector failure");
            }
            Ok(vec![])
        }

        fn label(&self, _class_id: usize) -> Option<&str> {
            None
        }
    }

    let (source, _released) = ScriptedSource::new(40);
    let calls = Arc::new(AtomicUsize::new(0));
    let analyzer = Analyzer::new(
        Box::new(Flaky {
            calls: calls.clone(),
        }),
        ClassifyConfig::default(),
    );
    let log = Arc::new(ViolationLog::new());

    let mut pipeline = Pipeline::spawn(
        Box::new(source),
        analyzer,
        Arc::new(MemoryEvidenceSink::new()),
        log.clone(),
        fast_config(Duration::from_secs(3600)),
    )?;

    // The loop keeps cycling past the failures and eventually publishes.
    wait_for("recovery after failures", || {
        calls.load(Ordering::SeqCst) > 2 && pipeline.processed_cell().latest().is_some()
    });
    pipeline.stop()?;

    // No violations were reported, so no evidence was created.
    assert!(log.is_empty());
    Ok(())
}

#[test]
fn stopping_twice_is_safe() -> Result<()> {
    let (source, released) = ScriptedSource::new(1000);
    let calls = Arc::new(AtomicUsize::new(0));
    let analyzer = Analyzer::new(
        Box::new(AlwaysViolation { calls }),
        ClassifyConfig::default(),
    );
    let log = Arc::new(ViolationLog::new());

    let mut pipeline = Pipeline::spawn(
        Box::new(source),
        analyzer,
        Arc::new(MemoryEvidenceSink::new()),
        log,
        fast_config(Duration::from_secs(3600)),
    )?;

    std::thread::sleep(Duration::from_millis(50));
    pipeline.stop()?;
    assert!(released.load(Ordering::SeqCst), "stop must release the source");
    pipeline.stop()?;
    Ok(())
}
