//! Inference loop: raw cell → detector → processed cell + violation signals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotate::annotate_frame;
use crate::detect::Analyzer;
use crate::evidence::dispatch::ViolationSignal;
use crate::frame::{Frame, FrameCell};

/// Run detection on the freshest raw frame at an independent cadence.
///
/// Each cycle reads the raw cell, skips frames it has already analyzed,
/// annotates a copy, publishes it into the processed cell, and signals any
/// violation with the raw frame attached. The interval is chosen slower than
/// (or equal to) the capture pace on purpose: detector cost must never stall
/// ingestion, and the cell's overwrite semantics make skipped frames free.
///
/// A failed detector call is logged and the cycle skipped; a transient
/// detector failure must not kill the pipeline.
pub fn run_inference_loop(
    analyzer: Analyzer,
    raw: Arc<FrameCell>,
    processed: Arc<FrameCell>,
    signals: Sender<ViolationSignal>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut last_seen: Option<Arc<Frame>> = None;

    while running.load(Ordering::SeqCst) {
        let Some(frame) = raw.latest() else {
            // Nothing captured yet; wait for the first frame.
            std::thread::sleep(interval);
            continue;
        };

        if last_seen
            .as_ref()
            .is_some_and(|seen| Arc::ptr_eq(seen, &frame))
        {
            // Capture has not produced a newer frame; re-running the
            // detector on the same image would only duplicate signals.
            std::thread::sleep(interval);
            continue;
        }
        last_seen = Some(frame.clone());

        match analyzer.analyze(&frame) {
            Ok(analysis) => {
                let mut annotated = (*frame).clone();
                annotate_frame(&mut annotated, &analysis.detections);
                processed.publish(annotated);

                if analysis.has_violation() {
                    log::debug!(
                        "violation detected ({} of {} detections)",
                        analysis.violation_count,
                        analysis.detections.len()
                    );
                    let signal = ViolationSignal {
                        frame: frame.clone(),
                        at: Instant::now(),
                    };
                    if signals.send(signal).is_err() {
                        // Dispatcher is gone; shutdown is in progress.
                        break;
                    }
                }
            }
            Err(err) => {
                log::warn!("inference: detector failed, skipping cycle: {:#}", err);
            }
        }

        std::thread::sleep(interval);
    }
    log::debug!("inference loop exited");
}
