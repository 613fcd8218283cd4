//! Evidence dispatch: from violation signals to uploaded log entries.
//!
//! One dispatcher thread drains the signal channel, applies the throttler
//! (it is the sole owner of the fired timestamp), and hands each admitted
//! signal to a detached upload thread. Uploads therefore never block the
//! inference loop, and an upload in flight runs to completion even if the
//! pipeline shuts down underneath it.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::evidence::{EvidenceSink, ViolationLog};
use crate::frame::Frame;
use crate::throttle::{ThrottleConfig, ViolationThrottler};

/// JPEG quality for uploaded evidence images.
const EVIDENCE_JPEG_QUALITY: u8 = 80;

/// One violation observation from the inference loop. Carries the raw,
/// unannotated frame so evidence shows the scene as captured.
pub struct ViolationSignal {
    pub frame: Arc<Frame>,
    pub at: Instant,
}

pub struct EvidenceDispatcher {
    sink: Arc<dyn EvidenceSink>,
    log: Arc<ViolationLog>,
    throttle: ThrottleConfig,
}

impl EvidenceDispatcher {
    pub fn new(
        sink: Arc<dyn EvidenceSink>,
        log: Arc<ViolationLog>,
        throttle: ThrottleConfig,
    ) -> Self {
        Self {
            sink,
            log,
            throttle,
        }
    }

    /// Start the dispatcher thread. It exits when every sender for `signals`
    /// is gone and the channel has drained.
    pub fn spawn(self, signals: Receiver<ViolationSignal>) -> JoinHandle<()> {
        std::thread::spawn(move || self.run(signals))
    }

    fn run(self, signals: Receiver<ViolationSignal>) {
        let mut throttler = ViolationThrottler::new(self.throttle);
        let mut sequence = 0u64;

        while let Ok(signal) = signals.recv() {
            if !throttler.admit_at(signal.at) {
                log::debug!("violation signal dropped by throttle");
                continue;
            }

            sequence += 1;
            let name = format!("evidence_{}_{}", signal.frame.captured_at_epoch_s, sequence);
            log::info!("violation admitted, uploading {}", name);

            let sink = self.sink.clone();
            let log = self.log.clone();
            // Fire-and-forget: the handle is dropped, the upload finishes on
            // its own clock.
            std::thread::spawn(move || upload_evidence(&*sink, &log, &signal, name));
        }
        log::debug!("evidence dispatcher draining complete");
    }
}

fn upload_evidence(
    sink: &dyn EvidenceSink,
    log: &ViolationLog,
    signal: &ViolationSignal,
    name: String,
) {
    let image = match signal.frame.to_jpeg(EVIDENCE_JPEG_QUALITY) {
        Ok(image) => image,
        Err(err) => {
            log::error!("evidence encode failed for {}: {:#}", name, err);
            return;
        }
    };

    match sink.upload(&image, &name) {
        Ok(url) => {
            let event = log.append_uploaded(name, signal.frame.captured_at_epoch_s, url);
            log::info!("evidence #{} stored at {}", event.id, event.url);
        }
        Err(err) => {
            // Dropped, not retried: upload failures are rare transient
            // network errors and the next admitted signal replaces this one.
            log::warn!("evidence upload failed for {}: {:#}", name, err);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
