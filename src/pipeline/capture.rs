//! Capture loop: source → raw frame cell.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::frame::FrameCell;
use crate::ingest::{FrameRead, FrameSource};

/// Pull frames from the source at its native rate and publish each into the
/// raw cell, until the running flag clears or the source gives out.
///
/// The loop never fabricates frames. On end-of-stream or a read error it
/// exits, leaving the raw cell holding the last good frame; the blank
/// placeholder for viewers is the stream output's job. The source handle is
/// released on every exit path.
pub fn run_capture_loop(
    mut source: Box<dyn FrameSource>,
    raw: Arc<FrameCell>,
    running: Arc<AtomicBool>,
    pace: Duration,
) {
    while running.load(Ordering::SeqCst) {
        match source.read_frame() {
            Ok(FrameRead::Frame(frame)) => {
                raw.publish(frame);
            }
            Ok(FrameRead::EndOfStream) => {
                log::info!("capture: source {} exhausted", source.descriptor());
                break;
            }
            Err(err) => {
                log::warn!(
                    "capture: read from {} failed, stopping: {:#}",
                    source.descriptor(),
                    err
                );
                break;
            }
        }
        // Bound the spin when the source is a live device that answers
        // faster than the target rate.
        std::thread::sleep(pace);
    }
    source.close();
    log::debug!("capture loop exited");
}

/// Sleep slice between reads for a target frame rate.
pub fn pace_for_fps(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(100)
    } else {
        Duration::from_millis((1000 / target_fps.max(1)) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pace_is_bounded_for_degenerate_fps() {
        assert_eq!(pace_for_fps(0), Duration::from_millis(100));
        assert_eq!(pace_for_fps(10), Duration::from_millis(100));
        assert_eq!(pace_for_fps(2000), Duration::from_millis(0));
    }
}
