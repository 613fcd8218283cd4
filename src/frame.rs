//! Frame types and the latest-frame cell.
//!
//! - `Frame`: one decoded RGB24 image with its capture time.
//! - `FrameCell`: single-slot holder of the most recent frame. Writes
//!   overwrite unconditionally; readers get the newest value or nothing.
//!
//! The cell is the decoupling primitive between the capture, inference, and
//! stream-output loops: a slow reader never backs up the writer, and a frame
//! that was overwritten before anyone read it is simply gone. That is correct
//! behavior for live video, not data loss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Seconds since the Unix epoch, saturating at zero on clock skew.
pub fn now_epoch_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One decoded video frame. Pixels are tightly packed RGB24, row-major.
///
/// Frames are cloned before any mutation once shared between loops, so a
/// downstream reader never observes a half-annotated image.
#[derive(Clone, Debug)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at_epoch_s: u64,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            captured_at_epoch_s: now_epoch_s(),
        }
    }

    /// Synthesize an all-black frame of the given resolution.
    ///
    /// Used by the stream output when no real frame exists yet, so the
    /// transport always receives a well-formed image.
    pub fn blank(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(vec![0u8; len], width, height)
    }

    /// Byte length of one pixel row.
    pub fn row_bytes(&self) -> usize {
        (self.width as usize) * 3
    }

    /// Encode this frame as JPEG at the given quality.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(&self.pixels, self.width, self.height, ExtendedColorType::Rgb8)
            .context("encode frame as jpeg")?;
        Ok(out)
    }
}

/// Single-slot, overwrite-wins holder of the most recent frame.
///
/// `publish` replaces the held frame in O(1) and never queues; `latest`
/// returns the newest value or `None` if nothing was ever published.
/// Concurrent publishes race and the last write wins; losing an
/// intermediate frame has no correctness cost here. The lock is held only
/// for the slot swap, never across I/O.
#[derive(Default)]
pub struct FrameCell {
    slot: Mutex<Option<Arc<Frame>>>,
    publishes: AtomicU64,
}

impl FrameCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held frame with `frame`.
    pub fn publish(&self, frame: Frame) {
        self.publish_shared(Arc::new(frame));
    }

    /// Replace the held frame with an already-shared frame.
    pub fn publish_shared(&self, frame: Arc<Frame>) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(frame);
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    /// The most recently published frame, or `None` if the cell is empty.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    pub fn is_empty(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.is_none()
    }

    /// Total number of publishes since creation. Used for health logging.
    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_tag(tag: u8) -> Frame {
        Frame::new(vec![tag; 12], 2, 2)
    }

    #[test]
    fn empty_cell_returns_none() {
        let cell = FrameCell::new();
        assert!(cell.latest().is_none());
        assert!(cell.is_empty());
        assert_eq!(cell.publish_count(), 0);
    }

    #[test]
    fn get_returns_last_of_many_publishes() {
        let cell = FrameCell::new();
        for tag in 1..=5u8 {
            cell.publish(frame_with_tag(tag));
        }
        let latest = cell.latest().expect("cell holds a frame");
        assert_eq!(latest.pixels[0], 5);
        assert_eq!(cell.publish_count(), 5);
    }

    #[test]
    fn overwrite_never_grows_memory() {
        let cell = FrameCell::new();
        cell.publish(frame_with_tag(1));
        cell.publish(frame_with_tag(2));
        // Only one frame is retained; the first publish is gone.
        let held = cell.latest().expect("cell holds a frame");
        assert_eq!(held.pixels[0], 2);
        assert_eq!(Arc::strong_count(&held), 2); // the cell and this handle
    }

    #[test]
    fn readers_share_without_copying() {
        let cell = FrameCell::new();
        cell.publish(frame_with_tag(7));
        let a = cell.latest().expect("frame");
        let b = cell.latest().expect("frame");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn blank_frame_matches_requested_resolution() {
        let frame = Frame::blank(64, 48);
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.pixels.len(), 64 * 48 * 3);
        assert!(frame.pixels.iter().all(|&p| p == 0));
    }
}
