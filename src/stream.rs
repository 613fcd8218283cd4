//! Stream output: freshest-frame reads for the live transport.
//!
//! Viewers tick this adapter on their own clock. Each tick takes the newest
//! annotated frame, falls back to the newest raw frame while inference warms
//! up, and synthesizes a blank frame of the configured resolution when
//! nothing has been captured at all, so the transport never sees an
//! absent frame.

use std::sync::Arc;

use anyhow::Result;

use crate::frame::{Frame, FrameCell};

/// JPEG quality for the live stream.
const STREAM_JPEG_QUALITY: u8 = 80;

#[derive(Clone)]
pub struct StreamOutput {
    processed: Arc<FrameCell>,
    raw: Arc<FrameCell>,
    width: u32,
    height: u32,
}

impl StreamOutput {
    pub fn new(processed: Arc<FrameCell>, raw: Arc<FrameCell>, width: u32, height: u32) -> Self {
        Self {
            processed,
            raw,
            width,
            height,
        }
    }

    /// The frame a viewer should see right now.
    pub fn current_frame(&self) -> Arc<Frame> {
        if let Some(frame) = self.processed.latest() {
            return frame;
        }
        if let Some(frame) = self.raw.latest() {
            return frame;
        }
        Arc::new(Frame::blank(self.width, self.height))
    }

    /// Current frame, encoded for the transport.
    pub fn next_jpeg(&self) -> Result<Vec<u8>> {
        self.current_frame().to_jpeg(STREAM_JPEG_QUALITY)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cells() -> (Arc<FrameCell>, Arc<FrameCell>) {
        (Arc::new(FrameCell::new()), Arc::new(FrameCell::new()))
    }

    #[test]
    fn empty_cells_yield_a_blank_placeholder() {
        let (processed, raw) = cells();
        let output = StreamOutput::new(processed, raw, 320, 240);

        let frame = output.current_frame();
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.pixels.len(), 320 * 240 * 3);
    }

    #[test]
    fn raw_frame_is_used_until_processing_catches_up() {
        let (processed, raw) = cells();
        let output = StreamOutput::new(processed.clone(), raw.clone(), 320, 240);

        raw.publish(Frame::new(vec![9u8; 12], 2, 2));
        assert_eq!(output.current_frame().pixels[0], 9);

        processed.publish(Frame::new(vec![4u8; 12], 2, 2));
        assert_eq!(output.current_frame().pixels[0], 4);
    }

    #[test]
    fn next_jpeg_is_well_formed_even_when_empty() -> Result<()> {
        let (processed, raw) = cells();
        let output = StreamOutput::new(processed, raw, 64, 48);

        let jpeg = output.next_jpeg()?;
        // JPEG SOI marker.
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        Ok(())
    }
}
