//! Synthetic frame source (`stub://`) for tests and demos.

use anyhow::{anyhow, Result};

use super::{FrameRead, FrameSource, SourceConfig};
use crate::frame::Frame;

/// Endless synthetic source. Generates a slowly changing scene so the stub
/// detector sees both quiet stretches and verdict changes.
pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    scene_state: u8,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
            connected: false,
        }
    }

    /// Generate synthetic pixel data.
    ///
    /// The scene state advances every 25 frames, changing the whole pattern
    /// at once the way a new object entering a real scene would.
    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;

        if self.frame_count % 25 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.scene_state as u64 * 31) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("SyntheticSource: connected to {}", self.config.url);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<FrameRead> {
        if !self.connected {
            return Err(anyhow!("synthetic source is not connected"));
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(FrameRead::Frame(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
        )))
    }

    fn close(&mut self) {
        if self.connected {
            self.connected = false;
            log::info!(
                "SyntheticSource: closed {} after {} frames",
                self.config.url,
                self.frame_count
            );
        }
    }

    fn descriptor(&self) -> &str {
        &self.config.url
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.close();
    }
}
