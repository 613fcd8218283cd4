use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::{BoundingBox, DetectorBackend, RawDetection};

const STUB_LABELS: [&str; 2] = ["helmet", "no-helmet"];

/// Stub backend for tests and demos. Derives deterministic detections from a
/// pixel hash, so identical frames always yield identical results and a
/// synthetic source's scene changes show up as changing verdicts.
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        confidence_floor: f32,
    ) -> Result<Vec<RawDetection>> {
        let digest: [u8; 32] = Sha256::digest(pixels).into();
        let selector = digest[0];
        // Confidence varies with content but stays in a plausible band.
        let confidence = 0.45 + (digest[1] as f32 / 255.0) * 0.5;

        // Box placement scales with the frame, offset by the hash so boxes
        // move between scenes.
        let w = width as f32;
        let h = height as f32;
        let x1 = (digest[2] as f32 / 255.0) * (w * 0.5);
        let y1 = (digest[3] as f32 / 255.0) * (h * 0.5);
        let bbox = BoundingBox {
            x1,
            y1,
            x2: (x1 + w * 0.25).min(w - 1.0),
            y2: (y1 + h * 0.4).min(h - 1.0),
        };

        // Roughly: a third of scenes show a bare head, a third a helmet,
        // a third nothing at all.
        let detection = match selector % 3 {
            0 => Some(RawDetection {
                bbox,
                class_id: 1, // no-helmet
                confidence,
            }),
            1 => Some(RawDetection {
                bbox,
                class_id: 0, // helmet
                confidence,
            }),
            _ => None,
        };

        Ok(detection
            .into_iter()
            .filter(|d| d.confidence >= confidence_floor)
            .collect())
    }

    fn label(&self, class_id: usize) -> Option<&str> {
        STUB_LABELS.get(class_id).copied()
    }
}
