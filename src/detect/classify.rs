//! Detection classification.
//!
//! This is the adapter between the raw detector output and the pipeline's
//! safety verdicts. Labels are matched by keyword containment against two
//! configured sets, with a lower confidence bar for violations than for
//! safe gear: missing a bare head costs more than a spurious alert.
//!
//! Keyword matching is brittle by nature; it lives behind this adapter so a
//! structured class-id mapping can replace it without touching the pipeline.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::detect::backend::{BoundingBox, DetectorBackend};
use crate::frame::Frame;

/// Safety verdict for a detection or a whole frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Violation,
    Unknown,
}

/// Classification settings: keyword sets and per-verdict confidence bars.
#[derive(Clone, Debug)]
pub struct ClassifyConfig {
    pub unsafe_keywords: Vec<String>,
    pub safe_keywords: Vec<String>,
    /// Confidence bar for a violation verdict. Also the floor passed to the
    /// detector, so candidate violations are never filtered upstream.
    pub violation_threshold: f32,
    /// Confidence bar for a safe verdict. Higher than the violation bar.
    pub safe_threshold: f32,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            unsafe_keywords: ["no-helmet", "head", "face", "person"]
                .map(str::to_string)
                .to_vec(),
            safe_keywords: ["helmet", "hardhat", "safety-cap"]
                .map(str::to_string)
                .to_vec(),
            violation_threshold: 0.4,
            safe_threshold: 0.5,
        }
    }
}

impl ClassifyConfig {
    /// Classify one labeled detection.
    ///
    /// Unsafe keywords are checked first: a label matching both sets (e.g. a
    /// vocabulary with "no-helmet" and "helmet") is a violation.
    pub fn classify(&self, label: &str, confidence: f32) -> Verdict {
        let label = normalize_label(label);
        if confidence >= self.violation_threshold
            && self.unsafe_keywords.iter().any(|k| label.contains(k.as_str()))
        {
            return Verdict::Violation;
        }
        if confidence >= self.safe_threshold
            && self.safe_keywords.iter().any(|k| label.contains(k.as_str()))
        {
            return Verdict::Safe;
        }
        Verdict::Unknown
    }
}

/// Model vocabularies disagree on separators and casing; fold both before
/// keyword containment.
fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace('_', "-")
}

/// One classified detection.
#[derive(Clone, Debug)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
    pub verdict: Verdict,
}

/// Classification summary for one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameAnalysis {
    pub detections: Vec<Detection>,
    pub violation_count: usize,
    pub safe_count: usize,
}

impl FrameAnalysis {
    pub fn has_violation(&self) -> bool {
        self.violation_count > 0
    }

    /// Frame-level verdict. A frame with any violation detection is a
    /// violation, regardless of co-occurring safe detections; a frame with
    /// no detections at all is unknown.
    pub fn verdict(&self) -> Verdict {
        if self.violation_count > 0 {
            Verdict::Violation
        } else if self.safe_count > 0 {
            Verdict::Safe
        } else {
            Verdict::Unknown
        }
    }
}

/// Detector adapter: one backend call plus classification.
///
/// The backend is shared behind a mutex because `detect` takes `&mut self`
/// and the analyzer is cloned into the inference thread.
#[derive(Clone)]
pub struct Analyzer {
    backend: Arc<Mutex<Box<dyn DetectorBackend>>>,
    config: ClassifyConfig,
}

impl Analyzer {
    pub fn new(backend: Box<dyn DetectorBackend>, config: ClassifyConfig) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            config,
        }
    }

    pub fn config(&self) -> &ClassifyConfig {
        &self.config
    }

    /// Run the backend on `frame` and classify every detection.
    ///
    /// Pure with respect to the frame: no state is carried between calls
    /// beyond whatever the backend itself holds.
    pub fn analyze(&self, frame: &Frame) -> Result<FrameAnalysis> {
        let raw = {
            let mut backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
            let raw = backend.detect(
                &frame.pixels,
                frame.width,
                frame.height,
                self.config.violation_threshold,
            )?;
            raw.into_iter()
                .map(|d| {
                    let label = backend
                        .label(d.class_id)
                        .unwrap_or("unknown")
                        .to_string();
                    (d, label)
                })
                .collect::<Vec<_>>()
        };

        let mut analysis = FrameAnalysis::default();
        for (d, label) in raw {
            let verdict = self.config.classify(&label, d.confidence);
            match verdict {
                Verdict::Violation => analysis.violation_count += 1,
                Verdict::Safe => analysis.safe_count += 1,
                Verdict::Unknown => {}
            }
            analysis.detections.push(Detection {
                bbox: d.bbox,
                label,
                confidence: d.confidence,
                verdict,
            });
        }
        Ok(analysis)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
