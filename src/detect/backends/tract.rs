#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{BoundingBox, DetectorBackend, RawDetection};

/// Tract-based backend for ONNX object-detection models.
///
/// Loads a local model file and runs inference on RGB frames. The model is
/// expected to emit post-NMS rows of `(x1, y1, x2, y2, score, class_id)`,
/// the layout produced by YOLO-style exports with detection post-processing
/// baked in. No network I/O; no disk writes beyond model loading.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: Vec<String>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let labels = load_labels(model_path)?;

        Ok(Self {
            model,
            labels,
            width,
            height,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        confidence_floor: f32,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let shape = view.shape();
        let row_len = *shape
            .last()
            .ok_or_else(|| anyhow!("model output has no dimensions"))?;
        if row_len < 6 {
            return Err(anyhow!(
                "model output rows have {} columns, expected at least 6 (x1,y1,x2,y2,score,class)",
                row_len
            ));
        }

        let flat: Vec<f32> = view.iter().copied().collect();
        let mut detections = Vec::new();
        for row in flat.chunks_exact(row_len) {
            let confidence = row[4];
            if !confidence.is_finite() || confidence < confidence_floor {
                continue;
            }
            detections.push(RawDetection {
                bbox: BoundingBox {
                    x1: row[0],
                    y1: row[1],
                    x2: row[2],
                    y2: row[3],
                },
                class_id: row[5].max(0.0) as usize,
                confidence,
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        confidence_floor: f32,
    ) -> Result<Vec<RawDetection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs, confidence_floor)
    }

    fn label(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}

/// Load the label vocabulary from `<model>.labels`, one label per line.
///
/// A missing labels file is a startup error: keyword classification is
/// meaningless without label names.
fn load_labels(model_path: &Path) -> Result<Vec<String>> {
    let labels_path = model_path.with_extension("labels");
    let raw = std::fs::read_to_string(&labels_path).with_context(|| {
        format!(
            "failed to read label vocabulary {} (one label per line)",
            labels_path.display()
        )
    })?;
    let labels: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(anyhow!("label vocabulary {} is empty", labels_path.display()));
    }
    Ok(labels)
}
