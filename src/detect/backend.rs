use anyhow::{anyhow, Result};

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One detection as reported by a backend, before classification.
///
/// `class_id` indexes the backend's label vocabulary; the adapter resolves it
/// to a name via [`DetectorBackend::label`].
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub confidence: f32,
}

/// Object-detector backend trait.
///
/// Implementations wrap one external model and normalize its output into
/// `RawDetection`s. They must:
/// - treat the pixel slice as read-only and ephemeral
/// - filter out detections below `confidence_floor`
/// - return an empty list (not an error) when nothing is detected
///
/// A backend error is a per-call failure; callers treat it as transient and
/// keep the pipeline running.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one RGB24 frame.
    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        confidence_floor: f32,
    ) -> Result<Vec<RawDetection>>;

    /// Class-id → label lookup from the model vocabulary.
    fn label(&self, class_id: usize) -> Option<&str>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Backend construction settings, from the daemon config.
#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    /// Local model file path (tract backend only).
    pub model_path: Option<String>,
    /// Expected frame width/height (tract backend input shape).
    pub width: u32,
    pub height: u32,
}

/// Resolve a backend by name.
///
/// `stub` is always available. `tract` requires the `backend-tract` feature
/// and a configured model path; asking for either without its prerequisite is
/// a startup configuration error, not a runtime one.
pub fn select_backend(name: &str, config: &BackendConfig) -> Result<Box<dyn DetectorBackend>> {
    match name {
        "stub" => Ok(Box::new(super::backends::StubBackend::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let path = config
                .model_path
                .as_deref()
                .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
            let backend = super::backends::TractBackend::new(path, config.width, config.height)?;
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => {
            let _ = config;
            Err(anyhow!("tract backend requires the backend-tract feature"))
        }
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}
