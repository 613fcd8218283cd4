mod backend;
mod backends;
pub mod classify;

pub use backend::{select_backend, BackendConfig, BoundingBox, DetectorBackend, RawDetection};
pub use backends::StubBackend;
pub use classify::{Analyzer, ClassifyConfig, Detection, FrameAnalysis, Verdict};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
