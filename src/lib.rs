//! helmet-sentinel
//!
//! Real-time monitoring of a video source for safety-equipment violations:
//! missing helmets are detected, the live stream is annotated, and throttled
//! evidence uploads feed an in-memory violation log.
//!
//! # Architecture
//!
//! Three independently-timed loops share state through two single-slot frame
//! cells and one signal channel:
//!
//! ```text
//! source → capture loop → raw cell → inference loop → processed cell
//!                                        │                   │
//!                                 violation signals     stream output
//!                                        │               (viewers)
//!                                   dispatcher → throttle → upload → log
//! ```
//!
//! The cells hold only the newest frame (overwrite wins), so a slow consumer
//! can never back up a producer; the violation log is the only ordered state
//! and has a single-writer mutex.
//!
//! # Module Structure
//!
//! - `frame`: `Frame`, `FrameCell` (latest-frame sharing primitive)
//! - `ingest`: frame sources (synthetic stub, gstreamer live sources)
//! - `detect`: detector backends and keyword classification
//! - `annotate`: bounding-box overlays for the processed stream
//! - `pipeline`: the capture/inference loops and their lifecycle
//! - `throttle`: evidence-rate gating
//! - `evidence`: sinks, dispatch, and the violation log
//! - `stream`: freshest-frame reads for the live transport
//! - `api`: the HTTP surface (log queries, MJPEG stream)

pub mod annotate;
pub mod api;
pub mod config;
pub mod detect;
pub mod evidence;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod stream;
pub mod throttle;

pub use config::SentineldConfig;
pub use detect::{
    select_backend, Analyzer, BackendConfig, BoundingBox, ClassifyConfig, Detection,
    DetectorBackend, FrameAnalysis, RawDetection, StubBackend, Verdict,
};
pub use evidence::{
    sink::open_sink, EvidenceEvent, EvidenceSink, HttpEvidenceSink, MemoryEvidenceSink,
    ViolationLog, DEFAULT_LOG_LIMIT,
};
pub use frame::{Frame, FrameCell};
pub use ingest::{open_source, FrameRead, FrameSource, SourceConfig, SyntheticSource};
pub use pipeline::{pace_for_fps, Pipeline, PipelineConfig};
pub use stream::StreamOutput;
pub use throttle::{ThrottleConfig, ThrottleMode, ViolationThrottler};
