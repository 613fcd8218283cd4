//! Frame ingestion sources.
//!
//! A source produces decoded frames from one descriptor: a local device, a
//! file, or an already-resolved network stream URL. Sources are responsible
//! for:
//! - decoding frames in-memory into RGB24
//! - stamping capture time
//! - reporting end-of-stream distinctly from transient errors
//! - releasing the underlying handle on `close` and on drop
//!
//! Sources MUST NOT fabricate frames: when the stream ends or the device
//! disappears, they report `EndOfStream` and the capture loop exits. The
//! blank placeholder shown to viewers is the stream output's concern.

pub mod synthetic;

#[cfg(feature = "ingest-gstreamer")]
pub(crate) mod gstreamer;

use anyhow::Result;

use crate::frame::Frame;

pub use synthetic::SyntheticSource;

/// Result of one read from a frame source.
pub enum FrameRead {
    Frame(Frame),
    EndOfStream,
}

/// A connected video source.
///
/// `read_frame` may block on source I/O; the capture loop owns the source
/// exclusively, so no lock is ever held across that call.
pub trait FrameSource: Send {
    /// Open the underlying handle. Must be called before the first read.
    fn connect(&mut self) -> Result<()>;

    /// Decode the next frame, or report end-of-stream.
    fn read_frame(&mut self) -> Result<FrameRead>;

    /// Release the underlying handle. Idempotent; also invoked by drop.
    fn close(&mut self);

    /// Human-readable descriptor, for logs.
    fn descriptor(&self) -> &str;
}

/// Source construction settings.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Source descriptor URL. `stub://` selects the synthetic source.
    pub url: String,
    /// Target frame rate; the capture loop paces itself to this.
    pub target_fps: u32,
    /// Frame width/height (synthetic frames; decode hint otherwise).
    pub width: u32,
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Open a source for the configured descriptor.
///
/// `stub://` is always available. Every other scheme (v4l2 devices, file
/// paths via `file://`, rtsp/http stream URLs) goes through the gstreamer
/// backend and requires the `ingest-gstreamer` feature.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    #[cfg(feature = "ingest-gstreamer")]
    {
        Ok(Box::new(gstreamer::GstreamerSource::new(config)?))
    }
    #[cfg(not(feature = "ingest-gstreamer"))]
    {
        anyhow::bail!(
            "source '{}' requires the ingest-gstreamer feature",
            config.url
        )
    }
}
