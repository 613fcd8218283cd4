#![cfg(feature = "ingest-gstreamer")]

//! GStreamer-backed live source.
//!
//! One `uridecodebin` pipeline covers the descriptor kinds the daemon
//! accepts: `v4l2://` devices, `file://` paths, and resolved rtsp/http
//! stream URLs. Frames come out of an appsink configured for RGB with a
//! single-buffer queue, so a stalled consumer drops frames at the sink
//! instead of building latency.

use anyhow::{anyhow, Context, Result};

use super::{FrameRead, FrameSource, SourceConfig};
use crate::frame::Frame;

pub struct GstreamerSource {
    config: SourceConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    eos: bool,
    closed: bool,
}

impl GstreamerSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline_description = format!(
            "uridecodebin uri={} ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            config.url
        );
        let pipeline = gstreamer::parse_launch(&pipeline_description)
            .context("build source pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("source pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            eos: false,
            closed: false,
        })
    }

    fn frame_timeout(&self) -> gstreamer::ClockTime {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        gstreamer::ClockTime::from_mseconds(base_ms.max(500) as u64)
    }

    fn poll_bus(&mut self) -> Result<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(message) = bus.timed_pop(gstreamer::ClockTime::ZERO) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Err(anyhow!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.eos = true;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl FrameSource for GstreamerSource {
    fn connect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set source pipeline to Playing")?;
        log::info!("GstreamerSource: connected to {}", self.config.url);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<FrameRead> {
        self.poll_bus()?;
        if self.eos {
            return Ok(FrameRead::EndOfStream);
        }

        let sample = match self.appsink.try_pull_sample(self.frame_timeout()) {
            Some(sample) => sample,
            None => {
                // Distinguish a finished stream from a stall.
                self.poll_bus()?;
                if self.eos || self.appsink.is_eos() {
                    return Ok(FrameRead::EndOfStream);
                }
                return Err(anyhow!("source stalled: no frame within timeout"));
            }
        };

        let (pixels, width, height) = sample_to_pixels(&sample)?;
        self.frame_count += 1;

        Ok(FrameRead::Frame(Frame::new(pixels, width, height)))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
                log::warn!("GstreamerSource: failed to tear down pipeline: {}", err);
            }
            log::info!(
                "GstreamerSource: closed {} after {} frames",
                self.config.url,
                self.frame_count
            );
        }
    }

    fn descriptor(&self) -> &str {
        &self.config.url
    }
}

impl Drop for GstreamerSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("sample missing buffer")?;
    let caps = sample.caps().context("sample missing caps")?;
    let info = gstreamer_video::VideoInfo::from_caps(caps).context("parse caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map sample buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).context("buffer row is out of bounds")?);
    }

    Ok((pixels, width, height))
}
