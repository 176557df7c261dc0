use super::device::{CaptureConstraints, CaptureDevice, FrameSource};
use crate::config::CameraConfig;
use crate::error::DeviceError;
use crate::frame::FrameData;
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

/// Upper bound on a single snapshot pull. Grabs run on the controller task, so
/// this also bounds how long a stalled camera holds up event handling.
const SNAPSHOT_PULL_TIMEOUT_MS: u64 = 250;

/// Video4Linux camera read through a GStreamer pipeline
pub struct V4l2Camera {
    name: String,
    index: u32,
    frame_counter: Arc<AtomicU64>,
}

impl V4l2Camera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            name: format!("/dev/video{}", config.index),
            index: config.index,
            frame_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build the pipeline string. The appsink keeps only the newest frame so
    /// a grab never sees a stale buffer.
    fn build_pipeline_string(&self, constraints: &CaptureConstraints) -> String {
        format!(
            "v4l2src device=/dev/video{} ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width=[1,{}],height=[1,{}] ! \
             appsink name=sink max-buffers=1 drop=true sync=false emit-signals=false",
            self.index,
            constraints.ideal_width.max(1),
            constraints.ideal_height.max(1)
        )
    }

    fn unavailable(&self, details: String) -> DeviceError {
        DeviceError::Unavailable {
            device: self.name.clone(),
            details,
        }
    }
}

#[async_trait]
impl CaptureDevice for V4l2Camera {
    async fn open(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn FrameSource>, DeviceError> {
        gstreamer::init().map_err(|e| self.unavailable(format!("GStreamer init failed: {}", e)))?;

        if constraints.facing != crate::config::Facing::User {
            debug!("Facing {:?} has no meaning for v4l2 devices; ignoring", constraints.facing);
        }

        let pipeline_desc = self.build_pipeline_string(&constraints);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| self.unavailable(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| self.unavailable("Failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| self.unavailable("Pipeline has no appsink".to_string()))?
            .downcast::<AppSink>()
            .map_err(|_| self.unavailable("Failed to downcast to AppSink".to_string()))?;

        let name = self.name.clone();
        let started = pipeline.clone();
        // Starting the pipeline blocks until the device negotiates
        let start_result = tokio::task::spawn_blocking(move || {
            started.set_state(gstreamer::State::Playing)?;
            let (result, _, _) = started.state(gstreamer::ClockTime::from_seconds(5));
            result.map(|_| ())
        })
        .await
        .map_err(|e| self.unavailable(format!("Pipeline start task failed: {}", e)))?;

        if let Err(e) = start_result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(self.unavailable(format!("Failed to start pipeline: {}", e)));
        }

        info!("GStreamer pipeline for {} is playing", name);

        Ok(Box::new(GstSource {
            pipeline,
            appsink,
            frame_counter: Arc::clone(&self.frame_counter),
            stopped: false,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct GstSource {
    pipeline: Pipeline,
    appsink: AppSink,
    frame_counter: Arc<AtomicU64>,
    stopped: bool,
}

impl FrameSource for GstSource {
    fn grab(&mut self) -> Result<FrameData, DeviceError> {
        if self.stopped {
            return Err(DeviceError::NoActiveSession);
        }

        let sample = self
            .appsink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(SNAPSHOT_PULL_TIMEOUT_MS))
            .ok_or_else(|| DeviceError::Capture {
                details: format!("No frame from camera within {}ms", SNAPSHOT_PULL_TIMEOUT_MS),
            })?;

        let buffer = sample.buffer().ok_or_else(|| DeviceError::Capture {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| DeviceError::Capture {
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| DeviceError::Capture {
            details: format!("Failed to get video info: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        let map = buffer.map_readable().map_err(|e| DeviceError::Capture {
            details: format!("Failed to map buffer: {}", e),
        })?;

        // Rows may be padded; copy out the visible pixels only
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in map.as_slice().chunks(stride).take(height as usize) {
            if row.len() < row_bytes {
                return Err(DeviceError::Capture {
                    details: format!("Short row: {} < {} bytes", row.len(), row_bytes),
                });
            }
            data.extend_from_slice(&row[..row_bytes]);
        }

        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        trace!("Captured RGB frame {} ({}x{})", frame_id, width, height);

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
        ))
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline: {}", e);
        }
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        self.stop();
    }
}
