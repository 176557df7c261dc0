use crate::config::{CameraConfig, Facing};
use crate::error::DeviceError;
use crate::frame::FrameData;
use async_trait::async_trait;

/// What the caller would like from the camera. Sizes are preferences; the
/// device reports what it actually delivers through each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl CaptureConstraints {
    pub fn new(facing: Facing, ideal_width: u32, ideal_height: u32) -> Self {
        Self {
            facing,
            ideal_width,
            ideal_height,
        }
    }
}

impl From<&CameraConfig> for CaptureConstraints {
    fn from(config: &CameraConfig) -> Self {
        Self::new(
            config.facing,
            config.ideal_resolution.0,
            config.ideal_resolution.1,
        )
    }
}

/// A camera that can hand out live streams
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Open a stream on the device. Fails when the device is missing or
    /// access is refused.
    async fn open(&self, constraints: CaptureConstraints)
        -> Result<Box<dyn FrameSource>, DeviceError>;

    /// Device name for logs and error messages
    fn name(&self) -> &str;
}

/// An open stream owned by exactly one capture session
pub trait FrameSource: Send {
    /// Grab the newest frame. Must not return a frame buffered before the call.
    fn grab(&mut self) -> Result<FrameData, DeviceError>;

    /// Stop the stream. Calling it more than once is a no-op.
    fn stop(&mut self);
}
