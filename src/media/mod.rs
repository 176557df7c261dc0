mod adapter;
mod device;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
mod payload;
mod session;
mod synthetic;
#[cfg(test)]
mod tests;

pub use adapter::MediaCapture;
pub use device::{CaptureConstraints, CaptureDevice, FrameSource};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::V4l2Camera;
pub use payload::ImagePayload;
pub use session::{CaptureSession, PreviewTarget};
pub use synthetic::SyntheticCamera;
