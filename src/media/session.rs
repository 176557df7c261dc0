use super::device::FrameSource;
use crate::error::DeviceError;
use crate::frame::FrameData;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Where a session's live preview is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewTarget {
    Recognition,
    Enrollment,
}

impl fmt::Display for PreviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewTarget::Recognition => write!(f, "recognition-preview"),
            PreviewTarget::Enrollment => write!(f, "enrollment-preview"),
        }
    }
}

/// An active camera acquisition. Owns its stream exclusively; the stream
/// is stopped on `release` or when the session is dropped.
pub struct CaptureSession {
    id: Uuid,
    target: PreviewTarget,
    device: String,
    started_at: DateTime<Utc>,
    source: Option<Box<dyn FrameSource>>,
}

impl CaptureSession {
    pub(crate) fn new(target: PreviewTarget, device: String, source: Box<dyn FrameSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            device,
            started_at: Utc::now(),
            source: Some(source),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> PreviewTarget {
        self.target
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub(crate) fn grab(&mut self) -> Result<FrameData, DeviceError> {
        match self.source.as_mut() {
            Some(source) => source.grab(),
            None => Err(DeviceError::NoActiveSession),
        }
    }

    /// Stop the stream and drop the handle. Returns false if it was already released.
    pub fn release(&mut self) -> bool {
        match self.source.take() {
            Some(mut source) => {
                source.stop();
                let held = Utc::now().signed_duration_since(self.started_at);
                info!(
                    "Released {} session {} on {} after {}ms",
                    self.target,
                    self.id,
                    self.device,
                    held.num_milliseconds()
                );
                true
            }
            None => {
                debug!("Session {} already released", self.id);
                false
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("device", &self.device)
            .field("started_at", &self.started_at)
            .field("active", &self.is_active())
            .finish()
    }
}
