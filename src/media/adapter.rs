use super::device::{CaptureConstraints, CaptureDevice};
use super::payload::ImagePayload;
use super::session::{CaptureSession, PreviewTarget};
use crate::error::DeviceError;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Acquires camera sessions and turns their current frame into payloads
#[derive(Clone)]
pub struct MediaCapture {
    device: Arc<dyn CaptureDevice>,
    jpeg_quality: u8,
}

impl MediaCapture {
    pub fn new(device: Arc<dyn CaptureDevice>, jpeg_quality: u8) -> Self {
        Self {
            device,
            jpeg_quality,
        }
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Open a stream for `target`. A refused or missing device comes back as
    /// an error for the caller to show; nothing here is fatal.
    pub async fn acquire(
        &self,
        target: PreviewTarget,
        constraints: CaptureConstraints,
    ) -> Result<CaptureSession, DeviceError> {
        debug!(
            "Acquiring {} for {} (facing {:?}, ideal {}x{})",
            self.device.name(),
            target,
            constraints.facing,
            constraints.ideal_width,
            constraints.ideal_height
        );

        match self.device.open(constraints).await {
            Ok(source) => {
                let session = CaptureSession::new(target, self.device.name().to_string(), source);
                info!("Camera session {} started for {}", session.id(), target);
                Ok(session)
            }
            Err(e) => {
                warn!("Could not acquire {} for {}: {}", self.device.name(), target, e);
                Err(e)
            }
        }
    }

    /// Grab the live frame now and encode it at the frame's own size
    pub fn snapshot(&self, session: &mut CaptureSession) -> Result<ImagePayload, DeviceError> {
        let frame = session.grab()?;
        let jpeg = frame.encode_jpeg(self.jpeg_quality)?;
        let payload = ImagePayload::from_jpeg(&jpeg, frame.width, frame.height);

        trace!(
            "Snapshot from frame {} ({}x{}, {}ms old): {} bytes encoded",
            frame.id,
            frame.width,
            frame.height,
            frame.age_ms(),
            payload.encoded_len()
        );

        Ok(payload)
    }

    /// Release whatever session is in the slot. Safe on an empty slot or an
    /// already released session.
    pub fn release(&self, slot: &mut Option<CaptureSession>) {
        if let Some(mut session) = slot.take() {
            session.release();
        }
    }
}
