use super::device::{CaptureConstraints, CaptureDevice, FrameSource};
use crate::error::DeviceError;
use crate::frame::{rgb24_len, FrameData};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace};

/// Camera that generates frames instead of reading hardware.
///
/// Frames come out at the camera's native resolution regardless of the
/// ideal size asked for, the way a real device may ignore a hint.
pub struct SyntheticCamera {
    name: String,
    resolution: (u32, u32),
    failure: Mutex<Option<DeviceError>>,
    frame_counter: Arc<AtomicU64>,
    active_streams: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    pub fn new(resolution: (u32, u32)) -> Self {
        Self {
            name: "synthetic".to_string(),
            resolution,
            failure: Mutex::new(None),
            frame_counter: Arc::new(AtomicU64::new(0)),
            active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every following `open` fail with `error` (None clears it)
    pub fn set_failure(&self, error: Option<DeviceError>) {
        *self.failure.lock() = error;
    }

    /// Streams opened and not yet stopped
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }

    pub fn frames_generated(&self) -> u64 {
        self.frame_counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCamera {
    async fn open(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn FrameSource>, DeviceError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        debug!(
            "Synthetic camera opened at {}x{} (ideal {}x{})",
            self.resolution.0, self.resolution.1, constraints.ideal_width, constraints.ideal_height
        );
        self.active_streams.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SyntheticSource {
            width: self.resolution.0,
            height: self.resolution.1,
            frame_counter: Arc::clone(&self.frame_counter),
            active_streams: Arc::clone(&self.active_streams),
            stopped: false,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct SyntheticSource {
    width: u32,
    height: u32,
    frame_counter: Arc<AtomicU64>,
    active_streams: Arc<AtomicUsize>,
    stopped: bool,
}

impl FrameSource for SyntheticSource {
    fn grab(&mut self) -> Result<FrameData, DeviceError> {
        if self.stopped {
            return Err(DeviceError::NoActiveSession);
        }

        let frame_id = self.frame_counter.fetch_add(1, Ordering::SeqCst);
        let mut data = vec![0u8; rgb24_len(self.width, self.height)];

        // Diagonal gradient that shifts with every frame
        let shift = (frame_id % 256) as usize;
        let width = (self.width as usize).max(1);
        for (i, chunk) in data.chunks_mut(3).enumerate() {
            let x = i % width;
            let y = i / width;
            chunk[0] = ((x + shift) % 256) as u8;
            chunk[1] = ((y + shift) % 256) as u8;
            chunk[2] = (255 - shift) as u8;
        }

        trace!("Generated synthetic frame {} ({}x{})", frame_id, self.width, self.height);

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            self.width,
            self.height,
        ))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.active_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}
