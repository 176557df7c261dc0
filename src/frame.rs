use crate::error::DeviceError;
use image::codecs::jpeg::JpegEncoder;
use std::sync::Arc;
use std::time::SystemTime;

/// Byte length of a packed RGB24 frame, computed without u32 overflow
pub fn rgb24_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// One packed RGB24 frame as delivered by a capture source
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw RGB24 pixels (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    pub fn expected_size(&self) -> usize {
        rgb24_len(self.width, self.height)
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Encode the frame as JPEG at its own dimensions
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, DeviceError> {
        if !self.validate_size() {
            return Err(DeviceError::Encoding {
                details: format!(
                    "frame {} has {} bytes, expected {} for {}x{} RGB24",
                    self.id,
                    self.data.len(),
                    self.expected_size(),
                    self.width,
                    self.height
                ),
            });
        }

        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode(&self.data, self.width, self.height, image::ColorType::Rgb8)
            .map_err(|e| DeviceError::Encoding {
                details: e.to_string(),
            })?;

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_validation() {
        let valid = FrameData::new(1, SystemTime::now(), vec![0u8; 64 * 48 * 3], 64, 48);
        assert!(valid.validate_size());

        let invalid = FrameData::new(2, SystemTime::now(), vec![0u8; 100], 64, 48);
        assert!(!invalid.validate_size());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rgb24_len_does_not_wrap_large_resolutions() {
        // 40000 * 40000 * 3 is past u32::MAX
        assert_eq!(rgb24_len(40_000, 40_000), 4_800_000_000);
        assert_eq!(rgb24_len(640, 480), 921_600);
        assert_eq!(rgb24_len(0, 480), 0);
    }

    #[test]
    fn test_rgb_frame_encodes_to_jpeg() {
        let frame = FrameData::new(1, SystemTime::now(), vec![128u8; 32 * 24 * 3], 32, 24);

        let jpeg = frame.encode_jpeg(80).unwrap();

        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_short_rgb_frame_is_rejected() {
        let frame = FrameData::new(9, SystemTime::now(), vec![0u8; 10], 32, 24);

        assert!(matches!(
            frame.encode_jpeg(80),
            Err(DeviceError::Encoding { .. })
        ));
    }
}
