use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// An encoded still frame, ready to go on the wire as a JPEG data URL.
///
/// Immutable once built. Cloning shares the encoded text.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data_url: Arc<str>,
    width: u32,
    height: u32,
}

impl ImagePayload {
    pub fn from_jpeg(jpeg: &[u8], width: u32, height: u32) -> Self {
        let mut data_url = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        data_url.push_str(JPEG_DATA_URL_PREFIX);
        STANDARD.encode_string(jpeg, &mut data_url);

        Self {
            data_url: data_url.into(),
            width,
            height,
        }
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Length of the encoded text in bytes
    pub fn encoded_len(&self) -> usize {
        self.data_url.len()
    }

    /// Decode back to the JPEG bytes
    pub fn to_jpeg(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let encoded = self
            .data_url
            .strip_prefix(JPEG_DATA_URL_PREFIX)
            .unwrap_or(&self.data_url);
        STANDARD.decode(encoded)
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("encoded_len", &self.encoded_len())
            .finish()
    }
}

impl Serialize for ImagePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.data_url)
    }
}
