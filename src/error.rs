use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera error: {0}")]
    Device(#[from] DeviceError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },
}

impl RollcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Camera acquisition and snapshot failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Camera {device} unavailable: {details}")]
    Unavailable { device: String, details: String },

    #[error("Permission denied for camera {device}")]
    PermissionDenied { device: String },

    #[error("No active capture session")]
    NoActiveSession,

    #[error("Frame capture failed: {details}")]
    Capture { details: String },

    #[error("Frame encoding failed: {details}")]
    Encoding { details: String },
}

/// Local checks that run before anything is sent. The display text is shown
/// to the operator as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Maximum {max} images allowed")]
    GalleryFull { max: usize },

    #[error("Please capture at least {need} images")]
    InsufficientImages { have: usize, need: usize },

    #[error("Please fill in all fields (missing: {})", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Not connected to the recognition service")]
    NotConnected,

    #[error("Failed to connect to {address}: {details}")]
    Connect { address: String, details: String },

    #[error("Malformed message: {details}")]
    Malformed { details: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, RollcamError>;
