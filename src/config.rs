use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RollcamConfig {
    pub camera: CameraConfig,
    pub channel: ChannelConfig,
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Which way the camera should face, when the device can choose
    #[serde(default)]
    pub facing: Facing,

    /// Preferred capture resolution (width, height). A hint, not a requirement.
    #[serde(default = "default_ideal_resolution")]
    pub ideal_resolution: (u32, u32),

    /// JPEG quality for snapshots (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Frame source implementation
    #[serde(default)]
    pub backend: CameraBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Recognition service host
    #[serde(default = "default_channel_host")]
    pub host: String,

    /// Recognition service port
    #[serde(default = "default_channel_port")]
    pub port: u16,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Largest accepted frame on the wire, in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Guard interval before the recognition capture control re-enables
    #[serde(default = "default_recognition_guard_ms")]
    pub recognition_guard_ms: u64,

    /// Guard interval before the enrollment submit control re-enables
    #[serde(default = "default_enrollment_guard_ms")]
    pub enrollment_guard_ms: u64,

    /// Images needed before an enrollment can be submitted
    #[serde(default = "default_min_enrollment_images")]
    pub min_enrollment_images: usize,

    /// Gallery capacity for one enrollment
    #[serde(default = "default_max_enrollment_images")]
    pub max_enrollment_images: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    User,
    Environment,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Generated frames, no hardware needed
    #[default]
    Synthetic,
    /// Video4Linux device through GStreamer (requires the `camera` feature)
    V4l2,
}

impl ChannelConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Fewest gallery images an enrollment may be configured to require
pub const ENROLLMENT_IMAGES_FLOOR: usize = 5;
/// Largest gallery an enrollment may be configured to hold
pub const ENROLLMENT_IMAGES_CAP: usize = 10;

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            recognition_guard_ms: default_recognition_guard_ms(),
            enrollment_guard_ms: default_enrollment_guard_ms(),
            min_enrollment_images: default_min_enrollment_images(),
            max_enrollment_images: default_max_enrollment_images(),
        }
    }
}

impl WorkflowConfig {
    pub fn recognition_guard(&self) -> Duration {
        Duration::from_millis(self.recognition_guard_ms)
    }

    pub fn enrollment_guard(&self) -> Duration {
        Duration::from_millis(self.enrollment_guard_ms)
    }
}

impl RollcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("rollcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default("camera.facing", "user")?
            .set_default(
                "camera.ideal_resolution",
                vec![default_ideal_resolution().0, default_ideal_resolution().1],
            )?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("camera.backend", "synthetic")?
            .set_default("channel.host", default_channel_host())?
            .set_default("channel.port", default_channel_port())?
            .set_default("channel.reconnect_base_ms", default_reconnect_base_ms())?
            .set_default("channel.reconnect_max_ms", default_reconnect_max_ms())?
            .set_default("channel.max_frame_bytes", default_max_frame_bytes() as i64)?
            .set_default(
                "workflow.recognition_guard_ms",
                default_recognition_guard_ms(),
            )?
            .set_default(
                "workflow.enrollment_guard_ms",
                default_enrollment_guard_ms(),
            )?
            .set_default(
                "workflow.min_enrollment_images",
                default_min_enrollment_images() as i64,
            )?
            .set_default(
                "workflow.max_enrollment_images",
                default_max_enrollment_images() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with ROLLCAM_ prefix
            .add_source(Environment::with_prefix("ROLLCAM").separator("__"))
            .build()?;

        let config: RollcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.ideal_resolution.0 == 0 || self.camera.ideal_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera ideal_resolution must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(ConfigError::Message(
                "Camera jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.channel.port == 0 {
            return Err(ConfigError::Message(
                "Channel port must be greater than 0".to_string(),
            ));
        }

        if self.channel.reconnect_base_ms == 0
            || self.channel.reconnect_base_ms > self.channel.reconnect_max_ms
        {
            return Err(ConfigError::Message(
                "Channel reconnect_base_ms must be > 0 and <= reconnect_max_ms".to_string(),
            ));
        }

        if self.channel.max_frame_bytes == 0 {
            return Err(ConfigError::Message(
                "Channel max_frame_bytes must be greater than 0".to_string(),
            ));
        }

        if self.workflow.recognition_guard_ms == 0 || self.workflow.enrollment_guard_ms == 0 {
            return Err(ConfigError::Message(
                "Workflow guard intervals must be greater than 0".to_string(),
            ));
        }

        if self.workflow.min_enrollment_images < ENROLLMENT_IMAGES_FLOOR {
            return Err(ConfigError::Message(format!(
                "Workflow min_enrollment_images must be at least {}",
                ENROLLMENT_IMAGES_FLOOR
            )));
        }

        if self.workflow.max_enrollment_images > ENROLLMENT_IMAGES_CAP {
            return Err(ConfigError::Message(format!(
                "Workflow max_enrollment_images must not exceed {}",
                ENROLLMENT_IMAGES_CAP
            )));
        }

        if self.workflow.min_enrollment_images > self.workflow.max_enrollment_images {
            return Err(ConfigError::Message(
                "Workflow min_enrollment_images must not exceed max_enrollment_images"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RollcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                facing: Facing::default(),
                ideal_resolution: default_ideal_resolution(),
                jpeg_quality: default_jpeg_quality(),
                backend: CameraBackend::default(),
            },
            channel: ChannelConfig {
                host: default_channel_host(),
                port: default_channel_port(),
                reconnect_base_ms: default_reconnect_base_ms(),
                reconnect_max_ms: default_reconnect_max_ms(),
                max_frame_bytes: default_max_frame_bytes(),
            },
            workflow: WorkflowConfig::default(),
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_ideal_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_jpeg_quality() -> u8 {
    80
}

fn default_channel_host() -> String {
    "127.0.0.1".to_string()
}
fn default_channel_port() -> u16 {
    5000
}
fn default_reconnect_base_ms() -> u64 {
    500
}
fn default_reconnect_max_ms() -> u64 {
    10_000
}
fn default_max_frame_bytes() -> usize {
    100_000_000
}

fn default_recognition_guard_ms() -> u64 {
    2000
}
fn default_enrollment_guard_ms() -> u64 {
    5000
}
fn default_min_enrollment_images() -> usize {
    5
}
fn default_max_enrollment_images() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RollcamConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.workflow.recognition_guard(), Duration::from_secs(2));
        assert_eq!(config.workflow.enrollment_guard(), Duration::from_secs(5));
        assert_eq!(config.workflow.min_enrollment_images, 5);
        assert_eq!(config.workflow.max_enrollment_images, 10);
        assert_eq!(config.channel.address(), "127.0.0.1:5000");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[camera]
facing = "environment"
jpeg_quality = 60

[channel]
host = "10.0.0.7"
port = 5050
"#
        )
        .unwrap();

        let config = RollcamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.facing, Facing::Environment);
        assert_eq!(config.camera.jpeg_quality, 60);
        assert_eq!(config.camera.ideal_resolution, (640, 480));
        assert_eq!(config.channel.address(), "10.0.0.7:5050");
        assert_eq!(config.workflow.recognition_guard_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RollcamConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, RollcamConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RollcamConfig::default();

        config.workflow.min_enrollment_images = 11;
        assert!(config.validate().is_err());
        config.workflow.min_enrollment_images = 5;

        config.camera.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.camera.jpeg_quality = 80;

        config.workflow.recognition_guard_ms = 0;
        assert!(config.validate().is_err());
        config.workflow.recognition_guard_ms = 2000;

        config.channel.reconnect_base_ms = 20_000;
        assert!(config.validate().is_err());
        config.channel.reconnect_base_ms = 500;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_workflow_default_matches_config_default() {
        let workflow = WorkflowConfig::default();

        assert_eq!(workflow, RollcamConfig::default().workflow);
        assert_eq!(workflow.min_enrollment_images, ENROLLMENT_IMAGES_FLOOR);
        assert_eq!(workflow.max_enrollment_images, ENROLLMENT_IMAGES_CAP);
    }

    #[test]
    fn test_enrollment_image_bounds() {
        let mut config = RollcamConfig::default();

        config.workflow.max_enrollment_images = 12;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_enrollment_images"), "{}", err);
        config.workflow.max_enrollment_images = 10;

        config.workflow.min_enrollment_images = 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("min_enrollment_images"), "{}", err);

        config.workflow.min_enrollment_images = 0;
        assert!(config.validate().is_err());

        // A tighter window inside the bounds is fine
        config.workflow.min_enrollment_images = 6;
        config.workflow.max_enrollment_images = 8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_workflow_overrides_outside_bounds_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[workflow]
max_enrollment_images = 12
"#
        )
        .unwrap();

        let config = RollcamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.workflow.max_enrollment_images, 12);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&RollcamConfig::default()).unwrap();
        let parsed: RollcamConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed, RollcamConfig::default());
    }
}
