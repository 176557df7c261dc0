pub mod app;
pub mod channel;
pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod frame;
pub mod media;
pub mod presenter;
pub mod workflow;

pub use app::{AttendanceClient, ShutdownReason};
pub use channel::{ChannelClient, ConnectionStatus, Connector, DuplexConnector, TcpConnector};
pub use config::RollcamConfig;
pub use error::{Result, RollcamError};
pub use events::{AppEvent, EventBus, EventReceiver, UserAction};
pub use media::{CaptureDevice, MediaCapture, PreviewTarget, SyntheticCamera};
pub use presenter::{MemorySurface, Presenter, Surface, TerminalSurface};
