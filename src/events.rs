use crate::channel::{ConnectionStatus, CorrelationId, InboundMessage};
use crate::error::{DeviceError, EventBusError};
use crate::media::{CaptureSession, PreviewTarget};
use crate::workflow::{IdentityField, WorkflowKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Operator actions, one per control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    StartRecognition,
    CaptureRecognition,
    StopRecognition,
    StartEnrollment,
    CaptureEnrollment,
    ClearEnrollment,
    SetField(IdentityField, String),
    SubmitEnrollment,
    RefreshRecords,
    ShowStatus,
}

impl UserAction {
    pub fn name(&self) -> &'static str {
        match self {
            UserAction::StartRecognition => "start_recognition",
            UserAction::CaptureRecognition => "capture_recognition",
            UserAction::StopRecognition => "stop_recognition",
            UserAction::StartEnrollment => "start_enrollment",
            UserAction::CaptureEnrollment => "capture_enrollment",
            UserAction::ClearEnrollment => "clear_enrollment",
            UserAction::SetField(..) => "set_field",
            UserAction::SubmitEnrollment => "submit_enrollment",
            UserAction::RefreshRecords => "refresh_records",
            UserAction::ShowStatus => "show_status",
        }
    }
}

/// Everything the controller reacts to. Producers are the console, the
/// channel handlers, camera acquisition tasks, guard timers and signals.
#[derive(Debug)]
pub enum AppEvent {
    User(UserAction),
    CameraAcquired {
        target: PreviewTarget,
        session: CaptureSession,
    },
    CameraFailed {
        target: PreviewTarget,
        error: DeviceError,
    },
    GuardExpired {
        workflow: WorkflowKind,
        correlation: CorrelationId,
    },
    Inbound {
        correlation: Option<CorrelationId>,
        message: InboundMessage,
    },
    ConnectionChanged(ConnectionStatus),
    ShutdownRequested {
        reason: String,
    },
}

impl AppEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            AppEvent::User(action) => format!("User action {}", action.name()),
            AppEvent::CameraAcquired { target, session } => {
                format!("Camera {} acquired for {}", session.id(), target)
            }
            AppEvent::CameraFailed { target, error } => {
                format!("Camera for {} failed: {}", target, error)
            }
            AppEvent::GuardExpired {
                workflow,
                correlation,
            } => format!("Guard for {} {} expired", workflow, correlation),
            AppEvent::Inbound {
                correlation,
                message,
            } => match correlation {
                Some(id) => format!("Inbound {} {}", message.name(), id),
                None => format!("Inbound {} (untagged)", message.name()),
            },
            AppEvent::ConnectionChanged(status) => format!("Connection {:?}", status),
            AppEvent::ShutdownRequested { reason } => format!("Shutdown requested: {}", reason),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            AppEvent::User(_) => "user_action",
            AppEvent::CameraAcquired { .. } => "camera_acquired",
            AppEvent::CameraFailed { .. } => "camera_failed",
            AppEvent::GuardExpired { .. } => "guard_expired",
            AppEvent::Inbound { .. } => "inbound",
            AppEvent::ConnectionChanged(_) => "connection_changed",
            AppEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Many-producer, single-consumer queue feeding the controller. Events are
/// processed one at a time in arrival order.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<AppEvent>,
    debug_logging: bool,
}

pub struct EventReceiver {
    receiver: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventBus {
    pub fn new() -> (Self, EventReceiver) {
        Self::build(false)
    }

    pub fn with_debug_logging() -> (Self, EventReceiver) {
        Self::build(true)
    }

    fn build(debug_logging: bool) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                debug_logging,
            },
            EventReceiver { receiver },
        )
    }

    pub fn publish(&self, event: AppEvent) -> Result<(), EventBusError> {
        match &event {
            AppEvent::CameraFailed { target, error } => {
                warn!("Camera for {} failed: {}", target, error);
            }
            AppEvent::ConnectionChanged(status) => match status {
                ConnectionStatus::Connected => info!("Recognition service connected"),
                ConnectionStatus::Disconnected => warn!("Recognition service disconnected"),
            },
            AppEvent::ShutdownRequested { reason } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender.send(event).map_err(|e| EventBusError::PublishFailed {
            details: format!("{} dropped: receiver closed", e.0.event_type()),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<AppEvent, EventBusError> {
        self.receiver.recv().await.ok_or(EventBusError::ChannelClosed)
    }

    pub fn try_recv(&mut self) -> Result<Option<AppEvent>, EventBusError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(EventBusError::ChannelClosed),
        }
    }
}
