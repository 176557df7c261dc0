use crate::channel::ChannelClient;
use crate::config::RollcamConfig;
use crate::events::{EventBus, EventReceiver};
use crate::media::{CaptureConstraints, CaptureDevice, CaptureSession, MediaCapture, PreviewTarget};
use crate::presenter::{ControlsView, Presenter, Surface};
use crate::workflow::{CorrelationSequence, EnrollmentWorkflow, RecognitionWorkflow, RecordsViewer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Controller that owns the workflows and carries out their effects.
///
/// All workflow state lives here and is only touched from the event loop,
/// one event at a time. Background tasks communicate by publishing events.
pub struct AttendanceClient<S: Surface> {
    pub(super) config: RollcamConfig,
    pub(super) event_bus: EventBus,
    pub(super) events: Option<EventReceiver>,
    pub(super) media: MediaCapture,
    pub(super) constraints: CaptureConstraints,
    pub(super) channel: ChannelClient,
    pub(super) presenter: Presenter<S>,

    // Workflows
    pub(super) recognition: RecognitionWorkflow,
    pub(super) enrollment: EnrollmentWorkflow,
    pub(super) records: RecordsViewer,

    // One camera session per preview, never shared
    pub(super) recognition_session: Option<CaptureSession>,
    pub(super) enrollment_session: Option<CaptureSession>,

    pub(super) cancellation_token: CancellationToken,
}

impl<S: Surface> AttendanceClient<S> {
    pub fn new(config: RollcamConfig, device: Arc<dyn CaptureDevice>, surface: S) -> Self {
        let (event_bus, events) = EventBus::new();
        let sequence = CorrelationSequence::new();

        Self {
            media: MediaCapture::new(device, config.camera.jpeg_quality),
            constraints: CaptureConstraints::from(&config.camera),
            channel: ChannelClient::from_config(&config.channel),
            presenter: Presenter::new(surface),
            recognition: RecognitionWorkflow::new(
                config.workflow.recognition_guard(),
                sequence.clone(),
            ),
            enrollment: EnrollmentWorkflow::new(&config.workflow, sequence.clone()),
            records: RecordsViewer::new(sequence),
            recognition_session: None,
            enrollment_session: None,
            cancellation_token: CancellationToken::new(),
            config,
            event_bus,
            events: Some(events),
        }
    }

    /// Handle for producers outside the controller (console, tests)
    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn config(&self) -> &RollcamConfig {
        &self.config
    }

    pub fn channel(&self) -> &ChannelClient {
        &self.channel
    }

    pub fn presenter(&self) -> &Presenter<S> {
        &self.presenter
    }

    pub fn controls(&self) -> ControlsView {
        ControlsView {
            recognition: self.recognition.controls(),
            enrollment: self.enrollment.controls(),
        }
    }

    pub(super) fn session_slot(&mut self, target: PreviewTarget) -> &mut Option<CaptureSession> {
        match target {
            PreviewTarget::Recognition => &mut self.recognition_session,
            PreviewTarget::Enrollment => &mut self.enrollment_session,
        }
    }

    pub(super) fn expects_camera(&self, target: PreviewTarget) -> bool {
        match target {
            PreviewTarget::Recognition => self.recognition.expects_camera(),
            PreviewTarget::Enrollment => self.enrollment.expects_camera(),
        }
    }
}
