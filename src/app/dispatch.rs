use super::types::{ShutdownReason, WorkflowInput};
use super::AttendanceClient;
use crate::channel::{CorrelationId, InboundMessage};
use crate::error::DeviceError;
use crate::events::{AppEvent, UserAction};
use crate::media::PreviewTarget;
use crate::presenter::{render, Surface};
use crate::workflow::{
    Effect, EnrollmentEvent, EnrollmentOutcome, RecognitionEvent, RecognitionOutcome,
    RecordsEvent, RecordsOutcome, WorkflowKind,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

impl<S: Surface> AttendanceClient<S> {
    /// Process one event to completion. Returns a reason when the event asks
    /// the client to stop.
    pub fn handle_event(&mut self, event: AppEvent) -> Option<ShutdownReason> {
        trace!("Handling {}", event.description());

        match event {
            AppEvent::User(action) => self.handle_action(action),

            AppEvent::CameraAcquired { target, mut session } => {
                if self.expects_camera(target) {
                    self.presenter.preview_attached(target, session.device());
                    *self.session_slot(target) = Some(session);
                    self.apply(match target {
                        PreviewTarget::Recognition => {
                            WorkflowInput::Recognition(RecognitionEvent::CameraAcquired)
                        }
                        PreviewTarget::Enrollment => {
                            WorkflowInput::Enrollment(EnrollmentEvent::CameraAcquired)
                        }
                    });
                } else {
                    debug!("{} no longer wants a camera; releasing {}", target, session.id());
                    session.release();
                }
            }

            AppEvent::CameraFailed { target, error } => self.apply(match target {
                PreviewTarget::Recognition => {
                    WorkflowInput::Recognition(RecognitionEvent::CameraFailed(error))
                }
                PreviewTarget::Enrollment => {
                    WorkflowInput::Enrollment(EnrollmentEvent::CameraFailed(error))
                }
            }),

            AppEvent::GuardExpired {
                workflow,
                correlation,
            } => {
                if let Some(input) = WorkflowInput::guard_expired(workflow, correlation) {
                    self.apply(input);
                }
            }

            AppEvent::Inbound {
                correlation,
                message,
            } => self.route_inbound(correlation, message),

            AppEvent::ConnectionChanged(status) => self.presenter.status(status),

            AppEvent::ShutdownRequested { reason } => {
                return Some(ShutdownReason::UserRequest(reason));
            }
        }

        self.render_controls();
        None
    }

    pub(super) fn render_controls(&mut self) {
        let controls = self.controls();
        self.presenter.controls(controls);
    }

    fn handle_action(&mut self, action: UserAction) {
        let input = match action {
            UserAction::StartRecognition => WorkflowInput::Recognition(RecognitionEvent::StartCamera),
            UserAction::CaptureRecognition => WorkflowInput::Recognition(RecognitionEvent::Capture),
            UserAction::StopRecognition => WorkflowInput::Recognition(RecognitionEvent::StopCamera),
            UserAction::StartEnrollment => WorkflowInput::Enrollment(EnrollmentEvent::StartCamera),
            UserAction::CaptureEnrollment => WorkflowInput::Enrollment(EnrollmentEvent::Capture),
            UserAction::ClearEnrollment => WorkflowInput::Enrollment(EnrollmentEvent::Clear),
            UserAction::SetField(field, value) => {
                WorkflowInput::Enrollment(EnrollmentEvent::SetField(field, value))
            }
            UserAction::SubmitEnrollment => WorkflowInput::Enrollment(EnrollmentEvent::Submit),
            UserAction::RefreshRecords => WorkflowInput::Records(RecordsEvent::Refresh),
            UserAction::ShowStatus => {
                info!(
                    "Status: channel {:?}, recognition {:?}, enrollment {:?} ({} images), records {:?}",
                    self.channel.status(),
                    self.recognition.state(),
                    self.enrollment.state(),
                    self.enrollment.gallery_len(),
                    self.records.state()
                );
                self.presenter.refresh();
                return;
            }
        };
        self.apply(input);
    }

    fn route_inbound(
        &mut self,
        correlation: Option<CorrelationId>,
        message: InboundMessage,
    ) {
        let input = match message {
            InboundMessage::ConnectionResponse(handshake) => {
                info!(
                    "Service acknowledged connection: {}",
                    handshake
                        .message
                        .or(handshake.status)
                        .unwrap_or_else(|| "no message".to_string())
                );
                return;
            }
            InboundMessage::RecognitionSuccess(result) | InboundMessage::RecognitionResult(result) => {
                WorkflowInput::Recognition(RecognitionEvent::Response {
                    correlation,
                    outcome: RecognitionOutcome::Matched(result),
                })
            }
            InboundMessage::RecognitionError(error) => {
                WorkflowInput::Recognition(RecognitionEvent::Response {
                    correlation,
                    outcome: RecognitionOutcome::Failed(error.error),
                })
            }
            InboundMessage::RegistrationSuccess(ack) => {
                WorkflowInput::Enrollment(EnrollmentEvent::Response {
                    correlation,
                    outcome: EnrollmentOutcome::Registered(ack),
                })
            }
            InboundMessage::RegistrationError(error) => {
                WorkflowInput::Enrollment(EnrollmentEvent::Response {
                    correlation,
                    outcome: EnrollmentOutcome::Rejected(error.error),
                })
            }
            InboundMessage::AttendanceData(data) => WorkflowInput::Records(RecordsEvent::Response {
                correlation,
                outcome: RecordsOutcome::Delivered(data),
            }),
            // The service only sends a bare error when the attendance query fails
            InboundMessage::Error(error) => WorkflowInput::Records(RecordsEvent::Response {
                correlation,
                outcome: RecordsOutcome::Failed(error.error),
            }),
        };
        self.apply(input);
    }

    /// Run a workflow transition and everything it triggers synchronously
    pub(super) fn apply(&mut self, input: WorkflowInput) {
        let mut queue = VecDeque::from([input]);

        while let Some(input) = queue.pop_front() {
            let effects = match input {
                WorkflowInput::Recognition(event) => self.recognition.handle(event),
                WorkflowInput::Enrollment(event) => self.enrollment.handle(event),
                WorkflowInput::Records(event) => self.records.handle(event),
            };

            for effect in effects {
                if let Some(next) = self.execute(effect) {
                    queue.push_back(next);
                }
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Option<WorkflowInput> {
        match effect {
            Effect::AcquireCamera(target) => {
                self.spawn_acquire(target);
                None
            }

            Effect::ReleaseCamera(target) => {
                let media = self.media.clone();
                let slot = self.session_slot(target);
                let was_active = slot.is_some();
                media.release(slot);
                if was_active {
                    self.presenter.preview_detached(target);
                }
                None
            }

            Effect::Snapshot(target) => {
                let media = self.media.clone();
                let result = match self.session_slot(target).as_mut() {
                    Some(session) => media.snapshot(session),
                    None => Err(DeviceError::NoActiveSession),
                };
                Some(match (target, result) {
                    (PreviewTarget::Recognition, Ok(image)) => {
                        WorkflowInput::Recognition(RecognitionEvent::SnapshotTaken(image))
                    }
                    (PreviewTarget::Recognition, Err(e)) => {
                        WorkflowInput::Recognition(RecognitionEvent::SnapshotFailed(e))
                    }
                    (PreviewTarget::Enrollment, Ok(image)) => {
                        WorkflowInput::Enrollment(EnrollmentEvent::SnapshotTaken(image))
                    }
                    (PreviewTarget::Enrollment, Err(e)) => {
                        WorkflowInput::Enrollment(EnrollmentEvent::SnapshotFailed(e))
                    }
                })
            }

            Effect::Send(outbound) => {
                match self.channel.send(&outbound) {
                    Ok(()) => info!("Sent '{}' {}", outbound.message.name(), outbound.correlation),
                    // Not queued or retried; the guard timer unlocks the control
                    Err(e) => warn!(
                        "Request '{}' {} dropped: {}",
                        outbound.message.name(),
                        outbound.correlation,
                        e
                    ),
                }
                None
            }

            Effect::ArmGuard {
                workflow,
                correlation,
                after,
            } => {
                self.spawn_guard(workflow, correlation, after);
                None
            }

            Effect::ShowBanner { target, banner } => {
                self.presenter.show(target, &banner);
                None
            }

            Effect::HideBanner(target) => {
                self.presenter.hide(target);
                None
            }

            Effect::RenderRecords(panel) => {
                trace!("Records panel: {:?}", render::records_lines(&panel));
                self.presenter.records(&panel);
                None
            }
        }
    }

    fn spawn_acquire(&self, target: PreviewTarget) {
        let media = self.media.clone();
        let constraints = self.constraints;
        let bus = self.event_bus.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = media.acquire(target, constraints) => result,
            };
            let event = match result {
                Ok(session) => AppEvent::CameraAcquired { target, session },
                Err(error) => AppEvent::CameraFailed { target, error },
            };
            // A closed bus drops the session, which stops its stream
            if let Err(e) = bus.publish(event) {
                debug!("Camera result for {} not delivered: {}", target, e);
            }
        });
    }

    fn spawn_guard(
        &self,
        workflow: WorkflowKind,
        correlation: CorrelationId,
        after: Duration,
    ) {
        let bus = self.event_bus.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let _ = bus.publish(AppEvent::GuardExpired {
                        workflow,
                        correlation,
                    });
                }
            }
        });
    }
}
