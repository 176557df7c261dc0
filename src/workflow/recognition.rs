use super::correlation::{CorrelationSequence, PendingRequest};
use super::{Effect, WorkflowKind, CAMERA_UNAVAILABLE};
use crate::channel::{CorrelationId, Outbound, OutboundMessage, RecognitionRequest, RecognitionResult};
use crate::error::DeviceError;
use crate::media::{ImagePayload, PreviewTarget};
use crate::presenter::{render, Banner};
use std::time::Duration;
use tracing::{debug, info, warn};

const PROCESSING: &str = "Processing... Please wait";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionState {
    Idle,
    /// Acquisition requested, device not yet granted
    StartingCamera,
    CameraActive,
    /// Snapshot requested from the live session
    Capturing,
    AwaitingServerResponse,
}

#[derive(Debug, Clone)]
pub enum RecognitionOutcome {
    Matched(RecognitionResult),
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    StartCamera,
    CameraAcquired,
    CameraFailed(DeviceError),
    Capture,
    SnapshotTaken(ImagePayload),
    SnapshotFailed(DeviceError),
    GuardExpired(CorrelationId),
    Response {
        correlation: Option<CorrelationId>,
        outcome: RecognitionOutcome,
    },
    StopCamera,
}

/// Enablement of the recognition controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecognitionControls {
    pub start: bool,
    pub capture: bool,
    pub stop: bool,
}

/// Single-frame capture, dispatch and result cycle
#[derive(Debug)]
pub struct RecognitionWorkflow {
    state: RecognitionState,
    pending: PendingRequest,
    guard_expired: bool,
    guard: Duration,
    sequence: CorrelationSequence,
}

impl RecognitionWorkflow {
    pub fn new(guard: Duration, sequence: CorrelationSequence) -> Self {
        Self {
            state: RecognitionState::Idle,
            pending: PendingRequest::default(),
            guard_expired: false,
            guard,
            sequence,
        }
    }

    pub fn state(&self) -> RecognitionState {
        self.state
    }

    pub fn pending(&self) -> Option<CorrelationId> {
        self.pending.current()
    }

    /// True while an acquisition result would be accepted
    pub fn expects_camera(&self) -> bool {
        self.state == RecognitionState::StartingCamera
    }

    pub fn camera_live(&self) -> bool {
        matches!(
            self.state,
            RecognitionState::CameraActive
                | RecognitionState::Capturing
                | RecognitionState::AwaitingServerResponse
        )
    }

    fn can_capture(&self) -> bool {
        match self.state {
            RecognitionState::CameraActive => true,
            RecognitionState::AwaitingServerResponse => self.guard_expired,
            _ => false,
        }
    }

    pub fn controls(&self) -> RecognitionControls {
        RecognitionControls {
            start: self.state == RecognitionState::Idle,
            capture: self.can_capture(),
            stop: self.camera_live() || self.state == RecognitionState::StartingCamera,
        }
    }

    pub fn handle(&mut self, event: RecognitionEvent) -> Vec<Effect> {
        let before = self.state;
        let effects = self.transition(event);
        if before != self.state {
            debug!("Recognition {:?} -> {:?}", before, self.state);
        }
        effects
    }

    fn transition(&mut self, event: RecognitionEvent) -> Vec<Effect> {
        use RecognitionState::*;

        match event {
            RecognitionEvent::StartCamera => {
                if self.state != Idle {
                    debug!("Recognition camera already started");
                    return Vec::new();
                }
                self.state = StartingCamera;
                vec![Effect::AcquireCamera(PreviewTarget::Recognition)]
            }

            RecognitionEvent::CameraAcquired => {
                if self.state == StartingCamera {
                    self.state = CameraActive;
                }
                Vec::new()
            }

            RecognitionEvent::CameraFailed(error) => {
                if self.state != StartingCamera {
                    return Vec::new();
                }
                warn!("Recognition camera unavailable: {}", error);
                self.state = Idle;
                vec![Effect::banner(
                    WorkflowKind::Recognition,
                    Banner::error(CAMERA_UNAVAILABLE),
                )]
            }

            RecognitionEvent::Capture => {
                if !self.can_capture() {
                    debug!("Capture ignored in {:?}", self.state);
                    return Vec::new();
                }
                self.state = Capturing;
                vec![Effect::Snapshot(PreviewTarget::Recognition)]
            }

            RecognitionEvent::SnapshotTaken(image) => {
                if self.state != Capturing {
                    debug!("Discarding snapshot taken after camera stop");
                    return Vec::new();
                }

                let correlation = self.sequence.next();
                self.pending.begin(correlation);
                self.guard_expired = false;
                self.state = AwaitingServerResponse;
                info!(
                    "Dispatching recognition request {} ({}x{})",
                    correlation,
                    image.width(),
                    image.height()
                );

                vec![
                    Effect::banner(WorkflowKind::Recognition, Banner::info(PROCESSING)),
                    Effect::Send(Outbound::new(
                        correlation,
                        OutboundMessage::RecognizeFace(RecognitionRequest { image }),
                    )),
                    Effect::ArmGuard {
                        workflow: WorkflowKind::Recognition,
                        correlation,
                        after: self.guard,
                    },
                ]
            }

            RecognitionEvent::SnapshotFailed(error) => {
                if self.state != Capturing {
                    return Vec::new();
                }
                warn!("Recognition snapshot failed: {}", error);
                self.state = CameraActive;
                vec![Effect::banner(
                    WorkflowKind::Recognition,
                    Banner::error(format!("Could not capture image: {}", error)),
                )]
            }

            RecognitionEvent::GuardExpired(correlation) => {
                if self.state == AwaitingServerResponse && self.pending.current() == Some(correlation) {
                    debug!("Recognition guard for {} expired; capture re-enabled", correlation);
                    self.guard_expired = true;
                }
                Vec::new()
            }

            RecognitionEvent::Response { correlation, outcome } => {
                if !self.pending.accepts(correlation) {
                    warn!(
                        "Dropping stale recognition response {:?} (pending {:?})",
                        correlation,
                        self.pending.current()
                    );
                    return Vec::new();
                }

                self.pending.settle();
                self.guard_expired = false;
                if self.state == AwaitingServerResponse {
                    self.state = CameraActive;
                }

                let banner = match outcome {
                    RecognitionOutcome::Matched(result) => {
                        info!("Recognition returned {} match(es)", result.students.len());
                        render::recognition_banner(&result)
                    }
                    RecognitionOutcome::Failed(error) => {
                        warn!("Recognition failed on server: {}", error);
                        Banner::error(error)
                    }
                };
                vec![Effect::banner(WorkflowKind::Recognition, banner)]
            }

            RecognitionEvent::StopCamera => {
                if !(self.camera_live() || self.state == StartingCamera) {
                    return Vec::new();
                }
                // A pending request stays pending so a late answer still renders
                self.state = Idle;
                self.guard_expired = false;
                vec![Effect::ReleaseCamera(PreviewTarget::Recognition)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MatchedStudent;
    use crate::presenter::BannerKind;

    fn workflow() -> RecognitionWorkflow {
        RecognitionWorkflow::new(Duration::from_secs(2), CorrelationSequence::new())
    }

    fn image() -> ImagePayload {
        ImagePayload::from_jpeg(&[0xFF, 0xD8, 0xFF, 0xD9], 640, 480)
    }

    fn live() -> RecognitionWorkflow {
        let mut wf = workflow();
        wf.handle(RecognitionEvent::StartCamera);
        wf.handle(RecognitionEvent::CameraAcquired);
        wf
    }

    /// Capture and snapshot; returns the correlation id sent
    fn dispatch(wf: &mut RecognitionWorkflow) -> CorrelationId {
        let effects = wf.handle(RecognitionEvent::Capture);
        assert!(matches!(effects[..], [Effect::Snapshot(PreviewTarget::Recognition)]));
        let effects = wf.handle(RecognitionEvent::SnapshotTaken(image()));
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Send(outbound) => Some(outbound.correlation),
                _ => None,
            })
            .unwrap()
    }

    fn student(confidence: f64) -> MatchedStudent {
        MatchedStudent {
            name: "Asha".to_string(),
            reg_no: "2021001".to_string(),
            semester: "5".to_string(),
            phone: "9876543210".to_string(),
            confidence,
            distance: None,
        }
    }

    fn shown_banner(effects: &[Effect]) -> Banner {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::ShowBanner { banner, .. } => Some(banner.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_start_camera_requests_acquisition() {
        let mut wf = workflow();
        assert!(wf.controls().start);
        assert!(!wf.controls().capture);

        let effects = wf.handle(RecognitionEvent::StartCamera);
        assert!(matches!(effects[..], [Effect::AcquireCamera(PreviewTarget::Recognition)]));
        assert_eq!(wf.state(), RecognitionState::StartingCamera);
        assert!(wf.expects_camera());

        wf.handle(RecognitionEvent::CameraAcquired);
        assert_eq!(wf.state(), RecognitionState::CameraActive);
        assert_eq!(
            wf.controls(),
            RecognitionControls {
                start: false,
                capture: true,
                stop: true
            }
        );
    }

    #[test]
    fn test_camera_failure_returns_to_idle_with_error() {
        let mut wf = workflow();
        wf.handle(RecognitionEvent::StartCamera);

        let effects = wf.handle(RecognitionEvent::CameraFailed(DeviceError::PermissionDenied {
            device: "synthetic".to_string(),
        }));

        assert_eq!(wf.state(), RecognitionState::Idle);
        let banner = shown_banner(&effects);
        assert_eq!(banner.kind, BannerKind::Error);
        assert_eq!(banner.message, CAMERA_UNAVAILABLE);
    }

    #[test]
    fn test_capture_sends_request_and_arms_guard() {
        let mut wf = live();
        wf.handle(RecognitionEvent::Capture);
        assert_eq!(wf.state(), RecognitionState::Capturing);
        assert!(!wf.controls().capture);

        let effects = wf.handle(RecognitionEvent::SnapshotTaken(image()));

        assert_eq!(wf.state(), RecognitionState::AwaitingServerResponse);
        assert_eq!(effects.len(), 3);
        assert_eq!(shown_banner(&effects), Banner::info(PROCESSING));
        match &effects[1] {
            Effect::Send(outbound) => {
                assert_eq!(outbound.message.name(), "recognize_face");
                assert_eq!(outbound.correlation, CorrelationId::new(1));
            }
            other => panic!("expected send, got {:?}", other),
        }
        assert!(matches!(
            effects[2],
            Effect::ArmGuard {
                workflow: WorkflowKind::Recognition,
                after,
                ..
            } if after == Duration::from_secs(2)
        ));
        assert!(!wf.controls().capture);
    }

    #[test]
    fn test_empty_match_is_neutral_outcome() {
        let mut wf = live();
        let id = dispatch(&mut wf);

        let effects = wf.handle(RecognitionEvent::Response {
            correlation: Some(id),
            outcome: RecognitionOutcome::Matched(RecognitionResult::default()),
        });

        let banner = shown_banner(&effects);
        assert_eq!(banner.kind, BannerKind::Info);
        assert!(banner.message.contains("No faces recognized"));
        assert_eq!(wf.state(), RecognitionState::CameraActive);
        assert!(wf.controls().capture);
    }

    #[test]
    fn test_match_renders_confidence_percent() {
        let mut wf = live();
        let id = dispatch(&mut wf);

        let effects = wf.handle(RecognitionEvent::Response {
            correlation: Some(id),
            outcome: RecognitionOutcome::Matched(RecognitionResult {
                students: vec![student(0.87654)],
                timestamp: Some("2024-03-01 09:00:00".to_string()),
                message: None,
            }),
        });

        let banner = shown_banner(&effects);
        assert_eq!(banner.kind, BannerKind::Success);
        assert!(banner.message.contains("Confidence: 87.65%"));
    }

    #[test]
    fn test_server_error_rendered_verbatim() {
        let mut wf = live();
        let id = dispatch(&mut wf);

        let effects = wf.handle(RecognitionEvent::Response {
            correlation: Some(id),
            outcome: RecognitionOutcome::Failed("Failed to decode image".to_string()),
        });

        assert_eq!(shown_banner(&effects), Banner::error("Failed to decode image"));
        assert_eq!(wf.state(), RecognitionState::CameraActive);
    }

    #[test]
    fn test_guard_reenables_capture_without_response() {
        let mut wf = live();
        let id = dispatch(&mut wf);
        assert!(!wf.controls().capture);

        wf.handle(RecognitionEvent::GuardExpired(id));

        assert!(wf.controls().capture);
        assert_eq!(wf.state(), RecognitionState::AwaitingServerResponse);
    }

    #[test]
    fn test_late_response_after_guard_still_rendered() {
        let mut wf = live();
        let id = dispatch(&mut wf);
        wf.handle(RecognitionEvent::GuardExpired(id));

        let effects = wf.handle(RecognitionEvent::Response {
            correlation: Some(id),
            outcome: RecognitionOutcome::Matched(RecognitionResult::default()),
        });

        assert_eq!(effects.len(), 1);
        assert_eq!(wf.pending(), None);
    }

    #[test]
    fn test_superseded_response_is_dropped() {
        let mut wf = live();
        let first = dispatch(&mut wf);
        wf.handle(RecognitionEvent::GuardExpired(first));
        let second = dispatch(&mut wf);
        assert_ne!(first, second);

        let stale = wf.handle(RecognitionEvent::Response {
            correlation: Some(first),
            outcome: RecognitionOutcome::Matched(RecognitionResult::default()),
        });
        assert!(stale.is_empty());
        assert_eq!(wf.pending(), Some(second));

        // The old guard no longer affects the new request
        wf.handle(RecognitionEvent::GuardExpired(first));
        assert!(!wf.controls().capture);

        let fresh = wf.handle(RecognitionEvent::Response {
            correlation: Some(second),
            outcome: RecognitionOutcome::Failed("boom".to_string()),
        });
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_untagged_response_accepted_only_while_pending() {
        let mut wf = live();
        let unsolicited = wf.handle(RecognitionEvent::Response {
            correlation: None,
            outcome: RecognitionOutcome::Failed("boom".to_string()),
        });
        assert!(unsolicited.is_empty());

        dispatch(&mut wf);
        let answered = wf.handle(RecognitionEvent::Response {
            correlation: None,
            outcome: RecognitionOutcome::Failed("boom".to_string()),
        });
        assert_eq!(answered.len(), 1);
    }

    #[test]
    fn test_stop_releases_camera() {
        let mut wf = live();
        let effects = wf.handle(RecognitionEvent::StopCamera);

        assert!(matches!(effects[..], [Effect::ReleaseCamera(PreviewTarget::Recognition)]));
        assert_eq!(wf.state(), RecognitionState::Idle);
        assert_eq!(
            wf.controls(),
            RecognitionControls {
                start: true,
                capture: false,
                stop: false
            }
        );
        assert!(wf.handle(RecognitionEvent::StopCamera).is_empty());
    }

    #[test]
    fn test_response_after_stop_renders_without_restarting() {
        let mut wf = live();
        let id = dispatch(&mut wf);
        wf.handle(RecognitionEvent::StopCamera);

        let effects = wf.handle(RecognitionEvent::Response {
            correlation: Some(id),
            outcome: RecognitionOutcome::Matched(RecognitionResult::default()),
        });

        assert_eq!(effects.len(), 1);
        assert_eq!(wf.state(), RecognitionState::Idle);
    }

    #[test]
    fn test_acquisition_after_stop_is_not_expected() {
        let mut wf = workflow();
        wf.handle(RecognitionEvent::StartCamera);
        wf.handle(RecognitionEvent::StopCamera);

        assert!(!wf.expects_camera());
        wf.handle(RecognitionEvent::CameraAcquired);
        assert_eq!(wf.state(), RecognitionState::Idle);
    }

    #[test]
    fn test_snapshot_failure_keeps_camera_active() {
        let mut wf = live();
        wf.handle(RecognitionEvent::Capture);

        let effects = wf.handle(RecognitionEvent::SnapshotFailed(DeviceError::Capture {
            details: "timeout".to_string(),
        }));

        assert_eq!(shown_banner(&effects).kind, BannerKind::Error);
        assert_eq!(wf.state(), RecognitionState::CameraActive);
        assert!(wf.pending().is_none());
    }
}
