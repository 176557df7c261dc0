use super::correlation::{CorrelationSequence, PendingRequest};
use super::{Effect, WorkflowKind, CAMERA_UNAVAILABLE};
use crate::channel::{CorrelationId, EnrollmentRequest, Outbound, OutboundMessage, RegistrationAck};
use crate::config::WorkflowConfig;
use crate::error::{DeviceError, ValidationError};
use crate::media::{ImagePayload, PreviewTarget};
use crate::presenter::Banner;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROCESSING: &str = "Processing registration... Please wait";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentState {
    Idle,
    CameraActive,
    /// Gallery has images but fewer than the submit threshold, or a
    /// snapshot is in flight
    Capturing,
    /// Enough images to submit
    Ready,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CameraPhase {
    Off,
    Starting,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityField {
    RegNo,
    Name,
    Semester,
    Phone,
}

impl IdentityField {
    pub const ALL: [IdentityField; 4] = [
        IdentityField::RegNo,
        IdentityField::Name,
        IdentityField::Semester,
        IdentityField::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::RegNo => "reg_no",
            IdentityField::Name => "name",
            IdentityField::Semester => "semester",
            IdentityField::Phone => "phone",
        }
    }
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "reg_no" | "regno" => Ok(IdentityField::RegNo),
            "name" => Ok(IdentityField::Name),
            "semester" => Ok(IdentityField::Semester),
            "phone" => Ok(IdentityField::Phone),
            other => Err(format!("unknown field '{}'", other)),
        }
    }
}

/// Registrant identity as typed by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityForm {
    pub reg_no: String,
    pub name: String,
    pub semester: String,
    pub phone: String,
}

impl IdentityForm {
    pub fn set(&mut self, field: IdentityField, value: impl Into<String>) {
        let slot = match field {
            IdentityField::RegNo => &mut self.reg_no,
            IdentityField::Name => &mut self.name,
            IdentityField::Semester => &mut self.semester,
            IdentityField::Phone => &mut self.phone,
        };
        *slot = value.into();
    }

    pub fn get(&self, field: IdentityField) -> &str {
        match field {
            IdentityField::RegNo => &self.reg_no,
            IdentityField::Name => &self.name,
            IdentityField::Semester => &self.semester,
            IdentityField::Phone => &self.phone,
        }
    }

    /// Fields that are empty once surrounding whitespace is trimmed
    pub fn missing(&self) -> Vec<&'static str> {
        IdentityField::ALL
            .iter()
            .filter(|field| self.get(**field).trim().is_empty())
            .map(|field| field.as_str())
            .collect()
    }

    pub fn trimmed(&self) -> IdentityForm {
        IdentityForm {
            reg_no: self.reg_no.trim().to_string(),
            name: self.name.trim().to_string(),
            semester: self.semester.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }

    pub fn reset(&mut self) {
        *self = IdentityForm::default();
    }
}

#[derive(Debug, Clone)]
pub enum EnrollmentOutcome {
    Registered(RegistrationAck),
    Rejected(String),
}

#[derive(Debug, Clone)]
pub enum EnrollmentEvent {
    StartCamera,
    CameraAcquired,
    CameraFailed(DeviceError),
    Capture,
    SnapshotTaken(ImagePayload),
    SnapshotFailed(DeviceError),
    Clear,
    SetField(IdentityField, String),
    Submit,
    GuardExpired(CorrelationId),
    Response {
        correlation: Option<CorrelationId>,
        outcome: EnrollmentOutcome,
    },
}

/// Enablement of the enrollment controls plus the visible image count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnrollmentControls {
    pub start_camera: bool,
    pub capture: bool,
    pub clear: bool,
    pub submit: bool,
    pub image_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Submission {
    correlation: CorrelationId,
    guard_expired: bool,
}

/// Multi-frame accumulation, local validation and registration cycle
#[derive(Debug)]
pub struct EnrollmentWorkflow {
    camera: CameraPhase,
    snapshot_in_flight: bool,
    gallery: Vec<ImagePayload>,
    form: IdentityForm,
    submission: Option<Submission>,
    pending: PendingRequest,
    guard: Duration,
    min_images: usize,
    max_images: usize,
    sequence: CorrelationSequence,
}

impl EnrollmentWorkflow {
    pub fn new(config: &WorkflowConfig, sequence: CorrelationSequence) -> Self {
        Self {
            camera: CameraPhase::Off,
            snapshot_in_flight: false,
            gallery: Vec::with_capacity(config.max_enrollment_images),
            form: IdentityForm::default(),
            submission: None,
            pending: PendingRequest::default(),
            guard: config.enrollment_guard(),
            min_images: config.min_enrollment_images,
            max_images: config.max_enrollment_images,
            sequence,
        }
    }

    pub fn state(&self) -> EnrollmentState {
        if self.submission.is_some_and(|s| !s.guard_expired) {
            EnrollmentState::Submitting
        } else if self.gallery.len() >= self.min_images {
            EnrollmentState::Ready
        } else if self.snapshot_in_flight || !self.gallery.is_empty() {
            EnrollmentState::Capturing
        } else if self.camera == CameraPhase::Live {
            EnrollmentState::CameraActive
        } else {
            EnrollmentState::Idle
        }
    }

    pub fn gallery_len(&self) -> usize {
        self.gallery.len()
    }

    pub fn form(&self) -> &IdentityForm {
        &self.form
    }

    pub fn pending(&self) -> Option<CorrelationId> {
        self.pending.current()
    }

    pub fn expects_camera(&self) -> bool {
        self.camera == CameraPhase::Starting
    }

    pub fn camera_live(&self) -> bool {
        self.camera == CameraPhase::Live
    }

    fn can_submit(&self) -> bool {
        let idle_or_unlocked = match self.submission {
            None => true,
            Some(submission) => submission.guard_expired,
        };
        self.gallery.len() >= self.min_images && idle_or_unlocked
    }

    pub fn controls(&self) -> EnrollmentControls {
        EnrollmentControls {
            start_camera: self.camera == CameraPhase::Off,
            capture: self.camera == CameraPhase::Live && !self.snapshot_in_flight,
            clear: self.camera == CameraPhase::Live || !self.gallery.is_empty(),
            submit: self.can_submit(),
            image_count: self.gallery.len(),
        }
    }

    pub fn handle(&mut self, event: EnrollmentEvent) -> Vec<Effect> {
        let before = self.state();
        let effects = self.transition(event);
        let after = self.state();
        if before != after {
            debug!("Enrollment {:?} -> {:?}", before, after);
        }
        effects
    }

    fn error(&self, message: impl Into<String>) -> Vec<Effect> {
        vec![Effect::banner(WorkflowKind::Enrollment, Banner::error(message))]
    }

    fn transition(&mut self, event: EnrollmentEvent) -> Vec<Effect> {
        match event {
            EnrollmentEvent::StartCamera => {
                if self.camera != CameraPhase::Off {
                    debug!("Enrollment camera already started");
                    return Vec::new();
                }
                self.camera = CameraPhase::Starting;
                vec![Effect::AcquireCamera(PreviewTarget::Enrollment)]
            }

            EnrollmentEvent::CameraAcquired => {
                if self.camera == CameraPhase::Starting {
                    self.camera = CameraPhase::Live;
                }
                Vec::new()
            }

            EnrollmentEvent::CameraFailed(error) => {
                if self.camera != CameraPhase::Starting {
                    return Vec::new();
                }
                warn!("Enrollment camera unavailable: {}", error);
                self.camera = CameraPhase::Off;
                self.error(CAMERA_UNAVAILABLE)
            }

            EnrollmentEvent::Capture => {
                if self.camera != CameraPhase::Live || self.snapshot_in_flight {
                    debug!("Capture ignored in {:?}", self.state());
                    return Vec::new();
                }
                if self.gallery.len() >= self.max_images {
                    return self.error(
                        ValidationError::GalleryFull {
                            max: self.max_images,
                        }
                        .to_string(),
                    );
                }
                self.snapshot_in_flight = true;
                vec![Effect::Snapshot(PreviewTarget::Enrollment)]
            }

            EnrollmentEvent::SnapshotTaken(image) => {
                if !self.snapshot_in_flight {
                    debug!("Discarding unrequested enrollment snapshot");
                    return Vec::new();
                }
                self.snapshot_in_flight = false;
                if self.gallery.len() >= self.max_images {
                    return self.error(
                        ValidationError::GalleryFull {
                            max: self.max_images,
                        }
                        .to_string(),
                    );
                }
                self.gallery.push(image);
                debug!(
                    "Enrollment gallery at {}/{}",
                    self.gallery.len(),
                    self.max_images
                );
                Vec::new()
            }

            EnrollmentEvent::SnapshotFailed(error) => {
                if !self.snapshot_in_flight {
                    return Vec::new();
                }
                self.snapshot_in_flight = false;
                warn!("Enrollment snapshot failed: {}", error);
                self.error(format!("Could not capture image: {}", error))
            }

            EnrollmentEvent::Clear => {
                let dropped = self.gallery.len();
                self.gallery.clear();
                debug!("Cleared {} enrollment image(s)", dropped);
                vec![Effect::HideBanner(WorkflowKind::Enrollment)]
            }

            EnrollmentEvent::SetField(field, value) => {
                self.form.set(field, value);
                Vec::new()
            }

            EnrollmentEvent::Submit => self.submit(),

            EnrollmentEvent::GuardExpired(correlation) => {
                if let Some(submission) = self.submission.as_mut() {
                    if submission.correlation == correlation {
                        debug!("Enrollment guard for {} expired; submit re-enabled", correlation);
                        submission.guard_expired = true;
                    }
                }
                Vec::new()
            }

            EnrollmentEvent::Response { correlation, outcome } => {
                if !self.pending.accepts(correlation) {
                    warn!(
                        "Dropping stale registration response {:?} (pending {:?})",
                        correlation,
                        self.pending.current()
                    );
                    return Vec::new();
                }
                self.pending.settle();
                self.submission = None;

                match outcome {
                    EnrollmentOutcome::Registered(ack) => self.registered(ack),
                    EnrollmentOutcome::Rejected(error) => {
                        warn!("Registration rejected: {}", error);
                        self.error(error)
                    }
                }
            }
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        if self.submission.is_some_and(|s| !s.guard_expired) {
            debug!("Submit ignored while a registration is in flight");
            return Vec::new();
        }

        if self.gallery.len() < self.min_images {
            return self.error(
                ValidationError::InsufficientImages {
                    have: self.gallery.len(),
                    need: self.min_images,
                }
                .to_string(),
            );
        }

        let missing = self.form.missing();
        if !missing.is_empty() {
            return self.error(ValidationError::MissingFields { fields: missing }.to_string());
        }

        let identity = self.form.trimmed();
        let correlation = self.sequence.next();
        self.pending.begin(correlation);
        self.submission = Some(Submission {
            correlation,
            guard_expired: false,
        });

        info!(
            "Dispatching registration {} for {} with {} image(s)",
            correlation,
            identity.reg_no,
            self.gallery.len()
        );

        let request = EnrollmentRequest {
            reg_no: identity.reg_no,
            name: identity.name,
            semester: identity.semester,
            phone: identity.phone,
            images: self.gallery.clone(),
        };

        vec![
            Effect::banner(WorkflowKind::Enrollment, Banner::info(PROCESSING)),
            Effect::Send(Outbound::new(
                correlation,
                OutboundMessage::RegisterStudent(request),
            )),
            Effect::ArmGuard {
                workflow: WorkflowKind::Enrollment,
                correlation,
                after: self.guard,
            },
        ]
    }

    fn registered(&mut self, ack: RegistrationAck) -> Vec<Effect> {
        info!(
            "Registration succeeded{}: {}",
            ack.reg_no
                .as_deref()
                .map(|reg_no| format!(" for {}", reg_no))
                .unwrap_or_default(),
            ack.message
        );

        self.form.reset();
        self.gallery.clear();

        let mut effects = vec![Effect::banner(
            WorkflowKind::Enrollment,
            Banner::success(ack.message),
        )];

        // Enrollment is one-shot: a success also ends the camera session
        if self.camera != CameraPhase::Off {
            self.camera = CameraPhase::Off;
            self.snapshot_in_flight = false;
            effects.push(Effect::ReleaseCamera(PreviewTarget::Enrollment));
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::BannerKind;

    fn workflow() -> EnrollmentWorkflow {
        EnrollmentWorkflow::new(&WorkflowConfig::default(), CorrelationSequence::new())
    }

    fn image(n: u8) -> ImagePayload {
        ImagePayload::from_jpeg(&[0xFF, 0xD8, n, 0xFF, 0xD9], 640, 480)
    }

    fn live() -> EnrollmentWorkflow {
        let mut wf = workflow();
        wf.handle(EnrollmentEvent::StartCamera);
        wf.handle(EnrollmentEvent::CameraAcquired);
        wf
    }

    fn capture(wf: &mut EnrollmentWorkflow, n: u8) -> Vec<Effect> {
        let effects = wf.handle(EnrollmentEvent::Capture);
        if matches!(effects[..], [Effect::Snapshot(_)]) {
            wf.handle(EnrollmentEvent::SnapshotTaken(image(n)))
        } else {
            effects
        }
    }

    fn fill_form(wf: &mut EnrollmentWorkflow) {
        wf.handle(EnrollmentEvent::SetField(IdentityField::RegNo, " 2021001 ".to_string()));
        wf.handle(EnrollmentEvent::SetField(IdentityField::Name, "Asha Rao".to_string()));
        wf.handle(EnrollmentEvent::SetField(IdentityField::Semester, "5".to_string()));
        wf.handle(EnrollmentEvent::SetField(IdentityField::Phone, "9876543210".to_string()));
    }

    fn ready(count: u8) -> EnrollmentWorkflow {
        let mut wf = live();
        for n in 0..count {
            capture(&mut wf, n);
        }
        fill_form(&mut wf);
        wf
    }

    fn sent(effects: &[Effect]) -> Option<&Outbound> {
        effects.iter().find_map(|e| match e {
            Effect::Send(outbound) => Some(outbound),
            _ => None,
        })
    }

    fn shown_banner(effects: &[Effect]) -> Option<Banner> {
        effects.iter().find_map(|e| match e {
            Effect::ShowBanner { banner, .. } => Some(banner.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_gallery_never_exceeds_capacity() {
        let mut wf = live();
        for n in 0..10 {
            assert!(capture(&mut wf, n).is_empty());
        }
        assert_eq!(wf.gallery_len(), 10);

        let effects = capture(&mut wf, 11);

        assert_eq!(wf.gallery_len(), 10);
        assert_eq!(
            shown_banner(&effects),
            Some(Banner::error("Maximum 10 images allowed"))
        );
        assert_eq!(wf.state(), EnrollmentState::Ready);
    }

    #[test]
    fn test_submit_enabled_iff_threshold_reached() {
        let mut wf = live();
        for n in 0..10u8 {
            assert_eq!(wf.controls().submit, wf.gallery_len() >= 5, "at {}", n);
            capture(&mut wf, n);
        }
        assert_eq!(wf.gallery_len(), 10);
        assert!(wf.controls().submit);
        assert_eq!(wf.controls().image_count, 10);
    }

    #[test]
    fn test_states_follow_gallery() {
        let mut wf = workflow();
        assert_eq!(wf.state(), EnrollmentState::Idle);
        wf.handle(EnrollmentEvent::StartCamera);
        wf.handle(EnrollmentEvent::CameraAcquired);
        assert_eq!(wf.state(), EnrollmentState::CameraActive);
        capture(&mut wf, 0);
        assert_eq!(wf.state(), EnrollmentState::Capturing);
        for n in 1..5 {
            capture(&mut wf, n);
        }
        assert_eq!(wf.state(), EnrollmentState::Ready);
    }

    #[test]
    fn test_clear_from_any_state() {
        let mut wf = ready(7);
        let effects = wf.handle(EnrollmentEvent::Clear);
        assert_eq!(wf.gallery_len(), 0);
        assert!(!wf.controls().submit);
        assert!(matches!(effects[..], [Effect::HideBanner(WorkflowKind::Enrollment)]));

        // While a submission is in flight
        let mut wf = ready(5);
        wf.handle(EnrollmentEvent::Submit);
        assert_eq!(wf.state(), EnrollmentState::Submitting);
        wf.handle(EnrollmentEvent::Clear);
        assert_eq!(wf.gallery_len(), 0);
        assert!(!wf.controls().submit);

        // With the camera never started
        let mut idle = workflow();
        idle.handle(EnrollmentEvent::Clear);
        assert_eq!(idle.gallery_len(), 0);
        assert!(!idle.controls().submit);
    }

    #[test]
    fn test_submit_rejects_short_gallery() {
        let mut wf = ready(4);
        let effects = wf.handle(EnrollmentEvent::Submit);

        assert!(sent(&effects).is_none());
        assert_eq!(
            shown_banner(&effects),
            Some(Banner::error("Please capture at least 5 images"))
        );
    }

    #[test]
    fn test_submit_rejects_blank_fields_regardless_of_gallery() {
        for field in IdentityField::ALL {
            for count in [5u8, 10] {
                let mut wf = ready(count);
                wf.handle(EnrollmentEvent::SetField(field, "   ".to_string()));

                let effects = wf.handle(EnrollmentEvent::Submit);

                assert!(sent(&effects).is_none(), "{} blank sent a request", field);
                let banner = shown_banner(&effects).unwrap();
                assert_eq!(banner.kind, BannerKind::Error);
                assert!(banner.message.contains(field.as_str()));
                assert_eq!(wf.gallery_len(), count as usize);
            }
        }
    }

    #[test]
    fn test_submit_sends_trimmed_fields_and_all_images() {
        let mut wf = ready(6);
        let effects = wf.handle(EnrollmentEvent::Submit);

        assert_eq!(shown_banner(&effects), Some(Banner::info(PROCESSING)));
        let outbound = sent(&effects).unwrap();
        match &outbound.message {
            OutboundMessage::RegisterStudent(request) => {
                assert_eq!(request.reg_no, "2021001");
                assert_eq!(request.name, "Asha Rao");
                assert_eq!(request.images.len(), 6);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::ArmGuard { workflow: WorkflowKind::Enrollment, after, .. }
                if *after == Duration::from_secs(5)
        )));
        assert!(!wf.controls().submit);
        assert!(wf.handle(EnrollmentEvent::Submit).is_empty());
    }

    #[test]
    fn test_guard_reenables_submit() {
        let mut wf = ready(5);
        let id = sent(&wf.handle(EnrollmentEvent::Submit)).unwrap().correlation;
        assert!(!wf.controls().submit);

        wf.handle(EnrollmentEvent::GuardExpired(id));

        assert!(wf.controls().submit);
        assert_eq!(wf.state(), EnrollmentState::Ready);
    }

    #[test]
    fn test_success_resets_form_gallery_and_camera() {
        let mut wf = ready(5);
        let id = sent(&wf.handle(EnrollmentEvent::Submit)).unwrap().correlation;

        let effects = wf.handle(EnrollmentEvent::Response {
            correlation: Some(id),
            outcome: EnrollmentOutcome::Registered(RegistrationAck {
                message: "Student Asha Rao registered successfully with 5 face samples!".to_string(),
                reg_no: Some("2021001".to_string()),
            }),
        });

        assert_eq!(shown_banner(&effects).unwrap().kind, BannerKind::Success);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::ReleaseCamera(PreviewTarget::Enrollment))));
        assert_eq!(wf.form(), &IdentityForm::default());
        assert_eq!(wf.gallery_len(), 0);
        assert_eq!(wf.state(), EnrollmentState::Idle);
        assert_eq!(
            wf.controls(),
            EnrollmentControls {
                start_camera: true,
                capture: false,
                clear: false,
                submit: false,
                image_count: 0
            }
        );
    }

    #[test]
    fn test_error_preserves_gallery_and_form() {
        let mut wf = ready(5);
        let id = sent(&wf.handle(EnrollmentEvent::Submit)).unwrap().correlation;

        let effects = wf.handle(EnrollmentEvent::Response {
            correlation: Some(id),
            outcome: EnrollmentOutcome::Rejected("Student with Reg No 2021001 already exists!".to_string()),
        });

        assert_eq!(
            shown_banner(&effects),
            Some(Banner::error("Student with Reg No 2021001 already exists!"))
        );
        assert_eq!(wf.gallery_len(), 5);
        assert_eq!(wf.form().name, "Asha Rao");
        assert_eq!(wf.state(), EnrollmentState::Ready);
        assert!(wf.controls().submit);
    }

    #[test]
    fn test_superseded_registration_response_dropped() {
        let mut wf = ready(5);
        let first = sent(&wf.handle(EnrollmentEvent::Submit)).unwrap().correlation;
        wf.handle(EnrollmentEvent::GuardExpired(first));
        let second = sent(&wf.handle(EnrollmentEvent::Submit)).unwrap().correlation;

        let stale = wf.handle(EnrollmentEvent::Response {
            correlation: Some(first),
            outcome: EnrollmentOutcome::Rejected("late".to_string()),
        });

        assert!(stale.is_empty());
        assert_eq!(wf.pending(), Some(second));
        assert_eq!(wf.state(), EnrollmentState::Submitting);
    }

    #[test]
    fn test_capture_requires_live_camera() {
        let mut wf = workflow();
        assert!(wf.handle(EnrollmentEvent::Capture).is_empty());

        wf.handle(EnrollmentEvent::StartCamera);
        let effects = wf.handle(EnrollmentEvent::CameraFailed(DeviceError::Unavailable {
            device: "synthetic".to_string(),
            details: "busy".to_string(),
        }));
        assert_eq!(shown_banner(&effects), Some(Banner::error(CAMERA_UNAVAILABLE)));
        assert!(wf.controls().start_camera);
        assert!(wf.handle(EnrollmentEvent::Capture).is_empty());
    }

    #[test]
    fn test_identity_field_parsing() {
        assert_eq!("reg_no".parse::<IdentityField>(), Ok(IdentityField::RegNo));
        assert_eq!("reg-no".parse::<IdentityField>(), Ok(IdentityField::RegNo));
        assert_eq!("Phone".parse::<IdentityField>(), Ok(IdentityField::Phone));
        assert!("email".parse::<IdentityField>().is_err());
    }
}
