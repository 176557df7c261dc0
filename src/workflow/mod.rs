//! Client interaction state machines
//!
//! Each workflow is a state value plus a transition function
//! `handle(event) -> Vec<Effect>`. Effects are requests to the camera, the
//! channel, the presenter and the timer; the controller in [`crate::app`]
//! carries them out and feeds results back in as further events.

pub mod correlation;
pub mod enrollment;
pub mod recognition;
pub mod records;

use crate::channel::{CorrelationId, Outbound};
use crate::media::PreviewTarget;
use crate::presenter::{Banner, RecordsPanel};
use std::fmt;
use std::time::Duration;

pub use correlation::{CorrelationSequence, PendingRequest};
pub use enrollment::{
    EnrollmentControls, EnrollmentEvent, EnrollmentOutcome, EnrollmentState, EnrollmentWorkflow,
    IdentityField, IdentityForm,
};
pub use recognition::{
    RecognitionControls, RecognitionEvent, RecognitionOutcome, RecognitionState,
    RecognitionWorkflow,
};
pub use records::{RecordsEvent, RecordsOutcome, RecordsState, RecordsViewer};

pub(crate) const CAMERA_UNAVAILABLE: &str = "Could not access camera. Please check permissions.";

/// Which workflow an effect or banner belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    Recognition,
    Enrollment,
    Records,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Recognition => "recognition",
            WorkflowKind::Enrollment => "enrollment",
            WorkflowKind::Records => "records",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PreviewTarget> for WorkflowKind {
    fn from(target: PreviewTarget) -> Self {
        match target {
            PreviewTarget::Recognition => WorkflowKind::Recognition,
            PreviewTarget::Enrollment => WorkflowKind::Enrollment,
        }
    }
}

/// Side-calls requested by a transition
#[derive(Debug, Clone)]
pub enum Effect {
    AcquireCamera(PreviewTarget),
    ReleaseCamera(PreviewTarget),
    /// Grab one frame from the live session; the result comes back as a
    /// `SnapshotTaken`/`SnapshotFailed` event
    Snapshot(PreviewTarget),
    Send(Outbound),
    /// Fire `GuardExpired(correlation)` at `workflow` after `after`
    ArmGuard {
        workflow: WorkflowKind,
        correlation: CorrelationId,
        after: Duration,
    },
    ShowBanner {
        target: WorkflowKind,
        banner: Banner,
    },
    HideBanner(WorkflowKind),
    RenderRecords(RecordsPanel),
}

impl Effect {
    pub(crate) fn banner(target: WorkflowKind, banner: Banner) -> Self {
        Effect::ShowBanner { target, banner }
    }
}
