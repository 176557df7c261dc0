use crate::channel::CorrelationId;
use crate::workflow::{EnrollmentEvent, RecognitionEvent, RecordsEvent, WorkflowKind};

/// Why the client stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest(String),
    Error(String),
}

/// An event addressed to exactly one workflow
#[derive(Debug)]
pub(super) enum WorkflowInput {
    Recognition(RecognitionEvent),
    Enrollment(EnrollmentEvent),
    Records(RecordsEvent),
}

impl WorkflowInput {
    /// Records have no guard timer
    pub(super) fn guard_expired(workflow: WorkflowKind, correlation: CorrelationId) -> Option<Self> {
        match workflow {
            WorkflowKind::Recognition => Some(WorkflowInput::Recognition(
                RecognitionEvent::GuardExpired(correlation),
            )),
            WorkflowKind::Enrollment => Some(WorkflowInput::Enrollment(
                EnrollmentEvent::GuardExpired(correlation),
            )),
            WorkflowKind::Records => None,
        }
    }
}
