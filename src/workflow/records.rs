use super::correlation::{CorrelationSequence, PendingRequest};
use super::Effect;
use crate::channel::{AttendanceData, AttendanceQuery, CorrelationId, Outbound, OutboundMessage};
use crate::presenter::RecordsPanel;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordsState {
    Idle,
    Loading,
    Loaded { count: usize },
    Failed,
}

#[derive(Debug, Clone)]
pub enum RecordsOutcome {
    Delivered(AttendanceData),
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum RecordsEvent {
    Refresh,
    Response {
        correlation: Option<CorrelationId>,
        outcome: RecordsOutcome,
    },
}

/// On-demand attendance listing; every refresh is a full round trip
#[derive(Debug)]
pub struct RecordsViewer {
    state: RecordsState,
    pending: PendingRequest,
    sequence: CorrelationSequence,
}

impl RecordsViewer {
    pub fn new(sequence: CorrelationSequence) -> Self {
        Self {
            state: RecordsState::Idle,
            pending: PendingRequest::default(),
            sequence,
        }
    }

    pub fn state(&self) -> RecordsState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_pending()
    }

    pub fn handle(&mut self, event: RecordsEvent) -> Vec<Effect> {
        match event {
            RecordsEvent::Refresh => {
                let correlation = self.sequence.next();
                self.pending.begin(correlation);
                self.state = RecordsState::Loading;
                debug!("Requesting attendance records ({})", correlation);

                vec![
                    Effect::RenderRecords(RecordsPanel::Loading),
                    Effect::Send(Outbound::new(
                        correlation,
                        OutboundMessage::GetAttendance(AttendanceQuery::default()),
                    )),
                ]
            }

            RecordsEvent::Response { correlation, outcome } => {
                if !self.pending.accepts(correlation) {
                    warn!(
                        "Dropping stale attendance response {:?} (pending {:?})",
                        correlation,
                        self.pending.current()
                    );
                    return Vec::new();
                }
                self.pending.settle();

                let panel = match outcome {
                    RecordsOutcome::Delivered(data) => {
                        info!("Received {} attendance record(s)", data.records.len());
                        self.state = RecordsState::Loaded {
                            count: data.records.len(),
                        };
                        if data.records.is_empty() {
                            RecordsPanel::Empty
                        } else {
                            RecordsPanel::Entries(data.records)
                        }
                    }
                    RecordsOutcome::Failed(error) => {
                        warn!("Attendance query failed: {}", error);
                        self.state = RecordsState::Failed;
                        RecordsPanel::Error(error)
                    }
                };
                vec![Effect::RenderRecords(panel)]
            }
        }
    }
}
