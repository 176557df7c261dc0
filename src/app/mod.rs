mod dispatch;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod types;


pub use orchestrator::AttendanceClient;
pub use types::ShutdownReason;
