//! Duplex message channel to the recognition service
//!
//! Newline-delimited JSON envelopes over a reconnecting stream. Inbound
//! messages fan out to handlers registered per message name.

pub mod backoff;
pub mod client;
pub mod message;
pub mod transport;

#[cfg(test)]
mod tests;

pub use backoff::ReconnectPolicy;
pub use client::{ChannelClient, ConnectionStatus, Handler};
pub use message::{
    names, AttendanceData, AttendanceQuery, AttendanceRecord, CorrelationId, EnrollmentRequest,
    Envelope, Handshake, InboundMessage, MatchedStudent, Outbound, OutboundMessage,
    RecognitionRequest, RecognitionResult, RegistrationAck, ServerError, INBOUND_NAMES,
};
pub use transport::{Connector, DuplexConnector, DuplexServer, TcpConnector};
