//! Named messages exchanged with the recognition service.
//!
//! Every frame on the wire is one JSON envelope:
//! `{"event": "<name>", "data": {...}, "correlation_id": 7}`.
//! Requests always carry a correlation id; the service echoes it back on the
//! matching response.

use crate::error::ChannelError;
use crate::media::ImagePayload;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod names {
    pub const RECOGNIZE_FACE: &str = "recognize_face";
    pub const REGISTER_STUDENT: &str = "register_student";
    pub const GET_ATTENDANCE: &str = "get_attendance";

    pub const CONNECTION_RESPONSE: &str = "connection_response";
    pub const RECOGNITION_SUCCESS: &str = "recognition_success";
    pub const RECOGNITION_RESULT: &str = "recognition_result";
    pub const RECOGNITION_ERROR: &str = "recognition_error";
    pub const REGISTRATION_SUCCESS: &str = "registration_success";
    pub const REGISTRATION_ERROR: &str = "registration_error";
    pub const ATTENDANCE_DATA: &str = "attendance_data";
    pub const ERROR: &str = "error";
}

/// Inbound names the client understands
pub const INBOUND_NAMES: [&str; 8] = [
    names::CONNECTION_RESPONSE,
    names::RECOGNITION_SUCCESS,
    names::RECOGNITION_RESULT,
    names::RECOGNITION_ERROR,
    names::REGISTRATION_SUCCESS,
    names::REGISTRATION_ERROR,
    names::ATTENDANCE_DATA,
    names::ERROR,
];

/// Tag pairing a response with the request that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl Envelope {
    pub fn new<S: Into<String>>(event: S, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation: CorrelationId) -> Self {
        self.correlation_id = Some(correlation);
        self
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

// Outbound payloads

#[derive(Debug, Clone, Serialize)]
pub struct RecognitionRequest {
    pub image: ImagePayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentRequest {
    pub reg_no: String,
    pub name: String,
    pub semester: String,
    pub phone: String,
    pub images: Vec<ImagePayload>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AttendanceQuery {}

#[derive(Debug, Clone)]
pub enum OutboundMessage {
    RecognizeFace(RecognitionRequest),
    RegisterStudent(EnrollmentRequest),
    GetAttendance(AttendanceQuery),
}

impl OutboundMessage {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundMessage::RecognizeFace(_) => names::RECOGNIZE_FACE,
            OutboundMessage::RegisterStudent(_) => names::REGISTER_STUDENT,
            OutboundMessage::GetAttendance(_) => names::GET_ATTENDANCE,
        }
    }

    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            OutboundMessage::RecognizeFace(request) => serde_json::to_value(request),
            OutboundMessage::RegisterStudent(request) => serde_json::to_value(request),
            OutboundMessage::GetAttendance(query) => serde_json::to_value(query),
        }
    }
}

/// A request together with the id its response must carry
#[derive(Debug, Clone)]
pub struct Outbound {
    pub correlation: CorrelationId,
    pub message: OutboundMessage,
}

impl Outbound {
    pub fn new(correlation: CorrelationId, message: OutboundMessage) -> Self {
        Self {
            correlation,
            message,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        Ok(Envelope::new(self.message.name(), self.message.payload()?)
            .with_correlation(self.correlation))
    }
}

// Inbound payloads

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchedStudent {
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub reg_no: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub semester: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone: String,
    /// Match confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub students: Vec<MatchedStudent>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistrationAck {
    pub message: String,
    #[serde(default)]
    pub reg_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerError {
    #[serde(default = "unknown_server_error")]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub reg_no: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AttendanceData {
    #[serde(default)]
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    ConnectionResponse(Handshake),
    RecognitionSuccess(RecognitionResult),
    RecognitionResult(RecognitionResult),
    RecognitionError(ServerError),
    RegistrationSuccess(RegistrationAck),
    RegistrationError(ServerError),
    AttendanceData(AttendanceData),
    Error(ServerError),
}

impl InboundMessage {
    /// Decode a known message. Unknown names come back as `Ok(None)`.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, ChannelError> {
        let data = envelope.data.clone();
        let message = match envelope.event.as_str() {
            names::CONNECTION_RESPONSE => InboundMessage::ConnectionResponse(decode(envelope, data)?),
            names::RECOGNITION_SUCCESS => InboundMessage::RecognitionSuccess(decode(envelope, data)?),
            names::RECOGNITION_RESULT => InboundMessage::RecognitionResult(decode(envelope, data)?),
            names::RECOGNITION_ERROR => InboundMessage::RecognitionError(decode(envelope, data)?),
            names::REGISTRATION_SUCCESS => InboundMessage::RegistrationSuccess(decode(envelope, data)?),
            names::REGISTRATION_ERROR => InboundMessage::RegistrationError(decode(envelope, data)?),
            names::ATTENDANCE_DATA => InboundMessage::AttendanceData(decode(envelope, data)?),
            names::ERROR => InboundMessage::Error(decode(envelope, data)?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    pub fn name(&self) -> &'static str {
        match self {
            InboundMessage::ConnectionResponse(_) => names::CONNECTION_RESPONSE,
            InboundMessage::RecognitionSuccess(_) => names::RECOGNITION_SUCCESS,
            InboundMessage::RecognitionResult(_) => names::RECOGNITION_RESULT,
            InboundMessage::RecognitionError(_) => names::RECOGNITION_ERROR,
            InboundMessage::RegistrationSuccess(_) => names::REGISTRATION_SUCCESS,
            InboundMessage::RegistrationError(_) => names::REGISTRATION_ERROR,
            InboundMessage::AttendanceData(_) => names::ATTENDANCE_DATA,
            InboundMessage::Error(_) => names::ERROR,
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(envelope: &Envelope, data: Value) -> Result<T, ChannelError> {
    // Payload-less messages decode from an empty object
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|e| ChannelError::Malformed {
        details: format!("{}: {}", envelope.event, e),
    })
}

fn unknown_server_error() -> String {
    "Unknown server error".to_string()
}

/// The service stores some identity fields as integers; render them as text
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
