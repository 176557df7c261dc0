//! Text formatting shared by the surfaces

use super::{Banner, ControlsView, RecordsPanel};
use crate::channel::{AttendanceRecord, ConnectionStatus, MatchedStudent, RecognitionResult};

pub const NO_MATCH: &str = "No faces recognized. Please try again with better lighting or position.";
pub const RECORDS_EMPTY: &str = "No attendance records found.";
pub const RECORDS_LOADING: &str = "Loading records...";

/// `score * 100` to two decimals
pub fn confidence_percent(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}

/// Banner for a recognition result. No match is informational, not a failure.
pub fn recognition_banner(result: &RecognitionResult) -> Banner {
    if result.students.is_empty() {
        return Banner::info(NO_MATCH);
    }

    let timestamp = result.timestamp.as_deref().unwrap_or("-");
    let mut text = String::from("Recognized Students:");
    for student in &result.students {
        text.push('\n');
        text.push_str(&student_card(student, timestamp));
    }
    Banner::success(text)
}

fn student_card(student: &MatchedStudent, timestamp: &str) -> String {
    format!(
        "{}\n  Reg No: {}\n  Semester: {}\n  Phone: {}\n  Confidence: {}\n  Time: {}",
        student.name,
        student.reg_no,
        student.semester,
        student.phone,
        confidence_percent(student.confidence),
        timestamp
    )
}

pub fn record_line(record: &AttendanceRecord) -> String {
    format!("{} ({}) — {}", record.name, record.reg_no, record.timestamp)
}

pub fn records_lines(panel: &RecordsPanel) -> Vec<String> {
    match panel {
        RecordsPanel::Loading => vec![RECORDS_LOADING.to_string()],
        RecordsPanel::Empty => vec![RECORDS_EMPTY.to_string()],
        RecordsPanel::Entries(records) => records.iter().map(record_line).collect(),
        RecordsPanel::Error(error) => vec![format!("Could not load records: {}", error)],
    }
}

pub fn status_text(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connected => "Connected",
        ConnectionStatus::Disconnected => "Disconnected",
    }
}

fn flag(name: &str, enabled: bool) -> String {
    if enabled {
        format!("[{}]", name)
    } else {
        format!(" {} ", name)
    }
}

/// One line per workflow; usable controls are bracketed
pub fn controls_lines(view: &ControlsView) -> [String; 2] {
    let r = &view.recognition;
    let e = &view.enrollment;
    [
        format!(
            "recognition: {} {} {}",
            flag("start", r.start),
            flag("capture", r.capture),
            flag("stop", r.stop)
        ),
        format!(
            "enrollment:  {} {} {} {}  images: {}",
            flag("enroll-start", e.start_camera),
            flag("snap", e.capture),
            flag("clear", e.clear),
            flag("submit", e.submit),
            e.image_count
        ),
    ]
}
