//! Status and result rendering shared by all workflows
//!
//! [`Presenter`] holds no workflow state. Every banner call fully replaces
//! what the target showed before; connection status and control views are
//! only pushed to the surface when they change.

pub mod memory;
pub mod render;
pub mod terminal;

use crate::channel::{AttendanceRecord, ConnectionStatus};
use crate::media::PreviewTarget;
use crate::workflow::{EnrollmentControls, RecognitionControls, WorkflowKind};
use tracing::trace;

pub use memory::{MemorySurface, SurfaceSnapshot};
pub use terminal::TerminalSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

impl Banner {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Info,
            message: message.into(),
        }
    }
}

/// Contents of the attendance records area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordsPanel {
    Loading,
    Empty,
    Entries(Vec<AttendanceRecord>),
    Error(String),
}

/// Which controls are usable right now, for both workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlsView {
    pub recognition: RecognitionControls,
    pub enrollment: EnrollmentControls,
}

/// Where rendering ends up
pub trait Surface: Send {
    fn show_banner(&mut self, target: WorkflowKind, banner: &Banner);
    fn hide_banner(&mut self, target: WorkflowKind);
    fn render_records(&mut self, panel: &RecordsPanel);
    fn render_status(&mut self, status: ConnectionStatus);
    fn render_controls(&mut self, controls: &ControlsView);
    fn attach_preview(&mut self, target: PreviewTarget, device: &str);
    fn detach_preview(&mut self, target: PreviewTarget);
}

pub struct Presenter<S: Surface> {
    surface: S,
    last_status: Option<ConnectionStatus>,
    last_controls: Option<ControlsView>,
}

impl<S: Surface> Presenter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            last_status: None,
            last_controls: None,
        }
    }

    pub fn show(&mut self, target: WorkflowKind, banner: &Banner) {
        trace!("{} banner {:?}: {}", target, banner.kind, banner.message);
        self.surface.show_banner(target, banner);
    }

    pub fn show_success(&mut self, target: WorkflowKind, message: impl Into<String>) {
        self.show(target, &Banner::success(message));
    }

    pub fn show_error(&mut self, target: WorkflowKind, message: impl Into<String>) {
        self.show(target, &Banner::error(message));
    }

    pub fn show_info(&mut self, target: WorkflowKind, message: impl Into<String>) {
        self.show(target, &Banner::info(message));
    }

    pub fn hide(&mut self, target: WorkflowKind) {
        self.surface.hide_banner(target);
    }

    pub fn records(&mut self, panel: &RecordsPanel) {
        self.surface.render_records(panel);
    }

    /// Render a status transition; repeats of the current status are ignored
    pub fn status(&mut self, status: ConnectionStatus) {
        if self.last_status == Some(status) {
            return;
        }
        self.last_status = Some(status);
        self.surface.render_status(status);
    }

    pub fn controls(&mut self, controls: ControlsView) {
        if self.last_controls == Some(controls) {
            return;
        }
        self.last_controls = Some(controls);
        self.surface.render_controls(&controls);
    }

    /// Push status and controls again even if unchanged
    pub fn refresh(&mut self) {
        if let Some(status) = self.last_status {
            self.surface.render_status(status);
        }
        if let Some(controls) = self.last_controls {
            self.surface.render_controls(&controls);
        }
    }

    pub fn preview_attached(&mut self, target: PreviewTarget, device: &str) {
        self.surface.attach_preview(target, device);
    }

    pub fn preview_detached(&mut self, target: PreviewTarget) {
        self.surface.detach_preview(target);
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
