use super::{Banner, ControlsView, RecordsPanel, Surface};
use crate::channel::ConnectionStatus;
use crate::media::PreviewTarget;
use crate::workflow::WorkflowKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a [`MemorySurface`] has been told to show
#[derive(Debug, Clone, Default)]
pub struct SurfaceSnapshot {
    pub banners: HashMap<WorkflowKind, Banner>,
    pub banner_history: Vec<(WorkflowKind, Banner)>,
    pub records: Option<RecordsPanel>,
    pub status_history: Vec<ConnectionStatus>,
    pub controls: ControlsView,
    pub controls_renders: usize,
    pub previews: HashMap<PreviewTarget, String>,
}

impl SurfaceSnapshot {
    pub fn banner(&self, target: WorkflowKind) -> Option<&Banner> {
        self.banners.get(&target)
    }

    pub fn status(&self) -> Option<ConnectionStatus> {
        self.status_history.last().copied()
    }

    pub fn preview(&self, target: PreviewTarget) -> Option<&str> {
        self.previews.get(&target).map(String::as_str)
    }
}

/// Headless surface. Clones share state, so a test can keep one handle
/// while the presenter owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<SurfaceSnapshot>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.state.lock().clone()
    }
}

impl Surface for MemorySurface {
    fn show_banner(&mut self, target: WorkflowKind, banner: &Banner) {
        let mut state = self.state.lock();
        state.banners.insert(target, banner.clone());
        state.banner_history.push((target, banner.clone()));
    }

    fn hide_banner(&mut self, target: WorkflowKind) {
        self.state.lock().banners.remove(&target);
    }

    fn render_records(&mut self, panel: &RecordsPanel) {
        self.state.lock().records = Some(panel.clone());
    }

    fn render_status(&mut self, status: ConnectionStatus) {
        self.state.lock().status_history.push(status);
    }

    fn render_controls(&mut self, controls: &ControlsView) {
        let mut state = self.state.lock();
        state.controls = *controls;
        state.controls_renders += 1;
    }

    fn attach_preview(&mut self, target: PreviewTarget, device: &str) {
        self.state.lock().previews.insert(target, device.to_string());
    }

    fn detach_preview(&mut self, target: PreviewTarget) {
        self.state.lock().previews.remove(&target);
    }
}
