use super::render;
use super::{Banner, BannerKind, ControlsView, RecordsPanel, Surface};
use crate::channel::ConnectionStatus;
use crate::media::PreviewTarget;
use crate::workflow::WorkflowKind;
use crossterm::style::{StyledContent, Stylize};
use std::io::{self, Write};
use tracing::debug;

/// Line-oriented surface on stdout with coloured banners
pub struct TerminalSurface<W: Write + Send = io::Stdout> {
    out: W,
    color: bool,
}

impl TerminalSurface<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self {
            out: io::stdout(),
            color,
        }
    }
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn with_writer(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: String, kind: BannerKind) -> String {
        if !self.color {
            return text;
        }
        let styled: StyledContent<String> = match kind {
            BannerKind::Success => text.green(),
            BannerKind::Error => text.red(),
            BannerKind::Info => text.cyan(),
        };
        styled.to_string()
    }

    fn emit(&mut self, lines: &[String]) {
        for line in lines {
            if let Err(e) = writeln!(self.out, "{}", line) {
                debug!("Terminal write failed: {}", e);
                return;
            }
        }
        let _ = self.out.flush();
    }
}

fn marker(kind: BannerKind) -> &'static str {
    match kind {
        BannerKind::Success => "OK",
        BannerKind::Error => "ERROR",
        BannerKind::Info => "..",
    }
}

impl<W: Write + Send> Surface for TerminalSurface<W> {
    fn show_banner(&mut self, target: WorkflowKind, banner: &Banner) {
        let text = format!("[{}] {} {}", target, marker(banner.kind), banner.message);
        let painted = self.paint(text, banner.kind);
        self.emit(&[painted]);
    }

    fn hide_banner(&mut self, target: WorkflowKind) {
        self.emit(&[format!("[{}] result cleared", target)]);
    }

    fn render_records(&mut self, panel: &RecordsPanel) {
        let mut lines = vec!["[records]".to_string()];
        lines.extend(render::records_lines(panel).into_iter().map(|l| format!("  {}", l)));
        if let RecordsPanel::Error(_) = panel {
            let last = lines.pop().unwrap_or_default();
            lines.push(self.paint(last, BannerKind::Error));
        }
        self.emit(&lines);
    }

    fn render_status(&mut self, status: ConnectionStatus) {
        let kind = match status {
            ConnectionStatus::Connected => BannerKind::Success,
            ConnectionStatus::Disconnected => BannerKind::Error,
        };
        let text = self.paint(format!("* {}", render::status_text(status)), kind);
        self.emit(&[text]);
    }

    fn render_controls(&mut self, controls: &ControlsView) {
        let [recognition, enrollment] = render::controls_lines(controls);
        self.emit(&[recognition, enrollment]);
    }

    fn attach_preview(&mut self, target: PreviewTarget, device: &str) {
        self.emit(&[format!("[{}] live from {}", target, device)]);
    }

    fn detach_preview(&mut self, target: PreviewTarget) {
        self.emit(&[format!("[{}] stopped", target)]);
    }
}
