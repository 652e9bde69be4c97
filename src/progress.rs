//! Progress reporting.
//!
//! The engine notifies a [`ProgressSink`] at fixed points: once per file
//! before body bytes move, and after every chunk. Sinks are advisory; they
//! never affect the protocol outcome.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;

pub trait ProgressSink {
    /// One call per file, with the header fields, before any body bytes.
    fn on_header(&mut self, rel_dir: &str, name: &str, size: u64);
    /// Cumulative byte count after each chunk.
    fn on_progress(&mut self, bytes: u64);
}

/// Sink that drops every notification.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_header(&mut self, _rel_dir: &str, _name: &str, _size: u64) {}
    fn on_progress(&mut self, _bytes: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sending,
    Receiving,
}

impl Direction {
    fn glyph(self) -> &'static str {
        match self {
            Direction::Sending => "↑",
            Direction::Receiving => "↓",
        }
    }
}

/// Terminal progress bar for one file, closed out with a status line:
/// ✔ on success, ✘ on failure, ↯ on a checksum mismatch.
pub struct TransferBar {
    direction: Direction,
    label: String,
    bar: Option<ProgressBar>,
}

impl TransferBar {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            label: String::new(),
            bar: None,
        }
    }

    /// A bar whose label is known before the header round-trip, e.g. the
    /// local path of a file about to be sent.
    pub fn with_label(direction: Direction, label: String) -> Self {
        Self {
            direction,
            label,
            bar: None,
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg} [{bar:22.cyan}] {bytes}/{total_bytes}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░")
    }

    pub fn done(self) {
        self.clear();
        println!("{} {}", "✔".green(), self.label);
    }

    pub fn warning(self, err: &dyn Display) {
        self.clear();
        println!("{} {} {}", "↯".yellow(), self.label, err);
    }

    pub fn failed(self, err: &dyn Display) {
        self.clear();
        if self.label.is_empty() {
            println!("{}", format!("✘ transfer error: {err}").red());
        } else {
            println!("{} {} {}", "✘".red(), self.label, err);
        }
    }

    fn clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for TransferBar {
    fn on_header(&mut self, rel_dir: &str, name: &str, size: u64) {
        self.label = if rel_dir.is_empty() {
            name.to_owned()
        } else {
            format!("{rel_dir}/{name}")
        };
        let bar = ProgressBar::new(size);
        bar.set_style(Self::bar_style());
        bar.set_message(format!("{} {}", self.direction.glyph(), self.label));
        self.bar = Some(bar);
    }

    fn on_progress(&mut self, bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(bytes);
        }
    }
}
