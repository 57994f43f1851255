use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_yellow, dim, stage_marker};
use crate::runner::{SkipReason, StageStatus};

/// Spinners for running stages, drawn on stderr.
///
/// One spinner per running stage, so concurrent stages each get a line.
/// A disabled tracker draws nothing.
pub struct StageProgress {
    multi: MultiProgress,
}

impl StageProgress {
    pub fn new(enabled: bool) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };

        Self {
            multi: MultiProgress::with_draw_target(target),
        }
    }

    pub fn start(&self, stage: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
            pb.set_style(style);
        }
        pb.set_message(bright_yellow(stage).to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn step(&self, pb: &ProgressBar, stage: &str, step: &str) {
        pb.set_message(format!("{} {}", bright_yellow(stage), dim(step)));
    }

    pub fn finish(&self, pb: ProgressBar, stage: &str, status: StageStatus) {
        pb.finish_with_message(stage_marker(stage, status).to_string());
    }

    pub fn skipped(&self, stage: &str, reason: &SkipReason) {
        let _ = self
            .multi
            .println(format!("  {} {}", dim(format!("{stage} skipped:")), dim(reason)));
    }
}
