//! Progress display for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar per phase run.
//! Non-TTY mode: hidden bars; the reporter logs periodic lines instead.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Records bar: `resolve [=====>    ] 120/500 00:42 (eta 02:10) 3 failed`
fn run_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {prefix:<8.cyan.bold} [{bar:40.cyan/blue}] {pos}/{len} {elapsed_precise} (eta {eta}) {wide_msg:.dim}",
    )
    .expect("invalid template")
    .progress_chars("=>-")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Create a context with explicit TTY mode (tests, piped output).
    pub fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Bar for one phase run over `total` records. Hidden when not a TTY.
    pub fn run_bar(&self, phase: &str, total: u64) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(run_style());
        pb.set_prefix(phase.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
