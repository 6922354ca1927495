//! ProgressReporter: live progress, failure diagnostics, final summary.
//!
//! Purely observational. Nothing here feeds back into dispatch or ordering;
//! a failing diagnostic write is logged and otherwise ignored.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use indicatif::ProgressBar;

use crate::diagnostics::DiagnosticSink;
use crate::progress::{ProgressContext, fmt_num};
use crate::record::{FetchResult, RunStats};

pub struct ProgressReporter<'a> {
    phase: String,
    progress: &'a ProgressContext,
    sink: DiagnosticSink,
    bar: ProgressBar,
    already_done: usize,
    total: usize,
    completed: usize,
    failed: usize,
    unpersisted: usize,
    log_every: usize,
    started: Instant,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(phase: &str, progress: &'a ProgressContext, sink: DiagnosticSink) -> Self {
        Self {
            phase: phase.to_string(),
            progress,
            sink,
            bar: ProgressBar::hidden(),
            already_done: 0,
            total: 0,
            completed: 0,
            failed: 0,
            unpersisted: 0,
            log_every: 1,
            started: Instant::now(),
        }
    }

    pub fn on_start(&mut self, total: usize, already_done: usize) {
        self.total = total;
        self.already_done = already_done;
        self.started = Instant::now();
        // non-TTY: roughly one line per 5%
        self.log_every = (total / 20).max(1);
        self.bar = self.progress.run_bar(&self.phase, total as u64);
        log::info!(
            "{}: fetching {} records ({} already done)",
            self.phase,
            fmt_num(total),
            fmt_num(already_done)
        );
    }

    pub fn on_complete(&mut self, result: &FetchResult) {
        self.completed += 1;
        if let Some(err) = &result.error {
            self.failed += 1;
            log::warn!("{} id={}: {err}", self.phase, result.id);
            if let Err(e) = self.sink.record(&self.phase, &result.id, err) {
                log::warn!("Cannot write diagnostic entry to {}: {e}", self.sink.path().display());
            }
            self.bar.set_message(format!("{} failed", self.failed));
        }
        self.bar.inc(1);

        if !self.progress.is_tty()
            && (self.completed % self.log_every == 0 || self.completed == self.total)
        {
            log::info!(
                "{}: {}/{} done ({} failed)",
                self.phase,
                fmt_num(self.completed),
                fmt_num(self.total),
                fmt_num(self.failed)
            );
        }
    }

    /// A result that finished but never reached the checkpoint. It is
    /// neither a success nor a failure; the next run fetches it again.
    pub fn on_unpersisted(&mut self, result: &FetchResult) {
        self.unpersisted += 1;
        log::warn!("{} id={}: result not saved", self.phase, result.id);
        self.bar.inc(1);
    }

    /// Succeeded and failed count only results that reached the checkpoint.
    pub fn on_finish(self, stats: &RunStats) -> RunSummary {
        self.bar.finish_and_clear();
        RunSummary {
            phase: self.phase,
            already_done: self.already_done,
            total: stats.total,
            dispatched: stats.dispatched,
            succeeded: self.completed - self.failed,
            failed: self.failed,
            unpersisted: self.unpersisted,
            interrupted: stats.interrupted(),
            elapsed: self.started.elapsed(),
            diagnostics: self.sink.path().to_path_buf(),
            diagnostics_written: self.sink.entries(),
        }
    }
}

/// Final report of one phase run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub phase: String,
    /// Ids skipped because the checkpoint already had them
    pub already_done: usize,
    /// Size of the work set
    pub total: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Results lost to a checkpoint write error
    pub unpersisted: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
    pub diagnostics: PathBuf,
    pub diagnostics_written: usize,
}

impl RunSummary {
    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Already done", fmt_num(self.already_done)),
            ("Work set", fmt_num(self.total)),
            ("Dispatched", fmt_num(self.dispatched)),
            ("Succeeded", fmt_num(self.succeeded)),
            ("Failed", fmt_num(self.failed)),
            ("Time", format!("{:.1}s", self.elapsed.as_secs_f64())),
            ("Error log", self.diagnostics.display().to_string()),
        ];
        if self.unpersisted > 0 {
            rows.push(("Not saved", fmt_num(self.unpersisted)));
        }
        if self.interrupted {
            rows.push((
                "Interrupted",
                format!("{} not dispatched", fmt_num(self.total - self.dispatched)),
            ));
        }
        rows
    }

    /// Print a summary table on stderr (TTY mode)
    pub fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new(format!("{} summary", self.phase)).fg(Color::Cyan),
                Cell::new("Value").fg(Color::Cyan),
            ]);
        for (label, value) in self.rows() {
            table.add_row(vec![Cell::new(label), Cell::new(value)]);
        }
        eprintln!("\n{table}");
    }

    /// Log the summary (non-TTY mode)
    pub fn log(&self) {
        log::info!("=== {} summary ===", self.phase);
        for (label, value) in self.rows() {
            log::info!("{label}: {value}");
        }
    }
}
