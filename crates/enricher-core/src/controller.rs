//! RunController: load -> diff -> dispatch -> drain -> report.
//!
//! `Failed` is only reachable from `Loading`. Once dispatching starts,
//! individual failures are data and the run always reaches `Reporting`.

use std::fmt;
use std::path::PathBuf;

use crate::checkpoint::CheckpointWriter;
use crate::diagnostics::DiagnosticSink;
use crate::error::LoadError;
use crate::fetch::Fetcher;
use crate::pool::WorkerPool;
use crate::progress::ProgressContext;
use crate::record::FetchResult;
use crate::report::{ProgressReporter, RunSummary};
use crate::schema::PhaseLayout;
use crate::shutdown::ShutdownFlag;
use crate::source::RecordSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loading,
    Dispatching,
    Draining,
    Reporting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct RunController<'a> {
    layout: PhaseLayout,
    source: RecordSource,
    pool: &'a WorkerPool,
    progress: &'a ProgressContext,
    diagnostics: PathBuf,
    state: RunState,
}

impl<'a> RunController<'a> {
    pub fn new(
        layout: PhaseLayout,
        source: RecordSource,
        pool: &'a WorkerPool,
        progress: &'a ProgressContext,
        diagnostics: PathBuf,
    ) -> Self {
        Self {
            layout,
            source,
            pool,
            progress,
            diagnostics,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        log::debug!("{}: {} -> {next}", self.layout.name, self.state);
        self.state = next;
    }

    /// Run one phase end to end.
    ///
    /// Errors are fatal load errors only; the fatal message is also written
    /// to the diagnostic sink.
    pub fn run<F: Fetcher>(&mut self, fetcher: &F) -> Result<RunSummary, LoadError> {
        self.transition(RunState::Loading);
        let mut sink = match DiagnosticSink::open(&self.diagnostics) {
            Ok(sink) => sink,
            Err(source) => {
                self.transition(RunState::Failed);
                return Err(LoadError::Io {
                    path: self.diagnostics.clone(),
                    source,
                });
            }
        };

        let (loaded, writer) = match self.load() {
            Ok(v) => v,
            Err(e) => {
                self.transition(RunState::Failed);
                log::error!("{}: {e}", self.layout.name);
                if let Err(io) = sink.record_fatal(&self.layout.name, &e.to_string()) {
                    log::warn!("Cannot write diagnostic entry: {io}");
                }
                return Err(e);
            }
        };

        self.transition(RunState::Dispatching);
        let items: Vec<_> = loaded
            .work_set
            .iter()
            .map(|record| fetcher.work_item(record))
            .collect();
        drop(loaded.work_set);

        let mut reporter = ProgressReporter::new(&self.layout.name, self.progress, sink);
        reporter.on_start(items.len(), loaded.already_done.len());

        self.transition(RunState::Draining);
        let mut drain = Drain::new(writer, reporter, self.pool.shutdown().clone());
        let stats = self.pool.run(items, fetcher, |result| drain.accept(result));
        let Drain { writer, reporter, .. } = drain;

        self.transition(RunState::Reporting);
        let summary = reporter.on_finish(&stats);
        if self.progress.is_tty() {
            summary.print();
        } else {
            summary.log();
        }
        log::info!(
            "{}: results saved to {}",
            self.layout.name,
            writer.path().display()
        );

        self.transition(RunState::Done);
        Ok(summary)
    }

    fn load(&self) -> Result<(crate::source::Loaded, CheckpointWriter), LoadError> {
        let loaded = self.source.load(&self.layout)?;
        let writer = CheckpointWriter::open(&self.source.checkpoint, &self.layout.header())
            .map_err(|source| LoadError::Io {
                path: self.source.checkpoint.clone(),
                source,
            })?;
        Ok((loaded, writer))
    }
}

/// Single consumer of completed results: append first, then account.
///
/// After the first append error nothing more is written; later results are
/// reported as unpersisted and admission stops.
struct Drain<'a> {
    writer: CheckpointWriter,
    reporter: ProgressReporter<'a>,
    shutdown: ShutdownFlag,
    halted: bool,
}

impl<'a> Drain<'a> {
    fn new(
        writer: CheckpointWriter,
        reporter: ProgressReporter<'a>,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            writer,
            reporter,
            shutdown,
            halted: false,
        }
    }

    fn accept(&mut self, result: FetchResult) {
        if self.halted {
            self.reporter.on_unpersisted(&result);
            return;
        }
        if let Err(e) = self.writer.append(&result) {
            log::error!(
                "Cannot append id {} to {}: {e}; stopping admission",
                result.id,
                self.writer.path().display()
            );
            self.halted = true;
            self.shutdown.request();
            self.reporter.on_unpersisted(&result);
            return;
        }
        self.reporter.on_complete(&result);
    }
}
