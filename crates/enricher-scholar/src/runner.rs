//! Phase execution: wires config, collaborator and engine together

use anyhow::Context;
use enricher_core::{
    ProgressContext, RecordSource, RunController, RunSummary, ShutdownFlag, WorkerPool,
};

use crate::config::Config;
use crate::fetcher::{DetailFetcher, ResolveFetcher};
use crate::phase::Phase;
use crate::profile::ProfileSource;

/// Run one phase to completion (or until shutdown is requested).
///
/// Per-record failures are part of the summary; only load errors and
/// setup failures surface as `Err`.
pub fn run<S: ProfileSource>(
    phase: Phase,
    config: &Config,
    source: &S,
    progress: &ProgressContext,
    shutdown: ShutdownFlag,
) -> anyhow::Result<RunSummary> {
    let input = phase.input_path(config);
    let output = phase.output_path(config);
    log::info!(
        "{phase} starting: input={}, output={}, workers={}",
        input.display(),
        output.display(),
        config.workers
    );

    let pool = WorkerPool::new(config.workers, shutdown).context("Failed to create thread pool")?;
    let records = RecordSource::new(
        input.to_path_buf(),
        output.to_path_buf(),
        config.encodings.clone(),
    );
    let mut controller = RunController::new(
        phase.layout(&config.columns),
        records,
        &pool,
        progress,
        config.error_log.clone(),
    );

    let summary = match phase {
        Phase::Resolve => controller.run(&ResolveFetcher::new(source, config.columns.clone())),
        Phase::Details => controller.run(&DetailFetcher::new(source)),
    }
    .with_context(|| format!("{phase} phase failed"))?;

    if summary.interrupted {
        log::warn!(
            "{phase} interrupted after {} of {} items; rerun to resume",
            summary.dispatched,
            summary.total
        );
    }
    Ok(summary)
}
