//! `enricher run <phase>` - run one enrichment phase

use anyhow::{Context, Result};
use clap::Args;

use enricher_core::{ProgressContext, ShutdownFlag};
use enricher_scholar::{HttpProfileSource, Phase};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Phase to run: resolve (alias: initial) or details
    #[arg(value_parser = parse_phase)]
    pub phase: Phase,

    /// Number of parallel workers (overrides search.max_workers)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

fn parse_phase(s: &str) -> Result<Phase, String> {
    Phase::from_name(s)
        .ok_or_else(|| format!("unknown phase {s:?} (expected resolve, initial or details)"))
}

/// An interrupted run still reports and counts as completed; the rerun
/// resumes from the checkpoint.
pub fn run(args: RunArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let run_config = config.to_run_config(args.workers)?;

    let shutdown = ShutdownFlag::new();
    shutdown
        .register_signals()
        .context("Failed to register signal handlers")?;

    let source = HttpProfileSource::new(run_config.search.clone())?;
    enricher_scholar::run(args.phase, &run_config, &source, progress, shutdown)?;
    Ok(())
}
