//! `enricher status` - checkpoint row counts per phase

use anyhow::Result;

use enricher_scholar::StatusReport;

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let run_config = config.to_run_config(None)?;
    let report = StatusReport::compute(&run_config)?;
    report.print();
    Ok(())
}
