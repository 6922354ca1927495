//! Checkpoint inspection for the `status` command

use std::path::{Path, PathBuf};

use anyhow::Context;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use enricher_core::progress::fmt_num;

use crate::config::Config;
use crate::phase::{LINK_COL, PROFILE_NAME_COL, Phase};

/// Row counts of one phase checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStatus {
    pub phase: Phase,
    pub path: PathBuf,
    /// `None` when the checkpoint does not exist yet
    pub rows: Option<usize>,
    /// Rows whose phase result column is filled
    pub filled: usize,
    pub empty: usize,
}

impl PhaseStatus {
    pub fn compute(phase: Phase, config: &Config) -> anyhow::Result<Self> {
        let path = phase.output_path(config).to_path_buf();
        let mut status = Self {
            phase,
            path,
            rows: None,
            filled: 0,
            empty: 0,
        };
        if !status.path.exists() {
            return Ok(status);
        }

        let column = match phase {
            Phase::Resolve => LINK_COL,
            Phase::Details => PROFILE_NAME_COL,
        };
        let (filled, empty) = count_filled(&status.path, column)?;
        status.rows = Some(filled + empty);
        status.filled = filled;
        status.empty = empty;
        Ok(status)
    }

    fn result_label(&self) -> &'static str {
        match self.phase {
            Phase::Resolve => "link",
            Phase::Details => "profile",
        }
    }
}

/// Count rows with a non-empty `column`; torn rows are ignored
fn count_filled(path: &Path, column: &str) -> anyhow::Result<(usize, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Cannot open {}", path.display()))?;
    let header = reader
        .headers()
        .with_context(|| format!("Cannot read header of {}", path.display()))?
        .clone();
    let idx = header
        .iter()
        .position(|h| h == column)
        .with_context(|| format!("{} has no {column:?} column", path.display()))?;

    let (mut filled, mut empty) = (0, 0);
    for row in reader.records() {
        let Ok(row) = row else { continue };
        if row.len() != header.len() {
            continue;
        }
        match row.get(idx) {
            Some(v) if !v.trim().is_empty() => filled += 1,
            _ => empty += 1,
        }
    }
    Ok((filled, empty))
}

/// Status of both phases
#[derive(Debug)]
pub struct StatusReport {
    pub phases: Vec<PhaseStatus>,
}

impl StatusReport {
    pub fn compute(config: &Config) -> anyhow::Result<Self> {
        let phases = Phase::ALL
            .iter()
            .map(|&phase| PhaseStatus::compute(phase, config))
            .collect::<anyhow::Result<_>>()?;
        Ok(Self { phases })
    }

    /// Print as a table
    pub fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Phase").fg(Color::Cyan),
                Cell::new("Checkpoint").fg(Color::Cyan),
                Cell::new("Rows").fg(Color::Cyan),
                Cell::new("With result").fg(Color::Cyan),
                Cell::new("Without").fg(Color::Cyan),
            ]);
        for s in &self.phases {
            let (rows, filled, empty) = match s.rows {
                Some(rows) => (fmt_num(rows), fmt_num(s.filled), fmt_num(s.empty)),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };
            table.add_row(vec![
                Cell::new(s.phase),
                Cell::new(s.path.display()),
                Cell::new(rows),
                Cell::new(format!("{filled} ({})", s.result_label())),
                Cell::new(empty),
            ]);
        }
        println!("{table}");
    }
}
