//! Append-only diagnostic log: one line per failed record.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::FetchError;

pub struct DiagnosticSink {
    file: File,
    path: PathBuf,
    entries: usize,
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("path", &self.path)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl DiagnosticSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries: 0,
        })
    }

    /// Record a per-record failure
    pub fn record(&mut self, phase: &str, id: &str, error: &FetchError) -> io::Result<()> {
        self.write_line(phase, id, &error.to_string())
    }

    /// Record a fatal, run-level error (no record id)
    pub fn record_fatal(&mut self, phase: &str, message: &str) -> io::Result<()> {
        self.write_line(phase, "-", message)
    }

    fn write_line(&mut self, phase: &str, id: &str, message: &str) -> io::Result<()> {
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        // keep one entry per line even for multi-line messages
        let message = message.replace(['\r', '\n'], " ");
        writeln!(self.file, "{ts} ERROR [{phase}] id={id} {message}")?;
        self.file.flush()?;
        self.entries += 1;
        Ok(())
    }

    /// Entries written by this sink
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
