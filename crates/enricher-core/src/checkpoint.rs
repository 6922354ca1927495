//! Checkpoint table: the output CSV doubles as the resume marker.
//!
//! Exactly one writer per run. Every row is flushed and synced before
//! [`CheckpointWriter::append`] returns, so a killed process loses only
//! results that had not been appended yet.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::error::LoadError;
use crate::record::FetchResult;

/// Ids already present in a checkpoint.
pub type DoneSet = FxHashSet<String>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> LoadError + '_ {
    move |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> LoadError + '_ {
    move |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether the checkpoint needs its header written (missing or zero-length)
pub fn needs_header(path: &Path) -> bool {
    std::fs::metadata(path).map_or(true, |m| m.len() == 0)
}

/// Create the checkpoint with only the header row
pub fn create_checkpoint(path: &Path, header: &[String]) -> Result<(), LoadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err(path))?;
    }
    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(header).map_err(csv_err(path))?;
    writer.flush().map_err(io_err(path))?;
    writer.get_ref().sync_all().map_err(io_err(path))?;
    log::info!("Created checkpoint {}", path.display());
    Ok(())
}

/// Result of scanning checkpoint bytes.
#[derive(Debug, Default)]
struct Scan {
    header: Vec<String>,
    done: DoneSet,
    /// Rows that are not complete records (wrong width, unterminated, open quote)
    torn: usize,
    /// Byte length up to the end of the last complete record
    complete_len: u64,
}

/// A row is complete when it has `width` fields, ends on a line terminator
/// and has balanced quotes.
fn scan(bytes: &[u8], width: usize) -> Result<Scan, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(bytes);
    let mut record = csv::ByteRecord::new();
    let mut scan = Scan::default();

    if reader.read_byte_record(&mut record)? {
        scan.header = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        scan.complete_len = reader.position().byte();
    }

    loop {
        let start = reader.position().byte() as usize;
        if !reader.read_byte_record(&mut record)? {
            break;
        }
        let end = reader.position().byte() as usize;
        let raw = &bytes[start..end];
        let quotes = raw.iter().filter(|&&b| b == b'"').count();
        if record.len() != width || raw.last() != Some(&b'\n') || quotes % 2 != 0 {
            scan.torn += 1;
            continue;
        }
        scan.complete_len = end as u64;
        let id = String::from_utf8_lossy(record.get(0).unwrap_or_default()).into_owned();
        if !scan.done.insert(id.clone()) {
            log::warn!("Checkpoint has duplicate id {id}");
        }
    }
    Ok(scan)
}

/// Read the ids of an existing checkpoint, validating its header.
///
/// Incomplete rows (torn write from a killed process) are not counted, so
/// their ids are fetched again.
pub fn read_checkpoint(path: &Path, header: &[String]) -> Result<DoneSet, LoadError> {
    let bytes = std::fs::read(path).map_err(io_err(path))?;
    let scan = scan(&bytes, header.len()).map_err(csv_err(path))?;
    if scan.header != header {
        return Err(LoadError::HeaderMismatch {
            path: path.to_path_buf(),
            expected: header.to_vec(),
            found: scan.header,
        });
    }
    if scan.torn > 0 {
        log::warn!(
            "{}: ignoring {} incomplete rows",
            path.display(),
            scan.torn
        );
    }
    log::debug!("{}: {} ids already done", path.display(), scan.done.len());
    Ok(scan.done)
}

/// Appends one row per result, durably.
///
/// A failed append is rolled back to the previous length, so the file only
/// ever grows by whole rows.
pub struct CheckpointWriter {
    file: File,
    columns: Vec<String>,
    path: PathBuf,
    len: u64,
}

impl std::fmt::Debug for CheckpointWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointWriter")
            .field("path", &self.path)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl CheckpointWriter {
    /// Open an existing checkpoint for append. `header` is the full header
    /// (id column first); values are written in that order.
    ///
    /// Anything after the last complete record is cut off first.
    pub fn open(path: &Path, header: &[String]) -> io::Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut len = scan(&bytes, header.len())
            .map_err(io::Error::other)?
            .complete_len;
        if len < bytes.len() as u64 {
            log::warn!(
                "{}: dropping {} bytes of incomplete trailing row",
                path.display(),
                bytes.len() as u64 - len
            );
            file.set_len(len)?;
        }
        file.seek(SeekFrom::Start(len))?;
        // header written without a terminator
        if len > 0 && bytes[len as usize - 1] != b'\n' {
            file.write_all(b"\n")?;
            len += 1;
        }
        file.sync_data()?;

        Ok(Self::from_parts(file, path, header, len))
    }

    pub(crate) fn from_parts(file: File, path: &Path, header: &[String], len: u64) -> Self {
        Self {
            file,
            columns: header.iter().skip(1).cloned().collect(),
            path: path.to_path_buf(),
            len,
        }
    }

    /// Write one row, then sync before returning.
    pub fn append(&mut self, result: &FetchResult) -> io::Result<()> {
        let row: Vec<&str> = std::iter::once(result.id.as_str())
            .chain(self.columns.iter().map(|c| result.field(c).unwrap_or("")))
            .collect();
        let mut line = Vec::new();
        {
            let mut encoder = csv::Writer::from_writer(&mut line);
            encoder.write_record(&row).map_err(io::Error::other)?;
            encoder.flush()?;
        }

        if let Err(e) = self.write_line(&line) {
            self.rollback();
            return Err(e);
        }
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line)?;
        self.file.sync_data()?;
        self.len += line.len() as u64;
        Ok(())
    }

    fn rollback(&mut self) {
        let restored = self
            .file
            .set_len(self.len)
            .and_then(|()| self.file.seek(SeekFrom::Start(self.len)));
        if let Err(e) = restored {
            log::warn!(
                "{}: cannot roll back partial row: {e}",
                self.path.display()
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use tempfile::TempDir;

    fn header() -> Vec<String> {
        vec!["id".into(), "Name".into(), "Link".into()]
    }

    #[test]
    fn create_then_read_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        assert!(needs_header(&path));
        create_checkpoint(&path, &header()).unwrap();
        assert!(!needs_header(&path));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,Name,Link\n");
        assert!(read_checkpoint(&path, &header()).unwrap().is_empty());
    }

    #[test]
    fn append_writes_empty_for_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        create_checkpoint(&path, &header()).unwrap();

        let mut w = CheckpointWriter::open(&path, &header()).unwrap();
        w.append(&FetchResult::success("1").with("Name", Some("Ada".into())).with("Link", Some("http://a".into())))
            .unwrap();
        w.append(
            &FetchResult::failure("2", FetchError::NotFound("x".into()))
                .with("Name", Some("Bob, Jr.".into()))
                .with("Link", None),
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "id,Name,Link\n1,Ada,http://a\n2,\"Bob, Jr.\",\n"
        );
        let done = read_checkpoint(&path, &header()).unwrap();
        assert_eq!(done.len(), 2);
        assert!(done.contains("2"));
    }

    #[test]
    fn header_mismatch_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id,Other\n1,x\n").unwrap();
        let err = read_checkpoint(&path, &header()).unwrap_err();
        assert!(matches!(err, LoadError::HeaderMismatch { .. }));
    }

    #[test]
    fn torn_row_is_cut_before_next_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id,Name,Link\n1,Ada,http://a\n2,Bo").unwrap();

        let done = read_checkpoint(&path, &header()).unwrap();
        assert_eq!(done.len(), 1);
        assert!(done.contains("1"));

        let mut w = CheckpointWriter::open(&path, &header()).unwrap();
        w.append(&FetchResult::success("2")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,Name,Link\n1,Ada,http://a\n2,,\n");
    }

    #[test]
    fn open_quote_row_is_cut() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id,Name,Link\n1,Ada,http://a\n2,\"Bo").unwrap();

        let mut w = CheckpointWriter::open(&path, &header()).unwrap();
        w.append(&FetchResult::success("2").with("Name", Some("Bob".into())))
            .unwrap();
        w.append(&FetchResult::success("3")).unwrap();

        let done = read_checkpoint(&path, &header()).unwrap();
        assert_eq!(done.len(), 3);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,Name,Link\n1,Ada,http://a\n2,Bob,\n3,,\n");
    }

    #[test]
    fn full_width_row_without_newline_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id,Name,Link\n1,Ada,http://a\n2,Bob,http://b/tru").unwrap();

        let done = read_checkpoint(&path, &header()).unwrap();
        assert!(!done.contains("2"));
        CheckpointWriter::open(&path, &header()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,Name,Link\n1,Ada,http://a\n");
    }

    #[test]
    fn quoted_newline_row_is_complete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id,Name,Link\n1,\"Ada\nLovelace\",http://a\n").unwrap();

        let done = read_checkpoint(&path, &header()).unwrap();
        assert!(done.contains("1"));
        CheckpointWriter::open(&path, &header()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "id,Name,Link\n1,\"Ada\nLovelace\",http://a\n"
        );
    }

    #[test]
    fn unterminated_header_gets_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id,Name,Link").unwrap();

        let mut w = CheckpointWriter::open(&path, &header()).unwrap();
        w.append(&FetchResult::success("1")).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,Name,Link\n1,,\n");
    }

    #[test]
    fn failed_append_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        create_checkpoint(&path, &header()).unwrap();

        // read-only handle: every write fails
        let file = File::open(&path).unwrap();
        let mut w = CheckpointWriter::from_parts(file, &path, &header(), 13);
        assert!(w.append(&FetchResult::success("1")).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,Name,Link\n");
    }
}
