//! RecordSource: load the input table, diff it against the checkpoint.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::checkpoint::{DoneSet, create_checkpoint, needs_header, read_checkpoint};
use crate::encoding::{TextEncoding, decode_with_fallback};
use crate::error::LoadError;
use crate::record::Record;
use crate::schema::PhaseLayout;

/// Result of loading: records still to fetch plus ids already checkpointed.
#[derive(Debug)]
pub struct Loaded {
    pub work_set: Vec<Record>,
    pub already_done: DoneSet,
    /// Input rows before the checkpoint diff (after id de-duplication)
    pub input_rows: usize,
}

/// Loads input records and the existing checkpoint for one phase.
#[derive(Debug, Clone)]
pub struct RecordSource {
    pub input: PathBuf,
    pub checkpoint: PathBuf,
    pub encodings: Vec<TextEncoding>,
}

impl RecordSource {
    pub fn new(input: PathBuf, checkpoint: PathBuf, encodings: Vec<TextEncoding>) -> Self {
        Self {
            input,
            checkpoint,
            encodings,
        }
    }

    /// Load the input, then read (or create) the checkpoint.
    ///
    /// The input is fully validated first, so a malformed input never
    /// touches the checkpoint.
    pub fn load(&self, layout: &PhaseLayout) -> Result<Loaded, LoadError> {
        let records = read_records(&self.input, layout, &self.encodings)?;
        let header = layout.header();

        let already_done = if needs_header(&self.checkpoint) {
            create_checkpoint(&self.checkpoint, &header)?;
            DoneSet::default()
        } else {
            read_checkpoint(&self.checkpoint, &header)?
        };

        let input_rows = records.len();
        let work_set: Vec<Record> = records
            .into_iter()
            .filter(|r| !already_done.contains(&r.id))
            .collect();

        log::info!(
            "{}: {} input rows, {} already checkpointed, {} to fetch",
            layout.name,
            input_rows,
            input_rows - work_set.len(),
            work_set.len()
        );

        Ok(Loaded {
            work_set,
            already_done,
            input_rows,
        })
    }
}

/// Read and validate an input table. Duplicate ids keep their first row.
pub fn read_records(
    path: &Path,
    layout: &PhaseLayout,
    encodings: &[TextEncoding],
) -> Result<Vec<Record>, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, encoding) =
        decode_with_fallback(&bytes, encodings).ok_or_else(|| LoadError::Encoding {
            path: path.to_path_buf(),
            tried: encodings.iter().map(|e| e.label().to_string()).collect(),
        })?;
    log::debug!("{}: decoded as {encoding}", path.display());

    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    // short rows read as empty trailing cells
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());
    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    log::info!("Read {} (columns: {})", path.display(), columns.join(", "));

    let missing = layout.missing_columns(&columns);
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let index_of = |name: &str| columns.iter().position(|c| c == name);
    let id_idx = index_of(&layout.id_column);
    let fields: Vec<(&String, Option<usize>)> = layout
        .required
        .iter()
        .chain(layout.optional.iter())
        .map(|name| (name, index_of(name)))
        .collect();

    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_err)?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let Some(id) = cell(id_idx) else {
            log::warn!("{}: skipping row with empty id", path.display());
            continue;
        };
        if !seen.insert(id.to_string()) {
            log::warn!("{}: duplicate id {id}, keeping first row", path.display());
            continue;
        }
        let record = fields
            .iter()
            .fold(Record::new(id), |r, (name, idx)| {
                r.with(name.as_str(), cell(*idx))
            });
        records.push(record);
    }

    log::info!("Number of rows: {}", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::DEFAULT_ENCODINGS;
    use tempfile::TempDir;

    fn layout() -> PhaseLayout {
        PhaseLayout {
            name: "resolve".to_string(),
            id_column: "id".to_string(),
            required: vec!["name".to_string()],
            optional: vec!["org".to_string()],
            output: vec!["Link".to_string()],
        }
    }

    #[test]
    fn optional_column_may_be_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "id,name\n1,Ada\n2,Bob\n").unwrap();
        let records = read_records(&path, &layout(), DEFAULT_ENCODINGS).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Some("Ada"));
        assert_eq!(records[0].get("org"), None);
    }

    #[test]
    fn empty_cells_become_none_and_duplicates_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "id,name,org\n1,Ada,\n1,Again,X\n,NoId,Y\n").unwrap();
        let records = read_records(&path, &layout(), DEFAULT_ENCODINGS).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("name"), Some("Ada"));
        assert_eq!(records[0].get("org"), None);
    }

    #[test]
    fn missing_id_column_fails_without_creating_checkpoint() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        let checkpoint = dir.path().join("out.csv");
        std::fs::write(&input, "name\nAda\n").unwrap();

        let source = RecordSource::new(input, checkpoint.clone(), DEFAULT_ENCODINGS.to_vec());
        let err = source.load(&layout()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumns { ref missing, .. } if missing == &vec!["id".to_string()]
        ));
        assert!(!checkpoint.exists());
    }

    #[test]
    fn encoding_error_when_all_fail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, b"id,name\n1,Jos\xE9\n").unwrap();
        let err = read_records(&path, &layout(), &[TextEncoding::Utf8]).unwrap_err();
        assert!(matches!(err, LoadError::Encoding { .. }));
    }

    #[test]
    fn latin1_input_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, b"id,name\n1,Jos\xE9\n").unwrap();
        let records = read_records(&path, &layout(), DEFAULT_ENCODINGS).unwrap();
        assert_eq!(records[0].get("name"), Some("José"));
    }

    #[test]
    fn load_diffs_against_checkpoint() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        let checkpoint = dir.path().join("out.csv");
        std::fs::write(&input, "id,name\n1,Ada\n2,Bob\n3,Cy\n").unwrap();
        std::fs::write(&checkpoint, "id,Link\n1,http://a\n").unwrap();

        let source = RecordSource::new(input, checkpoint, DEFAULT_ENCODINGS.to_vec());
        let loaded = source.load(&layout()).unwrap();
        let ids: Vec<&str> = loaded.work_set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert!(loaded.already_done.contains("1"));
        assert_eq!(loaded.input_rows, 3);
    }
}
