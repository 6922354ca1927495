//! Record model shared by every phase

use std::collections::BTreeMap;

use crate::error::FetchError;

/// One input entity. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub payload: BTreeMap<String, Option<String>>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: BTreeMap::new(),
        }
    }

    /// Builder-style field setter (used by loaders and tests)
    pub fn with(mut self, field: impl Into<String>, value: Option<&str>) -> Self {
        self.payload
            .insert(field.into(), value.map(str::to_string));
        self
    }

    /// Field value, `None` when the column is absent or the cell is empty
    pub fn get(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(|v| v.as_deref())
    }
}

/// A record queued for one fetch phase.
///
/// `input` holds only what the fetcher variant needs.
#[derive(Debug, Clone)]
pub struct WorkItem<I> {
    pub id: String,
    pub input: I,
}

/// Outcome of processing one work item. Failures carry the id too, so they
/// are checkpointed like successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub id: String,
    pub fields: BTreeMap<String, Option<String>>,
    pub error: Option<FetchError>,
}

impl FetchResult {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: FetchError) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            error: Some(error),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: Option<String>) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }
}

/// Aggregate counts for one pool run.
///
/// `succeeded + failed == dispatched` always; `dispatched < total` only when
/// admission was stopped early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn record(&mut self, result: &FetchResult) {
        self.dispatched += 1;
        if result.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn interrupted(&self) -> bool {
        self.dispatched < self.total
    }
}
