//! Fetcher contract shared by every phase

use crate::record::{FetchResult, Record, WorkItem};

/// One unit of work: record in, result out.
///
/// `fetch` must not panic and must return a result carrying `item.id`.
/// Failures are reported through [`FetchResult::failure`]. The pool still
/// guards against violations (see [`crate::pool`]).
///
/// Invocations run concurrently from several workers, so implementations
/// must not share mutable state between calls; any session or handle is
/// acquired inside `fetch` and dropped before it returns.
pub trait Fetcher: Sync {
    /// Record-derived fields this variant needs
    type Input: Send + Sync;

    fn input(&self, record: &Record) -> Self::Input;

    fn fetch(&self, item: &WorkItem<Self::Input>) -> FetchResult;

    fn work_item(&self, record: &Record) -> WorkItem<Self::Input> {
        WorkItem {
            id: record.id.clone(),
            input: self.input(record),
        }
    }
}
