//! Enricher Core - concurrent fetch-and-checkpoint engine
//!
//! Loads a record table, skips ids already present in the output checkpoint,
//! fans the rest out to a bounded worker pool and appends every result
//! (success or failure) to the checkpoint as it arrives. The checkpoint is
//! both the result store and the resume marker.

pub mod checkpoint;
pub mod controller;
pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod pool;
pub mod progress;
pub mod record;
pub mod report;
pub mod schema;
pub mod shutdown;
pub mod source;
pub mod work_queue;

// Re-exports for convenience
pub use checkpoint::{CheckpointWriter, DoneSet, read_checkpoint};
pub use controller::{RunController, RunState};
pub use diagnostics::DiagnosticSink;
pub use encoding::{DEFAULT_ENCODINGS, TextEncoding};
pub use error::{FetchError, LoadError};
pub use fetch::Fetcher;
pub use logging::{IndicatifLogger, init_logging};
pub use pool::WorkerPool;
pub use progress::ProgressContext;
pub use record::{FetchResult, Record, RunStats, WorkItem};
pub use report::{ProgressReporter, RunSummary};
pub use schema::PhaseLayout;
pub use shutdown::ShutdownFlag;
pub use source::{Loaded, RecordSource};
