//! End-to-end engine tests with an in-memory fetcher.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use enricher_core::{
    DEFAULT_ENCODINGS, FetchError, FetchResult, Fetcher, LoadError, PhaseLayout, ProgressContext,
    Record, RecordSource, RunController, RunState, ShutdownFlag, WorkItem, WorkerPool,
};
use tempfile::TempDir;

#[derive(Clone, Copy)]
enum Outcome {
    Link,
    NotFound,
    Panic,
}

/// Resolves `name` to `http://x/<id>`; behaviour per id is scripted.
struct ScriptedFetcher {
    outcomes: HashMap<String, Outcome>,
    delay_ms: HashMap<String, u64>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    /// Request shutdown after this many calls
    stop_after: Option<(usize, ShutdownFlag)>,
}

impl ScriptedFetcher {
    fn new(outcomes: &[(&str, Outcome)]) -> Self {
        Self {
            outcomes: outcomes
                .iter()
                .map(|(id, o)| (id.to_string(), *o))
                .collect(),
            delay_ms: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            stop_after: None,
        }
    }
}

impl Fetcher for ScriptedFetcher {
    type Input = String;

    fn input(&self, record: &Record) -> String {
        record.get("name").unwrap_or_default().to_string()
    }

    fn fetch(&self, item: &WorkItem<String>) -> FetchResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(ms) = self.delay_ms.get(&item.id) {
            std::thread::sleep(Duration::from_millis(*ms));
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some((k, flag)) = &self.stop_after {
            if n >= *k {
                flag.request();
            }
        }

        let base = |r: FetchResult| r.with("Name", Some(item.input.clone()));
        match self.outcomes.get(&item.id).copied().unwrap_or(Outcome::Link) {
            Outcome::Link => base(FetchResult::success(item.id.clone()))
                .with("Link", Some(format!("http://x/{}", item.id))),
            Outcome::NotFound => base(FetchResult::failure(
                item.id.clone(),
                FetchError::NotFound(format!("no link for {}", item.input)),
            ))
            .with("Link", None),
            Outcome::Panic => panic!("scripted defect"),
        }
    }
}

fn layout() -> PhaseLayout {
    PhaseLayout {
        name: "resolve".to_string(),
        id_column: "id".to_string(),
        required: vec!["name".to_string()],
        optional: vec!["org".to_string()],
        output: vec!["Name".to_string(), "Link".to_string()],
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(input: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("in.csv"), input).unwrap();
        Self { dir }
    }

    fn checkpoint(&self) -> PathBuf {
        self.dir.path().join("out.csv")
    }

    fn errors(&self) -> PathBuf {
        self.dir.path().join("errors.log")
    }

    fn run(
        &self,
        fetcher: &ScriptedFetcher,
        workers: usize,
        shutdown: ShutdownFlag,
    ) -> (Result<enricher_core::RunSummary, LoadError>, RunState) {
        let source = RecordSource::new(
            self.dir.path().join("in.csv"),
            self.checkpoint(),
            DEFAULT_ENCODINGS.to_vec(),
        );
        let pool = WorkerPool::new(workers, shutdown).unwrap();
        let progress = ProgressContext::with_tty(false);
        let mut controller = RunController::new(layout(), source, &pool, &progress, self.errors());
        let result = controller.run(fetcher);
        (result, controller.state())
    }
}

/// Data rows of a checkpoint, keyed by id; panics on duplicate ids.
fn rows(path: &Path) -> HashMap<String, Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let mut out = HashMap::new();
    for row in reader.records() {
        let row = row.unwrap();
        let fields: Vec<String> = row.iter().map(str::to_string).collect();
        assert!(
            out.insert(fields[0].clone(), fields).is_none(),
            "duplicate id in checkpoint"
        );
    }
    out
}

const THREE: &str = "id,name\n1,Ada\n2,Bob\n3,Cy\n";

#[test]
fn scenario_a_not_found_is_checkpointed() {
    let fx = Fixture::new(THREE);
    let fetcher = ScriptedFetcher::new(&[("2", Outcome::NotFound)]);
    let (result, state) = fx.run(&fetcher, 2, ShutdownFlag::new());
    let summary = result.unwrap();

    assert_eq!(state, RunState::Done);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let rows = rows(&fx.checkpoint());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows["2"], vec!["2", "Bob", ""]);
    assert_eq!(rows["1"][2], "http://x/1");

    let log = std::fs::read_to_string(fx.errors()).unwrap();
    assert!(log.contains("[resolve] id=2 not_found"));
}

#[test]
fn scenario_b_existing_rows_untouched() {
    let fx = Fixture::new(THREE);
    std::fs::write(fx.checkpoint(), "id,Name,Link\n1,Original,http://kept\n").unwrap();
    let fetcher = ScriptedFetcher::new(&[]);
    let summary = fx.run(&fetcher, 2, ShutdownFlag::new()).0.unwrap();

    assert_eq!(summary.already_done, 1);
    assert_eq!(summary.total, 2);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

    let content = std::fs::read_to_string(fx.checkpoint()).unwrap();
    assert!(content.starts_with("id,Name,Link\n1,Original,http://kept\n"));
    assert_eq!(rows(&fx.checkpoint()).len(), 3);
}

#[test]
fn torn_checkpoint_row_is_refetched_once() {
    for torn in ["2,\"Bo", "2,Bo"] {
        let fx = Fixture::new(THREE);
        std::fs::write(
            fx.checkpoint(),
            format!("id,Name,Link\n1,Ada,http://x/1\n{torn}"),
        )
        .unwrap();

        let first = ScriptedFetcher::new(&[]);
        let summary = fx.run(&first, 2, ShutdownFlag::new()).0.unwrap();
        assert_eq!(summary.already_done, 1);
        assert_eq!(summary.dispatched, 2);

        let second = ScriptedFetcher::new(&[]);
        let summary = fx.run(&second, 2, ShutdownFlag::new()).0.unwrap();
        assert_eq!(summary.already_done, 3);
        assert_eq!(summary.dispatched, 0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);

        // panics on a duplicate id
        let rows = rows(&fx.checkpoint());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows["2"], vec!["2", "Bob", "http://x/2"]);
    }
}

#[test]
fn scenario_c_staggered_latency_unique_ids() {
    let fx = Fixture::new("id,name\n1,A\n2,B\n3,C\n4,D\n5,E\n");
    let mut fetcher = ScriptedFetcher::new(&[]);
    fetcher.delay_ms = [("1", 120), ("2", 10), ("3", 60), ("4", 5), ("5", 30)]
        .iter()
        .map(|(id, ms)| (id.to_string(), *ms))
        .collect();
    let summary = fx.run(&fetcher, 2, ShutdownFlag::new()).0.unwrap();

    assert_eq!(summary.dispatched, 5);
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    let rows = rows(&fx.checkpoint());
    let mut ids: Vec<&String> = rows.keys().collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn scenario_d_missing_id_column_fails_before_dispatch() {
    let fx = Fixture::new("name\nAda\nBob\n");
    let fetcher = ScriptedFetcher::new(&[]);
    let (result, state) = fx.run(&fetcher, 2, ShutdownFlag::new());

    assert_eq!(state, RunState::Failed);
    assert!(matches!(result, Err(LoadError::MissingColumns { .. })));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(!fx.checkpoint().exists());
    let log = std::fs::read_to_string(fx.errors()).unwrap();
    assert!(log.contains("id=- schema error"));
}

#[test]
fn header_mismatch_fails_and_leaves_checkpoint_alone() {
    let fx = Fixture::new(THREE);
    std::fs::write(fx.checkpoint(), "id,Other\n1,x\n").unwrap();
    let fetcher = ScriptedFetcher::new(&[]);
    let (result, state) = fx.run(&fetcher, 2, ShutdownFlag::new());

    assert_eq!(state, RunState::Failed);
    assert!(matches!(result, Err(LoadError::HeaderMismatch { .. })));
    assert_eq!(
        std::fs::read_to_string(fx.checkpoint()).unwrap(),
        "id,Other\n1,x\n"
    );
}

#[test]
fn second_run_is_idempotent() {
    let fx = Fixture::new(THREE);
    let first = ScriptedFetcher::new(&[("2", Outcome::NotFound)]);
    fx.run(&first, 3, ShutdownFlag::new()).0.unwrap();
    let before = std::fs::read(fx.checkpoint()).unwrap();

    let second = ScriptedFetcher::new(&[]);
    let summary = fx.run(&second, 3, ShutdownFlag::new()).0.unwrap();
    assert_eq!(summary.total, 0);
    assert_eq!(summary.already_done, 3);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read(fx.checkpoint()).unwrap(), before);
}

#[test]
fn interrupted_run_resumes_to_full_coverage() {
    let input: String = std::iter::once("id,name".to_string())
        .chain((1..=10).map(|i| format!("{i},N{i}")))
        .collect::<Vec<_>>()
        .join("\n");
    let fx = Fixture::new(&input);

    let shutdown = ShutdownFlag::new();
    let mut first = ScriptedFetcher::new(&[]);
    first.stop_after = Some((4, shutdown.clone()));
    let (result, state) = fx.run(&first, 1, shutdown);
    let summary = result.unwrap();
    assert_eq!(state, RunState::Done);
    assert!(summary.interrupted);
    assert_eq!(summary.dispatched, 4);
    assert_eq!(rows(&fx.checkpoint()).len(), 4);

    let second = ScriptedFetcher::new(&[]);
    let summary = fx.run(&second, 3, ShutdownFlag::new()).0.unwrap();
    assert_eq!(summary.already_done, 4);
    assert_eq!(summary.dispatched, 6);
    assert_eq!(rows(&fx.checkpoint()).len(), 10);
}

#[test]
fn panicking_fetch_is_isolated() {
    let fx = Fixture::new(THREE);
    let fetcher = ScriptedFetcher::new(&[("1", Outcome::Panic)]);
    let summary = fx.run(&fetcher, 2, ShutdownFlag::new()).0.unwrap();

    assert_eq!(summary.succeeded + summary.failed, summary.dispatched);
    assert_eq!(summary.failed, 1);
    let rows = rows(&fx.checkpoint());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows["1"], vec!["1", "", ""]);
    assert_eq!(rows["3"][2], "http://x/3");
}
