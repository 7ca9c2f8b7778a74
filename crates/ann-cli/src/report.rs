//! Benchmark output: `<path>.csv` (one row per query), `<path>.json` (run
//! summary), and `<path>.checkpoint.json` (a companion recording that the
//! run completed, for a caller stitching together multiple harness
//! invocations) — the three artifacts `spec.md` §6 requires of `--output`.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Per-query outcome recorded as one CSV row.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    /// Index of the query within the generated query set.
    pub query_index: usize,
    /// Recall@k against the brute-force ground truth.
    pub recall: f64,
    /// Wall-clock search latency in microseconds.
    pub latency_micros: u128,
    /// Nodes whose approximate score was evaluated.
    pub visited: usize,
    /// Nodes popped off the candidate queue and expanded.
    pub expanded: usize,
    /// Results actually returned (`<= top_k`).
    pub returned: usize,
}

/// Aggregate statistics plus the resolved configuration, written as
/// `<path>.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Number of base vectors the graph was built over.
    pub dataset_vectors: usize,
    /// Dimensionality of the dataset.
    pub dataset_dimension: usize,
    /// Number of queries run.
    pub query_count: usize,
    /// Mean recall@k across every query.
    pub mean_recall: f64,
    /// Mean precision@k across every query.
    pub mean_precision: f64,
    /// Mean reciprocal rank across every query.
    pub mean_mrr: f64,
    /// Wall-clock time spent building the graph, in milliseconds.
    pub build_millis: u128,
    /// Mean per-query search latency, in microseconds.
    pub mean_query_latency_micros: f64,
}

/// Minimal "this run completed" marker, so a caller orchestrating several
/// harness invocations can tell which ones finished without reparsing the
/// full CSV/JSON pair.
#[derive(Debug, Clone, Serialize)]
pub struct Checkpoint {
    /// `true` once every query has been scored and written out.
    pub completed: bool,
    /// Number of queries actually scored (equals `query_count` on success).
    pub queries_completed: usize,
}

/// Writes `records` to `<path>.csv`, `summary` to `<path>.json`, and a
/// completion marker to `<path>.checkpoint.json`.
///
/// # Errors
///
/// Returns an error on any I/O or serialization failure; partial output
/// from an earlier file in the sequence may remain on disk.
pub fn write_all(path: &Path, records: &[QueryRecord], summary: &RunSummary) -> anyhow::Result<()> {
    let csv_path = with_suffix(path, "csv");
    let json_path = with_suffix(path, "json");
    let checkpoint_path = with_suffix(path, "checkpoint.json");

    let mut writer = csv::Writer::from_path(&csv_path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&json_path, json)?;

    let checkpoint = Checkpoint { completed: true, queries_completed: records.len() };
    std::fs::write(&checkpoint_path, serde_json::to_string_pretty(&checkpoint)?)?;
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(suffix);
    std::path::PathBuf::from(os)
}

/// Converts a search latency to whole microseconds for [`QueryRecord`].
#[must_use]
pub fn micros(d: Duration) -> u128 {
    d.as_micros()
}
