//! `ann-cli`: a thin benchmark-harness binary over `ann-core`.
//!
//! Usage:
//!   `ann-cli --config ./bench.toml --output ./run1`
//!
//! Generates a reproducible synthetic dataset, builds a graph over it,
//! searches it with held-out queries, and writes the recall/latency
//! results out as `<output>.csv` + `<output>.json` + a
//! `<output>.checkpoint.json` companion.

mod bench_config;
mod dataset;
mod report;

use ann_core::bits::AllBits;
use ann_core::score_provider::{BuildScoreProvider, RandomAccessScoreProvider};
use ann_core::{metrics, search, BuildParams, GraphBuilder, SearchParams, VectorSource};
use anyhow::Context;
use bench_config::BenchConfig;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use report::{QueryRecord, RunSummary};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "ann-cli")]
#[command(author, version, about = "Benchmark harness for the ann-core graph index")]
struct Cli {
    /// Path to a TOML configuration file (`ANNBENCH_*` env vars and
    /// built-in defaults fill in anything it omits).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output path stem; results are written to `<output>.csv`,
    /// `<output>.json`, and `<output>.checkpoint.json`.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn progress_bar(total: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = BenchConfig::load(cli.config.as_deref()).context("failed to load benchmark configuration")?;

    tracing::info!(vectors = config.dataset.vectors, dimension = config.dataset.dimension, "generating dataset");
    let data = dataset::generate(&config.dataset)?;

    let base = Arc::new(data.base);
    let provider: Arc<dyn BuildScoreProvider> =
        Arc::new(RandomAccessScoreProvider::new(Arc::clone(&base), config.dataset.similarity));

    let build_params = BuildParams {
        max_degree: config.graph.build.max_degree,
        beam_width: config.graph.build.beam_width,
        alpha: config.graph.build.alpha,
        neighbor_overflow: config.graph.build.neighbor_overflow,
        add_hierarchy: config.graph.build.add_hierarchy,
    };

    let build_bar = progress_bar(base.size(), "building graph");
    let builder = GraphBuilder::new(Arc::clone(&provider), Arc::clone(&base), build_params);
    let build_start = Instant::now();
    builder.build();
    builder.cleanup();
    let build_millis = build_start.elapsed().as_millis();
    build_bar.finish_with_message("graph built");
    let index = builder.into_index();
    let view = index.get_view();

    let top_k = config.dataset.top_k;
    let search_params = SearchParams { top_k, ..SearchParams::default() };
    let accept = AllBits;

    let query_bar = progress_bar(data.queries.len(), "running queries");
    let mut records = Vec::with_capacity(data.queries.len());
    let mut ground_truths = Vec::with_capacity(data.queries.len());
    let mut found_results = Vec::with_capacity(data.queries.len());
    for (query_index, query) in data.queries.iter().enumerate() {
        let truth = metrics::exact_top_k(&*base, query, config.dataset.similarity, top_k);
        let ground_truth: Vec<_> = truth.iter().map(|&(o, _)| o).collect();

        let providers = provider.search_provider_for(query);
        let started = Instant::now();
        let result = search(&view, &providers, &search_params, &accept);
        let latency = started.elapsed();

        let found: Vec<_> = result.results.iter().map(|&(o, _)| o).collect();
        records.push(QueryRecord {
            query_index,
            recall: metrics::recall_at_k(&ground_truth, &found),
            latency_micros: report::micros(latency),
            visited: result.visited,
            expanded: result.expanded,
            returned: result.results.len(),
        });
        ground_truths.push(ground_truth);
        found_results.push(found);
        query_bar.inc(1);
    }
    query_bar.finish_with_message("queries complete");

    let (mean_recall, mean_precision, mean_mrr) = metrics::average_metrics(&ground_truths, &found_results);

    let mean_query_latency_micros = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.latency_micros as f64).sum::<f64>() / records.len() as f64
    };

    let summary = RunSummary {
        dataset_vectors: config.dataset.vectors,
        dataset_dimension: config.dataset.dimension,
        query_count: records.len(),
        mean_recall,
        mean_precision,
        mean_mrr,
        build_millis,
        mean_query_latency_micros,
    };

    let output = cli.output.as_deref().expect("checked by main before calling run");
    report::write_all(output, &records, &summary).context("failed to write benchmark output")?;
    tracing::info!(mean_recall, mean_query_latency_micros, "benchmark complete");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.config.is_none() || cli.output.is_none() {
        eprintln!("ann-cli: both --config and --output are required");
        std::process::exit(1);
    }

    if let Err(err) = run(&cli) {
        eprintln!("ann-cli: {err:#}");
        std::process::exit(2);
    }
}
