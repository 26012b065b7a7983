// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use http_replay::config::{self, ReplayConfig};
use http_replay::source::{capture_stream, convert_source, CaptureLines};
use http_replay::stats::StatsSnapshot;
use http_replay::{
    replay, try_compute_stats, HttpTransport, ReplaySummary, TelemetrySink, WriterSink,
    DEFAULT_TOP_K,
};
use tracing::info;

use crate::expand_path;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Capture file to replay
    #[clap(long)]
    pub input: String,

    /// Target that relative urls are resolved against
    #[clap(long)]
    pub base_url: Option<String>,

    /// Number of requests in flight at once
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Pause each worker takes after every dispatch
    #[clap(long)]
    pub interval_ms: Option<u64>,

    /// `method:url-regex` pattern of requests to skip, repeatable
    #[clap(long)]
    pub ignore: Vec<String>,

    /// Telemetry file, appended to. Defaults to stdout
    #[clap(long)]
    pub output: Option<String>,

    #[clap(long)]
    pub timeout_ms: Option<u64>,

    /// YAML file with replay settings; flags override it
    #[clap(long)]
    pub config: Option<String>,
}

impl RunArgs {
    fn apply(&self, config: &mut ReplayConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.pacing_interval_ms = interval_ms;
        }
        if self.timeout_ms.is_some() {
            config.request_timeout_ms = self.timeout_ms;
        }
        config.filter_patterns.extend(self.ignore.iter().cloned());
    }
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Capture or telemetry file
    #[clap(long)]
    pub input: String,

    #[clap(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Print the snapshot as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Raw source, or a file holding it
    #[clap(long)]
    pub source: String,

    /// Capture file the converted lines are appended to
    #[clap(long)]
    pub output: String,
}

fn open_append(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open {} for writing", path.display()))
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => config::load(expand_path(path))?,
        None => ReplayConfig::default(),
    };
    args.apply(&mut config);

    let input = expand_path(&args.input);
    let file = tokio::fs::File::open(&input)
        .await
        .with_context(|| format!("cannot open capture file {}", input.display()))?;
    let requests = capture_stream(tokio::io::BufReader::new(file));

    // the guard must outlive the replay so every record reaches the output
    let (sink, sink_guard) = match &args.output {
        Some(path) => WriterSink::non_blocking(open_append(&expand_path(path))?),
        None => WriterSink::non_blocking(std::io::stdout()),
    };
    let sink: Arc<dyn TelemetrySink> = Arc::new(sink);
    let transport = Arc::new(HttpTransport::new(config.request_timeout())?);

    info!(input = %input.display(), "replaying capture");
    let summary = replay(requests, &config, transport, sink).await;
    drop(sink_guard);
    let summary = summary?;
    // stdout may be carrying telemetry
    eprintln!("{}", format_summary(&summary));
    Ok(())
}

fn format_summary(summary: &ReplaySummary) -> String {
    format!(
        "enqueued: {}, filtered: {}, dispatched: {}, failed: {}, backpressure pauses: {}",
        summary.enqueued,
        summary.filtered,
        summary.dispatched,
        summary.failed,
        summary.backpressure_pauses
    )
}

pub fn stats(args: StatsArgs) -> Result<()> {
    let input = expand_path(&args.input);
    let file = std::fs::File::open(&input)
        .with_context(|| format!("cannot open {}", input.display()))?;
    let snapshot = try_compute_stats(CaptureLines::new(BufReader::new(file)), args.top_k)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", format_snapshot(&snapshot));
    }
    Ok(())
}

fn format_snapshot(snapshot: &StatsSnapshot) -> String {
    let mut out = format!("total requests: {}\n", snapshot.count);
    for (method, count) in &snapshot.method_counts {
        out.push_str(&format!("  {method:<8}{count}\n"));
    }
    out.push_str(&format!("top {} endpoints:\n", snapshot.top.len()));
    for stat in &snapshot.top {
        out.push_str(&format!("  {:>8}  {} {}\n", stat.count, stat.method, stat.url));
    }
    out
}

pub async fn parse(args: ParseArgs) -> Result<()> {
    let candidate = expand_path(&args.source);
    let raw = if candidate.is_file() {
        std::fs::read_to_string(&candidate)
            .with_context(|| format!("cannot read {}", candidate.display()))?
    } else {
        args.source.clone()
    };

    let output = expand_path(&args.output);
    let mut file = open_append(&output)?;
    let written = convert_source(&raw, &mut file).await?;
    info!(written, output = %output.display(), "converted source");
    Ok(())
}
