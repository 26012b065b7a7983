// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::commands::{ParseArgs, RunArgs, StatsArgs};

#[derive(Parser)]
#[clap(
    name = "http-replay",
    version,
    about = "Replays captured HTTP traffic against a target service"
)]
struct Opts {
    #[clap(subcommand)]
    command: Command,

    /// Also write logs to this file
    #[clap(long, global = true)]
    log_file: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[clap(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay a capture file against a target
    Run(RunArgs),
    /// Summarize a capture or telemetry file
    Stats(StatsArgs),
    /// Convert any recognized source into capture lines
    Parse(ParseArgs),
}

pub fn expand_path(path: &str) -> PathBuf {
    // fall back to the literal path when a variable is unset
    shellexpand::full(path)
        .map(|v| PathBuf::from(v.into_owned()))
        .unwrap_or_else(|_| PathBuf::from(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    let log_file = opts.log_file.as_deref().map(expand_path);
    let _guard = logging::init(&opts.log_level, log_file.as_deref())?;

    match opts.command {
        Command::Run(args) => commands::run(args).await,
        Command::Stats(args) => commands::stats(args),
        Command::Parse(args) => commands::parse(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Opts::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let opts = Opts::try_parse_from([
            "http-replay",
            "run",
            "--input",
            "capture.log",
            "--base-url",
            "http://localhost:8080",
            "--concurrency",
            "4",
            "--ignore",
            "get:/health",
            "--ignore",
            ":/metrics",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(opts.log_level, "debug");
        let Command::Run(args) = opts.command else {
            panic!("expected run");
        };
        assert_eq!(args.concurrency, Some(4));
        assert_eq!(args.ignore, vec!["get:/health", ":/metrics"]);
    }

    #[test]
    fn expands_variables() {
        std::env::set_var("HTTP_REPLAY_TEST_DIR", "/tmp/replay");
        assert_eq!(
            expand_path("$HTTP_REPLAY_TEST_DIR/out.log"),
            PathBuf::from("/tmp/replay/out.log")
        );
        assert_eq!(expand_path("plain.log"), PathBuf::from("plain.log"));
    }
}
