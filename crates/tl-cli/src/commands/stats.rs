//! Stats command for time totals per bucket and per project.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use clap::Args;
use tl_core::{Granularity, Statistics};

use super::util::{format_duration, open_store, parse_datetime};
use crate::Config;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Only entries started at or after this time.
    #[arg(long)]
    pub from: Option<String>,

    /// Only entries started at or before this time.
    #[arg(long)]
    pub to: Option<String>,

    /// Bucket size: d (day), w (ISO week) or m (month).
    #[arg(long, default_value = "d")]
    pub format: String,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &StatsArgs, config: &Config) -> Result<()> {
    let from = args.from.as_deref().map(parse_datetime).transpose()?;
    let to = args.to.as_deref().map(parse_datetime).transpose()?;

    let store = open_store(config)?;
    let stats = store.statistics(&config.owner()?, from, to, &args.format)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&stats)?)?;
    } else {
        write!(writer, "{}", format_statistics(&stats))?;
    }
    Ok(())
}

const fn bucket_label(format: Granularity) -> &'static str {
    match format {
        Granularity::Day => "Per day",
        Granularity::Week => "Per week",
        Granularity::Month => "Per month",
    }
}

/// Format statistics for human-readable output.
pub fn format_statistics(stats: &Statistics) -> String {
    let mut output = String::new();

    writeln!(output, "Entries: {}", stats.total_entries).unwrap();
    writeln!(output, "Total:   {}", format_duration(stats.total_time)).unwrap();
    if stats.total_entries == 0 {
        return output;
    }

    writeln!(output).unwrap();
    writeln!(output, "{}:", bucket_label(stats.format)).unwrap();
    for bucket in &stats.entries_per_bucket {
        writeln!(
            output,
            "  {:<12}  {:>8}",
            bucket.timeframe,
            format_duration(bucket.total_time)
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "Per project:").unwrap();
    for project in &stats.entries_per_project {
        writeln!(
            output,
            "  {:<12}  {:>8}",
            project.project_id,
            format_duration(project.total_time)
        )
        .unwrap();
    }
    output
}
