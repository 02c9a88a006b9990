//! List command for showing time entries, newest first.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use clap::Args;
use tl_core::TimeEntry;

use super::util::{format_duration, open_store, parse_datetime};
use crate::Config;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only entries started at or after this time.
    #[arg(long)]
    pub from: Option<String>,

    /// Only entries started at or before this time.
    #[arg(long)]
    pub to: Option<String>,

    /// Number of entries to skip.
    #[arg(long, default_value_t = 0)]
    pub skip: u64,

    /// Maximum number of entries to show.
    #[arg(long, default_value_t = 20)]
    pub limit: u64,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &ListArgs, config: &Config) -> Result<()> {
    let from = args.from.as_deref().map(parse_datetime).transpose()?;
    let to = args.to.as_deref().map(parse_datetime).transpose()?;

    let store = open_store(config)?;
    let entries = store.list(&config.owner()?, from, to, args.skip, Some(args.limit))?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        write!(writer, "{}", format_entries(&entries))?;
    }
    Ok(())
}

/// Format entries as a table.
pub fn format_entries(entries: &[TimeEntry]) -> String {
    let mut output = String::new();

    if entries.is_empty() {
        output.push_str("No time entries.\n");
        return output;
    }

    writeln!(
        output,
        "{:<8}  {:<12}  {:<17}  {:>8}  {:<6}  Note",
        "ID", "Project", "Started (UTC)", "Duration", "Jira"
    )
    .unwrap();
    for entry in entries {
        let id_short: String = entry.id.as_str().chars().take(8).collect();
        let project = truncate(entry.project_id.as_str(), 12);
        let started = entry.period.started.format("%Y-%m-%d %H:%M");
        let duration = format_duration(entry.period.duration_seconds);
        let synced = match &entry.reported {
            Some(status) if status.done => "yes",
            Some(_) => "gone",
            None => "-",
        };
        writeln!(
            output,
            "{id_short:<8}  {project:<12}  {started:<17}  {duration:>8}  {synced:<6}  {}",
            entry.comment()
        )
        .unwrap();
    }
    output
}

/// Truncate by characters, not bytes, to avoid panics on multi-byte UTF-8.
fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        format!("{}...", value.chars().take(width - 3).collect::<String>())
    } else {
        value.to_string()
    }
}
