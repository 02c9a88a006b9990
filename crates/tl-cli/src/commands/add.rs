//! Add command: records a new time entry.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tl_core::{NewTimeEntry, Period, ProjectId};

use super::util::{SyncRuntime, describe_report, format_duration, open_store, parse_datetime};
use crate::Config;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Project the time is booked against.
    #[arg(long)]
    pub project: String,

    /// Start of the session (RFC 3339, date, or e.g. '2 hours ago').
    #[arg(long)]
    pub start: String,

    /// End of the session.
    #[arg(long)]
    pub end: String,

    /// Free-text note, sent as the worklog comment.
    #[arg(long)]
    pub note: Option<String>,
}

pub fn run<W: Write>(writer: &mut W, args: &AddArgs, config: &Config) -> Result<()> {
    let period = Period::new(parse_datetime(&args.start)?, parse_datetime(&args.end)?)?;
    let new = NewTimeEntry {
        project_id: ProjectId::new(args.project.clone())?,
        owner_id: config.owner()?,
        period,
        note: args.note.clone(),
    };

    let store = open_store(config)?;
    let runtime = SyncRuntime::new()?;
    let entry = runtime
        .block_on(store.create(new, runtime.cancel_token()))
        .context("failed to record time entry")?;

    writeln!(
        writer,
        "Recorded {} on {} ({})",
        entry.id,
        entry.project_id,
        format_duration(entry.period.duration_seconds)
    )?;
    writeln!(writer, "Sync: {}", describe_report(entry.reported.as_ref()))?;
    Ok(())
}
