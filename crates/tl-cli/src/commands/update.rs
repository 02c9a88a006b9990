//! Update command: changes fields of a live time entry.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;
use tl_core::{EntryId, Period, ProjectId, TimeEntryUpdate};

use super::util::{SyncRuntime, describe_report, format_duration, open_store, parse_datetime};
use crate::Config;

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Entry ID.
    pub id: String,

    /// Move the entry to another project.
    #[arg(long)]
    pub project: Option<String>,

    /// New start; requires --end.
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// New end; requires --start.
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Replace the note.
    #[arg(long)]
    pub note: Option<String>,
}

impl UpdateArgs {
    fn to_update(&self) -> Result<TimeEntryUpdate> {
        let period = match (&self.start, &self.end) {
            (Some(start), Some(end)) => Some(Period::new(parse_datetime(start)?, parse_datetime(end)?)?),
            (None, None) => None,
            _ => bail!("--start and --end must be given together"),
        };
        Ok(TimeEntryUpdate {
            project_id: self.project.clone().map(ProjectId::new).transpose()?,
            period,
            note: self.note.clone(),
        })
    }
}

pub fn run<W: Write>(writer: &mut W, args: &UpdateArgs, config: &Config) -> Result<()> {
    let id = EntryId::new(args.id.clone())?;
    let update = args.to_update()?;
    if update.is_empty() {
        bail!("nothing to update: pass --project, --start/--end or --note");
    }

    let store = open_store(config)?;
    let runtime = SyncRuntime::new()?;
    let entry = runtime
        .block_on(store.update(&id, update, runtime.cancel_token()))
        .with_context(|| format!("failed to update {id}"))?;

    writeln!(
        writer,
        "Updated {} on {} ({})",
        entry.id,
        entry.project_id,
        format_duration(entry.period.duration_seconds)
    )?;
    writeln!(writer, "Sync: {}", describe_report(entry.reported.as_ref()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{seed_entry, seed_project, test_config};

    fn args(id: &str) -> UpdateArgs {
        UpdateArgs {
            id: id.to_string(),
            project: None,
            start: None,
            end: None,
            note: None,
        }
    }

    #[test]
    fn update_moves_entry_and_changes_period() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        seed_project(&config, "P1");
        seed_project(&config, "P2");
        let entry = seed_entry(&config, "P1", "2025-08-11T09:00:00Z", "2025-08-11T10:00:00Z");

        let args = UpdateArgs {
            project: Some("P2".to_string()),
            start: Some("2025-08-11T09:00:00Z".to_string()),
            end: Some("2025-08-11T11:00:00Z".to_string()),
            ..args(entry.id.as_str())
        };
        let mut output = Vec::new();
        run(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(entry.id.as_str(), "[ID]");
        insta::assert_snapshot!(output, @r"
        Updated [ID] on P2 (2h 0m)
        Sync: not reported
        ");
    }

    #[test]
    fn update_without_fields_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        let err = run(&mut Vec::<u8>::new(), &args("any"), &config).unwrap_err();
        assert!(err.to_string().starts_with("nothing to update"));
    }

    #[test]
    fn update_of_unknown_entry_fails() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        let args = UpdateArgs {
            note: Some("x".to_string()),
            ..args("missing")
        };
        let err = run(&mut Vec::<u8>::new(), &args, &config).unwrap_err();
        assert!(format!("{err:#}").contains("time entry not found: missing"));
    }
}
