//! Delete command: tombstones a time entry.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tl_core::EntryId;

use super::util::{SyncRuntime, describe_report, open_store};
use crate::Config;

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Entry ID.
    pub id: String,
}

pub fn run<W: Write>(writer: &mut W, args: &DeleteArgs, config: &Config) -> Result<()> {
    let id = EntryId::new(args.id.clone())?;
    let store = open_store(config)?;
    let runtime = SyncRuntime::new()?;
    runtime
        .block_on(store.soft_delete(&id, runtime.cancel_token()))
        .with_context(|| format!("failed to delete {id}"))?;

    let reported = store.get(&id)?.and_then(|entry| entry.reported);
    writeln!(writer, "Deleted {id}")?;
    writeln!(writer, "Sync: {}", describe_report(reported.as_ref()))?;
    Ok(())
}
