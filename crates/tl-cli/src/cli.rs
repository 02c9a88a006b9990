//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::add::AddArgs;
use crate::commands::credentials::CredentialsAction;
use crate::commands::delete::DeleteArgs;
use crate::commands::list::ListArgs;
use crate::commands::project::ProjectAction;
use crate::commands::stats::StatsArgs;
use crate::commands::update::UpdateArgs;

/// Time entry log with Jira worklog sync.
///
/// Records time spent on projects and mirrors entries of Jira-linked
/// projects as issue worklogs.
#[derive(Debug, Parser)]
#[command(name = "tl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a time entry.
    Add(AddArgs),

    /// Change fields of a time entry.
    Update(UpdateArgs),

    /// Delete a time entry (and its worklog, if reported).
    Delete(DeleteArgs),

    /// List time entries, newest first.
    List(ListArgs),

    /// Show time totals per day, week or month and per project.
    Stats(StatsArgs),

    /// Manage projects.
    #[command(subcommand)]
    Project(ProjectAction),

    /// Manage the Jira access token.
    #[command(subcommand)]
    Credentials(CredentialsAction),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn update_requires_both_period_bounds() {
        let result = Cli::try_parse_from(["tl", "update", "abc", "--start", "2025-01-01T09:00:00Z"]);
        assert!(result.is_err());
    }

    #[test]
    fn list_defaults_to_twenty_entries() {
        let cli = Cli::try_parse_from(["tl", "list"]).unwrap();
        let Some(Commands::List(args)) = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(args.limit, 20);
        assert_eq!(args.skip, 0);
        assert!(!args.json);
    }
}
