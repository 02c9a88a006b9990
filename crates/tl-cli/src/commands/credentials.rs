//! Credential commands for the Jira access token.

use std::io::Write;

use anyhow::{Result, bail};
use clap::Subcommand;
use tl_core::{IntegrationType, TrackerCredential};

use super::util::open_store;
use crate::Config;

/// Credential actions.
#[derive(Debug, Subcommand)]
pub enum CredentialsAction {
    /// Store a Jira OAuth access token and enable worklog sync.
    Set {
        /// Bearer token for the Atlassian API.
        #[arg(long)]
        token: String,
    },

    /// Keep the token but stop syncing worklogs.
    Disable,
}

pub fn run<W: Write>(writer: &mut W, action: &CredentialsAction, config: &Config) -> Result<()> {
    let owner_id = config.owner()?;
    let store = open_store(config)?;

    match action {
        CredentialsAction::Set { token } => {
            if token.trim().is_empty() {
                bail!("token cannot be empty");
            }
            let credential = TrackerCredential {
                owner_id: owner_id.clone(),
                integration: IntegrationType::Jira,
                access_token: token.trim().to_string(),
                enabled: true,
            };
            store.with_db(|db| db.set_tracker_credential(&credential))?;
            tracing::debug!(?credential, "stored tracker credential");
            writeln!(writer, "Jira sync enabled for {owner_id}")?;
        }
        CredentialsAction::Disable => {
            let changed =
                store.with_db(|db| db.set_tracker_enabled(&owner_id, IntegrationType::Jira, false))?;
            if !changed {
                bail!("no Jira credential stored for {owner_id}");
            }
            writeln!(writer, "Jira sync disabled for {owner_id}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tl_core::CredentialLookup;

    use super::*;
    use crate::commands::testing::test_config;

    #[test]
    fn set_then_disable() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);

        let err = run(&mut Vec::<u8>::new(), &CredentialsAction::Disable, &config).unwrap_err();
        assert_eq!(err.to_string(), "no Jira credential stored for local");

        let mut output = Vec::new();
        run(
            &mut output,
            &CredentialsAction::Set {
                token: " secret ".to_string(),
            },
            &config,
        )
        .unwrap();
        run(&mut output, &CredentialsAction::Disable, &config).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Jira sync enabled for local\nJira sync disabled for local\n"
        );

        let store = open_store(&config).unwrap();
        let credential = store
            .with_db(|db| db.tracker_credential(&config.owner().unwrap(), IntegrationType::Jira))
            .unwrap()
            .unwrap();
        assert_eq!(credential.access_token, "secret");
        assert!(credential.usable_token().is_none());
    }

    #[test]
    fn blank_token_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        let action = CredentialsAction::Set {
            token: "   ".to_string(),
        };
        assert!(run(&mut Vec::<u8>::new(), &action, &config).is_err());
    }
}
