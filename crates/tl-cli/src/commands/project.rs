//! Project commands: register projects and link them to Jira issues.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use serde::Serialize;
use tl_core::{
    CredentialLookup, IntegrationType, OwnerId, Project, ProjectId, ProjectIntegration,
    TrackerCredential,
};
use tl_jira::JiraClient;

use super::util::{SyncRuntime, open_store};
use crate::Config;

/// Project actions.
#[derive(Debug, Subcommand)]
pub enum ProjectAction {
    /// Create or replace a project.
    Add(ProjectAddArgs),

    /// List projects.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct ProjectAddArgs {
    /// Project ID used by `tl add --project`.
    #[arg(long)]
    pub id: String,

    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Jira issue key to log work against (e.g. MNT-123).
    #[arg(long, requires = "jira_issue_id")]
    pub jira_issue: Option<String>,

    /// Jira issue id matching --jira-issue.
    #[arg(long, requires = "jira_issue")]
    pub jira_issue_id: Option<String>,
}

pub fn run<W: Write>(writer: &mut W, action: &ProjectAction, config: &Config) -> Result<()> {
    match action {
        ProjectAction::Add(args) => add(writer, args, config),
        ProjectAction::List { json } => list(writer, *json, config),
    }
}

fn add<W: Write>(writer: &mut W, args: &ProjectAddArgs, config: &Config) -> Result<()> {
    let owner_id = config.owner()?;
    let integration = match (&args.jira_issue, &args.jira_issue_id) {
        (Some(key), Some(external_id)) => Some(ProjectIntegration {
            kind: IntegrationType::Jira,
            key: key.clone(),
            external_id: external_id.clone(),
        }),
        (None, None) => None,
        _ => bail!("--jira-issue and --jira-issue-id must be given together"),
    };
    let project = Project {
        id: ProjectId::new(args.id.clone())?,
        owner_id: owner_id.clone(),
        name: args.name.clone(),
        integration,
    };

    let store = open_store(config)?;
    if let Some(integration) = &project.integration {
        let credential = store.with_db(|db| db.tracker_credential(&owner_id, IntegrationType::Jira))?;
        match credential.as_ref().and_then(TrackerCredential::usable_token) {
            Some(token) => verify_issue(config, token, integration)?,
            None => tracing::warn!(
                issue = %integration.key,
                "no usable Jira credential; issue link not verified"
            ),
        }
    }

    store.with_db(|db| db.upsert_project(&project))?;
    match &project.integration {
        Some(integration) => writeln!(
            writer,
            "Saved project {} (logs work on {})",
            project.id, integration.key
        )?,
        None => writeln!(writer, "Saved project {}", project.id)?,
    }
    Ok(())
}

fn verify_issue(config: &Config, token: &str, integration: &ProjectIntegration) -> Result<()> {
    let client = JiraClient::new(&config.jira_config()).context("failed to create Jira client")?;
    let runtime = SyncRuntime::new()?;
    let exists = runtime
        .block_on(async {
            let tenant = client.resolve_tenant_id(token).await?;
            client
                .issue_exists(token, &tenant, &integration.external_id)
                .await
        })
        .with_context(|| format!("failed to verify Jira issue {}", integration.key))?;
    if !exists {
        bail!("Jira issue {} does not exist", integration.key);
    }
    Ok(())
}

fn list<W: Write>(writer: &mut W, json: bool, config: &Config) -> Result<()> {
    let owner_id: OwnerId = config.owner()?;
    let store = open_store(config)?;
    let projects = store.with_db(|db| db.list_projects(&owner_id))?;

    if json {
        let rows: Vec<ProjectRow<'_>> = projects.iter().map(ProjectRow::from).collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
    } else {
        write!(writer, "{}", format_projects(&projects))?;
    }
    Ok(())
}

/// Project as listed; the owner is implied by the configuration.
#[derive(Debug, Serialize)]
struct ProjectRow<'a> {
    id: &'a ProjectId,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    integration: Option<&'a ProjectIntegration>,
}

impl<'a> From<&'a Project> for ProjectRow<'a> {
    fn from(project: &'a Project) -> Self {
        Self {
            id: &project.id,
            name: &project.name,
            integration: project.integration.as_ref(),
        }
    }
}

fn format_projects(projects: &[Project]) -> String {
    let mut output = String::new();
    if projects.is_empty() {
        output.push_str("No projects. Create one with 'tl project add'.\n");
        return output;
    }

    writeln!(output, "{:<12}  {:<24}  Jira", "ID", "Name").unwrap();
    for project in projects {
        let jira = project
            .integration_for(IntegrationType::Jira)
            .map_or("-", |integration| integration.key.as_str());
        writeln!(output, "{:<12}  {:<24}  {jira}", project.id, project.name).unwrap();
    }
    output
}
