//! Projects, their tracker links, and the lookups the core consumes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{IntegrationType, OwnerId, ProjectId};

/// A project time is booked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: OwnerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<ProjectIntegration>,
}

/// Link between a project and one issue on an external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIntegration {
    #[serde(rename = "type")]
    pub kind: IntegrationType,
    /// Human-facing issue key, e.g. `MNT-123`.
    pub key: String,
    /// Tracker-side issue id worklogs are logged against.
    pub external_id: String,
}

impl Project {
    /// The integration, if it targets `kind`.
    pub fn integration_for(&self, kind: IntegrationType) -> Option<&ProjectIntegration> {
        self.integration
            .as_ref()
            .filter(|integration| integration.kind == kind)
    }
}

/// Per-owner access token for a tracker.
#[derive(Clone, PartialEq, Eq)]
pub struct TrackerCredential {
    pub owner_id: OwnerId,
    pub integration: IntegrationType,
    pub access_token: String,
    pub enabled: bool,
}

impl TrackerCredential {
    /// The bearer token, if the integration is enabled and the token non-blank.
    pub fn usable_token(&self) -> Option<&str> {
        let token = self.access_token.trim();
        (self.enabled && !token.is_empty()).then_some(token)
    }
}

impl fmt::Debug for TrackerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerCredential")
            .field("owner_id", &self.owner_id)
            .field("integration", &self.integration)
            .field("access_token", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Resolves a project id, scoped to its owner.
pub trait ProjectLookup {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_project(
        &self,
        project_id: &ProjectId,
        owner_id: &OwnerId,
    ) -> Result<Option<Project>, Self::Error>;
}

/// Identity-integration store holding tracker credentials.
pub trait CredentialLookup {
    type Error: std::error::Error + Send + Sync + 'static;

    fn tracker_credential(
        &self,
        owner_id: &OwnerId,
        integration: IntegrationType,
    ) -> Result<Option<TrackerCredential>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jira_project() -> Project {
        Project {
            id: ProjectId::new("P1").unwrap(),
            owner_id: OwnerId::new("U1").unwrap(),
            name: "Maintenance".to_string(),
            integration: Some(ProjectIntegration {
                kind: IntegrationType::Jira,
                key: "MNT-123".to_string(),
                external_id: "10042".to_string(),
            }),
        }
    }

    #[test]
    fn integration_serializes_type_tag() {
        let json = serde_json::to_value(jira_project()).unwrap();
        assert_eq!(json["integration"]["type"], "jira");
        assert_eq!(json["integration"]["external_id"], "10042");
    }

    #[test]
    fn integration_for_matches_kind() {
        let project = jira_project();
        assert!(project.integration_for(IntegrationType::Jira).is_some());

        let plain = Project {
            integration: None,
            ..jira_project()
        };
        assert!(plain.integration_for(IntegrationType::Jira).is_none());
    }

    #[test]
    fn credential_token_requires_enabled_and_non_blank() {
        let mut credential = TrackerCredential {
            owner_id: OwnerId::new("U1").unwrap(),
            integration: IntegrationType::Jira,
            access_token: "secret-token".to_string(),
            enabled: true,
        };
        assert_eq!(credential.usable_token(), Some("secret-token"));

        credential.enabled = false;
        assert_eq!(credential.usable_token(), None);

        credential.enabled = true;
        credential.access_token = "   ".to_string();
        assert_eq!(credential.usable_token(), None);
    }

    #[test]
    fn credential_debug_redacts_token() {
        let credential = TrackerCredential {
            owner_id: OwnerId::new("U1").unwrap(),
            integration: IntegrationType::Jira,
            access_token: "secret-token".to_string(),
            enabled: true,
        };
        let debug = format!("{credential:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
