//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A period ended before it started.
    #[error("period end {ended} is before its start {started}")]
    PeriodReversed { started: String, ended: String },

    /// Unknown statistics granularity.
    #[error("invalid format: {value}, must be one of 'd', 'w', or 'm'")]
    InvalidGranularity { value: String },

    /// Unknown tracker integration tag.
    #[error("unknown integration type: {value}")]
    UnknownIntegration { value: String },
}

/// External tracker a project can be linked to.
///
/// Closed set: adding a tracker means adding a variant and a
/// [`RemoteWorklogSync`](crate::sync::RemoteWorklogSync) implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationType {
    Jira,
}

impl IntegrationType {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Jira => "jira",
        }
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for IntegrationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jira" => Ok(Self::Jira),
            _ => Err(ValidationError::UnknownIntegration {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated time entry identifier.
    ///
    /// Assigned by the store at creation (UUID v4) and never changed.
    EntryId, "entry ID"
);

define_string_id!(
    /// A validated project identifier.
    ProjectId, "project ID"
);

define_string_id!(
    /// A validated owner (user) identifier.
    ///
    /// Every entry, project and tracker credential is scoped to one owner.
    OwnerId, "owner ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_rejects_empty() {
        assert!(EntryId::new("").is_err());
        assert!(EntryId::new("  ").is_err());
        assert!(EntryId::new("8c1f").is_ok());
    }

    #[test]
    fn project_id_serde_rejects_empty() {
        let result: Result<ProjectId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn owner_id_serializes_as_plain_string() {
        let id = OwnerId::new("U1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"U1\"");
        let s: &str = id.as_ref();
        assert_eq!(s, "U1");
    }

    #[test]
    fn ids_honor_width_and_alignment() {
        let id = ProjectId::new("P2").unwrap();
        assert_eq!(format!("[{id:<6}]"), "[P2    ]");
        assert_eq!(format!("[{id:>6}]"), "[    P2]");
        assert_eq!(format!("[{:<6}]", IntegrationType::Jira), "[jira  ]");
    }

    #[test]
    fn integration_type_from_str() {
        assert_eq!(
            "jira".parse::<IntegrationType>().unwrap(),
            IntegrationType::Jira
        );
        assert!(matches!(
            "linear".parse::<IntegrationType>(),
            Err(ValidationError::UnknownIntegration { .. })
        ));
    }

    #[test]
    fn integration_type_serializes_lowercase() {
        let json = serde_json::to_string(&IntegrationType::Jira).unwrap();
        assert_eq!(json, "\"jira\"");
        assert_eq!(IntegrationType::Jira.to_string(), "jira");
    }
}
