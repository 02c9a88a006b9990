//! Time entries and their synchronization status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::project::ProjectIntegration;
use crate::types::{EntryId, IntegrationType, OwnerId, ProjectId, ValidationError};

/// One recorded interval of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: EntryId,
    pub project_id: ProjectId,
    pub owner_id: OwnerId,
    pub period: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Last known sync outcome. Absent means the entry was never mirrored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<ReportStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Tombstone. Present entries are hidden from list and statistics queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TimeEntry {
    /// Whether the entry has been soft-deleted.
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Note text sent to the tracker as the worklog comment.
    pub fn comment(&self) -> &str {
        self.note.as_deref().unwrap_or_default()
    }
}

/// The interval covered by an entry.
///
/// `duration_seconds` is authoritative; [`Period::new`] derives it from the
/// bounds so callers cannot construct an inconsistent period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub started: DateTime<Utc>,
    pub ended: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl Period {
    /// Builds a period, rejecting `ended < started`.
    pub fn new(started: DateTime<Utc>, ended: DateTime<Utc>) -> Result<Self, ValidationError> {
        if ended < started {
            return Err(ValidationError::PeriodReversed {
                started: started.to_rfc3339(),
                ended: ended.to_rfc3339(),
            });
        }
        Ok(Self {
            started,
            ended,
            duration_seconds: ended.signed_duration_since(started).num_seconds(),
        })
    }
}

/// Last known synchronization outcome for one external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatus {
    /// True while the remote worklog exists as far as we know.
    pub done: bool,
    pub integration: IntegrationType,
    /// Remote worklog id.
    pub external_id: String,
    /// Project the worklog was reported under. Later hooks resolve the
    /// tracker link through it, not through the entry's current project.
    pub project_id: ProjectId,
    /// Tracker issue holding the worklog.
    pub issue_id: String,
    /// Set to the entry's `period.started` on first report.
    pub reported_at: DateTime<Utc>,
    /// Last successful remote mutation.
    pub updated_at: DateTime<Utc>,
}

impl ReportStatus {
    /// Status for a worklog that was just created remotely.
    pub fn created(
        project_id: &ProjectId,
        integration: &ProjectIntegration,
        external_id: impl Into<String>,
        period: &Period,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            done: true,
            integration: integration.kind,
            external_id: external_id.into(),
            project_id: project_id.clone(),
            issue_id: integration.external_id.clone(),
            reported_at: period.started,
            updated_at: now,
        }
    }

    /// Whether a live remote worklog exists on `integration`.
    pub fn is_live_on(&self, integration: IntegrationType) -> bool {
        self.done && self.integration == integration && !self.external_id.is_empty()
    }

    /// Same status with `updated_at` moved to `now`.
    #[must_use]
    pub fn touched(&self, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            ..self.clone()
        }
    }

    /// Status after the remote worklog was deleted.
    #[must_use]
    pub fn retracted(&self, now: DateTime<Utc>) -> Self {
        Self {
            done: false,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Caller-supplied fields for a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeEntry {
    pub project_id: ProjectId,
    pub owner_id: OwnerId,
    pub period: Period,
    pub note: Option<String>,
}

/// Partial update of an existing entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeEntryUpdate {
    pub project_id: Option<ProjectId>,
    pub period: Option<Period>,
    pub note: Option<String>,
}

impl TimeEntryUpdate {
    pub const fn is_empty(&self) -> bool {
        self.project_id.is_none() && self.period.is_none() && self.note.is_none()
    }

    /// Returns `entry` with the requested fields replaced.
    pub fn apply_to(&self, entry: &TimeEntry) -> TimeEntry {
        let mut merged = entry.clone();
        if let Some(project_id) = &self.project_id {
            merged.project_id = project_id.clone();
        }
        if let Some(period) = self.period {
            merged.period = period;
        }
        if let Some(note) = &self.note {
            merged.note = Some(note.clone());
        }
        merged
    }
}
