//! Core domain logic for timelog.
//!
//! This crate contains the fundamental types and logic for:
//! - Time entries with soft-delete semantics and their report status
//! - Sync coordination: mirroring entries as worklogs on an external tracker
//! - Statistics: day/week/month and per-project time totals

pub mod entry;
pub mod project;
pub mod stats;
pub mod sync;
pub mod types;

pub use entry::{NewTimeEntry, Period, ReportStatus, TimeEntry, TimeEntryUpdate};
pub use project::{CredentialLookup, Project, ProjectIntegration, ProjectLookup, TrackerCredential};
pub use stats::{BucketTotal, Granularity, ProjectTotal, Statistics, StatisticsAggregator};
pub use sync::{RemoteWorklogSync, SyncConfig, SyncCoordinator, SyncError, WorklogBody};
pub use types::{EntryId, IntegrationType, OwnerId, ProjectId, ValidationError};
