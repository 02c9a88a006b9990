//! Mirroring time entries to an external tracker.
//!
//! [`SyncCoordinator`] decides, for one entry transition and one project,
//! whether the tracker is touched and what the entry's [`ReportStatus`]
//! becomes. Remote failures never escape: every hook degrades to "not
//! synced" (create) or "stale" (update, delete) and logs the cause.
//!
//! # Cancellation
//!
//! Each hook takes a [`CancellationToken`]. Cancelling it aborts the
//! in-flight tracker request and the hook takes its failure path, so the
//! caller's local write still happens.
//!
//! # Tenant resolution
//!
//! The tracker tenant is resolved before every remote call. Nothing is
//! cached between calls.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::entry::{ReportStatus, TimeEntry};
use crate::project::{Project, ProjectIntegration, TrackerCredential};
use crate::types::IntegrationType;

/// Default upper bound for a single tracker call.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(45);

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a sync attempt did not reach the tracker or was rejected by it.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No usable credential for the owner.
    #[error("no usable {integration} credential for owner {owner_id}")]
    MissingCredential {
        owner_id: String,
        integration: IntegrationType,
    },
    /// The tenant (cloud) id could not be resolved.
    #[error("failed to resolve tracker tenant: {0}")]
    Tenant(BoxError),
    /// The tracker call itself failed.
    #[error("tracker request failed: {0}")]
    Tracker(BoxError),
    /// The tracker did not answer in time.
    #[error("tracker call timed out after {0:?}")]
    Timeout(Duration),
    /// The caller cancelled the operation.
    #[error("sync cancelled")]
    Cancelled,
}

/// Worklog payload sent to a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorklogBody<'a> {
    pub comment: &'a str,
    pub time_spent_seconds: i64,
}

impl<'a> WorklogBody<'a> {
    pub fn from_entry(entry: &'a TimeEntry) -> Self {
        Self {
            comment: entry.comment(),
            time_spent_seconds: entry.period.duration_seconds,
        }
    }
}

/// Worklog operations for one tracker.
///
/// Implemented once per [`IntegrationType`]; the coordinator never inspects
/// tracker-specific details.
pub trait RemoteWorklogSync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The tracker this implementation talks to.
    fn integration(&self) -> IntegrationType;

    /// Resolves the tenant id the credential has access to.
    fn resolve_tenant(&self, token: &str) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Creates a worklog on `issue`, returning the remote worklog id.
    fn create_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        body: WorklogBody<'_>,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Replaces comment and time spent of an existing worklog.
    fn update_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        worklog_id: &str,
        body: WorklogBody<'_>,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Removes a worklog.
    fn delete_worklog(
        &self,
        token: &str,
        tenant: &str,
        issue: &str,
        worklog_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Immutable coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Upper bound for each tracker call, tenant resolution included.
    pub timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

/// Reconciles entry transitions with one tracker.
#[derive(Debug, Clone)]
pub struct SyncCoordinator<T> {
    tracker: T,
    config: SyncConfig,
}

impl<T: RemoteWorklogSync + Sync> SyncCoordinator<T> {
    pub const fn new(tracker: T, config: SyncConfig) -> Self {
        Self { tracker, config }
    }

    pub const fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Whether `entry` has a live worklog on the tracker `project` links to.
    ///
    /// This is the precondition for the update and delete hooks. `project`
    /// is the one the worklog was reported under, see
    /// [`ReportStatus::project_id`].
    pub fn needs_remote_sync(&self, entry: &TimeEntry, project: &Project) -> bool {
        self.remote_target(entry, project).is_some()
    }

    /// Create-hook: mirrors a new entry.
    ///
    /// Returns the status to embed in the stored document, or `None` when the
    /// project is not linked to this tracker or the attempt failed.
    pub async fn on_create(
        &self,
        entry: &TimeEntry,
        project: &Project,
        credential: Option<&TrackerCredential>,
        cancel: &CancellationToken,
    ) -> Option<ReportStatus> {
        let integration = project.integration_for(self.tracker.integration())?;

        match self.create_remote(entry, integration, credential, cancel).await {
            Ok(worklog_id) => {
                tracing::info!(
                    entry_id = %entry.id,
                    issue = %integration.key,
                    worklog_id = %worklog_id,
                    "worklog created"
                );
                Some(ReportStatus::created(
                    &project.id,
                    integration,
                    worklog_id,
                    &entry.period,
                    Utc::now(),
                ))
            }
            Err(err) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    issue = %integration.key,
                    error = %err,
                    "failed to create worklog; entry stored unsynced"
                );
                None
            }
        }
    }

    /// Update-hook: pushes new note and duration to an existing worklog.
    ///
    /// `entry` is the entry with the update already applied; `project` is the
    /// project the worklog was reported under. The worklog stays on the issue
    /// it was created on. Returns the prior status with a fresh `updated_at`
    /// on success and the prior status unchanged on failure or when the
    /// precondition does not hold.
    pub async fn on_update(
        &self,
        entry: &TimeEntry,
        project: &Project,
        credential: Option<&TrackerCredential>,
        cancel: &CancellationToken,
    ) -> Option<ReportStatus> {
        let Some(status) = self.remote_target(entry, project) else {
            return entry.reported.clone();
        };

        let result = self.update_remote(entry, status, credential, cancel).await;
        match result {
            Ok(()) => {
                tracing::info!(
                    entry_id = %entry.id,
                    worklog_id = %status.external_id,
                    "worklog updated"
                );
                Some(status.touched(Utc::now()))
            }
            Err(err) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    worklog_id = %status.external_id,
                    error = %err,
                    "failed to update worklog; remote copy is stale"
                );
                Some(status.clone())
            }
        }
    }

    /// Delete-hook: removes the worklog of an entry about to be tombstoned.
    ///
    /// On success the status is marked not done with a fresh `updated_at`;
    /// on failure it is returned unchanged and the remote worklog outlives
    /// the entry.
    pub async fn on_delete(
        &self,
        entry: &TimeEntry,
        project: &Project,
        credential: Option<&TrackerCredential>,
        cancel: &CancellationToken,
    ) -> Option<ReportStatus> {
        let Some(status) = self.remote_target(entry, project) else {
            return entry.reported.clone();
        };

        let result = self.delete_remote(entry, status, credential, cancel).await;
        match result {
            Ok(()) => {
                tracing::info!(
                    entry_id = %entry.id,
                    worklog_id = %status.external_id,
                    "worklog deleted"
                );
                Some(status.retracted(Utc::now()))
            }
            Err(err) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    worklog_id = %status.external_id,
                    error = %err,
                    "failed to delete worklog; remote copy left behind"
                );
                Some(status.clone())
            }
        }
    }

    fn remote_target<'a>(
        &self,
        entry: &'a TimeEntry,
        project: &Project,
    ) -> Option<&'a ReportStatus> {
        let kind = self.tracker.integration();
        let status = entry.reported.as_ref().filter(|s| s.is_live_on(kind))?;
        project.integration_for(kind)?;
        Some(status)
    }

    async fn create_remote(
        &self,
        entry: &TimeEntry,
        integration: &ProjectIntegration,
        credential: Option<&TrackerCredential>,
        cancel: &CancellationToken,
    ) -> Result<String, SyncError> {
        let token = self.token(entry, credential)?;
        let tenant = self.tenant(token, cancel).await?;
        let body = WorklogBody::from_entry(entry);
        self.bounded(
            cancel,
            self.tracker
                .create_worklog(token, &tenant, &integration.external_id, body),
        )
        .await?
        .map_err(|err| SyncError::Tracker(Box::new(err)))
    }

    async fn update_remote(
        &self,
        entry: &TimeEntry,
        status: &ReportStatus,
        credential: Option<&TrackerCredential>,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let token = self.token(entry, credential)?;
        let tenant = self.tenant(token, cancel).await?;
        let body = WorklogBody::from_entry(entry);
        let worklog_id = self
            .bounded(
                cancel,
                self.tracker.update_worklog(
                    token,
                    &tenant,
                    &status.issue_id,
                    &status.external_id,
                    body,
                ),
            )
            .await?
            .map_err(|err| SyncError::Tracker(Box::new(err)))?;
        if worklog_id != status.external_id {
            tracing::debug!(
                expected = %status.external_id,
                returned = %worklog_id,
                "tracker returned a different worklog id on update"
            );
        }
        Ok(())
    }

    async fn delete_remote(
        &self,
        entry: &TimeEntry,
        status: &ReportStatus,
        credential: Option<&TrackerCredential>,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let token = self.token(entry, credential)?;
        let tenant = self.tenant(token, cancel).await?;
        self.bounded(
            cancel,
            self.tracker.delete_worklog(
                token,
                &tenant,
                &status.issue_id,
                &status.external_id,
            ),
        )
        .await?
        .map_err(|err| SyncError::Tracker(Box::new(err)))
    }

    fn token<'c>(
        &self,
        entry: &TimeEntry,
        credential: Option<&'c TrackerCredential>,
    ) -> Result<&'c str, SyncError> {
        let integration = self.tracker.integration();
        credential
            .filter(|c| c.integration == integration && c.owner_id == entry.owner_id)
            .and_then(TrackerCredential::usable_token)
            .ok_or_else(|| SyncError::MissingCredential {
                owner_id: entry.owner_id.to_string(),
                integration,
            })
    }

    async fn tenant(&self, token: &str, cancel: &CancellationToken) -> Result<String, SyncError> {
        let tenant = self
            .bounded(cancel, self.tracker.resolve_tenant(token))
            .await?
            .map_err(|err| SyncError::Tenant(Box::new(err)))?;
        tracing::debug!(tenant = %tenant, "resolved tracker tenant");
        Ok(tenant)
    }

    /// Runs one tracker call under the timeout and the cancellation token.
    async fn bounded<R>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<R, T::Error>>,
    ) -> Result<Result<R, T::Error>, SyncError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SyncError::Cancelled),
            result = tokio::time::timeout(self.config.timeout, call) => {
                result.map_err(|_| SyncError::Timeout(self.config.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::DateTime;

    use super::*;
    use crate::entry::Period;
    use crate::types::{EntryId, OwnerId, ProjectId};

    #[derive(Debug, Error)]
    #[error("stub tracker failure")]
    struct StubError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        Succeed,
        FailTenant,
        FailCall,
        Hang,
    }

    #[derive(Debug)]
    struct StubTracker {
        behavior: Behavior,
        calls: Mutex<Vec<String>>,
    }

    impl StubTracker {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn respond<R>(&self, call: String, value: R) -> Result<R, StubError> {
            self.calls.lock().unwrap().push(call);
            match self.behavior {
                Behavior::Succeed | Behavior::FailTenant => Ok(value),
                Behavior::FailCall => Err(StubError),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(value)
                }
            }
        }
    }

    impl RemoteWorklogSync for StubTracker {
        type Error = StubError;

        fn integration(&self) -> IntegrationType {
            IntegrationType::Jira
        }

        async fn resolve_tenant(&self, _token: &str) -> Result<String, StubError> {
            if self.behavior == Behavior::FailTenant {
                self.calls.lock().unwrap().push("tenant".to_string());
                return Err(StubError);
            }
            self.respond("tenant".to_string(), "cloud-1".to_string())
                .await
        }

        async fn create_worklog(
            &self,
            _token: &str,
            tenant: &str,
            issue: &str,
            body: WorklogBody<'_>,
        ) -> Result<String, StubError> {
            let call = format!(
                "create {tenant} {issue} {} {}",
                body.comment, body.time_spent_seconds
            );
            self.respond(call, "WL-1".to_string()).await
        }

        async fn update_worklog(
            &self,
            _token: &str,
            tenant: &str,
            issue: &str,
            worklog_id: &str,
            body: WorklogBody<'_>,
        ) -> Result<String, StubError> {
            let call = format!(
                "update {tenant} {issue} {worklog_id} {} {}",
                body.comment, body.time_spent_seconds
            );
            self.respond(call, worklog_id.to_string()).await
        }

        async fn delete_worklog(
            &self,
            _token: &str,
            tenant: &str,
            issue: &str,
            worklog_id: &str,
        ) -> Result<(), StubError> {
            self.respond(format!("delete {tenant} {issue} {worklog_id}"), ())
                .await
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn entry() -> TimeEntry {
        TimeEntry {
            id: EntryId::new("entry-1").unwrap(),
            project_id: ProjectId::new("P1").unwrap(),
            owner_id: OwnerId::new("U1").unwrap(),
            period: Period::new(ts("2025-08-11T09:00:00Z"), ts("2025-08-11T10:30:00Z")).unwrap(),
            note: Some("review".to_string()),
            reported: None,
            created_at: ts("2025-08-11T10:31:00Z"),
            updated_at: ts("2025-08-11T10:31:00Z"),
            deleted_at: None,
        }
    }

    fn reported_entry() -> TimeEntry {
        let mut entry = entry();
        let issue = project(true).integration.unwrap();
        entry.reported = Some(ReportStatus::created(
            &entry.project_id,
            &issue,
            "WL-1",
            &entry.period,
            ts("2025-08-11T10:31:00Z"),
        ));
        entry
    }

    fn project(linked: bool) -> Project {
        Project {
            id: ProjectId::new("P1").unwrap(),
            owner_id: OwnerId::new("U1").unwrap(),
            name: "Maintenance".to_string(),
            integration: linked.then(|| ProjectIntegration {
                kind: IntegrationType::Jira,
                key: "MNT-1".to_string(),
                external_id: "10042".to_string(),
            }),
        }
    }

    fn credential() -> TrackerCredential {
        TrackerCredential {
            owner_id: OwnerId::new("U1").unwrap(),
            integration: IntegrationType::Jira,
            access_token: "token".to_string(),
            enabled: true,
        }
    }

    fn coordinator(behavior: Behavior) -> SyncCoordinator<StubTracker> {
        SyncCoordinator::new(
            StubTracker::new(behavior),
            SyncConfig {
                timeout: Duration::from_millis(50),
            },
        )
    }

    #[tokio::test]
    async fn create_reports_remote_worklog() {
        let sync = coordinator(Behavior::Succeed);
        let entry = entry();
        let status = sync
            .on_create(&entry, &project(true), Some(&credential()), &CancellationToken::new())
            .await
            .expect("reported");

        assert!(status.done);
        assert_eq!(status.integration, IntegrationType::Jira);
        assert_eq!(status.external_id, "WL-1");
        assert_eq!(status.reported_at, entry.period.started);
        assert_eq!(
            sync.tracker().calls(),
            vec!["tenant", "create cloud-1 10042 review 5400"]
        );
    }

    #[tokio::test]
    async fn create_without_integration_is_noop() {
        let sync = coordinator(Behavior::Succeed);
        let status = sync
            .on_create(&entry(), &project(false), Some(&credential()), &CancellationToken::new())
            .await;
        assert!(status.is_none());
        assert!(sync.tracker().calls().is_empty());
    }

    #[tokio::test]
    async fn create_failure_leaves_entry_unreported() {
        for behavior in [Behavior::FailCall, Behavior::FailTenant, Behavior::Hang] {
            let sync = coordinator(behavior);
            let status = sync
                .on_create(&entry(), &project(true), Some(&credential()), &CancellationToken::new())
                .await;
            assert!(status.is_none(), "{behavior:?} should not report");
        }
    }

    #[tokio::test]
    async fn create_without_credential_skips_tracker() {
        let sync = coordinator(Behavior::Succeed);
        let mut disabled = credential();
        disabled.enabled = false;

        for credential in [None, Some(&disabled)] {
            let status = sync
                .on_create(&entry(), &project(true), credential, &CancellationToken::new())
                .await;
            assert!(status.is_none());
        }
        assert!(sync.tracker().calls().is_empty());
    }

    #[tokio::test]
    async fn cancelled_create_takes_failure_path() {
        let sync = coordinator(Behavior::Succeed);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let status = sync
            .on_create(&entry(), &project(true), Some(&credential()), &cancel)
            .await;
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn update_refreshes_status_on_success() {
        let sync = coordinator(Behavior::Succeed);
        let mut entry = reported_entry();
        entry.note = Some("rework".to_string());
        let prior = entry.reported.clone().unwrap();

        let status = sync
            .on_update(&entry, &project(true), Some(&credential()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(status.external_id, prior.external_id);
        assert_eq!(status.reported_at, prior.reported_at);
        assert!(status.updated_at > prior.updated_at);
        assert_eq!(
            sync.tracker().calls(),
            vec!["tenant", "update cloud-1 10042 WL-1 rework 5400"]
        );
    }

    #[tokio::test]
    async fn update_and_delete_stay_on_reported_issue() {
        let sync = coordinator(Behavior::Succeed);
        let entry = reported_entry();
        let mut relinked = project(true);
        if let Some(integration) = relinked.integration.as_mut() {
            integration.external_id = "20001".to_string();
        }

        let cancel = CancellationToken::new();
        let status = sync
            .on_update(&entry, &relinked, Some(&credential()), &cancel)
            .await
            .unwrap();
        assert_eq!(status.issue_id, "10042");
        sync.on_delete(&entry, &relinked, Some(&credential()), &cancel)
            .await
            .unwrap();

        assert_eq!(
            sync.tracker().calls(),
            vec![
                "tenant",
                "update cloud-1 10042 WL-1 review 5400",
                "tenant",
                "delete cloud-1 10042 WL-1",
            ]
        );
    }

    #[tokio::test]
    async fn update_failure_keeps_prior_status() {
        let sync = coordinator(Behavior::FailCall);
        let entry = reported_entry();
        let status = sync
            .on_update(&entry, &project(true), Some(&credential()), &CancellationToken::new())
            .await;
        assert_eq!(status, entry.reported);
    }

    #[tokio::test]
    async fn update_of_unreported_entry_makes_no_calls() {
        let sync = coordinator(Behavior::Succeed);
        let status = sync
            .on_update(&entry(), &project(true), Some(&credential()), &CancellationToken::new())
            .await;
        assert!(status.is_none());
        assert!(sync.tracker().calls().is_empty());
    }

    #[tokio::test]
    async fn delete_retracts_status_on_success() {
        let sync = coordinator(Behavior::Succeed);
        let entry = reported_entry();
        let status = sync
            .on_delete(&entry, &project(true), Some(&credential()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!status.done);
        assert_eq!(status.external_id, "WL-1");
        assert_eq!(
            sync.tracker().calls(),
            vec!["tenant", "delete cloud-1 10042 WL-1"]
        );
    }

    #[tokio::test]
    async fn delete_failure_keeps_prior_status() {
        let sync = coordinator(Behavior::Hang);
        let entry = reported_entry();
        let status = sync
            .on_delete(&entry, &project(true), Some(&credential()), &CancellationToken::new())
            .await;
        assert_eq!(status, entry.reported);
    }

    #[test]
    fn tracker_error_names_cause_once() {
        let err = SyncError::Tracker(Box::new(StubError));
        assert_eq!(err.to_string(), "tracker request failed: stub tracker failure");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn needs_remote_sync_requires_live_matching_status() {
        let sync = coordinator(Behavior::Succeed);
        assert!(sync.needs_remote_sync(&reported_entry(), &project(true)));
        assert!(!sync.needs_remote_sync(&reported_entry(), &project(false)));
        assert!(!sync.needs_remote_sync(&entry(), &project(true)));

        let mut retracted = reported_entry();
        retracted.reported = retracted.reported.map(|s| s.retracted(Utc::now()));
        assert!(!sync.needs_remote_sync(&retracted, &project(true)));
    }
}
