//! Time entry lifecycle with tracker synchronization.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tl_core::{
    CredentialLookup, EntryId, Granularity, NewTimeEntry, OwnerId, Project, ProjectLookup,
    RemoteWorklogSync, Statistics, StatisticsAggregator, SyncCoordinator, TimeEntry,
    TimeEntryUpdate, TrackerCredential,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Database, DbError, EntryQuery};

/// Persists time entries and mirrors their transitions to a tracker.
///
/// The create, update and delete hooks run before the local write so the
/// resulting report status is stored in the same statement. A failed sync is
/// logged by the coordinator and never aborts the write.
pub struct TimeEntryStore<T> {
    db: Mutex<Database>,
    sync: SyncCoordinator<T>,
}

impl<T: RemoteWorklogSync + Sync> TimeEntryStore<T> {
    pub const fn new(db: Database, sync: SyncCoordinator<T>) -> Self {
        Self {
            db: Mutex::new(db),
            sync,
        }
    }

    /// Runs `f` with exclusive access to the database.
    ///
    /// Used for project and credential administration, which never touches
    /// the tracker.
    pub fn with_db<R>(&self, f: impl FnOnce(&mut Database) -> Result<R, DbError>) -> Result<R, DbError> {
        f(&mut *self.lock()?)
    }

    /// Stores a new entry, reporting it first when its project is linked.
    pub async fn create(
        &self,
        new: NewTimeEntry,
        cancel: &CancellationToken,
    ) -> Result<TimeEntry, DbError> {
        let (project, credential) = {
            let db = self.lock()?;
            let project = db
                .get_project(&new.project_id, &new.owner_id)?
                .ok_or_else(|| DbError::NotFound {
                    entity: "project",
                    id: new.project_id.to_string(),
                })?;
            let credential = self.credential_for(&db, &new.owner_id, &project)?;
            (project, credential)
        };

        let now = Utc::now();
        let mut entry = TimeEntry {
            id: EntryId::new(Uuid::new_v4().to_string())?,
            project_id: new.project_id,
            owner_id: new.owner_id,
            period: new.period,
            note: new.note,
            reported: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        entry.reported = self
            .sync
            .on_create(&entry, &project, credential.as_ref(), cancel)
            .await;

        self.lock()?.insert_time_entry(&entry)?;
        tracing::debug!(
            entry_id = %entry.id,
            project_id = %entry.project_id,
            reported = entry.reported.is_some(),
            "time entry created"
        );
        Ok(entry)
    }

    /// Applies a partial update to a live entry.
    ///
    /// A reported entry has its worklog refreshed on the issue it was
    /// reported to, even when `update` moves it to another project.
    pub async fn update(
        &self,
        id: &EntryId,
        update: TimeEntryUpdate,
        cancel: &CancellationToken,
    ) -> Result<TimeEntry, DbError> {
        let (mut merged, target) = {
            let db = self.lock()?;
            let existing = db.get_live_time_entry(id)?.ok_or_else(|| not_found(id))?;
            if let Some(project_id) = &update.project_id {
                if db.get_project(project_id, &existing.owner_id)?.is_none() {
                    return Err(DbError::NotFound {
                        entity: "project",
                        id: project_id.to_string(),
                    });
                }
            }
            let merged = update.apply_to(&existing);
            let target = self.sync_target(&db, &existing)?;
            (merged, target)
        };

        if let Some((project, credential)) = target {
            merged.reported = self
                .sync
                .on_update(&merged, &project, credential.as_ref(), cancel)
                .await;
        }
        merged.updated_at = Utc::now();

        if !self.lock()?.update_time_entry(&merged)? {
            return Err(not_found(id));
        }
        tracing::debug!(entry_id = %id, "time entry updated");
        Ok(merged)
    }

    /// Tombstones a live entry, removing its worklog first when reported.
    pub async fn soft_delete(&self, id: &EntryId, cancel: &CancellationToken) -> Result<(), DbError> {
        let (existing, target) = {
            let db = self.lock()?;
            let existing = db.get_live_time_entry(id)?.ok_or_else(|| not_found(id))?;
            let target = self.sync_target(&db, &existing)?;
            (existing, target)
        };

        let reported = match target {
            Some((project, credential)) => {
                self.sync
                    .on_delete(&existing, &project, credential.as_ref(), cancel)
                    .await
            }
            None => existing.reported.clone(),
        };

        if !self
            .lock()?
            .tombstone_time_entry(id, reported.as_ref(), Utc::now())?
        {
            return Err(not_found(id));
        }
        tracing::debug!(entry_id = %id, "time entry deleted");
        Ok(())
    }

    /// Live entries of `owner_id` started within `[from, to]`, newest first.
    pub fn list(
        &self,
        owner_id: &OwnerId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        skip: u64,
        limit: Option<u64>,
    ) -> Result<Vec<TimeEntry>, DbError> {
        self.lock()?.list_time_entries(&EntryQuery {
            owner_id: owner_id.clone(),
            from,
            to,
            skip,
            limit,
        })
    }

    /// Time totals of `owner_id` within `[from, to]`.
    ///
    /// `granularity` is validated before the database is queried.
    pub fn statistics(
        &self,
        owner_id: &OwnerId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        granularity: &str,
    ) -> Result<Statistics, DbError> {
        let granularity: Granularity = granularity.parse()?;
        let entries = self
            .lock()?
            .list_time_entries(&EntryQuery::range(owner_id.clone(), from, to))?;
        Ok(StatisticsAggregator::new(granularity).compute(&entries))
    }

    /// Looks up an entry by ID, tombstoned ones included.
    pub fn get(&self, id: &EntryId) -> Result<Option<TimeEntry>, DbError> {
        self.lock()?.get_time_entry(id)
    }

    /// Project and credential for the update and delete hooks, or `None`
    /// when the entry has no live worklog to touch.
    ///
    /// The project is the one the worklog was reported under, which differs
    /// from `entry.project_id` once the entry has been moved.
    fn sync_target(
        &self,
        db: &Database,
        entry: &TimeEntry,
    ) -> Result<Option<(Project, Option<TrackerCredential>)>, DbError> {
        let Some(status) = &entry.reported else {
            return Ok(None);
        };
        let Some(project) = db.get_project(&status.project_id, &entry.owner_id)? else {
            tracing::warn!(
                entry_id = %entry.id,
                project_id = %status.project_id,
                "project of reported entry is gone; skipping worklog sync"
            );
            return Ok(None);
        };
        if !self.sync.needs_remote_sync(entry, &project) {
            return Ok(None);
        }
        let credential = self.credential_for(db, &entry.owner_id, &project)?;
        Ok(Some((project, credential)))
    }

    fn credential_for(
        &self,
        db: &Database,
        owner_id: &OwnerId,
        project: &Project,
    ) -> Result<Option<TrackerCredential>, DbError> {
        let integration = self.sync.tracker().integration();
        if project.integration_for(integration).is_none() {
            return Ok(None);
        }
        db.tracker_credential(owner_id, integration)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, DbError> {
        self.db.lock().map_err(|_| DbError::LockPoisoned)
    }
}

fn not_found(id: &EntryId) -> DbError {
    DbError::NotFound {
        entity: "time entry",
        id: id.to_string(),
    }
}
