//! Storage layer for timelog.
//!
//! Provides persistence for projects, tracker credentials and time entries
//! using `rusqlite`, and the [`TimeEntryStore`] that ties persistence to
//! tracker synchronization.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! [`TimeEntryStore`] puts it behind a `Mutex` and only holds the lock for the
//! duration of individual statements, never across a tracker call.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 with nanosecond precision
//! (e.g., `2024-01-15T10:30:00.000000000Z`). The fixed width keeps
//! lexicographic ordering equal to chronological ordering, which the range
//! filters on `started` rely on.
//!
//! ## Report Status Storage
//!
//! The `reported` column holds the JSON-serialized [`ReportStatus`] or NULL
//! when the entry was never mirrored. It survives soft deletion.

mod store;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tl_core::{
    CredentialLookup, EntryId, IntegrationType, OwnerId, Period, Project, ProjectId,
    ProjectIntegration, ProjectLookup, ReportStatus, TimeEntry, TrackerCredential,
    ValidationError,
};

pub use store::TimeEntryStore;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The requested record does not exist (or is soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// Caller input failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {record_id}: {timestamp}")]
    TimestampParse {
        record_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row could not be turned back into a domain value.
    #[error("invalid stored data for {record_id}: {message}")]
    InvalidRecord { record_id: String, message: String },
    /// Another thread panicked while holding the connection.
    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Filter for time entry listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub owner_id: OwnerId,
    /// Inclusive lower bound on `period.started`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `period.started`.
    pub to: Option<DateTime<Utc>>,
    pub skip: u64,
    /// Page size cap. `None` returns every match.
    pub limit: Option<u64>,
}

impl EntryQuery {
    /// Every live entry of `owner_id` in the range, unpaginated.
    pub const fn range(
        owner_id: OwnerId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            owner_id,
            from,
            to,
            skip: 0,
            limit: None,
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

const ENTRY_COLUMNS: &str = "id, project_id, owner_id, started, ended, duration_seconds, note, reported, created_at, updated_at, deleted_at";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                integration_type TEXT,
                integration_key TEXT,
                integration_external_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (id, owner_id)
            );

            CREATE TABLE IF NOT EXISTS tracker_credentials (
                owner_id TEXT NOT NULL,
                integration TEXT NOT NULL,
                access_token TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner_id, integration)
            );

            -- Time entries: soft-deleted via deleted_at, never removed
            -- started/ended/*_at: RFC 3339, nanosecond precision, UTC
            -- reported: JSON report status, NULL when never synced
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                started TEXT NOT NULL,
                ended TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL,
                note TEXT,
                reported TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_time_entries_owner_started ON time_entries(owner_id, started);
            CREATE INDEX IF NOT EXISTS idx_time_entries_project ON time_entries(project_id);
            ",
        )?;
        Ok(())
    }

    // ========== Projects ==========

    /// Inserts or replaces a project.
    pub fn upsert_project(&mut self, project: &Project) -> Result<(), DbError> {
        let now = format_timestamp(Utc::now());
        let integration = project.integration.as_ref();
        self.conn.execute(
            "
            INSERT INTO projects
            (id, owner_id, name, integration_type, integration_key, integration_external_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(id, owner_id) DO UPDATE SET
                name = excluded.name,
                integration_type = excluded.integration_type,
                integration_key = excluded.integration_key,
                integration_external_id = excluded.integration_external_id,
                updated_at = excluded.updated_at
            ",
            params![
                project.id.as_str(),
                project.owner_id.as_str(),
                project.name,
                integration.map(|i| i.kind.as_str()),
                integration.map(|i| i.key.as_str()),
                integration.map(|i| i.external_id.as_str()),
                now,
            ],
        )?;
        Ok(())
    }

    /// Lists an owner's projects ordered by ID.
    pub fn list_projects(&self, owner_id: &OwnerId) -> Result<Vec<Project>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, owner_id, name, integration_type, integration_key, integration_external_id
            FROM projects
            WHERE owner_id = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([owner_id.as_str()], ProjectRow::from_row)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?.into_project()?);
        }
        Ok(projects)
    }

    // ========== Tracker credentials ==========

    /// Stores the tracker credential for an owner, replacing any previous one.
    pub fn set_tracker_credential(&mut self, credential: &TrackerCredential) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO tracker_credentials (owner_id, integration, access_token, enabled, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(owner_id, integration) DO UPDATE SET
                access_token = excluded.access_token,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            ",
            params![
                credential.owner_id.as_str(),
                credential.integration.as_str(),
                credential.access_token,
                credential.enabled,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Enables or disables an existing credential. Returns false if none exists.
    pub fn set_tracker_enabled(
        &mut self,
        owner_id: &OwnerId,
        integration: IntegrationType,
        enabled: bool,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "
            UPDATE tracker_credentials
            SET enabled = ?3, updated_at = ?4
            WHERE owner_id = ?1 AND integration = ?2
            ",
            params![
                owner_id.as_str(),
                integration.as_str(),
                enabled,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(changed > 0)
    }

    // ========== Time entries ==========

    /// Inserts a fully populated entry.
    pub fn insert_time_entry(&mut self, entry: &TimeEntry) -> Result<(), DbError> {
        let reported = encode_reported(entry.reported.as_ref(), &entry.id)?;
        self.conn.execute(
            "
            INSERT INTO time_entries
            (id, project_id, owner_id, started, ended, duration_seconds, note, reported, created_at, updated_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                entry.id.as_str(),
                entry.project_id.as_str(),
                entry.owner_id.as_str(),
                format_timestamp(entry.period.started),
                format_timestamp(entry.period.ended),
                entry.period.duration_seconds,
                entry.note,
                reported,
                format_timestamp(entry.created_at),
                format_timestamp(entry.updated_at),
                entry.deleted_at.map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    /// Looks up an entry by ID, including soft-deleted ones.
    pub fn get_time_entry(&self, id: &EntryId) -> Result<Option<TimeEntry>, DbError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM time_entries WHERE id = ?");
        let row = self
            .conn
            .query_row(&sql, [id.as_str()], EntryRow::from_row)
            .optional()?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// Looks up an entry by ID, ignoring soft-deleted ones.
    pub fn get_live_time_entry(&self, id: &EntryId) -> Result<Option<TimeEntry>, DbError> {
        Ok(self.get_time_entry(id)?.filter(|entry| !entry.is_deleted()))
    }

    /// Writes the mutable fields of a live entry.
    ///
    /// Returns false if no live entry with that ID exists.
    pub fn update_time_entry(&mut self, entry: &TimeEntry) -> Result<bool, DbError> {
        let reported = encode_reported(entry.reported.as_ref(), &entry.id)?;
        let changed = self.conn.execute(
            "
            UPDATE time_entries
            SET project_id = ?2, started = ?3, ended = ?4, duration_seconds = ?5,
                note = ?6, reported = ?7, updated_at = ?8
            WHERE id = ?1 AND deleted_at IS NULL
            ",
            params![
                entry.id.as_str(),
                entry.project_id.as_str(),
                format_timestamp(entry.period.started),
                format_timestamp(entry.period.ended),
                entry.period.duration_seconds,
                entry.note,
                reported,
                format_timestamp(entry.updated_at),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Tombstones a live entry, storing its final report status.
    ///
    /// Returns false if no live entry with that ID exists.
    pub fn tombstone_time_entry(
        &mut self,
        id: &EntryId,
        reported: Option<&ReportStatus>,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let reported = encode_reported(reported, id)?;
        let changed = self.conn.execute(
            "
            UPDATE time_entries
            SET reported = ?2, deleted_at = ?3
            WHERE id = ?1 AND deleted_at IS NULL
            ",
            params![id.as_str(), reported, format_timestamp(deleted_at)],
        )?;
        Ok(changed > 0)
    }

    /// Lists live entries matching the query, newest start first.
    pub fn list_time_entries(&self, query: &EntryQuery) -> Result<Vec<TimeEntry>, DbError> {
        let sql = format!(
            "
            SELECT {ENTRY_COLUMNS}
            FROM time_entries
            WHERE owner_id = ?1
              AND deleted_at IS NULL
              AND (?2 IS NULL OR started >= ?2)
              AND (?3 IS NULL OR started <= ?3)
            ORDER BY started DESC, id ASC
            LIMIT ?4 OFFSET ?5
            "
        );
        // SQLite treats a negative LIMIT as unbounded.
        let limit = query
            .limit
            .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let skip = i64::try_from(query.skip).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                query.owner_id.as_str(),
                query.from.map(format_timestamp),
                query.to.map(format_timestamp),
                limit,
                skip,
            ],
            EntryRow::from_row,
        )?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }
}

impl ProjectLookup for Database {
    type Error = DbError;

    fn get_project(
        &self,
        project_id: &ProjectId,
        owner_id: &OwnerId,
    ) -> Result<Option<Project>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, owner_id, name, integration_type, integration_key, integration_external_id
                FROM projects
                WHERE id = ? AND owner_id = ?
                ",
                [project_id.as_str(), owner_id.as_str()],
                ProjectRow::from_row,
            )
            .optional()?;
        row.map(ProjectRow::into_project).transpose()
    }
}

impl CredentialLookup for Database {
    type Error = DbError;

    fn tracker_credential(
        &self,
        owner_id: &OwnerId,
        integration: IntegrationType,
    ) -> Result<Option<TrackerCredential>, DbError> {
        let row: Option<(String, bool)> = self
            .conn
            .query_row(
                "
                SELECT access_token, enabled
                FROM tracker_credentials
                WHERE owner_id = ? AND integration = ?
                ",
                [owner_id.as_str(), integration.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(access_token, enabled)| TrackerCredential {
            owner_id: owner_id.clone(),
            integration,
            access_token,
            enabled,
        }))
    }
}

#[derive(Debug)]
struct ProjectRow {
    id: String,
    owner_id: String,
    name: String,
    integration_type: Option<String>,
    integration_key: Option<String>,
    integration_external_id: Option<String>,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            integration_type: row.get(3)?,
            integration_key: row.get(4)?,
            integration_external_id: row.get(5)?,
        })
    }

    fn into_project(self) -> Result<Project, DbError> {
        let integration = match self.integration_type.as_deref() {
            None | Some("") => None,
            Some(kind) => Some(ProjectIntegration {
                kind: kind.parse()?,
                key: self.integration_key.unwrap_or_default(),
                external_id: self.integration_external_id.unwrap_or_default(),
            }),
        };
        Ok(Project {
            id: ProjectId::new(self.id)?,
            owner_id: OwnerId::new(self.owner_id)?,
            name: self.name,
            integration,
        })
    }
}

#[derive(Debug)]
struct EntryRow {
    id: String,
    project_id: String,
    owner_id: String,
    started: String,
    ended: String,
    duration_seconds: i64,
    note: Option<String>,
    reported: Option<String>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            owner_id: row.get(2)?,
            started: row.get(3)?,
            ended: row.get(4)?,
            duration_seconds: row.get(5)?,
            note: row.get(6)?,
            reported: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            deleted_at: row.get(10)?,
        })
    }

    fn into_entry(self) -> Result<TimeEntry, DbError> {
        let id = self.id;
        let reported = self
            .reported
            .as_deref()
            .map(serde_json::from_str::<ReportStatus>)
            .transpose()
            .map_err(|err| DbError::InvalidRecord {
                record_id: id.clone(),
                message: format!("reported: {err}"),
            })?;
        let deleted_at = self
            .deleted_at
            .as_deref()
            .map(|value| parse_timestamp(value, &id))
            .transpose()?;

        Ok(TimeEntry {
            period: Period {
                started: parse_timestamp(&self.started, &id)?,
                ended: parse_timestamp(&self.ended, &id)?,
                duration_seconds: self.duration_seconds,
            },
            project_id: ProjectId::new(self.project_id)?,
            owner_id: OwnerId::new(self.owner_id)?,
            note: self.note,
            reported,
            created_at: parse_timestamp(&self.created_at, &id)?,
            updated_at: parse_timestamp(&self.updated_at, &id)?,
            deleted_at,
            id: EntryId::new(id)?,
        })
    }
}

fn encode_reported(
    reported: Option<&ReportStatus>,
    id: &EntryId,
) -> Result<Option<String>, DbError> {
    reported
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| DbError::InvalidRecord {
            record_id: id.to_string(),
            message: format!("reported: {err}"),
        })
}

fn parse_timestamp(timestamp: &str, record_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record_id: record_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
