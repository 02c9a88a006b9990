//! Shared utilities for CLI commands.

use std::future::Future;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use tl_core::{ReportStatus, SyncCoordinator};
use tl_db::{Database, TimeEntryStore};
use tl_jira::JiraClient;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::Config;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(m|min|minute|h|hour|d|day|w|week)s?\s+ago$")
        .expect("relative time pattern is valid")
});

/// Upper bound for relative offsets (~100 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 100 * 366 * 24 * 60;

/// Store type every command works against.
pub type Store = TimeEntryStore<JiraClient>;

/// Parse a datetime argument.
///
/// Accepts RFC 3339 (`2025-08-11T09:00:00Z`), a bare date taken as UTC
/// midnight (`2025-08-11`), or a relative offset (`90 minutes ago`,
/// `2h ago`, `1 week ago`).
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "invalid datetime: {s}. Use RFC 3339 (e.g., 2025-08-11T09:00:00Z), a date (2025-08-11) or a relative time (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let minutes_per_unit = match &caps[2] {
        "m" | "min" | "minute" => 1,
        "h" | "hour" => 60,
        "d" | "day" => 60 * 24,
        "w" | "week" => 60 * 24 * 7,
        unit => anyhow::bail!("unknown time unit: {unit}"),
    };

    let minutes = n
        .checked_mul(minutes_per_unit)
        .filter(|minutes| *minutes <= MAX_RELATIVE_MINUTES)
        .ok_or_else(|| anyhow::anyhow!("relative time value too large: {s}"))?;
    Ok(Utc::now() - Duration::minutes(minutes))
}

/// Format a second count as `1h 30m` / `45m`.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0m".to_string();
    }
    let total_minutes = seconds / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// One-line description of an entry's sync state.
pub fn describe_report(reported: Option<&ReportStatus>) -> String {
    match reported {
        None => "not reported".to_string(),
        Some(status) if status.done => {
            format!("reported to {} (worklog {})", status.integration, status.external_id)
        }
        Some(status) => format!(
            "worklog {} removed from {}",
            status.external_id, status.integration
        ),
    }
}

/// Opens the database and wires the Jira client into a store.
pub fn open_store(config: &Config) -> Result<Store> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let client = JiraClient::new(&config.jira_config()).context("failed to create Jira client")?;
    Ok(TimeEntryStore::new(
        db,
        SyncCoordinator::new(client, config.sync_config()),
    ))
}

/// Tokio runtime whose cancellation token fires on Ctrl-C.
///
/// An interrupted tracker call fails like any other sync failure, so the
/// local write still completes.
pub struct SyncRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl SyncRuntime {
    pub fn new() -> Result<Self> {
        let runtime = Runtime::new().context("failed to initialize tokio runtime")?;
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; abandoning tracker call");
                on_interrupt.cancel();
            }
        });
        Ok(Self { runtime, cancel })
    }

    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
