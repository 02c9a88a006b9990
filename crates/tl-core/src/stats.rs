//! Time statistics over a set of entries.
//!
//! Buckets are calendar-aligned in UTC and keyed only on `period.started`,
//! so an entry crossing midnight counts entirely towards the day it began.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::TimeEntry;
use crate::types::{ProjectId, ValidationError};

/// Calendar granularity of the time buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// `YYYY-MM-DD`
    #[serde(rename = "d")]
    Day,
    /// ISO-8601 week, `YYYY-Www`
    #[serde(rename = "w")]
    Week,
    /// `YYYY-MM`
    #[serde(rename = "m")]
    Month,
}

impl Granularity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "d",
            Self::Week => "w",
            Self::Month => "m",
        }
    }

    /// Bucket key for an instant.
    pub fn bucket_key(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Day => at.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Self::Month => at.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" => Ok(Self::Day),
            "w" => Ok(Self::Week),
            "m" => Ok(Self::Month),
            _ => Err(ValidationError::InvalidGranularity {
                value: s.to_string(),
            }),
        }
    }
}

/// Total seconds within one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTotal {
    pub timeframe: String,
    pub total_time: i64,
}

/// Total seconds booked on one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTotal {
    pub project_id: ProjectId,
    pub total_time: i64,
}

/// Aggregate view over a filtered set of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_entries: u64,
    /// Seconds.
    pub total_time: i64,
    pub format: Granularity,
    /// Ascending by bucket key.
    pub entries_per_bucket: Vec<BucketTotal>,
    /// Descending by total time.
    pub entries_per_project: Vec<ProjectTotal>,
}

impl Statistics {
    /// The result for an empty selection.
    pub const fn empty(format: Granularity) -> Self {
        Self {
            total_entries: 0,
            total_time: 0,
            format,
            entries_per_bucket: Vec::new(),
            entries_per_project: Vec::new(),
        }
    }
}

/// Computes [`Statistics`] in a single pass.
///
/// Filtering (owner, range, tombstones) is the caller's job; tombstoned
/// entries that slip through are skipped anyway.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsAggregator {
    granularity: Granularity,
}

impl StatisticsAggregator {
    pub const fn new(granularity: Granularity) -> Self {
        Self { granularity }
    }

    pub fn compute<'a, I>(&self, entries: I) -> Statistics
    where
        I: IntoIterator<Item = &'a TimeEntry>,
    {
        let mut total_entries = 0_u64;
        let mut total_time = 0_i64;
        let mut per_bucket: BTreeMap<String, i64> = BTreeMap::new();
        let mut per_project: HashMap<&ProjectId, i64> = HashMap::new();

        for entry in entries.into_iter().filter(|entry| !entry.is_deleted()) {
            let seconds = entry.period.duration_seconds;
            total_entries += 1;
            total_time += seconds;
            *per_bucket
                .entry(self.granularity.bucket_key(entry.period.started))
                .or_insert(0) += seconds;
            *per_project.entry(&entry.project_id).or_insert(0) += seconds;
        }

        if total_entries == 0 {
            return Statistics::empty(self.granularity);
        }

        let entries_per_bucket = per_bucket
            .into_iter()
            .map(|(timeframe, total_time)| BucketTotal {
                timeframe,
                total_time,
            })
            .collect();

        let mut entries_per_project: Vec<ProjectTotal> = per_project
            .into_iter()
            .map(|(project_id, total_time)| ProjectTotal {
                project_id: project_id.clone(),
                total_time,
            })
            .collect();
        entries_per_project.sort_by(|a, b| {
            Reverse(a.total_time)
                .cmp(&Reverse(b.total_time))
                .then_with(|| a.project_id.cmp(&b.project_id))
        });

        Statistics {
            total_entries,
            total_time,
            format: self.granularity,
            entries_per_bucket,
            entries_per_project,
        }
    }
}
