use crate::domain_model::{GroupId, UserId};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub uuid::Uuid);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rollup keys for the day, ISO week and month containing a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodKeys {
    pub day_key: String,
    pub week_key: String,
    pub month_key: String,
}

impl PeriodKeys {
    pub fn of(timestamp: DateTime<Utc>) -> Self {
        let week = timestamp.iso_week();
        PeriodKeys {
            day_key: timestamp.format("%Y-%m-%d").to_string(),
            week_key: format!("{}-W{}", week.year(), week.week()),
            month_key: timestamp.format("%Y-%m").to_string(),
        }
    }
}

/// `users/{userId}/logs/{logId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: LogId,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub day_key: String,
    pub week_key: String,
    pub month_key: String,
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogEntry {
    /// Defaults to the time of the request.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub groups: Vec<GroupId>,
}
