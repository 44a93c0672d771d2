use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Background used when a task is created without one
pub const DEFAULT_BACKGROUND: &str = "https://via.placeholder.com/300x120?text=Task+Image";

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

/// Opaque task identifier
///
/// The local store hands out millisecond timestamps, the shared store hands
/// out UUID keys. Both are kept as strings so the rest of the crate never
/// cares which backend produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            Err("Task ID cannot be empty".to_string())
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

// Browser-era files stored `Date.now()` as a JSON number
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTaskId {
    Text(String),
    Number(i64),
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawTaskId::deserialize(deserializer)? {
            RawTaskId::Text(s) => TaskId(s),
            RawTaskId::Number(n) => TaskId(n.to_string()),
        })
    }
}

/// Identity of the user whose tasks are being tracked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Returns None for blank ids
    pub fn new(id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted shape of a task
///
/// Running state never appears here. Keys written by older clients
/// (`isRunning`, `startTime`) are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default, rename = "createdAt")]
    pub created_ts: i64,
    #[serde(default, rename = "updatedAt")]
    pub updated_ts: i64,
}

/// A task that has not been given an id yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub background: String,
    pub time_spent: u64,
    /// Creation instant in epoch milliseconds (local ids derive from it)
    pub created_ms: i64,
}

impl TaskDraft {
    pub fn into_record(self, id: TaskId) -> TaskRecord {
        let created_ts = self.created_ms.div_euclid(1000);
        TaskRecord {
            id,
            title: self.title,
            background: self.background,
            time_spent: self.time_spent,
            created_ts,
            updated_ts: created_ts,
        }
    }
}

/// Partial update of persisted fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub background: Option<String>,
    pub time_spent: Option<u64>,
    pub updated_ts: i64,
}

impl TaskPatch {
    pub fn time_spent(time_spent: u64, updated_ts: i64) -> Self {
        Self {
            time_spent: Some(time_spent),
            updated_ts,
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut TaskRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(background) = &self.background {
            record.background = background.clone();
        }
        if let Some(time_spent) = self.time_spent {
            record.time_spent = time_spent;
        }
        record.updated_ts = self.updated_ts;
    }
}

/// In-memory task with transient timer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub background: String,
    /// Accumulated whole seconds
    pub time_spent: u64,
    pub created_ts: i64,
    pub updated_ts: i64,
    /// Epoch milliseconds of the last start or tick; present only while running
    pub(crate) start_time: Option<i64>,
}

impl Task {
    /// Build from a stored record. Loaded tasks are always idle.
    pub fn from_record(record: TaskRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            background: record.background,
            time_spent: record.time_spent,
            created_ts: record.created_ts,
            updated_ts: record.updated_ts,
            start_time: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    /// Time spent including the not-yet-credited part of the current run
    pub fn live_time_spent(&self, now_ms: i64) -> u64 {
        match self.start_time {
            Some(start) => self.time_spent + whole_seconds_between(start, now_ms),
            None => self.time_spent,
        }
    }
}

/// Whole seconds from `start_ms` to `now_ms`, truncated; zero if the clock went backwards
pub fn whole_seconds_between(start_ms: i64, now_ms: i64) -> u64 {
    u64::try_from((now_ms - start_ms).div_euclid(1000)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ignores_transient_fields() {
        let json = r#"{"id":1700000000000,"title":"Read","background":"x.png",
            "timeSpent":42,"isRunning":true,"startTime":1700000001000}"#;
        let record: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, TaskId::new("1700000000000"));
        assert_eq!(record.time_spent, 42);

        let task = Task::from_record(record);
        assert!(!task.is_running());
        assert!(task.start_time().is_none());
    }

    #[test]
    fn test_record_defaults() {
        let record: TaskRecord = serde_json::from_str(r#"{"id":"abc","title":"Write"}"#).unwrap();
        assert_eq!(record.background, DEFAULT_BACKGROUND);
        assert_eq!(record.time_spent, 0);
        assert_eq!(record.created_ts, 0);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = TaskRecord {
            id: TaskId::new("7"),
            title: "Code".to_string(),
            background: "bg".to_string(),
            time_spent: 5,
            created_ts: 10,
            updated_ts: 11,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"timeSpent\":5"));
        assert!(json.contains("\"createdAt\":10"));
        assert!(json.contains("\"updatedAt\":11"));
        assert!(!json.contains("isRunning"));
    }

    #[test]
    fn test_identity_rejects_blank() {
        assert!(Identity::new("").is_none());
        assert!(Identity::new("   ").is_none());
        assert_eq!(Identity::new(" alice ").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_patch_apply_only_given_fields() {
        let mut record = TaskDraft {
            title: "Old".to_string(),
            background: "bg".to_string(),
            time_spent: 3,
            created_ms: 5_000,
        }
        .into_record(TaskId::new("1"));

        let patch = TaskPatch {
            title: Some("New".to_string()),
            updated_ts: 9,
            ..TaskPatch::default()
        };
        patch.apply(&mut record);
        assert_eq!(record.title, "New");
        assert_eq!(record.background, "bg");
        assert_eq!(record.time_spent, 3);
        assert_eq!(record.updated_ts, 9);
    }

    #[test]
    fn test_whole_seconds_truncates() {
        assert_eq!(whole_seconds_between(0, 999), 0);
        assert_eq!(whole_seconds_between(0, 1_999), 1);
        assert_eq!(whole_seconds_between(5_000, 1_000), 0);
    }
}
