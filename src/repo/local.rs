use crate::models::{Identity, TaskDraft, TaskId, TaskPatch, TaskRecord};
use crate::repo::{Backend, StoreError, Subscription, TaskStore, WriteOp};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

/// Local task store: the whole collection as one JSON array
///
/// Array order is display order. Ids are millisecond timestamps taken from
/// the draft's creation instant, bumped until unique. Every write re-reads
/// the file so changes from other processes are kept, then replaces it
/// atomically (temp file + rename).
pub struct JsonTaskStore {
    path: PathBuf,
}

impl JsonTaskStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_file(&self) -> Result<Vec<TaskRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::ReadFailed(format!("{}: {}", self.path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| StoreError::ReadFailed(format!("{}: {}", self.path.display(), e)))
    }

    /// Apply `change` to the current file contents and write the result back
    fn mutate<T>(
        &mut self,
        op: WriteOp,
        change: impl FnOnce(&mut Vec<TaskRecord>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut records = self.read_file().map_err(|e| StoreError::write_failed(op, e))?;
        let value = change(&mut records)?;
        self.write_file(&records).map_err(|e| StoreError::write_failed(op, e))?;
        Ok(value)
    }

    fn write_file(&self, records: &[TaskRecord]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(records)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Timestamp-derived id that is not yet taken
fn next_local_id(records: &[TaskRecord], created_ms: i64) -> TaskId {
    let mut candidate = created_ms;
    while records.iter().any(|r| r.id.as_str() == candidate.to_string()) {
        candidate += 1;
    }
    TaskId::new(candidate.to_string())
}

impl TaskStore for JsonTaskStore {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self, _identity: Option<&Identity>) -> Result<Vec<TaskRecord>, StoreError> {
        let records = self.read_file()?;
        log::debug!("Loaded {} task(s) from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn subscribe(&mut self, _identity: Option<&Identity>) -> Result<Subscription, StoreError> {
        Ok(Subscription::detached())
    }

    fn put(&mut self, draft: TaskDraft) -> Result<TaskRecord, StoreError> {
        self.mutate(WriteOp::Add, |records| {
            let id = next_local_id(records, draft.created_ms);
            let record = draft.into_record(id);
            records.push(record.clone());
            Ok(record)
        })
    }

    fn patch(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        self.mutate(WriteOp::Update, |records| {
            let record = records
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            patch.apply(record);
            Ok(())
        })
    }

    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError> {
        self.mutate(WriteOp::Delete, |records| {
            let index = records
                .iter()
                .position(|r| &r.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            records.remove(index);
            Ok(())
        })
    }

    fn save_order(&mut self, ids: &[TaskId]) -> Result<(), StoreError> {
        self.mutate(WriteOp::Reorder, |records| {
            let mut ordered = Vec::with_capacity(records.len());
            for id in ids {
                if let Some(index) = records.iter().position(|r| &r.id == id) {
                    ordered.push(records.remove(index));
                }
            }
            // Anything not named keeps its relative order at the end
            ordered.append(records);
            *records = ordered;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(title: &str, created_ms: i64) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            background: "bg".to_string(),
            time_spent: 0,
            created_ms,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonTaskStore::new(temp_dir.path().join("tasks.json"));
        assert!(store.load(None).unwrap().is_empty());
    }

    #[test]
    fn test_put_assigns_unique_timestamp_ids() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonTaskStore::new(temp_dir.path().join("tasks.json"));

        let first = store.put(draft("Read", 1_700_000_000_000)).unwrap();
        let second = store.put(draft("Write", 1_700_000_000_000)).unwrap();

        assert_eq!(first.id.as_str(), "1700000000000");
        assert_eq!(second.id.as_str(), "1700000000001");
        assert_eq!(first.created_ts, 1_700_000_000);
    }

    #[test]
    fn test_writes_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");

        let mut store = JsonTaskStore::new(path.clone());
        let a = store.put(draft("A", 1)).unwrap();
        let b = store.put(draft("B", 2)).unwrap();
        store.patch(&a.id, &TaskPatch::time_spent(90, 5)).unwrap();
        store.save_order(&[b.id.clone(), a.id.clone()]).unwrap();

        let mut reopened = JsonTaskStore::new(path);
        let records = reopened.load(None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "B");
        assert_eq!(records[1].time_spent, 90);
        assert_eq!(records[1].updated_ts, 5);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonTaskStore::new(temp_dir.path().join("tasks.json"));
        let result = store.delete(&TaskId::new("nope"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_reads_browser_export() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");
        fs::write(
            &path,
            r#"[{"id":1700000000000,"title":"Read","background":"a.png","timeSpent":65,
                "isRunning":true,"startTime":1700000001000}]"#,
        )
        .unwrap();

        let mut store = JsonTaskStore::new(path);
        let records = store.load(None).unwrap();
        assert_eq!(records[0].id.as_str(), "1700000000000");
        assert_eq!(records[0].time_spent, 65);
    }

    #[test]
    fn test_corrupt_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");
        fs::write(&path, "{not json").unwrap();

        let mut store = JsonTaskStore::new(path);
        assert!(matches!(store.load(None), Err(StoreError::ReadFailed(_))));
    }

    #[test]
    fn test_unwritable_location_is_write_error() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should be
        let path = temp_dir.path().join("tasks.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let mut store = JsonTaskStore::new(path.clone());
        let result = store.put(draft("A", 1));

        assert!(matches!(result, Err(StoreError::WriteFailed { op: WriteOp::Add, .. })));
        assert!(path.join("occupied").is_dir());
    }

    #[test]
    fn test_writes_keep_changes_from_other_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");

        let mut session = JsonTaskStore::new(path.clone());
        session.load(None).unwrap();
        let a = session.put(draft("A", 1)).unwrap();

        let mut other = JsonTaskStore::new(path.clone());
        let b = other.put(draft("B", 2)).unwrap();

        session.patch(&a.id, &TaskPatch::time_spent(30, 9)).unwrap();
        session.save_order(&[a.id.clone()]).unwrap();

        let records = JsonTaskStore::new(path).load(None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time_spent, 30);
        assert_eq!(records[1].id, b.id);
    }
}
