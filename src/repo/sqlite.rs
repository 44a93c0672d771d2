use crate::db::DbConnection;
use crate::models::{Identity, TaskDraft, TaskId, TaskPatch, TaskRecord};
use crate::repo::{Backend, StoreError, Subscribers, Subscription, TaskStore, WriteOp};
use anyhow::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Shared per-user task store backed by SQLite
///
/// Rows are namespaced by owner. The owner is bound by the first `load` or
/// `subscribe`; writes before that fail with `Unavailable`. Other clients
/// writing to the same file are detected through `PRAGMA data_version`,
/// which only moves when a *different* connection commits.
///
/// # Example
///
/// ```no_run
/// use tasktime::models::Identity;
/// use tasktime::repo::{SqliteTaskStore, TaskStore};
///
/// let mut store = SqliteTaskStore::open_in_memory().unwrap();
/// let alice = Identity::new("alice").unwrap();
/// let tasks = store.load(Some(&alice)).unwrap();
/// assert!(tasks.is_empty());
/// ```
pub struct SqliteTaskStore {
    conn: Connection,
    path: Option<PathBuf>,
    owner: Option<Identity>,
    data_version: i64,
    subscribers: Subscribers,
}

impl SqliteTaskStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = DbConnection::open(path)?;
        Ok(Self::with_connection(conn, Some(path.to_path_buf())))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = DbConnection::connect_in_memory()?;
        Ok(Self::with_connection(conn, None))
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        Self {
            conn,
            path,
            owner: None,
            data_version: 0,
            subscribers: Subscribers::default(),
        }
    }

    fn bind<'a>(&mut self, identity: Option<&'a Identity>) -> Result<&'a Identity, StoreError> {
        let identity = identity.ok_or_else(|| {
            StoreError::Unavailable("a user identity is required for the shared store".to_string())
        })?;
        if self.owner.as_ref() != Some(identity) {
            log::debug!("Binding shared store to user {}", identity);
            self.owner = Some(identity.clone());
        }
        Ok(identity)
    }

    fn owner(&self) -> Result<&Identity, StoreError> {
        self.owner.as_ref().ok_or_else(|| {
            StoreError::Unavailable("tasks must be loaded for a user before writing".to_string())
        })
    }

    fn query_records(&self, owner: &Identity) -> rusqlite::Result<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, background, time_spent, created_ts, updated_ts
             FROM tasks WHERE owner = ?1
             ORDER BY position, created_ts, id",
        )?;

        let rows = stmt.query_map([owner.as_str()], |row| {
            let time_spent: i64 = row.get(3)?;
            Ok(TaskRecord {
                id: TaskId::new(row.get::<_, String>(0)?),
                title: row.get(1)?,
                background: row.get(2)?,
                time_spent: u64::try_from(time_spent).unwrap_or(0),
                created_ts: row.get(4)?,
                updated_ts: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn current_data_version(&self) -> rusqlite::Result<i64> {
        self.conn.query_row("PRAGMA data_version", [], |row| row.get(0))
    }
}

fn to_sql_secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl TaskStore for SqliteTaskStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }

    fn load(&mut self, identity: Option<&Identity>) -> Result<Vec<TaskRecord>, StoreError> {
        let owner = self.bind(identity)?.clone();
        let records = self
            .query_records(&owner)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        self.data_version = self
            .current_data_version()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        log::debug!("Loaded {} task(s) for {}", records.len(), owner);
        Ok(records)
    }

    fn subscribe(&mut self, identity: Option<&Identity>) -> Result<Subscription, StoreError> {
        self.bind(identity)?;
        Ok(self.subscribers.add())
    }

    fn poll(&mut self) -> Result<(), StoreError> {
        if self.subscribers.is_empty() {
            return Ok(());
        }
        let owner = match &self.owner {
            Some(owner) => owner.clone(),
            None => return Ok(()),
        };

        let version = self
            .current_data_version()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        if version == self.data_version {
            return Ok(());
        }

        let snapshot = self
            .query_records(&owner)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        self.data_version = version;
        log::debug!(
            "Outside change detected, pushing {} task(s) to {} subscriber(s)",
            snapshot.len(),
            self.subscribers.len()
        );
        self.subscribers.dispatch(&snapshot);
        Ok(())
    }

    fn put(&mut self, draft: TaskDraft) -> Result<TaskRecord, StoreError> {
        let owner = self.owner()?.clone();
        let record = draft.into_record(TaskId::new(uuid::Uuid::new_v4().to_string()));

        self.conn
            .execute(
                "INSERT INTO tasks (owner, id, title, background, time_spent, created_ts, updated_ts, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                         (SELECT COALESCE(MAX(position), -1) + 1 FROM tasks WHERE owner = ?1))",
                rusqlite::params![
                    owner.as_str(),
                    record.id.as_str(),
                    record.title,
                    record.background,
                    to_sql_secs(record.time_spent),
                    record.created_ts,
                    record.updated_ts,
                ],
            )
            .map_err(|e| StoreError::write_failed(WriteOp::Add, e))?;

        Ok(record)
    }

    fn patch(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        let owner = self.owner()?.clone();
        let changed = self
            .conn
            .execute(
                "UPDATE tasks SET
                    title = COALESCE(?1, title),
                    background = COALESCE(?2, background),
                    time_spent = COALESCE(?3, time_spent),
                    updated_ts = ?4
                 WHERE owner = ?5 AND id = ?6",
                rusqlite::params![
                    patch.title,
                    patch.background,
                    patch.time_spent.map(to_sql_secs),
                    patch.updated_ts,
                    owner.as_str(),
                    id.as_str(),
                ],
            )
            .map_err(|e| StoreError::write_failed(WriteOp::Update, e))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError> {
        let owner = self.owner()?.clone();
        let changed = self
            .conn
            .execute(
                "DELETE FROM tasks WHERE owner = ?1 AND id = ?2",
                rusqlite::params![owner.as_str(), id.as_str()],
            )
            .map_err(|e| StoreError::write_failed(WriteOp::Delete, e))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn save_order(&mut self, ids: &[TaskId]) -> Result<(), StoreError> {
        let owner = self.owner()?.clone();
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::write_failed(WriteOp::Reorder, e))?;

        for (position, id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE tasks SET position = ?1 WHERE owner = ?2 AND id = ?3",
                rusqlite::params![position as i64, owner.as_str(), id.as_str()],
            )
            .map_err(|e| StoreError::write_failed(WriteOp::Reorder, e))?;
        }

        tx.commit()
            .map_err(|e| StoreError::write_failed(WriteOp::Reorder, e))
    }
}
