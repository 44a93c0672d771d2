//! Task store adapters
//!
//! [`TaskStore`] is the capability set the board relies on. Two backends
//! implement it:
//! - [`JsonTaskStore`]: a single JSON file, no identity, no live updates
//! - [`SqliteTaskStore`]: per-identity rows in a SQLite file that several
//!   clients may share; changes made by other clients are pushed to
//!   subscribers when the store is polled
//!
//! Neither backend ever sees running state. Only the fields of
//! [`TaskRecord`] cross this boundary.

pub mod local;
pub mod sqlite;

pub use local::JsonTaskStore;
pub use sqlite::SqliteTaskStore;

use crate::config::{BackendKind, Config};
use crate::models::{Identity, TaskDraft, TaskId, TaskPatch, TaskRecord};
use anyhow::{Context, Result};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

/// Which backend a store talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Whether load/subscribe need an identity
    pub fn requires_identity(&self) -> bool {
        matches!(self, Backend::Sqlite)
    }
}

/// Mutation kinds, named in user-facing failure messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Add,
    Update,
    Delete,
    Reorder,
}

impl WriteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOp::Add => "add",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
            WriteOp::Reorder => "reorder",
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by task stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to {op} task: {reason}")]
    WriteFailed { op: WriteOp, reason: String },

    #[error("Failed to read tasks: {0}")]
    ReadFailed(String),

    #[error("Task {0} not found")]
    NotFound(TaskId),
}

impl StoreError {
    pub fn write_failed(op: WriteOp, reason: impl fmt::Display) -> Self {
        StoreError::WriteFailed {
            op,
            reason: reason.to_string(),
        }
    }
}

/// Live-update handle returned by [`TaskStore::subscribe`]
///
/// Dropping the handle (or calling [`Subscription::cancel`]) unsubscribes;
/// the store forgets the listener the next time it dispatches.
#[derive(Debug)]
pub struct Subscription {
    rx: Option<Receiver<Vec<TaskRecord>>>,
}

impl Subscription {
    /// A handle that never yields, for stores without live push
    pub fn detached() -> Self {
        Self { rx: None }
    }

    /// Newest pending snapshot, discarding older ones
    pub fn latest(&self) -> Option<Vec<TaskRecord>> {
        let rx = self.rx.as_ref()?;
        let mut latest = None;
        while let Ok(snapshot) = rx.try_recv() {
            latest = Some(snapshot);
        }
        latest
    }

    pub fn is_live(&self) -> bool {
        self.rx.is_some()
    }

    pub fn cancel(self) {}
}

/// Registered listeners of a store
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<Sender<Vec<TaskRecord>>>,
}

impl Subscribers {
    pub(crate) fn add(&mut self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        Subscription { rx: Some(rx) }
    }

    /// Send a snapshot to every live listener, pruning cancelled ones
    pub(crate) fn dispatch(&mut self, snapshot: &[TaskRecord]) {
        self.senders.retain(|tx| tx.send(snapshot.to_vec()).is_ok());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

/// Capability interface over the persistence backend
pub trait TaskStore {
    fn backend(&self) -> Backend;

    /// Human-readable location (file path or ":memory:")
    fn location(&self) -> String;

    /// Current snapshot in stored order
    fn load(&mut self, identity: Option<&Identity>) -> Result<Vec<TaskRecord>, StoreError>;

    /// Register for snapshots pushed when another client changes the store
    fn subscribe(&mut self, identity: Option<&Identity>) -> Result<Subscription, StoreError>;

    /// Detect outside changes and dispatch them to subscribers
    fn poll(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Persist a new task, assigning its id
    fn put(&mut self, draft: TaskDraft) -> Result<TaskRecord, StoreError>;

    fn patch(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError>;

    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError>;

    /// Persist display order; ids not in the store are ignored
    fn save_order(&mut self, ids: &[TaskId]) -> Result<(), StoreError>;
}

/// Open the store selected by configuration
pub fn open_store(config: &Config) -> Result<Box<dyn TaskStore>> {
    match config.backend {
        BackendKind::Local => {
            log::debug!("Using local task file {}", config.location.display());
            Ok(Box::new(JsonTaskStore::new(config.location.clone())))
        }
        BackendKind::Sqlite => {
            log::debug!("Using shared task database {}", config.location.display());
            let store = SqliteTaskStore::open(&config.location)
                .with_context(|| format!("Failed to open task database: {}", config.location.display()))?;
            Ok(Box::new(store))
        }
    }
}
