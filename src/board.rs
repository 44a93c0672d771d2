//! Task list coordinator
//!
//! [`TaskBoard`] owns the ordered collection and the [`TimerEngine`]. It
//! turns user intents into in-memory changes and store writes, and it is
//! the only place where engine credits are persisted.
//!
//! Writes are synchronous, so two writes for the same task never overlap.
//! A credit that fails to persist stays in memory, and the task is marked
//! unsynced. It is retried on the next tick, stop or unload.

use crate::models::{Identity, Task, TaskDraft, TaskId, TaskPatch, TaskRecord, DEFAULT_BACKGROUND};
use crate::repo::{Backend, StoreError, Subscription, TaskStore, WriteOp};
use crate::timer::{Credit, StartOutcome, TimerEngine, TimerError};
use crate::utils::Clock;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{0}")]
    Validation(String),

    #[error("Task store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to {op} task: {reason}")]
    WriteFailed { op: WriteOp, reason: String },

    #[error("Failed to read tasks: {0}")]
    ReadFailed(String),

    #[error("Task {0} not found")]
    NotFound(TaskId),
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => BoardError::Unavailable(msg),
            StoreError::WriteFailed { op, reason } => BoardError::WriteFailed { op, reason },
            StoreError::ReadFailed(msg) => BoardError::ReadFailed(msg),
            StoreError::NotFound(id) => BoardError::NotFound(id),
        }
    }
}

impl From<TimerError> for BoardError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::UnknownTask(id) => BoardError::NotFound(id),
        }
    }
}

/// Fields an edit may change; `None` leaves the field alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub background: Option<String>,
    pub time_spent: Option<u64>,
}

impl TaskEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.background.is_none() && self.time_spent.is_none()
    }
}

fn validate_title(title: &str) -> Result<(), BoardError> {
    if title.trim().is_empty() {
        Err(BoardError::Validation("Task title cannot be empty".to_string()))
    } else {
        Ok(())
    }
}

pub struct TaskBoard {
    store: Box<dyn TaskStore>,
    identity: Option<Identity>,
    clock: Box<dyn Clock>,
    engine: TimerEngine,
    tasks: Vec<Task>,
    loaded: bool,
    subscription: Option<Subscription>,
    unsynced: BTreeSet<TaskId>,
    revision: u64,
}

impl TaskBoard {
    pub fn new(store: Box<dyn TaskStore>, identity: Option<Identity>, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            identity,
            clock,
            engine: TimerEngine::new(),
            tasks: Vec::new(),
            loaded: false,
            subscription: None,
            unsynced: BTreeSet::new(),
            revision: 0,
        }
    }

    /// Read the stored snapshot, force every task idle and subscribe for outside changes
    pub fn load(&mut self) -> Result<(), BoardError> {
        if self.store.backend().requires_identity() && self.identity.is_none() {
            return Err(BoardError::Unavailable(
                "no user identity; pass --user or set one in the config".to_string(),
            ));
        }

        let records = self.store.load(self.identity.as_ref())?;
        let mut tasks: Vec<Task> = records.into_iter().map(Task::from_record).collect();
        self.engine.load_reset(&mut tasks);

        let subscription = self.store.subscribe(self.identity.as_ref())?;
        self.subscription = Some(subscription);
        self.tasks = tasks;
        self.unsynced.clear();
        self.loaded = true;
        self.bump();

        log::info!(
            "Loaded {} task(s) from {} store at {}",
            self.tasks.len(),
            self.store.backend().as_str(),
            self.store.location()
        );
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn running(&self) -> Option<&Task> {
        let id = self.engine.running()?;
        self.get(id)
    }

    /// Increments on every change to the in-memory collection
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn backend(&self) -> Backend {
        self.store.backend()
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Ids whose latest credited time has not reached the store yet
    pub fn unsynced(&self) -> impl Iterator<Item = &TaskId> {
        self.unsynced.iter()
    }

    pub fn create(&mut self, title: &str, background: Option<&str>) -> Result<TaskId, BoardError> {
        validate_title(title)?;
        self.ensure_loaded()?;

        let background = match background {
            Some(bg) if !bg.trim().is_empty() => bg.to_string(),
            _ => DEFAULT_BACKGROUND.to_string(),
        };
        let draft = TaskDraft {
            title: title.to_string(),
            background,
            time_spent: 0,
            created_ms: self.clock.now_ms(),
        };

        let record = self.store.put(draft)?;
        let id = record.id.clone();
        log::debug!("Created task {} '{}'", id, record.title);
        self.tasks.push(Task::from_record(record));
        self.bump();
        Ok(id)
    }

    /// Apply an edit in memory and in the store; a failed write restores the previous fields
    pub fn edit(&mut self, id: &TaskId, edit: TaskEdit) -> Result<(), BoardError> {
        if let Some(title) = &edit.title {
            validate_title(title)?;
        }
        self.ensure_loaded()?;
        let index = self.index_of(id)?;
        if edit.is_empty() {
            return Ok(());
        }

        let now_secs = self.clock.now_secs();
        let previous = self.tasks[index].clone();
        {
            let task = &mut self.tasks[index];
            if let Some(title) = &edit.title {
                task.title = title.clone();
            }
            if let Some(background) = &edit.background {
                task.background = background.clone();
            }
            if let Some(time_spent) = edit.time_spent {
                task.time_spent = time_spent;
            }
            task.updated_ts = now_secs;
        }

        let patch = TaskPatch {
            title: edit.title,
            background: edit.background,
            time_spent: edit.time_spent,
            updated_ts: now_secs,
        };
        if let Err(err) = self.store.patch(id, &patch) {
            log::warn!("Edit of task {} not saved, restoring: {}", id, err);
            let task = &mut self.tasks[index];
            task.title = previous.title;
            task.background = previous.background;
            task.time_spent = previous.time_spent;
            task.updated_ts = previous.updated_ts;
            return Err(err.into());
        }

        if patch.time_spent.is_some() {
            self.unsynced.remove(id);
        }
        self.bump();
        Ok(())
    }

    /// Remove a task; a running task is discarded without stop accounting
    pub fn delete(&mut self, id: &TaskId) -> Result<(), BoardError> {
        self.ensure_loaded()?;
        let index = self.index_of(id)?;

        let removed = self.tasks.remove(index);
        let was_running = self.engine.running() == Some(id);
        self.engine.forget(id);

        match self.store.delete(id) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                log::warn!("Task {} was already gone from the store", id);
            }
            Err(err) => {
                log::warn!("Delete of task {} not saved, restoring: {}", id, err);
                let start = removed.start_time;
                self.tasks.insert(index, removed);
                if let (true, Some(start)) = (was_running, start) {
                    self.restore_running(id, start);
                }
                return Err(err.into());
            }
        }

        self.unsynced.remove(id);
        log::debug!("Deleted task {}", id);
        self.bump();
        Ok(())
    }

    /// Move `dragged` to the index `target` held before the move
    ///
    /// Returns `Ok(false)` when nothing moved (same id, or either id absent).
    /// A failure to persist the new order is returned, but the in-memory
    /// order is kept.
    pub fn reorder(&mut self, dragged: &TaskId, target: &TaskId) -> Result<bool, BoardError> {
        self.ensure_loaded()?;
        if dragged == target {
            return Ok(false);
        }
        let from = self.tasks.iter().position(|t| &t.id == dragged);
        let to = self.tasks.iter().position(|t| &t.id == target);
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(false);
        };

        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);
        self.bump();

        let order: Vec<TaskId> = self.tasks.iter().map(|t| t.id.clone()).collect();
        if let Err(err) = self.store.save_order(&order) {
            log::warn!("New order not saved: {}", err);
            return Err(err.into());
        }
        Ok(true)
    }

    /// Start a task, stopping and crediting whichever task was running
    ///
    /// The transition always applies once the id is known. An error after
    /// that means the displaced task's credit did not reach the store.
    pub fn start(&mut self, id: &TaskId) -> Result<StartOutcome, BoardError> {
        self.ensure_loaded()?;
        let now = self.clock.now_ms();
        let outcome = self.engine.start(&mut self.tasks, id, now)?;

        if let StartOutcome::Started { stopped } = &outcome {
            self.bump();
            self.persist(stopped.as_ref())?;
        }
        Ok(outcome)
    }

    pub fn stop(&mut self, id: &TaskId) -> Result<Option<Credit>, BoardError> {
        self.ensure_loaded()?;
        self.index_of(id)?;
        let now = self.clock.now_ms();
        let credit = self.engine.stop(&mut self.tasks, id, now);

        if credit.is_some() {
            self.bump();
        }
        self.persist(credit.as_ref())?;
        Ok(credit)
    }

    /// One session tick: pick up outside changes, credit the running task and checkpoint it
    pub fn tick(&mut self) -> Result<Option<Credit>, BoardError> {
        if !self.loaded {
            return Ok(None);
        }

        if let Err(err) = self.store.poll() {
            log::warn!("Polling for outside changes failed: {}", err);
        }
        let snapshot = self.subscription.as_ref().and_then(|sub| sub.latest());
        if let Some(records) = snapshot {
            self.apply_snapshot(records);
        }

        let now = self.clock.now_ms();
        let credit = self
            .engine
            .tick(&mut self.tasks, now)
            .filter(|credit| credit.seconds > 0);
        if credit.is_some() {
            self.bump();
        }
        self.persist(credit.as_ref())?;
        Ok(credit)
    }

    /// Stop whatever runs and flush pending credits
    pub fn unload(&mut self) -> Result<Option<Credit>, BoardError> {
        if !self.loaded {
            return Ok(None);
        }
        let now = self.clock.now_ms();
        let credit = self.engine.unload(&mut self.tasks, now);
        if credit.is_some() {
            self.bump();
        }
        self.persist(credit.as_ref())?;
        Ok(credit)
    }

    fn ensure_loaded(&self) -> Result<(), BoardError> {
        if self.loaded {
            Ok(())
        } else {
            Err(BoardError::Unavailable("tasks have not been loaded".to_string()))
        }
    }

    fn index_of(&self, id: &TaskId) -> Result<usize, BoardError> {
        self.tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| BoardError::NotFound(id.clone()))
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    fn restore_running(&mut self, id: &TaskId, start_ms: i64) {
        // Same start instant, so the run continues unbroken
        if self.engine.start(&mut self.tasks, id, start_ms).is_err() {
            log::warn!("Could not restore running state of task {}", id);
        }
    }

    /// Write `credit` plus every earlier credit that failed; returns the first failure
    fn persist(&mut self, credit: Option<&Credit>) -> Result<(), BoardError> {
        if let Some(credit) = credit {
            self.unsynced.insert(credit.id.clone());
        }
        if self.unsynced.is_empty() {
            return Ok(());
        }

        let now_secs = self.clock.now_secs();
        let pending: Vec<TaskId> = self.unsynced.iter().cloned().collect();
        let mut first_error = None;

        for id in pending {
            let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
                self.unsynced.remove(&id);
                continue;
            };
            task.updated_ts = now_secs;
            let patch = TaskPatch::time_spent(task.time_spent, now_secs);

            match self.store.patch(&id, &patch) {
                Ok(()) => {
                    self.unsynced.remove(&id);
                }
                Err(StoreError::NotFound(_)) => {
                    log::warn!("Task {} vanished from the store; dropping its pending time", id);
                    self.unsynced.remove(&id);
                }
                Err(err) => {
                    log::warn!("Time for task {} not saved, will retry: {}", id, err);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Replace the collection with an outside snapshot, keeping local timer state
    fn apply_snapshot(&mut self, records: Vec<TaskRecord>) {
        let mut next: Vec<Task> = Vec::with_capacity(records.len());
        for record in records {
            let mut task = Task::from_record(record);
            if let Some(local) = self.tasks.iter().find(|t| t.id == task.id) {
                if local.is_running() {
                    task.time_spent = local.time_spent;
                    task.start_time = local.start_time;
                } else if self.unsynced.contains(&task.id) {
                    task.time_spent = local.time_spent;
                }
            }
            next.push(task);
        }

        if let Some(running) = self.engine.running().cloned() {
            if !next.iter().any(|t| t.id == running) {
                log::info!("Running task {} was removed elsewhere", running);
                self.engine.forget(&running);
            }
        }
        self.unsynced.retain(|id| next.iter().any(|t| &t.id == id));

        log::debug!("Applied outside snapshot of {} task(s)", next.len());
        self.tasks = next;
        self.bump();
    }
}

impl Drop for TaskBoard {
    fn drop(&mut self) {
        if let Err(err) = self.unload() {
            log::warn!("Final save failed: {}", err);
        }
    }
}
