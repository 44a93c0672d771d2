//! Running-slot state machine
//!
//! At most one task runs at a time. The engine owns the slot and mutates the
//! tasks it is handed; every transition that credits time returns a
//! [`Credit`] for the caller to persist.
//!
//! Accounting is in whole seconds. Each tick credits
//! `floor((now - start_time) / 1000)` and re-bases `start_time` to `now`, so
//! the sub-second remainder of every tick is dropped. Over many short runs
//! this under-counts by less than one second per start/stop cycle.

use crate::models::{whole_seconds_between, Task, TaskId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Task {0} not found")]
    UnknownTask(TaskId),
}

/// Time credited to a task by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub id: TaskId,
    /// Whole seconds added by this transition
    pub seconds: u64,
    /// Accumulated total after the credit
    pub time_spent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The task was already the running one
    AlreadyRunning,
    /// The task started; `stopped` is the credit of whichever task it displaced
    Started { stopped: Option<Credit> },
}

#[derive(Debug, Default)]
pub struct TimerEngine {
    running: Option<TaskId>,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> Option<&TaskId> {
        self.running.as_ref()
    }

    /// Start `id`, stopping any other running task first
    pub fn start(&mut self, tasks: &mut [Task], id: &TaskId, now_ms: i64) -> Result<StartOutcome, TimerError> {
        let target = tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| TimerError::UnknownTask(id.clone()))?;

        if self.running.as_ref() == Some(id) && tasks[target].is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let stopped = match self.running.clone() {
            Some(current) => self.stop(tasks, &current, now_ms),
            None => None,
        };

        tasks[target].start_time = Some(now_ms);
        self.running = Some(id.clone());
        log::debug!("Started task {}", id);
        Ok(StartOutcome::Started { stopped })
    }

    /// Stop `id` if it is running; no-op otherwise
    pub fn stop(&mut self, tasks: &mut [Task], id: &TaskId, now_ms: i64) -> Option<Credit> {
        let task = tasks.iter_mut().find(|t| &t.id == id)?;
        let start = task.start_time.take()?;
        if self.running.as_ref() == Some(id) {
            self.running = None;
        }

        let seconds = whole_seconds_between(start, now_ms);
        task.time_spent += seconds;
        log::debug!("Stopped task {} after {}s", id, seconds);
        Some(Credit {
            id: id.clone(),
            seconds,
            time_spent: task.time_spent,
        })
    }

    /// Credit the running task and re-base its start time to `now_ms`
    pub fn tick(&mut self, tasks: &mut [Task], now_ms: i64) -> Option<Credit> {
        let id = self.running.clone()?;
        let task = match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => task,
            None => {
                // Removed from under us
                self.running = None;
                return None;
            }
        };
        let start = task.start_time?;

        let seconds = whole_seconds_between(start, now_ms);
        task.time_spent += seconds;
        task.start_time = Some(now_ms);
        Some(Credit {
            id,
            seconds,
            time_spent: task.time_spent,
        })
    }

    /// Stop whatever is running; same accounting as `stop`
    pub fn unload(&mut self, tasks: &mut [Task], now_ms: i64) -> Option<Credit> {
        let id = self.running.clone()?;
        let credit = self.stop(tasks, &id, now_ms);
        self.running = None;
        credit
    }

    /// Force every task idle, regardless of what the snapshot claimed
    pub fn load_reset(&mut self, tasks: &mut [Task]) {
        for task in tasks.iter_mut() {
            task.start_time = None;
        }
        self.running = None;
    }

    /// Drop the running slot for a task that is going away, without accounting
    pub fn forget(&mut self, id: &TaskId) {
        if self.running.as_ref() == Some(id) {
            self.running = None;
        }
    }
}
