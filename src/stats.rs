use crate::models::{Task, TaskId};
use crate::utils::round_hours;
use serde::Serialize;

/// Bars shown in the time chart
pub const CHART_LIMIT: usize = 8;
/// Longest chart label before truncation
pub const LABEL_MAX_CHARS: usize = 15;
const RECENT_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopTask {
    pub id: TaskId,
    pub title: String,
    pub time_spent: u64,
}

impl TopTask {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            time_spent: task.time_spent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBar {
    pub id: TaskId,
    pub label: String,
    pub hours: f64,
}

/// Aggregate view over a task collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub task_count: usize,
    pub total_secs: u64,
    /// Most time overall; ties go to the earliest task in collection order
    pub top_task: Option<TopTask>,
    /// Most time among tasks updated in the last 24 hours
    pub top_recent: Option<TopTask>,
    pub average_secs: Option<f64>,
    pub chart: Vec<ChartBar>,
}

impl Statistics {
    pub fn compute(tasks: &[Task], now_secs: i64) -> Self {
        let total_secs: u64 = tasks.iter().map(|t| t.time_spent).sum();
        let average_secs = if tasks.is_empty() {
            None
        } else {
            Some(total_secs as f64 / tasks.len() as f64)
        };

        let top_task = top_of(tasks.iter()).map(TopTask::from_task);
        let top_recent = top_of(
            tasks
                .iter()
                .filter(|t| now_secs - t.updated_ts <= RECENT_WINDOW_SECS),
        )
        .map(TopTask::from_task);

        let mut ranked: Vec<&Task> = tasks.iter().filter(|t| t.time_spent > 0).collect();
        // Stable sort keeps collection order among equal times
        ranked.sort_by(|a, b| b.time_spent.cmp(&a.time_spent));
        let chart = ranked
            .into_iter()
            .take(CHART_LIMIT)
            .map(|t| ChartBar {
                id: t.id.clone(),
                label: chart_label(&t.title),
                hours: round_hours(t.time_spent),
            })
            .collect();

        Statistics {
            task_count: tasks.len(),
            total_secs,
            top_task,
            top_recent,
            average_secs,
            chart,
        }
    }
}

/// First task with the maximum time
fn top_of<'a>(tasks: impl Iterator<Item = &'a Task>) -> Option<&'a Task> {
    tasks.fold(None::<&'a Task>, |best, task| match best {
        Some(b) if b.time_spent >= task.time_spent => Some(b),
        _ => Some(task),
    })
}

pub fn chart_label(title: &str) -> String {
    if title.chars().count() > LABEL_MAX_CHARS {
        let head: String = title.chars().take(LABEL_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}
