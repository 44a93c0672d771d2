// Output formatting utilities

use crate::models::Task;
use crate::stats::Statistics;
use crate::utils::{format_hms, format_hours};
use chrono::{Local, TimeZone};
use std::io::IsTerminal;

// ANSI escape codes for terminal formatting
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_CYAN: &str = "\x1b[36m";
const ANSI_FG_BRIGHT_BLACK: &str = "\x1b[90m";

const RUNNING_MARKER: &str = "▶";
const BAR_CHAR: char = '█';

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate, with fallback to the COLUMNS environment
/// variable and a sensible default.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    100
}

fn paint(text: &str, code: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", code, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

fn bold_if_tty(text: &str, is_tty: bool) -> String {
    paint(text, ANSI_BOLD, is_tty)
}

/// Format timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else if max <= 3 {
        text.chars().take(max).collect()
    } else {
        let head: String = text.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}

/// Task table in collection order
///
/// `now_ms` is used to show live time for the running task.
pub fn format_task_list_table(tasks: &[Task], now_ms: i64, width: usize, is_tty: bool) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_string();
    }

    let id_width = tasks
        .iter()
        .map(|t| t.id.as_str().chars().count())
        .max()
        .unwrap_or(2)
        .max(2);
    let time_width = tasks
        .iter()
        .map(|t| format_hms(t.live_time_spent(now_ms)).len())
        .max()
        .unwrap_or(8)
        .max(8);
    // "#  " + marker + id + time + gaps
    let fixed = 4 + 2 + id_width + 2 + time_width + 2;
    let title_width = width.saturating_sub(fixed).max(10);

    let mut output = String::new();
    let header = format!(
        "{}  {} {}  {}  {}",
        pad("#", 2),
        " ",
        pad("ID", id_width),
        pad("Time", time_width),
        "Title"
    );
    output.push_str(&bold_if_tty(header.trim_end(), is_tty));
    output.push('\n');

    for (index, task) in tasks.iter().enumerate() {
        let marker = if task.is_running() { RUNNING_MARKER } else { " " };
        let time = format_hms(task.live_time_spent(now_ms));
        let line = format!(
            "{}  {} {}  {}  {}",
            pad(&(index + 1).to_string(), 2),
            marker,
            pad(task.id.as_str(), id_width),
            pad(&time, time_width),
            truncate(&task.title, title_width)
        );
        if task.is_running() {
            output.push_str(&paint(&line, ANSI_FG_GREEN, is_tty));
        } else {
            output.push_str(&line);
        }
        output.push('\n');
    }

    let total: u64 = tasks.iter().map(|t| t.live_time_spent(now_ms)).sum();
    output.push_str(&paint(
        &format!("{} task(s), {} total", tasks.len(), format_hms(total)),
        ANSI_FG_BRIGHT_BLACK,
        is_tty,
    ));
    output
}

pub fn format_task_summary(task: &Task, now_ms: i64) -> String {
    let mut output = String::new();

    let header = format!("Task {}: {}", task.id, task.title);
    output.push_str(&header);
    output.push('\n');
    output.push_str(&"=".repeat(header.chars().count().max(40)));
    output.push_str("\n\n");

    output.push_str(&format!("Time spent:  {}\n", format_hms(task.live_time_spent(now_ms))));
    output.push_str(&format!(
        "Status:      {}\n",
        if task.is_running() { "running" } else { "idle" }
    ));
    output.push_str(&format!("Background:  {}\n", task.background));
    output.push_str(&format!("Created:     {}\n", format_timestamp(task.created_ts)));
    output.push_str(&format!("Updated:     {}\n", format_timestamp(task.updated_ts)));
    output
}

/// Statistics panel with a horizontal bar chart of the top tasks
pub fn format_statistics(stats: &Statistics, width: usize, is_tty: bool) -> String {
    let mut output = String::new();
    output.push_str(&bold_if_tty("Statistics", is_tty));
    output.push('\n');

    output.push_str(&format!("Tasks:          {}\n", stats.task_count));
    output.push_str(&format!(
        "Total time:     {} ({} h)\n",
        format_hms(stats.total_secs),
        format_hours(stats.total_secs as f64)
    ));
    let average = match stats.average_secs {
        Some(avg) => format!("{} ({} h)", format_hms(avg.round() as u64), format_hours(avg)),
        None => "-".to_string(),
    };
    output.push_str(&format!("Average:        {}\n", average));
    let top = match &stats.top_task {
        Some(top) => format!("{} ({})", top.title, format_hms(top.time_spent)),
        None => "-".to_string(),
    };
    output.push_str(&format!("Top task:       {}\n", top));
    let recent = match &stats.top_recent {
        Some(top) => format!("{} ({})", top.title, format_hms(top.time_spent)),
        None => "-".to_string(),
    };
    output.push_str(&format!("Top (last 24h): {}\n", recent));

    if stats.chart.is_empty() {
        return output;
    }

    output.push('\n');
    output.push_str(&bold_if_tty("Time per task (hours)", is_tty));
    output.push('\n');

    let label_width = stats
        .chart
        .iter()
        .map(|bar| bar.label.chars().count())
        .max()
        .unwrap_or(0);
    let max_hours = stats
        .chart
        .iter()
        .map(|bar| bar.hours)
        .fold(0.0_f64, f64::max);
    // label + gap + bar + gap + value
    let bar_room = width.saturating_sub(label_width + 2 + 8).max(10);

    for bar in &stats.chart {
        let len = if max_hours > 0.0 {
            ((bar.hours / max_hours) * bar_room as f64).round() as usize
        } else {
            0
        };
        let bar_text: String = std::iter::repeat(BAR_CHAR).take(len.max(1)).collect();
        output.push_str(&format!(
            "{}  {} {:.1}\n",
            pad(&bar.label, label_width),
            paint(&bar_text, ANSI_FG_CYAN, is_tty),
            bar.hours
        ));
    }
    output
}

pub fn task_json(task: &Task, now_ms: i64) -> serde_json::Value {
    serde_json::json!({
        "id": task.id,
        "title": task.title,
        "background": task.background,
        "timeSpent": task.live_time_spent(now_ms),
        "isRunning": task.is_running(),
        "createdAt": task.created_ts,
        "updatedAt": task.updated_ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskId, TaskRecord};

    fn task(id: &str, title: &str, time_spent: u64) -> Task {
        Task::from_record(TaskRecord {
            id: TaskId::new(id),
            title: title.to_string(),
            background: "bg".to_string(),
            time_spent,
            created_ts: 0,
            updated_ts: 0,
        })
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(format_task_list_table(&[], 0, 80, false), "No tasks found.");
    }

    #[test]
    fn test_table_rows_in_order() {
        let tasks = vec![task("1", "Read", 3723), task("2", "Write", 0)];
        let table = format_task_list_table(&tasks, 0, 80, false);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with('#'));
        assert!(lines[1].contains("Read"));
        assert!(lines[1].contains("01:02:03"));
        assert!(lines[2].contains("Write"));
        assert!(lines[3].contains("2 task(s), 01:02:03 total"));
        assert!(!table.contains("\x1b["));
    }

    #[test]
    fn test_long_titles_truncated_to_width() {
        let tasks = vec![task("1", &"x".repeat(200), 0)];
        let table = format_task_list_table(&tasks, 0, 60, false);
        assert!(table.lines().nth(1).unwrap().ends_with("..."));
    }

    #[test]
    fn test_statistics_chart() {
        let tasks = vec![task("1", "Deep work", 7200), task("2", "Email", 1800)];
        let stats = Statistics::compute(&tasks, 0);
        let text = format_statistics(&stats, 60, false);

        assert!(text.contains("Total time:     02:30:00 (2.5 h)"));
        assert!(text.contains("Top task:       Deep work (02:00:00)"));
        assert!(text.contains("Deep work"));
        assert!(text.contains("2.0"));
        assert!(text.contains("0.5"));
    }

    #[test]
    fn test_task_json_shape() {
        let value = task_json(&task("7", "Code", 5), 0);
        assert_eq!(value["id"], "7");
        assert_eq!(value["timeSpent"], 5);
        assert_eq!(value["isRunning"], false);
    }
}
