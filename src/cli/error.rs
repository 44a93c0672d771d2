// Error handling utilities for consistent error messages and exit codes

use crate::board::BoardError;
use crate::models::TaskId;
use std::process;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code >1), printing the cause chain
/// Internal errors are for unexpected system failures, storage corruption, etc.
pub fn internal_error(err: &anyhow::Error) -> ! {
    eprintln!("Internal error: {}", err);
    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        eprintln!("\nCaused by:");
        for (depth, cause) in causes.enumerate() {
            eprintln!("{:indent$}  {}", "", cause, indent = depth + 1);
        }
    }
    process::exit(2);
}

/// Whether a board error is the user's doing rather than a storage failure
pub fn is_user_error(err: &BoardError) -> bool {
    matches!(
        err,
        BoardError::Validation(_) | BoardError::NotFound(_) | BoardError::Unavailable(_)
    )
}

/// Whether a CLI failure should exit as an internal error
pub fn is_internal(err: &anyhow::Error) -> bool {
    if let Some(board_err) = err.downcast_ref::<BoardError>() {
        return !is_user_error(board_err);
    }
    let message = err.to_string();
    message.contains("database")
        || message.contains("SQLite")
        || message.contains("corruption")
        || message.contains("Failed to")
}

/// Validate that a task ID is well formed
pub fn validate_task_id(id_str: &str) -> Result<TaskId, String> {
    id_str
        .parse::<TaskId>()
        .map_err(|_| format!("Invalid task ID: '{}'. Task ID cannot be empty.", id_str))
}
