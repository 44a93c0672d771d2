use crate::board::{BoardError, TaskBoard, TaskEdit};
use crate::cli::error::validate_task_id;
use crate::cli::output::{
    format_statistics, format_task_list_table, format_task_summary, get_terminal_width, is_tty, task_json,
};
use crate::cli::session::run_session;
use crate::config::Config;
use crate::models::TaskId;
use crate::repo::open_store;
use crate::stats::Statistics;
use crate::utils::{parse_hms, Clock, SystemClock};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufReader, Write};

#[derive(Parser)]
#[command(name = "tasktime")]
#[command(about = "Task time tracker - start/stop timers per task with local or shared storage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// User identity for the shared store (overrides TASKTIME_USER and the rc file)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Background image URL or data URI
        #[arg(long)]
        background: Option<String>,
        /// Task title
        title: Vec<String>,
    },
    /// List tasks in display order
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show details of a task
    Show {
        /// Task ID, or #N for the Nth task in the list
        id: String,
    },
    /// Change a task's title, background or time spent
    Edit {
        /// Task ID, or #N for the Nth task in the list
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        background: Option<String>,
        /// Time spent as HH:MM:SS
        #[arg(long = "time", value_name = "HH:MM:SS")]
        time: Option<String>,
    },
    /// Delete a task
    Delete {
        /// Task ID, or #N for the Nth task in the list
        id: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Move a task to the position of another
    Move {
        /// Task to move
        dragged: String,
        /// Task whose position it takes
        target: String,
    },
    /// Show time statistics and a chart of the top tasks
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show backend, location and identity
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Start an interactive timing session
    Run,
}

pub fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    e.print()?;
                    return Ok(());
                }
                _ => {
                    e.print()?;
                    std::process::exit(1);
                }
            }
        }
    };

    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    let user = cli.user.as_deref();
    match cli.command {
        Commands::Add { background, title } => handle_add(user, title, background),
        Commands::List { json } => handle_list(user, json),
        Commands::Show { id } => handle_show(user, &id),
        Commands::Edit { id, title, background, time } => handle_edit(user, &id, title, background, time),
        Commands::Delete { id, yes } => handle_delete(user, &id, yes),
        Commands::Move { dragged, target } => handle_move(user, &dragged, &target),
        Commands::Stats { json } => handle_stats(user, json),
        Commands::Status { json } => handle_status(user, json),
        Commands::Run => handle_run(user),
    }
}

/// Load configuration, open the configured store and load the board
pub fn open_board(user: Option<&str>) -> Result<TaskBoard> {
    let config = Config::load().context("Could not load configuration")?;
    let identity = config.identity(user);
    let store = open_store(&config)?;
    let mut board = TaskBoard::new(store, identity, Box::new(SystemClock));
    board.load()?;
    Ok(board)
}

/// Resolve a task reference: a task ID, or `#N` for the Nth task in display order
pub fn resolve_task(board: &TaskBoard, token: &str) -> Result<TaskId, BoardError> {
    let token = token.trim();
    if let Some(position) = token.strip_prefix('#') {
        if let Ok(n) = position.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|index| board.tasks().get(index))
                .map(|task| task.id.clone())
                .ok_or_else(|| BoardError::NotFound(TaskId::new(token)));
        }
    }
    let id = validate_task_id(token).map_err(BoardError::Validation)?;
    if board.get(&id).is_none() {
        return Err(BoardError::NotFound(id));
    }
    Ok(id)
}

fn handle_add(user: Option<&str>, title: Vec<String>, background: Option<String>) -> Result<()> {
    let title = title.join(" ");
    let mut board = open_board(user)?;
    let id = board.create(&title, background.as_deref())?;
    println!("Created task {}: {}", id, title);
    Ok(())
}

fn handle_list(user: Option<&str>, json: bool) -> Result<()> {
    let board = open_board(user)?;
    let now = board.now_ms();

    if json {
        let tasks: Vec<serde_json::Value> = board.tasks().iter().map(|t| task_json(t, now)).collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    } else {
        println!("{}", format_task_list_table(board.tasks(), now, get_terminal_width(), is_tty()));
    }
    Ok(())
}

fn handle_show(user: Option<&str>, id: &str) -> Result<()> {
    let board = open_board(user)?;
    let id = resolve_task(&board, id)?;
    let task = board.get(&id).ok_or_else(|| BoardError::NotFound(id.clone()))?;
    print!("{}", format_task_summary(task, board.now_ms()));
    Ok(())
}

fn handle_edit(
    user: Option<&str>,
    id: &str,
    title: Option<String>,
    background: Option<String>,
    time: Option<String>,
) -> Result<()> {
    let mut board = open_board(user)?;
    let id = resolve_task(&board, id)?;

    let time_spent = match time.as_deref() {
        Some(text) => {
            let parsed = parse_hms(text);
            if parsed.is_none() {
                log::debug!("Ignoring malformed time '{}', keeping previous value", text);
            }
            parsed
        }
        None => None,
    };

    let edit = TaskEdit {
        title,
        background,
        time_spent,
    };
    if edit.is_empty() {
        println!("Nothing to change for task {}.", id);
        return Ok(());
    }

    board.edit(&id, edit)?;
    println!("Modified task {}", id);
    Ok(())
}

fn handle_delete(user: Option<&str>, id: &str, yes: bool) -> Result<()> {
    let mut board = open_board(user)?;
    let id = resolve_task(&board, id)?;
    let title = board.get(&id).map(|t| t.title.clone()).unwrap_or_default();

    if !yes {
        eprint!("Delete task {} '{}'? [y/N]: ", id, title);
        io::stderr()
            .flush()
            .map_err(|e| anyhow::anyhow!("Failed to flush stderr: {}", e))?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| anyhow::anyhow!("Failed to read input: {}", e))?;
        if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    board.delete(&id)?;
    println!("Deleted task {}: {}", id, title);
    Ok(())
}

fn handle_move(user: Option<&str>, dragged: &str, target: &str) -> Result<()> {
    let mut board = open_board(user)?;
    let dragged = resolve_task(&board, dragged)?;
    let target = resolve_task(&board, target)?;

    if board.reorder(&dragged, &target)? {
        let position = board
            .tasks()
            .iter()
            .position(|t| t.id == dragged)
            .map(|index| index + 1)
            .unwrap_or_default();
        println!("Moved task {} to position {}", dragged, position);
    } else {
        println!("Nothing to move.");
    }
    Ok(())
}

fn handle_stats(user: Option<&str>, json: bool) -> Result<()> {
    let board = open_board(user)?;
    let stats = Statistics::compute(board.tasks(), SystemClock.now_secs());

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", format_statistics(&stats, get_terminal_width(), is_tty()));
    }
    Ok(())
}

fn handle_status(user: Option<&str>, json: bool) -> Result<()> {
    let board = open_board(user)?;
    let identity = board.identity().map(|i| i.to_string());

    if json {
        let status = serde_json::json!({
            "backend": board.backend().as_str(),
            "location": board.location(),
            "user": identity,
            "tasks": board.tasks().len(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Backend:  {}", board.backend().as_str());
        println!("Location: {}", board.location());
        println!("User:     {}", identity.as_deref().unwrap_or("(none)"));
        println!("Tasks:    {}", board.tasks().len());
    }
    Ok(())
}

fn handle_run(user: Option<&str>) -> Result<()> {
    let board = open_board(user)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_session(board, BufReader::new(io::stdin()), &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::JsonTaskStore;
    use crate::utils::ManualClock;
    use tempfile::TempDir;

    fn board() -> (TempDir, TaskBoard) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonTaskStore::new(temp_dir.path().join("tasks.json"));
        let clock = ManualClock::new(1_000);
        let mut board = TaskBoard::new(Box::new(store), None, Box::new(clock.clone()));
        board.load().unwrap();
        board.create("A", None).unwrap();
        clock.advance_ms(1);
        board.create("B", None).unwrap();
        (temp_dir, board)
    }

    #[test]
    fn test_resolve_by_position() {
        let (_dir, board) = board();
        assert_eq!(resolve_task(&board, "#2").unwrap(), TaskId::new("1001"));
        assert!(matches!(resolve_task(&board, "#3"), Err(BoardError::NotFound(_))));
        assert!(matches!(resolve_task(&board, "#0"), Err(BoardError::NotFound(_))));
    }

    #[test]
    fn test_resolve_by_id() {
        let (_dir, board) = board();
        assert_eq!(resolve_task(&board, "1000").unwrap(), TaskId::new("1000"));
        assert!(matches!(resolve_task(&board, "999"), Err(BoardError::NotFound(_))));
        assert!(matches!(resolve_task(&board, " "), Err(BoardError::Validation(_))));
    }

    #[test]
    fn test_cli_parses_global_user() {
        let cli = Cli::try_parse_from(["tasktime", "list", "--user", "alice", "--json"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert!(matches!(cli.command, Commands::List { json: true }));
    }

    #[test]
    fn test_cli_add_joins_title_words() {
        let cli = Cli::try_parse_from(["tasktime", "add", "Read", "a", "book", "--background", "x.png"]).unwrap();
        match cli.command {
            Commands::Add { background, title } => {
                assert_eq!(title.join(" "), "Read a book");
                assert_eq!(background.as_deref(), Some("x.png"));
            }
            _ => panic!("expected add"),
        }
    }
}
