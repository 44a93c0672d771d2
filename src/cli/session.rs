//! Interactive timing session
//!
//! `tasktime run` owns the tick loop. A reader thread forwards input lines
//! over a channel; the control loop waits for a line until the next tick is
//! due, so commands and ticks never interleave. The session ends on `quit`
//! or end of input, after which the running task is stopped and saved.

use crate::board::{BoardError, TaskBoard};
use crate::cli::commands::resolve_task;
use crate::cli::error::is_user_error;
use crate::cli::output::{format_statistics, format_task_list_table, get_terminal_width, is_tty};
use crate::stats::Statistics;
use crate::timer::StartOutcome;
use crate::utils::format_hms;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

const HELP: &str = "\
Commands:
  start <id|#N>    start timing a task (stops the running one)
  stop [<id|#N>]   stop the running task
  status           show the running task
  list             list tasks
  stats            show statistics
  add <title>      add a task
  help             show this help
  quit             save and leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start(String),
    Stop(Option<String>),
    Status,
    List,
    Stats,
    Add(String),
    Help,
    Quit,
    Empty,
}

pub fn parse_session_command(line: &str) -> Result<SessionCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "" => Ok(SessionCommand::Empty),
        "start" | "on" => {
            if rest.is_empty() {
                Err("start needs a task id".to_string())
            } else {
                Ok(SessionCommand::Start(rest.to_string()))
            }
        }
        "stop" | "off" => Ok(SessionCommand::Stop((!rest.is_empty()).then(|| rest.to_string()))),
        "status" => Ok(SessionCommand::Status),
        "list" | "ls" => Ok(SessionCommand::List),
        "stats" => Ok(SessionCommand::Stats),
        "add" => Ok(SessionCommand::Add(rest.to_string())),
        "help" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
        other => Err(format!("Unknown command '{}'. Type 'help' for commands.", other)),
    }
}

fn spawn_line_reader<R: BufRead + Send + 'static>(input: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in input.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

enum Flow {
    Continue,
    Quit,
}

/// Run the session until `quit` or end of input
pub fn run_session<R: BufRead + Send + 'static>(mut board: TaskBoard, input: R, out: &mut dyn Write) -> Result<()> {
    let lines = spawn_line_reader(input);
    log::info!("Session started with {} task(s)", board.tasks().len());

    writeln!(out, "Tracking {} task(s). Type 'help' for commands.", board.tasks().len())?;
    prompt(out)?;

    let mut next_tick = Instant::now() + TICK_INTERVAL;
    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        match lines.recv_timeout(timeout) {
            Ok(line) => {
                if let Flow::Quit = handle_line(&mut board, &line, out)? {
                    break;
                }
                prompt(out)?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if Instant::now() >= next_tick {
            if let Err(e) = board.tick() {
                log::warn!("Tick failed: {}", e);
                writeln!(out, "Warning: {}", e)?;
            }
            next_tick = Instant::now() + TICK_INTERVAL;
        }
    }

    match board.unload() {
        Ok(Some(credit)) => {
            let title = board.get(&credit.id).map(|t| t.title.clone()).unwrap_or_default();
            writeln!(out, "Stopped '{}' at {}", title, format_hms(credit.time_spent))?;
        }
        Ok(None) => {}
        Err(e) => writeln!(out, "Warning: {}", e)?,
    }
    log::info!("Session ended");
    Ok(())
}

fn prompt(out: &mut dyn Write) -> Result<()> {
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

fn handle_line(board: &mut TaskBoard, line: &str, out: &mut dyn Write) -> Result<Flow> {
    let command = match parse_session_command(line) {
        Ok(command) => command,
        Err(message) => {
            writeln!(out, "Error: {}", message)?;
            return Ok(Flow::Continue);
        }
    };

    let result = match command {
        SessionCommand::Empty => Ok(()),
        SessionCommand::Help => {
            writeln!(out, "{}", HELP)?;
            Ok(())
        }
        SessionCommand::Quit => return Ok(Flow::Quit),
        SessionCommand::Start(token) => start(board, &token, out),
        SessionCommand::Stop(token) => stop(board, token.as_deref(), out),
        SessionCommand::Status => status(board, out),
        SessionCommand::List => {
            let table = format_task_list_table(board.tasks(), board.now_ms(), get_terminal_width(), is_tty());
            writeln!(out, "{}", table)?;
            Ok(())
        }
        SessionCommand::Stats => {
            let now_secs = board.now_ms().div_euclid(1000);
            let stats = Statistics::compute(board.tasks(), now_secs);
            write!(out, "{}", format_statistics(&stats, get_terminal_width(), is_tty()))?;
            Ok(())
        }
        SessionCommand::Add(title) => add(board, &title, out),
    };

    // Board errors are reported and the session goes on; output errors end it
    if let Err(e) = result {
        let Some(board_err) = e.downcast_ref::<BoardError>() else {
            return Err(e);
        };
        let prefix = if is_user_error(board_err) { "Error" } else { "Internal error" };
        writeln!(out, "{}: {}", prefix, board_err)?;
    }
    Ok(Flow::Continue)
}

fn add(board: &mut TaskBoard, title: &str, out: &mut dyn Write) -> Result<()> {
    let id = board.create(title, None)?;
    writeln!(out, "Created task {}: {}", id, title)?;
    Ok(())
}

fn start(board: &mut TaskBoard, token: &str, out: &mut dyn Write) -> Result<()> {
    let id = resolve_task(board, token)?;
    let outcome = board.start(&id)?;
    let title = board.get(&id).map(|t| t.title.clone()).unwrap_or_default();
    match outcome {
        StartOutcome::AlreadyRunning => {
            writeln!(out, "'{}' is already running", title)?;
        }
        StartOutcome::Started { stopped } => {
            if let Some(credit) = stopped {
                let previous = board.get(&credit.id).map(|t| t.title.clone()).unwrap_or_default();
                writeln!(out, "Stopped '{}' at {}", previous, format_hms(credit.time_spent))?;
            }
            writeln!(out, "Started '{}'", title)?;
        }
    }
    Ok(())
}

fn stop(board: &mut TaskBoard, token: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let id = match token {
        Some(token) => resolve_task(board, token)?,
        None => match board.running() {
            Some(task) => task.id.clone(),
            None => {
                writeln!(out, "Nothing is running")?;
                return Ok(());
            }
        },
    };

    match board.stop(&id)? {
        Some(credit) => {
            let title = board.get(&id).map(|t| t.title.clone()).unwrap_or_default();
            writeln!(out, "Stopped '{}' at {}", title, format_hms(credit.time_spent))?;
        }
        None => {
            writeln!(out, "Task {} is not running", id)?;
        }
    }
    Ok(())
}

fn status(board: &TaskBoard, out: &mut dyn Write) -> Result<()> {
    match board.running() {
        Some(task) => writeln!(
            out,
            "Running: {} '{}' {}",
            task.id,
            task.title,
            format_hms(task.live_time_spent(board.now_ms()))
        )?,
        None => writeln!(out, "Nothing is running")?,
    }
    let pending = board.unsynced().count();
    if pending > 0 {
        writeln!(out, "{} task(s) waiting to be saved", pending)?;
    }
    Ok(())
}
