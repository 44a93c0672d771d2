//! tasktime - start/stop timers per task with local or shared storage
//!
//! This library provides the core of tasktime:
//! - A timer engine that keeps at most one task running and credits whole seconds
//! - A task board that applies user intents and persists every credit
//! - Task stores for a local JSON file and a shared per-user SQLite database
//! - Statistics over the collection
//! - The command-line interface and interactive session
//!
//! # Example
//!
//! ```no_run
//! use tasktime::board::TaskBoard;
//! use tasktime::repo::JsonTaskStore;
//! use tasktime::utils::SystemClock;
//!
//! let store = JsonTaskStore::new("tasks.json".into());
//! let mut board = TaskBoard::new(Box::new(store), None, Box::new(SystemClock));
//! board.load().unwrap();
//! let id = board.create("Read", None).unwrap();
//! board.start(&id).unwrap();
//! board.stop(&id).unwrap();
//! ```

pub mod board;
pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod repo;
pub mod stats;
pub mod timer;
pub mod utils;
