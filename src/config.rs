//! Configuration from `~/.tasktime/rc`
//!
//! The file holds `key=value` lines:
//!
//! ```text
//! # where tasks live
//! data.backend=sqlite
//! data.location=shared/tasks.db
//! user=alice
//! ```
//!
//! Relative locations resolve against the directory holding the rc file.
//! `TASKTIME_USER` overrides `user`, and `--user` overrides both.

use crate::models::Identity;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_DIR_NAME: &str = ".tasktime";
pub const USER_ENV: &str = "TASKTIME_USER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Local,
    Sqlite,
}

impl BackendKind {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            BackendKind::Local => "tasks.json",
            BackendKind::Sqlite => "tasks.db",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "json" => Ok(BackendKind::Local),
            "sqlite" | "shared" => Ok(BackendKind::Sqlite),
            other => Err(anyhow!(
                "Invalid data.backend '{}'. Expected 'local' or 'sqlite'.",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendKind,
    pub location: PathBuf,
    pub user: Option<String>,
}

impl Config {
    /// Directory holding the rc file and default data files
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(CONFIG_DIR_NAME))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("rc"))
    }

    /// Read the rc file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let base_dir = Self::config_dir()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
            Self::parse(&content, &base_dir)
                .with_context(|| format!("Invalid config file: {}", config_path.display()))?
        } else {
            Self::parse("", &base_dir)?
        };

        if let Ok(user) = std::env::var(USER_ENV) {
            if !user.trim().is_empty() {
                config.user = Some(user);
            }
        }

        log::debug!(
            "Config: backend={:?} location={} user={:?}",
            config.backend,
            config.location.display(),
            config.user
        );
        Ok(config)
    }

    /// Parse rc content; `base_dir` anchors relative and default locations
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let mut backend = BackendKind::default();
        let mut location: Option<PathBuf> = None;
        let mut user = None;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("Ignoring rc line {}: expected key=value", lineno + 1);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "data.backend" => backend = value.parse()?,
                "data.location" => {
                    let path = PathBuf::from(value);
                    location = Some(if path.is_relative() {
                        base_dir.join(path)
                    } else {
                        path
                    });
                }
                "user" => {
                    if !value.is_empty() {
                        user = Some(value.to_string());
                    }
                }
                other => log::warn!("Ignoring unknown rc key '{}'", other),
            }
        }

        let location = location.unwrap_or_else(|| base_dir.join(backend.default_file_name()));
        Ok(Config { backend, location, user })
    }

    /// Identity for this invocation: the CLI flag wins over configuration
    pub fn identity(&self, cli_user: Option<&str>) -> Option<Identity> {
        cli_user
            .and_then(Identity::new)
            .or_else(|| self.user.as_deref().and_then(Identity::new))
    }
}
