//! Subcommand implementations. Every command prints JSON on stdout.

pub mod autopilot;
pub mod config;
pub mod conflict;
pub mod event;
pub mod learning;
pub mod prayer;

use oryxa_autopilot::{AutopilotConfig, AutopilotDb};
use serde::Serialize;
use std::path::PathBuf;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Global options shared by all subcommands.
pub struct Context {
    pub db_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub owner: String,
}

impl Context {
    pub fn open_db(&self) -> Result<AutopilotDb, Box<dyn std::error::Error>> {
        let db = match &self.db_path {
            Some(path) => AutopilotDb::open_at(path)?,
            None => AutopilotDb::open()?,
        };
        Ok(db)
    }

    /// Config from `--config` (created with defaults if missing), or the
    /// default location falling back to defaults.
    pub fn load_config(&self) -> Result<AutopilotConfig, Box<dyn std::error::Error>> {
        match &self.config_path {
            Some(path) => Ok(AutopilotConfig::load_from(path)?),
            None => Ok(AutopilotConfig::load_or_default()),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
