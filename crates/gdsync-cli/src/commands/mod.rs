//! CLI subcommands

use std::path::PathBuf;

use gdsync_core::config::Config;

use crate::output::OutputFormat;

pub mod auth;
pub mod completions;
pub mod config;
pub mod sync;

/// Global state shared by every subcommand
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Selected output format
    pub format: OutputFormat,
    /// Configuration file in use (may not exist)
    pub config_path: PathBuf,
    /// Configuration loaded from `config_path`, or defaults
    pub config: Config,
}

impl CommandContext {
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}
