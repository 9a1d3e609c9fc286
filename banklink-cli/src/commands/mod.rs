//! CLI command implementations

pub mod connections;
pub mod doctor;
pub mod institutions;
pub mod logs;
pub mod remove;
pub mod setup;
pub mod status;
pub mod token;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use banklink_core::services::{EntryPoint, LoggingService};
use banklink_core::BanklinkContext;

/// Environment variable overriding the data directory
const BANKLINK_DIR_ENV: &str = "BANKLINK_DIR";

/// Data directory from `BANKLINK_DIR`, or `~/.banklink`
pub fn get_banklink_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(BANKLINK_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".banklink"))
        .ok_or_else(|| anyhow!("Could not find home directory; set {}", BANKLINK_DIR_ENV))
}

/// Logging service for CLI operations, if it can be opened
pub fn get_logger() -> Option<LoggingService> {
    let dir = get_banklink_dir().ok()?;
    std::fs::create_dir_all(&dir).ok()?;
    LoggingService::new(&dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

pub fn get_context() -> Result<BanklinkContext> {
    let dir = get_banklink_dir()?;
    BanklinkContext::new(&dir, EntryPoint::Cli).context("Failed to initialize banklink context")
}
