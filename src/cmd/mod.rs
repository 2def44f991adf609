//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`            |
//! | `scan`   | `Scan`, `Style`  |
//! | `config` | `Config`         |

pub mod config;
pub mod run;
pub mod scan;

pub use config::cmd_config;
pub use run::cmd_run;
pub use scan::{cmd_scan, cmd_style};

use anyhow::{Context, Result};
use night_cycle::config::{CONFIG_FILE_NAME, Config, FileConfig};
use std::path::PathBuf;
use tracing::warn;

use crate::Cli;

pub(crate) fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// File → environment layering. Fails before any remote call when a required
/// variable is absent.
pub(crate) fn load_config(cli: &Cli) -> Result<Config> {
    let path = config_path(cli);
    let file = FileConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let config = Config::from_env(&file)?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }
    Ok(config)
}
