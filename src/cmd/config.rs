//! Configuration view and scaffolding: `night-cycle config`.

use anyhow::{Context, Result};
use night_cycle::config::{FileConfig, redact};

use crate::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let path = super::config_path(cli);

    match command {
        None | Some(ConfigCommands::Show) => {
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No config file at {}; using defaults", path.display());
            }
            let config = super::load_config(cli)?;
            println!();
            println!("repository      = {}", config.repo);
            println!("github_token    = {}", redact(&config.github_token));
            println!("openai_key      = {}", redact(&config.openai_key));
            println!("model           = {}", config.model);
            println!("extension       = {}", config.extension);
            println!("commits         = {}", config.max_commits);
            println!("delay_secs      = {}", config.delay.as_secs());
            println!("dry_run         = {}", config.dry_run);
            println!("timeout_secs    = {}", config.request_timeout.as_secs());
            println!("github_api_url  = {}", config.github_api_url);
            println!("openai_base_url = {}", config.openai_base_url);
            match &config.local_root {
                Some(root) => println!("local_root      = {}", root.display()),
                None => println!("local_root      = (remote only)"),
            }
        }
        Some(ConfigCommands::Init { force }) => {
            if path.exists() && !force {
                println!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
                return Ok(());
            }
            std::fs::write(&path, FileConfig::template())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Created {}", path.display());
        }
    }
    Ok(())
}
