//! Read-only stages on their own: `night-cycle scan` and `night-cycle style`.

use anyhow::{Context, Result};
use night_cycle::GitHubClient;
use night_cycle::enumerate::enumerate_sources;
use night_cycle::style::sample_style;

use crate::Cli;

pub async fn cmd_scan(cli: &Cli) -> Result<()> {
    let config = super::load_config(cli)?;
    let hosting = GitHubClient::from_config(&config).context("Failed to build GitHub client")?;

    let files = enumerate_sources(&hosting, &config.extension)
        .await
        .context("Failed to enumerate repository files")?;

    if files.is_empty() {
        println!("No {} files found in {}", config.extension, config.repo);
        return Ok(());
    }
    for path in &files {
        println!("{path}");
    }
    println!();
    println!(
        "{} {} file(s)",
        console::style("Found").bold(),
        files.len()
    );
    Ok(())
}

pub async fn cmd_style(cli: &Cli, commits: Option<usize>) -> Result<()> {
    let config = super::load_config(cli)?;
    let hosting = GitHubClient::from_config(&config).context("Failed to build GitHub client")?;
    let commits = commits.unwrap_or(config.max_commits);

    let profile = sample_style(&hosting, commits, &config.extension)
        .await
        .context("Failed to sample commit history")?;

    println!(
        "{} {} commit(s) of {}",
        console::style("Sampled").bold().cyan(),
        commits,
        config.repo
    );
    println!("  {}", profile.summary());
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}
