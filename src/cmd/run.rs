//! Full night cycle: `night-cycle run`.

use anyhow::{Context, Result};
use night_cycle::cycle::{CycleOptions, FileOutcome, NightCycle, RunSummary};
use night_cycle::{GitHubClient, MinIntervalGate, OpenAiClient};
use tracing::error;

use crate::Cli;

pub async fn cmd_run(cli: &Cli, dry_run: bool) -> Result<()> {
    let mut config = super::load_config(cli)?;
    config.dry_run |= dry_run;

    let hosting = GitHubClient::from_config(&config).context("Failed to build GitHub client")?;
    let completion = OpenAiClient::from_config(&config);
    let gate = MinIntervalGate::new(config.delay);

    let result = NightCycle::new(
        &hosting,
        &completion,
        &gate,
        CycleOptions::from_config(&config),
    )
    .run()
    .await;

    // Only configuration problems exit non-zero; an aborted cycle still ends cleanly.
    match result {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            error!(error = %e, "Night cycle aborted");
            println!(
                "{} {}",
                console::style("Night cycle aborted:").bold().red(),
                e
            );
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} {}",
        console::style("Night cycle:").bold().cyan(),
        summary.repository
    );
    if summary.files.is_empty() {
        println!("  No candidate files found.");
    }
    for report in &summary.files {
        match &report.outcome {
            FileOutcome::Published { pr } => println!(
                "  {} {} → #{} {}",
                console::style("✓").green(),
                report.path,
                pr.number,
                console::style(&pr.html_url).dim()
            ),
            FileOutcome::Skipped { reason } => println!(
                "  {} {} {}",
                console::style("-").yellow(),
                report.path,
                console::style(format!("({reason})")).dim()
            ),
            FileOutcome::Failed { stage, error } => println!(
                "  {} {} failed while {}: {}",
                console::style("✗").red(),
                report.path,
                stage,
                error
            ),
        }
    }
    println!();
    println!(
        "{} published, {} skipped, {} failed",
        summary.published(),
        summary.skipped(),
        summary.failed()
    );
}
