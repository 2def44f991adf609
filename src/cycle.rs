//! The night cycle: sample → enumerate → (generate → publish) per file.
//!
//! Per-file problems are recorded in the [`RunSummary`] and never abort the
//! batch. Only conditions that would make every later call fail end the run
//! early: an unresolvable repository, a failed enumeration, or rejected
//! credentials at any stage.

use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::completion::CompletionService;
use crate::config::Config;
use crate::errors::{CompletionError, CycleError, HostingError};
use crate::enumerate::enumerate_sources;
use crate::github::{HostingService, PullRequest};
use crate::improve::{GenerateError, ImprovementGenerator, NoImprovement};
use crate::publish::{ChangePublisher, Clock, SystemClock};
use crate::rate_limit::RateLimiter;
use crate::style::{StyleProfile, sample_style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sampling,
    Enumerating,
    Generating,
    Publishing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Sampling => write!(f, "sampling"),
            Stage::Enumerating => write!(f, "enumerating"),
            Stage::Generating => write!(f, "generating"),
            Stage::Publishing => write!(f, "publishing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoImprovement(NoImprovement),
    DryRun,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoImprovement(reason) => write!(f, "{reason}"),
            SkipReason::DryRun => write!(f, "dry run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Published { pr: PullRequest },
    Skipped { reason: SkipReason },
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: String,
    pub outcome: FileOutcome,
}

/// Structured account of one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub repository: String,
    pub style: Option<StyleProfile>,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Published { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Knobs for one run, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub extension: String,
    pub max_commits: usize,
    pub dry_run: bool,
    pub local_root: Option<PathBuf>,
}

impl CycleOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extension: config.extension.clone(),
            max_commits: config.max_commits,
            dry_run: config.dry_run,
            local_root: config.local_root.clone(),
        }
    }
}

pub struct NightCycle<'a> {
    hosting: &'a dyn HostingService,
    completion: &'a dyn CompletionService,
    limiter: &'a dyn RateLimiter,
    options: CycleOptions,
    clock: Box<dyn Clock>,
}

fn unauthorized(stage: Stage, message: impl std::fmt::Display) -> CycleError {
    CycleError::Unauthorized {
        stage: stage.to_string(),
        message: message.to_string(),
    }
}

impl<'a> NightCycle<'a> {
    pub fn new(
        hosting: &'a dyn HostingService,
        completion: &'a dyn CompletionService,
        limiter: &'a dyn RateLimiter,
        options: CycleOptions,
    ) -> Self {
        Self {
            hosting,
            completion,
            limiter,
            options,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run(self) -> Result<RunSummary, CycleError> {
        let repo = match self.hosting.repository().await {
            Ok(repo) => repo,
            Err(e) if e.is_unauthorized() => return Err(unauthorized(Stage::Enumerating, e)),
            Err(e) => return Err(CycleError::Repository(e)),
        };
        info!(repository = %repo.full_name(), default_branch = %repo.default_branch, "starting night cycle");
        let mut summary = RunSummary {
            repository: repo.full_name(),
            ..Default::default()
        };

        // Sampling
        match sample_style(self.hosting, self.options.max_commits, &self.options.extension).await {
            Ok(profile) => {
                info!(profile = %profile.summary(), "sampled coding style");
                summary.style = Some(profile);
            }
            Err(e) if e.is_unauthorized() => return Err(unauthorized(Stage::Sampling, e)),
            Err(e) => warn!(error = %e, "style sampling failed, continuing without profile"),
        }

        // Enumerating
        let files = match enumerate_sources(self.hosting, &self.options.extension).await {
            Ok(files) => files,
            Err(e) if e.is_unauthorized() => return Err(unauthorized(Stage::Enumerating, e)),
            Err(e) => return Err(CycleError::Enumeration(e)),
        };
        info!(count = files.len(), extension = %self.options.extension, "found candidate files");

        let generator =
            ImprovementGenerator::new(self.hosting, self.completion, &repo.default_branch)
                .with_local_root(self.options.local_root.clone());
        let mut publisher = ChangePublisher::with_clock(self.hosting, &repo, self.clock);

        for path in files {
            self.limiter.acquire().await;
            info!(%path, "processing file");

            // Generating
            let improvement = match generator.generate(&path).await {
                Ok(Ok(improvement)) => improvement,
                Ok(Err(reason)) => {
                    summary.files.push(FileReport {
                        path,
                        outcome: FileOutcome::Skipped {
                            reason: SkipReason::NoImprovement(reason),
                        },
                    });
                    continue;
                }
                Err(GenerateError::Hosting(e)) if e.is_unauthorized() => {
                    log_abort(&summary);
                    return Err(unauthorized(Stage::Generating, e));
                }
                Err(GenerateError::Completion(e @ CompletionError::Unauthorized { .. })) => {
                    log_abort(&summary);
                    return Err(unauthorized(Stage::Generating, e));
                }
                Err(e) => {
                    error!(%path, error = %e, "generation failed");
                    summary.files.push(FileReport {
                        path,
                        outcome: FileOutcome::Failed {
                            stage: Stage::Generating,
                            error: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            if self.options.dry_run {
                info!(%path, chars = improvement.content.len(), "dry run, not publishing");
                summary.files.push(FileReport {
                    path,
                    outcome: FileOutcome::Skipped {
                        reason: SkipReason::DryRun,
                    },
                });
                continue;
            }

            // Publishing
            let outcome = match publisher.publish(&path, improvement).await {
                Ok(pr) => FileOutcome::Published { pr },
                Err(e @ HostingError::Unauthorized { .. }) => {
                    log_abort(&summary);
                    return Err(unauthorized(Stage::Publishing, e));
                }
                Err(e) => {
                    error!(%path, error = %e, "publishing failed");
                    FileOutcome::Failed {
                        stage: Stage::Publishing,
                        error: e.to_string(),
                    }
                }
            };
            summary.files.push(FileReport { path, outcome });
        }

        info!(
            published = summary.published(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "night cycle complete"
        );
        Ok(summary)
    }
}

fn log_abort(summary: &RunSummary) {
    error!(
        processed = summary.files.len(),
        published = summary.published(),
        "aborting night cycle"
    );
}
