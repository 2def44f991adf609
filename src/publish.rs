//! Change publishing: branch, commit the replacement, open a pull request.
//!
//! The sequence is not transactional. A branch created before a later step
//! fails stays on the remote.

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::errors::HostingError;
use crate::github::{FileUpdate, HostingService, PullRequest, PullRequestDraft, RepositoryHandle};
use crate::improve::Improvement;

pub const BRANCH_PREFIX: &str = "auto_improvement_";

pub const PR_BODY: &str =
    "These improvements were automatically generated based on the repository's coding patterns.";

/// Source of timestamps for branch names.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Replays a fixed sequence of instants; the last one repeats once exhausted.
pub struct ScriptedClock {
    instants: Mutex<Vec<DateTime<Local>>>,
}

impl ScriptedClock {
    pub fn new(mut instants: Vec<DateTime<Local>>) -> Self {
        instants.reverse();
        Self {
            instants: Mutex::new(instants),
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> DateTime<Local> {
        let mut instants = self.instants.lock().unwrap_or_else(|e| e.into_inner());
        if instants.len() > 1 {
            instants.pop().unwrap_or_else(Local::now)
        } else {
            instants.last().copied().unwrap_or_else(Local::now)
        }
    }
}

/// Everything needed to turn one improvement into a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeProposal {
    pub branch: String,
    pub path: String,
    pub content: String,
    pub base_sha: String,
}

pub fn branch_name(at: DateTime<Local>) -> String {
    format!("{BRANCH_PREFIX}{}", at.format("%Y%m%d_%H%M%S"))
}

pub fn pr_title(path: &str) -> String {
    format!("Auto-generated improvements for {path}")
}

pub fn commit_message(path: &str) -> String {
    format!("Auto-improvement for {path}")
}

pub struct ChangePublisher<'a> {
    hosting: &'a dyn HostingService,
    repo: &'a RepositoryHandle,
    clock: Box<dyn Clock>,
    issued: HashSet<String>,
}

impl<'a> ChangePublisher<'a> {
    pub fn new(hosting: &'a dyn HostingService, repo: &'a RepositoryHandle) -> Self {
        Self::with_clock(hosting, repo, Box::new(SystemClock))
    }

    pub fn with_clock(
        hosting: &'a dyn HostingService,
        repo: &'a RepositoryHandle,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            hosting,
            repo,
            clock,
            issued: HashSet::new(),
        }
    }

    /// Timestamped branch name, suffixed `_2`, `_3`, … when this publisher
    /// already issued the same name (two proposals within one second).
    pub fn next_branch_name(&mut self) -> String {
        let base = branch_name(self.clock.now());
        let mut candidate = base.clone();
        let mut n = 2;
        while self.issued.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        self.issued.insert(candidate.clone());
        candidate
    }

    pub async fn publish(
        &mut self,
        path: &str,
        improvement: Improvement,
    ) -> Result<PullRequest, HostingError> {
        let branch = self.next_branch_name();
        let base = self.repo.default_branch.as_str();

        let base_sha = self.hosting.resolve_branch(base).await?;
        let proposal = ChangeProposal {
            branch,
            path: path.to_string(),
            content: improvement.content,
            base_sha,
        };
        debug!(branch = %proposal.branch, base_sha = %proposal.base_sha, "creating branch");
        self.hosting
            .create_branch(&proposal.branch, &proposal.base_sha)
            .await?;

        let current = self.hosting.get_file(path, Some(base)).await?;
        let message = commit_message(path);
        self.hosting
            .update_file(&FileUpdate {
                path,
                message: &message,
                content: &proposal.content,
                sha: &current.sha,
                branch: &proposal.branch,
            })
            .await?;

        let pr = self
            .hosting
            .create_pull_request(&PullRequestDraft {
                head: proposal.branch.clone(),
                base: base.to_string(),
                title: pr_title(path),
                body: PR_BODY.to_string(),
            })
            .await?;
        info!(%path, branch = %proposal.branch, pr = pr.number, "opened pull request");
        Ok(pr)
    }
}
