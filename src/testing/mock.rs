use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::completion::CompletionService;
use crate::errors::{CompletionError, HostingError};
use crate::github::{
    CommitFile, CommitRecord, FileCandidate, FileContent, FileUpdate, HostingService, PullRequest,
    PullRequestDraft, RepositoryHandle,
};

/// Record of a hosting call: method name plus its key argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub method: String,
    pub target: String,
}

impl MockCall {
    fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
        }
    }
}

/// Failure injected into a `MockHosting` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    Unauthorized,
    Conflict,
    RateLimited,
    ServerError,
}

impl MockFailure {
    fn into_error(self, target: &str) -> HostingError {
        match self {
            MockFailure::NotFound => HostingError::NotFound(target.to_string()),
            MockFailure::Unauthorized => HostingError::Unauthorized { status: 401 },
            MockFailure::Conflict => HostingError::Conflict {
                resource: target.to_string(),
                message: "injected conflict".into(),
            },
            MockFailure::RateLimited => HostingError::RateLimited,
            MockFailure::ServerError => HostingError::Api {
                status: 500,
                message: "injected failure".into(),
            },
        }
    }
}

#[derive(Default)]
struct HostingState {
    /// branch -> (path -> (text, sha))
    branches: BTreeMap<String, BTreeMap<String, (String, String)>>,
    listing_overrides: HashMap<String, Vec<FileCandidate>>,
    commits: Vec<CommitRecord>,
    pulls: Vec<(PullRequestDraft, PullRequest)>,
    failures: HashMap<(String, String), MockFailure>,
    calls: Vec<MockCall>,
    revision: u64,
}

/// In-memory hosting service. Files live on the default branch until a
/// branch is created, which snapshots its parent.
pub struct MockHosting {
    owner: String,
    name: String,
    default_branch: String,
    state: Mutex<HostingState>,
}

impl Default for MockHosting {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHosting {
    pub fn new() -> Self {
        let mut state = HostingState::default();
        state.branches.insert("main".to_string(), BTreeMap::new());
        Self {
            owner: "octo".to_string(),
            name: "widgets".to_string(),
            default_branch: "main".to_string(),
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a file on the default branch.
    pub fn with_file(self, path: &str, text: &str) -> Self {
        {
            let mut state = self.lock();
            state.revision += 1;
            let sha = format!("sha-{}", state.revision);
            state
                .branches
                .entry(self.default_branch.clone())
                .or_default()
                .insert(path.to_string(), (text.to_string(), sha));
        }
        self
    }

    /// Add a commit (newest last in call order, served newest first).
    pub fn with_commit(self, sha: &str, files: &[(&str, Option<&str>)]) -> Self {
        self.lock().commits.insert(
            0,
            CommitRecord {
                sha: sha.to_string(),
                files: files
                    .iter()
                    .map(|(name, patch)| CommitFile {
                        filename: name.to_string(),
                        patch: patch.map(str::to_string),
                    })
                    .collect(),
            },
        );
        self
    }

    /// Serve `entries` verbatim for `list_directory(path)`.
    pub fn with_listing(self, path: &str, entries: Vec<FileCandidate>) -> Self {
        self.lock()
            .listing_overrides
            .insert(path.to_string(), entries);
        self
    }

    /// Make `method` fail for `target` (`"*"` matches any target).
    pub fn fail(self, method: &str, target: &str, failure: MockFailure) -> Self {
        self.lock()
            .failures
            .insert((method.to_string(), target.to_string()), failure);
        self
    }

    /// Replace a file's content on the default branch, bumping its sha.
    pub fn touch(&self, path: &str, text: &str) {
        let mut state = self.lock();
        state.revision += 1;
        let sha = format!("sha-{}", state.revision);
        if let Some(files) = state.branches.get_mut(&self.default_branch) {
            files.insert(path.to_string(), (text.to_string(), sha));
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Branches other than the default one, in creation-independent order.
    pub fn created_branches(&self) -> Vec<String> {
        self.lock()
            .branches
            .keys()
            .filter(|b| **b != self.default_branch)
            .cloned()
            .collect()
    }

    pub fn file_on(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .branches
            .get(branch)
            .and_then(|files| files.get(path))
            .map(|(text, _)| text.clone())
    }

    pub fn pull_requests(&self) -> Vec<(PullRequestDraft, PullRequest)> {
        self.lock().pulls.clone()
    }

    fn enter(&self, method: &str, target: &str) -> Result<(), HostingError> {
        let mut state = self.lock();
        state.calls.push(MockCall::new(method, target));
        let failure = state
            .failures
            .get(&(method.to_string(), target.to_string()))
            .or_else(|| state.failures.get(&(method.to_string(), "*".to_string())))
            .copied();
        match failure {
            Some(f) => Err(f.into_error(target)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostingService for MockHosting {
    async fn repository(&self) -> Result<RepositoryHandle, HostingError> {
        self.enter("repository", "")?;
        Ok(RepositoryHandle {
            owner: self.owner.clone(),
            name: self.name.clone(),
            default_branch: self.default_branch.clone(),
        })
    }

    async fn list_commits(&self, limit: usize) -> Result<Vec<CommitRecord>, HostingError> {
        self.enter("list_commits", &limit.to_string())?;
        Ok(self.lock().commits.iter().take(limit).cloned().collect())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<FileCandidate>, HostingError> {
        self.enter("list_directory", path)?;
        let state = self.lock();
        if let Some(entries) = state.listing_overrides.get(path) {
            return Ok(entries.clone());
        }
        let files = state
            .branches
            .get(&self.default_branch)
            .cloned()
            .unwrap_or_default();

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for file_path in files.keys() {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    dirs.insert(format!("{prefix}{dir}"));
                }
                None => entries.push(FileCandidate::file(file_path)),
            }
        }
        if entries.is_empty() && dirs.is_empty() && !path.is_empty() {
            return Err(HostingError::NotFound(path.to_string()));
        }
        entries.extend(dirs.iter().map(|d| FileCandidate::dir(d)));
        Ok(entries)
    }

    async fn get_file(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileContent, HostingError> {
        self.enter("get_file", path)?;
        let state = self.lock();
        let branch = git_ref.unwrap_or(&self.default_branch);
        state
            .branches
            .get(branch)
            .and_then(|files| files.get(path))
            .map(|(text, sha)| FileContent {
                path: path.to_string(),
                sha: sha.clone(),
                text: text.clone(),
            })
            .ok_or_else(|| HostingError::NotFound(path.to_string()))
    }

    async fn resolve_branch(&self, branch: &str) -> Result<String, HostingError> {
        self.enter("resolve_branch", branch)?;
        let state = self.lock();
        if state.branches.contains_key(branch) {
            Ok(format!("tip-{}-{}", branch, state.revision))
        } else {
            Err(HostingError::NotFound(format!("heads/{branch}")))
        }
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), HostingError> {
        self.enter("create_branch", branch)?;
        let mut state = self.lock();
        if state.branches.contains_key(branch) {
            return Err(HostingError::Conflict {
                resource: format!("refs/heads/{branch}"),
                message: "Reference already exists".into(),
            });
        }
        let parent = sha
            .strip_prefix("tip-")
            .and_then(|rest| rest.rsplit_once('-'))
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| self.default_branch.clone());
        let snapshot = state.branches.get(&parent).cloned().unwrap_or_default();
        state.branches.insert(branch.to_string(), snapshot);
        Ok(())
    }

    async fn update_file(&self, update: &FileUpdate<'_>) -> Result<(), HostingError> {
        self.enter("update_file", update.path)?;
        let mut state = self.lock();
        state.revision += 1;
        let new_sha = format!("sha-{}", state.revision);
        let files = state
            .branches
            .get_mut(update.branch)
            .ok_or_else(|| HostingError::NotFound(format!("heads/{}", update.branch)))?;
        match files.get(update.path) {
            Some((_, current)) if current != update.sha => Err(HostingError::Conflict {
                resource: update.path.to_string(),
                message: format!("{} does not match {}", update.sha, current),
            }),
            _ => {
                files.insert(
                    update.path.to_string(),
                    (update.content.to_string(), new_sha),
                );
                Ok(())
            }
        }
    }

    async fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> Result<PullRequest, HostingError> {
        self.enter("create_pull_request", &draft.head)?;
        let mut state = self.lock();
        let number = state.pulls.len() as u64 + 1;
        let pr = PullRequest {
            number,
            html_url: format!(
                "https://github.com/{}/{}/pull/{}",
                self.owner, self.name, number
            ),
        };
        state.pulls.push((draft.clone(), pr.clone()));
        Ok(pr)
    }
}

/// Canned completion behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Text(String),
    /// Several choices, in ranked order.
    Choices(Vec<String>),
    /// Response with zero choices.
    NoChoices,
    Unauthorized,
    ServerError,
}

/// Completion double that matches prompts by substring.
pub struct MockCompletion {
    rules: Vec<(String, MockReply)>,
    fallback: MockReply,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletion {
    /// Unmatched prompts get `NoChoices`.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: MockReply::NoChoices,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` to any prompt containing `needle`. First match wins.
    pub fn when(mut self, needle: &str, reply: MockReply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    pub fn otherwise(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<Vec<String>, CompletionError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.fallback);
        match reply {
            MockReply::Text(text) => Ok(vec![text.clone()]),
            MockReply::Choices(choices) => Ok(choices.clone()),
            MockReply::NoChoices => Err(CompletionError::EmptyResponse),
            MockReply::Unauthorized => Err(CompletionError::Unauthorized { status: 401 }),
            MockReply::ServerError => Err(CompletionError::Api {
                status: 500,
                message: "injected failure".into(),
            }),
        }
    }
}
