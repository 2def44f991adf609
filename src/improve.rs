//! Improvement generation: file content in, replacement text out.

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::completion::CompletionService;
use crate::errors::{CompletionError, HostingError};
use crate::github::HostingService;

/// Replacement text for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Improvement {
    pub content: String,
}

/// Why no improvement came back for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoImprovement {
    /// Absent locally and remotely.
    Missing,
    /// The completion service answered with nothing usable.
    EmptyCompletion,
    /// The completion service failed (non-authentication).
    CompletionFailed(String),
}

impl std::fmt::Display for NoImprovement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoImprovement::Missing => write!(f, "file not found"),
            NoImprovement::EmptyCompletion => write!(f, "empty completion"),
            NoImprovement::CompletionFailed(msg) => write!(f, "completion failed: {msg}"),
        }
    }
}

/// Errors the generator does not absorb into [`NoImprovement`].
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error(transparent)]
    Completion(CompletionError),

    #[error("Failed to read local copy {path}: {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type GenerateOutcome = Result<Improvement, NoImprovement>;

/// Instruction sent with every file. Asks for code only.
pub fn build_prompt(file_content: &str) -> String {
    format!(
        "Based on this code, suggest improvements while maintaining the same style:\n\n\
         {file_content}\n\n\
         Provide only the improved code without explanations."
    )
}

/// Sources file content (local checkout first, then remote) and asks the
/// completion service for a replacement.
pub struct ImprovementGenerator<'a> {
    hosting: &'a dyn HostingService,
    completion: &'a dyn CompletionService,
    default_branch: &'a str,
    local_root: Option<PathBuf>,
}

impl<'a> ImprovementGenerator<'a> {
    pub fn new(
        hosting: &'a dyn HostingService,
        completion: &'a dyn CompletionService,
        default_branch: &'a str,
    ) -> Self {
        Self {
            hosting,
            completion,
            default_branch,
            local_root: None,
        }
    }

    /// Prefer files under `root` when they exist.
    pub fn with_local_root(mut self, root: Option<PathBuf>) -> Self {
        self.local_root = root;
        self
    }

    /// Current content of `path`, or `None` when it exists nowhere.
    pub async fn read_content(&self, path: &str) -> Result<Option<String>, GenerateError> {
        if let Some(root) = &self.local_root {
            let local = root.join(path);
            if local.is_file() {
                debug!(path = %local.display(), "reading local copy");
                return tokio::fs::read_to_string(&local)
                    .await
                    .map(Some)
                    .map_err(|source| GenerateError::LocalRead {
                        path: local,
                        source,
                    });
            }
        }
        match self.hosting.get_file(path, Some(self.default_branch)).await {
            Ok(file) => Ok(Some(file.text)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// One completion request for `path`. Missing files, empty answers and
    /// completion-service failures become `Ok(Err(NoImprovement))`; hosting
    /// failures and rejected completion credentials are returned as errors.
    pub async fn generate(&self, path: &str) -> Result<GenerateOutcome, GenerateError> {
        let Some(content) = self.read_content(path).await? else {
            warn!(%path, "file not found, skipping");
            return Ok(Err(NoImprovement::Missing));
        };

        let prompt = build_prompt(&content);
        match self.completion.complete(&prompt).await {
            Ok(choices) => match choices.into_iter().next() {
                Some(text) if !text.trim().is_empty() => Ok(Ok(Improvement { content: text })),
                _ => {
                    warn!(%path, "completion returned no text");
                    Ok(Err(NoImprovement::EmptyCompletion))
                }
            },
            Err(CompletionError::EmptyResponse) => {
                warn!(%path, "completion returned no choices");
                Ok(Err(NoImprovement::EmptyCompletion))
            }
            Err(e @ CompletionError::Unauthorized { .. }) => Err(GenerateError::Completion(e)),
            Err(e) => {
                warn!(%path, error = %e, "completion failed");
                Ok(Err(NoImprovement::CompletionFailed(e.to_string())))
            }
        }
    }
}
