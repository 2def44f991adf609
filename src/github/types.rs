//! Typed records for the hosting API.
//!
//! Wire shapes (`*Response`) mirror the JSON the REST API returns and are
//! converted into domain records right after deserialization, so the rest of
//! the crate never touches loosely-typed payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::errors::HostingError;

/// The hosted repository a run operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
}

impl RepositoryHandle {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: String,
    pub name: String,
    pub kind: EntryKind,
}

impl FileCandidate {
    pub fn file(path: &str) -> Self {
        Self::new(path, EntryKind::File)
    }

    pub fn dir(path: &str) -> Self {
        Self::new(path, EntryKind::Dir)
    }

    fn new(path: &str, kind: EntryKind) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            path: path.to_string(),
            name,
            kind,
        }
    }
}

/// A file's decoded body together with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub sha: String,
    pub text: String,
}

/// A file touched by a commit, with its unified diff when the API supplies one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFile {
    pub filename: String,
    pub patch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub files: Vec<CommitFile>,
}

/// Content update on a branch, guarded by the version token read earlier.
#[derive(Debug, Clone)]
pub struct FileUpdate<'a> {
    pub path: &'a str,
    pub message: &'a str,
    pub content: &'a str,
    pub sha: &'a str,
    pub branch: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

// ── Wire shapes ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct RepoResponse {
    pub full_name: String,
    pub default_branch: String,
}

impl RepoResponse {
    pub(crate) fn into_handle(self) -> Result<RepositoryHandle, HostingError> {
        let (owner, name) = self
            .full_name
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty())
            .ok_or_else(|| {
                HostingError::Decode(format!("unexpected full_name '{}'", self.full_name))
            })?;
        if self.default_branch.is_empty() {
            return Err(HostingError::Decode("empty default_branch".into()));
        }
        Ok(RepositoryHandle {
            owner: owner.to_string(),
            name: name.to_string(),
            default_branch: self.default_branch,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitSummaryResponse {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitFileResponse {
    pub filename: String,
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetailResponse {
    pub sha: String,
    #[serde(default)]
    pub files: Vec<CommitFileResponse>,
}

impl From<CommitDetailResponse> for CommitRecord {
    fn from(detail: CommitDetailResponse) -> Self {
        Self {
            sha: detail.sha,
            files: detail
                .files
                .into_iter()
                .map(|f| CommitFile {
                    filename: f.filename,
                    patch: f.patch,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentEntryResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl ContentEntryResponse {
    /// Directory entries of other types (symlink, submodule) yield `None`.
    pub(crate) fn into_candidate(self) -> Option<FileCandidate> {
        let kind = match self.kind.as_str() {
            "file" => EntryKind::File,
            "dir" => EntryKind::Dir,
            _ => return None,
        };
        Some(FileCandidate {
            path: self.path,
            name: self.name,
            kind,
        })
    }

    pub(crate) fn into_file_content(self) -> Result<FileContent, HostingError> {
        if self.kind != "file" {
            return Err(HostingError::Decode(format!(
                "{} is a {}, not a file",
                self.path, self.kind
            )));
        }
        let sha = self
            .sha
            .ok_or_else(|| HostingError::Decode(format!("{} has no sha", self.path)))?;
        let raw = self.content.unwrap_or_default();
        let text = match self.encoding.as_deref() {
            Some("base64") | None => decode_base64_text(&raw)
                .map_err(|e| HostingError::Decode(format!("{}: {}", self.path, e)))?,
            Some(other) => {
                return Err(HostingError::Decode(format!(
                    "{}: unsupported encoding '{}'",
                    self.path, other
                )));
            }
        };
        Ok(FileContent {
            path: self.path,
            sha,
            text,
        })
    }
}

/// `GET /contents/{path}` returns an array for directories and an object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsResponse {
    Listing(Vec<ContentEntryResponse>),
    Single(Box<ContentEntryResponse>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefObjectResponse {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: RefObjectResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullResponse {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateFileRequest<'a> {
    pub message: &'a str,
    pub content: String,
    pub sha: &'a str,
    pub branch: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePullRequest<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub body: &'a str,
}

/// Decode the API's base64 payload, which is wrapped at 60 columns.
pub(crate) fn decode_base64_text(raw: &str) -> Result<String, String> {
    let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|_| "content is not valid UTF-8".to_string())
}

pub(crate) fn encode_base64_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}
