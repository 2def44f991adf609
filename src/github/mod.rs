//! Hosting-service client.
//!
//! `HostingService` is the seam every pipeline stage talks to. `GitHubClient`
//! implements it against the GitHub REST API; tests substitute
//! `crate::testing::MockHosting`.

mod types;

pub use types::{
    CommitFile, CommitRecord, EntryKind, FileCandidate, FileContent, FileUpdate, PullRequest,
    PullRequestDraft, RepositoryHandle,
};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, RepoSlug};
use crate::errors::HostingError;
use types::{
    ApiErrorResponse, CommitDetailResponse, CommitSummaryResponse, ContentsResponse,
    CreatePullRequest, CreateRefRequest, PullResponse, RefResponse, RepoResponse,
    UpdateFileRequest, encode_base64_text,
};

/// Largest page the commits endpoint serves.
const MAX_PER_PAGE: usize = 100;

/// Known GitHub token prefixes.
/// See: https://github.blog/2021-04-05-behind-githubs-new-authentication-token-formats/
const GITHUB_TOKEN_PREFIXES: &[&str] = &[
    "ghp_",        // Personal access tokens (classic)
    "github_pat_", // Fine-grained personal access tokens
    "gho_",        // OAuth access tokens
    "ghu_",        // GitHub App user-to-server tokens
    "ghs_",        // GitHub App server-to-server tokens
    "ghr_",        // GitHub App refresh tokens
];

/// Format check only; says nothing about whether the token is active.
pub fn is_valid_github_token(token: &str) -> bool {
    !token.is_empty()
        && GITHUB_TOKEN_PREFIXES
            .iter()
            .any(|prefix| token.starts_with(prefix))
}

/// Remote operations the night cycle consumes from the hosting service.
#[async_trait]
pub trait HostingService: Send + Sync {
    /// Resolve the repository and its default branch.
    async fn repository(&self) -> Result<RepositoryHandle, HostingError>;

    /// Newest-first commits, at most `limit`, each with its changed files.
    async fn list_commits(&self, limit: usize) -> Result<Vec<CommitRecord>, HostingError>;

    /// Entries directly under `path` (`""` is the repository root).
    async fn list_directory(&self, path: &str) -> Result<Vec<FileCandidate>, HostingError>;

    /// File body and version token, optionally pinned to a branch.
    async fn get_file(&self, path: &str, git_ref: Option<&str>)
    -> Result<FileContent, HostingError>;

    /// Tip commit of `branch`.
    async fn resolve_branch(&self, branch: &str) -> Result<String, HostingError>;

    /// Create `refs/heads/<branch>` at `sha`. Fails if the reference exists.
    async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), HostingError>;

    /// Write a file on a branch. Fails with `Conflict` when the token is stale.
    async fn update_file(&self, update: &FileUpdate<'_>) -> Result<(), HostingError>;

    async fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> Result<PullRequest, HostingError>;
}

/// GitHub REST v3 implementation of [`HostingService`].
pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
    repo: RepoSlug,
}

impl GitHubClient {
    pub fn new(
        token: &str,
        api_url: &str,
        repo: RepoSlug,
        timeout: Duration,
    ) -> Result<Self, HostingError> {
        let base = Url::parse(api_url)
            .map_err(|e| HostingError::Decode(format!("invalid API URL '{api_url}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("night-cycle"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HostingError::Decode("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(HostingError::Transport)?;

        Ok(Self { http, base, repo })
    }

    pub fn from_config(config: &Config) -> Result<Self, HostingError> {
        Self::new(
            &config.github_token,
            &config.github_api_url,
            config.repo.clone(),
            config.request_timeout,
        )
    }

    /// `<base>/repos/<owner>/<name>/<segments...>`, each segment percent-encoded.
    fn repo_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()])
                .extend(segments.into_iter().filter(|s| !s.is_empty()));
        }
        url
    }

    fn contents_url(&self, path: &str) -> Url {
        self.repo_url(std::iter::once("contents").chain(path.split('/')))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<T, HostingError> {
        let resp = request.send().await.map_err(HostingError::Transport)?;
        let resp = check_status(resp, resource).await?;
        resp.json::<T>()
            .await
            .map_err(|e| HostingError::Decode(format!("{resource}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        debug!(%method, %url, "hosting API request");
        self.http.request(method, url)
    }
}

/// Map non-success statuses onto the typed error taxonomy.
async fn check_status(
    resp: reqwest::Response,
    resource: &str,
) -> Result<reqwest::Response, HostingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let headers = resp.headers();
    let quota_exhausted =
        headers.get("x-ratelimit-remaining").and_then(|v| v.to_str().ok()) == Some("0");
    // Secondary limits keep quota but send retry-after.
    let throttled = quota_exhausted || headers.contains_key("retry-after");
    let message = resp
        .json::<ApiErrorResponse>()
        .await
        .map(|e| e.message)
        .unwrap_or_default();
    let throttled = throttled || message.to_ascii_lowercase().contains("rate limit");

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => HostingError::RateLimited,
        StatusCode::FORBIDDEN if throttled => HostingError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => HostingError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => HostingError::NotFound(resource.to_string()),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => HostingError::Conflict {
            resource: resource.to_string(),
            message,
        },
        _ => HostingError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl HostingService for GitHubClient {
    async fn repository(&self) -> Result<RepositoryHandle, HostingError> {
        let url = self.repo_url(std::iter::empty());
        let resp: RepoResponse = self
            .send_json(self.request(Method::GET, url), &self.repo.to_string())
            .await?;
        resp.into_handle()
    }

    async fn list_commits(&self, limit: usize) -> Result<Vec<CommitRecord>, HostingError> {
        // GitHub offsets by (page - 1) * per_page, so the page size stays fixed.
        let per_page = limit.min(MAX_PER_PAGE);
        let mut shas = Vec::new();
        let mut page = 1u32;
        while shas.len() < limit {
            let request = self
                .request(Method::GET, self.repo_url(["commits"]))
                .query(&[
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ]);
            let batch: Vec<CommitSummaryResponse> = self.send_json(request, "commits").await?;
            let count = batch.len();
            shas.extend(batch.into_iter().map(|c| c.sha));
            if count < per_page {
                break; // Last page
            }
            page += 1;
        }
        shas.truncate(limit);

        let mut records = Vec::with_capacity(shas.len());
        for sha in shas {
            let request = self.request(Method::GET, self.repo_url(["commits", sha.as_str()]));
            let detail: CommitDetailResponse = self.send_json(request, &sha).await?;
            records.push(CommitRecord::from(detail));
        }
        Ok(records)
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<FileCandidate>, HostingError> {
        let request = self.request(Method::GET, self.contents_url(path));
        let resource = if path.is_empty() { "/" } else { path };
        match self.send_json::<ContentsResponse>(request, resource).await? {
            ContentsResponse::Listing(entries) => Ok(entries
                .into_iter()
                .filter_map(|e| e.into_candidate())
                .collect()),
            ContentsResponse::Single(_) => Err(HostingError::Decode(format!(
                "{resource} is not a directory"
            ))),
        }
    }

    async fn get_file(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileContent, HostingError> {
        let mut request = self.request(Method::GET, self.contents_url(path));
        if let Some(git_ref) = git_ref {
            request = request.query(&[("ref", git_ref)]);
        }
        match self.send_json::<ContentsResponse>(request, path).await? {
            ContentsResponse::Single(entry) => entry.into_file_content(),
            ContentsResponse::Listing(_) => {
                Err(HostingError::Decode(format!("{path} is a directory")))
            }
        }
    }

    async fn resolve_branch(&self, branch: &str) -> Result<String, HostingError> {
        let url = self.repo_url(["git", "ref", "heads"].into_iter().chain(branch.split('/')));
        let resp: RefResponse = self
            .send_json(
                self.request(Method::GET, url),
                &format!("heads/{branch}"),
            )
            .await?;
        Ok(resp.object.sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), HostingError> {
        let body = CreateRefRequest {
            reference: format!("refs/heads/{branch}"),
            sha,
        };
        let request = self
            .request(Method::POST, self.repo_url(["git", "refs"]))
            .json(&body);
        let resp = request.send().await.map_err(HostingError::Transport)?;
        check_status(resp, &body.reference).await?;
        Ok(())
    }

    async fn update_file(&self, update: &FileUpdate<'_>) -> Result<(), HostingError> {
        let body = UpdateFileRequest {
            message: update.message,
            content: encode_base64_text(update.content),
            sha: update.sha,
            branch: update.branch,
        };
        let request = self
            .request(Method::PUT, self.contents_url(update.path))
            .json(&body);
        let resp = request.send().await.map_err(HostingError::Transport)?;
        check_status(resp, update.path).await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> Result<PullRequest, HostingError> {
        let body = CreatePullRequest {
            title: &draft.title,
            head: &draft.head,
            base: &draft.base,
            body: &draft.body,
        };
        let request = self
            .request(Method::POST, self.repo_url(["pulls"]))
            .json(&body);
        let resp: PullResponse = self.send_json(request, "pulls").await?;
        Ok(PullRequest {
            number: resp.number,
            html_url: resp.html_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> GitHubClient {
        GitHubClient::new(
            "ghp_test",
            api_url,
            RepoSlug::parse("octo/widgets").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    // ── is_valid_github_token ────────────────────────────────────────

    #[test]
    fn test_valid_token_prefixes() {
        for token in [
            "ghp_abc",
            "github_pat_abc",
            "gho_abc",
            "ghu_abc",
            "ghs_abc",
            "ghr_abc",
        ] {
            assert!(is_valid_github_token(token), "{token}");
        }
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(!is_valid_github_token(""));
        assert!(!is_valid_github_token("not-a-token"));
        assert!(!is_valid_github_token("GHP_abc123"));
        assert!(!is_valid_github_token(" ghp_abc123"));
    }

    // ── URL construction ─────────────────────────────────────────────

    #[test]
    fn test_root_contents_url_has_no_trailing_segment() {
        let c = client("https://api.github.com");
        assert_eq!(
            c.contents_url("").as_str(),
            "https://api.github.com/repos/octo/widgets/contents"
        );
    }

    #[test]
    fn test_nested_contents_url_keeps_slashes() {
        let c = client("https://api.github.com");
        assert_eq!(
            c.contents_url("pkg/sub/b.py").as_str(),
            "https://api.github.com/repos/octo/widgets/contents/pkg/sub/b.py"
        );
    }

    #[test]
    fn test_contents_url_encodes_spaces() {
        let c = client("http://localhost:8080");
        assert_eq!(
            c.contents_url("my dir/a.py").as_str(),
            "http://localhost:8080/repos/octo/widgets/contents/my%20dir/a.py"
        );
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let c = client("https://ghe.example.com/api/v3");
        assert_eq!(
            c.repo_url(["pulls"]).as_str(),
            "https://ghe.example.com/api/v3/repos/octo/widgets/pulls"
        );
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let result = GitHubClient::new(
            "ghp_test",
            "not a url",
            RepoSlug::parse("octo/widgets").unwrap(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(HostingError::Decode(_))));
    }
}
