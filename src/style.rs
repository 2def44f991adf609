//! Style sampling over recent commit diffs.
//!
//! Produces a coarse profile (leading-whitespace widths, declared identifier
//! names) from the patches of recent commits. The cycle computes and logs it
//! but does not feed it into prompts yet.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::errors::HostingError;
use crate::github::HostingService;

pub const DEFAULT_MAX_COMMITS: usize = 50;

static VARIABLE_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:var|let|const)\s+(\w+)").expect("valid regex"));
static FUNCTION_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdef\s+(\w+)").expect("valid regex"));

/// Accumulated style statistics. Purely additive; no normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleProfile {
    /// Leading-whitespace character count of every non-blank patch line.
    pub indentation: Vec<usize>,
    /// Identifiers following declaration keywords, duplicates included.
    pub naming_conventions: Vec<String>,
    /// Placeholder, never populated.
    pub comment_styles: Vec<String>,
    /// Placeholder, never populated.
    pub function_lengths: Vec<usize>,
    /// Placeholder, never populated.
    pub common_patterns: BTreeMap<String, usize>,
}

impl StyleProfile {
    /// Fold one unified-diff patch into the profile.
    pub fn absorb_patch(&mut self, patch: &str) {
        if patch.is_empty() {
            return;
        }
        for line in patch.split('\n') {
            if line.trim().is_empty() {
                continue;
            }
            let stripped = line.trim_start();
            self.indentation
                .push(line.chars().count() - stripped.chars().count());
        }
        self.naming_conventions.extend(
            VARIABLE_DECL
                .captures_iter(patch)
                .map(|c| c[1].to_string()),
        );
        self.naming_conventions.extend(
            FUNCTION_DECL
                .captures_iter(patch)
                .map(|c| c[1].to_string()),
        );
    }

    /// Most frequent indentation width above zero, if any line was indented.
    pub fn dominant_indent(&self) -> Option<usize> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &width in self.indentation.iter().filter(|w| **w > 0) {
            *counts.entry(width).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(width, _)| width)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} indentation samples (dominant: {}), {} identifiers",
            self.indentation.len(),
            self.dominant_indent()
                .map(|w| w.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
            self.naming_conventions.len()
        )
    }
}

/// Sample the newest `max_commits` commits for files ending in `extension`.
pub async fn sample_style(
    hosting: &dyn HostingService,
    max_commits: usize,
    extension: &str,
) -> Result<StyleProfile, HostingError> {
    let mut profile = StyleProfile::default();
    if max_commits == 0 {
        return Ok(profile);
    }
    let commits = hosting.list_commits(max_commits).await?;
    for commit in &commits {
        let mut matched = 0usize;
        for file in commit
            .files
            .iter()
            .filter(|f| f.filename.ends_with(extension))
        {
            if let Some(patch) = file.patch.as_deref() {
                profile.absorb_patch(patch);
                matched += 1;
            }
        }
        debug!(commit = %commit.sha, patches = matched, "sampled commit");
    }
    Ok(profile)
}
