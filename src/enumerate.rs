//! Breadth-first discovery of candidate source files.

use std::collections::{HashSet, VecDeque};
use tracing::debug;

use crate::errors::HostingError;
use crate::github::{EntryKind, FileCandidate, HostingService};

/// Walk the tree from the root and return every file path ending in
/// `extension`, in breadth-first order.
///
/// Each path is visited at most once even if a listing repeats an entry.
pub async fn enumerate_sources(
    hosting: &dyn HostingService,
    extension: &str,
) -> Result<Vec<String>, HostingError> {
    let mut queue: VecDeque<FileCandidate> = hosting.list_directory("").await?.into();
    let mut seen: HashSet<String> = HashSet::new();
    let mut found = Vec::new();

    while let Some(entry) = queue.pop_front() {
        if !seen.insert(entry.path.clone()) {
            continue;
        }
        match entry.kind {
            EntryKind::Dir => {
                let children = hosting.list_directory(&entry.path).await?;
                debug!(dir = %entry.path, children = children.len(), "expanded directory");
                queue.extend(children);
            }
            EntryKind::File if entry.name.ends_with(extension) => found.push(entry.path),
            EntryKind::File => {}
        }
    }

    Ok(found)
}
