//! Discovery of local clones laid out as `<root>/<owner>/<repo>`

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

/// Lists clones below a profile root
#[async_trait]
pub trait RepoScanner: Send + Sync {
    /// `owner/repo` entries, sorted
    async fn scan_local_repos(&self, root: &Path) -> Result<Vec<String>>;
}

/// Scans the `<root>/<owner>/<repo>` layout produced by profile-scoped clones
#[derive(Debug, Clone, Default)]
pub struct FsScanner;

impl FsScanner {
    pub fn new() -> Self {
        Self
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Names of the non-hidden subdirectories of `dir`
async fn visible_dirs(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            names.push(name);
        }
    }

    Ok(names)
}

#[async_trait]
impl RepoScanner for FsScanner {
    async fn scan_local_repos(&self, root: &Path) -> Result<Vec<String>> {
        let owners = visible_dirs(root)
            .await
            .with_context(|| format!("Failed to read root directory: {}", root.display()))?;

        let mut repos = Vec::new();
        for owner in owners {
            match visible_dirs(&root.join(&owner)).await {
                Ok(names) => repos.extend(names.into_iter().map(|repo| format!("{}/{}", owner, repo))),
                Err(e) => warn!("Skipping unreadable owner directory {}: {}", owner, e),
            }
        }

        repos.sort();
        debug!("Found {} local repositories under {}", repos.len(), root.display());
        Ok(repos)
    }
}
