//! Account lookup from a `gh` configuration directory
//!
//! `gh` records logged-in accounts per host in `hosts.yml`. The `github.com`
//! entry's `user` is the identity shown next to each profile.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::aggregate::IdentityResolver;

const GITHUB_HOST: &str = "github.com";

#[derive(Debug, Deserialize)]
struct HostEntry {
    #[serde(default)]
    user: String,
}

/// [`IdentityResolver`] reading `<gh_config_dir>/hosts.yml`
#[derive(Debug, Clone, Default)]
pub struct HostsFileResolver;

impl HostsFileResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityResolver for HostsFileResolver {
    async fn resolve(&self, gh_config_dir: &Path) -> Result<String> {
        resolve_github_user(gh_config_dir).await
    }
}

/// User of the `github.com` entry in `hosts.yml`
pub async fn resolve_github_user(gh_config_dir: &Path) -> Result<String> {
    let path = gh_config_dir.join("hosts.yml");
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read hosts.yml: {}", path.display()))?;

    parse_github_user(&content)
}

fn parse_github_user(content: &str) -> Result<String> {
    let hosts: HashMap<String, HostEntry> =
        serde_yaml::from_str(content).context("failed to parse hosts.yml")?;

    let entry = hosts
        .get(GITHUB_HOST)
        .ok_or_else(|| anyhow!("{} entry not found in hosts.yml", GITHUB_HOST))?;

    if entry.user.is_empty() {
        return Err(anyhow!("user is empty for {} in hosts.yml", GITHUB_HOST));
    }

    Ok(entry.user.clone())
}
