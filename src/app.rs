//! Command orchestration
//!
//! [`App`] ties the profile source, the interactive selector and the `gh`
//! collaborators together. Single-profile commands pick one profile and run
//! `gh repo` directly; listing commands fan out through the [`Aggregator`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregate::{Aggregator, IdentityResolver, ProfileOperation, ProfileOutcome};
use crate::config::ProfileSource;
use crate::gh::{AccountSwitcher, GhExecutor, RepoRunner};
use crate::hosts::HostsFileResolver;
use crate::profile::{find_by_directory, find_by_name, Profile};
use crate::scanner::{FsScanner, RepoScanner};
use crate::select::ProfileSelector;

/// One local clone, as emitted by `lls --json`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LocalRepo {
    pub profile: String,
    pub owner: String,
    pub repo: String,
}

/// `gh repo list <args>` for a profile
pub struct RemoteListing {
    runner: Arc<dyn RepoRunner>,
    args: Vec<String>,
}

impl RemoteListing {
    pub fn new(runner: Arc<dyn RepoRunner>, args: &[String]) -> Self {
        let mut full = vec!["list".to_string()];
        full.extend_from_slice(args);
        Self { runner, args: full }
    }
}

#[async_trait]
impl ProfileOperation for RemoteListing {
    type Output = String;

    async fn run(&self, profile: &Profile) -> Result<String> {
        self.runner.exec_repo_capture(profile, &self.args).await
    }
}

/// Local clones under a profile's root
pub struct LocalScan {
    scanner: Arc<dyn RepoScanner>,
}

impl LocalScan {
    pub fn new(scanner: Arc<dyn RepoScanner>) -> Self {
        Self { scanner }
    }
}

#[async_trait]
impl ProfileOperation for LocalScan {
    type Output = Vec<String>;

    async fn run(&self, profile: &Profile) -> Result<Vec<String>> {
        match profile.root() {
            Some(root) => self.scanner.scan_local_repos(root).await,
            None => bail!("root not configured"),
        }
    }
}

pub struct App {
    source: Box<dyn ProfileSource>,
    selector: Box<dyn ProfileSelector>,
    runner: Arc<dyn RepoRunner>,
    identity: Arc<dyn IdentityResolver>,
    scanner: Arc<dyn RepoScanner>,
    switcher: Arc<dyn AccountSwitcher>,
}

impl App {
    /// App wired to the real `gh`, `hosts.yml` and filesystem collaborators
    pub fn new(source: Box<dyn ProfileSource>, selector: Box<dyn ProfileSelector>) -> Self {
        let gh = Arc::new(GhExecutor::new());
        Self {
            source,
            selector,
            runner: gh.clone(),
            identity: Arc::new(HostsFileResolver::new()),
            scanner: Arc::new(FsScanner::new()),
            switcher: gh,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn RepoRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn RepoScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_switcher(mut self, switcher: Arc<dyn AccountSwitcher>) -> Self {
        self.switcher = switcher;
        self
    }

    pub fn load_profiles(&self) -> Result<Vec<Profile>> {
        self.source.load()
    }

    /// Pick one profile: by name when given, the only profile when there is
    /// just one, otherwise through the menu
    pub fn choose_profile(&self, profiles: &[Profile], user: Option<&str>) -> Result<Profile> {
        if let Some(name) = user {
            return Ok(find_by_name(profiles, name)?.clone());
        }

        match profiles {
            [only] => Ok(only.clone()),
            _ => self.selector.select(profiles),
        }
    }

    /// `gh repo <args>` for a single profile
    pub async fn run(&self, user: Option<&str>, args: &[String]) -> Result<()> {
        let profiles = self.load_profiles()?;
        let selected = self.choose_profile(&profiles, user)?;

        info!("Running gh repo as profile {}", selected.name());
        self.runner.exec_repo(&selected, args).await
    }

    /// `gh repo list <args>` across every profile
    pub async fn list_remote(&self, args: &[String]) -> Result<Vec<ProfileOutcome<String>>> {
        let profiles = self.load_profiles()?;
        let operation = Arc::new(RemoteListing::new(self.runner.clone(), args));

        Ok(Aggregator::with_identity(self.identity.clone())
            .run(&profiles, operation)
            .await)
    }

    /// Local clones of every configured profile
    pub async fn list_local(&self) -> Result<Vec<ProfileOutcome<Vec<String>>>> {
        let profiles = self.load_profiles()?;
        Ok(self.list_local_for(&profiles).await)
    }

    /// Local clones of the given profiles, with identities resolved
    pub async fn list_local_for(&self, profiles: &[Profile]) -> Vec<ProfileOutcome<Vec<String>>> {
        let operation = Arc::new(LocalScan::new(self.scanner.clone()));

        Aggregator::with_identity(self.identity.clone())
            .run(profiles, operation)
            .await
    }

    /// Flattened local clones; profiles without a root or that fail to scan
    /// contribute nothing
    pub async fn collect_local_repos(&self, profiles: &[Profile]) -> Vec<LocalRepo> {
        let operation = Arc::new(LocalScan::new(self.scanner.clone()));
        let outcomes = Aggregator::new().run(profiles, operation).await;

        outcomes
            .into_iter()
            .filter_map(|outcome| {
                let name = outcome.profile.name().to_string();
                outcome.result.ok().map(|repos| (name, repos))
            })
            .flat_map(|(name, repos)| {
                repos.into_iter().filter_map(move |entry| {
                    let (owner, repo) = entry.split_once('/')?;
                    Some(LocalRepo {
                        profile: name.clone(),
                        owner: owner.to_string(),
                        repo: repo.to_string(),
                    })
                })
            })
            .collect()
    }

    /// Make the account of the profile owning `cwd` the active `gh` account.
    ///
    /// Falls back to the menu when no profile root contains `cwd`.
    pub async fn switch(&self, cwd: &Path) -> Result<String> {
        let profiles = self.load_profiles()?;

        let selected = match find_by_directory(&profiles, cwd) {
            Ok(profile) => profile.clone(),
            Err(e) => {
                debug!("{}; asking instead", e);
                let active = self.active_profile_index(&profiles).await;
                self.selector.select_for_switch(&profiles, active)?
            }
        };

        let user = self.identity.resolve(selected.gh_config_dir()).await?;
        self.switcher.switch_to(&user).await?;
        Ok(user)
    }

    /// Index of the first profile whose account is the active `gh` account
    async fn active_profile_index(&self, profiles: &[Profile]) -> Option<usize> {
        let active = self.switcher.active_user().await?;

        let users = join_all(
            profiles
                .iter()
                .map(|p| self.identity.resolve(p.gh_config_dir())),
        )
        .await;

        users
            .iter()
            .position(|user| matches!(user, Ok(u) if *u == active))
    }
}
