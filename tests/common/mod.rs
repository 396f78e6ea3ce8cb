//! Common test utilities and helpers for gh-mrepo tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mrepo::aggregate::IdentityResolver;
use mrepo::config::ProfileSource;
use mrepo::gh::{CommandFailure, RepoRunner};
use mrepo::select::ProfileSelector;
use mrepo::Profile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Temporary config file plus profile roots
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("gh-mrepo").join("config.toml");

        Self {
            temp_dir,
            config_path,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn create_config(&self, content: &str) -> PathBuf {
        std::fs::create_dir_all(self.config_path.parent().unwrap()).expect("Failed to create config dir");
        std::fs::write(&self.config_path, content).expect("Failed to write test config");
        self.config_path.clone()
    }

    /// Create `<root>/<owner>/<repo>` directories below the temp dir
    pub fn create_clones(&self, root: &str, repos: &[&str]) -> PathBuf {
        let root = self.path(root);
        for repo in repos {
            std::fs::create_dir_all(root.join(repo)).expect("Failed to create clone dir");
        }
        root
    }

    /// Write a gh `hosts.yml` for `user` into `<gh_config_dir>`
    pub fn create_hosts(&self, gh_config_dir: &str, user: &str) -> PathBuf {
        let dir = self.path(gh_config_dir);
        std::fs::create_dir_all(&dir).expect("Failed to create gh config dir");
        std::fs::write(dir.join("hosts.yml"), format!("github.com:\n    user: {}\n", user))
            .expect("Failed to write hosts.yml");
        dir
    }
}

pub fn profile(name: &str) -> Profile {
    Profile::new(name, format!("/path/{}", name), None).unwrap()
}

pub fn profile_with_root(name: &str, root: &Path) -> Profile {
    Profile::new(name, format!("/path/{}", name), Some(root.to_path_buf())).unwrap()
}

pub fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

pub struct StaticSource(pub Result<Vec<Profile>, String>);

impl ProfileSource for StaticSource {
    fn load(&self) -> Result<Vec<Profile>> {
        self.0.clone().map_err(|e| anyhow!(e))
    }
}

/// Selector that must never be asked
pub struct NoSelector;

impl ProfileSelector for NoSelector {
    fn select(&self, _profiles: &[Profile]) -> Result<Profile> {
        panic!("selector should not be used")
    }

    fn select_for_switch(&self, _profiles: &[Profile], _active: Option<usize>) -> Result<Profile> {
        panic!("selector should not be used")
    }
}

/// `gh repo` stand-in keyed by profile name
#[derive(Default)]
pub struct FakeRunner {
    pub outputs: HashMap<String, String>,
    pub failures: HashMap<String, CommandFailure>,
    pub captured: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn with_output(mut self, profile: &str, output: &str) -> Self {
        self.outputs.insert(profile.to_string(), output.to_string());
        self
    }

    pub fn with_failure(mut self, profile: &str, code: i32, stderr: &str) -> Self {
        self.failures.insert(
            profile.to_string(),
            CommandFailure {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl RepoRunner for FakeRunner {
    async fn exec_repo(&self, profile: &Profile, args: &[String]) -> Result<()> {
        self.exec_repo_capture(profile, args).await.map(|_| ())
    }

    async fn exec_repo_capture(&self, profile: &Profile, args: &[String]) -> Result<String> {
        self.captured.lock().unwrap().push(args.to_vec());

        if let Some(failure) = self.failures.get(profile.name()) {
            return Err(failure.clone().into());
        }
        Ok(self.outputs.get(profile.name()).cloned().unwrap_or_default())
    }
}

/// Identity stand-in keyed by gh config dir
#[derive(Default)]
pub struct FakeResolver {
    pub users: HashMap<PathBuf, String>,
}

impl FakeResolver {
    pub fn with_user(mut self, gh_config_dir: &str, user: &str) -> Self {
        self.users.insert(PathBuf::from(gh_config_dir), user.to_string());
        self
    }
}

#[async_trait]
impl IdentityResolver for FakeResolver {
    async fn resolve(&self, gh_config_dir: &Path) -> Result<String> {
        self.users
            .get(gh_config_dir)
            .cloned()
            .ok_or_else(|| anyhow!("hosts.yml not found"))
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
