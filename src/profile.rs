//! Credential profiles and directory-to-profile resolution
//!
//! A [`Profile`] is one GitHub identity: the `gh` config directory that holds
//! its credentials plus an optional local clone root. Profiles are built once
//! from the configuration file and never mutated afterwards.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while constructing or looking up profiles
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile name must not be empty")]
    EmptyName,

    #[error("gh_config_dir must not be empty")]
    EmptyGhConfigDir,

    #[error("profile {0:?} not found")]
    NotFound(String),

    /// Recoverable: callers fall back to interactive selection
    #[error("no profile found for directory {0:?}")]
    NoProfileForDirectory(PathBuf),
}

/// One credential / working-context scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: String,
    gh_config_dir: PathBuf,
    root: Option<PathBuf>,
    git_config_name: Option<String>,
    git_config_email: Option<String>,
}

impl Profile {
    /// Create a profile, rejecting an empty name or credential directory.
    ///
    /// An empty `root` is treated the same as no root at all.
    pub fn new(
        name: impl Into<String>,
        gh_config_dir: impl Into<PathBuf>,
        root: Option<PathBuf>,
    ) -> Result<Self, ProfileError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }

        let gh_config_dir = gh_config_dir.into();
        if gh_config_dir.as_os_str().is_empty() {
            return Err(ProfileError::EmptyGhConfigDir);
        }

        Ok(Self {
            name,
            gh_config_dir,
            root: root.filter(|r| !r.as_os_str().is_empty()),
            git_config_name: None,
            git_config_email: None,
        })
    }

    /// Attach the optional git identity used for display
    pub fn with_git_identity(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.git_config_name = name.filter(|n| !n.is_empty());
        self.git_config_email = email.filter(|e| !e.is_empty());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory handed to `gh` as `GH_CONFIG_DIR`
    pub fn gh_config_dir(&self) -> &Path {
        &self.gh_config_dir
    }

    /// Local clone root, if this profile is locally scoped
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn git_config_name(&self) -> Option<&str> {
        self.git_config_name.as_deref()
    }

    pub fn git_config_email(&self) -> Option<&str> {
        self.git_config_email.as_deref()
    }

    /// Menu label: the name, followed by the root in parentheses when set
    pub fn label(&self) -> String {
        match &self.root {
            Some(root) => format!("{} ({})", self.name, root.display()),
            None => self.name.clone(),
        }
    }

    /// Raw prefix test of `root` against `dir`.
    ///
    /// This compares the encoded path bytes, not path components, so a root of
    /// `/home/user` also matches `/home/username`.
    fn owns_directory(&self, dir: &Path) -> bool {
        self.root.as_ref().is_some_and(|root| {
            dir.as_os_str()
                .as_encoded_bytes()
                .starts_with(root.as_os_str().as_encoded_bytes())
        })
    }
}

/// Find the profile whose root is a prefix of `dir`.
///
/// Profiles are scanned in order and the first match wins, even when a later
/// profile has a longer root. Profiles without a root never match.
pub fn find_by_directory<'a>(profiles: &'a [Profile], dir: &Path) -> Result<&'a Profile, ProfileError> {
    let found = profiles.iter().find(|p| p.owns_directory(dir));

    match found {
        Some(profile) => {
            debug!("Directory {} belongs to profile {}", dir.display(), profile.name);
            Ok(profile)
        }
        None => Err(ProfileError::NoProfileForDirectory(dir.to_path_buf())),
    }
}

/// Find a profile by its exact name
pub fn find_by_name<'a>(profiles: &'a [Profile], name: &str) -> Result<&'a Profile, ProfileError> {
    profiles
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ProfileError::NotFound(name.to_string()))
}
