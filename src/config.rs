//! Profile configuration file (`~/.config/gh-mrepo/config.toml`)

use anyhow::{Context, Result};
use dirs::home_dir;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::profile::{Profile, ProfileError};

/// Template written by `gh-mrepo init`
pub const TEMPLATE_CONFIG: &str = r#"# gh-mrepo configuration
# Each table is one profile. See: gh mrepo --help

[default]
gh_config_dir = "~/.config/gh"
# root = "~/repos"
# git_config_name = "Your Name"
# git_config_email = "you@example.com"
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no profiles found in config")]
    NoProfiles,

    #[error("config already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("profile {name:?}: {source}")]
    InvalidProfile {
        name: String,
        #[source]
        source: ProfileError,
    },
}

/// One `[name]` table of the configuration file
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProfileEntry {
    /// `gh` configuration directory holding this profile's credentials
    #[serde(default)]
    pub gh_config_dir: String,

    /// Local clone root (`<root>/<owner>/<repo>`)
    pub root: Option<String>,

    pub git_config_name: Option<String>,
    pub git_config_email: Option<String>,
}

/// Anything that can produce the ordered profile list
pub trait ProfileSource {
    fn load(&self) -> Result<Vec<Profile>>;
}

/// Loads profiles from a TOML file
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loader for the default configuration location
    pub fn from_default_path() -> Result<Self> {
        Ok(Self::new(default_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileSource for ConfigLoader {
    fn load(&self) -> Result<Vec<Profile>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config file: {:?}", self.path))?;

        let profiles = parse_profiles(&content)
            .with_context(|| format!("Failed to load config file: {:?}", self.path))?;

        debug!("Loaded {} profiles from {:?}", profiles.len(), self.path);
        Ok(profiles)
    }
}

/// Parse profile tables from TOML text.
///
/// Profiles come back sorted by name, which is the order every command
/// presents them in.
pub fn parse_profiles(content: &str) -> Result<Vec<Profile>> {
    let entries: BTreeMap<String, ProfileEntry> =
        toml::from_str(content).context("Failed to parse config")?;

    if entries.is_empty() {
        return Err(ConfigError::NoProfiles.into());
    }

    entries
        .into_iter()
        .map(|(name, entry)| build_profile(name, entry))
        .collect()
}

fn build_profile(name: String, entry: ProfileEntry) -> Result<Profile> {
    let gh_config_dir = expand_path(&entry.gh_config_dir)?.unwrap_or_default();
    let root = match &entry.root {
        Some(root) => expand_path(root)?,
        None => None,
    };

    let profile = Profile::new(name.clone(), gh_config_dir, root)
        .map_err(|source| ConfigError::InvalidProfile { name, source })?;

    Ok(profile.with_git_identity(entry.git_config_name, entry.git_config_email))
}

/// Expand `~` and environment variables; empty input means "unset"
fn expand_path(raw: &str) -> Result<Option<PathBuf>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path: {}", raw))?;

    Ok(Some(PathBuf::from(expanded.as_ref())))
}

/// `~/.config/gh-mrepo/config.toml`, next to the gh CLI's own configuration
pub fn default_config_path() -> Result<PathBuf> {
    let home = home_dir().context("Failed to get user home directory")?;

    Ok(home.join(".config").join("gh-mrepo").join("config.toml"))
}

/// Write the template configuration, refusing to overwrite an existing file
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()).into());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    std::fs::write(path, TEMPLATE_CONFIG)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Created configuration at: {:?}", path);
    Ok(())
}
