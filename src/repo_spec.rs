//! Repository specification parsing
//!
//! Users hand `gh repo clone` repositories in several shapes. All of them are
//! reduced to a canonical [`RepositoryReference`] so that clones land under
//! `<root>/<owner>/<repo>` regardless of how the repository was named.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoSpecError {
    #[error("repository {0:?} is not in owner/repo form")]
    MissingSegments(String),
}

/// Canonical `owner/repo` form of a repository identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryReference {
    owner: String,
    repo: String,
}

impl RepositoryReference {
    /// Parse a user-supplied repository identifier.
    ///
    /// Accepted forms, checked in order:
    /// 1. absolute URLs (`https://github.com/owner/repo.git`)
    /// 2. scp-like SSH remotes (`git@github.com:owner/repo.git`)
    /// 3. bare paths (`owner/repo`, `owner/repo.git`)
    pub fn parse(spec: &str) -> Result<Self, RepoSpecError> {
        let path = Self::path_component(spec);

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next();
        let repo = segments.next().map(|r| r.strip_suffix(".git").unwrap_or(r));

        match (owner, repo) {
            (Some(owner), Some(repo)) if !repo.is_empty() => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(RepoSpecError::MissingSegments(spec.to_string())),
        }
    }

    fn path_component(spec: &str) -> String {
        if let Ok(url) = Url::parse(spec) {
            if !url.scheme().is_empty() && !url.cannot_be_a_base() {
                return url.path().to_string();
            }
        }

        if !spec.contains("://") {
            if let Some((_, path)) = spec.split_once(':') {
                return path.to_string();
            }
        }

        spec.to_string()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `owner/repo` as a relative path
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.owner).join(&self.repo)
    }
}

impl FromStr for RepositoryReference {
    type Err = RepoSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A token that could name a repository rather than a flag value
fn looks_like_repository(token: &str) -> bool {
    token.contains('/') || token.contains(':')
}

/// Work out where a `clone` should land for a profile rooted at `root`.
///
/// `args` starts with the clone subcommand itself. Flags are skipped, scanning
/// stops at `--`, and the first token containing `/` or `:` is taken as the
/// repository. Flag arity is not tracked: a bare flag value such as `upstream`
/// in `-u upstream` is passed over only because it fails the repository test.
///
/// Returns `None` when there is nothing to override and `gh` should pick the
/// destination itself.
pub fn clone_destination(root: &Path, args: &[String]) -> Option<PathBuf> {
    let candidate = args
        .iter()
        .skip(1)
        .take_while(|arg| arg.as_str() != "--")
        .filter(|arg| !arg.starts_with('-'))
        .find(|arg| looks_like_repository(arg))?;

    match RepositoryReference::parse(candidate) {
        Ok(reference) => {
            let destination = root.join(reference.relative_path());
            debug!("Clone of {} resolved to {}", reference, destination.display());
            Some(destination)
        }
        Err(e) => {
            warn!("Leaving clone destination to gh: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_parse_surface_forms_agree() {
        let expected = RepositoryReference::parse("octocat/init-setup").unwrap();

        for spec in [
            "octocat/init-setup.git",
            "https://github.com/octocat/init-setup.git",
            "https://github.com/octocat/init-setup",
            "git@github.com:octocat/init-setup.git",
            "git@github.com:octocat/init-setup",
            "ssh://git@github.com/octocat/init-setup.git",
        ] {
            assert_eq!(RepositoryReference::parse(spec).unwrap(), expected, "{}", spec);
        }

        assert_eq!(expected.owner(), "octocat");
        assert_eq!(expected.repo(), "init-setup");
        assert_eq!(expected.to_string(), "octocat/init-setup");
    }

    #[test]
    fn test_parse_url_ignores_extra_segments() {
        let reference: RepositoryReference = "https://github.com/octocat/app/tree/main".parse().unwrap();
        assert_eq!(reference.to_string(), "octocat/app");
    }

    #[test]
    fn test_parse_rejects_single_segment() {
        assert_eq!(
            RepositoryReference::parse("git@github.com:lonely").unwrap_err(),
            RepoSpecError::MissingSegments("git@github.com:lonely".to_string())
        );
        assert!(RepositoryReference::parse("owner/.git").is_err());
        assert!(RepositoryReference::parse("https://github.com/").is_err());
    }

    #[test]
    fn test_clone_destination() {
        let root = Path::new("/repos");
        let want = Some(PathBuf::from("/repos/octocat/init-setup"));

        assert_eq!(clone_destination(root, &args(&["clone", "octocat/init-setup"])), want);
        assert_eq!(
            clone_destination(root, &args(&["clone", "https://github.com/octocat/init-setup.git"])),
            want
        );
        assert_eq!(
            clone_destination(root, &args(&["clone", "git@github.com:octocat/init-setup.git"])),
            want
        );
    }

    #[test]
    fn test_clone_destination_skips_flag_values() {
        let root = Path::new("/repos");
        assert_eq!(
            clone_destination(root, &args(&["clone", "-u", "upstream", "octocat/init-setup"])),
            Some(PathBuf::from("/repos/octocat/init-setup"))
        );
    }

    #[test]
    fn test_clone_destination_stops_at_separator() {
        let root = Path::new("/repos");
        assert_eq!(
            clone_destination(root, &args(&["clone", "octocat/init-setup", "--", "--depth", "1"])),
            Some(PathBuf::from("/repos/octocat/init-setup"))
        );
        assert_eq!(
            clone_destination(root, &args(&["clone", "--", "octocat/init-setup"])),
            None
        );
    }

    #[test]
    fn test_clone_destination_no_override() {
        let root = Path::new("/repos");
        assert_eq!(clone_destination(root, &args(&["clone"])), None);
        assert_eq!(clone_destination(root, &args(&["clone", "--depth", "1"])), None);
        assert_eq!(clone_destination(root, &args(&["clone", "host:single"])), None);
    }
}
