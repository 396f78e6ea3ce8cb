//! Running `gh` as a given profile
//!
//! Every invocation gets `GH_CONFIG_DIR` pointed at the profile's credentials.
//! Non-zero exits become [`CommandFailure`] values carrying the exit code and
//! the captured stderr.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, Command as AsyncCommand};
use tracing::{debug, info};

use crate::profile::Profile;
use crate::repo_spec::clone_destination;

/// Markers in `gh` diagnostics that point at missing or expired credentials
const AUTH_MARKERS: [&str; 2] = ["HTTP 401", "authentication"];

/// True when diagnostic text looks like an authentication failure
pub fn is_auth_diagnostic(text: &str) -> bool {
    AUTH_MARKERS.iter().any(|marker| text.contains(marker))
}

/// A `gh` process that exited unsuccessfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub code: i32,
    pub stderr: String,
}

impl CommandFailure {
    fn from_status(status: ExitStatus, stderr: String) -> Self {
        Self {
            // killed by a signal: no code to pass on
            code: status.code().unwrap_or(1),
            stderr,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        is_auth_diagnostic(&self.stderr)
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stderr = self.stderr.trim_end_matches('\n');
        if stderr.is_empty() {
            write!(f, "exit status {}", self.code)
        } else {
            f.write_str(stderr)
        }
    }
}

impl std::error::Error for CommandFailure {}

/// Runs `gh repo ...` on behalf of a profile
#[async_trait]
pub trait RepoRunner: Send + Sync {
    /// Interactive run: the user sees `gh` output as it happens
    async fn exec_repo(&self, profile: &Profile, args: &[String]) -> Result<()>;

    /// Captured run: stdout is returned as text
    async fn exec_repo_capture(&self, profile: &Profile, args: &[String]) -> Result<String>;
}

/// Global `gh` account switching
#[async_trait]
pub trait AccountSwitcher: Send + Sync {
    /// Make `user` the active `gh` account
    async fn switch_to(&self, user: &str) -> Result<()>;

    /// Account reported by `gh auth status --active`, if any
    async fn active_user(&self) -> Option<String>;
}

/// [`RepoRunner`] and [`AccountSwitcher`] backed by the real `gh` binary
#[derive(Debug, Clone)]
pub struct GhExecutor {
    program: String,
}

impl Default for GhExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl GhExecutor {
    pub fn new() -> Self {
        Self {
            program: "gh".to_string(),
        }
    }

    /// Use a different executable in place of `gh`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn repo_command(&self, profile: &Profile, args: &[String]) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.arg("repo")
            .args(args)
            .env("GH_CONFIG_DIR", profile.gh_config_dir());
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> anyhow::Error {
        if e.kind() == ErrorKind::NotFound {
            anyhow!("{} command not found: {}", self.program, e)
        } else {
            anyhow::Error::new(e).context(format!("Failed to execute {}", self.program))
        }
    }
}

/// Arguments for `gh repo`, with the profile's clone destination appended
/// when cloning into a profile that has a root
pub fn repo_args(profile: &Profile, args: &[String]) -> Vec<String> {
    let mut full = args.to_vec();

    if let (Some(root), Some("clone")) = (profile.root(), args.first().map(String::as_str)) {
        if let Some(destination) = clone_destination(root, args) {
            full.push(destination.to_string_lossy().into_owned());
        }
    }

    full
}

const ACTIVE_ACCOUNT_PATTERN: &str = r"account (\S+)";

fn active_account_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ACTIVE_ACCOUNT_PATTERN).expect("active account pattern is valid"))
}

fn parse_active_account(text: &str) -> Option<String> {
    active_account_regex()
        .captures(text)
        .map(|c| c[1].to_string())
}

/// Copy `stderr` to our own stderr as it arrives, keeping a copy in `captured`
async fn tee_stderr(mut stderr: ChildStderr, captured: &mut Vec<u8>) -> std::io::Result<()> {
    let mut console = tokio::io::stderr();
    let mut buf = [0u8; 4096];
    loop {
        let n = stderr.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        console.write_all(&buf[..n]).await.ok();
        captured.extend_from_slice(&buf[..n]);
    }
}

#[async_trait]
impl RepoRunner for GhExecutor {
    async fn exec_repo(&self, profile: &Profile, args: &[String]) -> Result<()> {
        let args = repo_args(profile, args);
        debug!("Running gh repo {:?} as {}", args, profile.name());

        let mut child = self
            .repo_command(profile, &args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut captured = Vec::new();
        let teed = match child.stderr.take() {
            Some(stderr) => tee_stderr(stderr, &mut captured).await,
            None => Ok(()),
        };

        // reap the child even when reading its stderr failed
        let status = child.wait().await.context("Failed to wait for gh")?;
        teed.context("Failed to read gh stderr")?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&captured).into_owned();
            return Err(CommandFailure::from_status(status, stderr).into());
        }
        Ok(())
    }

    async fn exec_repo_capture(&self, profile: &Profile, args: &[String]) -> Result<String> {
        debug!("Capturing gh repo {:?} as {}", args, profile.name());

        let output = self
            .repo_command(profile, args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(CommandFailure::from_status(output.status, stderr).into());
        }

        String::from_utf8(output.stdout).context("gh output is not valid UTF-8")
    }
}

#[async_trait]
impl AccountSwitcher for GhExecutor {
    async fn switch_to(&self, user: &str) -> Result<()> {
        info!("Switching active gh account to {}", user);

        let status = AsyncCommand::new(&self.program)
            .args(["auth", "switch", "--user", user])
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !status.success() {
            return Err(CommandFailure::from_status(status, String::new()).into());
        }
        Ok(())
    }

    async fn active_user(&self) -> Option<String> {
        let output = AsyncCommand::new(&self.program)
            .args(["auth", "status", "--active"])
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        // gh has printed the status to either stream across versions
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        parse_active_account(&text)
    }
}
