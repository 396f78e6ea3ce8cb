//! Display of aggregated per-profile results
//!
//! Every profile gets a header (name plus resolved account), a separator and
//! then either its failure, its output, or a "No repositories" marker.

use anyhow::{bail, Context, Result};
use crossterm::style::{Color, StyledContent, Stylize};
use std::env;
use std::io::{self, IsTerminal, Write};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::aggregate::{Failure, ProfileOutcome};
use crate::profile::Profile;

const SEPARATOR_WIDTH: usize = 40;
const DEFAULT_PAGER: &str = "less -R";

/// Text form of a per-profile payload
pub trait RenderPayload {
    fn render_text(&self) -> String;
}

impl RenderPayload for String {
    fn render_text(&self) -> String {
        self.clone()
    }
}

impl RenderPayload for Vec<String> {
    fn render_text(&self) -> String {
        self.join("\n")
    }
}

fn auth_hint(profile: &Profile) -> String {
    format!(
        "hint: GH_CONFIG_DIR={} gh auth login",
        profile.gh_config_dir().display()
    )
}

/// ANSI styling, or the bare text when colour is off
#[derive(Debug, Clone, Copy)]
struct Paint {
    color: bool,
}

impl Paint {
    fn apply(self, styled: StyledContent<&str>) -> String {
        if self.color {
            styled.to_string()
        } else {
            styled.content().to_string()
        }
    }
}

fn write_failure<W: Write>(w: &mut W, paint: Paint, profile: &Profile, failure: &Failure) -> io::Result<()> {
    writeln!(w, "{}", paint.apply(failure.message().red()))?;
    if failure.is_auth_error() {
        writeln!(w, "{}", paint.apply(auth_hint(profile).as_str().yellow()))?;
    }
    Ok(())
}

/// Write every outcome, in order, to `w`; `color` selects ANSI styling
pub fn format_results<T, W>(outcomes: &[ProfileOutcome<T>], w: &mut W, color: bool) -> io::Result<()>
where
    T: RenderPayload,
    W: Write,
{
    let paint = Paint { color };
    let separator = "\u{2500}".repeat(SEPARATOR_WIDTH);

    for (i, outcome) in outcomes.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }

        let mut header = outcome.profile.name().to_string();
        if let Some(user) = outcome.identity() {
            header.push_str(&format!(" (@{})", user));
        }
        writeln!(w, "{}", paint.apply(header.as_str().bold().blue()))?;
        writeln!(w, "{}", paint.apply(separator.as_str().with(Color::AnsiValue(240))))?;

        if let Some(failure) = outcome.identity_failure() {
            write_failure(w, paint, &outcome.profile, failure)?;
        }

        match &outcome.result {
            Err(failure) => write_failure(w, paint, &outcome.profile, failure)?,
            Ok(payload) => {
                let text = payload.render_text();
                let text = text.trim_end_matches('\n');
                if text.is_empty() {
                    writeln!(w, "No repositories")?;
                } else {
                    writeln!(w, "{}", text)?;
                }
            }
        }
    }

    Ok(())
}

fn render<T: RenderPayload>(outcomes: &[ProfileOutcome<T>], color: bool) -> String {
    let mut buf = Vec::new();
    // writing into a Vec cannot fail
    let _ = format_results(outcomes, &mut buf, color);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render outcomes as plain text
pub fn render_to_string<T: RenderPayload>(outcomes: &[ProfileOutcome<T>]) -> String {
    render(outcomes, false)
}

/// Render outcomes for stdout, styled only when it is a terminal
pub fn render_for_stdout<T: RenderPayload>(outcomes: &[ProfileOutcome<T>]) -> String {
    render(outcomes, stdout_supports_color())
}

/// Colour is used only on a terminal, and never with `NO_COLOR` set
pub fn stdout_supports_color() -> bool {
    io::stdout().is_terminal() && env::var_os("NO_COLOR").map_or(true, |v| v.is_empty())
}

/// Pager command: `GH_PAGER`, then `PAGER`, then `less -R`
pub fn pager_command() -> String {
    ["GH_PAGER", "PAGER"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_PAGER.to_string())
}

/// Show `content` through the pager, or print it when stdout is not a terminal
pub fn view_in_pager(content: &[u8]) -> Result<()> {
    if !io::stdout().is_terminal() {
        let mut stdout = io::stdout().lock();
        stdout.write_all(content).context("Failed to write output")?;
        return stdout.flush().context("Failed to write output");
    }

    run_pager(&pager_command(), content)
}

/// Pipe `content` into `sh -c <pager>`; a non-zero pager exit is an error
fn run_pager(pager: &str, content: &[u8]) -> Result<()> {
    debug!("Paging output through: {}", pager);

    let mut child = Command::new("sh")
        .args(["-c", pager])
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start pager: {}", pager))?;

    if let Some(mut stdin) = child.stdin.take() {
        // the pager may quit before reading everything
        if let Err(e) = stdin.write_all(content) {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(e).context("Failed to write to pager");
            }
        }
    }

    let status = child.wait().context("Failed to wait for pager")?;
    if !status.success() {
        bail!("pager {:?} exited with {}", pager, status);
    }
    Ok(())
}
