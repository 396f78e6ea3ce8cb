//! Interactive profile menu

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use inquire::Select;
use std::fmt;

use crate::profile::Profile;

/// Interactive choice of a single profile
#[cfg_attr(test, mockall::automock)]
pub trait ProfileSelector {
    fn select(&self, profiles: &[Profile]) -> Result<Profile>;

    /// Like [`select`](Self::select), marking the profile at `active` as the
    /// currently active `gh` account
    fn select_for_switch(&self, profiles: &[Profile], active: Option<usize>) -> Result<Profile>;
}

struct MenuOption {
    index: usize,
    label: String,
}

impl fmt::Display for MenuOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Terminal menu built on `inquire`
#[derive(Debug, Clone, Default)]
pub struct MenuSelector;

impl MenuSelector {
    pub fn new() -> Self {
        Self
    }

    fn prompt(&self, title: &str, profiles: &[Profile], active: Option<usize>) -> Result<Profile> {
        let options: Vec<MenuOption> = profiles
            .iter()
            .enumerate()
            .map(|(index, profile)| {
                let mut label = profile.label();
                if active == Some(index) {
                    label.push_str(&format!(" {}", "✓ active".green()));
                }
                MenuOption { index, label }
            })
            .collect();

        let chosen = Select::new(title, options)
            .prompt()
            .context("Profile selection cancelled")?;

        Ok(profiles[chosen.index].clone())
    }
}

impl ProfileSelector for MenuSelector {
    fn select(&self, profiles: &[Profile]) -> Result<Profile> {
        self.prompt("Select profile", profiles, None)
    }

    fn select_for_switch(&self, profiles: &[Profile], active: Option<usize>) -> Result<Profile> {
        self.prompt("Switch account", profiles, active)
    }
}
