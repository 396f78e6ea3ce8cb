//! gh-mrepo - `gh repo` across multiple GitHub credential profiles
//!
//! Each profile is a separate `gh` configuration directory (and so a separate
//! GitHub identity) with an optional local clone root. Commands either run
//! against one chosen profile or fan out across all of them concurrently.
//!
//! ## Modules
//!
//! - [`profile`]: Profile entity and directory-to-profile resolution
//! - [`repo_spec`]: Repository identifier parsing and clone destinations
//! - [`aggregate`]: Concurrent, order-preserving per-profile fan-out
//! - [`config`]: TOML profile configuration
//! - [`hosts`]: Account lookup from `hosts.yml`
//! - [`gh`]: `gh` process execution
//! - [`scanner`]: Local clone discovery
//! - [`render`]: Result formatting and paging
//! - [`select`]: Interactive profile menu
//! - [`app`]: Command orchestration

pub mod aggregate;
pub mod app;
pub mod config;
pub mod gh;
pub mod hosts;
pub mod profile;
pub mod render;
pub mod repo_spec;
pub mod scanner;
pub mod select;

pub use aggregate::{Aggregator, Failure, IdentityResolver, ProfileOperation, ProfileOutcome};
pub use app::{App, LocalRepo};
pub use config::{ConfigLoader, ProfileSource};
pub use gh::{CommandFailure, GhExecutor};
pub use profile::{Profile, ProfileError};
pub use repo_spec::RepositoryReference;
