use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mrepo::config::{default_config_path, init_config};
use mrepo::render::{render_for_stdout, view_in_pager};
use mrepo::select::MenuSelector;
use mrepo::{App, CommandFailure, ConfigLoader};

#[derive(Parser)]
#[command(name = "gh-mrepo")]
#[command(about = "Run gh repo commands across multiple GitHub credential profiles")]
#[command(version)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to ~/.config/gh-mrepo/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Profile to use instead of asking
    #[arg(long, global = true, env = "GH_MREPO_PROFILE")]
    user: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a template configuration file
    Init,

    /// List remote repositories; with -a/--all, for every profile
    Ls {
        /// Arguments for `gh repo list`, plus -a/--all anywhere
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List local clones under profile roots
    Lls {
        /// Every profile instead of one
        #[arg(short, long)]
        all: bool,

        /// JSON output
        #[arg(short, long)]
        json: bool,
    },

    /// Switch the active gh account to the profile for this directory
    Switch,

    /// Any other `gh repo` subcommand, run as one profile
    #[command(external_subcommand)]
    Repo(Vec<String>),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        // gh already reported its own failure; just pass its exit code on
        if let Some(failure) = e.downcast_ref::<CommandFailure>() {
            debug!("gh exited with {}: {}", failure.code, failure);
            std::process::exit(failure.code);
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout carries command output, so logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    let app = App::new(
        Box::new(ConfigLoader::new(&config_path)),
        Box::new(MenuSelector::new()),
    );
    let user = cli.user.as_deref();

    match cli.command {
        Commands::Init => cmd_init(config_path),
        Commands::Ls { args } => cmd_ls(&app, user, args).await,
        Commands::Lls { all, json } => cmd_lls(&app, user, all, json).await,
        Commands::Switch => cmd_switch(&app).await,
        Commands::Repo(args) => {
            let (flag_user, rest) = extract_user_flag(args);
            app.run(flag_user.as_deref().or(user), &rest).await
        }
    }
}

fn cmd_init(config_path: PathBuf) -> Result<()> {
    init_config(&config_path)?;
    println!("config.toml created: {}", config_path.display());
    Ok(())
}

async fn cmd_ls(app: &App, user: Option<&str>, args: Vec<String>) -> Result<()> {
    let (flag_user, rest, all) = split_ls_args(args);
    let user = flag_user.as_deref().or(user);

    if !all {
        let mut list_args = vec!["list".to_string()];
        list_args.extend(rest);
        return app.run(user, &list_args).await;
    }

    info!("Listing repositories for all profiles");
    let outcomes = app.list_remote(&rest).await?;
    view_in_pager(render_for_stdout(&outcomes).as_bytes())
}

async fn cmd_lls(app: &App, user: Option<&str>, all: bool, json: bool) -> Result<()> {
    let profiles = app.load_profiles()?;
    let selected = if all {
        profiles
    } else {
        vec![app.choose_profile(&profiles, user)?]
    };

    if json {
        let repos = app.collect_local_repos(&selected).await;
        let text = serde_json::to_string_pretty(&repos).context("Failed to encode JSON")?;
        println!("{}", text);
        return Ok(());
    }

    let outcomes = app.list_local_for(&selected).await;
    view_in_pager(render_for_stdout(&outcomes).as_bytes())
}

async fn cmd_switch(app: &App) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let user = app.switch(&cwd).await?;
    info!("Active gh account is now {}", user);
    Ok(())
}

/// `ls` arguments minus `--user <name>` and `-a`/`--all`, which clap leaves
/// among the trailing args
fn split_ls_args(args: Vec<String>) -> (Option<String>, Vec<String>, bool) {
    let (user, args) = extract_user_flag(args);
    let (rest, all) = extract_all_flag(args);
    (user, rest, all)
}

/// Remove `-a` / `--all` from anywhere in `args`
fn extract_all_flag(args: Vec<String>) -> (Vec<String>, bool) {
    let (flags, rest): (Vec<String>, Vec<String>) = args
        .into_iter()
        .partition(|a| a == "--all" || a == "-a");

    (rest, !flags.is_empty())
}

/// Remove `--user <name>` from anywhere in `args`, keeping the last value
fn extract_user_flag(args: Vec<String>) -> (Option<String>, Vec<String>) {
    let mut user = None;
    let mut rest = Vec::new();
    let mut iter = args.into_iter().peekable();

    while let Some(arg) = iter.next() {
        if arg == "--user" && iter.peek().is_some() {
            user = iter.next();
            continue;
        }
        rest.push(arg);
    }

    (user, rest)
}
