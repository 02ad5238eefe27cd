// Declare modules
pub mod aggregator;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod formatter;
pub mod git;
pub mod languages;
pub mod models;
pub mod scanner;
pub mod session;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;

use self::aggregator::{Aggregator, RunInputs};
use self::cli::{Cli, Command, GenerateArgs};
use self::config::{resolve_config, ConfigStore, Workspace};
use self::models::{Configuration, Defaults, Selections};

/// Initializes components and orchestrates data flow.
pub fn run() -> Result<()> {
    // 1. Parse Args
    let args = Cli::parse();
    init_logging(args.verbose, args.quiet);

    // 2. Locate the workspace
    let root = match args.workspace {
        Some(dir) => dir,
        None => Workspace::default_location()?,
    };
    let workspace = Workspace::new(root);
    workspace.ensure()?;

    let store = ConfigStore::new(workspace.config_path());
    if !store.path().exists() {
        // First run: leave an editable template behind
        store.save(&Configuration::default())?;
        log::info!("Wrote default configuration to {:?}", store.path());
    }
    let defaults = Defaults::default();

    // 3. Dispatch
    match args.command.unwrap_or(Command::Interactive) {
        Command::Interactive => session::run_interactive(&workspace, &store, &defaults),
        Command::Generate(gen) => generate(&workspace, &store, &defaults, gen),
        Command::SaveConfig(overrides) => {
            let saved = store.update(|config| *config = resolve_config(config.clone(), &overrides))?;
            log::info!(
                "Saved {} excluded directories and {} important files",
                saved.exclude_dirs.len(),
                saved.important_files.len()
            );
            Ok(())
        }
        Command::CloneRepo { url, name } => {
            let target = git::clone_repository(&workspace.repositories_dir(), &url, &name)?;
            log::info!("Repository cloned to {:?}", target);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => log::LevelFilter::Warn,
        (false, 0) => log::LevelFilter::Info,
        (false, 1) => log::LevelFilter::Debug,
        (false, _) => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn generate(workspace: &Workspace, store: &ConfigStore, defaults: &Defaults, args: GenerateArgs) -> Result<()> {
    let repo_root = workspace.resolve_repository(&args.repo)?;
    let config = resolve_config(store.load()?, &args.overrides);

    let selections = Selections {
        include_prompt: args.include,
        exclude_prompt: args.exclude,
        include_tree: args.include_in_tree,
        exclude_tree: args.exclude_from_tree,
    };

    let date = args
        .date
        .then(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    let inputs = RunInputs {
        repo_root: &repo_root,
        workspace,
        defaults,
        generated_on: date.as_deref(),
    };

    let document = Aggregator::generate(inputs, &config, &selections)?;
    if !document.warnings.is_empty() {
        log::warn!("Generated with {} warning(s)", document.warnings.len());
    }

    // 4. Write or print
    let output = document.render();
    match args.output {
        Some(path) => {
            fs::write(&path, output).context(format!("Failed to write {:?}", path))?;
            log::info!("Context file created: {:?}", path);
        }
        None => print!("{}", output),
    }

    Ok(())
}
