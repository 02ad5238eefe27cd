//! Interactive form: pick a repository, adjust selections, generate, save
//! and download.

use crate::app::aggregator::{Aggregator, RunInputs};
use crate::app::config::{ConfigStore, Workspace};
use crate::app::filter::PathFilter;
use crate::app::git::clone_repository;
use crate::app::models::{ContextDocument, Defaults, FileEntry, Selections};
use crate::app::scanner::Scanner;
use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect, Select};
use std::fs;
use std::path::{Path, PathBuf};

const ENTER_PATH: &str = "Enter a path...";
const CLONE_REPO: &str = "Clone a repository...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    IncludePrompt,
    ExcludePrompt,
    IncludeTree,
    ExcludeTree,
    AddGlobalFile,
    Generate,
    SaveConfiguration,
    Download,
    Print,
    SwitchRepository,
    Quit,
}

impl Action {
    fn changes_inputs(self) -> bool {
        matches!(
            self,
            Action::IncludePrompt
                | Action::ExcludePrompt
                | Action::IncludeTree
                | Action::ExcludeTree
                | Action::AddGlobalFile
        )
    }
}

const ACTIONS: &[(Action, &str)] = &[
    (Action::IncludePrompt, "Include in prompt"),
    (Action::ExcludePrompt, "Exclude from prompt"),
    (Action::IncludeTree, "Include in directory tree"),
    (Action::ExcludeTree, "Exclude from directory tree"),
    (Action::AddGlobalFile, "Add global file"),
    (Action::Generate, "Generate"),
    (Action::SaveConfiguration, "Save configuration"),
    (Action::Download, "Download"),
    (Action::Print, "Print to terminal"),
    (Action::SwitchRepository, "Switch repository"),
    (Action::Quit, "Quit"),
];

pub struct Session<'a> {
    workspace: &'a Workspace,
    store: &'a ConfigStore,
    defaults: &'a Defaults,
    repo_root: PathBuf,
    selections: Selections,
    last_output: Option<ContextDocument>,
}

pub fn run_interactive(workspace: &Workspace, store: &ConfigStore, defaults: &Defaults) -> Result<()> {
    println!("Repository Context Generator");
    println!("Workspace: {}", workspace.root().display());

    let Some(repo_root) = choose_repository(workspace)? else {
        return Ok(());
    };
    let mut session = Session::new(workspace, store, defaults, repo_root);
    session.run()
}

impl<'a> Session<'a> {
    pub fn new(workspace: &'a Workspace, store: &'a ConfigStore, defaults: &'a Defaults, repo_root: PathBuf) -> Self {
        Self {
            workspace,
            store,
            defaults,
            repo_root,
            selections: Selections::default(),
            last_output: None,
        }
    }

    fn run(&mut self) -> Result<()> {
        loop {
            println!();
            println!("Repository: {}", self.repo_root.display());
            let labels: Vec<&str> = ACTIONS.iter().map(|(_, label)| *label).collect();
            let choice = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Choose an action")
                .default(0)
                .items(&labels)
                .interact()?;
            let action = ACTIONS[choice].0;

            if action == Action::Quit {
                return Ok(());
            }
            // Failures are scoped to the action; the session keeps going.
            if let Err(err) = self.perform(action) {
                log::error!("{:#}", err);
            }
        }
    }

    fn perform(&mut self, action: Action) -> Result<()> {
        if action.changes_inputs() {
            self.last_output = None;
        }
        match action {
            Action::IncludePrompt => {
                self.selections.include_prompt =
                    self.pick("Include in prompt", &self.selections.include_prompt)?;
            }
            Action::ExcludePrompt => {
                self.selections.exclude_prompt =
                    self.pick("Exclude from prompt", &self.selections.exclude_prompt)?;
            }
            Action::IncludeTree => {
                self.selections.include_tree =
                    self.pick("Include in directory tree", &self.selections.include_tree)?;
            }
            Action::ExcludeTree => {
                self.selections.exclude_tree =
                    self.pick("Exclude from directory tree", &self.selections.exclude_tree)?;
            }
            Action::AddGlobalFile => {
                let current = self.workspace.global_files();
                println!("Files in global_files/ are appended to every document:");
                for file in &current {
                    println!("  - {}", file.file_name().unwrap_or_default().to_string_lossy());
                }
                let source: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Path of the file to add")
                    .interact_text()?;
                let added = self.workspace.add_global_file(Path::new(source.trim()))?;
                println!("Global file {} added.", added.display());
            }
            Action::Generate => {
                self.generate()?;
            }
            Action::SaveConfiguration => {
                let selections = self.selections.clone();
                self.store.update(|config| selections.apply_to(config))?;
                println!("Configuration saved to {}.", self.store.path().display());
            }
            Action::Download => {
                let document = self.document()?;
                let target: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Save as")
                    .default(self.defaults.output_file.to_string())
                    .interact_text()?;
                fs::write(target.trim(), document.render()).context(format!("Failed to write {}", target))?;
                println!("Context file written to {}.", target.trim());
            }
            Action::Print => {
                let document = self.document()?;
                println!("{}", document.render());
            }
            Action::SwitchRepository => {
                if let Some(root) = choose_repository(self.workspace)? {
                    self.repo_root = root;
                    self.selections = Selections::default();
                    self.last_output = None;
                }
            }
            Action::Quit => {}
        }
        Ok(())
    }

    fn generate(&mut self) -> Result<&ContextDocument> {
        let config = self.store.load()?;
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let inputs = RunInputs {
            repo_root: &self.repo_root,
            workspace: self.workspace,
            defaults: self.defaults,
            generated_on: Some(date.as_str()),
        };
        let document = Aggregator::generate(inputs, &config, &self.selections)?;

        println!("Context file generated ({} sections).", document.sections.len());
        for warning in &document.warnings {
            println!("  warning: {}", warning);
        }
        Ok(self.last_output.insert(document))
    }

    fn document(&mut self) -> Result<ContextDocument> {
        if self.last_output.is_none() {
            self.generate()?;
        }
        self.last_output.clone().context("No document generated")
    }

    fn pick(&self, prompt: &str, current: &[String]) -> Result<Vec<String>> {
        let candidates = self.candidates()?;
        if candidates.is_empty() {
            println!("No files found in {}.", self.repo_root.display());
            return Ok(current.to_vec());
        }
        let checked = checked_flags(&candidates, current);
        let picked = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} (Space to toggle, Enter to confirm)", prompt))
            .items(&candidates)
            .defaults(&checked)
            .interact()?;
        Ok(picked.into_iter().map(|idx| candidates[idx].clone()).collect())
    }

    /// Paths offered by the pickers, already filtered by the exclusion rules.
    fn candidates(&self) -> Result<Vec<String>> {
        let config = self.store.load()?;
        let filter = PathFilter::new(self.defaults, &config, &Selections::default())?;
        let root = config.source_root(&self.repo_root);
        let scan = Scanner::new(root, filter).scan();
        Ok(candidate_labels(&scan.entries))
    }
}

fn choose_repository(workspace: &Workspace) -> Result<Option<PathBuf>> {
    let repos = workspace.list_repositories()?;
    let mut items: Vec<String> = repos.clone();
    items.push(ENTER_PATH.to_string());
    items.push(CLONE_REPO.to_string());

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose a repository")
        .default(0)
        .items(&items)
        .interact_opt()?;

    let Some(choice) = choice else {
        return Ok(None);
    };

    if let Some(name) = repos.get(choice) {
        return Ok(Some(workspace.repositories_dir().join(name)));
    }

    if items[choice] == ENTER_PATH {
        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Repository path")
            .interact_text()?;
        let root = workspace.resolve_repository(Path::new(path.trim()))?;
        return Ok(Some(root));
    }

    let url: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Repository URL")
        .interact_text()?;
    let name: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Repository name")
        .interact_text()?;
    let root = clone_repository(&workspace.repositories_dir(), url.trim(), name.trim())?;
    println!("Repository cloned successfully.");
    Ok(Some(root))
}

/// Picker labels: relative paths, directories with a trailing `/`.
fn candidate_labels(entries: &[FileEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            if entry.is_dir {
                format!("{}/", entry.relative_path)
            } else {
                entry.relative_path.clone()
            }
        })
        .collect()
}

fn checked_flags(candidates: &[String], current: &[String]) -> Vec<bool> {
    candidates.iter().map(|c| current.contains(c)).collect()
}
