use crate::app::config::merge_vecs;
use crate::app::error::Warning;
use crate::app::formatter::OutputGenerator;
use crate::app::languages::language_for_extension;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The persisted configuration document (`config.toml`).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Configuration {
    /// Subdirectory of the selected repository to treat as the source root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_directory: Option<String>,
    pub exclude_dirs: Vec<String>,
    pub important_files: Vec<String>,
    pub file_type_inclusions: Vec<String>,
    pub file_type_exclusions: Vec<String>,
    pub custom_sections: Vec<CustomSection>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CustomSection {
    pub file: String,
    #[serde(default = "default_section_title")]
    pub section_title: String,
}

fn default_section_title() -> String {
    "Custom Section".to_string()
}

impl Configuration {
    pub fn source_root(&self, repo_root: &Path) -> PathBuf {
        match self.source_directory.as_deref() {
            Some(dir) if !dir.trim().is_empty() => repo_root.join(dir.trim()),
            _ => repo_root.to_path_buf(),
        }
    }
}

/// Fixed defaults built once at startup and passed to every run.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Names skipped during traversal regardless of configuration.
    pub excluded_names: &'static [&'static str],
    pub binary_extensions: &'static [&'static str],
    /// Extension to code-fence language; `None` leaves the fence untagged.
    pub languages: fn(&str) -> Option<&'static str>,
    pub overview_file: &'static str,
    pub important_info_file: &'static str,
    pub todo_file: &'static str,
    pub output_file: &'static str,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            excluded_names: &[
                ".git",
                ".hg",
                ".svn",
                "node_modules",
                "__pycache__",
                ".venv",
                "venv",
                "target",
                "dist",
                "build",
                ".tox",
                ".mypy_cache",
                ".pytest_cache",
                ".idea",
                ".vscode",
            ],
            binary_extensions: &[
                "png", "jpg", "jpeg", "gif", "svg", "ico", "db", "exe", "bin", "pdf", "zip",
                "gz", "so", "dll", "dylib", "woff", "woff2", "ttf",
            ],
            languages: language_for_extension,
            overview_file: "overview.txt",
            important_info_file: "important_info.txt",
            todo_file: "to-do_list.txt",
            output_file: "repo-context.txt",
        }
    }
}

/// Picker state accumulated during an interactive session.
///
/// Paths are relative to the source root; directories carry a trailing `/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selections {
    pub include_prompt: Vec<String>,
    pub exclude_prompt: Vec<String>,
    pub include_tree: Vec<String>,
    pub exclude_tree: Vec<String>,
}

impl Selections {
    /// Folds the selections into a configuration before it is saved.
    ///
    /// Prompt inclusions become important files, prompt exclusions are removed
    /// from them, and directories hidden from the tree become excluded names.
    /// Tree inclusions only live for the session.
    pub fn apply_to(&self, config: &mut Configuration) {
        let important = std::mem::take(&mut config.important_files);
        let mut merged = merge_vecs(Some(important), Some(self.include_prompt.clone()));
        merged.retain(|path| !self.exclude_prompt.contains(path));
        config.important_files = merged;

        let hidden_dirs: Vec<String> = self
            .exclude_tree
            .iter()
            .filter_map(|path| path.strip_suffix('/'))
            .filter_map(|dir| dir.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        let exclude = std::mem::take(&mut config.exclude_dirs);
        config.exclude_dirs = merge_vecs(Some(exclude), Some(hidden_dirs));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeKind {
    Directory,
    File,
}

/// One entry of the rendered directory tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            children: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Relative paths of every file below this node, in display order.
    pub fn file_paths(&self) -> Vec<String> {
        fn collect(node: &TreeNode, prefix: &str, out: &mut Vec<String>) {
            for child in &node.children {
                let path = if prefix.is_empty() {
                    child.name.clone()
                } else {
                    format!("{}/{}", prefix, child.name)
                };
                if child.is_dir() {
                    collect(child, &path, out);
                } else {
                    out.push(path);
                }
            }
        }

        let mut out = Vec::new();
        collect(self, "", &mut out);
        out
    }
}

/// A single file or directory discovered during the scan.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Forward-slash path relative to the source root.
    pub relative_path: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Header,
    Overview,
    ImportantInfo,
    DirectoryTree,
    ImportantFiles,
    Custom,
    TodoList,
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub title: String,
    pub body: String,
}

/// The generated artifact: ordered sections plus the warnings raised on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextDocument {
    pub sections: Vec<Section>,
    pub warnings: Vec<Warning>,
}

impl ContextDocument {
    pub fn push(&mut self, kind: SectionKind, title: impl Into<String>, body: impl Into<String>) {
        self.sections.push(Section {
            kind,
            title: title.into(),
            body: body.into(),
        });
    }

    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn render(&self) -> String {
        OutputGenerator::format_document(self)
    }
}
