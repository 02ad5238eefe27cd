//! Assembles the context document from static texts, the directory tree and
//! the selected file contents.

use crate::app::config::Workspace;
use crate::app::error::{ContextError, Result, Warning};
use crate::app::filter::PathFilter;
use crate::app::formatter::OutputGenerator;
use crate::app::models::{Configuration, ContextDocument, Defaults, SectionKind, Selections, TreeNode};
use crate::app::scanner::{build_tree, Scanner};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Everything a run needs besides the configuration and selections.
#[derive(Debug, Clone, Copy)]
pub struct RunInputs<'a> {
    pub repo_root: &'a Path,
    pub workspace: &'a Workspace,
    pub defaults: &'a Defaults,
    /// Stamped into the header when present.
    pub generated_on: Option<&'a str>,
}

pub struct Aggregator<'a> {
    inputs: RunInputs<'a>,
    config: &'a Configuration,
    selections: &'a Selections,
    source_root: PathBuf,
    filter: PathFilter,
}

enum ContentEntry {
    File(String),
    Missing(String),
}

impl<'a> Aggregator<'a> {
    pub fn new(
        inputs: RunInputs<'a>,
        config: &'a Configuration,
        selections: &'a Selections,
    ) -> Result<Self> {
        let source_root = config.source_root(inputs.repo_root);
        if !source_root.is_dir() {
            return Err(ContextError::SourceMissing(source_root));
        }
        let filter = PathFilter::new(inputs.defaults, config, selections)?;

        Ok(Self {
            inputs,
            config,
            selections,
            source_root,
            filter,
        })
    }

    /// Runs the whole pipeline. Output depends only on the file system,
    /// the configuration, the selections and the optional date.
    pub fn generate(
        inputs: RunInputs<'a>,
        config: &'a Configuration,
        selections: &'a Selections,
    ) -> Result<ContextDocument> {
        Self::new(inputs, config, selections)?.build()
    }

    pub fn build(&self) -> Result<ContextDocument> {
        let mut doc = ContextDocument::default();
        let defaults = self.inputs.defaults;

        let scan = Scanner::new(self.source_root.clone(), self.filter.clone()).scan();
        doc.warnings.extend(scan.warnings);

        doc.push(
            SectionKind::Header,
            "Repository Context",
            OutputGenerator::header(self.inputs.generated_on),
        );

        self.push_static(&mut doc, SectionKind::Overview, defaults.overview_file, "Overview");
        self.push_static(
            &mut doc,
            SectionKind::ImportantInfo,
            defaults.important_info_file,
            "Important Information",
        );

        let visible = scan
            .entries
            .iter()
            .filter(|e| self.filter.shows_in_tree(&e.relative_path, e.is_dir));
        let tree = build_tree(visible);
        doc.push(
            SectionKind::DirectoryTree,
            "Directory Tree with Exclusions",
            OutputGenerator::render_tree(&tree),
        );
        log::info!("Directory tree generated");

        let full_tree = build_tree(&scan.entries);
        let files = self.important_files_body(&full_tree, &mut doc);
        doc.push(SectionKind::ImportantFiles, "Important Files", files);

        for section in &self.config.custom_sections {
            self.push_static(&mut doc, SectionKind::Custom, &section.file, &section.section_title);
        }

        self.push_static(&mut doc, SectionKind::TodoList, defaults.todo_file, "To-Do List");

        for path in self.inputs.workspace.global_files() {
            let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
            match fs::read(&path) {
                Ok(bytes) => {
                    doc.push(SectionKind::Global, name, String::from_utf8_lossy(&bytes));
                    log::info!("Appended global file {:?}", path);
                }
                Err(e) => doc.warn(Warning::FileSystemAccess(format!("{}: {}", path.display(), e))),
            }
        }

        Ok(doc)
    }

    fn push_static(&self, doc: &mut ContextDocument, kind: SectionKind, file: &str, title: &str) {
        let path = self.inputs.workspace.static_file(file);
        let body = match fs::read(&path) {
            Ok(bytes) => {
                log::info!("Included static section: {}", title);
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                doc.warn(Warning::MissingInputFile(path.display().to_string()));
                String::new()
            }
            Err(e) => {
                doc.warn(Warning::FileSystemAccess(format!("{}: {}", path.display(), e)));
                format!("*Error reading {}: {}*", file, e)
            }
        };
        doc.push(kind, title, body);
    }

    fn important_files_body(&self, full_tree: &TreeNode, doc: &mut ContextDocument) -> String {
        let mut body = String::new();
        for entry in self.content_entries(full_tree, doc) {
            match entry {
                ContentEntry::File(rel) => body.push_str(&self.file_content(&rel, doc)),
                ContentEntry::Missing(rel) => body.push_str(&OutputGenerator::missing_file(&rel)),
            }
        }
        body
    }

    /// Important files in configured order, then picker inclusions. Directory
    /// entries expand to the files beneath them in tree order.
    fn content_entries(&self, full_tree: &TreeNode, doc: &mut ContextDocument) -> Vec<ContentEntry> {
        let tree_files = full_tree.file_paths();
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        let requested = self
            .config
            .important_files
            .iter()
            .chain(self.selections.include_prompt.iter());

        for raw in requested {
            let Some(rel) = normalize_relative(raw) else {
                doc.warn(Warning::OutsideSource(raw.clone()));
                if seen.insert(raw.clone()) {
                    out.push(ContentEntry::Missing(raw.clone()));
                }
                continue;
            };

            if self.filter.is_excluded_path(&rel) {
                log::debug!("{} lies under an excluded directory, skipping", rel);
                continue;
            }
            if self.filter.is_prompt_excluded(&rel) {
                log::debug!("{} excluded from prompt", rel);
                continue;
            }

            if self.crosses_symlink(&rel) {
                doc.warn(Warning::SkippedSymlink(rel.clone()));
                if seen.insert(rel.clone()) {
                    out.push(ContentEntry::Missing(rel));
                }
                continue;
            }

            let abs = self.source_root.join(&rel);
            if abs.is_dir() {
                let prefix = format!("{}/", rel);
                for file in tree_files.iter().filter(|f| f.starts_with(&prefix)) {
                    if self.filter.allows_file_type(file)
                        && !self.filter.is_prompt_excluded(file)
                        && seen.insert(file.clone())
                    {
                        out.push(ContentEntry::File(file.clone()));
                    }
                }
            } else if !seen.insert(rel.clone()) {
                continue;
            } else if abs.is_file() && !raw.ends_with('/') {
                out.push(ContentEntry::File(rel));
            } else {
                doc.warn(Warning::MissingInputFile(rel.clone()));
                out.push(ContentEntry::Missing(rel));
            }
        }

        out
    }

    /// True if any component below the source root is a symlink.
    fn crosses_symlink(&self, rel: &str) -> bool {
        let mut current = self.source_root.clone();
        for part in rel.split('/') {
            current.push(part);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        false
    }

    fn file_content(&self, rel: &str, doc: &mut ContextDocument) -> String {
        let path = self.source_root.join(rel);
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let language = (self.inputs.defaults.languages)(&ext);

        let body = match fs::read(&path) {
            Ok(bytes) => {
                if self.inputs.defaults.binary_extensions.contains(&ext.as_str()) || looks_binary(&bytes) {
                    doc.warn(Warning::BinaryFile(rel.to_string()));
                    OutputGenerator::binary_placeholder(&ext)
                } else {
                    String::from_utf8_lossy(&bytes).into_owned()
                }
            }
            Err(e) => {
                doc.warn(Warning::FileSystemAccess(format!("{}: {}", path.display(), e)));
                format!("*Error reading file: {}*", e)
            }
        };

        log::info!("Included content from {}", rel);
        OutputGenerator::file_block(rel, language, &body)
    }
}

/// Forward-slash relative path, or `None` if it is absolute or climbs out of the root.
fn normalize_relative(raw: &str) -> Option<String> {
    let cleaned = raw.trim().replace('\\', "/");
    let path = Path::new(&cleaned);
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::CustomSection;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        repo: PathBuf,
        workspace: Workspace,
        defaults: Defaults,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let repo = tmp.path().join("repo");
            fs::create_dir_all(&repo).unwrap();
            let workspace = Workspace::new(tmp.path().join("workspace"));
            workspace.ensure().unwrap();
            Self {
                _tmp: tmp,
                repo,
                workspace,
                defaults: Defaults::default(),
            }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.repo.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn write_static(&self, name: &str, content: &str) {
            fs::write(self.workspace.static_file(name), content).unwrap();
        }

        fn run(&self, config: &Configuration, selections: &Selections) -> ContextDocument {
            let inputs = RunInputs {
                repo_root: &self.repo,
                workspace: &self.workspace,
                defaults: &self.defaults,
                generated_on: None,
            };
            Aggregator::generate(inputs, config, selections).unwrap()
        }
    }

    fn important(files: &[&str]) -> Configuration {
        Configuration {
            important_files: files.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn excluded_dependencies_never_reach_the_output() {
        let fx = Fixture::new();
        fx.write("main.py", "print(1)");
        fx.write("node_modules/x.js", "module.exports = 1;");
        let config = Configuration {
            exclude_dirs: vec!["node_modules".to_string()],
            important_files: vec!["main.py".to_string(), "node_modules/x.js".to_string()],
            ..Default::default()
        };

        let output = fx.run(&config, &Selections::default()).render();

        assert!(!output.contains("node_modules"));
        assert!(output.contains("```\n.\n    ├── main.py\n```"));
        assert_eq!(output.matches("## main.py\n").count(), 1);
        assert!(output.contains("## main.py\n```python\nprint(1)\n```"));
    }

    #[test]
    fn consecutive_runs_are_byte_identical() {
        let fx = Fixture::new();
        fx.write("src/app.py", "import os\n");
        fx.write("src/util/helpers.py", "def f(): pass\n");
        fx.write("README.md", "# Demo\n");
        fx.write("data.bin", "\0\0");
        fx.write_static("overview.txt", "An app.");
        let config = important(&["README.md", "src/app.py", "gone.py"]);

        let first = fx.run(&config, &Selections::default()).render();
        let second = fx.run(&config, &Selections::default()).render();
        assert_eq!(first, second);
    }

    #[test]
    fn sections_follow_the_fixed_order() {
        let fx = Fixture::new();
        fx.write("main.py", "print(1)");
        fx.write_static("overview.txt", "OVERVIEW-TEXT");
        fx.write_static("important_info.txt", "INFO-TEXT");
        fx.write_static("to-do_list.txt", "TODO-TEXT");
        fx.write_static("api.txt", "CUSTOM-TEXT");
        fs::write(fx.workspace.global_dir().join("rules.xml"), "<rules>GLOBAL-TEXT</rules>").unwrap();
        let config = Configuration {
            important_files: vec!["main.py".to_string()],
            custom_sections: vec![CustomSection {
                file: "api.txt".to_string(),
                section_title: "API Notes".to_string(),
            }],
            ..Default::default()
        };

        let output = fx.run(&config, &Selections::default()).render();
        let markers = [
            "# Repository Context",
            "## Overview",
            "OVERVIEW-TEXT",
            "## Important Information",
            "INFO-TEXT",
            "## Directory Tree with Exclusions",
            "## Important Files",
            "print(1)",
            "## API Notes",
            "CUSTOM-TEXT",
            "## To-Do List",
            "TODO-TEXT",
            "<rules>GLOBAL-TEXT</rules>",
        ];
        let positions: Vec<usize> = markers
            .iter()
            .map(|m| output.find(m).unwrap_or_else(|| panic!("missing {m}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{output}");
        assert!(output.ends_with("<rules>GLOBAL-TEXT</rules>\n"));
    }

    #[test]
    fn removing_an_important_file_only_changes_its_block() {
        let fx = Fixture::new();
        fx.write("a.py", "A = 1");
        fx.write("b.py", "B = 2");
        fx.write_static("to-do_list.txt", "later");
        let config = important(&["a.py", "b.py"]);

        let before = fx.run(&config, &Selections::default());
        fs::remove_file(fx.repo.join("a.py")).unwrap();
        let after = fx.run(&config, &Selections::default());

        let kinds = |doc: &ContextDocument| doc.sections.iter().map(|s| s.kind).collect::<Vec<_>>();
        assert_eq!(kinds(&before), kinds(&after));

        let files = after
            .sections
            .iter()
            .find(|s| s.kind == SectionKind::ImportantFiles)
            .unwrap();
        assert!(files.body.starts_with("*File `a.py` not found, skipping...*\n\n## b.py\n"));
        assert!(after.warnings.contains(&Warning::MissingInputFile("a.py".to_string())));
    }

    #[test]
    fn paths_outside_the_source_root_are_treated_as_missing() {
        let fx = Fixture::new();
        fx.write("main.py", "print(1)");
        fs::write(fx.repo.parent().unwrap().join("secret.txt"), "s3cr3t").unwrap();
        let config = important(&["../secret.txt", "/etc/hostname"]);

        let doc = fx.run(&config, &Selections::default());
        let output = doc.render();

        assert!(!output.contains("s3cr3t"));
        assert!(output.contains("*File `../secret.txt` not found, skipping...*"));
        assert!(output.contains("*File `/etc/hostname` not found, skipping...*"));
        assert!(doc.warnings.contains(&Warning::OutsideSource("../secret.txt".to_string())));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_important_files_are_not_followed() {
        let fx = Fixture::new();
        let outside = fx.repo.parent().unwrap();
        fs::write(outside.join("secret.txt"), "s3cr3t").unwrap();
        std::os::unix::fs::symlink("../secret.txt", fx.repo.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(outside, fx.repo.join("up")).unwrap();
        let config = important(&["link.txt", "up/secret.txt", "up/"]);

        let doc = fx.run(&config, &Selections::default());
        let output = doc.render();

        assert!(!output.contains("s3cr3t"));
        assert!(output.contains("*File `link.txt` not found, skipping...*"));
        assert!(output.contains("*File `up/secret.txt` not found, skipping...*"));
        assert!(output.contains("*File `up` not found, skipping...*"));
        assert!(doc.warnings.contains(&Warning::SkippedSymlink("link.txt".to_string())));
        assert!(doc.warnings.contains(&Warning::SkippedSymlink("up/secret.txt".to_string())));
    }

    #[test]
    fn missing_directory_entries_get_a_placeholder() {
        let fx = Fixture::new();
        fx.write("lib.py", "x = 1");
        let config = important(&["lib/", "lib.py/"]);

        let doc = fx.run(&config, &Selections::default());
        let output = doc.render();

        assert!(output.contains("*File `lib` not found, skipping...*"));
        assert!(output.contains("*File `lib.py` not found, skipping...*"));
        assert!(doc.warnings.contains(&Warning::MissingInputFile("lib".to_string())));
        assert!(!output.contains("x = 1"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_important_file_gets_an_error_block() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        fx.write("locked.py", "hidden = True");
        fx.write("main.py", "print(1)");
        fx.write_static("to-do_list.txt", "- unlock");
        let locked = fx.repo.join("locked.py");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            // Permission bits do not apply to root
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
            return;
        }

        let doc = fx.run(&important(&["locked.py", "main.py"]), &Selections::default());
        let output = doc.render();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(output.contains("## locked.py\n```python\n*Error reading file: "));
        assert!(!output.contains("hidden = True"));
        assert!(output.contains("## main.py\n```python\nprint(1)\n```"));
        assert!(output.ends_with("## To-Do List\n\n- unlock\n\n"));
        assert!(doc
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::FileSystemAccess(msg) if msg.contains("locked.py"))));
    }

    #[test]
    fn language_tags_come_from_the_defaults() {
        let mut fx = Fixture::new();
        fx.defaults.languages = |_| Some("text");
        fx.write("main.py", "print(1)");

        let output = fx.run(&important(&["main.py"]), &Selections::default()).render();
        assert!(output.contains("## main.py\n```text\nprint(1)\n```"));
    }

    #[test]
    fn binary_and_unknown_files_use_fallbacks() {
        let fx = Fixture::new();
        fx.write("logo.png", "not really a png");
        fx.write("blob.dat", "ab\0cd");
        fx.write("Makefile", "all:\n\techo hi");
        let config = important(&["logo.png", "blob.dat", "Makefile"]);

        let output = fx.run(&config, &Selections::default()).render();

        assert!(output.contains("## logo.png\n```\n*Binary file (.png) cannot be displayed.*\n```"));
        assert!(output.contains("## blob.dat\n```\n*Binary file (.dat) cannot be displayed.*\n```"));
        assert!(output.contains("## Makefile\n```\nall:\n\techo hi\n```"));
    }

    #[test]
    fn picker_selections_expand_directories_and_honor_exclusions() {
        let fx = Fixture::new();
        fx.write("main.py", "print(1)");
        fx.write("lib/a.py", "a");
        fx.write("lib/b.py", "b");
        fx.write("lib/notes.md", "notes");
        fx.write("lib/sub/c.py", "c");
        let config = Configuration {
            important_files: vec!["main.py".to_string()],
            file_type_inclusions: vec!["py".to_string()],
            ..Default::default()
        };
        let selections = Selections {
            include_prompt: vec!["lib/".to_string(), "main.py".to_string()],
            exclude_prompt: vec!["lib/b.py".to_string()],
            ..Default::default()
        };

        let doc = fx.run(&config, &selections);
        let files = doc
            .sections
            .iter()
            .find(|s| s.kind == SectionKind::ImportantFiles)
            .unwrap();
        let headers: Vec<&str> = files.body.lines().filter(|l| l.starts_with("## ")).collect();

        assert_eq!(headers, vec!["## main.py", "## lib/sub/c.py", "## lib/a.py"]);
    }

    #[test]
    fn tree_selections_shape_the_listing() {
        let fx = Fixture::new();
        fx.write("main.py", "print(1)");
        fx.write("docs/guide.md", "guide");
        fx.write("README.md", "readme");
        let config = Configuration {
            file_type_inclusions: vec!["py".to_string()],
            ..Default::default()
        };
        let selections = Selections {
            include_tree: vec!["README.md".to_string()],
            exclude_tree: vec!["docs/".to_string()],
            ..Default::default()
        };

        let doc = fx.run(&config, &selections);
        let tree = doc
            .sections
            .iter()
            .find(|s| s.kind == SectionKind::DirectoryTree)
            .unwrap();

        assert_eq!(tree.body, ".\n    ├── README.md\n    ├── main.py");
    }

    #[test]
    fn missing_static_files_leave_empty_sections() {
        let fx = Fixture::new();
        let doc = fx.run(&Configuration::default(), &Selections::default());
        let output = doc.render();

        assert!(output.starts_with("# Repository Context\n\n## Overview\n\n## Important Information\n\n"));
        assert!(output.ends_with("## Important Files\n\n## To-Do List\n\n"));
        assert_eq!(
            doc.warnings
                .iter()
                .filter(|w| matches!(w, Warning::MissingInputFile(_)))
                .count(),
            3
        );
    }

    #[test]
    fn generation_date_is_stamped_when_given() {
        let fx = Fixture::new();
        let inputs = RunInputs {
            repo_root: &fx.repo,
            workspace: &fx.workspace,
            defaults: &fx.defaults,
            generated_on: Some("2024-05-01"),
        };
        let doc = Aggregator::generate(inputs, &Configuration::default(), &Selections::default()).unwrap();
        assert!(doc.render().starts_with("# Repository Context\n\nGenerated on: 2024-05-01\n\n"));
    }

    #[test]
    fn missing_source_directory_aborts_the_run() {
        let fx = Fixture::new();
        let config = Configuration {
            source_directory: Some("src".to_string()),
            ..Default::default()
        };
        let inputs = RunInputs {
            repo_root: &fx.repo,
            workspace: &fx.workspace,
            defaults: &fx.defaults,
            generated_on: None,
        };
        let err = Aggregator::generate(inputs, &config, &Selections::default()).unwrap_err();
        assert!(matches!(err, ContextError::SourceMissing(_)));
    }

    #[test]
    fn normalize_relative_rejects_escapes() {
        assert_eq!(normalize_relative("./src\\main.py").as_deref(), Some("src/main.py"));
        assert_eq!(normalize_relative("lib/"), Some("lib".to_string()));
        assert_eq!(normalize_relative("../x"), None);
        assert_eq!(normalize_relative("/abs"), None);
        assert_eq!(normalize_relative(""), None);
    }
}
