use crate::app::error::Warning;
use crate::app::filter::PathFilter;
use crate::app::models::{FileEntry, TreeNode};
use ignore::WalkBuilder;
use pathdiff::diff_paths;
use std::path::{Path, PathBuf};

pub struct Scanner {
    root: PathBuf,
    filter: PathFilter,
}

/// Everything the walk found, minus excluded names and symlinks.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub entries: Vec<FileEntry>,
    pub warnings: Vec<Warning>,
}

impl Scanner {
    pub fn new(root: PathBuf, filter: PathFilter) -> Self {
        Self { root, filter }
    }

    pub fn scan(&self) -> ScanResult {
        let mut result = ScanResult::default();

        // Name-based decisions only: no gitignore, hidden files are kept.
        let filter = self.filter.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                entry.depth() == 0 || !filter.is_excluded_name(&entry.file_name().to_string_lossy())
            });

        for walked in builder.build() {
            match walked {
                Ok(entry) => {
                    if entry.depth() == 0 {
                        continue;
                    }
                    if entry.path_is_symlink() {
                        let warning = Warning::SkippedSymlink(entry.path().display().to_string());
                        log::warn!("{}", warning);
                        result.warnings.push(warning);
                        continue;
                    }
                    if let Some(processed) = self.process_entry(entry.path()) {
                        result.entries.push(processed);
                    }
                }
                Err(err) => {
                    log::warn!("Error walking entry: {}", err);
                    result.warnings.push(Warning::FileSystemAccess(err.to_string()));
                }
            }
        }

        result.entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        result
    }

    fn process_entry(&self, path: &Path) -> Option<FileEntry> {
        let relative = diff_paths(path, &self.root)?;
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if relative_path.is_empty() || self.filter.is_excluded_path(&relative_path) {
            return None;
        }

        Some(FileEntry {
            relative_path,
            is_dir: path.is_dir(),
        })
    }
}

/// Builds the tree for the given entries.
///
/// Every directory lists its subdirectories first and then its files, each
/// group sorted by byte-wise name, so identical input renders identically.
pub fn build_tree<'a, I>(entries: I) -> TreeNode
where
    I: IntoIterator<Item = &'a FileEntry>,
{
    fn insert(node: &mut TreeNode, parts: &[&str], is_dir: bool) {
        let Some((name, rest)) = parts.split_first() else {
            return;
        };
        let child_is_dir = is_dir || !rest.is_empty();
        let idx = match node.children.iter().position(|c| c.name == *name) {
            Some(idx) => idx,
            None => {
                node.children.push(if child_is_dir {
                    TreeNode::directory(*name)
                } else {
                    TreeNode::file(*name)
                });
                node.children.len() - 1
            }
        };
        insert(&mut node.children[idx], rest, is_dir);
    }

    fn sort(node: &mut TreeNode) {
        node.children
            .sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        node.children.iter_mut().for_each(sort);
    }

    let mut root = TreeNode::directory(".");
    for entry in entries {
        let parts: Vec<&str> = entry.relative_path.split('/').collect();
        insert(&mut root, &parts, entry.is_dir);
    }
    sort(&mut root);
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{Configuration, Defaults, NodeKind, Selections};
    use std::fs;
    use tempfile::TempDir;

    fn scanner(root: &Path, config: &Configuration) -> Scanner {
        let filter = PathFilter::new(&Defaults::default(), config, &Selections::default()).unwrap();
        Scanner::new(root.to_path_buf(), filter)
    }

    #[test]
    fn scan_prunes_excluded_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/x.js"), "x").unwrap();
        fs::create_dir_all(root.join("cache")).unwrap();
        fs::write(root.join("cache/blob"), "x").unwrap();
        fs::write(root.join("main.py"), "print(1)").unwrap();
        fs::write(root.join(".env"), "A=1").unwrap();

        let config = Configuration {
            exclude_dirs: vec!["cache".to_string()],
            ..Default::default()
        };
        let scan = scanner(root, &config).scan();
        let paths: Vec<&str> = scan.entries.iter().map(|e| e.relative_path.as_str()).collect();

        assert_eq!(paths, vec![".env", "main.py"]);
        assert!(scan.warnings.is_empty());
    }

    #[test]
    fn tree_lists_directories_before_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b_dir/inner")).unwrap();
        fs::write(root.join("b_dir/z.txt"), "").unwrap();
        fs::create_dir_all(root.join("a_dir")).unwrap();
        fs::write(root.join("a.txt"), "").unwrap();
        fs::write(root.join("c.txt"), "").unwrap();

        let scan = scanner(root, &Configuration::default()).scan();
        let tree = build_tree(&scan.entries);
        let names: Vec<(&str, NodeKind)> = tree
            .children
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect();

        assert_eq!(
            names,
            vec![
                ("a_dir", NodeKind::Directory),
                ("b_dir", NodeKind::Directory),
                ("a.txt", NodeKind::File),
                ("c.txt", NodeKind::File),
            ]
        );
        assert_eq!(tree.children[1].children[0].name, "inner");
        assert_eq!(tree.file_paths(), vec!["b_dir/z.txt", "a.txt", "c.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped_with_a_warning() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

        let scan = scanner(root, &Configuration::default()).scan();
        let paths: Vec<&str> = scan.entries.iter().map(|e| e.relative_path.as_str()).collect();

        assert_eq!(paths, vec!["real.txt"]);
        assert!(matches!(scan.warnings.as_slice(), [Warning::SkippedSymlink(_)]));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directories_are_reported_and_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("locked")).unwrap();
        fs::write(root.join("locked/inner.txt"), "x").unwrap();
        fs::write(root.join("open.txt"), "y").unwrap();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(root.join("locked")).is_ok() {
            // Permission bits do not apply to root
            fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let scan = scanner(root, &Configuration::default()).scan();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();
        let paths: Vec<&str> = scan.entries.iter().map(|e| e.relative_path.as_str()).collect();

        assert!(paths.contains(&"open.txt"));
        assert!(!paths.contains(&"locked/inner.txt"));
        assert!(scan
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::FileSystemAccess(_))));
    }
}
