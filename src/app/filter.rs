use crate::app::error::{ContextError, Result};
use crate::app::models::{Configuration, Defaults, Selections};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;

/// Decides which entries take part in a run.
///
/// Name exclusions are exact matches against the configured `exclude_dirs`
/// plus the default deny-list; they prune whole subtrees and override every
/// other rule.
#[derive(Debug, Clone)]
pub struct PathFilter {
    excluded_names: HashSet<String>,
    type_inclusions: Vec<String>,
    type_exclusions: Vec<String>,
    include_tree: PatternSet,
    exclude_tree: PatternSet,
    exclude_prompt: PatternSet,
}

impl PathFilter {
    pub fn new(defaults: &Defaults, config: &Configuration, selections: &Selections) -> Result<Self> {
        let excluded_names = defaults
            .excluded_names
            .iter()
            .map(|name| name.to_string())
            .chain(config.exclude_dirs.iter().map(|name| name.trim().to_string()))
            .filter(|name| !name.is_empty())
            .collect();

        Ok(Self {
            excluded_names,
            type_inclusions: normalize_extensions(&config.file_type_inclusions),
            type_exclusions: normalize_extensions(&config.file_type_exclusions),
            include_tree: PatternSet::new(&selections.include_tree)?,
            exclude_tree: PatternSet::new(&selections.exclude_tree)?,
            exclude_prompt: PatternSet::new(&selections.exclude_prompt)?,
        })
    }

    pub fn is_excluded_name(&self, name: &str) -> bool {
        self.excluded_names.contains(name)
    }

    /// True if any component of a relative path is an excluded name.
    pub fn is_excluded_path(&self, relative: &str) -> bool {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .any(|part| self.is_excluded_name(part))
    }

    pub fn allows_file_type(&self, relative: &str) -> bool {
        let ext = Path::new(relative)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !self.type_inclusions.is_empty() && !self.type_inclusions.contains(&ext) {
            return false;
        }
        !self.type_exclusions.contains(&ext)
    }

    pub fn shows_in_tree(&self, relative: &str, is_dir: bool) -> bool {
        if self.is_excluded_path(relative) || self.exclude_tree.matches(relative) {
            return false;
        }
        is_dir || self.include_tree.matches(relative) || self.allows_file_type(relative)
    }

    pub fn is_prompt_excluded(&self, relative: &str) -> bool {
        self.exclude_prompt.matches(relative)
    }
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Glob patterns matched against a path and each of its ancestors, so that
/// selecting a directory covers everything beneath it.
#[derive(Debug, Clone)]
struct PatternSet {
    set: GlobSet,
    empty: bool,
}

impl PatternSet {
    fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut empty = true;
        for pat in patterns {
            let pat = pat.trim().trim_end_matches('/');
            if pat.is_empty() {
                continue;
            }
            let glob = Glob::new(pat).map_err(|source| ContextError::InvalidPattern {
                pattern: pat.to_string(),
                source,
            })?;
            builder.add(glob);
            empty = false;
        }
        let set = builder.build().map_err(|source| ContextError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })?;
        Ok(Self { set, empty })
    }

    fn matches(&self, relative: &str) -> bool {
        if self.empty {
            return false;
        }
        let relative = relative.trim_end_matches('/');
        let mut prefix = String::new();
        for part in relative.split('/').filter(|part| !part.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if self.set.is_match(&prefix) {
                return true;
            }
        }
        false
    }
}
