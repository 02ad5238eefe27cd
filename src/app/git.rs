use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};
use std::process::Command;

/// Clones `url` into `repos_dir/name` with the system `git`.
pub fn clone_repository(repos_dir: &Path, url: &str, name: &str) -> Result<PathBuf> {
    if url.trim().is_empty() || name.trim().is_empty() {
        bail!("Both a repository URL and a name are required");
    }
    if url.trim_start().starts_with('-') {
        bail!("Repository URL '{}' must not start with '-'", url);
    }
    if !is_plain_name(name) {
        bail!("Repository name '{}' must be a single directory name", name);
    }

    let target = repos_dir.join(name);
    if target.exists() {
        bail!("Repository '{}' already cloned", name);
    }

    std::fs::create_dir_all(repos_dir).context(format!("Failed to create {:?}", repos_dir))?;
    log::info!("Cloning {} into {:?}", url, target);
    let status = Command::new("git")
        .arg("clone")
        .arg("--")
        .arg(url)
        .arg(&target)
        .status()
        .context("Failed to run git")?;

    if !status.success() {
        bail!("git clone exited with {}", status);
    }
    Ok(target)
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
