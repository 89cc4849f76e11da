use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const PRE_COMMIT_HOOK: &str = r#"#!/bin/sh
# Branches containing 'ignore-ai-reviewer' skip the AI review.
if git rev-parse --abbrev-ref HEAD | grep -q 'ignore-ai-reviewer'; then
    exit 0
fi

ai-review review

if [ $? -ne 0 ]; then
    echo "Code review failed. Please fix the issues before committing."
    exit 1
fi

exit 0
"#;

/// Writes an executable pre-commit hook into `<repo_root>/.git/hooks`,
/// replacing any existing one.
pub fn install_pre_commit_hook(repo_root: &Path) -> Result<PathBuf> {
    let hooks_dir = repo_root.join(".git").join("hooks");
    fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("Failed to create {}", hooks_dir.display()))?;

    let hook_path = hooks_dir.join("pre-commit");
    fs::write(&hook_path, PRE_COMMIT_HOOK)
        .with_context(|| format!("Failed to write {}", hook_path.display()))?;
    make_executable(&hook_path)?;

    Ok(hook_path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
