//! Repository checkout and git history mining.
//!
//! Remote repositories are shallow-cloned into a temp directory owned by the
//! checkout; dropping it removes the clone. Local paths are used in place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use audit_engine::graph::{NodeError, NodeResult};
use audit_engine::state::RepoLocator;

/// One commit from `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub subject: String,
}

/// A working tree available on disk for the lifetime of this value.
#[derive(Debug)]
pub struct RepoCheckout {
    root: PathBuf,
    _clone: Option<TempDir>,
}

impl RepoCheckout {
    /// Clone a remote locator or open a local one.
    pub async fn acquire(locator: &RepoLocator, depth: u32) -> NodeResult<Self> {
        match locator {
            RepoLocator::Local(path) => Self::open(path),
            RepoLocator::Remote(url) => Self::clone_shallow(url, depth).await,
        }
    }

    /// Use an existing directory as-is.
    pub fn open(path: &Path) -> NodeResult<Self> {
        if !path.is_dir() {
            return Err(NodeError::Unavailable(format!(
                "local repository not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            root: path.to_path_buf(),
            _clone: None,
        })
    }

    async fn clone_shallow(url: &str, depth: u32) -> NodeResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix("auditor_")
            .tempdir()
            .map_err(|e| NodeError::Io(format!("failed to create clone dir: {e}")))?;
        let dest = temp.path().join("repo");
        let dest_str = dest.to_string_lossy().to_string();
        let depth = depth.max(1).to_string();

        info!(url, depth = %depth, "Cloning repository");
        run_git(
            None,
            &[
                "clone",
                "--depth",
                &depth,
                "--single-branch",
                "--no-tags",
                url,
                &dest_str,
            ],
        )
        .await
        .map_err(|e| match e {
            NodeError::Io(msg) => NodeError::Unavailable(format!("clone failed: {msg}")),
            other => other,
        })?;

        Ok(Self {
            root: dest,
            _clone: Some(temp),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_clone(&self) -> bool {
        self._clone.is_some()
    }

    /// Most recent commits, newest first.
    pub async fn recent_commits(&self, count: usize) -> NodeResult<Vec<CommitRecord>> {
        let max = format!("--max-count={}", count.max(1));
        let output = run_git(
            Some(&self.root),
            &["log", &max, "--format=%h|%an|%aI|%s"],
        )
        .await?;
        Ok(parse_log(&output))
    }
}

/// Parse `--format=%h|%an|%aI|%s` output. Subjects may contain `|`.
pub fn parse_log(output: &str) -> Vec<CommitRecord> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.splitn(4, '|').collect();
            if parts.len() < 4 {
                return None;
            }
            let timestamp = DateTime::parse_from_rfc3339(parts[2])
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
            Some(CommitRecord {
                hash: parts[0].to_string(),
                author: parts[1].to_string(),
                timestamp,
                subject: parts[3].to_string(),
            })
        })
        .collect()
}

/// Run git without a shell. Credential prompts are disabled so a private
/// remote fails instead of blocking the node.
async fn run_git(dir: Option<&Path>, args: &[&str]) -> NodeResult<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    cmd.kill_on_drop(true);

    let output = cmd
        .output()
        .await
        .map_err(|e| NodeError::Unavailable(format!("git not runnable: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NodeError::Io(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }

    debug!(args = ?args, "git command succeeded");
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log() {
        let out = "a1b2c3d|Ada|2024-03-01T10:00:00+01:00|feat: add graph | fan-out\n\
                   e4f5a6b|Bob|not-a-date|init\n\
                   garbage line";
        let commits = parse_log(out);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].subject, "feat: add graph | fan-out");
        assert_eq!(
            commits[0].timestamp.unwrap().to_rfc3339(),
            "2024-03-01T09:00:00+00:00"
        );
        assert_eq!(commits[1].timestamp, None);
    }

    #[test]
    fn test_open_missing_local_path() {
        let err = RepoCheckout::open(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, NodeError::Unavailable(_)));
    }
}
