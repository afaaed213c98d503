//! Audit targets: the only externally supplied input to a run.
//!
//! Parsing happens before any stage starts; a malformed locator is the one
//! failure that aborts a run.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Error type for target validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("Repository locator is empty")]
    EmptyLocator,

    #[error("Repository locator contains whitespace or control characters: {0:?}")]
    IllegalCharacters(String),

    #[error("Remote locator has no host or path after the scheme: {0}")]
    MissingRemotePath(String),

    #[error("Document path at position {0} is empty")]
    EmptyDocumentPath(usize),

    #[error("Local repository path does not exist: {0}")]
    LocalPathMissing(PathBuf),

    #[error("Local repository path is not a directory: {0}")]
    LocalPathNotDirectory(PathBuf),
}

/// Result type for target validation
pub type TargetResult<T> = Result<T, TargetError>;

const REMOTE_SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git://", "file://"];

/// Where the repository under audit lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RepoLocator {
    /// Clonable URL (`https://`, `ssh://`, `git@host:path`, ...).
    Remote(String),
    /// Checked-out working tree on the local filesystem.
    Local(PathBuf),
}

impl RepoLocator {
    /// Parse and validate a locator string.
    pub fn parse(raw: &str) -> TargetResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TargetError::EmptyLocator);
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(TargetError::IllegalCharacters(trimmed.to_string()));
        }

        if let Some(scheme) = REMOTE_SCHEMES.iter().find(|s| trimmed.starts_with(**s)) {
            let rest = &trimmed[scheme.len()..];
            if rest.trim_matches('/').is_empty() {
                return Err(TargetError::MissingRemotePath(trimmed.to_string()));
            }
            return Ok(Self::Remote(trimmed.to_string()));
        }

        // scp-like syntax: user@host:path
        if let Some((user_host, path)) = trimmed.split_once(':') {
            if user_host.contains('@') && !user_host.contains('/') {
                if path.trim_matches('/').is_empty() {
                    return Err(TargetError::MissingRemotePath(trimmed.to_string()));
                }
                return Ok(Self::Remote(trimmed.to_string()));
            }
        }

        Ok(Self::Local(PathBuf::from(trimmed)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Repository plus optional supplementary documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTargets {
    pub repo: RepoLocator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<PathBuf>,
}

impl AuditTargets {
    pub fn new(repo: RepoLocator) -> Self {
        Self {
            repo,
            documents: Vec::new(),
        }
    }

    /// Parse a locator and document list in one step.
    pub fn parse<I, P>(repo: &str, documents: I) -> TargetResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let targets = Self {
            repo: RepoLocator::parse(repo)?,
            documents: documents.into_iter().map(Into::into).collect(),
        };
        targets.validate()?;
        Ok(targets)
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.documents.push(path.into());
        self
    }

    /// Check invariants that construction through public fields can bypass.
    ///
    /// A local repository must be an existing directory; remote locators are
    /// only checked syntactically.
    pub fn validate(&self) -> TargetResult<()> {
        match &self.repo {
            RepoLocator::Remote(url) => {
                RepoLocator::parse(url)?;
            }
            RepoLocator::Local(path) => {
                if path.as_os_str().is_empty() {
                    return Err(TargetError::EmptyLocator);
                }
                if !path.exists() {
                    return Err(TargetError::LocalPathMissing(path.clone()));
                }
                if !path.is_dir() {
                    return Err(TargetError::LocalPathNotDirectory(path.clone()));
                }
            }
        }
        for (idx, doc) in self.documents.iter().enumerate() {
            if doc.as_os_str().is_empty() {
                return Err(TargetError::EmptyDocumentPath(idx));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_urls() {
        for url in [
            "https://github.com/org/repo",
            "http://example.com/repo.git",
            "ssh://git@example.com/org/repo.git",
            "git@github.com:org/repo.git",
        ] {
            let loc = RepoLocator::parse(url).unwrap();
            assert!(loc.is_remote(), "{url} should be remote");
            assert_eq!(loc.to_string(), url);
        }
    }

    #[test]
    fn test_parse_local_path() {
        let loc = RepoLocator::parse("./some/checkout").unwrap();
        assert_eq!(loc, RepoLocator::Local(PathBuf::from("./some/checkout")));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(RepoLocator::parse("   "), Err(TargetError::EmptyLocator));
        assert!(matches!(
            RepoLocator::parse("https://"),
            Err(TargetError::MissingRemotePath(_))
        ));
        assert!(matches!(
            RepoLocator::parse("git@github.com:"),
            Err(TargetError::MissingRemotePath(_))
        ));
        assert!(matches!(
            RepoLocator::parse("https://host/a b"),
            Err(TargetError::IllegalCharacters(_))
        ));
    }

    #[test]
    fn test_targets_require_existing_local_directory() {
        let err = AuditTargets::parse("/no/such/dir/anywhere", Vec::<String>::new()).unwrap_err();
        assert_eq!(
            err,
            TargetError::LocalPathMissing(PathBuf::from("/no/such/dir/anywhere"))
        );

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("README.md");
        std::fs::write(&file, "# not a repo").unwrap();
        let err = AuditTargets::new(RepoLocator::Local(file.clone()))
            .validate()
            .unwrap_err();
        assert_eq!(err, TargetError::LocalPathNotDirectory(file));

        assert!(AuditTargets::new(RepoLocator::Local(dir.path().to_path_buf()))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_targets_reject_empty_document() {
        let err = AuditTargets::parse("https://github.com/o/r", ["notes.md", ""]).unwrap_err();
        assert_eq!(err, TargetError::EmptyDocumentPath(1));
    }
}
