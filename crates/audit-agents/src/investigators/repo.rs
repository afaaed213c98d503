//! Repository investigator: git history plus source pattern scans.

use async_trait::async_trait;
use tracing::{info, warn};

use audit_engine::graph::{Findings, Investigator, InvestigatorView, NodeError, NodeResult};
use audit_engine::state::{ErrorNote, Evidence, EvidenceKind};

use super::checkout::{CommitRecord, RepoCheckout};
use super::scan::{scan_sources, SourceIndex};

/// A history with fewer commits than this reads as a bulk upload.
const MIN_ITERATIVE_COMMITS: usize = 3;

/// Subjects quoted in the git evidence payload.
const MAX_QUOTED_SUBJECTS: usize = 10;

pub struct RepoInvestigator {
    name: String,
    max_commits: usize,
    clone_depth: u32,
}

impl RepoInvestigator {
    pub fn new(max_commits: usize, clone_depth: u32) -> Self {
        Self {
            name: "repo_investigator".into(),
            max_commits: max_commits.max(1),
            clone_depth,
        }
    }
}

#[async_trait]
impl Investigator for RepoInvestigator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn investigate(&self, view: &InvestigatorView) -> NodeResult<Findings> {
        let locator = &view.targets().repo;
        let checkout = RepoCheckout::acquire(locator, self.clone_depth).await?;
        let source = locator.to_string();
        let mut findings = Findings::default();

        match checkout.recent_commits(self.max_commits).await {
            Ok(commits) => findings.push(history_evidence(&source, &commits)),
            Err(e) => {
                warn!(node = %self.name, error = %e, "git log failed");
                findings.note(ErrorNote::new(&self.name, format!("git history unavailable: {e}")));
                findings.push(
                    Evidence::new(
                        EvidenceKind::GitHistory,
                        &source,
                        "Commit history could not be read.",
                    )
                    .missing(),
                );
            }
        }

        let root = checkout.root().to_path_buf();
        let index = tokio::task::spawn_blocking(move || SourceIndex::load(&root))
            .await
            .map_err(|e| NodeError::Internal(format!("source scan task failed: {e}")))?;

        info!(
            node = %self.name,
            files = index.files.len(),
            lines = index.total_lines(),
            skipped = index.skipped.len(),
            "Indexed sources"
        );

        if !index.skipped.is_empty() {
            findings.note(ErrorNote::new(
                &self.name,
                format!("{} file(s) skipped as unreadable or oversized", index.skipped.len()),
            ));
        }

        for evidence in scan_sources(&index, &source) {
            findings.push(evidence);
        }

        Ok(findings)
    }
}

/// Summarize commit history as one finding.
///
/// A history counts as iterative when it has at least
/// `MIN_ITERATIVE_COMMITS` commits spread over more than one timestamp.
pub fn history_evidence(source: &str, commits: &[CommitRecord]) -> Evidence {
    if commits.is_empty() {
        return Evidence::new(EvidenceKind::GitHistory, source, "Repository has no commits.")
            .missing();
    }

    let mut stamps: Vec<_> = commits.iter().filter_map(|c| c.timestamp).collect();
    stamps.sort();
    stamps.dedup();
    let iterative = commits.len() >= MIN_ITERATIVE_COMMITS && stamps.len() > 1;

    let span = match (stamps.first(), stamps.last()) {
        (Some(first), Some(last)) => {
            let hours = (*last - *first).num_minutes() as f64 / 60.0;
            format!(" over {hours:.1}h")
        }
        _ => String::new(),
    };

    let subjects: Vec<String> = commits
        .iter()
        .take(MAX_QUOTED_SUBJECTS)
        .map(|c| format!("{} {}", c.hash, c.subject))
        .collect();

    let pattern = if iterative {
        "iterative development"
    } else {
        "bulk upload"
    };
    let content = format!(
        "{} commit(s){span}; pattern suggests {pattern}. Recent: {}",
        commits.len(),
        subjects.join("; ")
    );

    let confidence = if iterative { 0.9 } else { 0.6 };
    let mut evidence = Evidence::new(EvidenceKind::GitHistory, source, content)
        .with_found(iterative)
        .with_confidence(confidence);
    if let Some(latest) = commits.first() {
        evidence = evidence.with_excerpt(format!("{} {}", latest.hash, latest.subject));
    }
    evidence
}
