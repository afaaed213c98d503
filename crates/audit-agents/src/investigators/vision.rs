//! Visual artifact inspector: architecture diagrams in the repository.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use audit_engine::graph::{Findings, Investigator, InvestigatorView, NodeError, NodeResult};
use audit_engine::state::{Evidence, EvidenceKind};

use super::checkout::RepoCheckout;
use super::scan::{relative, walk_files};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "svg", "gif"];

/// Diagram assets found in a working tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagramInventory {
    pub images: Vec<String>,
    /// `(markdown file, mermaid block count)`.
    pub mermaid: Vec<(String, usize)>,
}

impl DiagramInventory {
    /// Walk `root` counting images and mermaid fences. Blocking.
    pub fn collect(root: &Path) -> Self {
        let mut inventory = Self::default();
        for path in walk_files(root) {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                inventory.images.push(relative(root, &path));
            } else if ext == "md" {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    let blocks = count_mermaid_blocks(&text);
                    if blocks > 0 {
                        inventory.mermaid.push((relative(root, &path), blocks));
                    }
                }
            }
        }
        inventory
    }

    pub fn mermaid_blocks(&self) -> usize {
        self.mermaid.iter().map(|(_, n)| n).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.mermaid.is_empty()
    }

    pub fn to_evidence(&self, source: &str) -> Evidence {
        if self.is_empty() {
            return Evidence::new(
                EvidenceKind::VisualArtifacts,
                source,
                "No image assets or mermaid diagrams found.",
            )
            .missing()
            .with_confidence(0.7);
        }
        let mut parts = vec![format!(
            "{} image asset(s), {} mermaid diagram(s)",
            self.images.len(),
            self.mermaid_blocks()
        )];
        if !self.images.is_empty() {
            let listed: Vec<&str> = self.images.iter().take(8).map(String::as_str).collect();
            parts.push(format!("images: {}", listed.join(", ")));
        }
        if !self.mermaid.is_empty() {
            let listed: Vec<String> = self
                .mermaid
                .iter()
                .map(|(p, n)| format!("{p} ({n})"))
                .collect();
            parts.push(format!("mermaid: {}", listed.join(", ")));
        }
        // Presence of a diagram says nothing about whether it shows parallel
        // flow, so confidence stays moderate.
        Evidence::new(EvidenceKind::VisualArtifacts, source, parts.join("; ") + ".")
            .with_confidence(if self.mermaid.is_empty() { 0.5 } else { 0.7 })
    }
}

/// Fenced blocks opened with ```mermaid.
pub fn count_mermaid_blocks(markdown: &str) -> usize {
    markdown
        .lines()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("```") && t.trim_start_matches('`').trim().eq_ignore_ascii_case("mermaid")
        })
        .count()
}

pub struct VisionInspector {
    name: String,
    clone_depth: u32,
}

impl VisionInspector {
    pub fn new(clone_depth: u32) -> Self {
        Self {
            name: "vision_inspector".into(),
            clone_depth,
        }
    }
}

#[async_trait]
impl Investigator for VisionInspector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn investigate(&self, view: &InvestigatorView) -> NodeResult<Findings> {
        let locator = &view.targets().repo;
        let checkout = RepoCheckout::acquire(locator, self.clone_depth).await?;
        let root = checkout.root().to_path_buf();
        let inventory = tokio::task::spawn_blocking(move || DiagramInventory::collect(&root))
            .await
            .map_err(|e| NodeError::Internal(format!("diagram scan task failed: {e}")))?;

        info!(
            node = %self.name,
            images = inventory.images.len(),
            mermaid = inventory.mermaid_blocks(),
            "Collected diagrams"
        );
        Ok(Findings::new(vec![inventory.to_evidence(&locator.to_string())]))
    }
}
