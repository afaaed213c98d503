//! Document analyst: chunked TF-IDF retrieval over supplementary documents.
//!
//! Each document yields one `document_depth` finding (rubric query hits and
//! keyword coverage) and one `report_claims` finding (file paths the
//! document claims exist, cross-checked against a local checkout).
//!
//! Markdown and plain text are read directly; PDF text is extracted with
//! `lopdf` on the blocking pool. A document that cannot be read becomes an
//! error note and the remaining documents are still analyzed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use audit_engine::graph::{Findings, Investigator, InvestigatorView, NodeError, NodeResult};
use audit_engine::state::{ErrorNote, Evidence, EvidenceKind, RepoLocator};

pub const CHUNK_SIZE: usize = 512;
pub const CHUNK_OVERLAP: usize = 64;

/// Queries ranked against every document.
pub const RUBRIC_QUERIES: &[&str] = &[
    "methodology and approach",
    "results and findings",
    "limitations and future work",
    "architecture and design decisions",
    "evaluation metrics",
];

/// Concepts a theoretically grounded report is expected to explain.
const DEPTH_KEYWORDS: &[(&str, &str)] = &[
    ("dialectical synthesis", r"(?i)dialectic(al)?\s+synthesis"),
    ("fan-in", r"(?i)\bfan[- ]?in\b"),
    ("fan-out", r"(?i)\bfan[- ]?out\b"),
    ("metacognition", r"(?i)\bmeta-?cogniti(on|ve)\b"),
    ("state synchronization", r"(?i)state\s+synchroni[sz]ation"),
];

static DEPTH_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DEPTH_KEYWORDS
        .iter()
        .map(|(label, pattern)| (*label, Regex::new(pattern).unwrap()))
        .collect()
});

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+://\S+").unwrap());

static PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[\w.-]+/)+[\w.-]+\.(?:py|rs|ts|js|toml|json|ya?ml|md)\b").unwrap()
});

/// Extensions the analyst will not read as text.
const BINARY_EXTENSIONS: &[&str] = &["docx", "png", "jpg", "jpeg"];

/// Text of every page of a PDF, in page order.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, lopdf::Error> {
    let document = lopdf::Document::load_mem(bytes)?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    document.extract_text(&pages)
}

/// Chunk text by characters. The last chunk may be shorter.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// TF-IDF index over a fixed set of chunks.
pub struct TfIdfIndex {
    idf: HashMap<String, f64>,
    vectors: Vec<HashMap<String, f64>>,
}

impl TfIdfIndex {
    pub fn build(chunks: &[String]) -> Self {
        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(c)).collect();
        let n = tokenized.len() as f64;

        let mut df: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            for term in tokens.iter().collect::<BTreeSet<_>>() {
                *df.entry(term.clone()).or_default() += 1;
            }
        }
        let idf: HashMap<String, f64> = df
            .into_iter()
            .map(|(term, count)| (term, ((n + 1.0) / (count as f64 + 1.0)).ln() + 1.0))
            .collect();

        let vectors = tokenized.iter().map(|t| weigh(t, &idf)).collect();
        Self { idf, vectors }
    }

    /// Best-matching chunk index and its cosine similarity.
    /// Ties resolve to the earliest chunk.
    pub fn best_match(&self, query: &str) -> Option<(usize, f64)> {
        let q = weigh(&tokenize(query), &self.idf);
        let mut best: Option<(usize, f64)> = None;
        for (i, v) in self.vectors.iter().enumerate() {
            let sim = cosine(&q, v);
            if sim > 0.0 && best.map_or(true, |(_, s)| sim > s) {
                best = Some((i, sim));
            }
        }
        best
    }
}

fn weigh(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut tf: HashMap<String, f64> = HashMap::new();
    for t in tokens {
        *tf.entry(t.clone()).or_default() += 1.0;
    }
    let len = tokens.len().max(1) as f64;
    tf.into_iter()
        .filter_map(|(t, c)| idf.get(&t).map(|w| (t, c / len * w)))
        .collect()
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a.iter().filter_map(|(t, x)| b.get(t).map(|y| x * y)).sum();
    let na = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.values().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Repository-relative file paths mentioned in the text, deduplicated and sorted.
/// URLs are ignored.
pub fn claimed_paths(text: &str) -> Vec<String> {
    let without_urls = URL_PATTERN.replace_all(text, " ");
    PATH_PATTERN
        .find_iter(&without_urls)
        .map(|m| m.as_str().trim_start_matches("./").to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Which depth keywords occur, with the number of chunks each appears in.
pub fn keyword_coverage(chunks: &[String]) -> BTreeMap<&'static str, usize> {
    let mut coverage = BTreeMap::new();
    for (label, re) in DEPTH_PATTERNS.iter() {
        let hits = chunks.iter().filter(|c| re.is_match(c)).count();
        if hits > 0 {
            coverage.insert(*label, hits);
        }
    }
    coverage
}

/// Analysis of one document.
pub fn analyze_document(source: &str, text: &str, local_root: Option<&Path>) -> Vec<Evidence> {
    let chunks = chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP);
    let index = TfIdfIndex::build(&chunks);

    let mut sections = Vec::new();
    let mut best_excerpt: Option<(f64, String)> = None;
    for query in RUBRIC_QUERIES {
        match index.best_match(query) {
            Some((i, sim)) => {
                sections.push(format!("'{query}' -> chunk {i} ({sim:.2})"));
                if best_excerpt.as_ref().map_or(true, |(s, _)| sim > *s) {
                    let excerpt: String = chunks[i].trim().chars().take(160).collect();
                    best_excerpt = Some((sim, excerpt));
                }
            }
            None => sections.push(format!("'{query}' -> no match")),
        }
    }

    let coverage = keyword_coverage(&chunks);
    let ratio = coverage.len() as f64 / DEPTH_KEYWORDS.len() as f64;
    let covered: Vec<String> = coverage
        .iter()
        .map(|(k, n)| format!("{k} ({n} chunk(s))"))
        .collect();
    let depth_content = format!(
        "{} chunk(s). Depth concepts covered: {}/{}{}. Retrieval: {}.",
        chunks.len(),
        coverage.len(),
        DEPTH_KEYWORDS.len(),
        if covered.is_empty() {
            String::new()
        } else {
            format!(" [{}]", covered.join(", "))
        },
        sections.join("; ")
    );
    let mut depth = Evidence::new(EvidenceKind::DocumentDepth, source, depth_content)
        .with_found(coverage.len() >= 2)
        .with_confidence(ratio.max(0.1));
    if let Some((_, excerpt)) = best_excerpt {
        depth = depth.with_excerpt(excerpt);
    }

    vec![depth, claims_evidence(source, &claimed_paths(text), local_root)]
}

fn claims_evidence(source: &str, claims: &[String], local_root: Option<&Path>) -> Evidence {
    if claims.is_empty() {
        return Evidence::new(
            EvidenceKind::ReportClaims,
            source,
            "Document makes no verifiable file path claims.",
        )
        .with_confidence(0.3);
    }

    let Some(root) = local_root else {
        return Evidence::new(
            EvidenceKind::ReportClaims,
            source,
            format!(
                "Document claims {} path(s) ({}); remote checkout not cross-checked.",
                claims.len(),
                claims.join(", ")
            ),
        )
        .with_confidence(0.3);
    };

    let (verified, hallucinated): (Vec<&String>, Vec<&String>) = claims
        .iter()
        .partition(|p| stays_inside(p) && root.join(p).exists());
    let content = format!(
        "Document claims {} path(s): {} verified, {} missing{}.",
        claims.len(),
        verified.len(),
        hallucinated.len(),
        if hallucinated.is_empty() {
            String::new()
        } else {
            format!(
                " ({})",
                hallucinated.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            )
        }
    );
    Evidence::new(EvidenceKind::ReportClaims, source, content)
        .with_found(!verified.is_empty())
        .with_confidence(verified.len() as f64 / claims.len() as f64)
}

/// A claimed path may only name files below the checkout root.
fn stays_inside(claim: &str) -> bool {
    Path::new(claim)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Reads each supplementary document and reports on its depth and claims.
pub struct DocAnalyst {
    name: String,
}

impl DocAnalyst {
    pub fn new() -> Self {
        Self {
            name: "doc_analyst".into(),
        }
    }
}

impl DocAnalyst {
    /// Document text, or why it could not be read. Only a lost blocking
    /// task fails the node.
    async fn read_text(&self, doc: &Path, ext: &str) -> NodeResult<Result<String, String>> {
        if ext != "pdf" {
            return Ok(tokio::fs::read_to_string(doc).await.map_err(|e| e.to_string()));
        }
        let bytes = match tokio::fs::read(doc).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(Err(e.to_string())),
        };
        let extracted = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| NodeError::Internal(format!("pdf extraction task failed: {e}")))?;
        Ok(extracted.map_err(|e| e.to_string()))
    }
}

impl Default for DocAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Investigator for DocAnalyst {
    fn name(&self) -> &str {
        &self.name
    }

    async fn investigate(&self, view: &InvestigatorView) -> NodeResult<Findings> {
        let targets = view.targets();
        let mut findings = Findings::default();
        if targets.documents.is_empty() {
            debug!(node = %self.name, "No documents supplied");
            return Ok(findings);
        }

        let local_root = match &targets.repo {
            RepoLocator::Local(path) => Some(path.as_path()),
            RepoLocator::Remote(_) => None,
        };

        for doc in &targets.documents {
            let source = doc.display().to_string();
            if !doc.is_file() {
                warn!(node = %self.name, document = %source, "Document not found");
                findings.note(ErrorNote::new(
                    &self.name,
                    format!("document not found: {source}"),
                ));
                continue;
            }
            let ext = doc
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            if BINARY_EXTENSIONS.contains(&ext.as_str()) {
                findings.note(ErrorNote::new(
                    &self.name,
                    format!("skipped {source}: .{ext} documents are not parsed"),
                ));
                continue;
            }

            let text = match self.read_text(doc, &ext).await? {
                Ok(text) => text,
                Err(reason) => {
                    warn!(node = %self.name, document = %source, %reason, "Document unreadable");
                    findings.note(ErrorNote::new(
                        &self.name,
                        format!("could not read {source}: {reason}"),
                    ));
                    continue;
                }
            };
            info!(node = %self.name, document = %source, chars = text.len(), "Analyzing document");
            for evidence in analyze_document(&source, &text, local_root) {
                findings.push(evidence);
            }
        }

        Ok(findings)
    }
}
