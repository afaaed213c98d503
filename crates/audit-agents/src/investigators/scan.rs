//! Source scanning: .gitignore-aware file discovery and rubric pattern checks.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ignore::WalkBuilder;
use regex::Regex;

use audit_engine::state::{Evidence, EvidenceKind};

/// Extensions treated as source code.
const SOURCE_EXTENSIONS: &[&str] = &["py", "rs", "ts", "tsx", "js", "go", "java", "kt"];

/// Files larger than this are skipped.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Matched files listed per finding.
const MAX_LISTED_FILES: usize = 8;

/// One readable source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub text: String,
}

/// All readable source files of a checkout.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    pub files: Vec<SourceFile>,
    /// Files that could not be read as UTF-8.
    pub skipped: Vec<String>,
}

impl SourceIndex {
    /// Walk `root` respecting .gitignore. Blocking.
    pub fn load(root: &Path) -> Self {
        let mut index = Self::default();
        for path in walk_files(root) {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !SOURCE_EXTENSIONS.contains(&ext) {
                continue;
            }
            let rel = relative(root, &path);
            let too_big = std::fs::metadata(&path)
                .map(|m| m.len() > MAX_FILE_BYTES)
                .unwrap_or(true);
            if too_big {
                index.skipped.push(rel);
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => index.files.push(SourceFile { path: rel, text }),
                Err(_) => index.skipped.push(rel),
            }
        }
        index
    }

    pub fn total_lines(&self) -> usize {
        self.files.iter().map(|f| f.text.lines().count()).sum()
    }
}

/// Every non-hidden, non-ignored file under `root`, sorted.
pub fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build()
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// `path` relative to `root` with `/` separators.
pub fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A rubric check: what to look for and what it means.
struct Check {
    kind: EvidenceKind,
    /// Signals that the sought artifact exists.
    positive: &'static str,
    /// What the artifact is, for evidence text.
    artifact: &'static str,
}

const CHECKS: &[Check] = &[
    Check {
        kind: EvidenceKind::StateManagement,
        positive: r"\bTypedDict\b|\bBaseModel\b|@dataclass|operator\.add|Annotated\[|\breducer\b|struct \w*State\b",
        artifact: "typed state with reducers",
    },
    Check {
        kind: EvidenceKind::GraphOrchestration,
        positive: r"\bStateGraph\b|\.add_edge\(|add_conditional_edges|\bJoinSet\b|join_all|fan[-_ ]?(in|out)",
        artifact: "parallel graph orchestration",
    },
    Check {
        kind: EvidenceKind::StructuredOutput,
        positive: r"with_structured_output|bind_tools|response_format|json_schema|model_validate|JsonSchema|serde_json::from_str",
        artifact: "schema-enforced model output",
    },
    Check {
        kind: EvidenceKind::JudicialNuance,
        positive: r"\bProsecutor\b|\bDefense\b|\bTech ?Lead\b",
        artifact: "distinct reviewer personas",
    },
    Check {
        kind: EvidenceKind::SynthesisLogic,
        positive: r"(?i)chief.?justice|\bdissent|\bvariance\b|weighted.?(mean|score|vote)",
        artifact: "deterministic conflict resolution",
    },
    Check {
        kind: EvidenceKind::ToolSafety,
        positive: r"\btempfile\b|TemporaryDirectory|mkdtemp|shell\s*=\s*False|subprocess\.run\(\s*\[",
        artifact: "sandboxed tool execution",
    },
];

/// Dangerous calls that lower confidence in tool safety.
const DANGEROUS: &[(&str, &str)] = &[
    (r"\bos\.system\(", "os.system"),
    (r"(^|[^.\w])eval\(", "eval("),
    (r"(^|[^.\w])exec\(", "exec("),
    (r"shell\s*=\s*True", "shell=True"),
    (
        r#"subprocess\.(run|call|Popen|check_output)\(\s*[^\[\s)]"#,
        "subprocess without list args",
    ),
    (r"std::process::Command", "std::process::Command"),
    (r"unsafe\s*\{", "unsafe block"),
];

static CHECK_PATTERNS: LazyLock<Vec<(&'static Check, Regex)>> = LazyLock::new(|| {
    CHECKS
        .iter()
        .map(|c| (c, Regex::new(c.positive).unwrap()))
        .collect()
});

static DANGEROUS_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    DANGEROUS
        .iter()
        .map(|(p, label)| (Regex::new(p).unwrap(), *label))
        .collect()
});

/// A pattern hit: file plus first matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub path: String,
    pub line: usize,
    pub text: String,
}

fn hits(index: &SourceIndex, re: &Regex) -> Vec<Hit> {
    index
        .files
        .iter()
        .filter_map(|f| {
            f.text.lines().enumerate().find_map(|(i, line)| {
                re.is_match(line).then(|| Hit {
                    path: f.path.clone(),
                    line: i + 1,
                    text: line.trim().chars().take(160).collect(),
                })
            })
        })
        .collect()
}

fn list_files(hits: &[Hit]) -> String {
    let mut listed: Vec<String> = hits
        .iter()
        .take(MAX_LISTED_FILES)
        .map(|h| format!("{}:{}", h.path, h.line))
        .collect();
    if hits.len() > MAX_LISTED_FILES {
        listed.push(format!("(+{} more)", hits.len() - MAX_LISTED_FILES));
    }
    listed.join(", ")
}

/// Run every rubric check over the index, one finding per check.
pub fn scan_sources(index: &SourceIndex, source: &str) -> Vec<Evidence> {
    let mut out = Vec::with_capacity(CHECK_PATTERNS.len());

    for (check, re) in CHECK_PATTERNS.iter() {
        let found = hits(index, re);
        let mut content = if found.is_empty() {
            format!(
                "No evidence of {} across {} source files.",
                check.artifact,
                index.files.len()
            )
        } else {
            format!(
                "Evidence of {} in {} of {} source files: {}.",
                check.artifact,
                found.len(),
                index.files.len(),
                list_files(&found)
            )
        };

        let mut confidence = if found.is_empty() {
            0.8
        } else {
            (0.5 + 0.1 * found.len() as f64).min(0.95)
        };

        if check.kind == EvidenceKind::ToolSafety {
            let dangerous: Vec<(Hit, &str)> = DANGEROUS_PATTERNS
                .iter()
                .flat_map(|(re, label)| hits(index, re).into_iter().map(move |h| (h, *label)))
                .collect();
            if dangerous.is_empty() {
                content.push_str(" No dangerous calls detected.");
            } else {
                let listed: Vec<String> = dangerous
                    .iter()
                    .take(MAX_LISTED_FILES)
                    .map(|(h, label)| format!("{label} at {}:{}", h.path, h.line))
                    .collect();
                content.push_str(&format!(
                    " {} dangerous call site(s): {}.",
                    dangerous.len(),
                    listed.join(", ")
                ));
                confidence = 0.2;
            }
        }

        let mut evidence = Evidence::new(check.kind, source, content)
            .with_found(!found.is_empty())
            .with_confidence(confidence);
        if let Some(first) = found.first() {
            evidence = evidence.with_excerpt(format!("{}: {}", first.path, first.text));
        }
        out.push(evidence);
    }

    out
}
