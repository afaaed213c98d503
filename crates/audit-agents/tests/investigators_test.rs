//! Investigators and the full rules pipeline against scratch repositories.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use audit_agents::investigators::{DocAnalyst, RepoInvestigator, VisionInspector};
use audit_agents::{build_executor, render_markdown, AuditorConfig, ReviewerBackend};
use audit_engine::graph::{Investigator, InvestigatorView, NodeError};
use audit_engine::state::{AgentState, AuditTargets, Dimension, EvidenceKind, RepoLocator};
use audit_engine::synthesis::{OverallScore, SynthesisPolicy};

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Auditor Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .status()
        .expect("git runs");
    assert!(status.success(), "git {args:?} failed");
}

fn write(dir: &Path, rel: &str, text: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

/// Three commits: state, graph, tools (with a dangerous call).
fn scratch_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    git(root, &["init", "-q"]);

    write(
        root,
        "src/state.py",
        "class AgentState(TypedDict):\n    evidences: Annotated[list, operator.add]\n",
    );
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "add typed state"]);

    write(
        root,
        "src/graph.py",
        "g = StateGraph(AgentState)\ng.add_edge('repo', 'judges')\n",
    );
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "wire graph"]);

    write(root, "src/tools.py", "import os\nos.system('git clone ' + url)\n");
    write(root, "README.md", "# Demo\n```mermaid\ngraph TD\nA-->B\n```\n");
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "add tools"]);

    dir
}

fn view(targets: AuditTargets) -> InvestigatorView {
    InvestigatorView::new(Arc::new(AgentState::initialize(targets)))
}

#[tokio::test]
async fn test_repo_investigator_on_local_repo() {
    let repo = scratch_repo();
    let targets = AuditTargets::new(RepoLocator::Local(repo.path().to_path_buf()));

    let findings = RepoInvestigator::new(50, 50)
        .investigate(&view(targets))
        .await
        .unwrap();

    let kind = |k: EvidenceKind| findings.evidence.iter().find(|e| e.kind == k).unwrap();

    let history = kind(EvidenceKind::GitHistory);
    assert!(history.content.starts_with("3 commit(s)"), "{}", history.content);
    assert!(history.content.contains("add tools"));

    assert!(kind(EvidenceKind::StateManagement).found);
    assert!(kind(EvidenceKind::GraphOrchestration).found);
    assert!(!kind(EvidenceKind::StructuredOutput).found);

    let safety = kind(EvidenceKind::ToolSafety);
    assert_eq!(safety.confidence, Some(0.2));
    assert!(safety.content.contains("os.system at src/tools.py:2"));
    assert!(findings.errors.is_empty());
}

#[tokio::test]
async fn test_repo_investigator_missing_path_fails_node() {
    let targets = AuditTargets::new(RepoLocator::Local("/no/such/checkout".into()));
    let err = RepoInvestigator::new(50, 50)
        .investigate(&view(targets))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Unavailable(_)));
}

#[tokio::test]
async fn test_non_git_directory_notes_history_failure() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.rs", "fn main() {}\n");
    let targets = AuditTargets::new(RepoLocator::Local(dir.path().to_path_buf()));

    let findings = RepoInvestigator::new(10, 10)
        .investigate(&view(targets))
        .await
        .unwrap();

    let history = findings
        .evidence
        .iter()
        .find(|e| e.kind == EvidenceKind::GitHistory)
        .unwrap();
    assert!(!history.found);
    assert_eq!(findings.errors.len(), 1);
    assert!(findings.errors[0].message.starts_with("git history unavailable"));
}

#[tokio::test]
async fn test_doc_analyst_cross_checks_claims() {
    let repo = scratch_repo();
    let docs = tempfile::tempdir().unwrap();
    let report = docs.path().join("report.md");
    std::fs::write(
        &report,
        "Our methodology and approach uses fan-out to parallel detectives and a fan-in \
         barrier before dialectical synthesis. State lives in src/state.py; the judges \
         live in src/judges.py.",
    )
    .unwrap();

    let targets = AuditTargets::new(RepoLocator::Local(repo.path().to_path_buf()))
        .with_document(&report);
    let findings = DocAnalyst::new().investigate(&view(targets)).await.unwrap();

    assert_eq!(findings.evidence.len(), 2);
    let depth = &findings.evidence[0];
    assert_eq!(depth.dimension, Dimension::TheoreticalDepth);
    assert!(depth.found);
    assert!(depth.content.contains("Depth concepts covered: 3/5"));

    let claims = &findings.evidence[1];
    assert_eq!(claims.dimension, Dimension::ReportAccuracy);
    assert!(claims.content.contains("1 verified, 1 missing (src/judges.py)"));
}

#[tokio::test]
async fn test_doc_analyst_notes_missing_document_and_continues() {
    let repo = scratch_repo();
    let docs = tempfile::tempdir().unwrap();
    let report = docs.path().join("report.md");
    std::fs::write(&report, "Fan-out then fan-in, as described in src/graph.py.").unwrap();

    let targets = AuditTargets::new(RepoLocator::Local(repo.path().to_path_buf()))
        .with_document(&report)
        .with_document("/no/appendix.md");
    let findings = DocAnalyst::new().investigate(&view(targets)).await.unwrap();

    // The readable document still contributes both findings.
    assert_eq!(findings.evidence.len(), 2);
    assert!(findings.evidence.iter().all(|e| e.source.ends_with("report.md")));
    assert!(findings.evidence[1].content.contains("1 verified, 0 missing"));

    assert_eq!(findings.errors.len(), 1);
    assert_eq!(findings.errors[0].node, "doc_analyst");
    assert_eq!(findings.errors[0].message, "document not found: /no/appendix.md");
}

/// One-page PDF with a single line of Helvetica text.
fn write_pdf(path: &Path, line: &str) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(line)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn test_doc_analyst_reads_pdf_reports() {
    let repo = scratch_repo();
    let docs = tempfile::tempdir().unwrap();
    let pdf = docs.path().join("report.pdf");
    write_pdf(
        &pdf,
        "The fan-out detectives meet a fan-in barrier; state lives in src/state.py",
    );

    let targets = AuditTargets::new(RepoLocator::Local(repo.path().to_path_buf()))
        .with_document(&pdf);
    let findings = DocAnalyst::new().investigate(&view(targets)).await.unwrap();

    assert!(findings.errors.is_empty(), "{:?}", findings.errors);
    assert_eq!(findings.evidence.len(), 2);
    let depth = &findings.evidence[0];
    assert_eq!(depth.dimension, Dimension::TheoreticalDepth);
    assert!(depth.content.contains("Depth concepts covered: 2/5"));
    assert!(findings.evidence[1].content.contains("1 verified, 0 missing"));
}

#[tokio::test]
async fn test_doc_analyst_notes_unreadable_documents() {
    let docs = tempfile::tempdir().unwrap();
    let broken = docs.path().join("broken.pdf");
    std::fs::write(&broken, b"%PDF-1.4").unwrap();
    let slides = docs.path().join("slides.docx");
    std::fs::write(&slides, b"PK").unwrap();
    let targets = AuditTargets::new(RepoLocator::Local(".".into()))
        .with_document(&broken)
        .with_document(&slides);

    let findings = DocAnalyst::new().investigate(&view(targets)).await.unwrap();
    assert!(findings.evidence.is_empty());
    let messages: Vec<&str> = findings.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("could not read"));
    assert!(messages[1].ends_with(".docx documents are not parsed"));
}

#[tokio::test]
async fn test_vision_inspector_counts_mermaid() {
    let repo = scratch_repo();
    let targets = AuditTargets::new(RepoLocator::Local(repo.path().to_path_buf()));
    let findings = VisionInspector::new(10).investigate(&view(targets)).await.unwrap();

    assert_eq!(findings.evidence.len(), 1);
    assert!(findings.evidence[0]
        .content
        .starts_with("0 image asset(s), 1 mermaid diagram(s)"));
}

#[tokio::test]
async fn test_full_rules_pipeline() {
    let repo = scratch_repo();
    let config = AuditorConfig::from_lookup(|_| None);
    let executor = build_executor(
        &config,
        ReviewerBackend::Rules,
        SynthesisPolicy::default(),
        None,
    )
    .unwrap();

    let targets = AuditTargets::new(RepoLocator::Local(repo.path().to_path_buf()))
        .with_document("/missing/report.md");
    let run = executor.run(targets).await.unwrap();
    let report = run.report();

    assert!(matches!(report.overall_score, OverallScore::Evaluated { .. }));
    // No documents were read, so the document dimensions have no opinions.
    assert!(!report
        .dimension(Dimension::TheoreticalDepth)
        .unwrap()
        .verdict
        .is_evaluated());
    assert!(report
        .dimension(Dimension::SafeToolEngineering)
        .unwrap()
        .verdict
        .is_evaluated());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.node == "doc_analyst" && d.message.contains("document not found")));

    let md = render_markdown(report);
    assert!(md.contains("## Scorecard"));
    assert!(md.contains("doc_analyst"));
}
