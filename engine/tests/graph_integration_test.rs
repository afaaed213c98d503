//! Mocked audit graph integration test: exercises the full two-stage run
//! with deterministic mock investigators and reviewers (no I/O).
//!
//! Covers: executor ↔ state store ↔ phase machine ↔ event bus ↔ synthesis
//! running together, including failing, panicking, and slow nodes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use audit_engine::events::{AuditEvent, EventBus};
use audit_engine::graph::{
    run_graph, AuditPhase, Deliberation, Findings, GraphExecutor, Investigator, InvestigatorView,
    NodeError, NodeOutcome, NodeResult, Reviewer, ReviewerView,
};
use audit_engine::state::{
    AgentState, AuditTargets, Dimension, Evidence, EvidenceKind, JudicialOpinion, Persona,
    RepoLocator, Score, Stage, TargetError,
};
use audit_engine::synthesis::{DimensionVerdict, OverallScore, SynthesisEngine};
use audit_engine::EngineError;

// ── Mock nodes ─────────────────────────────────────────────────────

/// Emits fixed evidence after an optional delay.
struct StaticInvestigator {
    name: String,
    evidence: Vec<Evidence>,
    delay: Duration,
}

impl StaticInvestigator {
    fn new(name: &str, evidence: Vec<Evidence>) -> Self {
        Self {
            name: name.to_string(),
            evidence,
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Investigator for StaticInvestigator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn investigate(&self, _view: &InvestigatorView) -> NodeResult<Findings> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Findings::new(self.evidence.clone()))
    }
}

struct FailingInvestigator(&'static str);

#[async_trait]
impl Investigator for FailingInvestigator {
    fn name(&self) -> &str {
        self.0
    }

    async fn investigate(&self, _view: &InvestigatorView) -> NodeResult<Findings> {
        Err(NodeError::Unavailable("repository unreachable".into()))
    }
}

struct PanickingInvestigator;

#[async_trait]
impl Investigator for PanickingInvestigator {
    fn name(&self) -> &str {
        "panicker"
    }

    async fn investigate(&self, _view: &InvestigatorView) -> NodeResult<Findings> {
        panic!("investigator blew up");
    }
}

/// Tracks how many instances run at the same time.
struct CountingInvestigator {
    name: String,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Investigator for CountingInvestigator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn investigate(&self, _view: &InvestigatorView) -> NodeResult<Findings> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(Findings::default())
    }
}

/// Scores fixed dimensions and records how much evidence it saw.
struct ScriptedReviewer {
    persona: Persona,
    scores: Vec<(Dimension, u8, &'static str)>,
    seen_evidence: Arc<AtomicUsize>,
}

impl ScriptedReviewer {
    fn new(persona: Persona, scores: Vec<(Dimension, u8, &'static str)>) -> Self {
        Self {
            persona,
            scores,
            seen_evidence: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    fn name(&self) -> &str {
        match self.persona {
            Persona::TechLead => "tech_lead",
            Persona::Prosecutor => "prosecutor",
            Persona::Defense => "defense",
        }
    }

    fn persona(&self) -> Persona {
        self.persona
    }

    async fn review(&self, view: &ReviewerView) -> NodeResult<Deliberation> {
        self.seen_evidence
            .store(view.evidence().len(), Ordering::SeqCst);
        let opinions = self
            .scores
            .iter()
            .map(|(dim, score, why)| {
                JudicialOpinion::new(self.persona, *dim, Score::new(*score).unwrap(), *why)
            })
            .collect();
        Ok(Deliberation::new(opinions))
    }
}

/// A reviewer whose model call always fails.
struct FailingReviewer(Persona);

#[async_trait]
impl Reviewer for FailingReviewer {
    fn name(&self) -> &str {
        "failing_reviewer"
    }

    fn persona(&self) -> Persona {
        self.0
    }

    async fn review(&self, _view: &ReviewerView) -> NodeResult<Deliberation> {
        Err(NodeError::Inference("model returned no verdict".into()))
    }
}

/// Scores every dimension that has evidence with a constant.
struct EvidenceDrivenReviewer(Persona, u8);

#[async_trait]
impl Reviewer for EvidenceDrivenReviewer {
    fn name(&self) -> &str {
        "evidence_driven"
    }

    fn persona(&self) -> Persona {
        self.0
    }

    async fn review(&self, view: &ReviewerView) -> NodeResult<Deliberation> {
        let opinions = view
            .dimensions_with_evidence()
            .into_iter()
            .map(|d| JudicialOpinion::new(self.0, d, Score::new(self.1).unwrap(), "constant"))
            .collect();
        Ok(Deliberation::new(opinions))
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn targets() -> AuditTargets {
    AuditTargets::parse("https://github.com/acme/agent", ["docs/report.md"]).unwrap()
}

fn git_evidence() -> Evidence {
    Evidence::new(EvidenceKind::GitHistory, "git log", "14 commits, iterative")
}

fn tool_evidence() -> Evidence {
    Evidence::new(EvidenceKind::ToolSafety, "src/tools.py", "os.system call found")
}

// ── Happy path ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_run_scores_and_overrides() {
    let s = Dimension::SafeToolEngineering;
    let j = Dimension::JudicialNuance;
    let run = GraphExecutor::new()
        .add_investigator(StaticInvestigator::new("repo", vec![git_evidence(), tool_evidence()]))
        .add_reviewer(ScriptedReviewer::new(
            Persona::TechLead,
            vec![(s, 1, "shell injection risk"), (j, 4, "personas distinct")],
        ))
        .add_reviewer(ScriptedReviewer::new(
            Persona::Prosecutor,
            vec![(s, 2, "unsanitized input"), (j, 2, "prompts overlap")],
        ))
        .add_reviewer(ScriptedReviewer::new(
            Persona::Defense,
            vec![(s, 1, "no defense"), (j, 5, "clear intent")],
        ))
        .run(targets())
        .await
        .unwrap();

    let report = run.report();

    // (1*2 + 2 + 1) / 4 = 1.25, forced to 1 on a safety-sensitive dimension.
    let safety = report.dimension(s).unwrap();
    assert_eq!(
        safety.verdict,
        DimensionVerdict::Evaluated {
            score: 1.0,
            weighted_mean: 1.25,
            overridden: true
        }
    );

    // (4*2 + 2 + 5) / 4 = 3.75, spread 3 reaches the default threshold.
    let nuance = report.dimension(j).unwrap();
    assert_eq!(nuance.verdict.score(), Some(3.75));
    let dissent = nuance.dissent.as_ref().unwrap();
    assert_eq!(dissent.spread, 3);
    assert_eq!(dissent.minority.len(), 1);
    assert_eq!(dissent.minority[0].persona, Persona::Prosecutor);
    assert_eq!(dissent.minority[0].rationale, "prompts overlap");
    assert_eq!(dissent.majority.len(), 2);

    // Dimensions without opinions are reported but not evaluated.
    assert_eq!(report.dimensions.len(), Dimension::ALL.len());
    assert_eq!(
        report.dimension(Dimension::SwarmVisual).unwrap().verdict,
        DimensionVerdict::NotEvaluated
    );
    assert_eq!(report.overall_score, OverallScore::Evaluated { score: 2.38 });

    // Both evaluated dimensions are below 4.0.
    let remediation: Vec<_> = report.remediation_plan.iter().map(|r| r.dimension).collect();
    assert_eq!(remediation, vec![s, j]);
    assert_eq!(report.remediation_plan[0].persona, Persona::TechLead);
    assert_eq!(report.remediation_plan[1].guidance, "prompts overlap");

    assert!(report.diagnostics.is_empty());
    assert_eq!(run.summary.failed_nodes().count(), 0);
    assert_eq!(run.summary.transitions.len(), 5);
}

#[tokio::test]
async fn test_missing_persona_is_resilient() {
    let d = Dimension::GitForensicAnalysis;
    let run = GraphExecutor::new()
        .add_investigator(StaticInvestigator::new("repo", vec![git_evidence()]))
        .add_reviewer(ScriptedReviewer::new(Persona::TechLead, vec![(d, 4, "solid")]))
        .add_reviewer(ScriptedReviewer::new(Persona::Prosecutor, vec![(d, 2, "squashed")]))
        .run(targets())
        .await
        .unwrap();

    // (4*2 + 2) / 3
    let result = run.report().dimension(d).unwrap();
    assert_eq!(result.verdict.score(), Some(3.33));
    assert_eq!(result.opinions.len(), 2);
    assert!(result.opinions.iter().all(|o| o.persona != Persona::Defense));
    assert!(result
        .rationale_excerpts
        .iter()
        .all(|e| !e.starts_with("Defense")));
}

#[tokio::test]
async fn test_failed_reviewer_is_left_out_of_remediation() {
    let d = Dimension::GitForensicAnalysis;
    let run = GraphExecutor::new()
        .add_investigator(StaticInvestigator::new("repo", vec![git_evidence()]))
        .add_reviewer(ScriptedReviewer::new(Persona::TechLead, vec![(d, 3, "thin history")]))
        .add_reviewer(FailingReviewer(Persona::Prosecutor))
        .add_reviewer(ScriptedReviewer::new(Persona::Defense, vec![(d, 3, "steady effort")]))
        .run(targets())
        .await
        .unwrap();

    let report = run.report();

    // (3*2 + 3) / 3, computed without the Prosecutor.
    let result = report.dimension(d).unwrap();
    assert_eq!(result.verdict.score(), Some(3.0));
    assert!(result.opinions.iter().all(|o| o.persona != Persona::Prosecutor));

    // Tied scores fall to the highest-priority persona still present.
    assert_eq!(report.remediation_plan.len(), 1);
    assert_eq!(report.remediation_plan[0].persona, Persona::TechLead);
    assert_eq!(report.remediation_plan[0].guidance, "thin history");

    let diagnostics: Vec<String> = report.diagnostics.iter().map(ToString::to_string).collect();
    assert_eq!(
        diagnostics,
        vec!["[failing_reviewer] inference failed: model returned no verdict".to_string()]
    );
    assert_eq!(run.summary.failed_nodes().count(), 1);
}

// ── Failure handling ───────────────────────────────────────────────

#[tokio::test]
async fn test_failed_and_panicking_nodes_become_diagnostics() {
    let run = GraphExecutor::new()
        .add_investigator(StaticInvestigator::new("repo", vec![git_evidence()]))
        .add_investigator(FailingInvestigator("doc"))
        .add_investigator(PanickingInvestigator)
        .add_reviewer(EvidenceDrivenReviewer(Persona::TechLead, 4))
        .run(targets())
        .await
        .unwrap();

    let diagnostics: Vec<String> = run
        .report()
        .diagnostics
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics
        .contains(&"[doc] dependency unavailable: repository unreachable".to_string()));
    assert!(diagnostics.contains(&"[panicker] node panicked: investigator blew up".to_string()));

    // The surviving investigator's evidence still reached Stage 2.
    assert_eq!(
        run.report()
            .dimension(Dimension::GitForensicAnalysis)
            .unwrap()
            .verdict
            .score(),
        Some(4.0)
    );

    let outcomes: Vec<_> = run
        .summary
        .node_reports
        .iter()
        .filter(|r| r.stage == Stage::Investigation)
        .map(|r| (r.node.as_str(), r.outcome))
        .collect();
    assert!(outcomes.contains(&("doc", NodeOutcome::Failed)));
    assert!(outcomes.contains(&("panicker", NodeOutcome::Panicked)));
    assert!(outcomes.contains(&("repo", NodeOutcome::Succeeded)));
}

#[tokio::test]
async fn test_total_stage_failure_degrades_to_not_evaluated() {
    let run = GraphExecutor::new()
        .add_investigator(FailingInvestigator("repo"))
        .add_investigator(FailingInvestigator("doc"))
        .add_reviewer(EvidenceDrivenReviewer(Persona::Prosecutor, 1))
        .run(targets())
        .await
        .unwrap();

    let report = run.report();
    assert_eq!(report.overall_score, OverallScore::NotEvaluated);
    assert!(report
        .dimensions
        .iter()
        .all(|d| d.verdict == DimensionVerdict::NotEvaluated));
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report.remediation_plan.is_empty());

    // Stage 2 still ran.
    assert!(run
        .summary
        .node_reports
        .iter()
        .any(|r| r.stage == Stage::Deliberation && r.outcome == NodeOutcome::Succeeded));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_recorded_as_failure() {
    let run = GraphExecutor::new()
        .add_investigator(
            StaticInvestigator::new("slow", vec![git_evidence()]).delayed(Duration::from_secs(600)),
        )
        .add_investigator(StaticInvestigator::new("fast", vec![tool_evidence()]))
        .with_node_timeout(Duration::from_secs(30))
        .run(targets())
        .await
        .unwrap();

    let state = run.final_state.state();
    assert_eq!(state.evidence().len(), 1);
    assert_eq!(state.evidence()[0].kind, EvidenceKind::ToolSafety);
    assert_eq!(
        state.errors()[0].to_string(),
        "[slow] node timed out after 30s"
    );
    assert!(run
        .summary
        .node_reports
        .iter()
        .any(|r| r.node == "slow" && r.outcome == NodeOutcome::TimedOut));
}

#[tokio::test]
async fn test_invalid_target_aborts_before_any_stage() {
    let bus = EventBus::with_journal().shared();
    let bad = AuditTargets::new(RepoLocator::Remote("https://".into()));

    let result = GraphExecutor::new()
        .add_investigator(StaticInvestigator::new("repo", vec![git_evidence()]))
        .with_event_bus(bus.clone())
        .run(bad)
        .await;

    assert!(matches!(result, Err(EngineError::InvalidTarget(_))));
    assert!(bus.journal().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_local_checkout_aborts_before_any_stage() {
    let bus = EventBus::with_journal().shared();
    let missing = AuditTargets::new(RepoLocator::Local("/no/such/checkout/anywhere".into()));

    let result = GraphExecutor::new()
        .add_investigator(StaticInvestigator::new("repo", vec![git_evidence()]))
        .with_event_bus(bus.clone())
        .run(missing)
        .await;

    assert!(matches!(
        result,
        Err(EngineError::InvalidTarget(TargetError::LocalPathMissing(_)))
    ));
    assert!(bus.journal().unwrap().is_empty());
}

// ── Barrier semantics ──────────────────────────────────────────────

#[tokio::test]
async fn test_stage_two_sees_all_stage_one_evidence() {
    let reviewer = ScriptedReviewer::new(Persona::Defense, vec![]);
    let seen = reviewer.seen_evidence.clone();

    GraphExecutor::new()
        .add_investigator(
            StaticInvestigator::new("slow", vec![git_evidence()]).delayed(Duration::from_millis(40)),
        )
        .add_investigator(StaticInvestigator::new("fast", vec![tool_evidence(), tool_evidence()]))
        .add_reviewer(reviewer)
        .run(targets())
        .await
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_barrier_ordering_observed_on_event_bus() {
    let bus = EventBus::with_journal().shared();

    GraphExecutor::new()
        .add_investigator(
            StaticInvestigator::new("slow", vec![git_evidence()]).delayed(Duration::from_millis(30)),
        )
        .add_investigator(StaticInvestigator::new("fast", vec![tool_evidence()]))
        .add_reviewer(EvidenceDrivenReviewer(Persona::TechLead, 3))
        .add_reviewer(EvidenceDrivenReviewer(Persona::Defense, 4))
        .with_event_bus(bus.clone())
        .run(targets())
        .await
        .unwrap();

    let events = bus.journal().unwrap();
    assert!(matches!(events.first(), Some(AuditEvent::RunStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(AuditEvent::ReportSynthesized { .. })
    ));

    let phases: Vec<AuditPhase> = events
        .iter()
        .filter_map(|e| match e {
            AuditEvent::PhaseChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            AuditPhase::Stage1Running,
            AuditPhase::Stage1Barrier,
            AuditPhase::Stage2Running,
            AuditPhase::Stage2Barrier,
            AuditPhase::Synthesized,
        ]
    );

    let position = |pred: &dyn Fn(&AuditEvent) -> bool| events.iter().position(|e| pred(e));
    let last_stage1_done = events
        .iter()
        .rposition(|e| {
            matches!(e, AuditEvent::NodeCompleted { stage: Stage::Investigation, .. })
        })
        .unwrap();
    let stage1_barrier = position(&|e| {
        matches!(e, AuditEvent::PhaseChanged { to: AuditPhase::Stage1Barrier, .. })
    })
    .unwrap();
    let first_stage2_start = position(&|e| {
        matches!(e, AuditEvent::NodeStarted { stage: Stage::Deliberation, .. })
    })
    .unwrap();

    assert!(last_stage1_done < stage1_barrier);
    assert!(stage1_barrier < first_stage2_start);
}

#[tokio::test]
async fn test_concurrency_cap_is_respected() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut executor = GraphExecutor::new().with_max_concurrency(2);
    for i in 0..6 {
        executor = executor.add_investigator(CountingInvestigator {
            name: format!("counter-{i}"),
            running: running.clone(),
            peak: peak.clone(),
        });
    }
    executor.run(targets()).await.unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

// ── Determinism ────────────────────────────────────────────────────

#[tokio::test]
async fn test_completion_order_does_not_change_report() {
    async fn run_with_delays(first: u64, second: u64) -> String {
        let run = GraphExecutor::new()
            .add_investigator(
                StaticInvestigator::new("a", vec![git_evidence()])
                    .delayed(Duration::from_millis(first)),
            )
            .add_investigator(
                StaticInvestigator::new("b", vec![tool_evidence()])
                    .delayed(Duration::from_millis(second)),
            )
            .add_reviewer(EvidenceDrivenReviewer(Persona::TechLead, 4))
            .add_reviewer(EvidenceDrivenReviewer(Persona::Prosecutor, 2))
            .add_reviewer(EvidenceDrivenReviewer(Persona::Defense, 5))
            .run(targets())
            .await
            .unwrap();
        serde_json::to_string(run.report()).unwrap()
    }

    let forward = run_with_delays(5, 40).await;
    let reverse = run_with_delays(40, 5).await;
    assert_eq!(forward, reverse);
}

#[tokio::test]
async fn test_run_graph_with_custom_synthesis() {
    let initial = AgentState::initialize(targets());
    let stage1: Vec<Arc<dyn Investigator>> =
        vec![Arc::new(StaticInvestigator::new("repo", vec![git_evidence()]))];
    let stage2: Vec<Arc<dyn Reviewer>> = vec![Arc::new(EvidenceDrivenReviewer(Persona::Defense, 5))];

    let engine = SynthesisEngine::default();
    let final_state = run_graph(initial, stage1, stage2, |state| engine.synthesize(state))
        .await
        .unwrap();

    assert_eq!(final_state.state().evidence().len(), 1);
    assert_eq!(final_state.state().opinions().len(), 1);
    assert_eq!(
        final_state
            .report()
            .dimension(Dimension::GitForensicAnalysis)
            .unwrap()
            .verdict
            .score(),
        Some(5.0)
    );
    assert!(final_state.state().report().is_some());
}
