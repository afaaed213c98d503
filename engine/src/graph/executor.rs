//! Two-stage fan-out/fan-in executor.
//!
//! ```text
//! Init ─▶ Stage 1: JoinSet::spawn(investigator_i) × N ─▶ barrier (merge evidence)
//!      ─▶ Stage 2: JoinSet::spawn(reviewer_j) × M     ─▶ barrier (merge opinions)
//!      ─▶ synthesis (exactly once) ─▶ FinalState
//! ```
//!
//! ## Failure policy
//!
//! A node that errors, times out, or panics contributes nothing but an
//! error note. Siblings are never cancelled. A stage in which every node
//! failed still reaches its barrier and the next stage runs on whatever
//! was merged (possibly nothing). Only an invalid target, an invalid
//! policy, or a poisoned store aborts a run.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::node::{GraphNode, Investigator, NodeError, Reviewer};
use super::phase::{AuditPhase, PhaseTracker, PhaseTransition};
use crate::error::EngineResult;
use crate::events::{AuditEvent, SharedEventBus};
use crate::state::{
    AgentState, AuditTargets, ErrorNote, FinalState, PartialUpdate, Stage, StateStore,
};
use crate::synthesis::{AuditReport, SynthesisEngine, SynthesisPolicy};

/// How a node's execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Panicked,
}

/// Per-node execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: String,
    pub stage: Stage,
    pub outcome: NodeOutcome,
    pub evidence: usize,
    pub opinions: usize,
    /// Error notes contributed, including the executor's failure note.
    pub errors: usize,
    pub elapsed_ms: u64,
}

/// Run metadata alongside the final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transitions: Vec<PhaseTransition>,
    pub node_reports: Vec<NodeReport>,
}

impl RunSummary {
    /// Reports for nodes that did not succeed.
    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeReport> {
        self.node_reports
            .iter()
            .filter(|r| r.outcome != NodeOutcome::Succeeded)
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Terminal state plus run metadata.
#[derive(Debug, Clone)]
pub struct AuditRun {
    pub final_state: FinalState,
    pub summary: RunSummary,
}

impl AuditRun {
    pub fn report(&self) -> &AuditReport {
        self.final_state.report()
    }
}

enum NodeFailure {
    Error(NodeError),
    TimedOut(Duration),
    Panicked(String),
}

impl NodeFailure {
    fn outcome(&self) -> NodeOutcome {
        match self {
            Self::Error(_) => NodeOutcome::Failed,
            Self::TimedOut(_) => NodeOutcome::TimedOut,
            Self::Panicked(_) => NodeOutcome::Panicked,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Error(e) => e.to_string(),
            Self::TimedOut(limit) => format!("node timed out after {}", format_duration(*limit)),
            Self::Panicked(msg) => format!("node panicked: {msg}"),
        }
    }
}

struct NodeRun {
    name: String,
    stage: Stage,
    result: Result<PartialUpdate, NodeFailure>,
    elapsed_ms: u64,
}

/// Builder and runner for the audit graph.
pub struct GraphExecutor {
    investigators: Vec<Arc<dyn Investigator>>,
    reviewers: Vec<Arc<dyn Reviewer>>,
    synthesis: SynthesisEngine,
    node_timeout: Option<Duration>,
    max_concurrency: Option<usize>,
    event_bus: Option<SharedEventBus>,
}

impl GraphExecutor {
    pub fn new() -> Self {
        Self {
            investigators: Vec::new(),
            reviewers: Vec::new(),
            synthesis: SynthesisEngine::default(),
            node_timeout: None,
            max_concurrency: None,
            event_bus: None,
        }
    }

    pub fn add_investigator(mut self, node: impl Investigator + 'static) -> Self {
        self.investigators.push(Arc::new(node));
        self
    }

    pub fn add_investigator_arc(mut self, node: Arc<dyn Investigator>) -> Self {
        self.investigators.push(node);
        self
    }

    pub fn add_reviewer(mut self, node: impl Reviewer + 'static) -> Self {
        self.reviewers.push(Arc::new(node));
        self
    }

    pub fn add_reviewer_arc(mut self, node: Arc<dyn Reviewer>) -> Self {
        self.reviewers.push(node);
        self
    }

    pub fn with_policy(mut self, policy: SynthesisPolicy) -> Self {
        self.synthesis = SynthesisEngine::new(policy);
        self
    }

    /// Treat any node running longer than `limit` as failed.
    pub fn with_node_timeout(mut self, limit: Duration) -> Self {
        self.node_timeout = Some(limit);
        self
    }

    /// Bound simultaneously running nodes within a stage.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn with_event_bus(mut self, bus: SharedEventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Registered nodes in registration order.
    pub fn nodes(&self) -> Vec<GraphNode> {
        self.investigators
            .iter()
            .cloned()
            .map(GraphNode::Investigator)
            .chain(self.reviewers.iter().cloned().map(GraphNode::Reviewer))
            .collect()
    }

    /// Validate inputs, run both stages, and synthesize with the configured policy.
    pub async fn run(&self, targets: AuditTargets) -> EngineResult<AuditRun> {
        targets.validate()?;
        self.synthesis.policy().validate()?;
        let engine = self.synthesis.clone();
        self.execute(AgentState::initialize(targets), move |state| {
            engine.synthesize(state)
        })
        .await
    }

    /// Run both stages from `initial` and finish with `synthesis`.
    pub async fn execute<F>(&self, initial: AgentState, synthesis: F) -> EngineResult<AuditRun>
    where
        F: FnOnce(&AgentState) -> AuditReport,
    {
        initial.targets().validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let target = initial.targets().repo.to_string();

        info!(
            %run_id,
            target = %target,
            investigators = self.investigators.len(),
            reviewers = self.reviewers.len(),
            "Audit run started"
        );
        self.emit(AuditEvent::RunStarted {
            run_id,
            target,
            investigators: self.investigators.len(),
            reviewers: self.reviewers.len(),
            timestamp: started_at,
        });

        let store = StateStore::new(initial);
        let mut phases = PhaseTracker::new();
        let mut node_reports = Vec::new();

        let stages = [
            (
                Stage::Investigation,
                self.investigators
                    .iter()
                    .cloned()
                    .map(GraphNode::Investigator)
                    .collect::<Vec<_>>(),
            ),
            (
                Stage::Deliberation,
                self.reviewers
                    .iter()
                    .cloned()
                    .map(GraphNode::Reviewer)
                    .collect::<Vec<_>>(),
            ),
        ];

        for (stage, nodes) in stages {
            self.advance(&mut phases, AuditPhase::running(stage), run_id)?;
            // Every node in the stage sees the same snapshot.
            let snapshot = store.snapshot()?;
            let reports = self.run_stage(run_id, stage, nodes, snapshot, &store).await?;
            node_reports.extend(reports);
            self.advance(&mut phases, AuditPhase::barrier(stage), run_id)?;
        }

        let state = store.into_inner()?;
        let report = synthesis(&state);
        self.advance(&mut phases, AuditPhase::Synthesized, run_id)?;

        info!(
            %run_id,
            overall = ?report.overall_score.value(),
            evaluated = report.evaluated_count(),
            dissent = report.dissent_count(),
            diagnostics = report.diagnostics.len(),
            "Audit report synthesized"
        );
        self.emit(AuditEvent::ReportSynthesized {
            run_id,
            overall_score: report.overall_score.value(),
            dimensions_evaluated: report.evaluated_count(),
            dissent_count: report.dissent_count(),
            timestamp: Utc::now(),
        });

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            transitions: phases.into_transitions(),
            node_reports,
        };

        Ok(AuditRun {
            final_state: state.finalize(report),
            summary,
        })
    }

    fn advance(
        &self,
        phases: &mut PhaseTracker,
        to: AuditPhase,
        run_id: Uuid,
    ) -> EngineResult<()> {
        let record = phases.transition(to)?;
        debug!(%run_id, from = %record.from, to = %record.to, "Phase transition");
        self.emit(AuditEvent::PhaseChanged {
            run_id,
            from: record.from,
            to: record.to,
            timestamp: record.timestamp,
        });
        Ok(())
    }

    /// Spawn every node of a stage and drain them all (the barrier).
    async fn run_stage(
        &self,
        run_id: Uuid,
        stage: Stage,
        nodes: Vec<GraphNode>,
        snapshot: Arc<AgentState>,
        store: &StateStore,
    ) -> EngineResult<Vec<NodeReport>> {
        if nodes.is_empty() {
            info!(%run_id, %stage, "Stage has no nodes");
            return Ok(Vec::new());
        }

        info!(%run_id, %stage, nodes = nodes.len(), "Stage started");

        let semaphore = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut join_set: JoinSet<NodeRun> = JoinSet::new();

        for node in nodes {
            self.emit(AuditEvent::NodeStarted {
                run_id,
                node: node.name().to_string(),
                stage,
                timestamp: Utc::now(),
            });
            let snapshot = snapshot.clone();
            let semaphore = semaphore.clone();
            let timeout = self.node_timeout;
            join_set.spawn(run_node(node, snapshot, semaphore, timeout));
        }

        let mut reports = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let run = match joined {
                Ok(run) => run,
                Err(e) => {
                    // run_node catches node panics, so this is the wrapper itself.
                    warn!(%run_id, %stage, error = %e, "Node wrapper task failed");
                    store.apply(PartialUpdate::new().with_error(ErrorNote::new(
                        stage.to_string(),
                        format!("node task aborted: {e}"),
                    )))?;
                    continue;
                }
            };
            reports.push(self.record(run_id, run, store)?);
        }

        let failed = reports
            .iter()
            .filter(|r| r.outcome != NodeOutcome::Succeeded)
            .count();
        if failed == reports.len() {
            warn!(%run_id, %stage, failed, "Every node in stage failed");
        }
        info!(%run_id, %stage, completed = reports.len(), failed, "Stage barrier reached");

        Ok(reports)
    }

    /// Merge a finished node's contribution (or its failure note) into the store.
    fn record(&self, run_id: Uuid, run: NodeRun, store: &StateStore) -> EngineResult<NodeReport> {
        match run.result {
            Ok(update) => {
                let report = NodeReport {
                    node: run.name.clone(),
                    stage: run.stage,
                    outcome: NodeOutcome::Succeeded,
                    evidence: update.evidence.len(),
                    opinions: update.opinions.len(),
                    errors: update.errors.len(),
                    elapsed_ms: run.elapsed_ms,
                };
                store.apply(update)?;
                debug!(
                    %run_id,
                    node = %run.name,
                    evidence = report.evidence,
                    opinions = report.opinions,
                    elapsed_ms = run.elapsed_ms,
                    "Node completed"
                );
                self.emit(AuditEvent::NodeCompleted {
                    run_id,
                    node: run.name,
                    stage: run.stage,
                    evidence: report.evidence,
                    opinions: report.opinions,
                    elapsed_ms: run.elapsed_ms,
                    timestamp: Utc::now(),
                });
                Ok(report)
            }
            Err(failure) => {
                let message = failure.message();
                warn!(%run_id, node = %run.name, stage = %run.stage, error = %message, "Node failed");
                store.apply(
                    PartialUpdate::new().with_error(ErrorNote::new(&run.name, &message)),
                )?;
                self.emit(AuditEvent::NodeFailed {
                    run_id,
                    node: run.name.clone(),
                    stage: run.stage,
                    error: message,
                    timestamp: Utc::now(),
                });
                Ok(NodeReport {
                    node: run.name,
                    stage: run.stage,
                    outcome: failure.outcome(),
                    evidence: 0,
                    opinions: 0,
                    errors: 1,
                    elapsed_ms: run.elapsed_ms,
                })
            }
        }
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(bus) = &self.event_bus {
            let event_type = event.event_type();
            if let Err(e) = bus.publish(event) {
                warn!(event_type, error = %e, "Event not published");
            }
        }
    }
}

impl Default for GraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one node in its own task so a panic is observed rather than propagated.
async fn run_node(
    node: GraphNode,
    snapshot: Arc<AgentState>,
    semaphore: Option<Arc<Semaphore>>,
    timeout: Option<Duration>,
) -> NodeRun {
    let name = node.name().to_string();
    let stage = node.stage();

    // The semaphore is never closed; a failed acquire just runs unbounded.
    let _permit = match semaphore {
        Some(sem) => sem.acquire_owned().await.ok(),
        None => None,
    };

    let start = Instant::now();
    let mut handle = tokio::spawn(async move { node.execute(snapshot).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return NodeRun {
                    name,
                    stage,
                    result: Err(NodeFailure::TimedOut(limit)),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                };
            }
        },
        None => (&mut handle).await,
    };

    let result = match joined {
        Ok(Ok(update)) => Ok(update),
        Ok(Err(e)) => Err(NodeFailure::Error(e)),
        Err(e) if e.is_panic() => Err(NodeFailure::Panicked(panic_message(e.into_panic()))),
        Err(e) => Err(NodeFailure::Panicked(e.to_string())),
    };

    NodeRun {
        name,
        stage,
        result,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Run the graph with default options and return the terminal state.
pub async fn run_graph<F>(
    initial_state: AgentState,
    stage1: Vec<Arc<dyn Investigator>>,
    stage2: Vec<Arc<dyn Reviewer>>,
    synthesis_fn: F,
) -> EngineResult<FinalState>
where
    F: FnOnce(&AgentState) -> AuditReport,
{
    let executor = stage1
        .into_iter()
        .fold(GraphExecutor::new(), GraphExecutor::add_investigator_arc);
    let executor = stage2
        .into_iter()
        .fold(executor, GraphExecutor::add_reviewer_arc);
    let run = executor.execute(initial_state, synthesis_fn).await?;
    Ok(run.final_state)
}
