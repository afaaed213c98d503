//! Node contracts for the two graph stages.
//!
//! Investigators see only the audit targets; reviewers see the targets and
//! the merged evidence. What each may contribute is fixed by its return
//! type: [`Findings`] cannot carry opinions, [`Deliberation`] cannot carry
//! evidence, and neither can touch the report.

use std::sync::Arc;

use async_trait::async_trait;

use crate::state::{
    AgentState, AuditTargets, Dimension, ErrorNote, Evidence, JudicialOpinion, PartialUpdate,
    Persona, Stage,
};

/// Node failure. Recorded as an error note; never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("i/o failure: {0}")]
    Io(String),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type for node execution
pub type NodeResult<T> = Result<T, NodeError>;

/// Read-only input to a Stage 1 node.
#[derive(Debug, Clone)]
pub struct InvestigatorView {
    snapshot: Arc<AgentState>,
}

impl InvestigatorView {
    pub fn new(snapshot: Arc<AgentState>) -> Self {
        Self { snapshot }
    }

    pub fn targets(&self) -> &AuditTargets {
        self.snapshot.targets()
    }
}

/// Read-only input to a Stage 2 node: targets plus the complete evidence set.
#[derive(Debug, Clone)]
pub struct ReviewerView {
    snapshot: Arc<AgentState>,
}

impl ReviewerView {
    pub fn new(snapshot: Arc<AgentState>) -> Self {
        Self { snapshot }
    }

    pub fn targets(&self) -> &AuditTargets {
        self.snapshot.targets()
    }

    pub fn evidence(&self) -> &[Evidence] {
        self.snapshot.evidence()
    }

    /// Canonically ordered evidence for one dimension.
    pub fn evidence_for(&self, dimension: Dimension) -> Vec<&Evidence> {
        self.snapshot.evidence_for(dimension)
    }

    /// Dimensions that have at least one finding, in canonical order.
    pub fn dimensions_with_evidence(&self) -> Vec<Dimension> {
        let mut dims: Vec<Dimension> = self
            .snapshot
            .evidence()
            .iter()
            .map(|e| e.dimension)
            .collect();
        dims.sort();
        dims.dedup();
        dims
    }
}

/// Stage 1 contribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub evidence: Vec<Evidence>,
    /// Non-fatal sub-step failures.
    pub errors: Vec<ErrorNote>,
}

impl Findings {
    pub fn new(evidence: Vec<Evidence>) -> Self {
        Self {
            evidence,
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, evidence: Evidence) {
        self.evidence.push(evidence);
    }

    pub fn note(&mut self, note: ErrorNote) {
        self.errors.push(note);
    }

    pub fn into_update(self) -> PartialUpdate {
        PartialUpdate::new()
            .with_evidence(self.evidence)
            .with_errors(self.errors)
    }
}

/// Stage 2 contribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deliberation {
    pub opinions: Vec<JudicialOpinion>,
    /// Non-fatal per-dimension failures.
    pub errors: Vec<ErrorNote>,
}

impl Deliberation {
    pub fn new(opinions: Vec<JudicialOpinion>) -> Self {
        Self {
            opinions,
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, opinion: JudicialOpinion) {
        self.opinions.push(opinion);
    }

    pub fn note(&mut self, note: ErrorNote) {
        self.errors.push(note);
    }

    /// Convert to an update, stamping every opinion with `persona`.
    pub fn into_update(self, persona: Persona) -> PartialUpdate {
        let opinions = self.opinions.into_iter().map(|mut o| {
            o.persona = persona;
            o
        });
        PartialUpdate::new()
            .with_opinions(opinions)
            .with_errors(self.errors)
    }
}

/// Stage 1 evidence producer.
#[async_trait]
pub trait Investigator: Send + Sync {
    /// Stable node name used in error notes and events.
    fn name(&self) -> &str;

    async fn investigate(&self, view: &InvestigatorView) -> NodeResult<Findings>;
}

/// Stage 2 persona reviewer.
#[async_trait]
pub trait Reviewer: Send + Sync {
    fn name(&self) -> &str;

    fn persona(&self) -> Persona;

    async fn review(&self, view: &ReviewerView) -> NodeResult<Deliberation>;
}

/// Closed set of registrable nodes.
#[derive(Clone)]
pub enum GraphNode {
    Investigator(Arc<dyn Investigator>),
    Reviewer(Arc<dyn Reviewer>),
}

impl GraphNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Investigator(n) => n.name(),
            Self::Reviewer(n) => n.name(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Investigator(_) => Stage::Investigation,
            Self::Reviewer(_) => Stage::Deliberation,
        }
    }

    /// Persona tag for reviewers.
    pub fn persona(&self) -> Option<Persona> {
        match self {
            Self::Investigator(_) => None,
            Self::Reviewer(n) => Some(n.persona()),
        }
    }

    /// Run the node against a snapshot and normalize its contribution.
    pub async fn execute(&self, snapshot: Arc<AgentState>) -> NodeResult<PartialUpdate> {
        match self {
            Self::Investigator(node) => {
                let view = InvestigatorView::new(snapshot);
                node.investigate(&view).await.map(Findings::into_update)
            }
            Self::Reviewer(node) => {
                let view = ReviewerView::new(snapshot);
                let persona = node.persona();
                node.review(&view).await.map(|d| d.into_update(persona))
            }
        }
    }
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("name", &self.name())
            .field("stage", &self.stage())
            .finish()
    }
}
