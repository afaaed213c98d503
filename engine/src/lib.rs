//! Audit engine: deterministic orchestration and synthesis for repository audits.
//!
//! Investigators collect evidence concurrently, persona reviewers score it
//! concurrently, and a policy-driven synthesis pass folds the scores into a
//! single report. All accumulation goes through one serialization point, so
//! the report never depends on the order branches finished in.
//!
//! The engine performs no network or subprocess I/O. Concrete investigators
//! and reviewers live in the agents crate.

pub mod error;
pub mod events;
pub mod graph;
pub mod state;
pub mod synthesis;

pub use error::{EngineError, EngineResult};
pub use events::{AuditEvent, EventBus, SharedEventBus};
pub use graph::{
    run_graph, AuditPhase, AuditRun, Deliberation, Findings, GraphExecutor, Investigator,
    InvestigatorView, NodeError, NodeOutcome, NodeReport, NodeResult, Reviewer, ReviewerView,
    RunSummary,
};
pub use state::{
    AgentState, AuditTargets, Dimension, ErrorNote, Evidence, EvidenceKind, FinalState,
    JudicialOpinion, PartialUpdate, Persona, RepoLocator, Score, Stage, StateStore,
};
pub use synthesis::{
    AuditReport, DimensionPolicy, DimensionResult, DimensionVerdict, OverallScore,
    SynthesisEngine, SynthesisPolicy,
};
