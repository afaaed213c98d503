//! Two-stage audit task graph
//!
//! - `phase`: forward-only run phase machine
//! - `node`: investigator / reviewer contracts and the closed `GraphNode` set
//! - `executor`: JoinSet fan-out, barriers, failure capture, synthesis hand-off
//!
//! # Usage
//!
//! ```ignore
//! use audit_engine::graph::GraphExecutor;
//!
//! let run = GraphExecutor::new()
//!     .add_investigator(RepoInvestigator::new(config))
//!     .add_reviewer(PersonaReviewer::new(Persona::Prosecutor, RuleScorer))
//!     .with_node_timeout(Duration::from_secs(120))
//!     .run(targets)
//!     .await?;
//!
//! println!("{}", run.report().executive_summary);
//! ```

pub mod executor;
pub mod node;
pub mod phase;

pub use executor::{run_graph, AuditRun, GraphExecutor, NodeOutcome, NodeReport, RunSummary};
pub use node::{
    Deliberation, Findings, GraphNode, Investigator, InvestigatorView, NodeError, NodeResult,
    Reviewer, ReviewerView,
};
pub use phase::{AuditPhase, PhaseTracker, PhaseTransition, TransitionError};
