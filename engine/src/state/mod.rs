//! Shared audit state and its record types
//!
//! - `types`: Evidence, JudicialOpinion, rubric dimensions and personas
//! - `targets`: repository locator and document list (run input)
//! - `store`: `AgentState` with field-level merge policy and the
//!   `StateStore` serialization point used by the executor
//!
//! # Usage
//!
//! ```ignore
//! use audit_engine::state::{AgentState, AuditTargets, PartialUpdate, StateStore};
//!
//! let targets = AuditTargets::parse("https://github.com/org/repo", Vec::<String>::new())?;
//! let store = StateStore::new(AgentState::initialize(targets)).shared();
//!
//! store.apply(PartialUpdate::new().with_evidence(findings))?;
//! let snapshot = store.snapshot()?;
//! ```

pub mod store;
pub mod targets;
pub mod types;

// Re-export core types
pub use store::{
    compare_evidence, compare_opinions, AgentState, FinalState, PartialUpdate, SharedStateStore,
    StateStore, StoreError, StoreResult,
};
pub use targets::{AuditTargets, RepoLocator, TargetError, TargetResult};
pub use types::{
    Dimension, ErrorNote, Evidence, EvidenceKind, JudicialOpinion, Persona, Score,
    ScoreOutOfRange, Stage, UnknownDimension,
};
