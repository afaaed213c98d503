//! Accumulated audit state with field-level merge policy.
//!
//! | Field      | Policy                                        |
//! |------------|-----------------------------------------------|
//! | `targets`  | set once by [`AgentState::initialize`]        |
//! | `evidence` | append-merge, duplicates kept                 |
//! | `opinions` | append-merge                                  |
//! | `errors`   | append-merge, completion order                |
//! | `report`   | last-write, only via [`AgentState::finalize`] |
//!
//! Nodes never touch the store. They return a [`PartialUpdate`] and the
//! executor applies it through [`StateStore::apply`], the single point of
//! serialization for concurrent branches.

use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::targets::AuditTargets;
use super::types::{Dimension, ErrorNote, Evidence, JudicialOpinion};
use crate::synthesis::AuditReport;

/// Error type for state store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Contribution returned by a node. Carries append-merge fields only, so no
/// node can write the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialUpdate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opinions: Vec<JudicialOpinion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorNote>,
}

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evidence(mut self, evidence: impl IntoIterator<Item = Evidence>) -> Self {
        self.evidence.extend(evidence);
        self
    }

    pub fn with_opinions(mut self, opinions: impl IntoIterator<Item = JudicialOpinion>) -> Self {
        self.opinions.extend(opinions);
        self
    }

    pub fn with_error(mut self, note: ErrorNote) -> Self {
        self.errors.push(note);
        self
    }

    pub fn with_errors(mut self, notes: impl IntoIterator<Item = ErrorNote>) -> Self {
        self.errors.extend(notes);
        self
    }

    /// Concatenate two updates. Associative; commutative up to ordering of
    /// the `errors` list.
    pub fn combine(mut self, other: PartialUpdate) -> PartialUpdate {
        self.evidence.extend(other.evidence);
        self.opinions.extend(other.opinions);
        self.errors.extend(other.errors);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty() && self.opinions.is_empty() && self.errors.is_empty()
    }
}

/// Shared state for one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    targets: AuditTargets,
    evidence: Vec<Evidence>,
    opinions: Vec<JudicialOpinion>,
    errors: Vec<ErrorNote>,
    report: Option<AuditReport>,
}

impl AgentState {
    /// Fresh state for a run. Targets are read-only from here on.
    pub fn initialize(targets: AuditTargets) -> Self {
        Self {
            targets,
            evidence: Vec::new(),
            opinions: Vec::new(),
            errors: Vec::new(),
            report: None,
        }
    }

    /// Pure merge of one partial update.
    pub fn merge(mut self, update: PartialUpdate) -> Self {
        self.merge_in_place(update);
        self
    }

    fn merge_in_place(&mut self, update: PartialUpdate) {
        self.evidence.extend(update.evidence);
        self.opinions.extend(update.opinions);
        self.errors.extend(update.errors);
    }

    pub fn targets(&self) -> &AuditTargets {
        &self.targets
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    pub fn opinions(&self) -> &[JudicialOpinion] {
        &self.opinions
    }

    pub fn errors(&self) -> &[ErrorNote] {
        &self.errors
    }

    /// `None` until synthesis has run.
    pub fn report(&self) -> Option<&AuditReport> {
        self.report.as_ref()
    }

    /// Evidence for one dimension in canonical order.
    pub fn evidence_for(&self, dimension: Dimension) -> Vec<&Evidence> {
        let mut out: Vec<&Evidence> = self
            .evidence
            .iter()
            .filter(|e| e.dimension == dimension)
            .collect();
        out.sort_by(|a, b| compare_evidence(a, b));
        out
    }

    /// Opinions for one dimension in canonical order.
    pub fn opinions_for(&self, dimension: Dimension) -> Vec<&JudicialOpinion> {
        let mut out: Vec<&JudicialOpinion> = self
            .opinions
            .iter()
            .filter(|o| o.dimension == dimension)
            .collect();
        out.sort_by(|a, b| compare_opinions(a, b));
        out
    }

    /// All evidence sorted into canonical order. Two states that merged the
    /// same contributions in any order yield equal vectors.
    pub fn canonical_evidence(&self) -> Vec<Evidence> {
        let mut out = self.evidence.clone();
        out.sort_by(compare_evidence);
        out
    }

    /// All opinions sorted into canonical order.
    pub fn canonical_opinions(&self) -> Vec<JudicialOpinion> {
        let mut out = self.opinions.clone();
        out.sort_by(compare_opinions);
        out
    }

    /// Write the report and freeze the state.
    pub fn finalize(mut self, report: AuditReport) -> FinalState {
        self.report = Some(report.clone());
        FinalState {
            state: self,
            report,
        }
    }
}

/// Terminal, immutable state of a run. The report is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FinalState {
    state: AgentState,
    #[serde(skip)]
    report: AuditReport,
}

impl FinalState {
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn report(&self) -> &AuditReport {
        &self.report
    }

    pub fn into_report(self) -> AuditReport {
        self.report
    }
}

/// Canonical evidence ordering: dimension, kind, source, content, then the
/// remaining fields.
pub fn compare_evidence(a: &Evidence, b: &Evidence) -> Ordering {
    a.dimension
        .cmp(&b.dimension)
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.content.cmp(&b.content))
        .then_with(|| a.found.cmp(&b.found))
        .then_with(|| {
            let ca = a.confidence.unwrap_or(-1.0);
            let cb = b.confidence.unwrap_or(-1.0);
            ca.total_cmp(&cb)
        })
        .then_with(|| a.excerpt.cmp(&b.excerpt))
}

/// Canonical opinion ordering: dimension, persona priority, score, rationale.
pub fn compare_opinions(a: &JudicialOpinion, b: &JudicialOpinion) -> Ordering {
    a.dimension
        .cmp(&b.dimension)
        .then_with(|| a.persona.cmp(&b.persona))
        .then_with(|| a.score.cmp(&b.score))
        .then_with(|| a.rationale.cmp(&b.rationale))
        .then_with(|| a.cited_evidence.cmp(&b.cited_evidence))
}

/// Shared reference to StateStore
pub type SharedStateStore = Arc<StateStore>;

/// Serialization point for concurrent partial updates.
pub struct StateStore {
    state: RwLock<AgentState>,
}

impl StateStore {
    pub fn new(state: AgentState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedStateStore {
        Arc::new(self)
    }

    /// Append an update under the write lock.
    pub fn apply(&self, update: PartialUpdate) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        state.merge_in_place(update);
        Ok(())
    }

    /// Immutable copy of the current state for handing to nodes.
    pub fn snapshot(&self) -> StoreResult<Arc<AgentState>> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Arc::new(state.clone()))
    }

    /// Consume the store and return the merged state.
    pub fn into_inner(self) -> StoreResult<AgentState> {
        self.state.into_inner().map_err(|_| StoreError::LockPoisoned)
    }
}
