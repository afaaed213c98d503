//! Audit run phase machine: forward-only transitions with a timestamped log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::Stage;

/// Phase of an audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    /// State initialized, nothing spawned.
    Init,
    /// Investigators are running.
    Stage1Running,
    /// All investigators finished; evidence merged.
    Stage1Barrier,
    /// Reviewers are running.
    Stage2Running,
    /// All reviewers finished; opinions merged.
    Stage2Barrier,
    /// Report written. Terminal.
    Synthesized,
}

impl AuditPhase {
    /// Whether this is the terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synthesized)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [AuditPhase] {
        match self {
            Self::Init => &[Self::Stage1Running],
            Self::Stage1Running => &[Self::Stage1Barrier],
            Self::Stage1Barrier => &[Self::Stage2Running],
            Self::Stage2Running => &[Self::Stage2Barrier],
            Self::Stage2Barrier => &[Self::Synthesized],
            Self::Synthesized => &[],
        }
    }

    /// Running phase for a stage.
    pub fn running(stage: Stage) -> Self {
        match stage {
            Stage::Investigation => Self::Stage1Running,
            Stage::Deliberation => Self::Stage2Running,
        }
    }

    /// Barrier phase for a stage.
    pub fn barrier(stage: Stage) -> Self {
        match stage {
            Stage::Investigation => Self::Stage1Barrier,
            Stage::Deliberation => Self::Stage2Barrier,
        }
    }
}

impl std::fmt::Display for AuditPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Stage1Running => write!(f, "stage1_running"),
            Self::Stage1Barrier => write!(f, "stage1_barrier"),
            Self::Stage2Running => write!(f, "stage2_running"),
            Self::Stage2Barrier => write!(f, "stage2_barrier"),
            Self::Synthesized => write!(f, "synthesized"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: AuditPhase,
    pub to: AuditPhase,
    pub timestamp: DateTime<Utc>,
}

/// Error for invalid phase transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {from} -> {to} (allowed: {allowed:?})")]
pub struct TransitionError {
    pub from: AuditPhase,
    pub to: AuditPhase,
    pub allowed: Vec<AuditPhase>,
}

/// Current phase plus transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTracker {
    phase: AuditPhase,
    transitions: Vec<PhaseTransition>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: AuditPhase::Init,
            transitions: Vec::new(),
        }
    }

    pub fn phase(&self) -> AuditPhase {
        self.phase
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<PhaseTransition> {
        self.transitions
    }

    /// Move to `to`, recording the transition. Returns the record.
    pub fn transition(&mut self, to: AuditPhase) -> Result<PhaseTransition, TransitionError> {
        let allowed = self.phase.valid_transitions();
        if !allowed.contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                allowed: allowed.to_vec(),
            });
        }

        let record = PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
        };
        self.transitions.push(record.clone());
        self.phase = to;
        Ok(record)
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
