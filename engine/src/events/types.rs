//! Event types for audit runs
//!
//! Published by the executor as a run moves through its phases. Consumers
//! (CLI progress logging, tests) observe them through the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::AuditPhase;
use crate::state::Stage;

/// All audit run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A run was started against a target
    RunStarted {
        run_id: Uuid,
        target: String,
        investigators: usize,
        reviewers: usize,
        timestamp: DateTime<Utc>,
    },

    /// The phase machine moved forward
    PhaseChanged {
        run_id: Uuid,
        from: AuditPhase,
        to: AuditPhase,
        timestamp: DateTime<Utc>,
    },

    /// A node task was spawned
    NodeStarted {
        run_id: Uuid,
        node: String,
        stage: Stage,
        timestamp: DateTime<Utc>,
    },

    /// A node returned a contribution
    NodeCompleted {
        run_id: Uuid,
        node: String,
        stage: Stage,
        evidence: usize,
        opinions: usize,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A node errored, timed out, or panicked
    NodeFailed {
        run_id: Uuid,
        node: String,
        stage: Stage,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Synthesis wrote the report
    ReportSynthesized {
        run_id: Uuid,
        overall_score: Option<f64>,
        dimensions_evaluated: usize,
        dissent_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuditEvent::RunStarted { timestamp, .. } => *timestamp,
            AuditEvent::PhaseChanged { timestamp, .. } => *timestamp,
            AuditEvent::NodeStarted { timestamp, .. } => *timestamp,
            AuditEvent::NodeCompleted { timestamp, .. } => *timestamp,
            AuditEvent::NodeFailed { timestamp, .. } => *timestamp,
            AuditEvent::ReportSynthesized { timestamp, .. } => *timestamp,
        }
    }

    /// Get the run ID of this event
    pub fn run_id(&self) -> Uuid {
        match self {
            AuditEvent::RunStarted { run_id, .. }
            | AuditEvent::PhaseChanged { run_id, .. }
            | AuditEvent::NodeStarted { run_id, .. }
            | AuditEvent::NodeCompleted { run_id, .. }
            | AuditEvent::NodeFailed { run_id, .. }
            | AuditEvent::ReportSynthesized { run_id, .. } => *run_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::RunStarted { .. } => "run_started",
            AuditEvent::PhaseChanged { .. } => "phase_changed",
            AuditEvent::NodeStarted { .. } => "node_started",
            AuditEvent::NodeCompleted { .. } => "node_completed",
            AuditEvent::NodeFailed { .. } => "node_failed",
            AuditEvent::ReportSynthesized { .. } => "report_synthesized",
        }
    }

    /// Get the node name if this event concerns a single node
    pub fn node(&self) -> Option<&str> {
        match self {
            AuditEvent::NodeStarted { node, .. }
            | AuditEvent::NodeCompleted { node, .. }
            | AuditEvent::NodeFailed { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Get the stage if this event concerns a single node
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AuditEvent::NodeStarted { stage, .. }
            | AuditEvent::NodeCompleted { stage, .. }
            | AuditEvent::NodeFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
