//! Synthesis: turns merged opinions into the final report.
//!
//! - `policy`: injected weights, safety-sensitive set, dissent thresholds
//! - `engine`: the deterministic scoring and conflict-resolution pass
//! - `report`: serializable report types

pub mod engine;
pub mod policy;
pub mod report;

pub use engine::{round2, SynthesisEngine, OVERRULED_NOTE};
pub use policy::{
    DimensionPolicy, PolicyError, PolicyResult, SynthesisPolicy, DEFAULT_ACCEPTABLE_MINIMUM,
    DEFAULT_DISSENT_THRESHOLD,
};
pub use report::{
    AuditReport, DimensionResult, DimensionVerdict, DissentRecord, OverallScore, Position,
    RemediationItem,
};
