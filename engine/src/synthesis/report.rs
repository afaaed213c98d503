//! Final audit report produced by synthesis.

use serde::{Deserialize, Serialize};

use crate::state::{Dimension, ErrorNote, JudicialOpinion, Persona, Score};

/// Overall score across evaluated dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OverallScore {
    Evaluated { score: f64 },
    NotEvaluated,
}

impl OverallScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Evaluated { score } => Some(*score),
            Self::NotEvaluated => None,
        }
    }
}

/// Outcome for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DimensionVerdict {
    Evaluated {
        /// Final score after overrides, two decimals.
        score: f64,
        /// Weighted mean before overrides, two decimals.
        weighted_mean: f64,
        /// Whether the safety rule replaced the weighted mean.
        overridden: bool,
    },
    /// No opinions were produced for the dimension.
    NotEvaluated,
}

impl DimensionVerdict {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Evaluated { score, .. } => Some(*score),
            Self::NotEvaluated => None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Evaluated { .. })
    }
}

/// A persona's position, recorded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub persona: Persona,
    pub score: Score,
    pub rationale: String,
}

impl From<&JudicialOpinion> for Position {
    fn from(op: &JudicialOpinion) -> Self {
        Self {
            persona: op.persona,
            score: op.score,
            rationale: op.rationale.clone(),
        }
    }
}

/// Split between reviewer camps on one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DissentRecord {
    /// `max - min` over the contributing scores.
    pub spread: u8,
    pub majority: Vec<Position>,
    pub minority: Vec<Position>,
}

/// Per-dimension section of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: Dimension,
    pub name: String,
    pub verdict: DimensionVerdict,
    /// One opinion per persona, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opinions: Vec<JudicialOpinion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissent: Option<DissentRecord>,
    /// Short `Persona: rationale` excerpts in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rationale_excerpts: Vec<String>,
    /// Set when a Defense score was capped because every finding for the
    /// dimension reports a missing artifact.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fact_supremacy_applied: bool,
}

impl DimensionResult {
    pub fn not_evaluated(dimension: Dimension) -> Self {
        Self {
            dimension,
            name: dimension.display_name().to_string(),
            verdict: DimensionVerdict::NotEvaluated,
            opinions: Vec::new(),
            dissent: None,
            rationale_excerpts: Vec::new(),
            fact_supremacy_applied: false,
        }
    }

    pub fn is_dissenting(&self) -> bool {
        self.dissent.is_some()
    }
}

/// One actionable item for a dimension below its acceptable minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationItem {
    pub dimension: Dimension,
    pub name: String,
    pub score: f64,
    /// Persona whose rationale is quoted.
    pub persona: Persona,
    pub guidance: String,
}

/// Synthesized audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub target: String,
    pub executive_summary: String,
    pub overall_score: OverallScore,
    /// Canonical dimension order.
    pub dimensions: Vec<DimensionResult>,
    /// Every error note from the run, in state order.
    pub diagnostics: Vec<ErrorNote>,
    pub remediation_plan: Vec<RemediationItem>,
}

impl AuditReport {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionResult> {
        self.dimensions.iter().find(|r| r.dimension == dimension)
    }

    pub fn evaluated_count(&self) -> usize {
        self.dimensions
            .iter()
            .filter(|r| r.verdict.is_evaluated())
            .count()
    }

    pub fn dissent_count(&self) -> usize {
        self.dimensions.iter().filter(|r| r.is_dissenting()).count()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
