//! Core record types shared by investigators, reviewers, and synthesis.
//!
//! Every record here is a plain serde value. Records are built once by the
//! producing node and moved into a [`PartialUpdate`](super::PartialUpdate);
//! after merge the state store only ever hands out shared references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rubric dimension being judged.
///
/// Declaration order is the canonical report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    GitForensicAnalysis,
    StateManagementRigor,
    GraphOrchestration,
    SafeToolEngineering,
    StructuredOutputEnforcement,
    JudicialNuance,
    ChiefJusticeSynthesis,
    TheoreticalDepth,
    ReportAccuracy,
    SwarmVisual,
}

impl Dimension {
    /// All dimensions in canonical order.
    pub const ALL: [Dimension; 10] = [
        Self::GitForensicAnalysis,
        Self::StateManagementRigor,
        Self::GraphOrchestration,
        Self::SafeToolEngineering,
        Self::StructuredOutputEnforcement,
        Self::JudicialNuance,
        Self::ChiefJusticeSynthesis,
        Self::TheoreticalDepth,
        Self::ReportAccuracy,
        Self::SwarmVisual,
    ];

    /// Stable machine identifier (matches the serde form).
    pub fn id(self) -> &'static str {
        match self {
            Self::GitForensicAnalysis => "git_forensic_analysis",
            Self::StateManagementRigor => "state_management_rigor",
            Self::GraphOrchestration => "graph_orchestration",
            Self::SafeToolEngineering => "safe_tool_engineering",
            Self::StructuredOutputEnforcement => "structured_output_enforcement",
            Self::JudicialNuance => "judicial_nuance",
            Self::ChiefJusticeSynthesis => "chief_justice_synthesis",
            Self::TheoreticalDepth => "theoretical_depth",
            Self::ReportAccuracy => "report_accuracy",
            Self::SwarmVisual => "swarm_visual",
        }
    }

    /// Human-readable name used in reports.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::GitForensicAnalysis => "Git Forensic Analysis",
            Self::StateManagementRigor => "State Management Rigor",
            Self::GraphOrchestration => "Graph Orchestration",
            Self::SafeToolEngineering => "Safe Tool Engineering",
            Self::StructuredOutputEnforcement => "Structured Output Enforcement",
            Self::JudicialNuance => "Judicial Nuance",
            Self::ChiefJusticeSynthesis => "Chief Justice Synthesis",
            Self::TheoreticalDepth => "Theoretical Depth",
            Self::ReportAccuracy => "Report Accuracy",
            Self::SwarmVisual => "Swarm Visual",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Dimension {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.id() == needle)
            .ok_or_else(|| UnknownDimension(needle.to_string()))
    }
}

/// Returned when a dimension identifier does not name a rubric dimension.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rubric dimension: {0}")]
pub struct UnknownDimension(pub String);

/// Reviewer persona.
///
/// Declaration order is tie-break priority: the lead reviewer outranks the
/// prosecutor, who outranks the defense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Persona {
    TechLead,
    Prosecutor,
    Defense,
}

impl Persona {
    /// All personas in priority order (highest first).
    pub const ALL: [Persona; 3] = [Self::TechLead, Self::Prosecutor, Self::Defense];
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TechLead => write!(f, "TechLead"),
            Self::Prosecutor => write!(f, "Prosecutor"),
            Self::Defense => write!(f, "Defense"),
        }
    }
}

/// Category tag identifying what produced a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    GitHistory,
    StateManagement,
    GraphOrchestration,
    ToolSafety,
    StructuredOutput,
    JudicialNuance,
    SynthesisLogic,
    DocumentDepth,
    ReportClaims,
    VisualArtifacts,
}

impl EvidenceKind {
    /// Rubric dimension this kind of finding addresses by default.
    pub fn dimension(self) -> Dimension {
        match self {
            Self::GitHistory => Dimension::GitForensicAnalysis,
            Self::StateManagement => Dimension::StateManagementRigor,
            Self::GraphOrchestration => Dimension::GraphOrchestration,
            Self::ToolSafety => Dimension::SafeToolEngineering,
            Self::StructuredOutput => Dimension::StructuredOutputEnforcement,
            Self::JudicialNuance => Dimension::JudicialNuance,
            Self::SynthesisLogic => Dimension::ChiefJusticeSynthesis,
            Self::DocumentDepth => Dimension::TheoreticalDepth,
            Self::ReportClaims => Dimension::ReportAccuracy,
            Self::VisualArtifacts => Dimension::SwarmVisual,
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GitHistory => "git_history",
            Self::StateManagement => "state_management",
            Self::GraphOrchestration => "graph_orchestration",
            Self::ToolSafety => "tool_safety",
            Self::StructuredOutput => "structured_output",
            Self::JudicialNuance => "judicial_nuance",
            Self::SynthesisLogic => "synthesis_logic",
            Self::DocumentDepth => "document_depth",
            Self::ReportClaims => "report_claims",
            Self::VisualArtifacts => "visual_artifacts",
        };
        f.write_str(s)
    }
}

/// One atomic forensic finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Producing investigator category.
    pub kind: EvidenceKind,
    /// Rubric dimension the finding addresses.
    pub dimension: Dimension,
    /// Opaque locator: file path, commit hash, document reference.
    pub source: String,
    /// Free-form findings payload.
    pub content: String,
    /// Whether the sought artifact exists at all.
    pub found: bool,
    /// Producer confidence in `[0.0, 1.0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Short verbatim excerpt backing the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Evidence {
    /// Create a finding for the kind's default dimension.
    pub fn new(kind: EvidenceKind, source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            dimension: kind.dimension(),
            source: source.into(),
            content: content.into(),
            found: true,
            confidence: None,
            excerpt: None,
        }
    }

    /// Attribute the finding to a different dimension.
    pub fn for_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = dimension;
        self
    }

    /// Mark the sought artifact as absent.
    pub fn missing(mut self) -> Self {
        self.found = false;
        self
    }

    /// Set whether the sought artifact exists.
    pub fn with_found(mut self, found: bool) -> Self {
        self.found = found;
        self
    }

    /// Attach a confidence, clamped into `[0.0, 1.0]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        let c = if confidence.is_nan() { 0.0 } else { confidence };
        self.confidence = Some(c.clamp(0.0, 1.0));
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

/// Reviewer score, an integer in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(1);
    pub const MAX: Score = Score(5);

    /// Validate a raw score.
    pub fn new(value: u8) -> Result<Self, ScoreOutOfRange> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ScoreOutOfRange(value as i64))
        }
    }

    /// Clamp any integer into the valid range.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_min(self) -> bool {
        self == Self::MIN
    }
}

impl TryFrom<u8> for Score {
    type Error = ScoreOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returned for scores outside `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("score {0} is outside 1..=5")]
pub struct ScoreOutOfRange(pub i64);

/// One reviewer's verdict on one rubric dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudicialOpinion {
    pub persona: Persona,
    pub dimension: Dimension,
    pub score: Score,
    pub rationale: String,
    /// Sources of the evidence this opinion relies on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cited_evidence: Vec<String>,
}

impl JudicialOpinion {
    pub fn new(
        persona: Persona,
        dimension: Dimension,
        score: Score,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            persona,
            dimension,
            score,
            rationale: rationale.into(),
            cited_evidence: Vec::new(),
        }
    }

    pub fn citing(mut self, sources: impl IntoIterator<Item = String>) -> Self {
        self.cited_evidence.extend(sources);
        self
    }
}

/// Graph stage a node runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: evidence collection.
    Investigation,
    /// Stage 2: persona scoring.
    Deliberation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Investigation => write!(f, "investigation"),
            Self::Deliberation => write!(f, "deliberation"),
        }
    }
}

/// A non-fatal problem recorded during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNote {
    /// Name of the node the note concerns.
    pub node: String,
    pub message: String,
}

impl ErrorNote {
    pub fn new(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.node, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(Score::new(0).is_err());
        assert!(Score::new(6).is_err());
        assert_eq!(Score::new(1).unwrap(), Score::MIN);
        assert_eq!(Score::new(5).unwrap(), Score::MAX);
        assert_eq!(Score::saturating(-3), Score::MIN);
        assert_eq!(Score::saturating(42), Score::MAX);
    }

    #[test]
    fn test_score_deserialize_validates() {
        let ok: Score = serde_json::from_str("4").unwrap();
        assert_eq!(ok.value(), 4);
        assert!(serde_json::from_str::<Score>("9").is_err());
    }

    #[test]
    fn test_persona_priority_order() {
        assert!(Persona::TechLead < Persona::Prosecutor);
        assert!(Persona::Prosecutor < Persona::Defense);
        assert_eq!(Persona::ALL[0], Persona::TechLead);
    }

    #[test]
    fn test_dimension_parse_and_display() {
        for d in Dimension::ALL {
            assert_eq!(d.id().parse::<Dimension>().unwrap(), d);
            assert_eq!(serde_json::to_string(&d).unwrap(), format!("\"{}\"", d.id()));
        }
        assert!("not_a_dimension".parse::<Dimension>().is_err());
        assert_eq!(
            Dimension::GitForensicAnalysis.display_name(),
            "Git Forensic Analysis"
        );
    }

    #[test]
    fn test_evidence_builder() {
        let ev = Evidence::new(EvidenceKind::ToolSafety, "src/tools.py", "os.system found")
            .with_confidence(1.7)
            .missing();
        assert_eq!(ev.dimension, Dimension::SafeToolEngineering);
        assert_eq!(ev.confidence, Some(1.0));
        assert!(!ev.found);

        let moved = ev.for_dimension(Dimension::StateManagementRigor);
        assert_eq!(moved.dimension, Dimension::StateManagementRigor);
        assert_eq!(moved.kind, EvidenceKind::ToolSafety);
    }

    #[test]
    fn test_error_note_display() {
        let note = ErrorNote::new("repo_investigator", "clone failed");
        assert_eq!(note.to_string(), "[repo_investigator] clone failed");
    }
}
