//! Deterministic, offline scoring.
//!
//! Evidence quality `q` is the fraction of findings whose artifact was found,
//! times their mean confidence (0.5 when none is given). The lead maps it
//! straight onto the scale; the prosecutor sits one point lower and caps at 2
//! once anything is missing; the defense sits one point higher and never
//! drops below 3 unless nothing was found at all.

use async_trait::async_trait;

use audit_engine::graph::{NodeError, NodeResult};
use audit_engine::state::{Persona, Score};

use super::{OpinionScorer, ScoreRequest, ScoredOpinion};

const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

/// Summary statistics over one dimension's evidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvidenceQuality {
    pub total: usize,
    pub found: usize,
    pub mean_confidence: f64,
}

impl EvidenceQuality {
    pub fn measure(request: &ScoreRequest) -> Self {
        let total = request.evidence.len();
        let found = request.evidence.iter().filter(|e| e.found).count();
        let mean_confidence = if total == 0 {
            0.0
        } else {
            request
                .evidence
                .iter()
                .map(|e| e.confidence.unwrap_or(DEFAULT_CONFIDENCE))
                .sum::<f64>()
                / total as f64
        };
        Self {
            total,
            found,
            mean_confidence,
        }
    }

    pub fn quality(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.found as f64 / self.total as f64) * self.mean_confidence
    }

    pub fn missing(&self) -> usize {
        self.total - self.found
    }
}

/// Score for `persona` given measured evidence quality.
pub fn rule_score(persona: Persona, quality: &EvidenceQuality) -> Score {
    let base = 1 + (4.0 * quality.quality()).round() as i64;
    let raw = match persona {
        Persona::TechLead => base,
        Persona::Prosecutor if quality.missing() > 0 => (base - 1).min(2),
        Persona::Prosecutor => base - 1,
        Persona::Defense if quality.found == 0 => 3.min(base + 1).max(1),
        Persona::Defense => (base + 1).max(3),
    };
    Score::saturating(raw)
}

fn rationale(persona: Persona, request: &ScoreRequest, q: &EvidenceQuality) -> String {
    let dim = request.dimension.display_name();
    let stats = format!(
        "{} of {} finding(s) located, mean confidence {:.2}",
        q.found, q.total, q.mean_confidence
    );
    match persona {
        Persona::TechLead => format!("{dim}: {stats}; scored on what a maintainer would inherit."),
        Persona::Prosecutor if q.missing() > 0 => format!(
            "{dim}: {stats}; {} required artifact(s) absent, charged accordingly.",
            q.missing()
        ),
        Persona::Prosecutor => format!("{dim}: {stats}; no missing artifacts, residual doubt only."),
        Persona::Defense if q.found == 0 => {
            format!("{dim}: {stats}; the investigation itself shows intent worth credit.")
        }
        Persona::Defense => format!("{dim}: {stats}; effort is evident and deserves credit."),
    }
}

#[async_trait]
impl OpinionScorer for RuleScorer {
    fn backend(&self) -> &str {
        "rules"
    }

    async fn score(&self, request: &ScoreRequest) -> NodeResult<ScoredOpinion> {
        if request.evidence.is_empty() {
            return Err(NodeError::InvalidOutput(format!(
                "no evidence to score for {}",
                request.dimension
            )));
        }
        let quality = EvidenceQuality::measure(request);
        Ok(ScoredOpinion {
            score: rule_score(request.persona, &quality),
            rationale: rationale(request.persona, request, &quality),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_engine::state::{Dimension, Evidence, EvidenceKind};

    fn request(persona: Persona, evidence: Vec<Evidence>) -> ScoreRequest {
        ScoreRequest {
            persona,
            dimension: Dimension::GraphOrchestration,
            evidence,
        }
    }

    fn quality(total: usize, found: usize, conf: f64) -> EvidenceQuality {
        EvidenceQuality {
            total,
            found,
            mean_confidence: conf,
        }
    }

    #[test]
    fn test_strong_evidence() {
        let q = quality(2, 2, 0.9);
        assert_eq!(rule_score(Persona::TechLead, &q).value(), 5);
        assert_eq!(rule_score(Persona::Prosecutor, &q).value(), 4);
        assert_eq!(rule_score(Persona::Defense, &q).value(), 5);
    }

    #[test]
    fn test_nothing_found() {
        let q = quality(1, 0, 0.8);
        assert_eq!(rule_score(Persona::TechLead, &q).value(), 1);
        assert_eq!(rule_score(Persona::Prosecutor, &q).value(), 1);
        assert_eq!(rule_score(Persona::Defense, &q).value(), 2);
    }

    #[test]
    fn test_partial_evidence_caps_prosecutor() {
        // q = 0.5 * 0.9 = 0.45 -> base 3
        let q = quality(2, 1, 0.9);
        assert_eq!(rule_score(Persona::TechLead, &q).value(), 3);
        assert_eq!(rule_score(Persona::Prosecutor, &q).value(), 2);
        assert_eq!(rule_score(Persona::Defense, &q).value(), 4);
    }

    #[tokio::test]
    async fn test_scorer_is_deterministic() {
        let ev = vec![
            Evidence::new(EvidenceKind::GraphOrchestration, "repo", "fan-out").with_confidence(0.7),
        ];
        let req = request(Persona::Defense, ev);
        let first = RuleScorer.score(&req).await.unwrap();
        let second = RuleScorer.score(&req).await.unwrap();
        assert_eq!(first, second);
        assert!(first.rationale.starts_with("Graph Orchestration"));
    }

    #[tokio::test]
    async fn test_empty_evidence_is_error() {
        let err = RuleScorer.score(&request(Persona::TechLead, vec![])).await;
        assert!(matches!(err, Err(NodeError::InvalidOutput(_))));
    }
}
