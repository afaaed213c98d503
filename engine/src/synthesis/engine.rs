//! Deterministic synthesis of opinions into the final report.
//!
//! Per dimension:
//! 1. keep one opinion per persona (the most severe when duplicated)
//! 2. cap Defense when every finding reports a missing artifact
//! 3. weighted mean over present personas
//! 4. safety override: any 1 on a safety-sensitive dimension forces 1
//! 5. dissent when the score spread reaches the threshold
//!
//! Nothing here depends on the order opinions or evidence were merged in:
//! every input is read through the canonical per-dimension views.

use std::collections::BTreeSet;

use tracing::debug;

use super::policy::SynthesisPolicy;
use super::report::{
    AuditReport, DimensionResult, DimensionVerdict, DissentRecord, OverallScore, Position,
    RemediationItem,
};
use crate::state::{AgentState, Dimension, Evidence, JudicialOpinion, Persona, Score};

/// Annotation appended to a Defense rationale capped by fact supremacy.
pub const OVERRULED_NOTE: &str = "(overruled: evidence artifact missing)";

/// Defense scores above this are capped when evidence is missing.
const FACT_SUPREMACY_CEILING: u8 = 2;

/// Maximum characters of rationale quoted in excerpts.
const EXCERPT_CHARS: usize = 160;

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Applies a [`SynthesisPolicy`] to merged state.
#[derive(Debug, Clone, Default)]
pub struct SynthesisEngine {
    policy: SynthesisPolicy,
}

impl SynthesisEngine {
    pub fn new(policy: SynthesisPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SynthesisPolicy {
        &self.policy
    }

    /// Build the report. Never fails; identical state gives an identical report.
    pub fn synthesize(&self, state: &AgentState) -> AuditReport {
        let mut dimensions: BTreeSet<Dimension> = self.policy.rubric().collect();
        dimensions.extend(state.opinions().iter().map(|o| o.dimension));

        // Overall is the mean of unrounded dimension scores, rounded once.
        let (results, scores): (Vec<DimensionResult>, Vec<Option<f64>>) = dimensions
            .into_iter()
            .map(|d| self.score_dimension(d, &state.opinions_for(d), &state.evidence_for(d)))
            .unzip();
        let scores: Vec<f64> = scores.into_iter().flatten().collect();
        let overall_score = if scores.is_empty() {
            OverallScore::NotEvaluated
        } else {
            OverallScore::Evaluated {
                score: round2(scores.iter().sum::<f64>() / scores.len() as f64),
            }
        };

        let remediation_plan = self.remediation_plan(&results);
        let diagnostics = state.errors().to_vec();
        let target = state.targets().repo.to_string();

        let executive_summary = executive_summary(
            &target,
            overall_score,
            &results,
            remediation_plan.len(),
            diagnostics.len(),
        );

        debug!(
            target = %target,
            evaluated = scores.len(),
            remediation = remediation_plan.len(),
            "Report synthesized"
        );

        AuditReport {
            target,
            executive_summary,
            overall_score,
            dimensions: results,
            diagnostics,
            remediation_plan,
        }
    }

    /// Score one dimension from its canonically ordered opinions and evidence.
    pub fn evaluate_dimension(
        &self,
        dimension: Dimension,
        opinions: &[&JudicialOpinion],
        evidence: &[&Evidence],
    ) -> DimensionResult {
        self.score_dimension(dimension, opinions, evidence).0
    }

    /// Like [`evaluate_dimension`](Self::evaluate_dimension), also returning
    /// the unrounded score of an evaluated dimension.
    fn score_dimension(
        &self,
        dimension: Dimension,
        opinions: &[&JudicialOpinion],
        evidence: &[&Evidence],
    ) -> (DimensionResult, Option<f64>) {
        let mut contributing = most_severe_per_persona(opinions);
        if contributing.is_empty() {
            return (DimensionResult::not_evaluated(dimension), None);
        }

        let rules = self.policy.dimension(dimension);

        let artifacts_missing = !evidence.is_empty() && evidence.iter().all(|e| !e.found);
        let mut fact_supremacy_applied = false;
        if self.policy.fact_supremacy && artifacts_missing {
            for op in contributing.iter_mut() {
                if op.persona == Persona::Defense && op.score.value() > FACT_SUPREMACY_CEILING {
                    op.score = Score::MIN;
                    op.rationale = format!("{} {}", op.rationale, OVERRULED_NOTE);
                    fact_supremacy_applied = true;
                }
            }
        }

        let total_weight: f64 = contributing
            .iter()
            .map(|o| self.policy.weight(o.persona))
            .sum();
        let weighted_sum: f64 = contributing
            .iter()
            .map(|o| f64::from(o.score.value()) * self.policy.weight(o.persona))
            .sum();
        let exact_mean = weighted_sum / total_weight;
        let weighted_mean = round2(exact_mean);

        let any_min = contributing.iter().any(|o| o.score.is_min());
        let (score, exact_score, overridden) =
            if rules.safety_sensitive && any_min && weighted_mean > 1.0 {
                (1.0, 1.0, true)
            } else {
                (weighted_mean, exact_mean, false)
            };

        let dissent = self.dissent(&contributing, rules.dissent_threshold);

        let rationale_excerpts = contributing
            .iter()
            .map(|o| format!("{}: {}", o.persona, excerpt(&o.rationale, EXCERPT_CHARS)))
            .collect();

        let result = DimensionResult {
            dimension,
            name: dimension.display_name().to_string(),
            verdict: DimensionVerdict::Evaluated {
                score,
                weighted_mean,
                overridden,
            },
            opinions: contributing,
            dissent,
            rationale_excerpts,
            fact_supremacy_applied,
        };
        (result, Some(exact_score))
    }

    /// Split contributing opinions into camps when the spread reaches `threshold`.
    fn dissent(&self, opinions: &[JudicialOpinion], threshold: u8) -> Option<DissentRecord> {
        let max = opinions.iter().map(|o| o.score.value()).max()?;
        let min = opinions.iter().map(|o| o.score.value()).min()?;
        let spread = max - min;
        if spread < threshold {
            return None;
        }

        let midpoint = f64::from(max + min) / 2.0;
        let (low, high): (Vec<&JudicialOpinion>, Vec<&JudicialOpinion>) = opinions
            .iter()
            .partition(|o| f64::from(o.score.value()) <= midpoint);

        let weight_of = |camp: &[&JudicialOpinion]| -> f64 {
            camp.iter().map(|o| self.policy.weight(o.persona)).sum()
        };
        let top_persona = |camp: &[&JudicialOpinion]| camp.iter().map(|o| o.persona).min();

        let low_weight = weight_of(&low);
        let high_weight = weight_of(&high);
        let low_is_majority = if low_weight != high_weight {
            low_weight > high_weight
        } else {
            // Both camps are non-empty here, so both have a top persona.
            top_persona(&low) < top_persona(&high)
        };

        let positions = |camp: &[&JudicialOpinion]| -> Vec<Position> {
            camp.iter().map(|o| Position::from(*o)).collect()
        };
        let (majority, minority) = if low_is_majority {
            (positions(&low), positions(&high))
        } else {
            (positions(&high), positions(&low))
        };

        Some(DissentRecord {
            spread,
            majority,
            minority,
        })
    }

    fn remediation_plan(&self, results: &[DimensionResult]) -> Vec<RemediationItem> {
        results
            .iter()
            .filter_map(|r| {
                let score = r.verdict.score()?;
                if score >= self.policy.dimension(r.dimension).acceptable_minimum {
                    return None;
                }
                // Opinions are in persona priority order; min_by_key keeps the
                // first of equal scores.
                let worst = r.opinions.iter().min_by_key(|o| o.score)?;
                Some(RemediationItem {
                    dimension: r.dimension,
                    name: r.name.clone(),
                    score,
                    persona: worst.persona,
                    guidance: worst.rationale.clone(),
                })
            })
            .collect()
    }
}

/// Keep one opinion per persona: lowest score, then smallest rationale.
/// Input must be in canonical order, which already sorts on exactly that.
fn most_severe_per_persona(opinions: &[&JudicialOpinion]) -> Vec<JudicialOpinion> {
    let mut out: Vec<JudicialOpinion> = Vec::with_capacity(Persona::ALL.len());
    for op in opinions {
        if out.iter().all(|kept| kept.persona != op.persona) {
            out.push((*op).clone());
        }
    }
    out.sort_by_key(|o| o.persona);
    out
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

fn executive_summary(
    target: &str,
    overall: OverallScore,
    results: &[DimensionResult],
    remediation: usize,
    diagnostics: usize,
) -> String {
    let evaluated = results.iter().filter(|r| r.verdict.is_evaluated()).count();
    let not_evaluated = results.len() - evaluated;
    let dissenting = results.iter().filter(|r| r.is_dissenting()).count();

    let headline = match overall {
        OverallScore::Evaluated { score } => format!(
            "Audit of {target} scored {score:.2}/5 across {evaluated} evaluated dimension(s)"
        ),
        OverallScore::NotEvaluated => {
            format!("Audit of {target} could not be scored: no dimension received an opinion")
        }
    };

    format!(
        "{headline}; {not_evaluated} not evaluated. {dissenting} dimension(s) show reviewer \
         dissent. {remediation} remediation item(s). {diagnostics} diagnostic(s) recorded."
    )
}
