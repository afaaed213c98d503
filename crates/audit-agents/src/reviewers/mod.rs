//! Stage 2 reviewer personas.
//!
//! A `PersonaReviewer` walks every dimension that has evidence and asks its
//! `OpinionScorer` for a score. Scoring backends:
//!
//! - `RuleScorer`: deterministic heuristics over evidence presence and confidence
//! - `LlmScorer`: OpenAI-compatible chat completions with persona prompts

pub mod llm;
pub mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use audit_engine::graph::{Deliberation, NodeResult, Reviewer, ReviewerView};
use audit_engine::state::{Dimension, ErrorNote, Evidence, JudicialOpinion, Persona, Score};

pub use llm::{parse_verdict, LlmScorer};
pub use rules::RuleScorer;

/// Everything a scorer sees for one dimension.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub persona: Persona,
    pub dimension: Dimension,
    pub evidence: Vec<Evidence>,
}

/// A scorer's verdict for one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredOpinion {
    pub score: Score,
    pub rationale: String,
}

#[async_trait]
pub trait OpinionScorer: Send + Sync {
    /// Backend label for logs.
    fn backend(&self) -> &str;

    async fn score(&self, request: &ScoreRequest) -> NodeResult<ScoredOpinion>;
}

#[async_trait]
impl<S: OpinionScorer + ?Sized> OpinionScorer for Arc<S> {
    fn backend(&self) -> &str {
        (**self).backend()
    }

    async fn score(&self, request: &ScoreRequest) -> NodeResult<ScoredOpinion> {
        (**self).score(request).await
    }
}

/// One persona backed by a scorer.
pub struct PersonaReviewer<S> {
    name: String,
    persona: Persona,
    scorer: S,
}

impl<S: OpinionScorer> PersonaReviewer<S> {
    pub fn new(persona: Persona, scorer: S) -> Self {
        let name = match persona {
            Persona::TechLead => "tech_lead",
            Persona::Prosecutor => "prosecutor",
            Persona::Defense => "defense",
        };
        Self {
            name: name.into(),
            persona,
            scorer,
        }
    }
}

/// All three personas sharing one scorer.
pub fn tribunal<S>(scorer: Arc<S>) -> Vec<Arc<dyn Reviewer>>
where
    S: OpinionScorer + 'static,
{
    Persona::ALL
        .iter()
        .map(|p| Arc::new(PersonaReviewer::new(*p, scorer.clone())) as Arc<dyn Reviewer>)
        .collect()
}

#[async_trait]
impl<S: OpinionScorer> Reviewer for PersonaReviewer<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn persona(&self) -> Persona {
        self.persona
    }

    async fn review(&self, view: &ReviewerView) -> NodeResult<Deliberation> {
        let mut deliberation = Deliberation::default();

        for dimension in view.dimensions_with_evidence() {
            let evidence: Vec<Evidence> =
                view.evidence_for(dimension).into_iter().cloned().collect();
            let sources: Vec<String> = evidence.iter().map(|e| e.source.clone()).collect();
            let request = ScoreRequest {
                persona: self.persona,
                dimension,
                evidence,
            };

            match self.scorer.score(&request).await {
                Ok(scored) => {
                    debug!(
                        node = %self.name,
                        dimension = %dimension,
                        score = scored.score.value(),
                        backend = self.scorer.backend(),
                        "Scored dimension"
                    );
                    let mut cited = sources;
                    cited.sort();
                    cited.dedup();
                    deliberation.push(
                        JudicialOpinion::new(self.persona, dimension, scored.score, scored.rationale)
                            .citing(cited),
                    );
                }
                Err(e) => {
                    warn!(node = %self.name, dimension = %dimension, error = %e, "Scoring failed");
                    deliberation.note(ErrorNote::new(&self.name, format!("{dimension}: {e}")));
                }
            }
        }

        Ok(deliberation)
    }
}
