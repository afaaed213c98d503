//! Wiring of investigators, reviewers, and policy into a `GraphExecutor`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::info;

use audit_engine::graph::{GraphExecutor, Reviewer};
use audit_engine::synthesis::SynthesisPolicy;
use audit_engine::SharedEventBus;

use crate::config::AuditorConfig;
use crate::investigators::{DocAnalyst, RepoInvestigator, VisionInspector};
use crate::reviewers::{tribunal, LlmScorer, RuleScorer};

/// Scoring backend for the reviewer personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReviewerBackend {
    /// Deterministic offline heuristics.
    #[default]
    Rules,
    /// OpenAI-compatible chat completions.
    Llm,
}

/// Load a policy file, or the built-in policy when `path` is `None`.
pub fn load_policy(path: Option<&Path>) -> Result<SynthesisPolicy> {
    match path {
        Some(path) => {
            let policy = SynthesisPolicy::load(path)
                .with_context(|| format!("loading policy {}", path.display()))?;
            info!(path = %path.display(), "Loaded synthesis policy");
            Ok(policy)
        }
        None => Ok(SynthesisPolicy::default()),
    }
}

/// The three persona reviewers on the chosen backend.
pub fn build_reviewers(
    backend: ReviewerBackend,
    config: &AuditorConfig,
) -> Result<Vec<Arc<dyn Reviewer>>> {
    Ok(match backend {
        ReviewerBackend::Rules => tribunal(Arc::new(RuleScorer)),
        ReviewerBackend::Llm => {
            if config.llm.api_key.is_none() {
                tracing::warn!(url = %config.llm.url, "No API key configured for LLM reviewers");
            }
            let scorer = LlmScorer::new(config.llm.clone()).context("building LLM scorer")?;
            tribunal(Arc::new(scorer))
        }
    })
}

/// Full audit graph: three investigators, three personas.
pub fn build_executor(
    config: &AuditorConfig,
    backend: ReviewerBackend,
    policy: SynthesisPolicy,
    bus: Option<SharedEventBus>,
) -> Result<GraphExecutor> {
    let mut executor = GraphExecutor::new()
        .with_policy(policy)
        .add_investigator(RepoInvestigator::new(config.max_commits, config.clone_depth))
        .add_investigator(DocAnalyst::new())
        .add_investigator(VisionInspector::new(config.clone_depth));

    for reviewer in build_reviewers(backend, config)? {
        executor = executor.add_reviewer_arc(reviewer);
    }
    if let Some(limit) = config.node_timeout {
        executor = executor.with_node_timeout(limit);
    }
    if let Some(bus) = bus {
        executor = executor.with_event_bus(bus);
    }
    Ok(executor)
}
