//! LLM-backed scoring over an OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use audit_engine::graph::{NodeError, NodeResult};
use audit_engine::state::Score;

use super::{OpinionScorer, ScoreRequest, ScoredOpinion};
use crate::config::LlmEndpoint;
use crate::prompts;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_EVIDENCE_CHARS: usize = 1200;

pub struct LlmScorer {
    endpoint: LlmEndpoint,
    client: reqwest::Client,
}

impl LlmScorer {
    pub fn new(endpoint: LlmEndpoint) -> NodeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NodeError::Unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &LlmEndpoint {
        &self.endpoint
    }
}

/// User prompt listing the dimension and its evidence.
pub fn user_prompt(request: &ScoreRequest) -> String {
    let evidence = request
        .evidence
        .iter()
        .map(|e| {
            let content: String = e.content.chars().take(MAX_EVIDENCE_CHARS).collect();
            let confidence = e
                .confidence
                .map(|c| format!("{c:.2}"))
                .unwrap_or_else(|| "n/a".into());
            let mut line = format!(
                "- [{}] source={} found={} confidence={}\n  {}",
                e.kind, e.source, e.found, confidence, content
            );
            if let Some(excerpt) = &e.excerpt {
                line.push_str(&format!("\n  excerpt: {excerpt}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "## Dimension\n\n{} ({})\n\n## Evidence\n\n{}\n\nScore this dimension from 1 to 5.",
        request.dimension.display_name(),
        request.dimension.id(),
        evidence
    )
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: f64,
    rationale: String,
}

/// Parse a model reply into a verdict.
///
/// Accepts bare JSON or JSON wrapped in prose or a code fence. The score must
/// be an integer in `1..=5` and the rationale non-empty.
pub fn parse_verdict(reply: &str) -> NodeResult<ScoredOpinion> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(NodeError::InvalidOutput(format!(
                "no JSON object in reply: {}",
                reply.chars().take(80).collect::<String>()
            )))
        }
    };

    let raw: RawVerdict = serde_json::from_str(json)
        .map_err(|e| NodeError::InvalidOutput(format!("malformed verdict: {e}")))?;

    if raw.score.fract() != 0.0 {
        return Err(NodeError::InvalidOutput(format!(
            "score {} is not an integer",
            raw.score
        )));
    }
    if !(1.0..=5.0).contains(&raw.score) {
        return Err(NodeError::InvalidOutput(format!(
            "score {} is outside 1..=5",
            raw.score
        )));
    }
    let score = Score::new(raw.score as u8).map_err(|e| NodeError::InvalidOutput(e.to_string()))?;

    let rationale = raw.rationale.trim();
    if rationale.is_empty() {
        return Err(NodeError::InvalidOutput("empty rationale".into()));
    }

    Ok(ScoredOpinion {
        score,
        rationale: rationale.to_string(),
    })
}

#[async_trait]
impl OpinionScorer for LlmScorer {
    fn backend(&self) -> &str {
        &self.endpoint.model
    }

    async fn score(&self, request: &ScoreRequest) -> NodeResult<ScoredOpinion> {
        let request_body = serde_json::json!({
            "model": self.endpoint.model,
            "messages": [
                {"role": "system", "content": prompts::system_prompt(request.persona)},
                {"role": "user", "content": user_prompt(request)}
            ],
            "max_tokens": 512,
            "temperature": 0.1,
            "response_format": {"type": "json_object"}
        });

        let mut builder = self
            .client
            .post(self.endpoint.completions_url())
            .header("Content-Type", "application/json")
            .json(&request_body);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NodeError::Inference(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NodeError::Inference(format!(
                "endpoint error ({status}): {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NodeError::InvalidOutput(format!("response is not JSON: {e}")))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("");

        debug!(
            persona = %request.persona,
            dimension = %request.dimension,
            prompt_version = prompts::PROMPT_VERSION,
            reply_len = content.len(),
            "Model replied"
        );
        parse_verdict(content)
    }
}
