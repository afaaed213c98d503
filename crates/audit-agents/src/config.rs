//! Runtime configuration: environment variables over built-in defaults.
//!
//! CLI flags are layered on top in `main.rs`.

use std::time::Duration;

/// Base URL of the OpenAI-compatible endpoint (without `/chat/completions`).
pub const ENV_LLM_URL: &str = "AUDITOR_LLM_URL";
/// Model name sent in each request.
pub const ENV_LLM_MODEL: &str = "AUDITOR_LLM_MODEL";
/// Bearer token; falls back to `OPENAI_API_KEY`.
pub const ENV_LLM_API_KEY: &str = "AUDITOR_LLM_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Per-node timeout in seconds. `0` disables the timeout.
pub const ENV_NODE_TIMEOUT_SECS: &str = "AUDITOR_NODE_TIMEOUT_SECS";
/// Number of commits mined from `git log`.
pub const ENV_MAX_COMMITS: &str = "AUDITOR_MAX_COMMITS";

const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o";
const DEFAULT_NODE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_COMMITS: usize = 50;
const DEFAULT_CLONE_DEPTH: u32 = 50;

/// OpenAI-compatible inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmEndpoint {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl LlmEndpoint {
    /// Full URL of the chat completions route.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.url.trim_end_matches('/'))
    }
}

/// Top-level auditor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditorConfig {
    pub llm: LlmEndpoint,
    /// `None` runs nodes without a deadline.
    pub node_timeout: Option<Duration>,
    /// Commits mined from history.
    pub max_commits: usize,
    /// `--depth` for remote clones. Must cover `max_commits` to see them.
    pub clone_depth: u32,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl AuditorConfig {
    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup(ENV_LLM_API_KEY)
            .or_else(|| lookup(ENV_OPENAI_API_KEY))
            .filter(|k| !k.trim().is_empty());

        let timeout_secs = lookup(ENV_NODE_TIMEOUT_SECS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_NODE_TIMEOUT_SECS);

        let max_commits = lookup(ENV_MAX_COMMITS)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_COMMITS);

        let clone_depth = u32::try_from(max_commits).unwrap_or(u32::MAX);

        Self {
            llm: LlmEndpoint {
                url: lookup(ENV_LLM_URL).unwrap_or_else(|| DEFAULT_LLM_URL.into()),
                model: lookup(ENV_LLM_MODEL).unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
                api_key,
            },
            node_timeout: timeout_from_secs(timeout_secs),
            max_commits,
            clone_depth: DEFAULT_CLONE_DEPTH.max(clone_depth),
        }
    }

    pub fn with_node_timeout_secs(mut self, secs: u64) -> Self {
        self.node_timeout = timeout_from_secs(secs);
        self
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
