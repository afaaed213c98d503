//! Concrete collaborators for the audit engine.
//!
//! Investigators gather evidence from a repository and its documents;
//! persona reviewers score it; `pipeline` wires both into a
//! `GraphExecutor`; `render` turns the synthesized report into markdown.

pub mod config;
pub mod investigators;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod reviewers;

pub use config::{AuditorConfig, LlmEndpoint};
pub use pipeline::{build_executor, build_reviewers, load_policy, ReviewerBackend};
pub use render::render_markdown;
