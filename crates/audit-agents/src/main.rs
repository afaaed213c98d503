use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use audit_agents::{build_executor, load_policy, render_markdown, AuditorConfig, ReviewerBackend};
use audit_engine::events::{AuditEvent, EventFilter, FilteredReceiver};
use audit_engine::state::AuditTargets;
use audit_engine::EventBus;

/// Audit a repository with adversarial reviewer personas.
#[derive(Debug, Parser)]
#[command(name = "automaton-auditor", version)]
struct Args {
    /// Repository URL or local path.
    #[arg(long)]
    repo: String,

    /// Supplementary document (repeatable).
    #[arg(long = "doc")]
    docs: Vec<PathBuf>,

    /// Synthesis policy TOML.
    #[arg(long)]
    policy: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ReviewerBackend::Rules)]
    reviewer: ReviewerBackend,

    /// Per-node timeout; 0 disables. Overrides AUDITOR_NODE_TIMEOUT_SECS.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long, default_value = "audit")]
    out_dir: PathBuf,

    /// Also print the JSON report to stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!(error = %format!("{e:#}"), "Audit aborted");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = AuditorConfig::default();
    if let Some(secs) = args.timeout_secs {
        config = config.with_node_timeout_secs(secs);
    }

    let targets = AuditTargets::parse(&args.repo, args.docs.clone()).context("invalid audit target")?;
    let policy = load_policy(args.policy.as_deref())?;

    info!(
        repo = %targets.repo,
        documents = targets.documents.len(),
        reviewer = ?args.reviewer,
        model = %config.llm.model,
        "Automaton auditor starting"
    );

    let bus = EventBus::new().shared();
    let progress = spawn_progress_logger(bus.subscribe_filtered(EventFilter::progress()));

    let executor = build_executor(&config, args.reviewer, policy, Some(bus.clone()))?;
    let run = executor.run(targets).await.context("audit run failed")?;
    drop(executor);
    drop(bus);
    if let Err(e) = progress.await {
        warn!(error = %e, "Progress logger ended abnormally");
    }

    let report = run.report();
    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let json = report.to_json_pretty().context("serializing report")?;
    let md_path = args.out_dir.join("report.md");
    let json_path = args.out_dir.join("report.json");
    tokio::fs::write(&md_path, render_markdown(report))
        .await
        .with_context(|| format!("writing {}", md_path.display()))?;
    tokio::fs::write(&json_path, &json)
        .await
        .with_context(|| format!("writing {}", json_path.display()))?;

    for failed in run.summary.failed_nodes() {
        warn!(node = %failed.node, outcome = ?failed.outcome, "Node did not complete");
    }
    info!(
        overall = ?report.overall_score.value(),
        evaluated = report.evaluated_count(),
        dissent = report.dissent_count(),
        elapsed_ms = run.summary.elapsed_ms(),
        markdown = %md_path.display(),
        "Audit complete"
    );

    if args.json {
        println!("{json}");
    }
    Ok(())
}

/// Log phase changes and node outcomes until the bus closes.
fn spawn_progress_logger(mut progress: FilteredReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = progress.next().await {
            match event {
                AuditEvent::PhaseChanged { from, to, .. } => {
                    info!(?from, ?to, "Phase changed");
                }
                AuditEvent::NodeCompleted {
                    node,
                    evidence,
                    opinions,
                    elapsed_ms,
                    ..
                } => {
                    info!(%node, evidence, opinions, elapsed_ms, "Node completed");
                }
                AuditEvent::NodeFailed { node, error, .. } => {
                    warn!(%node, %error, "Node failed");
                }
                _ => {}
            }
        }
    })
}
