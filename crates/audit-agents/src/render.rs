//! Markdown rendering of an `AuditReport`.

use audit_engine::synthesis::{AuditReport, DimensionResult, DimensionVerdict, OverallScore};

/// Render the full report as markdown.
pub fn render_markdown(report: &AuditReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Audit Report: {}\n\n", report.target));
    out.push_str(&match report.overall_score {
        OverallScore::Evaluated { score } => format!("**Overall score:** {score:.2} / 5\n\n"),
        OverallScore::NotEvaluated => "**Overall score:** not evaluated\n\n".to_string(),
    });

    out.push_str("## Executive Summary\n\n");
    out.push_str(&report.executive_summary);
    out.push_str("\n\n");

    out.push_str("## Scorecard\n\n");
    out.push_str("| Dimension | Score | Notes |\n|---|---|---|\n");
    for dim in &report.dimensions {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            dim.name,
            score_cell(&dim.verdict),
            notes_cell(dim)
        ));
    }
    out.push('\n');

    out.push_str("## Dimension Breakdown\n\n");
    for dim in &report.dimensions {
        render_dimension(&mut out, dim);
    }

    out.push_str("## Remediation Plan\n\n");
    if report.remediation_plan.is_empty() {
        out.push_str("No dimension fell below its acceptable minimum.\n\n");
    } else {
        for (i, item) in report.remediation_plan.iter().enumerate() {
            out.push_str(&format!(
                "{}. **{}** ({:.2}, raised by {}): {}\n",
                i + 1,
                item.name,
                item.score,
                item.persona,
                item.guidance
            ));
        }
        out.push('\n');
    }

    if !report.diagnostics.is_empty() {
        out.push_str("## Diagnostics\n\n");
        for note in &report.diagnostics {
            out.push_str(&format!("- `{}` {}\n", note.node, note.message));
        }
        out.push('\n');
    }

    out
}

fn score_cell(verdict: &DimensionVerdict) -> String {
    match verdict {
        DimensionVerdict::Evaluated { score, .. } => format!("{score:.2}"),
        DimensionVerdict::NotEvaluated => "n/a".to_string(),
    }
}

fn notes_cell(dim: &DimensionResult) -> String {
    let mut notes = Vec::new();
    if let DimensionVerdict::Evaluated {
        overridden: true, ..
    } = dim.verdict
    {
        notes.push("safety override");
    }
    if dim.fact_supremacy_applied {
        notes.push("fact supremacy");
    }
    if dim.is_dissenting() {
        notes.push("dissent");
    }
    if !dim.verdict.is_evaluated() {
        notes.push("no opinions");
    }
    notes.join(", ")
}

fn render_dimension(out: &mut String, dim: &DimensionResult) {
    out.push_str(&format!("### {}\n\n", dim.name));

    match dim.verdict {
        DimensionVerdict::Evaluated {
            score,
            weighted_mean,
            overridden,
        } => {
            out.push_str(&format!("Score **{score:.2}** (weighted mean {weighted_mean:.2})"));
            if overridden {
                out.push_str(", capped by safety override");
            }
            out.push_str(".\n\n");
        }
        DimensionVerdict::NotEvaluated => {
            out.push_str("Not evaluated: no reviewer produced an opinion.\n\n");
            return;
        }
    }

    for op in &dim.opinions {
        out.push_str(&format!(
            "- **{}** ({}): {}\n",
            op.persona,
            op.score.value(),
            op.rationale
        ));
    }
    out.push('\n');

    if let Some(dissent) = &dim.dissent {
        out.push_str(&format!("> **Dissent** (spread {})\n", dissent.spread));
        for pos in &dissent.minority {
            out.push_str(&format!(
                "> - minority {} ({}): {}\n",
                pos.persona,
                pos.score.value(),
                pos.rationale
            ));
        }
        out.push('\n');
    }
}
