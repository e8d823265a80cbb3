//! Plan and result display

use colored::Colorize;
use reconcile::{AttributeChange, changes};

use super::walker::{NodeOutcome, NodeResult, WalkSummary};

/// Display pending or applied changes
pub fn display_plan(results: &[NodeResult]) {
    let changed: Vec<_> = results
        .iter()
        .filter(|r| matches!(r.outcome, NodeOutcome::Pending | NodeOutcome::Applied { .. }))
        .collect();

    if changed.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Attribute Diff".bold()
    );
    println!("│");

    for result in changed {
        let symbol = if result.prior.is_empty() {
            "+".green()
        } else if result.desired.is_empty() {
            "-".red()
        } else {
            "~".yellow()
        };
        let target = format!(
            "({}: {}){}",
            result.provider,
            result.id.as_deref().unwrap_or("?"),
            if result.orphan { " [removed from config]" } else { "" }
        );
        let counts = result.changes();
        println!(
            "│ {} {} {} {}",
            symbol,
            result.name.bold(),
            target.dimmed(),
            format!(
                "+{} ~{} -{}",
                counts.added, counts.changed, counts.removed
            )
            .dimmed()
        );

        for change in changes(&result.prior, &result.desired) {
            match change {
                AttributeChange::Added { key, value } => {
                    println!("│     {} {} = {:?}", "+".green(), key, value);
                }
                AttributeChange::Changed { key, from, to } => {
                    println!(
                        "│     {} {}: {} → {:?}",
                        "~".yellow(),
                        key,
                        format!("{from:?}").dimmed(),
                        to
                    );
                }
                AttributeChange::Removed { key, value } => {
                    println!("│     {} {} {}", "-".red(), key, format!("= {value:?}").dimmed());
                }
            }
        }
        println!("│");
    }

    println!("└─────────────────────────────────────────────────────┘");
}

/// Display failed and skipped resources
pub fn display_problems(results: &[NodeResult]) {
    for result in results {
        match &result.outcome {
            NodeOutcome::Failed { error } => {
                eprintln!("  {} {}: {}", "✗".red(), result.name.bold(), error);
            }
            NodeOutcome::Skipped { reason } => {
                eprintln!("  {} {}: {}", "⊘".yellow(), result.name.bold(), reason.dimmed());
            }
            _ => {}
        }
    }
}

/// Print final summary
pub fn print_summary(summary: &WalkSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Attributes converged", "✓".green().bold());
    } else {
        println!("  {} Applied with errors", "⚠".yellow().bold());
    }

    if summary.applied > 0 {
        println!("    • {} resources updated", summary.applied);
    }
    if summary.unchanged > 0 {
        println!("    • {} resources unchanged", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
