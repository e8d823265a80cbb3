//! Progress indicators for attune CLI.

use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::walker::{NodeOutcome, NodeResult, WalkProgress};

/// A bar that advances once per evaluated resource
pub fn walk_bar(len: u64, message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(message.to_string());
    pb
}

impl WalkProgress for ProgressBar {
    fn on_node_complete(&self, result: &NodeResult) {
        let symbol = match &result.outcome {
            NodeOutcome::Converged => "○",
            NodeOutcome::Pending => "~",
            NodeOutcome::Applied { .. } => "✓",
            NodeOutcome::Failed { .. } => "✗",
            NodeOutcome::Skipped { .. } => "⊘",
        };
        self.set_message(format!("{} {}", symbol, result.name));
        self.inc(1);
    }
}
