//! `attune apply` - converge resources to their declared attributes

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;

use crate::Context;
use crate::engine::display::{display_plan, display_problems, print_summary};
use crate::engine::{Walk, WalkOptions, record_results};
use crate::paths;
use crate::schema::AttuneConfig;
use crate::state::AttuneState;
use crate::ui;

pub fn run(
    ctx: &Context,
    target: Option<&str>,
    dry_run: bool,
    yes: bool,
    jobs: usize,
) -> Result<()> {
    let config = AttuneConfig::load(&ctx.config_file()?)?;
    let state_path = paths::state_file()?;
    let mut state = AttuneState::load(&state_path)?;

    // 1. Preview
    let preview_opts = WalkOptions { dry_run: true, jobs };
    let preview = super::evaluate(ctx, &config, &state, target, &preview_opts)?;
    display_plan(&preview.results);
    display_problems(&preview.results);

    if !preview.summary.has_changes() {
        if !preview.summary.is_success() {
            bail!(
                "{} could not be evaluated",
                ui::plural(preview.summary.failed + preview.summary.skipped, "resource")
            );
        }
        return Ok(());
    }

    if !preview.summary.is_success() {
        ui::warn("Some resources could not be evaluated; they will be skipped");
    }

    if dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    // 2. Confirm (unless --yes)
    if !yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    // 3. Apply and persist
    let walk = converge(ctx, &config, &mut state, target, jobs)?;
    state
        .touch(&state_path)
        .context("Attributes were applied but the state file could not be saved")?;

    display_problems(&walk.results);
    print_summary(&walk.summary);

    if !walk.summary.is_success() {
        bail!(
            "{} did not converge; run apply again to retry",
            ui::plural(walk.summary.failed + walk.summary.skipped, "resource")
        );
    }
    Ok(())
}

/// Apply for real and record every converged resource in `state`
fn converge(
    ctx: &Context,
    config: &AttuneConfig,
    state: &mut AttuneState,
    target: Option<&str>,
    jobs: usize,
) -> Result<Walk> {
    let opts = WalkOptions {
        dry_run: false,
        jobs,
    };
    let walk = super::evaluate(ctx, config, state, target, &opts)?;
    let recorded = record_results(state, &walk.results);
    log::debug!("Recorded {} resources in state", recorded);
    Ok(walk)
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}
