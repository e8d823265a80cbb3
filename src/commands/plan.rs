//! `attune plan` - preview attribute changes without calling providers

use anyhow::{Result, bail};

use crate::Context;
use crate::engine::WalkOptions;
use crate::engine::walker::NodeOutcome;
use crate::engine::display::{display_plan, display_problems};
use crate::paths;
use crate::schema::AttuneConfig;
use crate::state::AttuneState;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let config = AttuneConfig::load(&ctx.config_file()?)?;
    let state = AttuneState::load(&paths::state_file()?)?;

    let opts = WalkOptions {
        dry_run: true,
        ..WalkOptions::default()
    };
    let walk = super::evaluate(ctx, &config, &state, target, &opts)?;

    display_plan(&walk.results);
    display_problems(&walk.results);

    if ctx.verbose > 0 {
        for result in &walk.results {
            if result.outcome == NodeOutcome::Converged {
                ui::dim(&format!("{} is up to date", result.name));
            }
        }
    }

    let summary = &walk.summary;
    if !ctx.quiet {
        println!();
        ui::info(&format!(
            "{} to change, {} unchanged",
            ui::plural(summary.pending, "resource"),
            summary.unchanged
        ));
    }

    if !summary.is_success() {
        bail!(
            "{} could not be planned",
            ui::plural(summary.failed + summary.skipped, "resource")
        );
    }
    Ok(())
}
