//! `attune state` - inspect and edit the record of applied attributes

use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::paths;
use crate::state::AttuneState;
use crate::ui;

pub fn list(ctx: &Context) -> Result<()> {
    let state = AttuneState::load(&paths::state_file()?)?;

    if state.resources.is_empty() {
        ui::info("No resources have been applied yet");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Applied resources");
    }
    for (name, applied) in &state.resources {
        println!(
            "  {:<24} {} {}",
            name.bold(),
            format!("{}:{}", applied.provider, applied.id).dimmed(),
            ui::plural(applied.attributes.len(), "attribute").dimmed()
        );
    }
    Ok(())
}

pub fn show(_ctx: &Context, name: &str) -> Result<()> {
    let state = AttuneState::load(&paths::state_file()?)?;
    let Some(applied) = state.resources.get(name) else {
        bail!("Resource '{}' is not in state", name);
    };

    ui::header(name);
    ui::kv("provider", &applied.provider);
    ui::kv("id", &applied.id);
    ui::kv(
        "applied",
        &applied.applied_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    println!();
    for (key, value) in &applied.attributes {
        println!("  {} = {:?}", key, value);
    }
    Ok(())
}

pub fn rm(_ctx: &Context, name: &str) -> Result<()> {
    let path = paths::state_file()?;
    let mut state = AttuneState::load(&path)?;
    if !state.remove(name) {
        bail!("Resource '{}' is not in state", name);
    }
    state.touch(&path)?;
    ui::success(&format!("Removed '{}' from state", name));
    ui::dim("Its remote attributes were left as they are");
    Ok(())
}
