pub mod apply;
pub mod plan;
pub mod state;

use anyhow::Result;

use crate::Context;
use crate::engine::{Graph, Walk, WalkOptions, walk};
use crate::progress;
use crate::provider;
use crate::schema::AttuneConfig;
use crate::state::AttuneState;

/// Walk the configured resources with a fresh evaluation context.
///
/// Each call builds its own context: providers are initialized once per walk.
pub fn evaluate(
    ctx: &Context,
    config: &AttuneConfig,
    state: &AttuneState,
    target: Option<&str>,
    opts: &WalkOptions,
) -> Result<Walk> {
    let graph = Graph::build(config, state, target)?;
    if graph.is_empty() {
        log::info!("No resources to evaluate");
    }
    log::debug!(
        "Graph has {} resources in {} levels",
        graph.len(),
        graph.levels().len()
    );

    let eval = provider::build_context(config)?;
    let message = if opts.dry_run { "Planning" } else { "Applying" };
    let pb = progress::walk_bar(graph.len() as u64, message, ctx.quiet);

    let result = walk(&eval, eval.state(), &graph, state, opts, &pb);
    pb.finish_and_clear();
    result
}
