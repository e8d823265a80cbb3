//! Graph walker - drives each resource through the evaluation context
//!
//! Every provider the graph uses is initialized exactly once, then levels
//! are evaluated in order with the nodes of a level running in parallel.
//! A node interpolates its configuration, compares the desired attributes
//! with what was last applied and, unless this is a dry run, reconciles the
//! difference through its provider. Resolved configurations are published
//! so later levels can reference them.

use anyhow::{Context as AnyhowContext, Result};
use evalctx::{EvalContext, GraphState, ResolvedConfig};
use rayon::prelude::*;
use reconcile::{ApplyReport, AttributeSet, DiffSummary, needs_apply};
use std::collections::{BTreeMap, HashSet};

use super::graph::{Graph, Node};
use crate::state::AttuneState;

/// Options for a walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Compute outcomes without calling providers
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

/// What happened to one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Desired attributes already match what was applied
    Converged,
    /// Would be applied (dry run)
    Pending,
    Applied { report: ApplyReport },
    Failed { error: String },
    Skipped { reason: String },
}

impl NodeOutcome {
    /// Whether dependents may proceed
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed { .. } | Self::Skipped { .. })
    }
}

/// Result of evaluating one node
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub name: String,
    pub provider: String,
    pub orphan: bool,
    /// Resolved remote id, once interpolation succeeded
    pub id: Option<String>,
    pub prior: AttributeSet,
    pub desired: AttributeSet,
    pub outcome: NodeOutcome,
}

impl NodeResult {
    fn new(node: &Node) -> Self {
        Self {
            name: node.name().to_string(),
            provider: node.resource.provider.clone(),
            orphan: node.orphan,
            id: None,
            prior: AttributeSet::new(),
            desired: AttributeSet::new(),
            outcome: NodeOutcome::Converged,
        }
    }

    fn failed(mut self, error: impl Into<String>) -> Self {
        self.outcome = NodeOutcome::Failed {
            error: error.into(),
        };
        self
    }

    pub fn changes(&self) -> DiffSummary {
        DiffSummary::between(&self.prior, &self.desired)
    }
}

/// Summary of walk results
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WalkSummary {
    pub applied: usize,
    pub unchanged: usize,
    pub pending: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl WalkSummary {
    pub fn from_results(results: &[NodeResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.outcome {
                NodeOutcome::Converged => summary.unchanged += 1,
                NodeOutcome::Pending => summary.pending += 1,
                NodeOutcome::Applied { .. } => summary.applied += 1,
                NodeOutcome::Failed { .. } => summary.failed += 1,
                NodeOutcome::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn has_changes(&self) -> bool {
        self.applied + self.pending > 0
    }
}

/// Per-node results in evaluation order, plus their summary
#[derive(Debug, Default)]
pub struct Walk {
    pub results: Vec<NodeResult>,
    pub summary: WalkSummary,
}

/// Notified as each node finishes; called from worker threads
pub trait WalkProgress: Sync {
    fn on_node_complete(&self, result: &NodeResult);
}

/// Progress sink that ignores updates
pub struct NoProgress;

impl WalkProgress for NoProgress {
    fn on_node_complete(&self, _result: &NodeResult) {}
}

/// Walk the graph.
///
/// `published` is the graph state the context's interpolation reads; each
/// declared node that did not fail is published there after its level
/// completes. Orphans are never published: they are forgotten once cleared,
/// so a reference to one could not resolve on the next walk.
pub fn walk(
    ctx: &dyn EvalContext,
    published: &GraphState,
    graph: &Graph,
    applied: &AttuneState,
    opts: &WalkOptions,
    progress: &dyn WalkProgress,
) -> Result<Walk> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create walker thread pool")?;

    let init_errors = init_providers(ctx, graph, &pool)?;

    let mut blocked: HashSet<String> = HashSet::new();
    let mut results = Vec::with_capacity(graph.len());

    for (depth, level) in graph.levels().iter().enumerate() {
        log::debug!("Evaluating level {} ({} resources)", depth, level.len());

        let evaluated: Vec<(NodeResult, Option<ResolvedConfig>)> = pool.install(|| {
            level
                .par_iter()
                .map(|node| {
                    let evaluated =
                        evaluate(ctx, node, applied, &blocked, &init_errors, opts.dry_run);
                    progress.on_node_complete(&evaluated.0);
                    evaluated
                })
                .collect()
        });

        for (result, resolved) in evaluated {
            if !result.outcome.is_ok() {
                blocked.insert(result.name.clone());
            } else if let Some(resolved) = resolved.filter(|_| !result.orphan) {
                published.publish(&result.name, resolved);
            }
            results.push(result);
        }
    }

    let summary = WalkSummary::from_results(&results);
    Ok(Walk { results, summary })
}

/// Initialize every provider the graph uses, in parallel.
///
/// Returns initialization errors by provider name. A provider that was
/// already initialized means the context was reused across walks, which is
/// a bug in the caller and aborts the walk.
fn init_providers(
    ctx: &dyn EvalContext,
    graph: &Graph,
    pool: &rayon::ThreadPool,
) -> Result<BTreeMap<String, String>> {
    let names: Vec<String> = graph.provider_names().into_iter().collect();

    let initialized: Vec<_> = pool.install(|| {
        names
            .par_iter()
            .map(|name| (name, ctx.init_provider(name)))
            .collect()
    });

    let mut errors = BTreeMap::new();
    for (name, result) in initialized {
        match result {
            Ok(_) => log::debug!("Initialized provider '{}'", name),
            Err(err @ evalctx::Error::AlreadyInitialized { .. }) => {
                return Err(err).context("Evaluation context reused across walks");
            }
            Err(err) => {
                log::warn!("{}", err);
                errors.insert(name.clone(), err.to_string());
            }
        }
    }
    Ok(errors)
}

fn evaluate(
    ctx: &dyn EvalContext,
    node: &Node,
    applied: &AttuneState,
    blocked: &HashSet<String>,
    init_errors: &BTreeMap<String, String>,
    dry_run: bool,
) -> (NodeResult, Option<ResolvedConfig>) {
    let mut result = NodeResult::new(node);

    if let Some(dep) = node.depends_on.iter().find(|dep| blocked.contains(*dep)) {
        log::warn!(
            "Skipping '{}': dependency '{}' did not converge",
            node.name(),
            dep
        );
        result.outcome = NodeOutcome::Skipped {
            reason: format!("dependency '{dep}' did not converge"),
        };
        return (result, None);
    }

    if let Some(err) = init_errors.get(&node.resource.provider) {
        return (result.failed(err.clone()), None);
    }

    let resolved = match ctx.interpolate(&node.raw, Some(&node.resource)) {
        Ok(resolved) => resolved,
        Err(err) => return (result.failed(err.to_string()), None),
    };

    let id = match resolved.require("id") {
        Ok(id) => id.to_string(),
        Err(err) => return (result.failed(err.to_string()), None),
    };

    result.desired = resolved.section("tags");
    result.prior = applied.prior(node.name(), &node.resource.provider, &id);
    result.id = Some(id.clone());

    if !needs_apply(&result.prior, &result.desired) {
        return (result, Some(resolved));
    }

    if dry_run {
        result.outcome = NodeOutcome::Pending;
        return (result, Some(resolved));
    }

    let Some(provider) = ctx.provider(&node.resource.provider) else {
        let error = format!("provider '{}' is not initialized", node.resource.provider);
        return (result.failed(error), None);
    };

    match reconcile::apply(provider.as_ref(), &id, &result.prior, &result.desired) {
        Ok(report) => {
            log::info!(
                "Applied '{}' ({} removed, {} written)",
                node.name(),
                report.removed,
                report.written
            );
            result.outcome = NodeOutcome::Applied { report };
            (result, Some(resolved))
        }
        Err(err) => {
            let error = format!("{:#}", anyhow::Error::new(err));
            (result.failed(error), None)
        }
    }
}

/// Record converged and applied nodes in state.
///
/// Failed and skipped nodes keep their previous entry, so the next apply
/// recomputes the same diff and finishes convergence.
pub fn record_results(state: &mut AttuneState, results: &[NodeResult]) -> usize {
    let mut recorded = 0;
    for result in results {
        if !matches!(
            result.outcome,
            NodeOutcome::Converged | NodeOutcome::Applied { .. }
        ) {
            continue;
        }
        let Some(id) = &result.id else { continue };
        state.record(&result.name, &result.provider, id, result.desired.clone());
        recorded += 1;
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttuneConfig;
    use evalctx::{BuiltinEvalContext, EvalCall, Error, RecordingEvalContext, Resource};
    use reconcile::{ProviderCall, ProviderHandle, RecordingProvider};
    use std::sync::Arc;

    const CONFIG: &str = r#"
[variables]
env = "prod"

[providers.local]
kind = "file"

[resources.db]
provider = "local"
id = "db-${var.env}"
tags = { Owner = "data", Env = "${var.env}" }

[resources.web]
provider = "local"
id = "web-${db.id}"
tags = { Owner = "${db.tags.Owner}", Name = "${self.id}" }
"#;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeSet {
        pairs.iter().copied().collect()
    }

    /// A fresh context whose `local` provider is the shared recorder
    fn context(config: &AttuneConfig, recorder: &Arc<RecordingProvider>) -> BuiltinEvalContext {
        let state = Arc::new(GraphState::new(config.variables.clone()));
        let handle: ProviderHandle = Arc::clone(recorder) as ProviderHandle;
        BuiltinEvalContext::new(state).with_factory("local", move |_name: &str| Ok(Arc::clone(&handle)))
    }

    fn run(
        config: &AttuneConfig,
        recorder: &Arc<RecordingProvider>,
        applied: &AttuneState,
        dry_run: bool,
    ) -> Walk {
        let ctx = context(config, recorder);
        let graph = Graph::build(config, applied, None).unwrap();
        let opts = WalkOptions { dry_run, jobs: 2 };
        walk(&ctx, ctx.state(), &graph, applied, &opts, &NoProgress).unwrap()
    }

    fn outcome<'a>(walk: &'a Walk, name: &str) -> &'a NodeOutcome {
        &walk
            .results
            .iter()
            .find(|r| r.name == name)
            .unwrap()
            .outcome
    }

    #[test]
    fn test_walk_applies_in_dependency_order() {
        let config = AttuneConfig::parse(CONFIG).unwrap();
        let recorder = Arc::new(RecordingProvider::new("local"));

        let walk = run(&config, &recorder, &AttuneState::default(), false);

        assert_eq!(walk.summary.applied, 2);
        assert!(walk.summary.is_success());
        assert_eq!(
            recorder.calls(),
            vec![
                ProviderCall::Create {
                    resource_id: "db-prod".to_string(),
                    attributes: attrs(&[("Owner", "data"), ("Env", "prod")]),
                },
                ProviderCall::Create {
                    resource_id: "web-db-prod".to_string(),
                    attributes: attrs(&[("Owner", "data"), ("Name", "web-db-prod")]),
                },
            ]
        );
    }

    #[test]
    fn test_second_apply_makes_no_calls() {
        let config = AttuneConfig::parse(CONFIG).unwrap();
        let recorder = Arc::new(RecordingProvider::new("local"));
        let mut applied = AttuneState::default();

        let first = run(&config, &recorder, &applied, false);
        assert_eq!(record_results(&mut applied, &first.results), 2);
        recorder.clear_calls();

        let second = run(&config, &recorder, &applied, false);
        assert_eq!(second.summary.unchanged, 2);
        assert!(!second.summary.has_changes());
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_changed_tag_deletes_then_creates() {
        let recorder = Arc::new(RecordingProvider::new("local"));
        let mut applied = AttuneState::default();
        let first = run(&AttuneConfig::parse(CONFIG).unwrap(), &recorder, &applied, false);
        record_results(&mut applied, &first.results);
        recorder.clear_calls();

        let changed = AttuneConfig::parse(&CONFIG.replace(
            r#"tags = { Owner = "data", Env = "${var.env}" }"#,
            r#"tags = { Owner = "data" }"#,
        ))
        .unwrap();
        let walk = run(&changed, &recorder, &applied, false);

        assert_eq!(walk.summary.applied, 1);
        assert_eq!(walk.summary.unchanged, 1);
        assert_eq!(
            recorder.calls(),
            vec![
                ProviderCall::Delete {
                    resource_id: "db-prod".to_string(),
                    keys: vec!["Env".to_string()],
                },
                ProviderCall::Create {
                    resource_id: "db-prod".to_string(),
                    attributes: attrs(&[("Owner", "data")]),
                },
            ]
        );
        assert_eq!(recorder.remote("db-prod"), attrs(&[("Owner", "data")]));
    }

    #[test]
    fn test_dry_run_makes_no_calls() {
        let config = AttuneConfig::parse(CONFIG).unwrap();
        let recorder = Arc::new(RecordingProvider::new("local"));

        let walk = run(&config, &recorder, &AttuneState::default(), true);

        assert_eq!(walk.summary.pending, 2);
        assert!(recorder.calls().is_empty());
        let web = walk.results.iter().find(|r| r.name == "web").unwrap();
        assert_eq!(web.desired.get("Name"), Some("web-db-prod"));
    }

    #[test]
    fn test_failure_skips_dependents_and_keeps_state() {
        let config = AttuneConfig::parse(CONFIG).unwrap();
        let recorder = Arc::new(RecordingProvider::new("local"));
        recorder.fail_next_create("throttled");
        let mut applied = AttuneState::default();

        let walk = run(&config, &recorder, &applied, false);

        assert_eq!(
            outcome(&walk, "db"),
            &NodeOutcome::Failed {
                error: "throttled".to_string()
            }
        );
        assert!(matches!(outcome(&walk, "web"), NodeOutcome::Skipped { .. }));
        assert!(!walk.summary.is_success());
        assert_eq!(record_results(&mut applied, &walk.results), 0);
        assert!(applied.resources.is_empty());

        // The retry converges both
        let retry = run(&config, &recorder, &applied, false);
        assert_eq!(retry.summary.applied, 2);
    }

    /// A context over `local` with no variables, for hand-built graphs
    fn bare_context(recorder: &Arc<RecordingProvider>) -> BuiltinEvalContext {
        context(&AttuneConfig::default(), recorder)
    }

    fn walk_graph(
        recorder: &Arc<RecordingProvider>,
        graph: &Graph,
        applied: &AttuneState,
    ) -> Walk {
        let ctx = bare_context(recorder);
        walk(&ctx, ctx.state(), graph, applied, &WalkOptions::default(), &NoProgress).unwrap()
    }

    #[test]
    fn test_unresolved_reference_fails_node() {
        let web = Node::new(
            Resource::new("web", "local"),
            evalctx::RawConfig::parse([("id", "web"), ("tags.Owner", "${ghost.tags.Owner}")])
                .unwrap(),
        );
        let graph = Graph::from_nodes(vec![web]).unwrap();
        let recorder = Arc::new(RecordingProvider::new("local"));

        let walk = walk_graph(&recorder, &graph, &AttuneState::default());

        match outcome(&walk, "web") {
            NodeOutcome::Failed { error } => assert!(error.contains("ghost")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_reference_to_orphan_fails_on_every_walk() {
        let graph = || {
            let mut old = Node::new(
                Resource::new("old", "local"),
                evalctx::RawConfig::parse([("id", "old-1")]).unwrap(),
            );
            old.orphan = true;
            let web = Node::new(
                Resource::new("web", "local"),
                evalctx::RawConfig::parse([("id", "web-1"), ("tags.Upstream", "${old.id}")])
                    .unwrap(),
            );
            Graph::from_nodes(vec![old, web]).unwrap()
        };
        let recorder = Arc::new(
            RecordingProvider::new("local").with_remote("old-1", attrs(&[("Name", "old")])),
        );
        let mut applied = AttuneState::default();
        applied.record("old", "local", "old-1", attrs(&[("Name", "old")]));

        let first = walk_graph(&recorder, &graph(), &applied);
        assert!(matches!(outcome(&first, "old"), NodeOutcome::Applied { .. }));
        assert!(matches!(outcome(&first, "web"), NodeOutcome::Failed { .. }));
        assert!(recorder.remote("web-1").is_empty());

        record_results(&mut applied, &first.results);
        assert!(!applied.resources.contains_key("old"));
        assert!(!applied.resources.contains_key("web"));

        let second = walk_graph(&recorder, &graph(), &applied);
        match outcome(&second, "web") {
            NodeOutcome::Failed { error } => assert!(error.contains("old.id")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_orphan_is_cleared_and_forgotten() {
        let config = AttuneConfig::parse(CONFIG).unwrap();
        let recorder = Arc::new(
            RecordingProvider::new("local").with_remote("old-1", attrs(&[("Name", "old")])),
        );
        let mut applied = AttuneState::default();
        applied.record("old", "local", "old-1", attrs(&[("Name", "old")]));

        let walk = run(&config, &recorder, &applied, false);
        assert!(matches!(outcome(&walk, "old"), NodeOutcome::Applied { .. }));
        assert!(recorder.calls().contains(&ProviderCall::Delete {
            resource_id: "old-1".to_string(),
            keys: vec!["Name".to_string()],
        }));
        assert!(recorder.remote("old-1").is_empty());

        record_results(&mut applied, &walk.results);
        assert!(!applied.resources.contains_key("old"));
        assert!(applied.resources.contains_key("web"));
    }

    // ------------------------------------------------------------------------
    // Against the recording context
    // ------------------------------------------------------------------------

    fn two_node_graph() -> Graph {
        let node = |name: &str| {
            Node::new(
                Resource::new(name, "local"),
                evalctx::RawConfig::parse([("id", "i-1"), ("tags.Name", "x")]).unwrap(),
            )
        };
        Graph::from_nodes(vec![node("a"), node("b")]).unwrap()
    }

    #[test]
    fn test_provider_initialized_once_per_name() {
        let recorder = Arc::new(RecordingProvider::new("local"));
        let handle: ProviderHandle = Arc::clone(&recorder) as ProviderHandle;
        let resolved: ResolvedConfig = [("id", "i-1"), ("tags.Name", "x")].into_iter().collect();
        let ctx = RecordingEvalContext::new()
            .with_init_provider(Arc::clone(&handle))
            .with_provider(handle)
            .with_interpolated(resolved);

        let graph = two_node_graph();
        let published = GraphState::default();
        let walk = walk(
            &ctx,
            &published,
            &graph,
            &AttuneState::default(),
            &WalkOptions::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(walk.summary.applied, 2);
        assert_eq!(ctx.init_provider_names(), vec!["local".to_string()]);
        let interpolated: Vec<_> = ctx
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                EvalCall::Interpolate { resource, .. } => resource.map(|r| r.name),
                _ => None,
            })
            .collect();
        assert_eq!(interpolated.len(), 2);
        assert!(published.is_published("a"));
        assert!(published.is_published("b"));
    }

    #[test]
    fn test_init_failure_fails_nodes_without_interpolating() {
        let ctx = RecordingEvalContext::new().with_init_provider_error(Error::ProviderInit {
            name: "local".to_string(),
            message: "no credentials".to_string(),
        });

        let walk = walk(
            &ctx,
            &GraphState::default(),
            &two_node_graph(),
            &AttuneState::default(),
            &WalkOptions::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(walk.summary.failed, 2);
        assert!(
            ctx.calls()
                .iter()
                .all(|call| matches!(call, EvalCall::InitProvider { .. }))
        );
    }

    #[test]
    fn test_reused_context_aborts_walk() {
        let ctx = RecordingEvalContext::new().with_init_provider_error(Error::AlreadyInitialized {
            name: "local".to_string(),
        });

        let result = walk(
            &ctx,
            &GraphState::default(),
            &two_node_graph(),
            &AttuneState::default(),
            &WalkOptions::default(),
            &NoProgress,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_provider_handle_fails_node() {
        let recorder = Arc::new(RecordingProvider::new("local"));
        let resolved: ResolvedConfig = [("id", "i-1"), ("tags.Name", "x")].into_iter().collect();
        let ctx = RecordingEvalContext::new()
            .with_init_provider(recorder as ProviderHandle)
            .with_interpolated(resolved);

        let walk = walk(
            &ctx,
            &GraphState::default(),
            &two_node_graph(),
            &AttuneState::default(),
            &WalkOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert_eq!(walk.summary.failed, 2);
    }
}
