//! Dependency graph between resources
//!
//! Edges come from `${NAME.KEY}` references: a resource depends on every
//! other resource its configuration mentions. Nodes are grouped into levels
//! so that every dependency of a node sits in an earlier level.

use anyhow::{Result, bail};
use evalctx::{RawConfig, Resource, Template};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::schema::AttuneConfig;
use crate::state::AttuneState;

/// One resource to evaluate
#[derive(Debug, Clone)]
pub struct Node {
    pub resource: Resource,
    pub raw: RawConfig,
    /// Names of the resources this node references
    pub depends_on: BTreeSet<String>,
    /// Present in state but no longer declared; converges to no attributes
    pub orphan: bool,
}

impl Node {
    pub fn new(resource: Resource, raw: RawConfig) -> Self {
        let depends_on = raw.node_references(&resource.name);
        Self {
            resource,
            raw,
            depends_on,
            orphan: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }
}

/// Resources grouped into dependency levels
#[derive(Debug, Default)]
pub struct Graph {
    levels: Vec<Vec<Node>>,
}

impl Graph {
    /// Build the graph for a config.
    ///
    /// With a target only that resource and its transitive dependencies are
    /// included. Without one, resources recorded in state but removed from
    /// the config are added as orphans so their attributes get cleared.
    pub fn build(config: &AttuneConfig, state: &AttuneState, target: Option<&str>) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for name in config.resources.keys() {
            let Some(resource) = config.node(name) else {
                continue;
            };
            let node = Node::new(resource, config.raw_config(name)?);
            nodes.insert(name.clone(), node);
        }

        if let Some(target) = target {
            if !nodes.contains_key(target) {
                bail!("Unknown target resource '{}'", target);
            }
            let keep = closure(&nodes, target);
            nodes.retain(|name, _| keep.contains(name));
        } else {
            for (name, applied) in &state.resources {
                if nodes.contains_key(name) {
                    continue;
                }
                if !config.providers.contains_key(&applied.provider) {
                    log::warn!(
                        "Resource '{}' was removed from config but its provider '{}' is gone; leaving it alone",
                        name,
                        applied.provider
                    );
                    continue;
                }
                let mut raw = RawConfig::new();
                raw.insert("id", Template::literal(&applied.id));
                let mut node = Node::new(Resource::new(name.as_str(), applied.provider.as_str()), raw);
                node.orphan = true;
                nodes.insert(name.clone(), node);
            }
        }

        Self::from_nodes(nodes.into_values().collect())
    }

    /// Order nodes into levels (Kahn's algorithm).
    ///
    /// References to names outside the node set are not edges; interpolation
    /// reports them when the node is evaluated.
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self> {
        let mut by_name: BTreeMap<String, Node> = nodes
            .into_iter()
            .map(|node| (node.name().to_string(), node))
            .collect();

        let mut pending: BTreeMap<String, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, node) in &by_name {
            let deps: Vec<&String> = node
                .depends_on
                .iter()
                .filter(|dep| by_name.contains_key(dep.as_str()))
                .collect();
            pending.insert(name.clone(), deps.len());
            for dep in deps {
                dependents.entry(dep.clone()).or_default().push(name.clone());
            }
        }

        let mut ready: VecDeque<String> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| name.clone())
            .collect();

        let mut levels = Vec::new();
        while !ready.is_empty() {
            let mut level = Vec::with_capacity(ready.len());
            let mut next = VecDeque::new();
            for name in ready.drain(..) {
                pending.remove(&name);
                for dependent in dependents.get(&name).into_iter().flatten() {
                    if let Some(count) = pending.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            next.push_back(dependent.clone());
                        }
                    }
                }
                if let Some(node) = by_name.remove(&name) {
                    level.push(node);
                }
            }
            levels.push(level);
            ready = next;
        }

        if !pending.is_empty() {
            let names: Vec<_> = pending.into_keys().collect();
            bail!("Dependency cycle between resources: {}", names.join(", "));
        }

        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[Vec<Node>] {
        &self.levels
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.levels.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Distinct provider names used by the nodes
    pub fn provider_names(&self) -> BTreeSet<String> {
        self.nodes().map(|node| node.resource.provider.clone()).collect()
    }
}

/// `target` plus everything it transitively references
fn closure(nodes: &BTreeMap<String, Node>, target: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![target.to_string()];
    while let Some(name) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(node) = nodes.get(&name) {
            stack.extend(node.depends_on.iter().cloned());
        }
    }
    seen
}
