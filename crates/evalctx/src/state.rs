//! Shared graph state read by interpolation

use crate::config::ResolvedConfig;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Snapshot of walk-wide variables and every evaluated node's configuration.
///
/// Any number of nodes may read concurrently. Graph ordering guarantees a
/// node is published before anything that references it is evaluated.
#[derive(Debug, Default)]
pub struct GraphState {
    variables: BTreeMap<String, String>,
    nodes: RwLock<HashMap<String, ResolvedConfig>>,
}

impl GraphState {
    pub fn new(variables: BTreeMap<String, String>) -> Self {
        Self {
            variables,
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Record a node's resolved configuration
    pub fn publish(&self, name: &str, resolved: ResolvedConfig) {
        log::trace!("Publishing node {name} ({} keys)", resolved.len());
        self.write().insert(name.to_string(), resolved);
    }

    /// Look up one key of a published node
    pub fn lookup(&self, name: &str, key: &str) -> Option<String> {
        self.read()
            .get(name)
            .and_then(|resolved| resolved.get(key))
            .map(str::to_string)
    }

    pub fn is_published(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Clone a published node's configuration
    pub fn node(&self, name: &str) -> Option<ResolvedConfig> {
        self.read().get(name).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ResolvedConfig>> {
        match self.nodes.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ResolvedConfig>> {
        match self.nodes.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
