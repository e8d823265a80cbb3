//! Resolution of raw configuration against graph state

use crate::config::{RawConfig, Reference, ResolvedConfig, Resource, Segment};
use crate::error::InterpolationError;
use crate::state::GraphState;
use std::collections::BTreeMap;

/// Resolve every reference in `raw`.
///
/// `resource`, when given, is the node being acted upon: `self.KEY` and
/// `NAME.KEY` with the node's own name resolve against `raw` itself. Without
/// it, self references are an error.
pub fn interpolate(
    raw: &RawConfig,
    resource: Option<&Resource>,
    state: &GraphState,
) -> Result<ResolvedConfig, InterpolationError> {
    let mut resolver = Resolver {
        raw,
        resource,
        state,
        resolved: BTreeMap::new(),
        in_progress: Vec::new(),
    };

    for key in raw.keys() {
        resolver.resolve_key(key)?;
    }

    Ok(resolver.resolved.into_iter().collect())
}

struct Resolver<'a> {
    raw: &'a RawConfig,
    resource: Option<&'a Resource>,
    state: &'a GraphState,
    resolved: BTreeMap<String, String>,
    /// Keys currently being resolved, outermost first
    in_progress: Vec<String>,
}

impl Resolver<'_> {
    fn resolve_key(&mut self, key: &str) -> Result<String, InterpolationError> {
        if let Some(value) = self.resolved.get(key) {
            return Ok(value.clone());
        }

        if let Some(pos) = self.in_progress.iter().position(|k| k == key) {
            let mut chain = self.in_progress[pos..].to_vec();
            chain.push(key.to_string());
            return Err(InterpolationError::Cycle { chain });
        }

        let raw = self.raw;
        let Some(template) = raw.get(key) else {
            return Err(InterpolationError::Unresolved {
                key: self.current_key(),
                reference: format!("self.{key}"),
            });
        };

        self.in_progress.push(key.to_string());
        let mut value = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => value.push_str(text),
                Segment::Ref(reference) => value.push_str(&self.resolve_reference(key, reference)?),
            }
        }
        self.in_progress.pop();

        self.resolved.insert(key.to_string(), value.clone());
        Ok(value)
    }

    fn resolve_reference(
        &mut self,
        key: &str,
        reference: &Reference,
    ) -> Result<String, InterpolationError> {
        let unresolved = || InterpolationError::Unresolved {
            key: key.to_string(),
            reference: reference.to_string(),
        };

        match reference {
            Reference::Var(name) => self
                .state
                .variable(name)
                .map(str::to_string)
                .ok_or_else(unresolved),
            Reference::SelfKey(target) => {
                if self.resource.is_none() {
                    return Err(InterpolationError::SelfOutsideResource {
                        key: key.to_string(),
                        reference: reference.to_string(),
                    });
                }
                self.resolve_own_key(target).ok_or_else(unresolved)?
            }
            Reference::Node { name, key: target } => {
                if self.resource.is_some_and(|r| &r.name == name) {
                    return self.resolve_own_key(target).ok_or_else(unresolved)?;
                }
                self.state.lookup(name, target).ok_or_else(unresolved)
            }
        }
    }

    /// Resolve another key of the same configuration; `None` if it does not exist
    fn resolve_own_key(&mut self, target: &str) -> Option<Result<String, InterpolationError>> {
        if !self.raw.contains_key(target) {
            return None;
        }
        Some(self.resolve_key(target))
    }

    fn current_key(&self) -> String {
        self.in_progress.last().cloned().unwrap_or_default()
    }
}
