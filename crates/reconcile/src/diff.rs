//! Diff computation between a prior and a desired attribute set

use crate::attrs::AttributeSet;
use serde::{Deserialize, Serialize};

/// The calls needed to move a remote attribute set from `prior` to `desired`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDiff {
    /// Every desired attribute; sent as one overwrite call
    pub create: AttributeSet,
    /// Prior attributes that were dropped or whose value changed, in key order
    pub remove: Vec<(String, String)>,
}

impl AttributeDiff {
    /// Keys of the attributes to remove
    pub fn removed_keys(&self) -> Vec<String> {
        self.remove.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Whether neither a delete nor a create call is needed
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.remove.is_empty()
    }
}

/// Compute the create and remove sets for moving `prior` to `desired`.
///
/// `create` is always a full copy of `desired`, unchanged keys included: the
/// remote create call overwrites, so re-sending an unchanged value is a no-op.
/// `remove` holds each prior entry whose key is gone from `desired` or whose
/// value differs there. A changed key therefore shows up in both.
pub fn diff(prior: &AttributeSet, desired: &AttributeSet) -> AttributeDiff {
    let create = desired.clone();

    let remove = prior
        .iter()
        .filter(|(key, value)| desired.get(key) != Some(value.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    AttributeDiff { create, remove }
}

/// How one attribute changes between a prior and a desired set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeChange {
    Added { key: String, value: String },
    Changed { key: String, from: String, to: String },
    Removed { key: String, value: String },
}

impl AttributeChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Changed { key, .. } | Self::Removed { key, .. } => key,
        }
    }
}

/// Per-key changes from `prior` to `desired`, sorted by key.
///
/// Keys with the same value on both sides are left out.
pub fn changes(prior: &AttributeSet, desired: &AttributeSet) -> Vec<AttributeChange> {
    let mut changes = Vec::new();
    for (key, value) in desired {
        match prior.get(key) {
            None => changes.push(AttributeChange::Added {
                key: key.clone(),
                value: value.clone(),
            }),
            Some(old) if old != value.as_str() => changes.push(AttributeChange::Changed {
                key: key.clone(),
                from: old.to_string(),
                to: value.clone(),
            }),
            Some(_) => {}
        }
    }
    for (key, value) in prior {
        if !desired.contains_key(key) {
            changes.push(AttributeChange::Removed {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }
    changes.sort_by(|a, b| a.key().cmp(b.key()));
    changes
}

/// Per-key change counts, for display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Keys only in desired
    pub added: usize,
    /// Keys in both with different values
    pub changed: usize,
    /// Keys only in prior
    pub removed: usize,
    /// Keys in both with the same value
    pub unchanged: usize,
}

impl DiffSummary {
    /// Classify every key of `prior` and `desired`
    pub fn between(prior: &AttributeSet, desired: &AttributeSet) -> Self {
        let mut summary = Self::default();
        for change in changes(prior, desired) {
            match change {
                AttributeChange::Added { .. } => summary.added += 1,
                AttributeChange::Changed { .. } => summary.changed += 1,
                AttributeChange::Removed { .. } => summary.removed += 1,
            }
        }
        summary.unchanged = desired.len() - summary.added - summary.changed;
        summary
    }

    /// Total number of changed keys
    pub fn total(&self) -> usize {
        self.added + self.changed + self.removed
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
