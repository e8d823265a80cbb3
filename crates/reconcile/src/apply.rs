//! Apply a computed diff through a provider

use crate::attrs::AttributeSet;
use crate::diff::diff;
use crate::error::TransportError;
use crate::provider::Provider;

/// Sizes of the calls made by [`apply`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Number of keys sent in the delete call (0 if none was made)
    pub removed: usize,
    /// Number of attributes sent in the create call (0 if none was made)
    pub written: usize,
}

impl ApplyReport {
    /// Whether any remote call was made
    pub fn made_calls(&self) -> bool {
        self.removed > 0 || self.written > 0
    }
}

/// Change-detection signal: whether the attribute set is dirty
pub fn needs_apply(prior: &AttributeSet, desired: &AttributeSet) -> bool {
    prior != desired
}

/// Converge a resource's remote attributes from `prior` to `desired`.
///
/// Deletes stale keys first, then writes the full desired set. Either call's
/// error is returned as-is and nothing further is attempted: if the delete
/// succeeded and the create failed, the resource stays partially converged
/// and a later apply finishes the job.
pub fn apply(
    provider: &dyn Provider,
    resource_id: &str,
    prior: &AttributeSet,
    desired: &AttributeSet,
) -> Result<ApplyReport, TransportError> {
    let changes = diff(prior, desired);
    let mut report = ApplyReport::default();

    if !changes.remove.is_empty() {
        let keys = changes.removed_keys();
        log::debug!(
            "[{}] Removing attributes from {}: {:?}",
            provider.name(),
            resource_id,
            changes.remove
        );
        provider.delete(resource_id, &keys)?;
        report.removed = keys.len();
    }

    if !changes.create.is_empty() {
        log::debug!(
            "[{}] Creating attributes on {}: {:?}",
            provider.name(),
            resource_id,
            changes.create
        );
        provider.create(resource_id, &changes.create)?;
        report.written = changes.create.len();
    }

    Ok(report)
}
