//! The capability interface handed to every node of a graph walk

use crate::config::{RawConfig, ResolvedConfig, Resource};
use crate::error::Result;
use reconcile::ProviderHandle;

/// What a graph node may do while it is being evaluated.
///
/// Implementations are shared by every concurrently evaluated node.
pub trait EvalContext: Send + Sync {
    /// Initialize the provider registered under `name` and return it.
    ///
    /// Each name may be initialized once per context; a second call fails
    /// with [`Error::AlreadyInitialized`](crate::Error::AlreadyInitialized)
    /// and leaves the registered handle untouched.
    fn init_provider(&self, name: &str) -> Result<ProviderHandle>;

    /// The already initialized provider for `name`, if any. Never initializes.
    fn provider(&self, name: &str) -> Option<ProviderHandle>;

    /// Resolve every reference in `config`.
    ///
    /// `resource` is the node currently being acted upon, if any; it scopes
    /// self references.
    fn interpolate(
        &self,
        config: &RawConfig,
        resource: Option<&Resource>,
    ) -> Result<ResolvedConfig>;
}
