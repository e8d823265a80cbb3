//! Error types for the evaluation context

use thiserror::Error;

/// A configuration string whose `${...}` references could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid template {template:?}: {reason}")]
pub struct TemplateError {
    pub template: String,
    pub reason: String,
}

/// Failure to resolve a raw configuration.
///
/// Surfaced to the user as a configuration error; never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    /// A variable, node, or key the reference names does not exist
    #[error("{key}: unresolved reference ${{{reference}}}")]
    Unresolved { key: String, reference: String },

    /// Keys of one configuration reference each other in a loop
    #[error("reference cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// A key the evaluator needs is absent from the resolved configuration
    #[error("missing required key {key}")]
    MissingKey { key: String },

    /// A `self.` reference was used without a resource in scope
    #[error("{key}: ${{{reference}}} used outside of a resource")]
    SelfOutsideResource { key: String, reference: String },
}

/// Errors returned by an [`EvalContext`](crate::EvalContext)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The provider was already initialized in this context.
    ///
    /// This is evaluator misuse, not a runtime condition to tolerate.
    #[error("provider {name} already initialized")]
    AlreadyInitialized { name: String },

    /// No factory is registered for the provider name
    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    /// The provider factory failed
    #[error("failed to initialize provider {name}: {message}")]
    ProviderInit { name: String, message: String },

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
}

/// Result type for evaluation context operations
pub type Result<T> = std::result::Result<T, Error>;
