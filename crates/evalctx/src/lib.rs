//! # evalctx
//!
//! The execution context a dependency-graph evaluator hands to each node.
//!
//! A node uses it to get an initialized provider and to resolve its
//! interpolated configuration before acting on a resource. The context is
//! the only thing shared between concurrently evaluated nodes.
//!
//! ## Core Concepts
//!
//! - [`EvalContext`]: the capability trait (`init_provider`, `provider`, `interpolate`)
//! - [`BuiltinEvalContext`]: production implementation over provider factories
//! - [`RecordingEvalContext`]: programmable double that records its calls
//! - [`RawConfig`] / [`ResolvedConfig`]: configuration before and after interpolation
//! - [`GraphState`]: variables and already evaluated nodes, read by interpolation
//!
//! ## Example
//!
//! ```
//! use evalctx::{BuiltinEvalContext, EvalContext, GraphState, RawConfig, Resource};
//! use reconcile::{ProviderHandle, RecordingProvider};
//! use std::sync::Arc;
//!
//! let state = Arc::new(GraphState::new(
//!     [("env".to_string(), "prod".to_string())].into_iter().collect(),
//! ));
//! let ctx = BuiltinEvalContext::new(state)
//!     .with_factory("local", |name: &str| {
//!         Ok(Arc::new(RecordingProvider::new(name)) as ProviderHandle)
//!     });
//!
//! let provider = ctx.init_provider("local").unwrap();
//! assert_eq!(provider.name(), "local");
//!
//! let raw = RawConfig::parse([("id", "web-${var.env}"), ("tags.Name", "${self.id}")]).unwrap();
//! let resolved = ctx.interpolate(&raw, Some(&Resource::new("web", "local"))).unwrap();
//! assert_eq!(resolved.section("tags").get("Name"), Some("web-prod"));
//! ```

pub mod builtin;
pub mod config;
pub mod context;
pub mod error;
pub mod interpolate;
pub mod mock;
pub mod state;

// Re-export main types at crate root
pub use builtin::{BuiltinEvalContext, ProviderFactory};
pub use config::{RawConfig, Reference, ResolvedConfig, Resource, Segment, Template};
pub use context::EvalContext;
pub use error::{Error, InterpolationError, Result, TemplateError};
pub use interpolate::interpolate;
pub use mock::{EvalCall, RecordingEvalContext};
pub use state::GraphState;
