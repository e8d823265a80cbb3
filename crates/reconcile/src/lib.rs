//! # Reconcile
//!
//! Convergence of a resource's declared key-value attributes against a
//! remote provider.
//!
//! Remote attribute APIs of this kind are additive: writing a set of keys
//! leaves every other key in place, so dropping a key needs an explicit
//! delete. The engine computes the minimal delete/create pair and issues
//! them in that order.
//!
//! ## Core Concepts
//!
//! - **AttributeSet**: unique-keyed string map of a resource's attributes
//! - **diff**: create set (the full desired set) and remove set (dropped or changed prior entries)
//! - **apply**: delete, then create, through a [`Provider`]
//! - **Provider**: the two-call transport contract any remote API must offer
//!
//! ## Example
//!
//! ```
//! use reconcile::{AttributeSet, RecordingProvider, apply};
//!
//! let prior: AttributeSet = [("Name", "web"), ("Env", "dev")].into_iter().collect();
//! let desired: AttributeSet = [("Name", "web"), ("Env", "prod")].into_iter().collect();
//!
//! let provider = RecordingProvider::new("local").with_remote("i-123", prior.clone());
//! let report = apply(&provider, "i-123", &prior, &desired).unwrap();
//!
//! assert_eq!(report.removed, 1);
//! assert_eq!(provider.remote("i-123"), desired);
//! ```

pub mod apply;
pub mod attrs;
pub mod diff;
pub mod error;
pub mod provider;

// Re-export main types at crate root
pub use apply::{ApplyReport, apply, needs_apply};
pub use attrs::{
    AttributeSet, LaunchTag, Tag, TaggedAttributeSet, TaggedValue, decode_launch_tags, decode_tags,
};
pub use diff::{AttributeChange, AttributeDiff, DiffSummary, changes, diff};
pub use error::{DecodeError, TransportError};
pub use provider::{Provider, ProviderCall, ProviderHandle, RecordingProvider};
