//! Evaluation engine for attune
//!
//! The engine orchestrates:
//! 1. Graph - order resources by the references between them
//! 2. Walking - initialize providers, interpolate, and reconcile each resource
//! 3. Display - render planned and applied attribute changes

pub mod display;
pub mod graph;
pub mod walker;

pub use graph::Graph;
pub use walker::{Walk, WalkOptions, record_results, walk};
