//! Scheduler layer
//!
//! A generic dependency graph of async tasks, and the deploy pipeline
//! wired on top of it.

pub mod graph;
pub mod pipeline;

pub use graph::{GraphError, GraphReport, TaskGraph, TaskOutcome};
pub use pipeline::{DeployReport, Pipeline, Stage};
