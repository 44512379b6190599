//! # composer-compose
//!
//! Loader and planner for multi-service composition documents.
//!
//! Handles:
//! - **Loader**: YAML parsing and structural validation into a [`model::CompositionSpec`].
//! - **Graph**: Dependency graph construction over service names.
//! - **Plan**: Kahn layering into batches of concurrently startable services.
//! - **Resolver**: Link environment variables between dependent services.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod document;
pub mod graph;
pub mod loader;
pub mod model;
pub mod plan;
pub mod resolver;

pub use graph::DependencyGraph;
pub use loader::{find_compose_file, load_file, load_str};
pub use model::{CompositionSpec, ServiceSpec};
pub use plan::StartPlan;
