//! Built-in agents, retry strategies, planner and event renderers.

pub mod agents;
pub mod factory;
pub mod planner;
pub mod process;
pub mod renderers;
pub mod strategies;

pub use factory::{build_planner, build_registry, build_renderer, build_runtime};
