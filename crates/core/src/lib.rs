//! evolve-core
//!
//! Core library for evolutionary program synthesis over typed programs.
//!
//! This crate defines the program model, the primitive-operation catalog, the
//! random program builder, the reference interpreter, and the fitness
//! evaluation services (single individual and whole population).
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends (the `evolve` CLI, an external generational
//! loop, etc.).

pub mod builder;
pub mod catalog;
pub mod engine;
pub mod model;
pub mod program;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
