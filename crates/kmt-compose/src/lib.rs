//! # kmt-compose
//!
//! Turns a catalog of versioned service definitions plus an application
//! and an environment definition into deployable manifests.
//!
//! Handles:
//! - **Definition**: Typed, eagerly validated definition documents.
//! - **Catalog**: In-memory index of every known service definition.
//! - **Range**: Version range expressions with exact pins and alternatives.
//! - **Resolver**: Semantic-version selection and transitive dependency walk.
//! - **Graph**: Dependency ordering of the resolved set for display.
//! - **Overrides**: Layered environment-variable, label, and replica overrides.
//! - **Emitter**: Params, gateway, deployment, and config-map rendering.
//! - **Loader**: Discovery and concurrent decoding of definition files.
//! - **Pipeline**: catalog, resolve, override, emit, in that order.

pub mod catalog;
pub mod definition;
pub mod emitter;
pub mod graph;
pub mod loader;
pub mod overrides;
pub mod pipeline;
pub mod range;
pub mod resolver;
