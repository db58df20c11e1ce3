//! # kmt-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire kmt workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives the resolver, the override
//! engine, and the manifest emitter build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
