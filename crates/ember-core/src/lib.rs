//! Ember Core - Foundational types for the Ember animation engine
//!
//! This crate provides the types the other Ember crates depend on:
//! - `ShapeId` - Stable shape identifiers
//! - Error types and Result alias

mod error;
mod id;

pub use error::{EmberError, Result};
pub use id::ShapeId;
