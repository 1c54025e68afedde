//! Infrastructure layer
//!
//! Concrete implementations of the domain repositories and services.
//! This layer contains all external dependencies and platform-specific code.

pub mod block_source;
pub mod carver;
pub mod file_systems;
pub mod persistence;
