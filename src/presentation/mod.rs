//! Presentation layer
//!
//! Thin drivers over the library: the CLI today, any future front end
//! without touching the domain/application layers.

pub mod cli;
