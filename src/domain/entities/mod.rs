//! Domain entities
//!
//! Core business objects that represent the fundamental concepts
//! in the file recovery domain.

mod candidate;
mod manifest;
mod signature;

pub use candidate::{Candidate, CandidateTimestamps, ClusterRun, Extent, FileCategory, Provenance};
pub use manifest::{Manifest, ManifestFile, ScanInfo, Statistics};
pub use signature::Signature;
