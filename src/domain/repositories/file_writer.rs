//! File writer trait
//!
//! Defines the interface the Extractor (spec §4.J) uses to materialize
//! candidate bytes to the local filesystem.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::entities::Candidate;

/// Errors that can occur when writing recovered files
#[derive(Error, Debug)]
pub enum FileWriterError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Write error: {0}")]
    Other(String),
}

/// Options governing a single extraction run (spec §4.J / §9: an immutable,
/// per-run options record — no process-wide mutable state).
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// A byte budget for the whole extraction run (spec §4.J's "a budget
    /// may limit total bytes written per recovery run").
    pub byte_budget: Option<u64>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { byte_budget: None }
    }
}

/// Result of writing a single candidate's bytes to storage.
#[derive(Debug, Clone)]
pub struct WriteResult {
    pub candidate_id: u64,
    pub saved_path: PathBuf,
    pub saved_size: u64,
    /// True if the re-verified SHA-256 did not match the manifest's
    /// recorded hash (spec §4.J(3): still written, under a `.mismatch` suffix).
    pub hash_mismatch: bool,
}

/// Writes extracted candidate bytes to the local filesystem, honoring the
/// collision (`.dup{N}`) and mismatch (`.mismatch`) suffix rules of spec §4.J.
pub trait RecoveredFileWriter: Send + Sync {
    fn new(output_dir: &Path) -> Result<Self, FileWriterError>
    where
        Self: Sized;

    /// Writes `data` (the candidate's re-read, re-hashed bytes) under a name
    /// derived from `candidate`. `data_sha256` is the freshly recomputed
    /// digest; `hash_mismatch` is set when it differs from `candidate.sha256`.
    fn write(
        &self,
        candidate: &Candidate,
        data: &[u8],
        hash_mismatch: bool,
    ) -> Result<WriteResult, FileWriterError>;

    fn output_dir(&self) -> &Path;

    fn files_written(&self) -> usize;

    fn bytes_written(&self) -> u64;
}
