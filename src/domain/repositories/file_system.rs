//! File system parser trait
//!
//! Defines the interface for parsing file system metadata to find
//! deleted files. This is separate from raw file carving.

use thiserror::Error;

use crate::domain::entities::Candidate;

/// Supported file system types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileSystemType {
    Ntfs,
    Fat32,
    Fat16,
    Unknown,
}

impl FileSystemType {
    pub fn name(&self) -> &'static str {
        match self {
            FileSystemType::Ntfs => "NTFS",
            FileSystemType::Fat32 => "FAT32",
            FileSystemType::Fat16 => "FAT16",
            FileSystemType::Unknown => "unknown",
        }
    }
}

/// Errors that can occur when parsing a file system
#[derive(Error, Debug)]
pub enum FileSystemError {
    #[error("Unsupported file system: {0}")]
    Unsupported(String),

    #[error("Invalid boot sector: {0}")]
    InvalidBootSector(String),

    #[error("Corrupted metadata: {0}")]
    CorruptedMetadata(String),

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("No file system detected")]
    NoFileSystem,

    #[error("File system error: {0}")]
    Other(String),
}

/// A filesystem-specific parser that surfaces deleted-but-parseable entries
/// as [`Candidate`]s with `provenance` = `MetadataNtfs`/`MetadataFat`.
///
/// Error policy (spec §4.D/4.E/§7): a malformed record aborts only that
/// record, never the sweep; implementations must tolerate and skip records
/// with impossible offsets rather than returning `Err` for the whole scan.
pub trait FileSystemParser: Send + Sync {
    /// Detects the file system type from the boot sector.
    fn detect_type(&self) -> Result<FileSystemType, FileSystemError>;

    /// Walks metadata structures (MFT records, or root + sub-directories)
    /// and returns one Candidate per recoverable deleted entry.
    /// `size_cap` bounds bytes attributed to any single candidate (spec
    /// §4.E's "safety ceiling"). `should_continue` is polled between
    /// records/entries for cooperative cancellation (spec §5).
    fn find_deleted_entries(
        &self,
        size_cap: u64,
        should_continue: &dyn Fn() -> bool,
    ) -> Result<Vec<Candidate>, FileSystemError>;

    /// Returns the filesystem type this parser handles.
    fn filesystem_type(&self) -> FileSystemType;

    fn is_healthy(&self) -> bool;
}
