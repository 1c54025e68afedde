//! Block source repository trait — uniform random-access byte stream over
//! a volume, partition, physical disk, or raw disk image.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockSourceError {
    #[error("permission denied opening {0}")]
    PermissionDenied(String),
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("source busy: {0}")]
    SourceBusy(String),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("offset {offset} beyond source size {source_size}")]
    InvalidOffset { offset: u64, source_size: u64 },
    #[error("read error at offset {offset}: {message}")]
    ReadError { offset: u64, message: String },
    #[error("{0}")]
    Other(String),
}

impl BlockSourceError {
    /// Whether a caller may retry this error (spec §7's `IoError{recoverable}`).
    /// Open-time errors (not-found, busy, permission) are not recoverable by
    /// retrying the same read; per-offset read errors are.
    pub fn recoverable(&self) -> bool {
        matches!(self, BlockSourceError::ReadError { .. } | BlockSourceError::IoError(_))
    }
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub identity: String,
    pub length: u64,
    pub sector_size: u32,
    pub read_only: bool,
}

impl DeviceInfo {
    pub fn sector_count(&self) -> u64 {
        self.length / self.sector_size as u64
    }
}

/// A read-only, seekable byte stream identified by an opaque string (spec §6:
/// Windows volume/physical-disk paths, POSIX device paths, or image file
/// paths — the core treats all of them as opaque).
///
/// Contract (spec §4.A): reads are idempotent, never advance an externally
/// visible cursor, and never write. Short reads at end-of-input are returned
/// as a truncated byte vector, not an error.
pub trait BlockSource: Send + Sync {
    fn open(identity: &str) -> Result<Self, BlockSourceError>
    where
        Self: Sized;

    fn device_info(&self) -> DeviceInfo;

    fn identity(&self) -> &str;

    fn length(&self) -> u64;

    fn sector_size(&self) -> u32;

    /// Reads up to `len` bytes starting at `offset`. Returns fewer than
    /// `len` bytes (possibly zero) if `offset + len` exceeds `length()`;
    /// this is not an error condition.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, BlockSourceError>;

    /// Sweeps the source from `start_offset` in chunks of `chunk_size`,
    /// invoking `callback(offset, data)` for each chunk. The callback
    /// returns `false` to stop the sweep early (used for cancellation).
    /// Returns the total number of bytes visited.
    fn read_chunks<F>(
        &self,
        start_offset: u64,
        chunk_size: usize,
        mut callback: F,
    ) -> Result<u64, BlockSourceError>
    where
        F: FnMut(u64, &[u8]) -> bool,
    {
        let mut offset = start_offset;
        let mut visited = 0u64;
        let total = self.length();
        while offset < total {
            let remaining = total - offset;
            let want = (chunk_size as u64).min(remaining) as usize;
            let data = self.read_at(offset, want)?;
            if data.is_empty() {
                break;
            }
            visited += data.len() as u64;
            let keep_going = callback(offset, &data);
            offset += data.len() as u64;
            if !keep_going {
                break;
            }
        }
        Ok(visited)
    }
}
