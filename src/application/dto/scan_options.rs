//! Scan options DTO (spec §4.I: Orchestrator inputs).

use std::collections::HashSet;

/// Scan mode — governs which components the Orchestrator drives (spec §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Metadata recovery only (4.D/4.E), no sector sweep.
    Normal,
    /// Carver only (4.F), metadata parsers skipped.
    Carving,
    /// Metadata recovery (phase 1) then full-registry carving (phase 2), deduplicated.
    Deep,
    /// Carver over a small type set with a reduced size ceiling.
    Quick,
}

/// Options for scanning a source.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extensions to keep (lowercase, no dot). Empty means no explicit
    /// filter: `normal` mode falls back to the registry's "important" flag.
    pub extension_filter: HashSet<String>,
    pub mode: ScanMode,
    /// Overrides the buffer-sizing heuristic (spec §4.I) when set.
    pub chunk_size: Option<usize>,
    pub output_dir: String,
}

impl ScanOptions {
    pub fn new(mode: ScanMode, output_dir: impl Into<String>) -> Self {
        Self { extension_filter: HashSet::new(), mode, chunk_size: None, output_dir: output_dir.into() }
    }

    pub fn with_extension_filter(mut self, extensions: HashSet<String>) -> Self {
        self.extension_filter = extensions;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }
}

/// Buffer sizing (spec §4.I): chosen chunk size ≈ 1% of available memory,
/// clamped to [1 MiB, 10 MiB]; sources under 1 GiB use at most 2 MiB. No
/// system-memory-query crate is in the dependency stack (see `DESIGN.md`),
/// so `source_len` stands in for "available memory" as a deterministic proxy.
pub fn default_chunk_size(source_len: u64) -> usize {
    const MIB: u64 = 1024 * 1024;
    if source_len < 1024 * MIB {
        return (2 * MIB).min(source_len.max(1)) as usize;
    }
    let one_percent = source_len / 100;
    one_percent.clamp(MIB, 10 * MIB) as usize
}
