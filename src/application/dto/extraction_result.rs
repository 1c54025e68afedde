//! Extraction result DTO (spec §4.J): outcome of writing a selected subset
//! of a manifest's candidates to disk.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub output_dir: PathBuf,
    pub files_written: usize,
    pub bytes_written: u64,
    pub mismatches: usize,
    pub errors: Vec<String>,
    pub duration: Duration,
    /// True if the byte budget was exhausted before every selected
    /// candidate was written (spec §4.J: "stops cleanly when exhausted").
    pub budget_exhausted: bool,
}

impl ExtractionResult {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            files_written: 0,
            bytes_written: 0,
            mismatches: 0,
            errors: Vec::new(),
            duration: Duration::ZERO,
            budget_exhausted: false,
        }
    }
}
