//! Recover files use case — the Extractor (spec §4.J).
//!
//! Re-reads each selected candidate's byte range from the source, re-hashes
//! it, and writes it to disk via a [`RecoveredFileWriter`], honoring a byte
//! budget and the collision/mismatch suffix rules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::application::dto::ExtractionResult;
use crate::application::scan_device::read_candidate_bytes;
use crate::domain::entities::Candidate;
use crate::domain::repositories::{BlockSource, RecoveredFileWriter, WriteOptions};
use crate::domain::services::hash_bytes;

pub type ExtractionProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Extractor use case: writes a selected subset of a manifest's candidates
/// to disk through `W`.
pub struct RecoverFilesUseCase<W: RecoveredFileWriter> {
    writer: W,
}

impl<W: RecoveredFileWriter> RecoverFilesUseCase<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Extracts every candidate in `manifest.files` whose `candidate_ids`
    /// membership passes `selector` (pass `|_| true` to extract everything).
    /// `cancel` is polled between candidates; `write_options.byte_budget`
    /// stops the run cleanly once exhausted (spec §4.J: "stops cleanly").
    pub fn execute<S: BlockSource>(
        &self,
        source: &S,
        candidates: &[Candidate],
        write_options: &WriteOptions,
        cancel: Arc<AtomicBool>,
        progress_callback: Option<ExtractionProgressCallback>,
    ) -> Result<ExtractionResult> {
        let start = Instant::now();
        let total = candidates.len();
        let mut result = ExtractionResult::new(self.writer.output_dir().to_path_buf());
        let mut budget_remaining = write_options.byte_budget;

        for (index, candidate) in candidates.iter().enumerate() {
            if let Some(cb) = progress_callback.as_ref() {
                cb(index + 1, total);
            }
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            if let Some(remaining) = budget_remaining {
                if remaining == 0 {
                    result.budget_exhausted = true;
                    log::info!("byte budget exhausted after {} of {} candidates", index, total);
                    break;
                }
            }

            let data = match read_candidate_bytes(source, candidate) {
                Ok(d) => d,
                Err(e) => {
                    result.errors.push(format!("candidate {}: read failed: {e}", candidate.id));
                    continue;
                }
            };

            let data = if let Some(remaining) = budget_remaining {
                if (data.len() as u64) > remaining {
                    result.budget_exhausted = true;
                    let truncated = &data[..remaining as usize];
                    truncated.to_vec()
                } else {
                    data
                }
            } else {
                data
            };

            let fresh = hash_bytes(&data);
            let hash_mismatch = candidate
                .sha256
                .as_ref()
                .map(|recorded| recorded != &fresh.sha256)
                .unwrap_or(false);

            match self.writer.write(candidate, &data, hash_mismatch) {
                Ok(write_result) => {
                    result.files_written += 1;
                    result.bytes_written += write_result.saved_size;
                    if hash_mismatch {
                        result.mismatches += 1;
                    }
                    if let Some(remaining) = budget_remaining.as_mut() {
                        *remaining = remaining.saturating_sub(write_result.saved_size);
                    }
                }
                Err(e) => {
                    result.errors.push(format!("candidate {}: write failed: {e}", candidate.id));
                }
            }

            if result.budget_exhausted {
                break;
            }
        }

        result.duration = start.elapsed();
        log::info!(
            "extraction complete: {} files written, {} mismatches, {:.2}s",
            result.files_written,
            result.mismatches,
            result.duration.as_secs_f64()
        );

        Ok(result)
    }
}
