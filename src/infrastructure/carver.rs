//! Carver (spec §4.F) — chunked sweep of the Block source, header/footer
//! boundary detection, size capping. Emits unscored [`Candidate`]s; scoring
//! and hashing are the Validator's job (spec §4.G), run by the Orchestrator.
//!
//! Skip-after-rejection policy (spec §4.F(3), an explicitly documented
//! Open Question): this implementation advances by **1 byte** from a
//! rejected header hit, not by `|header|` — the conservative choice that
//! preserves recall for overlapping/nested formats, as the spec's own
//! framing of the tradeoff recommends.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::domain::entities::{Candidate, Provenance, Signature};
use crate::domain::repositories::{BlockSource, BlockSourceError};
use crate::domain::services::SignatureRegistry;

#[derive(Debug, Clone)]
pub struct CarveOptions {
    pub chunk_size: usize,
    /// Overrides every signature's `max_size` downward when set (the
    /// 20 MiB/50 MiB/unbounded policy is decided by the caller per scan
    /// mode; see `SPEC_FULL.md`'s Open Question resolution).
    pub size_cap_override: Option<u64>,
    pub progress_every_bytes: u64,
}

impl Default for CarveOptions {
    fn default() -> Self {
        Self { chunk_size: 4 * 1024 * 1024, size_cap_override: None, progress_every_bytes: 64 * 1024 * 1024 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CarveProgress {
    pub bytes_visited: u64,
    pub total_bytes: u64,
    pub files_found: usize,
}

/// Runs the Carver's sweep over `source` using `registry`'s active
/// signature subset, returning one unscored Candidate per accepted header
/// hit. `next_id` hands out Candidate ids (shared across phases by the
/// Orchestrator, via a shared counter).
pub fn carve<S, F>(
    source: &S,
    registry: &SignatureRegistry,
    options: &CarveOptions,
    cancel: &AtomicBool,
    mut next_id: impl FnMut() -> u64,
    mut on_progress: F,
) -> Result<Vec<Candidate>, BlockSourceError>
where
    S: BlockSource,
    F: FnMut(CarveProgress),
{
    let total = source.length();
    let overlap = registry.max_header_len().saturating_sub(1);
    let chunk_size = options.chunk_size.max(overlap + 1);

    let chunk_starts: Vec<u64> = (0..total).step_by(chunk_size).collect();
    let hits: Mutex<Vec<(u64, &'static str)>> = Mutex::new(Vec::new());
    let type_key_to_sig: std::collections::HashMap<&str, &Signature> =
        registry.signatures().iter().map(|s| (s.type_key, s)).collect();
    let visited = std::sync::atomic::AtomicU64::new(0);

    // Phase 1: parallel header-hit discovery across chunks. Each chunk reads
    // chunk_size + overlap bytes so a header straddling the nominal boundary
    // is still found by the chunk that "owns" its start offset; hits landing
    // in the overlap tail (local_offset >= chunk_size) are discarded here
    // because the next chunk's own primary region begins exactly there.
    let read_errors: Mutex<Vec<BlockSourceError>> = Mutex::new(Vec::new());
    chunk_starts.par_iter().for_each(|&start| {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let want = ((chunk_size + overlap) as u64).min(total - start) as usize;
        let data = match source.read_at(start, want) {
            Ok(d) => d,
            Err(e) => {
                read_errors.lock().push(e);
                return;
            }
        };
        visited.fetch_add(data.len().min(chunk_size) as u64, Ordering::Relaxed);

        let local_hits = registry.find_header_hits(&data);
        let mut owned: Vec<(u64, &'static str)> = local_hits
            .into_iter()
            .filter(|(local, _)| *local < chunk_size)
            .map(|(local, sig)| (start + local as u64, sig.type_key))
            .collect();
        if !owned.is_empty() {
            hits.lock().append(&mut owned);
        }
    });

    if let Some(first_err) = read_errors.into_inner().into_iter().next() {
        // Per-chunk I/O is retried once by the caller's higher-level sweep
        // policy (spec §7); a read failure surfacing here after that means
        // the chunk is unreadable — propagate so the Orchestrator can count
        // it in "unreadable bytes" rather than silently losing coverage.
        return Err(first_err);
    }

    let mut sorted_hits = hits.into_inner();
    sorted_hits.sort_by_key(|(offset, _)| *offset);

    // Phase 2: sequential skip-policy resolution + size determination.
    let mut candidates = Vec::new();
    let mut cursor: u64 = 0;
    let mut last_progress_at = 0u64;

    for (h, type_key) in sorted_hits {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if h < cursor {
            continue;
        }
        let signature = match type_key_to_sig.get(type_key) {
            Some(s) => *s,
            None => continue,
        };

        let effective_max = signature
            .max_size
            .min(options.size_cap_override.unwrap_or(u64::MAX))
            .min(total.saturating_sub(h));

        let read_len = effective_max as usize;
        let data = source.read_at(h, read_len)?;

        let size = determine_size(signature, &data);

        match size {
            Some(size) if size >= signature.min_size && size <= effective_max && size > 0 => {
                let id = next_id();
                let candidate = Candidate::from_offset(
                    id,
                    Provenance::Carving,
                    source.identity().to_string(),
                    h,
                    size,
                    format!("f{h:08x}"),
                    signature.type_key.to_string(),
                    signature.extension.to_string(),
                );
                candidates.push(candidate);
                cursor = h + size;
            }
            _ => {
                cursor = h + 1;
            }
        }

        if visited.load(Ordering::Relaxed) - last_progress_at >= options.progress_every_bytes {
            last_progress_at = visited.load(Ordering::Relaxed);
            on_progress(CarveProgress { bytes_visited: last_progress_at, total_bytes: total, files_found: candidates.len() });
        }
    }

    on_progress(CarveProgress { bytes_visited: visited.load(Ordering::Relaxed), total_bytes: total, files_found: candidates.len() });

    Ok(candidates)
}

/// Determines a carved file's size (spec §4.F(2.a/b)): footer search when
/// the signature defines one, otherwise a format-specific size hint, else a
/// conservative fallback to the signature's max size (left for the
/// Validator to reject or shrink).
fn determine_size(signature: &Signature, data: &[u8]) -> Option<u64> {
    if let Some(footer) = signature.footer {
        let header_len = signature.header.len();
        if data.len() <= header_len {
            return None;
        }
        return data[header_len..]
            .windows(footer.len())
            .position(|w| w == footer)
            .map(|pos| (header_len + pos + footer.len()) as u64);
    }

    match signature.type_key {
        "webp" | "avi" | "wav" => read_riff_size(data),
        _ => Some(signature.max_size.min(data.len() as u64)),
    }
}

/// RIFF container size field: a little-endian u32 at offset 4, counting
/// bytes after that field, so total size = value + 8.
fn read_riff_size(data: &[u8]) -> Option<u64> {
    if data.len() < 8 {
        return None;
    }
    let chunk_size = u32::from_le_bytes(data[4..8].try_into().ok()?) as u64;
    Some(chunk_size + 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::block_source::MmapBlockSource;
    use std::io::Write;

    fn make_source(data: &[u8]) -> (tempfile::NamedTempFile, MmapBlockSource) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        let source = MmapBlockSource::open(file.path().to_str().unwrap()).unwrap();
        (file, source)
    }

    #[test]
    fn carves_single_embedded_jpeg() {
        let mut data = vec![0u8; 4 * 1024 * 1024];
        let jpeg_offset = 1_048_576usize;
        let mut jpeg = vec![0xFFu8, 0xD8, 0xFF];
        jpeg.extend(std::iter::repeat(0xAAu8).take(120 * 1024 - 5));
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        data[jpeg_offset..jpeg_offset + jpeg.len()].copy_from_slice(&jpeg);

        let (_file, source) = make_source(&data);
        let registry = SignatureRegistry::with_defaults();
        let cancel = AtomicBool::new(false);
        let mut next_id = 0u64;

        let candidates = carve(
            &source,
            &registry,
            &CarveOptions { chunk_size: 512 * 1024, ..Default::default() },
            &cancel,
            || {
                next_id += 1;
                next_id
            },
            |_| {},
        )
        .unwrap();

        let jpegs: Vec<_> = candidates.iter().filter(|c| c.type_key == "jpeg").collect();
        assert_eq!(jpegs.len(), 1);
        assert_eq!(jpegs[0].offset(), Some(jpeg_offset as u64));
        assert_eq!(jpegs[0].declared_size, jpeg.len() as u64);
    }
}
