//! Scan device use case — the Orchestrator (spec §4.I).
//!
//! Drives metadata recovery (4.D/4.E) and/or carving (4.F) according to the
//! selected scan mode, then validation (4.G), dedup (4.H), and manifest
//! assembly (§6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::application::dto::{default_chunk_size, ScanMode, ScanOptions, ScanPhase, ScanProgress};
use crate::domain::entities::{Candidate, Manifest, ScanInfo};
use crate::domain::repositories::{BlockSource, FileSystemParser};
use crate::domain::services::{apply_verdict, deduplicate, hash_range, validate_carved, validate_metadata, SignatureRegistry};
use crate::infrastructure::carver::{carve, CarveOptions};
use crate::infrastructure::file_systems::{FatParser, NtfsParser};

pub type ProgressCallback = Box<dyn Fn(&ScanProgress) + Send + Sync>;

/// Metadata-recovered NTFS files default to a 50 MiB safety ceiling (spec
/// §4.E / the Open Question resolution recorded in `SPEC_FULL.md`).
const NTFS_SIZE_CAP: u64 = 50 * 1024 * 1024;
/// Quick/carving mode's reduced carving ceiling.
const QUICK_SIZE_CAP: u64 = 20 * 1024 * 1024;

pub struct ScanDeviceUseCase {
    registry: Arc<SignatureRegistry>,
}

impl ScanDeviceUseCase {
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self { registry }
    }

    pub fn with_default_registry() -> Self {
        Self::new(Arc::new(SignatureRegistry::with_defaults()))
    }

    /// Executes a scan over `source`, returning the assembled manifest.
    /// `cancel` is polled between chunks/records (spec §5's cooperative
    /// cancellation); a cancellation mid-scan still yields a manifest, with
    /// `incomplete=true`.
    pub fn execute<S: BlockSource + 'static>(
        &self,
        source: Arc<S>,
        options: &ScanOptions,
        cancel: Arc<AtomicBool>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<Manifest> {
        let start = Instant::now();
        let total_len = source.length();
        let chunk_size = options.chunk_size.unwrap_or_else(|| default_chunk_size(total_len));
        let should_continue = || !cancel.load(Ordering::Relaxed);

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut sectors_scanned: u64 = 0;

        let report = |pct: f64, files: usize, phase: ScanPhase| {
            if let Some(cb) = progress_callback.as_ref() {
                cb(&ScanProgress {
                    progress_pct: pct.clamp(0.0, 100.0),
                    sectors_visited: sectors_scanned,
                    files_found: files,
                    phase,
                });
            }
        };

        match options.mode {
            ScanMode::Normal => {
                let meta = self.run_metadata_phase(&source, &should_continue)?;
                sectors_scanned = total_len / source.sector_size().max(1) as u64;
                candidates = self.validate_metadata_candidates(&source, meta);
                candidates = filter_important(candidates, &self.registry, &options.extension_filter);
                report(100.0, candidates.len(), ScanPhase::Metadata);
            }
            ScanMode::Carving => {
                let carved = self.run_carving_phase(&source, &self.registry, None, chunk_size, &cancel, |p| {
                    sectors_scanned = p.bytes_visited / source.sector_size().max(1) as u64;
                    report(p.bytes_visited as f64 / total_len.max(1) as f64 * 100.0, p.files_found, ScanPhase::Carving);
                })?;
                candidates = self.validate_carved_candidates(&source, carved);
            }
            ScanMode::Quick => {
                let registry = Arc::new(SignatureRegistry::quick_defaults());
                let carved = self.run_carving_phase(&source, &registry, Some(QUICK_SIZE_CAP), chunk_size, &cancel, |p| {
                    sectors_scanned = p.bytes_visited / source.sector_size().max(1) as u64;
                    report(p.bytes_visited as f64 / total_len.max(1) as f64 * 100.0, p.files_found, ScanPhase::Carving);
                })?;
                candidates = self.validate_carved_candidates(&source, carved);
            }
            ScanMode::Deep => {
                let meta = self.run_metadata_phase(&source, &should_continue)?;
                let mut validated_meta = self.validate_metadata_candidates(&source, meta);
                report(40.0, validated_meta.len(), ScanPhase::Metadata);

                let carved = self.run_carving_phase(&source, &self.registry, None, chunk_size, &cancel, |p| {
                    sectors_scanned = p.bytes_visited / source.sector_size().max(1) as u64;
                    let pct = 40.0 + (p.bytes_visited as f64 / total_len.max(1) as f64) * 50.0;
                    report(pct, p.files_found + validated_meta.len(), ScanPhase::Carving);
                })?;
                let mut validated_carved = self.validate_carved_candidates(&source, carved);

                validated_meta.append(&mut validated_carved);
                let outcome = deduplicate(validated_meta);
                candidates = outcome.winners;
                report(100.0, candidates.len(), ScanPhase::Deduplicating);
            }
        }

        candidates.sort_by_key(sort_key);

        let incomplete = cancel.load(Ordering::Relaxed);
        let duration = start.elapsed();

        let scan_info = ScanInfo {
            mode: mode_name(options.mode).to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            source_id: source.identity().to_string(),
            total_sectors_scanned: sectors_scanned,
            scan_duration_seconds: duration.as_secs_f64(),
            incomplete,
        };

        Ok(Manifest::new(scan_info, &options.output_dir, &candidates))
    }

    fn run_metadata_phase<S: BlockSource>(
        &self,
        source: &Arc<S>,
        should_continue: &dyn Fn() -> bool,
    ) -> Result<Vec<Candidate>> {
        if let Ok(parser) = NtfsParser::new(Arc::clone(source)) {
            log::info!("detected NTFS volume on {}", source.identity());
            return parser
                .find_deleted_entries(NTFS_SIZE_CAP, should_continue)
                .context("NTFS MFT walk failed");
        }
        if let Ok(parser) = FatParser::new(Arc::clone(source)) {
            log::info!("detected FAT volume on {}", source.identity());
            return parser
                .find_deleted_entries(u64::MAX, should_continue)
                .context("FAT directory walk failed");
        }
        log::warn!("no recognized filesystem on {}; metadata phase found nothing", source.identity());
        Ok(Vec::new())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_carving_phase<S: BlockSource, F: FnMut(crate::infrastructure::carver::CarveProgress)>(
        &self,
        source: &Arc<S>,
        registry: &SignatureRegistry,
        size_cap_override: Option<u64>,
        chunk_size: usize,
        cancel: &Arc<AtomicBool>,
        on_progress: F,
    ) -> Result<Vec<Candidate>> {
        let mut next_id = 0u64;
        let candidates = carve(
            source.as_ref(),
            registry,
            &CarveOptions { chunk_size, size_cap_override, ..Default::default() },
            cancel,
            || {
                next_id += 1;
                next_id
            },
            on_progress,
        )
        .context("carving sweep failed")?;
        Ok(candidates)
    }

    fn validate_carved_candidates<S: BlockSource>(&self, source: &S, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter_map(|mut c| {
                let signature = self.registry.by_type_key(&c.type_key)?;
                let offset = c.offset()?;
                let data = source.read_at(offset, c.declared_size as usize).ok()?;
                match validate_carved(signature, &data) {
                    crate::domain::services::Verdict::Reject => None,
                    verdict => {
                        apply_verdict(&mut c, verdict);
                        let digest = crate::domain::services::hash_bytes(&data);
                        c.md5 = Some(digest.md5);
                        c.sha256 = Some(digest.sha256);
                        Some(c)
                    }
                }
            })
            .collect()
    }

    fn validate_metadata_candidates<S: BlockSource>(&self, source: &S, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter_map(|mut c| {
                let data = read_candidate_bytes(source, &c).ok()?;
                match validate_metadata(&data) {
                    crate::domain::services::Verdict::Reject => None,
                    verdict => {
                        apply_verdict(&mut c, verdict);
                        let digest = if let Some(offset) = c.offset() {
                            hash_range(source, offset, c.declared_size).unwrap_or_else(|_| crate::domain::services::hash_bytes(&data))
                        } else {
                            crate::domain::services::hash_bytes(&data)
                        };
                        c.md5 = Some(digest.md5);
                        c.sha256 = Some(digest.sha256);
                        Some(c)
                    }
                }
            })
            .collect()
    }
}

/// Reads a candidate's full declared byte range, honoring `offset` or
/// walking `runs` (spec §4.J step 2), substituting zeros for the NTFS
/// sparse-run sentinel.
pub fn read_candidate_bytes<S: BlockSource>(source: &S, candidate: &Candidate) -> Result<Vec<u8>, crate::domain::repositories::BlockSourceError> {
    if let Some(offset) = candidate.offset() {
        return source.read_at(offset, candidate.declared_size as usize);
    }

    let runs = candidate.runs().unwrap_or(&[]);
    let cluster_size = infer_cluster_size(source);
    let mut data = Vec::with_capacity(candidate.declared_size as usize);
    for run in runs {
        if data.len() as u64 >= candidate.declared_size {
            break;
        }
        if run.first_cluster == u64::MAX {
            let zeros = run.cluster_count * cluster_size;
            data.extend(std::iter::repeat(0u8).take(zeros as usize));
            continue;
        }
        let offset = run.first_cluster * cluster_size;
        let want = run.cluster_count * cluster_size;
        let chunk = source.read_at(offset, want as usize)?;
        data.extend(chunk);
    }
    data.truncate(candidate.declared_size as usize);
    Ok(data)
}

/// The cluster size isn't carried on `Candidate` (runs are source-relative),
/// so the extractor infers it from the source's reported sector size the
/// same way the NTFS/FAT parsers derive it from the boot sector — 8
/// sectors per cluster is this crate's synthetic-image default and a very
/// common real-world NTFS/FAT32 default (4 KiB clusters at 512-byte sectors).
fn infer_cluster_size<S: BlockSource>(source: &S) -> u64 {
    source.sector_size() as u64 * 8
}

/// Manifest candidate order is deterministic (spec §5): `(provenance,
/// offset)`. `Deep` mode's winners come out of a hash map in arbitrary
/// order and must be sorted before assembly; the other modes happen to
/// already emit offset-ordered hits, but sorting here keeps that an
/// invariant instead of an accident of iteration order.
fn sort_key(c: &Candidate) -> (u8, u64) {
    let offset = c.offset().unwrap_or_else(|| c.runs().and_then(|r| r.first()).map(|r| r.first_cluster).unwrap_or(u64::MAX));
    (c.provenance.dedup_priority(), offset)
}

fn mode_name(mode: ScanMode) -> &'static str {
    match mode {
        ScanMode::Normal => "normal",
        ScanMode::Carving => "carving",
        ScanMode::Deep => "deep",
        ScanMode::Quick => "quick",
    }
}

fn filter_important(
    candidates: Vec<Candidate>,
    registry: &SignatureRegistry,
    explicit_filter: &std::collections::HashSet<String>,
) -> Vec<Candidate> {
    if !explicit_filter.is_empty() {
        return candidates
            .into_iter()
            .filter(|c| explicit_filter.contains(&c.extension.to_lowercase()))
            .collect();
    }
    candidates
        .into_iter()
        .filter(|c| {
            registry
                .signatures()
                .iter()
                .find(|s| s.extension.eq_ignore_ascii_case(&c.extension))
                .map(|s| s.importance)
                .unwrap_or(true) // extensions outside the registry aren't filtered out
        })
        .collect()
}
