//! End-to-end scans over synthetic sources, exercising the Orchestrator and
//! Extractor together (the scenarios named in `SPEC_FULL.md`'s testable
//! properties section).

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use argos_recover::application::dto::{ScanMode, ScanOptions};
use argos_recover::application::{RecoverFilesUseCase, ScanDeviceUseCase};
use argos_recover::domain::repositories::{BlockSource, RecoveredFileWriter, WriteOptions};
use argos_recover::infrastructure::block_source::MmapBlockSource;
use argos_recover::infrastructure::persistence::LocalFileWriter;

fn write_source(data: &[u8]) -> (tempfile::NamedTempFile, Arc<MmapBlockSource>) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    let source = Arc::new(MmapBlockSource::open(file.path().to_str().unwrap()).unwrap());
    (file, source)
}

#[test]
fn carves_single_well_formed_jpeg_at_known_offset() {
    let mut data = vec![0u8; 4 * 1024 * 1024];
    let offset = 1_048_576usize;
    let mut jpeg = vec![0xFFu8, 0xD8, 0xFF];
    jpeg.extend(std::iter::repeat(0x42u8).take(120 * 1024 - 5));
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    data[offset..offset + jpeg.len()].copy_from_slice(&jpeg);

    let (_file, source) = write_source(&data);
    let dir = tempfile::tempdir().unwrap();
    let options = ScanOptions::new(ScanMode::Carving, dir.path().to_string_lossy());
    let use_case = ScanDeviceUseCase::with_default_registry();
    let manifest = use_case
        .execute(source, &options, Arc::new(AtomicBool::new(false)), None)
        .unwrap();

    let jpegs: Vec<_> = manifest.files.iter().filter(|f| f.file_type == "jpeg").collect();
    assert_eq!(jpegs.len(), 1);
    assert_eq!(jpegs[0].offset, Some(offset as u64));
    assert_eq!(jpegs[0].size_bytes, jpeg.len() as u64);
    assert!(!jpegs[0].is_partial);
    assert!(jpegs[0].validation_score >= 95);
}

#[test]
fn truncated_png_is_partial_with_suffix_and_midrange_score() {
    let mut data = vec![0u8; 2 * 1024 * 1024];
    let mut png = vec![0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend(std::iter::repeat(0x11u8).take(50 * 1024 - 8));
    data[0..png.len()].copy_from_slice(&png);

    let (_file, source) = write_source(&data);
    let dir = tempfile::tempdir().unwrap();
    let options = ScanOptions::new(ScanMode::Carving, dir.path().to_string_lossy());
    let use_case = ScanDeviceUseCase::with_default_registry();
    let manifest = use_case
        .execute(source, &options, Arc::new(AtomicBool::new(false)), None)
        .unwrap();

    let pngs: Vec<_> = manifest.files.iter().filter(|f| f.file_type == "png").collect();
    assert_eq!(pngs.len(), 1);
    assert!(pngs[0].is_partial);
    assert!((30..=69).contains(&pngs[0].validation_score));
    assert!(pngs[0].filename.ends_with(".partial.png"));
}

#[test]
fn deep_mode_collapses_identical_content_at_two_offsets() {
    // Two copies of the same JPEG bytes at different offsets: deep mode's
    // deduplicator is keyed on SHA-256 (domain::services::deduplicator), so
    // identical content at different offsets must collapse to one winner,
    // exactly spec §4.H / scenario 5.
    let mut data = vec![0u8; 512 * 1024];
    let mut jpeg = vec![0xFFu8, 0xD8, 0xFF];
    jpeg.extend(std::iter::repeat(0x99u8).take(200));
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    data[1000..1000 + jpeg.len()].copy_from_slice(&jpeg);
    data[300_000..300_000 + jpeg.len()].copy_from_slice(&jpeg);

    let (_file, source) = write_source(&data);
    let dir = tempfile::tempdir().unwrap();
    let options = ScanOptions::new(ScanMode::Deep, dir.path().to_string_lossy());
    let use_case = ScanDeviceUseCase::with_default_registry();
    let manifest = use_case
        .execute(source, &options, Arc::new(AtomicBool::new(false)), None)
        .unwrap();

    let jpegs: Vec<_> = manifest.files.iter().filter(|f| f.file_type == "jpeg").collect();
    assert_eq!(jpegs.len(), 1, "identical content at two offsets must collapse to a single winner");
    assert_eq!(manifest.statistics.duplicates_collapsed, 1);
}

#[test]
fn cancellation_mid_scan_yields_incomplete_but_valid_manifest() {
    let size = 64 * 1024 * 1024;
    let data = vec![0u8; size];
    let (_file, source) = write_source(&data);
    let dir = tempfile::tempdir().unwrap();
    let options = ScanOptions::new(ScanMode::Deep, dir.path().to_string_lossy()).with_chunk_size(1024 * 1024);
    let use_case = ScanDeviceUseCase::with_default_registry();

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_for_callback = Arc::clone(&cancel);

    let progress_cb: Box<dyn Fn(&argos_recover::application::dto::ScanProgress) + Send + Sync> =
        Box::new(move |progress| {
            if progress.progress_pct > 10.0 {
                cancel_for_callback.store(true, Ordering::Relaxed);
            }
        });

    let manifest = use_case.execute(source, &options, cancel, Some(progress_cb)).unwrap();

    assert!(manifest.scan_info.incomplete);
    let json = manifest.to_json_pretty().unwrap();
    assert!(argos_recover::domain::entities::Manifest::from_json(&json).is_ok());
}

#[test]
fn scan_then_extract_round_trips_hash() {
    let mut data = vec![0u8; 256 * 1024];
    let mut jpeg = vec![0xFFu8, 0xD8, 0xFF];
    jpeg.extend(std::iter::repeat(0x7Au8).take(500));
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    data[4096..4096 + jpeg.len()].copy_from_slice(&jpeg);

    let (_file, source) = write_source(&data);
    let scan_dir = tempfile::tempdir().unwrap();
    let options = ScanOptions::new(ScanMode::Carving, scan_dir.path().to_string_lossy());
    let use_case = ScanDeviceUseCase::with_default_registry();
    let manifest = use_case
        .execute(Arc::clone(&source), &options, Arc::new(AtomicBool::new(false)), None)
        .unwrap();

    assert_eq!(manifest.files.len(), 1);
    let recorded_sha256 = manifest.files[0].sha256.clone();

    let candidate = argos_recover::domain::entities::Candidate::from_offset(
        0,
        argos_recover::domain::entities::Provenance::Carving,
        source.identity().to_string(),
        manifest.files[0].offset.unwrap(),
        manifest.files[0].size_bytes,
        "photo",
        "jpeg",
        "jpg",
    );

    let out_dir = tempfile::tempdir().unwrap();
    let writer = LocalFileWriter::new(out_dir.path()).unwrap();
    let extractor = RecoverFilesUseCase::new(writer);
    let result = extractor
        .execute(source.as_ref(), &[candidate], &WriteOptions::default(), Arc::new(AtomicBool::new(false)), None)
        .unwrap();

    assert_eq!(result.files_written, 1);
    assert_eq!(result.mismatches, 0);

    let written = std::fs::read(out_dir.path().join("photo.jpg")).unwrap();
    let digest = argos_recover::domain::services::hash_bytes(&written);
    assert_eq!(digest.sha256, recorded_sha256);
}
