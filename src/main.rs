//! Read-only data-recovery engine: NTFS/FAT32 metadata recovery and
//! signature carving for block storage devices.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use argos_recover::application::dto::ScanOptions;
use argos_recover::application::{RecoverFilesUseCase, ScanDeviceUseCase};
use argos_recover::domain::entities::Manifest;
use argos_recover::domain::repositories::{BlockSource, RecoveredFileWriter, WriteOptions};
use argos_recover::domain::services::SignatureRegistry;
use argos_recover::infrastructure::block_source::MmapBlockSource;
use argos_recover::infrastructure::persistence::{read_manifest, write_manifest, LocalFileWriter};
use argos_recover::presentation::cli::{parse_extension_filter, Cli, Commands, ProgressReporter};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Scan { source, output, mode, types, chunk_size } => {
            run_scan(&source, &output.to_string_lossy(), mode.into(), types, chunk_size)?;
        }
        Commands::Extract { source, manifest, output, byte_budget } => {
            run_extract(&source, &manifest, &output, byte_budget)?;
        }
        Commands::ListSignatures => {
            list_signatures();
        }
        Commands::Info { source } => {
            show_source_info(&source)?;
        }
    }

    Ok(())
}

fn run_scan(
    source_path: &str,
    output_dir: &str,
    mode: argos_recover::application::dto::ScanMode,
    types: Option<Vec<String>>,
    chunk_size_mib: Option<usize>,
) -> Result<()> {
    println!("Scanning: {source_path}");

    let source = Arc::new(
        MmapBlockSource::open(source_path)
            .context("failed to open source. Make sure you have read permissions (try sudo)")?,
    );

    println!("Source size: {}", format_bytes(source.length()));

    let mut options = ScanOptions::new(mode, output_dir).with_extension_filter(parse_extension_filter(types));
    if let Some(mib) = chunk_size_mib {
        options = options.with_chunk_size(mib * 1024 * 1024);
    }

    let progress = ProgressReporter::for_scan();
    let use_case = ScanDeviceUseCase::with_default_registry();
    let cancel = Arc::new(AtomicBool::new(false));

    let manifest = use_case.execute(source, &options, cancel, Some(progress.scan_callback()))?;
    progress.finish("Scan complete");

    println!(
        "Found {} files ({} bytes total)",
        manifest.statistics.total_files, manifest.statistics.total_size_bytes
    );

    std::fs::create_dir_all(output_dir)?;
    let manifest_path = format!("{output_dir}/manifest.json");
    write_manifest(&manifest, std::path::Path::new(&manifest_path))?;
    println!("Manifest written to: {manifest_path}");

    Ok(())
}

fn run_extract(source_path: &str, manifest_path: &std::path::Path, output_dir: &std::path::Path, byte_budget: Option<u64>) -> Result<()> {
    println!("Source: {source_path}");
    println!("Output: {}", output_dir.display());

    let source = MmapBlockSource::open(source_path)
        .context("failed to open source. Make sure you have read permissions (try sudo)")?;

    let manifest: Manifest = read_manifest(manifest_path).context("failed to read manifest")?;
    let candidates = candidates_from_manifest(&manifest);

    if candidates.is_empty() {
        println!("Manifest contains no files to extract.");
        return Ok(());
    }

    let write_options = WriteOptions { byte_budget };
    let writer = LocalFileWriter::new(output_dir)?;
    let progress = ProgressReporter::for_extraction(candidates.len() as u64);
    let use_case = RecoverFilesUseCase::new(writer);
    let cancel = Arc::new(AtomicBool::new(false));

    let result = use_case.execute(&source, &candidates, &write_options, cancel, Some(progress.extraction_callback()))?;
    progress.finish("Extraction complete");

    println!(
        "{} files written, {} bytes, {} mismatches, {:.2}s",
        result.files_written,
        result.bytes_written,
        result.mismatches,
        result.duration.as_secs_f64()
    );
    if result.budget_exhausted {
        println!("Byte budget exhausted before every candidate was written.");
    }
    for error in &result.errors {
        eprintln!("error: {error}");
    }

    Ok(())
}

/// Reconstructs extraction-ready [`Candidate`](argos_recover::domain::entities::Candidate)s
/// from a manifest's `files` entries (spec §9: the manifest is the
/// interchange format between `scan` and `extract`).
fn candidates_from_manifest(manifest: &Manifest) -> Vec<argos_recover::domain::entities::Candidate> {
    use argos_recover::domain::entities::{Candidate, ClusterRun, Provenance};

    manifest
        .files
        .iter()
        .enumerate()
        .map(|(id, file)| {
            let provenance = match file.method.as_str() {
                "metadata_ntfs" => Provenance::MetadataNtfs,
                "metadata_fat" => Provenance::MetadataFat,
                _ => Provenance::Carving,
            };
            let without_ext = file
                .filename
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(file.filename.as_str());
            let stem = without_ext.strip_suffix(".partial").unwrap_or(without_ext);

            let mut candidate = if let Some(offset) = file.offset {
                Candidate::from_offset(id as u64, provenance, file.source_id.clone(), offset, file.size_bytes, stem, file.file_type.clone(), file.extension.clone())
            } else {
                let runs = file
                    .runs
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(first, count)| ClusterRun::new(first, count))
                    .collect();
                Candidate::from_runs(id as u64, provenance, file.source_id.clone(), runs, file.size_bytes, stem, file.file_type.clone(), file.extension.clone())
            };
            candidate.validation_score = file.validation_score;
            candidate.is_partial = file.is_partial;
            candidate.md5 = Some(file.md5.clone());
            candidate.sha256 = Some(file.sha256.clone());
            candidate
        })
        .collect()
}

fn list_signatures() {
    println!("Supported file signatures:\n");
    let registry = SignatureRegistry::with_defaults();
    for signature in registry.signatures() {
        let header_hex: Vec<String> = signature.header.iter().map(|b| format!("{b:02X}")).collect();
        let footer_hex = signature
            .footer
            .map(|f| f.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "));
        print!("  {:10} .{:6} header: {}", signature.type_key, signature.extension, header_hex.join(" "));
        if let Some(footer) = footer_hex {
            print!(" | footer: {footer}");
        }
        println!(" | max: {}", format_bytes(signature.max_size));
    }
}

fn show_source_info(source_path: &str) -> Result<()> {
    let source = MmapBlockSource::open(source_path)
        .context("failed to open source. Make sure you have read permissions (try sudo)")?;
    let info = source.device_info();

    println!("Identity:   {}", info.identity);
    println!("Size:       {} ({} bytes)", format_bytes(info.length), info.length);
    println!("Sector size: {} bytes", info.sector_size);
    println!("Sectors:    {}", info.sector_count());
    println!("Read-only:  {}", info.read_only);

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
