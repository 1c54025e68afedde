//! Manifest — the structured, persisted output of a scan.

use serde::{Deserialize, Serialize};

use super::candidate::Candidate;

/// `scan_info` block of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanInfo {
    pub mode: String,
    pub timestamp: String,
    pub source_id: String,
    pub total_sectors_scanned: u64,
    pub scan_duration_seconds: f64,
    pub incomplete: bool,
}

/// `statistics` block of the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub total_files: u32,
    pub unique_files: u32,
    pub partial_files: u32,
    pub total_size_bytes: u64,
    pub disk_space_used: u64,
    /// Not part of the normative manifest shape in spec §6, but recorded
    /// for spec §4.H's "records the loser count in aggregate statistics"
    /// requirement — serialized as an extra field, additive and harmless
    /// for any consumer that ignores unknown keys.
    pub duplicates_collapsed: u32,
}

/// One entry of the manifest's `files` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub filename: String,
    pub proposed_path: String,
    pub size_bytes: u64,
    pub offset: Option<u64>,
    pub runs: Option<Vec<(u64, u64)>>,
    pub file_type: String,
    pub extension: String,
    pub md5: String,
    pub sha256: String,
    pub validation_score: u8,
    pub is_partial: bool,
    pub method: String,
    pub source_id: String,
}

impl ManifestFile {
    pub fn from_candidate(candidate: &Candidate, output_dir: &str) -> Self {
        let proposed_path = format!("{}/{}", output_dir, candidate.output_filename());
        ManifestFile {
            filename: candidate.output_filename(),
            proposed_path,
            size_bytes: candidate.declared_size,
            offset: candidate.offset(),
            runs: candidate
                .runs()
                .map(|r| r.iter().map(|run| (run.first_cluster, run.cluster_count)).collect()),
            file_type: candidate.type_key.clone(),
            extension: candidate.extension.clone(),
            md5: candidate.md5.clone().unwrap_or_default(),
            sha256: candidate.sha256.clone().unwrap_or_default(),
            validation_score: candidate.validation_score,
            is_partial: candidate.is_partial,
            method: candidate.provenance.manifest_method().to_string(),
            source_id: candidate.source_id.clone(),
        }
    }
}

/// The full, persisted output of a scan: header plus candidate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub scan_info: ScanInfo,
    pub statistics: Statistics,
    pub files: Vec<ManifestFile>,
}

impl Manifest {
    pub fn new(scan_info: ScanInfo, output_dir: &str, candidates: &[Candidate]) -> Self {
        let files: Vec<ManifestFile> = candidates
            .iter()
            .map(|c| ManifestFile::from_candidate(c, output_dir))
            .collect();

        let total_files = files.len() as u32;
        let partial_files = files.iter().filter(|f| f.is_partial).count() as u32;
        let total_size_bytes = files.iter().map(|f| f.size_bytes).sum();

        Manifest {
            scan_info,
            statistics: Statistics {
                total_files,
                unique_files: total_files,
                partial_files,
                total_size_bytes,
                disk_space_used: 0,
                duplicates_collapsed: 0,
            },
            files,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}
