//! Candidate — the in-memory representation of a possibly-recoverable file.

use serde::{Deserialize, Serialize};

/// How a [`Candidate`] was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    MetadataNtfs,
    MetadataFat,
    Carving,
}

impl Provenance {
    /// Priority used by the deduplicator: lower sorts first (wins).
    pub fn dedup_priority(&self) -> u8 {
        match self {
            Provenance::MetadataNtfs | Provenance::MetadataFat => 0,
            Provenance::Carving => 1,
        }
    }

    pub fn manifest_method(&self) -> &'static str {
        match self {
            Provenance::MetadataNtfs => "metadata_ntfs",
            Provenance::MetadataFat => "metadata_fat",
            Provenance::Carving => "signature_carving",
        }
    }
}

/// One contiguous run of clusters: `(first_cluster_index, cluster_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRun {
    pub first_cluster: u64,
    pub cluster_count: u64,
}

impl ClusterRun {
    pub fn new(first_cluster: u64, cluster_count: u64) -> Self {
        Self { first_cluster, cluster_count }
    }
}

/// Location of a candidate's bytes on the source: either a flat offset
/// (carving, FAT) or an ordered list of cluster runs (NTFS non-resident).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extent {
    Offset(u64),
    Runs(Vec<ClusterRun>),
}

/// Quality bucket derived from [`Candidate::validation_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileCategory {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl FileCategory {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=100 => FileCategory::Excellent,
            70..=89 => FileCategory::Good,
            50..=69 => FileCategory::Fair,
            _ => FileCategory::Poor,
        }
    }
}

/// Optional metadata timestamps, populated only for metadata-provenance candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTimestamps {
    pub created: Option<i64>,
    pub modified: Option<i64>,
    pub accessed: Option<i64>,
}

/// A possibly-recoverable file discovered during a scan.
///
/// Exactly one of `offset` or `runs` is populated on a given instance;
/// enforced by the constructors (`from_offset`, `from_runs`), not by the
/// serialized shape, since the manifest format requires both fields present
/// (one of them `null`) per the external interface in the spec.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: u64,
    pub provenance: Provenance,
    pub source_id: String,
    extent: Extent,
    pub declared_size: u64,
    pub filename: String,
    pub type_key: String,
    pub extension: String,
    pub timestamps: CandidateTimestamps,
    pub validation_score: u8,
    pub is_partial: bool,
    pub md5: Option<String>,
    pub sha256: Option<String>,
}

impl Candidate {
    pub fn from_offset(
        id: u64,
        provenance: Provenance,
        source_id: impl Into<String>,
        offset: u64,
        declared_size: u64,
        filename: impl Into<String>,
        type_key: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            id,
            provenance,
            source_id: source_id.into(),
            extent: Extent::Offset(offset),
            declared_size,
            filename: filename.into(),
            type_key: type_key.into(),
            extension: extension.into(),
            timestamps: CandidateTimestamps::default(),
            validation_score: 0,
            is_partial: false,
            md5: None,
            sha256: None,
        }
    }

    pub fn from_runs(
        id: u64,
        provenance: Provenance,
        source_id: impl Into<String>,
        runs: Vec<ClusterRun>,
        declared_size: u64,
        filename: impl Into<String>,
        type_key: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            id,
            provenance,
            source_id: source_id.into(),
            extent: Extent::Runs(runs),
            declared_size,
            filename: filename.into(),
            type_key: type_key.into(),
            extension: extension.into(),
            timestamps: CandidateTimestamps::default(),
            validation_score: 0,
            is_partial: false,
            md5: None,
            sha256: None,
        }
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn offset(&self) -> Option<u64> {
        match &self.extent {
            Extent::Offset(o) => Some(*o),
            Extent::Runs(_) => None,
        }
    }

    pub fn runs(&self) -> Option<&[ClusterRun]> {
        match &self.extent {
            Extent::Offset(_) => None,
            Extent::Runs(r) => Some(r),
        }
    }

    pub fn category(&self) -> FileCategory {
        FileCategory::from_score(self.validation_score)
    }

    /// The filename this candidate should be written under, including the
    /// `.partial.<ext>` suffix convention for partial files.
    pub fn output_filename(&self) -> String {
        if self.is_partial {
            format!("{}.partial.{}", self.filename, self.extension)
        } else {
            format!("{}.{}", self.filename, self.extension)
        }
    }

    pub fn with_timestamps(mut self, timestamps: CandidateTimestamps) -> Self {
        self.timestamps = timestamps;
        self
    }
}
