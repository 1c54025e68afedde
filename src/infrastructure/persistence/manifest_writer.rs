//! Manifest persistence — writes the scan's authoritative JSON output
//! (spec §6) and reloads it for the Extractor (spec §4.J).

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::domain::entities::Manifest;

#[derive(Error, Debug)]
pub enum ManifestWriterError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<(), ManifestWriterError> {
    let json = manifest.to_json_pretty()?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Manifest, ManifestWriterError> {
    let data = fs::read_to_string(path)?;
    Ok(Manifest::from_json(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ScanInfo, Statistics};

    #[test]
    fn round_trips_through_disk() {
        let manifest = Manifest {
            scan_info: ScanInfo {
                mode: "normal".to_string(),
                timestamp: "2026-07-26T00:00:00Z".to_string(),
                source_id: "test.img".to_string(),
                total_sectors_scanned: 0,
                scan_duration_seconds: 0.0,
                incomplete: false,
            },
            statistics: Statistics::default(),
            files: Vec::new(),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        write_manifest(&manifest, &path).unwrap();
        let reloaded = read_manifest(&path).unwrap();
        assert_eq!(reloaded.scan_info.source_id, "test.img");
    }
}
