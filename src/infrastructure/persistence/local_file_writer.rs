//! Local file writer implementation (Extractor's writer, spec §4.J).
//!
//! Writes extracted candidate bytes to the local filesystem, applying the
//! `.mismatch` and `.dup{N}` collision suffixes. No format conversion: the
//! teacher's PNG-conversion feature has no counterpart here, bytes are
//! written byte-for-byte as read from the source.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::domain::entities::Candidate;
use crate::domain::repositories::{FileWriterError, RecoveredFileWriter, WriteOptions, WriteResult};

/// Local file system writer.
pub struct LocalFileWriter {
    output_dir: PathBuf,
    files_written: AtomicUsize,
    bytes_written: AtomicU64,
}

impl LocalFileWriter {
    /// Picks a non-colliding path by appending `.dup{N}` before the
    /// extension, starting at N=1 (spec §4.J(4)).
    fn resolve_collision(&self, base_name: &str) -> PathBuf {
        let mut candidate = self.output_dir.join(base_name);
        if !candidate.exists() {
            return candidate;
        }
        let (stem, ext) = split_stem_ext(base_name);
        let mut n = 1u32;
        loop {
            let name = if ext.is_empty() {
                format!("{stem}.dup{n}")
            } else {
                format!("{stem}.dup{n}.{ext}")
            };
            candidate = self.output_dir.join(name);
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn split_stem_ext(filename: &str) -> (&str, &str) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (filename, ""),
    }
}

impl RecoveredFileWriter for LocalFileWriter {
    fn new(output_dir: &Path) -> Result<Self, FileWriterError> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    FileWriterError::PermissionDenied(output_dir.display().to_string())
                } else {
                    FileWriterError::IoError(e)
                }
            })?;
        }

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            files_written: AtomicUsize::new(0),
            bytes_written: AtomicU64::new(0),
        })
    }

    fn write(
        &self,
        candidate: &Candidate,
        data: &[u8],
        hash_mismatch: bool,
    ) -> Result<WriteResult, FileWriterError> {
        let mut base_name = candidate.output_filename();
        if hash_mismatch {
            base_name = format!("{base_name}.mismatch");
            log::warn!(
                "candidate {} re-read hash does not match the manifest; writing under a .mismatch suffix",
                candidate.id
            );
        }

        let output_path = self.resolve_collision(&base_name);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut output_file = File::create(&output_path)?;
        output_file.write_all(data)?;
        output_file.sync_all()?;

        let saved_size = data.len() as u64;
        self.files_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(saved_size, Ordering::Relaxed);

        Ok(WriteResult { candidate_id: candidate.id, saved_path: output_path, saved_size, hash_mismatch })
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn files_written(&self) -> usize {
        self.files_written.load(Ordering::Relaxed)
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Provenance;

    fn make_candidate(id: u64, filename: &str, ext: &str) -> Candidate {
        Candidate::from_offset(id, Provenance::Carving, "test.img", 0, 4, filename, "jpeg", ext)
    }

    #[test]
    fn collision_appends_dup_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let writer = LocalFileWriter::new(dir.path()).unwrap();

        let c1 = make_candidate(1, "photo", "jpg");
        let r1 = writer.write(&c1, b"aaaa", false).unwrap();
        assert_eq!(r1.saved_path.file_name().unwrap().to_str().unwrap(), "photo.jpg");

        let c2 = make_candidate(2, "photo", "jpg");
        let r2 = writer.write(&c2, b"bbbb", false).unwrap();
        assert_eq!(r2.saved_path.file_name().unwrap().to_str().unwrap(), "photo.dup1.jpg");
    }

    #[test]
    fn mismatch_suffix_applied() {
        let dir = tempfile::tempdir().unwrap();
        let writer = LocalFileWriter::new(dir.path()).unwrap();
        let c = make_candidate(1, "note", "txt");
        let r = writer.write(&c, b"data", true).unwrap();
        assert!(r.saved_path.to_str().unwrap().ends_with(".mismatch"));
        assert!(r.hash_mismatch);
    }
}
