//! Persistence: writing recovered files and the scan manifest to disk.

mod local_file_writer;
mod manifest_writer;

pub use local_file_writer::LocalFileWriter;
pub use manifest_writer::{read_manifest, write_manifest, ManifestWriterError};
