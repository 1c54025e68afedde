//! Data Transfer Objects

mod extraction_result;
mod scan_options;
mod scan_progress;

pub use extraction_result::ExtractionResult;
pub use scan_options::{default_chunk_size, ScanMode, ScanOptions};
pub use scan_progress::{ScanPhase, ScanProgress};
