//! Progress reporting for the CLI, backed by `indicatif`.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::application::dto::{ScanPhase, ScanProgress};

/// Progress reporter using indicatif.
pub struct ProgressReporter {
    bar: Arc<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(total: u64, message: &str) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_message(message.to_string());
        Self { bar: Arc::new(bar) }
    }

    pub fn for_scan() -> Self {
        Self::new(100, "Scanning for recoverable files...")
    }

    pub fn for_extraction(total_files: u64) -> Self {
        Self::new(total_files, "Extracting files...")
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Callback for `ScanDeviceUseCase::execute`'s progress reports.
    pub fn scan_callback(&self) -> Box<dyn Fn(&ScanProgress) + Send + Sync> {
        let bar = Arc::clone(&self.bar);
        Box::new(move |progress: &ScanProgress| {
            bar.set_position(progress.progress_pct.round() as u64);
            let phase = match progress.phase {
                ScanPhase::Metadata => "metadata",
                ScanPhase::Carving => "carving",
                ScanPhase::Deduplicating => "dedup",
            };
            bar.set_message(format!("[{phase}] {} files found, {} sectors visited", progress.files_found, progress.sectors_visited));
        })
    }

    /// Callback for `RecoverFilesUseCase::execute`'s `(current, total)` reports.
    pub fn extraction_callback(&self) -> Box<dyn Fn(usize, usize) + Send + Sync> {
        let bar = Arc::clone(&self.bar);
        Box::new(move |current: usize, total: usize| {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
        })
    }
}
