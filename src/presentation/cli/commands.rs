//! CLI commands using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::application::dto::ScanMode;

/// Data-recovery engine: NTFS/FAT metadata recovery and signature carving
/// for block storage devices.
#[derive(Parser)]
#[command(name = "argos-recover")]
#[command(version)]
#[command(about = "Recover deleted files from storage devices and disk images", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a device or image for recoverable files and write a manifest
    Scan {
        /// Path to device or image file (e.g., /dev/sda, disk.img)
        #[arg(short, long)]
        source: String,

        /// Output directory the manifest's proposed paths will reference
        #[arg(short, long, default_value = "./recovered")]
        output: PathBuf,

        /// Scan mode
        #[arg(short, long, value_enum, default_value = "normal")]
        mode: ScanModeArg,

        /// Restrict results to these extensions (comma-separated, no dot)
        #[arg(short = 't', long, value_delimiter = ',')]
        types: Option<Vec<String>>,

        /// Chunk size in MiB for the sweep (defaults to the built-in heuristic)
        #[arg(short, long)]
        chunk_size: Option<usize>,
    },

    /// Extract candidates from a previously written manifest
    Extract {
        /// Path to device or image file the manifest was generated from
        #[arg(short, long)]
        source: String,

        /// Path to the manifest JSON file produced by `scan`
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output directory for recovered files
        #[arg(short, long, default_value = "./recovered")]
        output: PathBuf,

        /// Maximum total bytes to write before stopping
        #[arg(long)]
        byte_budget: Option<u64>,
    },

    /// Lists all supported file signatures
    ListSignatures,

    /// Shows source information
    Info {
        /// Path to device or image file
        #[arg(short, long)]
        source: String,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ScanModeArg {
    Normal,
    Carving,
    Deep,
    Quick,
}

impl From<ScanModeArg> for ScanMode {
    fn from(value: ScanModeArg) -> Self {
        match value {
            ScanModeArg::Normal => ScanMode::Normal,
            ScanModeArg::Carving => ScanMode::Carving,
            ScanModeArg::Deep => ScanMode::Deep,
            ScanModeArg::Quick => ScanMode::Quick,
        }
    }
}

/// Normalizes a comma-separated `--types` list into the lowercase,
/// no-dot extension set `ScanOptions::with_extension_filter` expects.
pub fn parse_extension_filter(types: Option<Vec<String>>) -> std::collections::HashSet<String> {
    types
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim_start_matches('.').to_lowercase())
        .collect()
}
