//! File system parsers

pub mod fat;
pub mod ntfs;

pub use fat::FatParser;
pub use ntfs::NtfsParser;
