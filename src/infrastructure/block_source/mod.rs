//! Block source implementations (spec §4.A).

mod linux_block_source;
mod mmap_block_source;

pub use linux_block_source::LinuxBlockSource;
pub use mmap_block_source::MmapBlockSource;
