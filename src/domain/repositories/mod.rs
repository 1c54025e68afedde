//! Repository traits (interfaces)
//!
//! These traits define the contracts for external dependencies.
//! They follow the Dependency Inversion Principle (DIP) from SOLID.

mod block_source;
mod file_system;
mod file_writer;

pub use block_source::{BlockSource, BlockSourceError, DeviceInfo};
pub use file_system::{FileSystemError, FileSystemParser, FileSystemType};
pub use file_writer::{FileWriterError, RecoveredFileWriter, WriteOptions, WriteResult};
