//! Read-only data-recovery engine: NTFS/FAT32 metadata recovery and
//! signature carving for block storage devices.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::{RecoverFilesUseCase, ScanDeviceUseCase};
pub use domain::entities::*;
pub use domain::repositories::{BlockSource, BlockSourceError, DeviceInfo};
