//! Plain-file/block-device backed [`BlockSource`], guarded by a mutex since
//! a single `File` handle only supports one cursor position at a time.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::domain::repositories::{BlockSource, BlockSourceError, DeviceInfo};

pub struct LinuxBlockSource {
    file: Mutex<File>,
    identity: String,
    length: u64,
    sector_size: u32,
}

impl LinuxBlockSource {
    fn detect_sector_size(path: &Path) -> u32 {
        if path.starts_with("/dev/") {
            4096
        } else {
            512
        }
    }

    fn detect_length(file: &File, path: &Path) -> Result<u64, BlockSourceError> {
        let metadata = file.metadata()?;
        if metadata.is_file() {
            return Ok(metadata.len());
        }
        let mut f = file.try_clone()?;
        let size = f.seek(SeekFrom::End(0))?;
        f.seek(SeekFrom::Start(0))?;
        if size == 0 {
            Err(BlockSourceError::Other(format!("could not determine size of {}", path.display())))
        } else {
            Ok(size)
        }
    }
}

impl BlockSource for LinuxBlockSource {
    fn open(identity: &str) -> Result<Self, BlockSourceError> {
        let path = Path::new(identity);
        if !path.exists() {
            return Err(BlockSourceError::SourceNotFound(identity.to_string()));
        }

        let file = OpenOptions::new().read(true).open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                BlockSourceError::PermissionDenied(identity.to_string())
            } else {
                BlockSourceError::IoError(e)
            }
        })?;

        let length = Self::detect_length(&file, path)?;
        let sector_size = Self::detect_sector_size(path);

        Ok(Self { file: Mutex::new(file), identity: identity.to_string(), length, sector_size })
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identity: self.identity.clone(),
            length: self.length,
            sector_size: self.sector_size,
            read_only: true,
        }
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, BlockSourceError> {
        if offset >= self.length {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock().map_err(|_| BlockSourceError::Other("lock poisoned".to_string()))?;
        file.seek(SeekFrom::Start(offset))?;

        let available = (self.length - offset) as usize;
        let to_read = len.min(available);
        let mut buffer = vec![0u8; to_read];

        let mut read_total = 0;
        while read_total < to_read {
            match file.read(&mut buffer[read_total..]) {
                Ok(0) => break,
                Ok(n) => read_total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(BlockSourceError::ReadError { offset, message: e.to_string() });
                }
            }
        }
        buffer.truncate(read_total);
        Ok(buffer)
    }
}

unsafe impl Send for LinuxBlockSource {}
unsafe impl Sync for LinuxBlockSource {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_exact_bytes_at_offset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        file.write_all(b"hello").unwrap();
        file.flush().unwrap();

        let source = LinuxBlockSource::open(file.path().to_str().unwrap()).unwrap();
        let data = source.read_at(100, 5).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn short_read_past_end_returns_truncated_not_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        let source = LinuxBlockSource::open(file.path().to_str().unwrap()).unwrap();
        let data = source.read_at(1, 100).unwrap();
        assert_eq!(data, b"bc");
    }

    #[test]
    fn open_nonexistent_errors() {
        assert!(LinuxBlockSource::open("/nonexistent/path/does/not/exist").is_err());
    }
}
