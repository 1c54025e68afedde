//! FAT32/FAT16 boot sector (BIOS Parameter Block) decoding (spec §4.D).

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::domain::repositories::{FileSystemError, FileSystemType};

pub const BOOT_SECTOR_SIZE: usize = 512;

#[derive(Debug, Clone, Copy)]
pub struct FatBootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sector_count: u16,
    pub num_fats: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub fat_size_16: u16,
    pub total_sectors_32: u32,
    /// FAT32-only; 0 for FAT16.
    pub fat_size_32: u32,
    /// FAT32-only; 0 for FAT16.
    pub root_cluster: u32,
}

impl FatBootSector {
    pub fn parse(data: &[u8]) -> Result<Self, FileSystemError> {
        if data.len() < BOOT_SECTOR_SIZE {
            return Err(FileSystemError::InvalidBootSector("boot sector too small".to_string()));
        }
        if data[510] != 0x55 || data[511] != 0xAA {
            return Err(FileSystemError::InvalidBootSector("missing 0x55AA signature".to_string()));
        }

        let mut cursor = Cursor::new(data);
        cursor.set_position(11);
        let bytes_per_sector = read_u16(&mut cursor)?;
        let sectors_per_cluster = read_u8(&mut cursor)?;
        let reserved_sector_count = read_u16(&mut cursor)?;
        let num_fats = read_u8(&mut cursor)?;
        let root_entry_count = read_u16(&mut cursor)?;
        let total_sectors_16 = read_u16(&mut cursor)?;
        cursor.set_position(21);
        cursor.set_position(22);
        let fat_size_16 = read_u16(&mut cursor)?;
        cursor.set_position(32);
        let total_sectors_32 = read_u32(&mut cursor)?;

        let (fat_size_32, root_cluster) = if fat_size_16 == 0 {
            cursor.set_position(36);
            let fat_size_32 = read_u32(&mut cursor)?;
            cursor.set_position(44);
            let root_cluster = read_u32(&mut cursor)?;
            (fat_size_32, root_cluster)
        } else {
            (0, 0)
        };

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sector_count,
            num_fats,
            root_entry_count,
            total_sectors_16,
            fat_size_16,
            total_sectors_32,
            fat_size_32,
            root_cluster,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.bytes_per_sector >= 512
            && self.sectors_per_cluster > 0
            && self.num_fats > 0
            && self.fat_size() > 0
    }

    pub fn fat_size(&self) -> u32 {
        if self.fat_size_16 != 0 {
            self.fat_size_16 as u32
        } else {
            self.fat_size_32
        }
    }

    pub fn total_sectors(&self) -> u64 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u64
        } else {
            self.total_sectors_32 as u64
        }
    }

    pub fn fs_type(&self) -> FileSystemType {
        if self.fat_size_16 == 0 && self.root_entry_count == 0 {
            FileSystemType::Fat32
        } else {
            FileSystemType::Fat16
        }
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    /// First sector of the data region (spec §4.D: `reserved + num_fats × fat_size`).
    pub fn first_data_sector(&self) -> u64 {
        self.reserved_sector_count as u64 + self.num_fats as u64 * self.fat_size() as u64
    }

    /// Sectors occupied by the fixed-size FAT16 root directory; zero for FAT32.
    pub fn root_dir_sectors(&self) -> u64 {
        let root_dir_bytes = self.root_entry_count as u64 * 32;
        root_dir_bytes.div_ceil(self.bytes_per_sector as u64)
    }

    /// Byte offset of sector 0, i.e. the FAT16 root directory's start (data
    /// region begins `root_dir_sectors()` sectors after it for FAT16).
    pub fn fat16_root_dir_offset(&self) -> u64 {
        self.first_data_sector() * self.bytes_per_sector as u64
    }

    /// Start of the data region: for FAT32 this is right after the FATs
    /// (root_dir_sectors is 0); for FAT16 it's after the fixed-size root
    /// directory that follows the FATs.
    pub fn data_region_offset(&self) -> u64 {
        (self.first_data_sector() + self.root_dir_sectors()) * self.bytes_per_sector as u64
    }

    /// Converts a cluster number to a byte offset; clusters start counting at 2.
    pub fn cluster_to_offset(&self, cluster: u64) -> u64 {
        self.data_region_offset() + (cluster.saturating_sub(2)) * self.bytes_per_cluster()
    }
}

fn read_u8(c: &mut Cursor<&[u8]>) -> Result<u8, FileSystemError> {
    c.read_u8().map_err(|e| FileSystemError::InvalidBootSector(e.to_string()))
}
fn read_u16(c: &mut Cursor<&[u8]>) -> Result<u16, FileSystemError> {
    c.read_u16::<LittleEndian>().map_err(|e| FileSystemError::InvalidBootSector(e.to_string()))
}
fn read_u32(c: &mut Cursor<&[u8]>) -> Result<u32, FileSystemError> {
    c.read_u32::<LittleEndian>().map_err(|e| FileSystemError::InvalidBootSector(e.to_string()))
}
