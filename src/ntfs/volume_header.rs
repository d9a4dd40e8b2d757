//! NTFS volume header (boot sector) decoding
//!
//! The first 512 bytes of an NTFS volume carry the geometry everything else
//! derives from: sector size, cluster size, MFT record and index record
//! sizes, total volume size and the cluster number of the MFT.

use crate::error::{MftScopeError, Result};
use crate::io::VolumeImage;
use crate::ntfs::MAXIMUM_ALLOCATION_SIZE;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// File system signature at offset 3
const FILE_SYSTEM_SIGNATURE: &[u8; 8] = b"NTFS    ";

/// Smallest usable MFT record: the 42-byte NTFS 1.2 entry header
const MINIMUM_MFT_ENTRY_SIZE: u32 = 42;

/// Smallest usable index record: the 24-byte INDX record header
const MINIMUM_INDEX_ENTRY_SIZE: u32 = 24;

/// Parsed NTFS volume header
#[derive(Debug, Clone)]
pub struct VolumeHeader {
    /// Bytes per sector, one of {256, 512, 1024, 2048, 4096}
    pub bytes_per_sector: u16,
    /// Bytes per cluster block, a power of two in {256 .. 2097152}
    pub cluster_block_size: u32,
    /// Bytes per MFT record
    pub mft_entry_size: u32,
    /// Bytes per index record
    pub index_entry_size: u32,
    /// Total number of sectors
    pub total_number_of_sectors: u64,
    /// Volume size in bytes (total sectors plus the backup boot sector)
    pub volume_size: u64,
    /// Volume serial number
    pub volume_serial_number: u64,
    /// Byte offset of the MFT
    pub mft_offset: u64,
    /// Byte offset of the mirror MFT
    pub mirror_mft_offset: u64,
}

impl VolumeHeader {
    /// Size of the on-disk volume header
    pub const SIZE: usize = 512;

    /// Decode a volume header from a raw 512-byte boot sector
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(MftScopeError::InvalidArgument(format!(
                "volume header needs {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }
        if &data[3..11] != FILE_SYSTEM_SIGNATURE {
            return Err(MftScopeError::UnsupportedValue(
                "file system signature is not \"NTFS    \"".to_string(),
            ));
        }

        let mut cursor = Cursor::new(&data[11..]);
        let bytes_per_sector = cursor.read_u16::<LittleEndian>()?;
        let sectors_per_cluster_block = cursor.read_u8()?;

        if !matches!(bytes_per_sector, 256 | 512 | 1024 | 2048 | 4096) {
            return Err(MftScopeError::UnsupportedValue(format!(
                "unsupported bytes per sector: {}",
                bytes_per_sector
            )));
        }

        let total_number_of_sectors =
            u64::from_le_bytes(data[40..48].try_into().expect("eight bytes"));
        let mft_cluster_block_number =
            u64::from_le_bytes(data[48..56].try_into().expect("eight bytes"));
        let mirror_mft_cluster_block_number =
            u64::from_le_bytes(data[56..64].try_into().expect("eight bytes"));
        let raw_mft_entry_size = u32::from_le_bytes(data[64..68].try_into().expect("four bytes"));
        let raw_index_entry_size = u32::from_le_bytes(data[68..72].try_into().expect("four bytes"));
        let volume_serial_number =
            u64::from_le_bytes(data[72..80].try_into().expect("eight bytes"));

        let cluster_block_size =
            decode_cluster_block_size(sectors_per_cluster_block, bytes_per_sector)?;

        let mft_entry_size = decode_entry_size(
            raw_mft_entry_size,
            cluster_block_size,
            MINIMUM_MFT_ENTRY_SIZE,
            "MFT entry size",
        )?;
        let index_entry_size = decode_entry_size(
            raw_index_entry_size,
            cluster_block_size,
            MINIMUM_INDEX_ENTRY_SIZE,
            "index entry size",
        )?;

        if total_number_of_sectors > (u64::MAX / bytes_per_sector as u64) + 1 {
            return Err(MftScopeError::ValueOutOfBounds(
                "volume size exceeds 64 bits".to_string(),
            ));
        }
        let volume_size =
            total_number_of_sectors * bytes_per_sector as u64 + bytes_per_sector as u64;

        if mft_cluster_block_number > u64::MAX / cluster_block_size as u64
            || mirror_mft_cluster_block_number > u64::MAX / cluster_block_size as u64
        {
            return Err(MftScopeError::ValueOutOfBounds(
                "MFT cluster block number exceeds 64 bits".to_string(),
            ));
        }

        Ok(Self {
            bytes_per_sector,
            cluster_block_size,
            mft_entry_size,
            index_entry_size,
            total_number_of_sectors,
            volume_size,
            volume_serial_number,
            mft_offset: mft_cluster_block_number * cluster_block_size as u64,
            mirror_mft_offset: mirror_mft_cluster_block_number * cluster_block_size as u64,
        })
    }

    /// Read and decode the volume header at `offset` in the image
    pub fn read_at(image: &VolumeImage, offset: u64) -> Result<Self> {
        let mut data = [0u8; Self::SIZE];
        image.read_exact_at(offset, &mut data)?;
        Self::read_data(&data)
    }
}

/// Decode the sectors-per-cluster byte: values above 128 encode
/// `2^(256 - value)` bytes directly, others a sector count.
fn decode_cluster_block_size(raw: u8, bytes_per_sector: u16) -> Result<u32> {
    let mut size = raw as u32;
    if size > 128 {
        size = 256 - size;
        if size > 12 {
            return Err(MftScopeError::ValueOutOfBounds(
                "cluster block size shift out of bounds".to_string(),
            ));
        }
        size = 1 << size;
    }
    size *= bytes_per_sector as u32;

    if !matches!(
        size,
        256 | 512
            | 1024
            | 2048
            | 4096
            | 8192
            | 16384
            | 32768
            | 65536
            | 131_072
            | 262_144
            | 524_288
            | 1_048_576
            | 2_097_152
    ) {
        return Err(MftScopeError::UnsupportedValue(format!(
            "unsupported cluster block size: {}",
            size
        )));
    }
    Ok(size)
}

/// Decode an MFT or index record size: raw values below 128 count cluster
/// blocks, values of 128 and above encode `2^(256 - value)` bytes.
fn decode_entry_size(
    raw: u32,
    cluster_block_size: u32,
    minimum: u32,
    description: &str,
) -> Result<u32> {
    if raw == 0 || raw > 255 {
        return Err(MftScopeError::UnsupportedValue(format!(
            "unsupported {}: {}",
            description, raw
        )));
    }
    let size = if raw < 128 {
        if raw >= (u32::MAX / cluster_block_size) + 1 {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "{} value out of bounds",
                description
            )));
        }
        raw * cluster_block_size
    } else {
        let shift = 256 - raw;
        if shift >= 32 {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "{} shift out of bounds",
                description
            )));
        }
        1u32 << shift
    };
    if size < minimum || size as u64 >= MAXIMUM_ALLOCATION_SIZE {
        return Err(MftScopeError::ValueOutOfBounds(format!(
            "{}: {} value out of bounds",
            description, size
        )));
    }
    Ok(size)
}
