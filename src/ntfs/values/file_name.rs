//! `$FILE_NAME` decoding
//!
//! A 66-byte fixed part (parent reference, four FILETIMEs, sizes, flags,
//! name length and namespace) followed by the UTF-16LE name. A file carries
//! one `$FILE_NAME` per hard link plus short-name aliases.

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::check_attribute_type;
use crate::ntfs::{AttributeType, FileReference};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;

/// Size of the fixed part before the name
const FIXED_PART_SIZE: usize = 66;

/// Namespace of one `$FILE_NAME` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum FilenameNamespace {
    Posix = 0,
    Windows = 1,
    Dos = 2,
    DosWindows = 3,
}

impl FilenameNamespace {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Posix),
            1 => Some(Self::Windows),
            2 => Some(Self::Dos),
            3 => Some(Self::DosWindows),
            _ => None,
        }
    }

    /// Short 8.3 aliases are not useful display names
    pub fn is_displayable(&self) -> bool {
        !matches!(self, Self::Dos)
    }
}

/// Decoded `$FILE_NAME` value
#[derive(Debug, Clone, Serialize)]
pub struct FileNameValues {
    pub parent_file_reference: FileReference,
    pub creation_time: u64,
    pub modification_time: u64,
    pub entry_modification_time: u64,
    pub access_time: u64,
    pub allocated_file_size: u64,
    pub file_size: u64,
    pub file_attribute_flags: u32,
    /// Reparse tag or extended attribute size, depending on the flags
    pub extended_data: u32,
    pub namespace: FilenameNamespace,
    name: Vec<u16>,
}

impl FileNameValues {
    /// Decode from a resident payload
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_PART_SIZE {
            return Err(MftScopeError::UnsupportedValue(format!(
                "$FILE_NAME of {} bytes ({} or more expected)",
                data.len(),
                FIXED_PART_SIZE
            )));
        }

        let mut cursor = Cursor::new(data);
        let parent_file_reference = FileReference::from_u64(cursor.read_u64::<LittleEndian>()?);
        let creation_time = cursor.read_u64::<LittleEndian>()?;
        let modification_time = cursor.read_u64::<LittleEndian>()?;
        let entry_modification_time = cursor.read_u64::<LittleEndian>()?;
        let access_time = cursor.read_u64::<LittleEndian>()?;
        let allocated_file_size = cursor.read_u64::<LittleEndian>()?;
        let file_size = cursor.read_u64::<LittleEndian>()?;
        let file_attribute_flags = cursor.read_u32::<LittleEndian>()?;
        let extended_data = cursor.read_u32::<LittleEndian>()?;
        let name_size = cursor.read_u8()?;
        let namespace_value = cursor.read_u8()?;

        let namespace = FilenameNamespace::from_u8(namespace_value).ok_or_else(|| {
            MftScopeError::UnsupportedValue(format!(
                "unknown file name namespace {}",
                namespace_value
            ))
        })?;

        let name_bytes = name_size as usize * 2;
        if FIXED_PART_SIZE + name_bytes > data.len() {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "file name of {} code units outside value of {} bytes",
                name_size,
                data.len()
            )));
        }
        let name = data[FIXED_PART_SIZE..FIXED_PART_SIZE + name_bytes]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self {
            parent_file_reference,
            creation_time,
            modification_time,
            entry_modification_time,
            access_time,
            allocated_file_size,
            file_size,
            file_attribute_flags,
            extended_data,
            namespace,
            name,
        })
    }

    /// Decode from a `$FILE_NAME` attribute
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::FileName)?;
        Self::read_data(attribute.resident_data()?)
    }

    /// File name as UTF-16 code units
    pub fn name_utf16(&self) -> &[u16] {
        &self.name
    }

    /// File name transcoded to UTF-8
    pub fn name(&self) -> String {
        String::from_utf16_lossy(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntfs::test_data::mft_entry_data1;

    /// The `$FILE_NAME` payload of the `$MFT` record
    fn file_name_data() -> Vec<u8> {
        mft_entry_data1()[176..250].to_vec()
    }

    #[test]
    fn test_read_data() {
        let values = FileNameValues::read_data(&file_name_data()).unwrap();

        assert_eq!(values.parent_file_reference.entry(), 5);
        assert_eq!(values.parent_file_reference.sequence(), 5);
        assert_eq!(values.creation_time, 0x01d5_6008_a086_d596);
        assert_eq!(values.allocated_file_size, 0x4000);
        assert_eq!(values.file_size, 0x4000);
        assert_eq!(values.file_attribute_flags, 0x06);
        assert_eq!(values.namespace, FilenameNamespace::DosWindows);
        assert_eq!(values.name(), "$MFT");
    }

    #[test]
    fn test_read_data_too_small() {
        let data = file_name_data();
        let result = FileNameValues::read_data(&data[..65]);
        assert!(matches!(result, Err(MftScopeError::UnsupportedValue(_))));
    }

    #[test]
    fn test_read_data_name_out_of_bounds() {
        let mut data = file_name_data();
        data[64] = 16;

        let result = FileNameValues::read_data(&data);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_read_data_unknown_namespace() {
        let mut data = file_name_data();
        data[65] = 9;

        let result = FileNameValues::read_data(&data);
        assert!(matches!(result, Err(MftScopeError::UnsupportedValue(_))));
    }

    #[test]
    fn test_namespace_displayable() {
        assert!(FilenameNamespace::Windows.is_displayable());
        assert!(FilenameNamespace::Posix.is_displayable());
        assert!(!FilenameNamespace::Dos.is_displayable());
    }
}
