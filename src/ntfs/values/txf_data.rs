//! `$TXF_DATA` decoding
//!
//! Transactional NTFS keeps per-file state in a `$LOGGED_UTILITY_STREAM`
//! named `$TXF_DATA` with a fixed 56-byte resident payload.

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::{check_attribute_type, TXF_DATA_STREAM_NAME};
use crate::ntfs::{AttributeType, FileReference};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;

/// Size of the on-disk `$TXF_DATA` value
const VALUE_SIZE: usize = 56;

/// Decoded `$TXF_DATA` value
#[derive(Debug, Clone, Default, Serialize)]
pub struct TxfDataValues {
    /// Resource manager root file reference
    pub rm_root_file_reference: FileReference,
    pub usn_index: u64,
    pub file_identifier: u64,
    pub data_lsn: u64,
    pub metadata_lsn: u64,
    pub directory_index_lsn: u64,
    pub flags: u16,
}

impl TxfDataValues {
    /// Decode from a resident payload of exactly 56 bytes
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() != VALUE_SIZE {
            return Err(MftScopeError::UnsupportedValue(format!(
                "$TXF_DATA of {} bytes ({} expected)",
                data.len(),
                VALUE_SIZE
            )));
        }

        // 6 unknown bytes precede the file reference
        let mut cursor = Cursor::new(&data[6..]);
        Ok(Self {
            rm_root_file_reference: FileReference::from_u64(cursor.read_u64::<LittleEndian>()?),
            usn_index: cursor.read_u64::<LittleEndian>()?,
            file_identifier: cursor.read_u64::<LittleEndian>()?,
            data_lsn: cursor.read_u64::<LittleEndian>()?,
            metadata_lsn: cursor.read_u64::<LittleEndian>()?,
            directory_index_lsn: cursor.read_u64::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Decode from a `$LOGGED_UTILITY_STREAM` attribute named `$TXF_DATA`
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::LoggedUtilityStream)?;
        if !attribute.compare_name_with_utf8(TXF_DATA_STREAM_NAME) {
            return Err(MftScopeError::UnsupportedValue(format!(
                "logged utility stream {:?} is not {}",
                attribute.name().unwrap_or_default(),
                TXF_DATA_STREAM_NAME
            )));
        }
        Self::read_data(attribute.resident_data()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txf_data() -> Vec<u8> {
        let mut data = vec![0u8; VALUE_SIZE];
        data[6..14].copy_from_slice(&FileReference::new(5, 5).as_u64().to_le_bytes());
        data[14..22].copy_from_slice(&7u64.to_le_bytes());
        data[22..30].copy_from_slice(&0x1234u64.to_le_bytes());
        data[30..38].copy_from_slice(&100u64.to_le_bytes());
        data[38..46].copy_from_slice(&200u64.to_le_bytes());
        data[46..54].copy_from_slice(&300u64.to_le_bytes());
        data[54..56].copy_from_slice(&2u16.to_le_bytes());
        data
    }

    #[test]
    fn test_read_data() {
        let values = TxfDataValues::read_data(&txf_data()).unwrap();

        assert_eq!(values.rm_root_file_reference.entry(), 5);
        assert_eq!(values.rm_root_file_reference.sequence(), 5);
        assert_eq!(values.usn_index, 7);
        assert_eq!(values.file_identifier, 0x1234);
        assert_eq!(values.data_lsn, 100);
        assert_eq!(values.metadata_lsn, 200);
        assert_eq!(values.directory_index_lsn, 300);
        assert_eq!(values.flags, 2);
    }

    #[test]
    fn test_read_data_rejects_other_sizes() {
        for size in [0, 55, 57] {
            let result = TxfDataValues::read_data(&vec![0u8; size]);
            assert!(
                matches!(result, Err(MftScopeError::UnsupportedValue(_))),
                "size {} must be rejected",
                size
            );
        }
    }
}
