//! `$STANDARD_INFORMATION` decoding
//!
//! The base form is 48 bytes (four FILETIMEs plus version/class fields);
//! NTFS 3.0 extends it to 72 bytes with ownership, quota and USN fields.
//! Only those two sizes occur on disk.

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::check_attribute_type;
use crate::ntfs::AttributeType;
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;

/// Decoded `$STANDARD_INFORMATION` value
#[derive(Debug, Clone, Default, Serialize)]
pub struct StandardInformationValues {
    /// Creation time as FILETIME
    pub creation_time: u64,
    /// Last data modification time as FILETIME
    pub modification_time: u64,
    /// Last MFT entry modification time as FILETIME
    pub entry_modification_time: u64,
    /// Last access time as FILETIME
    pub access_time: u64,
    pub file_attribute_flags: u32,
    pub maximum_number_of_versions: u32,
    pub version_number: u32,
    pub class_identifier: u32,
    /// NTFS 3.0+ fields, present when the value is 72 bytes
    pub owner_identifier: u32,
    pub security_descriptor_identifier: u32,
    pub quota_charged: u64,
    pub update_sequence_number: u64,
}

impl StandardInformationValues {
    /// Decode from a resident payload of exactly 48 or 72 bytes
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() != 48 && data.len() != 72 {
            return Err(MftScopeError::UnsupportedValue(format!(
                "$STANDARD_INFORMATION of {} bytes (48 or 72 expected)",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let mut values = Self {
            creation_time: cursor.read_u64::<LittleEndian>()?,
            modification_time: cursor.read_u64::<LittleEndian>()?,
            entry_modification_time: cursor.read_u64::<LittleEndian>()?,
            access_time: cursor.read_u64::<LittleEndian>()?,
            file_attribute_flags: cursor.read_u32::<LittleEndian>()?,
            maximum_number_of_versions: cursor.read_u32::<LittleEndian>()?,
            version_number: cursor.read_u32::<LittleEndian>()?,
            class_identifier: cursor.read_u32::<LittleEndian>()?,
            ..Default::default()
        };

        if data.len() >= 72 {
            values.owner_identifier = cursor.read_u32::<LittleEndian>()?;
            values.security_descriptor_identifier = cursor.read_u32::<LittleEndian>()?;
            values.quota_charged = cursor.read_u64::<LittleEndian>()?;
            values.update_sequence_number = cursor.read_u64::<LittleEndian>()?;
        }
        Ok(values)
    }

    /// Decode from a `$STANDARD_INFORMATION` attribute
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::StandardInformation)?;
        Self::read_data(attribute.resident_data()?)
    }

    /// Best-effort case sensitivity of the owning file: NTFS 3.0+ reuses the
    /// version slots as a case-sensitivity marker.
    pub fn is_case_sensitive(&self) -> bool {
        self.maximum_number_of_versions == 0 && self.version_number == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntfs::test_data::mft_entry_data1;

    /// The 72-byte `$STANDARD_INFORMATION` payload of the `$MFT` record
    fn standard_information_data() -> Vec<u8> {
        mft_entry_data1()[80..152].to_vec()
    }

    #[test]
    fn test_read_data_extended_form() {
        let values = StandardInformationValues::read_data(&standard_information_data()).unwrap();

        assert_eq!(values.creation_time, 0x01d5_6008_a086_d596);
        assert_eq!(values.modification_time, 0x01d5_6008_a086_d596);
        assert_eq!(values.entry_modification_time, 0x01d5_6008_a086_d596);
        assert_eq!(values.access_time, 0x01d5_6008_a086_d596);
        assert_eq!(values.file_attribute_flags, 0x06);
        assert_eq!(values.maximum_number_of_versions, 0);
        assert_eq!(values.version_number, 0);
        assert_eq!(values.class_identifier, 0);
        assert_eq!(values.owner_identifier, 0);
        assert_eq!(values.security_descriptor_identifier, 0x0100);
        assert_eq!(values.quota_charged, 0);
        assert_eq!(values.update_sequence_number, 0);
        assert!(!values.is_case_sensitive());
    }

    #[test]
    fn test_read_data_base_form() {
        let values =
            StandardInformationValues::read_data(&standard_information_data()[..48]).unwrap();
        assert_eq!(values.file_attribute_flags, 0x06);
        assert_eq!(values.owner_identifier, 0);
        assert_eq!(values.security_descriptor_identifier, 0);
    }

    #[test]
    fn test_read_data_rejects_other_sizes() {
        let data = standard_information_data();
        for size in [0, 47, 49, 71] {
            let result = StandardInformationValues::read_data(&data[..size]);
            assert!(
                matches!(result, Err(MftScopeError::UnsupportedValue(_))),
                "size {} must be rejected",
                size
            );
        }
    }

    #[test]
    fn test_is_case_sensitive_marker() {
        let mut data = standard_information_data()[..48].to_vec();
        // maximum number of versions 0, version number 1
        data[36..40].copy_from_slice(&0u32.to_le_bytes());
        data[40..44].copy_from_slice(&1u32.to_le_bytes());

        let values = StandardInformationValues::read_data(&data).unwrap();
        assert!(values.is_case_sensitive());
    }

    #[test]
    fn test_read_from_mft_attribute_checks_type() {
        let record = mft_entry_data1();
        let attribute =
            crate::ntfs::attribute::MftAttribute::read_data(&record[152..]).unwrap();

        let result = StandardInformationValues::read_from_mft_attribute(&attribute);
        assert!(matches!(result, Err(MftScopeError::UnsupportedValue(_))));
    }
}
