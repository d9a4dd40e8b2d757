//! `$VOLUME_NAME` decoding
//!
//! The payload is the volume label as UTF-16LE, any length including empty.

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::check_attribute_type;
use crate::ntfs::AttributeType;
use serde::Serialize;

/// Decoded `$VOLUME_NAME` value
#[derive(Debug, Clone, Default, Serialize)]
pub struct VolumeNameValues {
    name: Vec<u16>,
}

impl VolumeNameValues {
    /// Decode from a resident payload; the content is stored verbatim
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() % 2 != 0 {
            return Err(MftScopeError::UnsupportedValue(format!(
                "$VOLUME_NAME of {} bytes is not valid UTF-16",
                data.len()
            )));
        }
        Ok(Self {
            name: data
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        })
    }

    /// Decode from a `$VOLUME_NAME` attribute
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::VolumeName)?;
        Self::read_data(attribute.resident_data()?)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Volume label as UTF-16 code units
    pub fn name_utf16(&self) -> &[u16] {
        &self.name
    }

    /// Volume label transcoded to UTF-8; empty labels yield an empty string
    pub fn name(&self) -> String {
        String::from_utf16_lossy(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntfs::test_data::volume_name_attribute_data;

    #[test]
    fn test_read_data() {
        let data = volume_name_attribute_data();
        let values = VolumeNameValues::read_data(&data[24..44]).unwrap();

        assert!(!values.is_empty());
        assert_eq!(values.name(), "TestVolume");
        assert_eq!(values.name_utf16().len(), 10);
    }

    #[test]
    fn test_read_data_empty_name() {
        let values = VolumeNameValues::read_data(&[]).unwrap();
        assert!(values.is_empty());
        assert_eq!(values.name(), "");
    }

    #[test]
    fn test_read_data_odd_length() {
        let result = VolumeNameValues::read_data(&[0x41]);
        assert!(matches!(result, Err(MftScopeError::UnsupportedValue(_))));
    }

    #[test]
    fn test_read_from_mft_attribute() {
        let data = volume_name_attribute_data();
        let attribute = MftAttribute::read_data(&data).unwrap();

        let values = VolumeNameValues::read_from_mft_attribute(&attribute).unwrap();
        assert_eq!(values.name(), "TestVolume");
    }
}
