//! `$SECURITY_DESCRIPTOR` decoding
//!
//! The descriptor blob is preserved as-is; access control evaluation is out
//! of scope. Like `$BITMAP` the payload may be non-resident.

use crate::error::Result;
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::{check_attribute_type, read_attribute_content, DecodeContext};
use crate::ntfs::AttributeType;
use serde::Serialize;

/// Preserved `$SECURITY_DESCRIPTOR` blob
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecurityDescriptorValues {
    data: Vec<u8>,
}

impl SecurityDescriptorValues {
    pub fn read_data(data: &[u8]) -> Result<Self> {
        Ok(Self {
            data: data.to_vec(),
        })
    }

    /// Decode from a `$SECURITY_DESCRIPTOR` attribute, resident or
    /// non-resident
    pub fn read_from_mft_attribute(
        attribute: &MftAttribute,
        context: &DecodeContext,
    ) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::SecurityDescriptor)?;
        Ok(Self {
            data: read_attribute_content(attribute, context)?,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Descriptor revision byte, when a descriptor is present
    pub fn revision(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_data_preserves_blob() {
        let values = SecurityDescriptorValues::read_data(&[0x01, 0x00, 0x04, 0x80]).unwrap();
        assert_eq!(values.data(), &[0x01, 0x00, 0x04, 0x80]);
        assert_eq!(values.revision(), Some(1));
        assert_eq!(values.data_size(), 4);
    }

    #[test]
    fn test_empty_descriptor() {
        let values = SecurityDescriptorValues::read_data(&[]).unwrap();
        assert_eq!(values.revision(), None);
    }
}
