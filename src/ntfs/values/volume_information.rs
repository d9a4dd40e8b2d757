//! `$VOLUME_INFORMATION` decoding
//!
//! A fixed 12-byte payload: 8 reserved bytes, the NTFS major and minor
//! version, and the volume flags.

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::check_attribute_type;
use crate::ntfs::AttributeType;
use serde::Serialize;

/// Chkdsk-requested flag in the volume flags
pub const VOLUME_FLAG_IS_DIRTY: u16 = 0x0001;

/// Decoded `$VOLUME_INFORMATION` value
#[derive(Debug, Clone, Default, Serialize)]
pub struct VolumeInformationValues {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u16,
}

impl VolumeInformationValues {
    /// Decode from a resident payload of exactly 12 bytes
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() != 12 {
            return Err(MftScopeError::UnsupportedValue(format!(
                "$VOLUME_INFORMATION of {} bytes (12 expected)",
                data.len()
            )));
        }
        Ok(Self {
            major_version: data[8],
            minor_version: data[9],
            flags: u16::from_le_bytes([data[10], data[11]]),
        })
    }

    /// Decode from a `$VOLUME_INFORMATION` attribute
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::VolumeInformation)?;
        Self::read_data(attribute.resident_data()?)
    }

    /// NTFS version as `(major, minor)`
    pub fn version(&self) -> (u8, u8) {
        (self.major_version, self.minor_version)
    }

    pub fn is_dirty(&self) -> bool {
        (self.flags & VOLUME_FLAG_IS_DIRTY) != 0
    }
}
