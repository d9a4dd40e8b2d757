//! `$OBJECT_ID` decoding
//!
//! The payload is either 16 bytes (the droid file identifier alone) or
//! 64 bytes (adding the birth volume, birth file and birth domain
//! identifiers).

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::check_attribute_type;
use crate::ntfs::AttributeType;
use serde::Serialize;

/// A GUID in its on-disk mixed-endian layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Guid(pub [u8; 16]);

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = &self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            u32::from_le_bytes(data[0..4].try_into().unwrap()),
            u16::from_le_bytes(data[4..6].try_into().unwrap()),
            u16::from_le_bytes(data[6..8].try_into().unwrap()),
            data[8],
            data[9],
            data[10],
            data[11],
            data[12],
            data[13],
            data[14],
            data[15],
        )
    }
}

/// Decoded `$OBJECT_ID` value
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectIdentifierValues {
    pub droid_file_identifier: Guid,
    /// Birth identifiers, present only in the 64-byte form
    pub birth_droid_volume_identifier: Option<Guid>,
    pub birth_droid_file_identifier: Option<Guid>,
    pub birth_droid_domain_identifier: Option<Guid>,
}

impl ObjectIdentifierValues {
    /// Decode from a resident payload of exactly 16 or 64 bytes
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() != 16 && data.len() != 64 {
            return Err(MftScopeError::UnsupportedValue(format!(
                "$OBJECT_ID of {} bytes (16 or 64 expected)",
                data.len()
            )));
        }

        let mut values = Self {
            droid_file_identifier: Guid(data[0..16].try_into().unwrap()),
            ..Default::default()
        };
        if data.len() == 64 {
            values.birth_droid_volume_identifier = Some(Guid(data[16..32].try_into().unwrap()));
            values.birth_droid_file_identifier = Some(Guid(data[32..48].try_into().unwrap()));
            values.birth_droid_domain_identifier = Some(Guid(data[48..64].try_into().unwrap()));
        }
        Ok(values)
    }

    /// Decode from an `$OBJECT_ID` attribute
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::ObjectIdentifier)?;
        Self::read_data(attribute.resident_data()?)
    }
}
