//! `$LOGGED_UTILITY_STREAM` decoding
//!
//! Streams other than `$TXF_DATA` (`$EFS`, `$TXF_DATA`'s siblings) are
//! preserved as opaque payloads.

use crate::error::Result;
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::check_attribute_type;
use crate::ntfs::AttributeType;
use serde::Serialize;

/// Opaque logged utility stream payload
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoggedUtilityStreamValues {
    data: Vec<u8>,
}

impl LoggedUtilityStreamValues {
    pub fn read_data(data: &[u8]) -> Result<Self> {
        Ok(Self {
            data: data.to_vec(),
        })
    }

    /// Decode from a `$LOGGED_UTILITY_STREAM` attribute
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::LoggedUtilityStream)?;
        Self::read_data(attribute.resident_data()?)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }
}
