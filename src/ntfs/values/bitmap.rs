//! `$BITMAP` decoding
//!
//! One bit per allocation unit. Unlike most typed values the payload may be
//! non-resident (the MFT's own bitmap usually is), so the decoder also
//! accepts content read through the cluster-run stream.

use crate::error::Result;
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::{check_attribute_type, read_attribute_content, DecodeContext};
use crate::ntfs::AttributeType;
use serde::Serialize;

/// Decoded `$BITMAP` value
#[derive(Debug, Clone, Default, Serialize)]
pub struct BitmapValues {
    data: Vec<u8>,
}

impl BitmapValues {
    pub fn read_data(data: &[u8]) -> Result<Self> {
        Ok(Self {
            data: data.to_vec(),
        })
    }

    /// Decode from a `$BITMAP` attribute, resident or non-resident
    pub fn read_from_mft_attribute(
        attribute: &MftAttribute,
        context: &DecodeContext,
    ) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::Bitmap)?;
        Ok(Self {
            data: read_attribute_content(attribute, context)?,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of allocation units the bitmap covers
    pub fn number_of_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// State of one bit; bits outside the bitmap read as clear
    pub fn is_bit_set(&self, bit_index: usize) -> bool {
        match self.data.get(bit_index / 8) {
            Some(byte) => (byte >> (bit_index % 8)) & 0x01 != 0,
            None => false,
        }
    }

    /// Number of set bits
    pub fn number_of_set_bits(&self) -> usize {
        self.data
            .iter()
            .map(|byte| byte.count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_accessors() {
        let values = BitmapValues::read_data(&[0b0000_0101, 0b1000_0000]).unwrap();

        assert_eq!(values.number_of_bits(), 16);
        assert!(values.is_bit_set(0));
        assert!(!values.is_bit_set(1));
        assert!(values.is_bit_set(2));
        assert!(values.is_bit_set(15));
        assert!(!values.is_bit_set(16));
        assert_eq!(values.number_of_set_bits(), 3);
    }
}
