//! MFT record header decoding
//!
//! Two header layouts exist on disk: the 42-byte NTFS 1.2 header and the
//! 48-byte NTFS 3.x header that appends the record's own MFT index. The
//! variant is chosen by the fix-up array offset: an offset above 42 means
//! the header is 48 bytes.
//!
//! A record that does not start with `"FILE"` is not an error: the MFT
//! contains uninitialised and cleared slots, and `"BAAD"` marks records
//! whose payload a chkdsk run gave up on. Both decode to
//! [`HeaderOutcome::Empty`] so callers can skip them.

use crate::error::{MftScopeError, Result};
use crate::ntfs::{FileReference, MFT_ENTRY_BAD_SIGNATURE, MFT_ENTRY_FLAG_IN_USE, MFT_ENTRY_SIGNATURE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Size of the NTFS 1.2 record header
pub const HEADER_SIZE_NTFS_1_2: u16 = 42;

/// Size of the NTFS 3.x record header
pub const HEADER_SIZE_NTFS_3_X: u16 = 48;

/// Parsed MFT record header
#[derive(Debug, Clone)]
pub struct MftEntryHeader {
    pub fixup_values_offset: u16,
    pub number_of_fixup_values: u16,
    pub journal_sequence_number: u64,
    pub sequence: u16,
    pub reference_count: u16,
    pub attributes_offset: u16,
    pub flags: u16,
    pub used_entry_size: u32,
    pub total_entry_size: u32,
    pub base_record_file_reference: FileReference,
    pub first_available_attribute_identifier: u16,
    /// Record's own MFT index; only present in the 48-byte layout
    pub index: Option<u32>,
    /// Size of the decoded header layout (42 or 48)
    pub header_size: u16,
}

/// Result of decoding the first bytes of an MFT record
#[derive(Debug, Clone)]
pub enum HeaderOutcome {
    /// A `"FILE"` record with a decoded header
    Header(MftEntryHeader),
    /// An unused slot, an unrecognised signature, or a `"BAAD"` record
    Empty { is_bad: bool },
}

impl MftEntryHeader {
    /// Decode a record header from the start of a record buffer.
    ///
    /// Returns [`HeaderOutcome::Empty`] for `"BAAD"` records (`is_bad` set)
    /// and for anything that is not a `"FILE"` record; only structural
    /// violations inside a `"FILE"` header are errors.
    pub fn read_data(data: &[u8]) -> Result<HeaderOutcome> {
        if data.len() < HEADER_SIZE_NTFS_1_2 as usize {
            return Err(MftScopeError::InvalidArgument(format!(
                "record header needs at least {} bytes, got {}",
                HEADER_SIZE_NTFS_1_2,
                data.len()
            )));
        }
        if &data[0..4] == MFT_ENTRY_BAD_SIGNATURE {
            return Ok(HeaderOutcome::Empty { is_bad: true });
        }
        if &data[0..4] != MFT_ENTRY_SIGNATURE {
            return Ok(HeaderOutcome::Empty { is_bad: false });
        }

        let mut cursor = Cursor::new(&data[4..]);
        let fixup_values_offset = cursor.read_u16::<LittleEndian>()?;
        let number_of_fixup_values = cursor.read_u16::<LittleEndian>()?;
        let journal_sequence_number = cursor.read_u64::<LittleEndian>()?;
        let sequence = cursor.read_u16::<LittleEndian>()?;
        let reference_count = cursor.read_u16::<LittleEndian>()?;
        let attributes_offset = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let used_entry_size = cursor.read_u32::<LittleEndian>()?;
        let total_entry_size = cursor.read_u32::<LittleEndian>()?;
        let base_record_file_reference =
            FileReference::from_u64(cursor.read_u64::<LittleEndian>()?);
        let first_available_attribute_identifier = cursor.read_u16::<LittleEndian>()?;

        let header_size = if fixup_values_offset > HEADER_SIZE_NTFS_1_2 {
            HEADER_SIZE_NTFS_3_X
        } else {
            HEADER_SIZE_NTFS_1_2
        };

        let index = if header_size == HEADER_SIZE_NTFS_3_X {
            if data.len() < HEADER_SIZE_NTFS_3_X as usize {
                return Err(MftScopeError::InvalidArgument(format!(
                    "record header needs {} bytes, got {}",
                    HEADER_SIZE_NTFS_3_X,
                    data.len()
                )));
            }
            Some(u32::from_le_bytes(
                data[44..48].try_into().expect("four bytes"),
            ))
        } else {
            None
        };

        if fixup_values_offset < header_size {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "fix-up values offset {} inside {}-byte record header",
                fixup_values_offset, header_size
            )));
        }
        if attributes_offset < header_size {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "attributes offset {} inside {}-byte record header",
                attributes_offset, header_size
            )));
        }

        Ok(HeaderOutcome::Header(Self {
            fixup_values_offset,
            number_of_fixup_values,
            journal_sequence_number,
            sequence,
            reference_count,
            attributes_offset,
            flags,
            used_entry_size,
            total_entry_size,
            base_record_file_reference,
            first_available_attribute_identifier,
            index,
            header_size,
        }))
    }

    /// Check if this record is in use
    pub fn is_in_use(&self) -> bool {
        (self.flags & MFT_ENTRY_FLAG_IN_USE) != 0
    }

    /// Check if this is a base record (not an extension)
    pub fn is_base_record(&self) -> bool {
        self.base_record_file_reference.is_zero()
    }
}
