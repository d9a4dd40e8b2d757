//! `$ATTRIBUTE_LIST` decoding
//!
//! When a file's attributes no longer fit in its base MFT record, the base
//! record carries an `$ATTRIBUTE_LIST` whose entries enumerate every
//! attribute of the file and the MFT record holding it. The list itself may
//! be non-resident, in which case its content is read through the
//! cluster-run stream.

use crate::error::{MftScopeError, Result};
use crate::io::VolumeImage;
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::cluster_stream::ClusterStream;
use crate::ntfs::{collation, FileReference};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

/// Size of the attribute-list entry header
const ENTRY_HEADER_SIZE: usize = 26;

// ============================================================================
// Attribute list entry
// ============================================================================

/// One entry of an `$ATTRIBUTE_LIST`
#[derive(Debug, Clone)]
pub struct AttributeListEntry {
    pub attribute_type: u32,
    /// Size of this entry, header and name included
    pub size: u16,
    /// First VCN of the attribute piece the entry describes
    pub data_first_vcn: u64,
    /// MFT record holding the attribute piece
    pub file_reference: FileReference,
    pub identifier: u16,
    name: Option<Vec<u16>>,
}

impl AttributeListEntry {
    /// Decode one entry from the start of `data`
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() < ENTRY_HEADER_SIZE {
            return Err(MftScopeError::InvalidArgument(format!(
                "attribute list entry needs {} bytes, got {}",
                ENTRY_HEADER_SIZE,
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let attribute_type = cursor.read_u32::<LittleEndian>()?;
        let size = cursor.read_u16::<LittleEndian>()?;
        let name_size = cursor.read_u8()?;
        let name_offset = cursor.read_u8()?;
        let data_first_vcn = cursor.read_u64::<LittleEndian>()?;
        let file_reference = FileReference::from_u64(cursor.read_u64::<LittleEndian>()?);
        let identifier = cursor.read_u16::<LittleEndian>()?;

        if (size as usize) < ENTRY_HEADER_SIZE || size as usize > data.len() {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "attribute list entry size {} outside {} available bytes",
                size,
                data.len()
            )));
        }

        let name = if name_size > 0 {
            let name_offset = name_offset as usize;
            let name_bytes = name_size as usize * 2;
            if name_offset < ENTRY_HEADER_SIZE || name_bytes > size as usize - name_offset {
                return Err(MftScopeError::ValueOutOfBounds(format!(
                    "attribute list entry name at {}..{} outside entry of {} bytes",
                    name_offset,
                    name_offset + name_bytes,
                    size
                )));
            }
            Some(
                data[name_offset..name_offset + name_bytes]
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect(),
            )
        } else {
            None
        };

        Ok(Self {
            attribute_type,
            size,
            data_first_vcn,
            file_reference,
            identifier,
            name,
        })
    }

    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    /// Entry name as UTF-16 code units
    pub fn name_utf16(&self) -> Option<&[u16]> {
        self.name.as_deref()
    }

    /// Entry name transcoded to UTF-8
    pub fn name(&self) -> Option<String> {
        self.name
            .as_ref()
            .map(|units| String::from_utf16_lossy(units))
    }

    /// Case-insensitive comparison of the entry name with a UTF-8 string
    pub fn compare_name_with_utf8(&self, query: &str) -> bool {
        match &self.name {
            Some(units) => collation::equals_utf8(units, query),
            None => query.is_empty(),
        }
    }
}

// ============================================================================
// Attribute list
// ============================================================================

/// A parsed `$ATTRIBUTE_LIST`: entries plus the distinct set of MFT records
/// they reference, kept sorted by entry index
#[derive(Debug, Clone, Default)]
pub struct AttributeList {
    entries: Vec<AttributeListEntry>,
    file_references: Vec<FileReference>,
}

impl AttributeList {
    /// Parse a contiguous list buffer (a resident `$ATTRIBUTE_LIST` payload)
    pub fn read_data(data: &[u8]) -> Result<Self> {
        let mut list = AttributeList::default();
        let mut offset = 0;

        while offset + ENTRY_HEADER_SIZE <= data.len() {
            let entry = AttributeListEntry::read_data(&data[offset..])?;
            offset += entry.size as usize;
            list.insert_file_reference(entry.file_reference);
            list.entries.push(entry);
        }
        Ok(list)
    }

    /// Parse the content of an `$ATTRIBUTE_LIST` attribute, reading
    /// non-resident content through the cluster-run stream
    pub fn read_from_attribute(
        list_attribute: &MftAttribute,
        image: Arc<VolumeImage>,
        cluster_block_size: u32,
    ) -> Result<Self> {
        if list_attribute.is_resident() {
            Self::read_data(list_attribute.resident_data()?)
        } else {
            let stream =
                ClusterStream::from_attribute(list_attribute, image, cluster_block_size)?;
            let data = stream.read_to_vec()?;
            Self::read_data(&data)
        }
    }

    /// Ordered find-or-append on the 48-bit entry index; re-inserting a
    /// reference that is already present succeeds without duplicating it.
    pub fn insert_file_reference(&mut self, reference: FileReference) {
        match self
            .file_references
            .binary_search_by_key(&reference.entry(), |existing| existing.entry())
        {
            Ok(_) => {}
            Err(insert_at) => self.file_references.insert(insert_at, reference),
        }
    }

    /// Distinct referenced MFT records, sorted by entry index
    pub fn file_references(&self) -> &[FileReference] {
        &self.file_references
    }

    pub fn entries(&self) -> &[AttributeListEntry] {
        &self.entries
    }

    pub fn number_of_entries(&self) -> usize {
        self.entries.len()
    }
}
