//! MFT entry parsing
//!
//! One MFT record describes one file, directory or extension piece. Parsing
//! is two-staged: [`MftEntry::read_data`] classifies the record (empty, bad
//! or live), applies the fix-up transform and decodes the header;
//! [`MftEntry::read_attributes`] then enumerates and classifies the
//! attributes. Attributes held in extension records are merged in by the
//! entry reader, cloned into the base record so the base outlives the
//! extension in the cache.

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::attribute_list::AttributeList;
use crate::ntfs::entry_header::{HeaderOutcome, MftEntryHeader};
use crate::ntfs::{collation, fixup, AttributeType, FileReference, END_OF_ATTRIBUTES};

/// Name of the directory entries index
pub const DIRECTORY_ENTRIES_INDEX_NAME: &str = "$I30";

/// Name of the Windows Overlay Filter compressed stream
pub const WOF_COMPRESSED_DATA_NAME: &str = "WofCompressedData";

/// One parsed MFT record
#[derive(Debug, Default)]
pub struct MftEntry {
    /// Raw record bytes, fix-up already reversed
    data: Vec<u8>,
    header: Option<MftEntryHeader>,
    index: u64,
    file_reference: FileReference,

    attributes: Vec<MftAttribute>,
    /// Heads of named `$DATA` streams, one per distinct name
    alternate_data_indices: Vec<usize>,

    standard_information_index: Option<usize>,
    file_name_index: Option<usize>,
    volume_name_index: Option<usize>,
    volume_information_index: Option<usize>,
    reparse_point_index: Option<usize>,
    security_descriptor_index: Option<usize>,
    /// Head of the unnamed `$DATA` chain
    data_attribute_index: Option<usize>,
    wof_compressed_data_index: Option<usize>,
    list_attribute_index: Option<usize>,

    /// Parsed `$ATTRIBUTE_LIST`, set once extension records were resolved
    attribute_list: Option<AttributeList>,

    is_empty: bool,
    is_bad: bool,
    is_corrupted: bool,
    attributes_read: bool,
    has_i30_index: bool,
}

impl MftEntry {
    /// Parse one raw MFT record.
    ///
    /// `index` is the MFT slot the record was read from; when the record's
    /// own index field disagrees, the caller-supplied index wins. Attribute
    /// parsing is deferred to [`MftEntry::read_attributes`].
    pub fn read_data(data: Vec<u8>, index: u64) -> Result<Self> {
        let mut entry = MftEntry {
            index,
            is_empty: true,
            ..Default::default()
        };

        if is_empty_block(&data) {
            entry.data = data;
            return Ok(entry);
        }

        let header = match MftEntryHeader::read_data(&data)? {
            HeaderOutcome::Header(header) => header,
            HeaderOutcome::Empty { is_bad } => {
                entry.data = data;
                entry.is_bad = is_bad;
                return Ok(entry);
            }
        };

        if header.total_entry_size as usize != data.len() {
            log::warn!(
                "MFT entry {}: total entry size {} differs from record size {}",
                index,
                header.total_entry_size,
                data.len()
            );
        }
        if header.attributes_offset as usize >= data.len() {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "attributes offset {} outside record of {} bytes",
                header.attributes_offset,
                data.len()
            )));
        }
        if header.fixup_values_offset > header.attributes_offset {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "fix-up values offset {} past attributes offset {}",
                header.fixup_values_offset, header.attributes_offset
            )));
        }

        entry.data = data;
        if header.number_of_fixup_values > 0 {
            fixup::apply(
                &mut entry.data,
                header.fixup_values_offset,
                header.number_of_fixup_values,
            )?;
        }

        if let Some(header_index) = header.index {
            if header_index as u64 != index {
                log::debug!(
                    "MFT entry {}: record carries index {}, using the caller's",
                    index,
                    header_index
                );
            }
        }
        entry.file_reference = FileReference::new(index, header.sequence);
        entry.header = Some(header);
        entry.is_empty = false;
        Ok(entry)
    }

    /// Enumerate and classify the attributes stored in this record.
    ///
    /// Extension records named by an `$ATTRIBUTE_LIST` are not resolved
    /// here; the entry reader merges those separately.
    pub fn read_attributes(&mut self) -> Result<()> {
        if self.attributes_read {
            return Ok(());
        }
        let header = match &self.header {
            Some(header) => header.clone(),
            None => {
                // Empty and bad records legitimately have no attributes
                self.attributes_read = true;
                return Ok(());
            }
        };

        let used_entry_size = (header.used_entry_size as usize).min(self.data.len());
        let mut offset = header.attributes_offset as usize;

        while offset + 4 <= self.data.len() {
            let attribute_type =
                u32::from_le_bytes(self.data[offset..offset + 4].try_into().expect("four bytes"));
            if attribute_type == END_OF_ATTRIBUTES {
                break;
            }

            let attribute = MftAttribute::read_data(&self.data[offset..])?;
            offset += attribute.size as usize;
            if offset > used_entry_size {
                log::warn!(
                    "MFT entry {}: attribute of type {} ends at {}, past used entry size {}",
                    self.index,
                    attribute.attribute_type,
                    offset,
                    used_entry_size
                );
            }

            self.attributes.push(attribute);
            self.classify_last_attribute()?;
        }

        if self.list_attribute_index.is_none() {
            self.attributes_read = true;
        }
        Ok(())
    }

    /// Merge one attribute cloned out of an extension record
    pub(crate) fn merge_extension_attribute(&mut self, attribute: MftAttribute) -> Result<()> {
        self.attributes.push(attribute);
        self.classify_last_attribute()
    }

    /// Classify the most recently appended attribute and update the helper
    /// indices. Chained pieces of an existing logical attribute move out of
    /// the primary array into their chain head.
    fn classify_last_attribute(&mut self) -> Result<()> {
        let index = self.attributes.len() - 1;
        let attribute_type = self.attributes[index].attribute_type;

        match AttributeType::from_u32(attribute_type) {
            Some(AttributeType::StandardInformation) => {
                set_singleton_index(
                    &mut self.standard_information_index,
                    index,
                    "$STANDARD_INFORMATION attribute",
                )?;
            }
            Some(AttributeType::VolumeInformation) => {
                set_singleton_index(
                    &mut self.volume_information_index,
                    index,
                    "$VOLUME_INFORMATION attribute",
                )?;
            }
            Some(AttributeType::VolumeName) => {
                set_singleton_index(&mut self.volume_name_index, index, "$VOLUME_NAME attribute")?;
            }
            Some(AttributeType::ReparsePoint) => {
                set_singleton_index(
                    &mut self.reparse_point_index,
                    index,
                    "$REPARSE_POINT attribute",
                )?;
            }
            Some(AttributeType::SecurityDescriptor) => {
                set_singleton_index(
                    &mut self.security_descriptor_index,
                    index,
                    "$SECURITY_DESCRIPTOR attribute",
                )?;
            }
            Some(AttributeType::AttributeList) => {
                set_singleton_index(
                    &mut self.list_attribute_index,
                    index,
                    "$ATTRIBUTE_LIST attribute",
                )?;
            }
            Some(AttributeType::FileName) => {
                // Multiple names are expected: hard links and short names
                if self.file_name_index.is_none() {
                    self.file_name_index = Some(index);
                }
            }
            Some(AttributeType::IndexRoot) => {
                if self.attributes[index].compare_name_with_utf8(DIRECTORY_ENTRIES_INDEX_NAME) {
                    self.has_i30_index = true;
                }
            }
            Some(AttributeType::Data) => {
                self.classify_data_attribute(index)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn classify_data_attribute(&mut self, index: usize) -> Result<()> {
        if !self.attributes[index].has_name() {
            match self.data_attribute_index {
                None => self.data_attribute_index = Some(index),
                Some(head) => {
                    let piece = self.attributes.pop().expect("attribute just appended");
                    self.attributes[head].append_to_chain(piece)?;
                }
            }
            return Ok(());
        }

        let name: Vec<u16> = self.attributes[index]
            .name_utf16()
            .expect("named attribute")
            .to_vec();
        let existing = self
            .alternate_data_indices
            .iter()
            .copied()
            .find(|&head| head != index && self.attributes[head].compare_name_with_utf16(&name));

        match existing {
            Some(head) => {
                let piece = self.attributes.pop().expect("attribute just appended");
                self.attributes[head].append_to_chain(piece)?;
            }
            None => {
                self.alternate_data_indices.push(index);
                if collation::equals_utf8(&name, WOF_COMPRESSED_DATA_NAME) {
                    self.wof_compressed_data_index = Some(index);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // State flags
    // ------------------------------------------------------------------

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn is_bad(&self) -> bool {
        self.is_bad
    }

    pub fn is_corrupted(&self) -> bool {
        self.is_corrupted
    }

    /// Check if the record is in use
    pub fn is_allocated(&self) -> bool {
        self.header
            .as_ref()
            .map(|header| header.is_in_use())
            .unwrap_or(false)
    }

    pub fn attributes_read(&self) -> bool {
        self.attributes_read
    }

    /// True when the record carries a `$I30` index root, which flags a
    /// directory
    pub fn has_directory_entries_index(&self) -> bool {
        self.has_i30_index
    }

    pub(crate) fn mark_corrupted(&mut self) {
        self.is_corrupted = true;
    }

    pub(crate) fn mark_attributes_read(&mut self) {
        self.attributes_read = true;
    }

    pub(crate) fn set_attribute_list(&mut self, list: AttributeList) {
        self.attribute_list = Some(list);
    }

    // ------------------------------------------------------------------
    // Record accessors
    // ------------------------------------------------------------------

    /// Raw record bytes with the fix-up transform reversed
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> Option<&MftEntryHeader> {
        self.header.as_ref()
    }

    /// MFT index of this record
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn file_reference(&self) -> FileReference {
        self.file_reference
    }

    /// Base record reference; zero for base records
    pub fn base_record_file_reference(&self) -> FileReference {
        self.header
            .as_ref()
            .map(|header| header.base_record_file_reference)
            .unwrap_or_default()
    }

    pub fn journal_sequence_number(&self) -> u64 {
        self.header
            .as_ref()
            .map(|header| header.journal_sequence_number)
            .unwrap_or(0)
    }

    pub fn attribute_list(&self) -> Option<&AttributeList> {
        self.attribute_list.as_ref()
    }

    // ------------------------------------------------------------------
    // Attribute accessors
    // ------------------------------------------------------------------

    pub fn number_of_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_by_index(&self, index: usize) -> Option<&MftAttribute> {
        self.attributes.get(index)
    }

    pub fn attributes(&self) -> &[MftAttribute] {
        &self.attributes
    }

    pub fn standard_information_attribute(&self) -> Option<&MftAttribute> {
        self.standard_information_index
            .map(|index| &self.attributes[index])
    }

    pub fn file_name_attribute(&self) -> Option<&MftAttribute> {
        self.file_name_index.map(|index| &self.attributes[index])
    }

    pub fn volume_name_attribute(&self) -> Option<&MftAttribute> {
        self.volume_name_index.map(|index| &self.attributes[index])
    }

    pub fn volume_information_attribute(&self) -> Option<&MftAttribute> {
        self.volume_information_index
            .map(|index| &self.attributes[index])
    }

    pub fn reparse_point_attribute(&self) -> Option<&MftAttribute> {
        self.reparse_point_index.map(|index| &self.attributes[index])
    }

    pub fn security_descriptor_attribute(&self) -> Option<&MftAttribute> {
        self.security_descriptor_index
            .map(|index| &self.attributes[index])
    }

    /// Head of the unnamed `$DATA` chain
    pub fn data_attribute(&self) -> Option<&MftAttribute> {
        self.data_attribute_index.map(|index| &self.attributes[index])
    }

    pub fn wof_compressed_data_attribute(&self) -> Option<&MftAttribute> {
        self.wof_compressed_data_index
            .map(|index| &self.attributes[index])
    }

    pub fn list_attribute(&self) -> Option<&MftAttribute> {
        self.list_attribute_index.map(|index| &self.attributes[index])
    }

    // ------------------------------------------------------------------
    // Alternate data streams
    // ------------------------------------------------------------------

    pub fn number_of_alternate_data_attributes(&self) -> usize {
        self.alternate_data_indices.len()
    }

    pub fn alternate_data_attribute_by_index(&self, index: usize) -> Option<&MftAttribute> {
        self.alternate_data_indices
            .get(index)
            .map(|&attribute_index| &self.attributes[attribute_index])
    }

    /// Look up a named `$DATA` stream with NTFS case-insensitive collation
    pub fn alternate_data_attribute_by_utf8_name(&self, name: &str) -> Option<&MftAttribute> {
        self.alternate_data_indices
            .iter()
            .map(|&attribute_index| &self.attributes[attribute_index])
            .find(|attribute| attribute.compare_name_with_utf8(name))
    }

    /// Look up a named `$DATA` stream by UTF-16 name
    pub fn alternate_data_attribute_by_utf16_name(&self, name: &[u16]) -> Option<&MftAttribute> {
        self.alternate_data_indices
            .iter()
            .map(|&attribute_index| &self.attributes[attribute_index])
            .find(|attribute| attribute.compare_name_with_utf16(name))
    }
}

fn set_singleton_index(
    slot: &mut Option<usize>,
    index: usize,
    description: &'static str,
) -> Result<()> {
    if slot.is_some() {
        return Err(MftScopeError::ValueAlreadySet(description));
    }
    *slot = Some(index);
    Ok(())
}

/// Check whether every byte of the buffer equals the first one, in
/// word-sized steps. Uninitialised MFT regions read as repeating fill
/// bytes, whatever the apparent signature.
fn is_empty_block(data: &[u8]) -> bool {
    if data.is_empty() {
        return true;
    }
    let fill = data[0];
    let pattern = u64::from_ne_bytes([fill; 8]);

    let mut chunks = data.chunks_exact(8);
    if !chunks.all(|chunk| u64::from_ne_bytes(chunk.try_into().expect("eight bytes")) == pattern) {
        return false;
    }
    data.chunks_exact(8)
        .remainder()
        .iter()
        .all(|&byte| byte == fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntfs::test_data::{mft_entry_data1, mft_entry_data2};

    #[test]
    fn test_read_data_empty_record() {
        let entry = MftEntry::read_data(vec![0u8; 1024], 12).unwrap();

        assert!(entry.is_empty());
        assert!(!entry.is_bad());
        assert_eq!(entry.number_of_attributes(), 0);
        assert_eq!(entry.index(), 12);
    }

    #[test]
    fn test_read_data_uniform_fill_is_empty() {
        // A repeating fill byte is an empty slot even when byte 0 looks like
        // a signature start
        let entry = MftEntry::read_data(vec![b'F'; 1024], 0).unwrap();
        assert!(entry.is_empty());
    }

    #[test]
    fn test_read_data_bad_record() {
        let mut data = mft_entry_data1();
        data[0..4].copy_from_slice(b"BAAD");

        let mut entry = MftEntry::read_data(data, 0).unwrap();
        assert!(entry.is_empty());
        assert!(entry.is_bad());

        entry.read_attributes().unwrap();
        assert_eq!(entry.number_of_attributes(), 0);
    }

    #[test]
    fn test_read_data_and_attributes_mft_record() {
        let mut entry = MftEntry::read_data(mft_entry_data1(), 0).unwrap();

        assert!(!entry.is_empty());
        assert!(entry.is_allocated());
        assert_eq!(entry.file_reference().entry(), 0);
        assert_eq!(entry.file_reference().sequence(), 1);
        assert!(entry.base_record_file_reference().is_zero());
        assert_eq!(entry.journal_sequence_number(), 0x0010_5152);

        entry.read_attributes().unwrap();
        assert!(entry.attributes_read());
        assert_eq!(entry.number_of_attributes(), 4);

        let types: Vec<u32> = entry
            .attributes()
            .iter()
            .map(|attribute| attribute.attribute_type)
            .collect();
        assert_eq!(types, vec![0x10, 0x30, 0x80, 0xb0]);

        assert!(entry.standard_information_attribute().is_some());
        assert!(entry.file_name_attribute().is_some());
        assert!(entry.volume_name_attribute().is_none());
        assert!(entry.list_attribute().is_none());
        assert!(!entry.has_directory_entries_index());
        assert_eq!(entry.number_of_alternate_data_attributes(), 0);

        let data_attribute = entry.data_attribute().unwrap();
        assert!(!data_attribute.is_resident());
        assert_eq!(data_attribute.vcn_range(), (0, 0x3f));
        assert_eq!(data_attribute.data_runs().len(), 2);
    }

    #[test]
    fn test_read_data_applies_fixup() {
        let entry = MftEntry::read_data(mft_entry_data1(), 0).unwrap();

        // The on-disk sector tails carry the 0x0002 placeholder; the parsed
        // record carries the real bytes from the fix-up array
        assert_eq!(&entry.data()[510..512], &[0xe7, 0x01]);
        assert_eq!(&entry.data()[1022..1024], &[0x00, 0x00]);
    }

    #[test]
    fn test_read_data_ntfs_1_2_record() {
        let mut entry = MftEntry::read_data(mft_entry_data2(), 0).unwrap();
        entry.read_attributes().unwrap();

        assert!(!entry.is_empty());
        assert!(entry.standard_information_attribute().is_some());
        assert!(entry.file_name_attribute().is_some());
    }

    #[test]
    fn test_read_data_caller_index_wins() {
        // The record carries index 0; the caller says slot 7
        let entry = MftEntry::read_data(mft_entry_data1(), 7).unwrap();
        assert_eq!(entry.index(), 7);
        assert_eq!(entry.file_reference().entry(), 7);
        assert_eq!(entry.file_reference().sequence(), 1);
    }

    #[test]
    fn test_read_attributes_duplicate_standard_information() {
        let mut data = mft_entry_data1();
        // Retype the $BITMAP attribute into a second $STANDARD_INFORMATION
        data[336] = 0x10;

        let mut entry = MftEntry::read_data(data, 0).unwrap();
        let result = entry.read_attributes();
        assert!(matches!(result, Err(MftScopeError::ValueAlreadySet(_))));
    }

    #[test]
    fn test_read_data_attributes_offset_out_of_bounds() {
        let mut data = mft_entry_data1();
        data[20..22].copy_from_slice(&1024u16.to_le_bytes());

        let result = MftEntry::read_data(data, 0);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_read_data_fixup_offset_past_attributes() {
        let mut data = mft_entry_data1();
        // Attributes at 56, fix-up array claimed at 60
        data[4..6].copy_from_slice(&60u16.to_le_bytes());

        let result = MftEntry::read_data(data, 0);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    // ------------------------------------------------------------------
    // Synthetic records for stream classification
    // ------------------------------------------------------------------

    fn resident_attribute(attribute_type: u32, name: &str, payload: &[u8]) -> Vec<u8> {
        let name_units: Vec<u8> = name
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        let name_offset = 24usize;
        let payload_offset = name_offset + name_units.len();
        let size = (payload_offset + payload.len() + 7) & !7;

        let mut attribute = vec![0u8; size];
        attribute[0..4].copy_from_slice(&attribute_type.to_le_bytes());
        attribute[4..8].copy_from_slice(&(size as u32).to_le_bytes());
        attribute[8] = 0;
        attribute[9] = (name_units.len() / 2) as u8;
        attribute[10..12].copy_from_slice(&(name_offset as u16).to_le_bytes());
        attribute[16..20].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        attribute[20..22].copy_from_slice(&(payload_offset as u16).to_le_bytes());
        attribute[name_offset..name_offset + name_units.len()].copy_from_slice(&name_units);
        attribute[payload_offset..payload_offset + payload.len()].copy_from_slice(payload);
        attribute
    }

    fn build_record(attributes: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0u8; 1024];
        data[0..4].copy_from_slice(b"FILE");
        data[4..6].copy_from_slice(&48u16.to_le_bytes());
        // No fix-up values: offset valid, count zero
        data[6..8].copy_from_slice(&0u16.to_le_bytes());
        data[16..18].copy_from_slice(&1u16.to_le_bytes());
        data[22..24].copy_from_slice(&1u16.to_le_bytes());
        data[28..32].copy_from_slice(&1024u32.to_le_bytes());

        let mut offset = 56usize;
        data[20..22].copy_from_slice(&(offset as u16).to_le_bytes());
        for attribute in attributes {
            data[offset..offset + attribute.len()].copy_from_slice(attribute);
            offset += attribute.len();
        }
        data[offset..offset + 4].copy_from_slice(&END_OF_ATTRIBUTES.to_le_bytes());
        data[24..28].copy_from_slice(&((offset + 8) as u32).to_le_bytes());
        data
    }

    #[test]
    fn test_alternate_data_streams() {
        let record = build_record(&[
            resident_attribute(0x80, "", b"default stream"),
            resident_attribute(0x80, "Zone.Identifier", b"[ZoneTransfer]"),
            resident_attribute(0x80, "WofCompressedData", b"\x01\x02"),
        ]);

        let mut entry = MftEntry::read_data(record, 30).unwrap();
        entry.read_attributes().unwrap();

        assert_eq!(entry.number_of_attributes(), 3);
        assert_eq!(entry.number_of_alternate_data_attributes(), 2);
        assert_eq!(
            entry.data_attribute().unwrap().resident_data().unwrap(),
            b"default stream"
        );
        assert!(entry.wof_compressed_data_attribute().is_some());

        let stream = entry
            .alternate_data_attribute_by_utf8_name("zone.identifier")
            .unwrap();
        assert_eq!(stream.resident_data().unwrap(), b"[ZoneTransfer]");

        let name_utf16: Vec<u16> = "ZONE.IDENTIFIER".encode_utf16().collect();
        assert!(entry
            .alternate_data_attribute_by_utf16_name(&name_utf16)
            .is_some());
        assert!(entry
            .alternate_data_attribute_by_utf8_name("missing")
            .is_none());
    }

    #[test]
    fn test_directory_entries_index_flag() {
        let record = build_record(&[
            resident_attribute(0x90, "$I30", &[0u8; 16]),
        ]);

        let mut entry = MftEntry::read_data(record, 5).unwrap();
        entry.read_attributes().unwrap();
        assert!(entry.has_directory_entries_index());
    }

    #[test]
    fn test_index_root_with_other_name_is_not_a_directory() {
        let record = build_record(&[
            resident_attribute(0x90, "$SDH", &[0u8; 16]),
        ]);

        let mut entry = MftEntry::read_data(record, 5).unwrap();
        entry.read_attributes().unwrap();
        assert!(!entry.has_directory_entries_index());
    }
}
