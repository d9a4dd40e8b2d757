//! MFT attribute decoding
//!
//! An attribute starts with a 16-byte common header followed by either the
//! resident form (inline payload) or the non-resident form (VCN range plus a
//! packed data-run list locating the payload in clusters). A single logical
//! attribute too large for one record is split across extension records;
//! the pieces share `(type, name)` and are linked into a chain in ascending
//! VCN order.

use crate::error::{MftScopeError, Result};
use crate::ntfs::collation;
use crate::ntfs::{ATTRIBUTE_FLAG_COMPRESSION_MASK, ATTRIBUTE_FLAG_ENCRYPTED, ATTRIBUTE_FLAG_SPARSE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Size of the common attribute header
const HEADER_SIZE: usize = 16;

/// Size of the resident attribute form (common header included)
const RESIDENT_FORM_SIZE: usize = 24;

/// Size of the non-resident attribute form without the compressed-size field
const NON_RESIDENT_FORM_SIZE: usize = 64;

/// Size of the non-resident attribute form with the compressed-size field
const NON_RESIDENT_COMPRESSED_FORM_SIZE: usize = 72;

// ============================================================================
// Data runs
// ============================================================================

/// One extent of a non-resident attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRun {
    /// Length of the extent in cluster blocks
    pub cluster_count: u64,
    /// Absolute logical cluster number, or `None` for a sparse extent
    pub lcn: Option<u64>,
}

impl DataRun {
    pub fn is_sparse(&self) -> bool {
        self.lcn.is_none()
    }
}

/// Decode a packed data-run list.
///
/// Each run starts with a header byte whose low nibble is the byte width of
/// the cluster count and whose high nibble is the byte width of the signed
/// LCN delta; a zero header byte terminates the list. A zero-width or
/// zero-valued delta marks a sparse run. The decoded cluster total must not
/// exceed `maximum_clusters`.
fn read_data_runs(data: &[u8], maximum_clusters: u64) -> Result<Vec<DataRun>> {
    let mut runs = Vec::new();
    let mut position = 0;
    let mut current_lcn: i64 = 0;
    let mut total_clusters: u64 = 0;

    while position < data.len() {
        let header = data[position];
        if header == 0 {
            break;
        }
        position += 1;

        let count_width = (header & 0x0f) as usize;
        let delta_width = ((header >> 4) & 0x0f) as usize;

        if count_width == 0 || count_width > 8 || delta_width > 8 {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "data run header 0x{:02x} has unsupported field widths",
                header
            )));
        }
        if position + count_width + delta_width > data.len() {
            return Err(MftScopeError::ValueOutOfBounds(
                "data run extends past the attribute".to_string(),
            ));
        }

        let mut cluster_count = 0u64;
        for byte_index in 0..count_width {
            cluster_count |= (data[position + byte_index] as u64) << (byte_index * 8);
        }
        position += count_width;

        let lcn = if delta_width == 0 {
            None
        } else {
            let mut delta = 0i64;
            for byte_index in 0..delta_width {
                delta |= (data[position + byte_index] as i64) << (byte_index * 8);
            }
            // Sign-extend from the top bit of the last byte
            if delta_width < 8 && (data[position + delta_width - 1] & 0x80) != 0 {
                for byte_index in delta_width..8 {
                    delta |= 0xffi64 << (byte_index * 8);
                }
            }
            position += delta_width;

            if delta == 0 {
                None
            } else {
                current_lcn += delta;
                if current_lcn < 0 {
                    return Err(MftScopeError::ValueOutOfBounds(format!(
                        "data run decodes to negative LCN {}",
                        current_lcn
                    )));
                }
                Some(current_lcn as u64)
            }
        };

        total_clusters = total_clusters.checked_add(cluster_count).ok_or_else(|| {
            MftScopeError::ValueOutOfBounds("data run cluster total overflows".to_string())
        })?;
        if total_clusters > maximum_clusters {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "data runs cover {} clusters, VCN range allows {}",
                total_clusters, maximum_clusters
            )));
        }

        runs.push(DataRun { cluster_count, lcn });
    }
    Ok(runs)
}

// ============================================================================
// Attribute
// ============================================================================

/// Resident or non-resident payload of an attribute
#[derive(Debug, Clone)]
pub enum AttributeData {
    Resident {
        /// Inline payload, copied out of the record buffer
        data: Vec<u8>,
        indexed_flag: u8,
    },
    NonResident {
        first_vcn: u64,
        last_vcn: u64,
        /// Compression unit as a power of two of cluster blocks
        compression_unit_size: u16,
        allocated_data_size: u64,
        data_size: u64,
        valid_data_size: u64,
        /// Present when the attribute is compressed or sparse
        total_data_size: Option<u64>,
        data_runs: Vec<DataRun>,
    },
}

/// One decoded MFT attribute, possibly the head of a multi-record chain
#[derive(Debug, Clone)]
pub struct MftAttribute {
    /// Raw attribute type value
    pub attribute_type: u32,
    /// Attribute size within the record, header included
    pub size: u32,
    pub data_flags: u16,
    pub identifier: u16,
    name: Option<Vec<u16>>,
    pub data: AttributeData,
    /// Later pieces of the same logical attribute, ascending by first VCN
    chain: Vec<MftAttribute>,
}

impl MftAttribute {
    /// Decode one attribute from the start of `data`; the slice extends to
    /// the end of the enclosing record.
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(MftScopeError::InvalidArgument(format!(
                "attribute header needs {} bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let attribute_type = cursor.read_u32::<LittleEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;
        let non_resident_flag = cursor.read_u8()?;
        let name_size = cursor.read_u8()?;
        let name_offset = cursor.read_u16::<LittleEndian>()?;
        let data_flags = cursor.read_u16::<LittleEndian>()?;
        let identifier = cursor.read_u16::<LittleEndian>()?;

        let non_resident = (non_resident_flag & 0x01) != 0;
        let is_compressed_or_sparse = (data_flags & ATTRIBUTE_FLAG_COMPRESSION_MASK) != 0
            || (data_flags & ATTRIBUTE_FLAG_SPARSE) != 0;

        let minimum_size = if !non_resident {
            RESIDENT_FORM_SIZE
        } else if is_compressed_or_sparse {
            NON_RESIDENT_COMPRESSED_FORM_SIZE
        } else {
            NON_RESIDENT_FORM_SIZE
        };
        if (size as usize) < minimum_size {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "attribute size {} below the {}-byte form",
                size, minimum_size
            )));
        }
        if size as usize > data.len() {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "attribute size {} exceeds the remaining {} record bytes",
                size,
                data.len()
            )));
        }

        let mut header_end = minimum_size;

        let attribute_data;
        if !non_resident {
            let value_size = cursor.read_u32::<LittleEndian>()?;
            let value_offset = cursor.read_u16::<LittleEndian>()?;
            let indexed_flag = cursor.read_u8()?;

            let name = read_name(data, name_offset, name_size, &mut header_end, size)?;

            let value_offset = value_offset as usize;
            let value_size = value_size as usize;
            let value = if value_size > 0 {
                if value_offset < header_end || value_offset + value_size > size as usize {
                    return Err(MftScopeError::ValueOutOfBounds(format!(
                        "resident data at {}..{} outside attribute of {} bytes",
                        value_offset,
                        value_offset + value_size,
                        size
                    )));
                }
                data[value_offset..value_offset + value_size].to_vec()
            } else {
                Vec::new()
            };
            attribute_data = AttributeData::Resident {
                data: value,
                indexed_flag,
            };

            return Ok(Self {
                attribute_type,
                size,
                data_flags,
                identifier,
                name,
                data: attribute_data,
                chain: Vec::new(),
            });
        }

        let first_vcn = cursor.read_u64::<LittleEndian>()?;
        let last_vcn = cursor.read_u64::<LittleEndian>()?;
        let data_runs_offset = cursor.read_u16::<LittleEndian>()?;
        let compression_unit_size = cursor.read_u16::<LittleEndian>()?;
        let _padding = cursor.read_u32::<LittleEndian>()?;
        let allocated_data_size = cursor.read_u64::<LittleEndian>()?;
        let data_size = cursor.read_u64::<LittleEndian>()?;
        let valid_data_size = cursor.read_u64::<LittleEndian>()?;
        let total_data_size = if is_compressed_or_sparse {
            Some(cursor.read_u64::<LittleEndian>()?)
        } else {
            None
        };

        if last_vcn < first_vcn {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "inverted VCN range {}..{}",
                first_vcn, last_vcn
            )));
        }

        let name = read_name(data, name_offset, name_size, &mut header_end, size)?;

        let data_runs_offset = data_runs_offset as usize;
        if data_runs_offset < header_end || data_runs_offset > size as usize {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "data runs offset {} outside attribute of {} bytes",
                data_runs_offset, size
            )));
        }

        let maximum_clusters = last_vcn - first_vcn + 1;
        let data_runs = read_data_runs(&data[data_runs_offset..size as usize], maximum_clusters)?;

        Ok(Self {
            attribute_type,
            size,
            data_flags,
            identifier,
            name,
            data: AttributeData::NonResident {
                first_vcn,
                last_vcn,
                compression_unit_size,
                allocated_data_size,
                data_size,
                valid_data_size,
                total_data_size,
                data_runs,
            },
            chain: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Predicates and accessors
    // ------------------------------------------------------------------

    pub fn is_resident(&self) -> bool {
        matches!(self.data, AttributeData::Resident { .. })
    }

    pub fn is_compressed(&self) -> bool {
        (self.data_flags & ATTRIBUTE_FLAG_COMPRESSION_MASK) != 0
    }

    pub fn is_encrypted(&self) -> bool {
        (self.data_flags & ATTRIBUTE_FLAG_ENCRYPTED) != 0
    }

    pub fn is_sparse(&self) -> bool {
        (self.data_flags & ATTRIBUTE_FLAG_SPARSE) != 0
    }

    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    /// Attribute name as UTF-16 code units
    pub fn name_utf16(&self) -> Option<&[u16]> {
        self.name.as_deref()
    }

    /// Attribute name transcoded to UTF-8
    pub fn name(&self) -> Option<String> {
        self.name
            .as_ref()
            .map(|units| String::from_utf16_lossy(units))
    }

    /// Case-insensitive comparison of the attribute name with a UTF-8 string
    pub fn compare_name_with_utf8(&self, query: &str) -> bool {
        match &self.name {
            Some(units) => collation::equals_utf8(units, query),
            None => query.is_empty(),
        }
    }

    /// Case-insensitive comparison of the attribute name with UTF-16 units
    pub fn compare_name_with_utf16(&self, query: &[u16]) -> bool {
        match &self.name {
            Some(units) => collation::equals_utf16(units, query),
            None => query.is_empty(),
        }
    }

    /// Inline payload; only valid for resident attributes
    pub fn resident_data(&self) -> Result<&[u8]> {
        match &self.data {
            AttributeData::Resident { data, .. } => Ok(data),
            AttributeData::NonResident { .. } => Err(MftScopeError::UnsupportedValue(
                "attribute data is not resident".to_string(),
            )),
        }
    }

    /// Logical payload size in bytes
    pub fn data_size(&self) -> u64 {
        match &self.data {
            AttributeData::Resident { data, .. } => data.len() as u64,
            AttributeData::NonResident { data_size, .. } => *data_size,
        }
    }

    /// Initialised payload size in bytes
    pub fn valid_data_size(&self) -> u64 {
        match &self.data {
            AttributeData::Resident { data, .. } => data.len() as u64,
            AttributeData::NonResident {
                valid_data_size, ..
            } => *valid_data_size,
        }
    }

    /// Allocated size in bytes (zero for resident attributes)
    pub fn allocated_data_size(&self) -> u64 {
        match &self.data {
            AttributeData::Resident { .. } => 0,
            AttributeData::NonResident {
                allocated_data_size,
                ..
            } => *allocated_data_size,
        }
    }

    /// VCN range of this piece; resident attributes report `(0, 0)`
    pub fn vcn_range(&self) -> (u64, u64) {
        match &self.data {
            AttributeData::Resident { .. } => (0, 0),
            AttributeData::NonResident {
                first_vcn,
                last_vcn,
                ..
            } => (*first_vcn, *last_vcn),
        }
    }

    /// Last VCN across the whole chain
    pub fn chain_last_vcn(&self) -> u64 {
        match self.chain.last() {
            Some(piece) => piece.vcn_range().1,
            None => self.vcn_range().1,
        }
    }

    /// Chained pieces following this head, in ascending VCN order
    pub fn chain(&self) -> &[MftAttribute] {
        &self.chain
    }

    /// Data runs of the head and every chained piece, in VCN order
    pub fn data_runs(&self) -> Vec<DataRun> {
        let mut runs = Vec::new();
        for piece in std::iter::once(self).chain(self.chain.iter()) {
            if let AttributeData::NonResident { data_runs, .. } = &piece.data {
                runs.extend_from_slice(data_runs);
            }
        }
        runs
    }

    // ------------------------------------------------------------------
    // Chains
    // ------------------------------------------------------------------

    /// Append a piece of the same logical attribute.
    ///
    /// Pieces must share the attribute type and name; they are inserted in
    /// ascending first-VCN order and ranges must not overlap. Two resident
    /// pieces (both with zero VCN ranges) are rejected.
    pub fn append_to_chain(&mut self, piece: MftAttribute) -> Result<()> {
        if piece.attribute_type != self.attribute_type {
            return Err(MftScopeError::InvalidArgument(format!(
                "chained attribute type 0x{:02x} differs from 0x{:02x}",
                piece.attribute_type, self.attribute_type
            )));
        }
        match (&self.name, &piece.name) {
            (None, None) => {}
            (Some(a), Some(b)) if collation::equals_utf16(a, b) => {}
            _ => {
                return Err(MftScopeError::InvalidArgument(
                    "chained attribute name differs from the chain head".to_string(),
                ));
            }
        }
        if self.is_resident() || piece.is_resident() {
            return Err(MftScopeError::UnsupportedValue(
                "resident attributes cannot be chained".to_string(),
            ));
        }

        let (piece_first, piece_last) = piece.vcn_range();

        // Find the insertion point that keeps first VCNs ascending
        let mut insert_at = self.chain.len();
        for (chain_index, existing) in self.chain.iter().enumerate() {
            if existing.vcn_range().0 > piece_first {
                insert_at = chain_index;
                break;
            }
        }

        let previous_last = if insert_at == 0 {
            self.vcn_range().1
        } else {
            self.chain[insert_at - 1].vcn_range().1
        };
        if piece_first <= previous_last {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "chained VCN range {}..{} overlaps preceding range ending at {}",
                piece_first, piece_last, previous_last
            )));
        }
        if insert_at < self.chain.len() && self.chain[insert_at].vcn_range().0 <= piece_last {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "chained VCN range {}..{} overlaps following range",
                piece_first, piece_last
            )));
        }

        self.chain.insert(insert_at, piece);
        Ok(())
    }
}

/// Decode the optional attribute name and advance `header_end` past it
fn read_name(
    data: &[u8],
    name_offset: u16,
    name_size: u8,
    header_end: &mut usize,
    attribute_size: u32,
) -> Result<Option<Vec<u16>>> {
    if name_size == 0 {
        return Ok(None);
    }
    let name_offset = name_offset as usize;
    let name_bytes = name_size as usize * 2;

    if name_offset < *header_end || name_offset + name_bytes > attribute_size as usize {
        return Err(MftScopeError::ValueOutOfBounds(format!(
            "attribute name at {}..{} outside attribute of {} bytes",
            name_offset,
            name_offset + name_bytes,
            attribute_size
        )));
    }
    let units: Vec<u16> = data[name_offset..name_offset + name_bytes]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    *header_end = name_offset + name_bytes;
    Ok(Some(units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntfs::test_data::{mft_entry_data1, volume_name_attribute_data};
    use crate::ntfs::AttributeType;

    #[test]
    fn test_read_data_resident_named() {
        // $FILE_NAME of the $MFT record: resident, no name
        let record = mft_entry_data1();
        let attribute = MftAttribute::read_data(&record[152..]).unwrap();

        assert_eq!(attribute.attribute_type, AttributeType::FileName as u32);
        assert_eq!(attribute.size, 0x68);
        assert!(attribute.is_resident());
        assert!(!attribute.has_name());
        assert_eq!(attribute.data_size(), 0x4a);

        let content = attribute.resident_data().unwrap();
        // Parent file reference of the $MFT entry names the root directory
        assert_eq!(&content[0..8], &[0x05, 0, 0, 0, 0, 0, 0x05, 0]);
    }

    #[test]
    fn test_read_data_resident_volume_name() {
        let data = volume_name_attribute_data();
        let attribute = MftAttribute::read_data(&data).unwrap();

        assert_eq!(attribute.attribute_type, AttributeType::VolumeName as u32);
        assert!(attribute.is_resident());
        assert_eq!(attribute.data_size(), 20);
        assert_eq!(
            String::from_utf16_lossy(
                &attribute
                    .resident_data()
                    .unwrap()
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect::<Vec<u16>>()
            ),
            "TestVolume"
        );
    }

    #[test]
    fn test_read_data_non_resident_with_runs() {
        // The unnamed $DATA of the $MFT record
        let record = mft_entry_data1();
        let attribute = MftAttribute::read_data(&record[256..]).unwrap();

        assert_eq!(attribute.attribute_type, AttributeType::Data as u32);
        assert!(!attribute.is_resident());
        assert_eq!(attribute.vcn_range(), (0, 0x3f));
        assert_eq!(attribute.data_size(), 0x40000);
        assert_eq!(attribute.valid_data_size(), 0x40000);
        assert_eq!(attribute.allocated_data_size(), 0x40000);

        let runs = attribute.data_runs();
        assert_eq!(
            runs,
            vec![
                DataRun {
                    cluster_count: 0x04,
                    lcn: Some(0xfa)
                },
                DataRun {
                    cluster_count: 0x3c,
                    lcn: Some(0xfa + 0x185)
                },
            ]
        );
    }

    #[test]
    fn test_read_data_runs_with_sparse_and_negative_delta() {
        // 3 clusters at LCN 0x100, 2 sparse clusters, 4 clusters back at 0xf0
        let data = [0x21, 0x03, 0x00, 0x01, 0x01, 0x02, 0x11, 0x04, 0xf0, 0x00];
        let runs = read_data_runs(&data, 9).unwrap();

        assert_eq!(
            runs,
            vec![
                DataRun {
                    cluster_count: 3,
                    lcn: Some(0x100)
                },
                DataRun {
                    cluster_count: 2,
                    lcn: None
                },
                DataRun {
                    cluster_count: 4,
                    lcn: Some(0xf0)
                },
            ]
        );
    }

    #[test]
    fn test_read_data_runs_past_vcn_range() {
        let data = [0x21, 0x10, 0x00, 0x01, 0x00];
        let result = read_data_runs(&data, 4);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_read_data_runs_negative_lcn() {
        let data = [0x21, 0x04, 0x00, 0xff, 0x00];
        let result = read_data_runs(&data, 16);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_read_data_runs_truncated() {
        let data = [0x42, 0x04];
        let result = read_data_runs(&data, 16);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_read_data_inverted_vcn_range() {
        let record = mft_entry_data1();
        let mut data = record[256..336].to_vec();
        // first VCN 64 against a last VCN of 63
        data[16..24].copy_from_slice(&64u64.to_le_bytes());

        let result = MftAttribute::read_data(&data);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_read_data_resident_payload_out_of_bounds() {
        let mut data = volume_name_attribute_data();
        // Payload of 0x30 bytes at offset 0x18 exceeds the 0x30-byte attribute
        data[16..20].copy_from_slice(&0x30u32.to_le_bytes());

        let result = MftAttribute::read_data(&data);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_read_data_size_exceeds_record() {
        let data = volume_name_attribute_data();
        let result = MftAttribute::read_data(&data[..32]);
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    fn non_resident_piece(first_vcn: u64, last_vcn: u64) -> MftAttribute {
        MftAttribute {
            attribute_type: AttributeType::Data as u32,
            size: 64,
            data_flags: 0,
            identifier: 0,
            name: None,
            data: AttributeData::NonResident {
                first_vcn,
                last_vcn,
                compression_unit_size: 0,
                allocated_data_size: 0,
                data_size: 0,
                valid_data_size: 0,
                total_data_size: None,
                data_runs: Vec::new(),
            },
            chain: Vec::new(),
        }
    }

    #[test]
    fn test_append_to_chain_orders_by_vcn() {
        let mut head = non_resident_piece(0, 15);
        head.append_to_chain(non_resident_piece(32, 47)).unwrap();
        head.append_to_chain(non_resident_piece(16, 31)).unwrap();

        let firsts: Vec<u64> = head.chain().iter().map(|piece| piece.vcn_range().0).collect();
        assert_eq!(firsts, vec![16, 32]);
        assert_eq!(head.chain_last_vcn(), 47);
    }

    #[test]
    fn test_append_to_chain_rejects_overlap() {
        let mut head = non_resident_piece(0, 15);
        let result = head.append_to_chain(non_resident_piece(15, 31));
        assert!(matches!(result, Err(MftScopeError::ValueOutOfBounds(_))));
    }

    #[test]
    fn test_append_to_chain_rejects_type_mismatch() {
        let mut head = non_resident_piece(0, 15);
        let mut piece = non_resident_piece(16, 31);
        piece.attribute_type = AttributeType::Bitmap as u32;

        let result = head.append_to_chain(piece);
        assert!(matches!(result, Err(MftScopeError::InvalidArgument(_))));
    }
}
