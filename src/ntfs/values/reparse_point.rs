//! `$REPARSE_POINT` decoding
//!
//! An 8-byte header (tag, payload size, padding) followed by tag-specific
//! payload. Mount points and symbolic links carry substitute and print
//! names whose offsets are relative to their sub-header; the decoder
//! normalises them into offsets within the payload. Windows Overlay Filter
//! points carry provider versions and the compression method. Unknown tags
//! keep their payload verbatim and expose no names.

use crate::error::{MftScopeError, Result};
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::values::check_attribute_type;
use crate::ntfs::{AttributeType, MAXIMUM_ALLOCATION_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;

/// Windows Overlay Filter reparse tag
pub const TAG_WOF: u32 = 0x8000_0017;

/// Mount point (junction) reparse tag
pub const TAG_MOUNT_POINT: u32 = 0xa000_0003;

/// Symbolic link reparse tag
pub const TAG_SYMBOLIC_LINK: u32 = 0xa000_000c;

/// Size of the reparse point header
const HEADER_SIZE: usize = 8;

/// Size of the mount point sub-header
const MOUNT_POINT_SUB_HEADER_SIZE: u16 = 8;

/// Size of the symbolic link sub-header
const SYMBOLIC_LINK_SUB_HEADER_SIZE: u16 = 12;

/// Windows Overlay Filter payload
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WofValues {
    pub external_version: u32,
    pub external_provider: u32,
    pub internal_version: u32,
    pub compression_method: u32,
}

impl WofValues {
    /// Conventional name of the compression method
    pub fn compression_method_name(&self) -> &'static str {
        match self.compression_method {
            0 => "XPRESS4K",
            1 => "LZX",
            2 => "XPRESS8K",
            3 => "XPRESS16K",
            _ => "<unknown>",
        }
    }
}

/// Decoded `$REPARSE_POINT` value
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReparsePointValues {
    pub tag: u32,
    reparse_data: Vec<u8>,
    /// Substitute name location within `reparse_data`
    substitute_name_offset: u16,
    substitute_name_size: u16,
    /// Print name location within `reparse_data`
    print_name_offset: u16,
    print_name_size: u16,
    has_names: bool,
    /// Symbolic link flags
    pub flags: Option<u32>,
    pub wof: Option<WofValues>,
}

impl ReparsePointValues {
    /// Decode from a resident payload
    pub fn read_data(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(MftScopeError::UnsupportedValue(format!(
                "$REPARSE_POINT of {} bytes ({} or more expected)",
                data.len(),
                HEADER_SIZE
            )));
        }

        let mut cursor = Cursor::new(data);
        let tag = cursor.read_u32::<LittleEndian>()?;
        let reparse_data_size = cursor.read_u16::<LittleEndian>()? as usize;
        let _padding = cursor.read_u16::<LittleEndian>()?;

        if reparse_data_size > data.len() - HEADER_SIZE
            || reparse_data_size as u64 > MAXIMUM_ALLOCATION_SIZE
        {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "reparse data of {} bytes outside value of {} bytes",
                reparse_data_size,
                data.len()
            )));
        }
        let reparse_data = data[HEADER_SIZE..HEADER_SIZE + reparse_data_size].to_vec();

        let mut values = Self {
            tag,
            reparse_data,
            ..Default::default()
        };

        match tag {
            TAG_WOF => {
                if values.reparse_data.len() < 16 {
                    return Err(MftScopeError::ValueOutOfBounds(
                        "Windows Overlay Filter data smaller than 16 bytes".to_string(),
                    ));
                }
                let mut wof_cursor = Cursor::new(values.reparse_data.as_slice());
                values.wof = Some(WofValues {
                    external_version: wof_cursor.read_u32::<LittleEndian>()?,
                    external_provider: wof_cursor.read_u32::<LittleEndian>()?,
                    internal_version: wof_cursor.read_u32::<LittleEndian>()?,
                    compression_method: wof_cursor.read_u32::<LittleEndian>()?,
                });
            }
            TAG_MOUNT_POINT | TAG_SYMBOLIC_LINK => {
                let sub_header_size = if tag == TAG_MOUNT_POINT {
                    MOUNT_POINT_SUB_HEADER_SIZE
                } else {
                    SYMBOLIC_LINK_SUB_HEADER_SIZE
                };
                if values.reparse_data.len() < sub_header_size as usize {
                    return Err(MftScopeError::ValueOutOfBounds(format!(
                        "reparse name sub-header needs {} bytes, got {}",
                        sub_header_size,
                        values.reparse_data.len()
                    )));
                }
                let mut name_cursor = Cursor::new(values.reparse_data.as_slice());
                let substitute_name_offset = name_cursor.read_u16::<LittleEndian>()?;
                let substitute_name_size = name_cursor.read_u16::<LittleEndian>()?;
                let print_name_offset = name_cursor.read_u16::<LittleEndian>()?;
                let print_name_size = name_cursor.read_u16::<LittleEndian>()?;
                if tag == TAG_SYMBOLIC_LINK {
                    values.flags = Some(name_cursor.read_u32::<LittleEndian>()?);
                }

                // Name offsets are relative to the sub-header end; normalise
                // them into the payload
                values.substitute_name_offset =
                    checked_name_offset(substitute_name_offset, sub_header_size)?;
                values.substitute_name_size = substitute_name_size;
                values.print_name_offset = checked_name_offset(print_name_offset, sub_header_size)?;
                values.print_name_size = print_name_size;
                values.has_names = true;

                let reparse_data_size = values.reparse_data.len();
                for (offset, size) in [
                    (values.substitute_name_offset, substitute_name_size),
                    (values.print_name_offset, print_name_size),
                ] {
                    if size == 0 {
                        continue;
                    }
                    if offset as usize >= reparse_data_size
                        || size as usize > reparse_data_size - offset as usize
                    {
                        return Err(MftScopeError::ValueOutOfBounds(format!(
                            "reparse name at {}..{} outside data of {} bytes",
                            offset,
                            offset as usize + size as usize,
                            reparse_data_size
                        )));
                    }
                }
            }
            _ => {}
        }
        Ok(values)
    }

    /// Decode from a `$REPARSE_POINT` attribute
    pub fn read_from_mft_attribute(attribute: &MftAttribute) -> Result<Self> {
        check_attribute_type(attribute, AttributeType::ReparsePoint)?;
        Self::read_data(attribute.resident_data()?)
    }

    pub fn reparse_data(&self) -> &[u8] {
        &self.reparse_data
    }

    pub fn reparse_data_size(&self) -> usize {
        self.reparse_data.len()
    }

    /// Substitute name of a mount point or symbolic link
    pub fn substitute_name(&self) -> Option<String> {
        self.name_at(self.substitute_name_offset, self.substitute_name_size)
    }

    /// Print name of a mount point or symbolic link
    pub fn print_name(&self) -> Option<String> {
        self.name_at(self.print_name_offset, self.print_name_size)
    }

    /// Windows Overlay Filter compression method, when the tag carries one
    pub fn compression_method(&self) -> Option<u32> {
        self.wof.map(|wof| wof.compression_method)
    }

    fn name_at(&self, offset: u16, size: u16) -> Option<String> {
        if !self.has_names || size == 0 {
            return None;
        }
        let units: Vec<u16> = self.reparse_data[offset as usize..offset as usize + size as usize]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    }
}

fn checked_name_offset(relative_offset: u16, sub_header_size: u16) -> Result<u16> {
    relative_offset
        .checked_add(sub_header_size)
        .ok_or_else(|| {
            MftScopeError::ValueOutOfBounds("reparse name offset overflows".to_string())
        })
}
