//! NTFS on-disk format support
//!
//! This module provides the read-only NTFS parsing core:
//! - Boot-sector (volume header) decoding
//! - MFT record and attribute parsing with fix-up verification
//! - `$ATTRIBUTE_LIST` resolution across extension records
//! - Typed attribute value decoders
//! - An LRU-cached, on-demand view of the MFT

pub mod attribute;
pub mod attribute_list;
pub mod cache;
pub mod cluster_stream;
pub mod collation;
pub mod entry;
pub mod entry_header;
pub mod fixup;
pub mod values;
pub mod volume;
pub mod volume_header;

#[cfg(test)]
pub(crate) mod test_data;

// Re-export commonly used types
pub use attribute::{AttributeData, DataRun, MftAttribute};
pub use attribute_list::{AttributeList, AttributeListEntry};
pub use cache::{MftEntryCache, MftEntryReader};
pub use cluster_stream::ClusterStream;
pub use entry::MftEntry;
pub use entry_header::{HeaderOutcome, MftEntryHeader};
pub use values::{AttributeObject, AttributeValue};
pub use volume::NtfsVolume;
pub use volume_header::VolumeHeader;

use serde::Serialize;

// ============================================================================
// NTFS Constants
// ============================================================================

/// MFT record signature "FILE"
pub const MFT_ENTRY_SIGNATURE: &[u8; 4] = b"FILE";

/// Bad MFT record signature "BAAD"
pub const MFT_ENTRY_BAD_SIGNATURE: &[u8; 4] = b"BAAD";

/// End of attributes marker
pub const END_OF_ATTRIBUTES: u32 = 0xFFFF_FFFF;

/// Fix-up stride: one fix-up value protects each 512-byte sector
pub const FIXUP_SECTOR_SIZE: usize = 512;

/// Guard against absurd on-disk size fields driving allocations
pub const MAXIMUM_ALLOCATION_SIZE: u64 = 256 * 1024 * 1024;

// MFT entry header flags
pub const MFT_ENTRY_FLAG_IN_USE: u16 = 0x0001;
pub const MFT_ENTRY_FLAG_HAS_INDEX: u16 = 0x0002;

// Attribute data flags
pub const ATTRIBUTE_FLAG_COMPRESSION_MASK: u16 = 0x00ff;
pub const ATTRIBUTE_FLAG_ENCRYPTED: u16 = 0x4000;
pub const ATTRIBUTE_FLAG_SPARSE: u16 = 0x8000;

// ============================================================================
// Attribute Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectIdentifier = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    ExtendedInformation = 0xD0,
    Extended = 0xE0,
    PropertySet = 0xF0,
    LoggedUtilityStream = 0x100,
    End = 0xFFFF_FFFF,
}

impl AttributeType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x10 => Some(Self::StandardInformation),
            0x20 => Some(Self::AttributeList),
            0x30 => Some(Self::FileName),
            0x40 => Some(Self::ObjectIdentifier),
            0x50 => Some(Self::SecurityDescriptor),
            0x60 => Some(Self::VolumeName),
            0x70 => Some(Self::VolumeInformation),
            0x80 => Some(Self::Data),
            0x90 => Some(Self::IndexRoot),
            0xA0 => Some(Self::IndexAllocation),
            0xB0 => Some(Self::Bitmap),
            0xC0 => Some(Self::ReparsePoint),
            0xD0 => Some(Self::ExtendedInformation),
            0xE0 => Some(Self::Extended),
            0xF0 => Some(Self::PropertySet),
            0x100 => Some(Self::LoggedUtilityStream),
            0xFFFF_FFFF => Some(Self::End),
            _ => None,
        }
    }

    /// Conventional display name of the attribute type
    pub fn name(&self) -> &'static str {
        match self {
            Self::StandardInformation => "$STANDARD_INFORMATION",
            Self::AttributeList => "$ATTRIBUTE_LIST",
            Self::FileName => "$FILE_NAME",
            Self::ObjectIdentifier => "$OBJECT_ID",
            Self::SecurityDescriptor => "$SECURITY_DESCRIPTOR",
            Self::VolumeName => "$VOLUME_NAME",
            Self::VolumeInformation => "$VOLUME_INFORMATION",
            Self::Data => "$DATA",
            Self::IndexRoot => "$INDEX_ROOT",
            Self::IndexAllocation => "$INDEX_ALLOCATION",
            Self::Bitmap => "$BITMAP",
            Self::ReparsePoint => "$REPARSE_POINT",
            Self::ExtendedInformation => "$EA_INFORMATION",
            Self::Extended => "$EA",
            Self::PropertySet => "$PROPERTY_SET",
            Self::LoggedUtilityStream => "$LOGGED_UTILITY_STREAM",
            Self::End => "<end of attributes>",
        }
    }
}

/// Display name for a raw attribute type value
pub fn attribute_type_name(value: u32) -> &'static str {
    match AttributeType::from_u32(value) {
        Some(attribute_type) => attribute_type.name(),
        None => "<unknown>",
    }
}

// ============================================================================
// File Reference
// ============================================================================

/// 64-bit name of an MFT record: low 48 bits are the entry index, high
/// 16 bits are the slot reuse sequence number. Lookups compare the 48-bit
/// entry portion; the sequence is carried for integrity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FileReference(u64);

impl FileReference {
    pub const ENTRY_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

    pub fn new(entry: u64, sequence: u16) -> Self {
        FileReference((entry & Self::ENTRY_MASK) | ((sequence as u64) << 48))
    }

    pub fn from_u64(value: u64) -> Self {
        FileReference(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// MFT entry index (lower 48 bits)
    pub fn entry(&self) -> u64 {
        self.0 & Self::ENTRY_MASK
    }

    /// Slot reuse sequence number (upper 16 bits)
    pub fn sequence(&self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for FileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.entry(), self.sequence())
    }
}

// ============================================================================
// FILETIME conversion utilities
// ============================================================================

/// Convert Windows FILETIME (100-nanosecond intervals since 1601) to Unix timestamp
pub fn filetime_to_unix(filetime: u64) -> i64 {
    // Difference between 1601 and 1970 in 100-nanosecond intervals
    const EPOCH_DIFF: u64 = 116_444_736_000_000_000;

    if filetime < EPOCH_DIFF {
        return 0;
    }

    ((filetime - EPOCH_DIFF) / 10_000_000) as i64
}

/// Convert Windows FILETIME to chrono DateTime
pub fn filetime_to_datetime(filetime: u64) -> chrono::DateTime<chrono::Utc> {
    use chrono::{TimeZone, Utc};
    let unix_ts = filetime_to_unix(filetime);
    Utc.timestamp_opt(unix_ts, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap())
}

// ============================================================================
// File Attributes
// ============================================================================

pub mod file_attributes {
    pub const READONLY: u32 = 0x0000_0001;
    pub const HIDDEN: u32 = 0x0000_0002;
    pub const SYSTEM: u32 = 0x0000_0004;
    pub const DIRECTORY: u32 = 0x0000_0010;
    pub const ARCHIVE: u32 = 0x0000_0020;
    pub const DEVICE: u32 = 0x0000_0040;
    pub const NORMAL: u32 = 0x0000_0080;
    pub const TEMPORARY: u32 = 0x0000_0100;
    pub const SPARSE_FILE: u32 = 0x0000_0200;
    pub const REPARSE_POINT: u32 = 0x0000_0400;
    pub const COMPRESSED: u32 = 0x0000_0800;
    pub const OFFLINE: u32 = 0x0000_1000;
    pub const NOT_CONTENT_INDEXED: u32 = 0x0000_2000;
    pub const ENCRYPTED: u32 = 0x0000_4000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_reference_split() {
        let reference = FileReference::from_u64(0x0001_0000_0000_08c8);
        assert_eq!(reference.entry(), 0x08c8);
        assert_eq!(reference.sequence(), 1);

        let rebuilt = FileReference::new(0x08c8, 1);
        assert_eq!(rebuilt, reference);
    }

    #[test]
    fn test_attribute_type_round_trip() {
        assert_eq!(
            AttributeType::from_u32(0x80),
            Some(AttributeType::Data)
        );
        assert_eq!(AttributeType::from_u32(0x42), None);
        assert_eq!(attribute_type_name(0x100), "$LOGGED_UTILITY_STREAM");
    }

    #[test]
    fn test_filetime_to_unix() {
        // 2019-09-01 00:00:00 UTC
        assert_eq!(filetime_to_unix(132_117_696_000_000_000), 1_567_296_000);
        // Before the Unix epoch clamps to zero
        assert_eq!(filetime_to_unix(0), 0);
    }
}
