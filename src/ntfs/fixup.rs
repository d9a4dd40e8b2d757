//! Fix-up (update sequence array) transform
//!
//! NTFS replaces the last two bytes of every 512-byte sector of a
//! multi-sector record with a placeholder value before writing, keeping the
//! real bytes in the record's fix-up array. A torn write leaves a sector
//! whose tail no longer matches the placeholder. This module reverses the
//! transform so downstream decoders see the real bytes.

use crate::error::{MftScopeError, Result};
use crate::ntfs::FIXUP_SECTOR_SIZE;

/// Apply the fix-up values to a multi-sector record buffer.
///
/// The fix-up array at `fixup_values_offset` starts with the 2-byte
/// placeholder, followed by `number_of_fixup_values` 2-byte entries, one per
/// sector. Before replacement the tail of each sector should equal the
/// placeholder; a mismatch is logged and the replacement still applied, so
/// the caller's structural validation decides whether the record is usable.
pub fn apply(
    data: &mut [u8],
    fixup_values_offset: u16,
    number_of_fixup_values: u16,
) -> Result<()> {
    let fixup_values_offset = fixup_values_offset as usize;
    let number_of_fixup_values = number_of_fixup_values as usize;

    if fixup_values_offset >= data.len() {
        return Err(MftScopeError::InvalidArgument(format!(
            "fix-up values offset {} outside record of {} bytes",
            fixup_values_offset,
            data.len()
        )));
    }
    if number_of_fixup_values == 0 {
        return Err(MftScopeError::InvalidArgument(
            "number of fix-up values is zero".to_string(),
        ));
    }
    let fixup_values_size = 2 + number_of_fixup_values * 2;
    if fixup_values_size > data.len() - fixup_values_offset {
        return Err(MftScopeError::InvalidArgument(format!(
            "fix-up array of {} bytes at offset {} outside record of {} bytes",
            fixup_values_size,
            fixup_values_offset,
            data.len()
        )));
    }
    // The on-disk count field includes the placeholder, so the array may
    // carry one more value than there are sectors; values whose sector lies
    // past the end of the record are skipped.
    let placeholder = [data[fixup_values_offset], data[fixup_values_offset + 1]];

    let mut fixup_value_offset = fixup_values_offset + 2;
    let mut data_offset = FIXUP_SECTOR_SIZE - 2;

    for fixup_value_index in 0..number_of_fixup_values {
        if data_offset + 1 < data.len() {
            if data[data_offset] != placeholder[0] || data[data_offset + 1] != placeholder[1] {
                log::warn!(
                    "fix-up value {} mismatch at offset {}: 0x{:02x}{:02x} != placeholder 0x{:02x}{:02x}",
                    fixup_value_index,
                    data_offset,
                    data[data_offset + 1],
                    data[data_offset],
                    placeholder[1],
                    placeholder[0]
                );
            }
            data[data_offset] = data[fixup_value_offset];
            data[data_offset + 1] = data[fixup_value_offset + 1];
        }
        fixup_value_offset += 2;
        data_offset += FIXUP_SECTOR_SIZE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1024-byte record with the fix-up array at offset 48: placeholder
    /// 0x0003, sector tails scrambled to the placeholder, real tail bytes
    /// 0x11 0x22 and 0x33 0x44 stored in the array.
    fn scrambled_record() -> Vec<u8> {
        let mut data = vec![0u8; 1024];
        data[48] = 0x03;
        data[49] = 0x00;
        data[50] = 0x11;
        data[51] = 0x22;
        data[52] = 0x33;
        data[53] = 0x44;
        data[510] = 0x03;
        data[511] = 0x00;
        data[1022] = 0x03;
        data[1023] = 0x00;
        data
    }

    #[test]
    fn test_apply_restores_sector_tails() {
        let mut data = scrambled_record();
        apply(&mut data, 48, 2).unwrap();

        assert_eq!(&data[510..512], &[0x11, 0x22]);
        assert_eq!(&data[1022..1024], &[0x33, 0x44]);
    }

    #[test]
    fn test_apply_twice_is_stable() {
        let mut once = scrambled_record();
        apply(&mut once, 48, 2).unwrap();

        let mut twice = once.clone();
        // The tails no longer match the placeholder; the mismatch is logged
        // but the same values are written back.
        apply(&mut twice, 48, 2).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_apply_offset_out_of_bounds() {
        let mut data = vec![0u8; 1024];
        let result = apply(&mut data, 1024, 2);
        assert!(matches!(result, Err(MftScopeError::InvalidArgument(_))));
    }

    #[test]
    fn test_apply_zero_values() {
        let mut data = vec![0u8; 1024];
        let result = apply(&mut data, 48, 0);
        assert!(matches!(result, Err(MftScopeError::InvalidArgument(_))));
    }

    #[test]
    fn test_apply_array_exceeds_record() {
        let mut data = vec![0u8; 1024];
        let result = apply(&mut data, 1020, 4);
        assert!(matches!(result, Err(MftScopeError::InvalidArgument(_))));
    }

    #[test]
    fn test_apply_tolerates_placeholder_in_count() {
        // On-disk records store the array length including the placeholder:
        // count 3 on a two-sector record. The value without a sector is
        // ignored.
        let mut data = scrambled_record();
        apply(&mut data, 48, 3).unwrap();

        assert_eq!(&data[510..512], &[0x11, 0x22]);
        assert_eq!(&data[1022..1024], &[0x33, 0x44]);
    }
}
