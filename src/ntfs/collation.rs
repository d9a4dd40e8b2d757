//! Case-insensitive NTFS name comparison
//!
//! NTFS compares file and attribute names per UTF-16 code unit through an
//! upcase table. The names the core itself has to match (`$I30`,
//! `$TXF_DATA`, `WofCompressedData`, `$SDS`) are all ASCII, so an
//! ASCII-range upcase is used; non-ASCII code units compare verbatim.

use std::cmp::Ordering;

#[inline]
fn upcase(unit: u16) -> u16 {
    if (b'a' as u16..=b'z' as u16).contains(&unit) {
        unit - 0x20
    } else {
        unit
    }
}

/// Compare two UTF-16 names case-insensitively
pub fn compare_utf16(a: &[u16], b: &[u16]) -> Ordering {
    for (left, right) in a.iter().zip(b.iter()) {
        match upcase(*left).cmp(&upcase(*right)) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Compare a UTF-16 name against a UTF-8 query string case-insensitively
pub fn compare_utf16_with_utf8(name: &[u16], query: &str) -> Ordering {
    let mut units = name.iter().copied();
    let mut query_units = query.encode_utf16();

    loop {
        match (units.next(), query_units.next()) {
            (Some(left), Some(right)) => match upcase(left).cmp(&upcase(right)) {
                Ordering::Equal => {}
                other => return other,
            },
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Case-insensitive equality of two UTF-16 names
pub fn equals_utf16(a: &[u16], b: &[u16]) -> bool {
    compare_utf16(a, b) == Ordering::Equal
}

/// Case-insensitive equality of a UTF-16 name and a UTF-8 query string
pub fn equals_utf8(name: &[u16], query: &str) -> bool {
    compare_utf16_with_utf8(name, query) == Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_equals_utf8_case_insensitive() {
        assert!(equals_utf8(&utf16("WofCompressedData"), "wofcompresseddata"));
        assert!(equals_utf8(&utf16("$I30"), "$i30"));
        assert!(equals_utf8(&utf16("$TXF_DATA"), "$TXF_DATA"));
        assert!(!equals_utf8(&utf16("$I30"), "$I31"));
    }

    #[test]
    fn test_compare_orders_by_upcased_units() {
        assert_eq!(compare_utf16(&utf16("abc"), &utf16("ABC")), Ordering::Equal);
        assert_eq!(compare_utf16(&utf16("abc"), &utf16("abd")), Ordering::Less);
        assert_eq!(
            compare_utf16_with_utf8(&utf16("abcd"), "abc"),
            Ordering::Greater
        );
    }

    #[test]
    fn test_non_ascii_units_compare_verbatim() {
        assert!(!equals_utf16(&utf16("é"), &utf16("É")));
        assert!(equals_utf16(&utf16("é"), &utf16("é")));
    }
}
