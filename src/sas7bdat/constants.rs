//! Binary layout constants for the SAS7BDAT format.
//!
//! Field offsets are named constants rather than in-memory structs: the
//! same record changes layout between the 32-bit and 64-bit variants, so
//! every access goes through an explicit-endianness serialiser at a named
//! offset.

/// 32-byte magic number at the start of every SAS7BDAT file.
pub const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc2, 0xea, 0x81, 0x60,
    0xb3, 0x14, 0x11, 0xcf, 0xbd, 0x92, 0x08, 0x00, 0x09, 0xc7, 0x31, 0x8c, 0x18, 0x1f, 0x10, 0x11,
];

/// Fixed header size emitted by the writer.
pub const HEADER_SIZE: usize = 1024;

/// Fixed page size emitted by the writer.
pub const PAGE_SIZE: usize = 4096;

/// Default declared file version when the caller leaves it unset.
pub const DEFAULT_FILE_VERSION: i64 = 90101;

/// Declared versions at or above this threshold use the 64-bit layout.
pub const U64_VERSION_THRESHOLD: i64 = 90000;

/// Alignment byte denoting a 4-byte shift (64-bit layout marker at offset 32).
pub const ALIGNMENT_OFFSET_4: u8 = 0x33;
/// Alignment byte denoting no shift.
pub const ALIGNMENT_OFFSET_0: u8 = 0x22;

/// Endianness byte values (header offset 37).
pub const ENDIAN_LITTLE: u8 = 0x01;
/// Big-endian marker.
pub const ENDIAN_BIG: u8 = 0x00;

/// File-format byte for UNIX-style files (header offset 39).
pub const FILE_FORMAT_UNIX: u8 = b'1';

/// File-type field contents (header offset 84).
pub const FILE_TYPE: &[u8; 8] = b"SAS FILE";

/// File-info field contents, following the 64-byte file label.
pub const FILE_INFO: &[u8; 8] = b"DATA ~ ~";

/// Host string written into the header tail.
pub const HOST: &[u8] = b"W32_VSPRO";

// Header field offsets. Offsets at or after the timestamps shift by the
// a1 alignment pad; fields after the page count additionally shift by 4
// in 64-bit mode because the count widens from u32 to u64.

/// Alignment flag a2 (64-bit marker).
pub const OFF_ALIGN2: usize = 32;
/// Alignment flag a1 (header-field pad).
pub const OFF_ALIGN1: usize = 35;
/// Endianness byte.
pub const OFF_ENDIAN: usize = 37;
/// File-format byte (UNIX/Windows).
pub const OFF_FILE_FORMAT: usize = 39;
/// Character-set identifier byte.
pub const OFF_ENCODING: usize = 70;
/// File-type string ("SAS FILE"), 8 bytes.
pub const OFF_FILE_TYPE: usize = 84;
/// File label, 64 bytes.
pub const OFF_FILE_LABEL: usize = 92;
/// File-label field width.
pub const FILE_LABEL_LEN: usize = 64;
/// File-info string ("DATA ~ ~"), 8 bytes.
pub const OFF_FILE_INFO: usize = 156;
/// Creation timestamp (f64 seconds since the 1960 epoch), before a1 pad.
pub const OFF_CREATED: usize = 164;
/// Modification timestamp, before a1 pad.
pub const OFF_MODIFIED: usize = 172;
/// Header size (u32), before a1 pad.
pub const OFF_HEADER_SIZE: usize = 196;
/// Page size (u32), before a1 pad.
pub const OFF_PAGE_SIZE: usize = 200;
/// Page count (u32 or u64 by bit width), before a1 pad.
pub const OFF_PAGE_COUNT: usize = 204;
/// Release string (8 bytes), after page count; shifts with bit width.
pub const OFF_RELEASE: usize = 216;
/// Host string (16 bytes), after the release string.
pub const OFF_HOST: usize = 224;
/// Host field width.
pub const HOST_LEN: usize = 16;

/// Page header size for the 32-bit layout.
pub const PAGE_HEADER_SIZE_32: usize = 24;
/// Page header size for the 64-bit layout.
pub const PAGE_HEADER_SIZE_64: usize = 40;
/// Subheader pointer size for the 32-bit layout.
pub const SUBHEADER_POINTER_SIZE_32: usize = 12;
/// Subheader pointer size for the 64-bit layout.
pub const SUBHEADER_POINTER_SIZE_64: usize = 24;

/// Page type for metadata pages.
pub const PAGE_TYPE_META: u16 = 0x0000;
/// Page type for data pages.
pub const PAGE_TYPE_DATA: u16 = 0x0100;

/// Subheader signature: row size.
pub const SIG_ROW_SIZE: u32 = 0xF7F7_F7F7;
/// Subheader signature: column size.
pub const SIG_COLUMN_SIZE: u32 = 0xF6F6_F6F6;
/// Subheader signature: column text pool page.
pub const SIG_COLUMN_TEXT: u32 = 0xFFFF_FFFD;
/// Subheader signature: column names.
pub const SIG_COLUMN_NAME: u32 = 0xFFFF_FFFF;
/// Subheader signature: column attributes.
pub const SIG_COLUMN_ATTRS: u32 = 0xFFFF_FFFC;
/// Subheader signature: per-column format and label.
pub const SIG_COLUMN_FORMAT: u32 = 0xFFFF_FBFE;
/// Subheader signature: column list (classification only; never emitted).
pub const SIG_COLUMN_LIST: u32 = 0xFFFF_FFFE;

/// Signatures at or above this value are sign-extended to 64 bits when
/// written in 64-bit mode.
pub const SIG_EXTEND_THRESHOLD: u32 = 0xFF00_0000;

/// Column-type byte for numeric columns.
pub const COLUMN_TYPE_NUM: u8 = 1;
/// Column-type byte for character columns.
pub const COLUMN_TYPE_CHR: u8 = 2;

/// Fixed header bytes of a COLUMN_TEXT subheader between the signature and
/// the pool contents; text references bake this into their offsets.
pub const COLUMN_TEXT_HEADER_LEN: usize = 28;

/// `true` for the subheader signatures classified as type "A" in pointer
/// records (column text, name, attribute, and list subheaders).
#[must_use]
pub const fn is_type_a_signature(signature: u32) -> bool {
    matches!(
        signature,
        SIG_COLUMN_TEXT | SIG_COLUMN_NAME | SIG_COLUMN_ATTRS | SIG_COLUMN_LIST
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_a_classification() {
        assert!(is_type_a_signature(SIG_COLUMN_TEXT));
        assert!(is_type_a_signature(SIG_COLUMN_NAME));
        assert!(is_type_a_signature(SIG_COLUMN_ATTRS));
        assert!(is_type_a_signature(SIG_COLUMN_LIST));
        assert!(!is_type_a_signature(SIG_ROW_SIZE));
        assert!(!is_type_a_signature(SIG_COLUMN_SIZE));
        assert!(!is_type_a_signature(SIG_COLUMN_FORMAT));
    }

    #[test]
    fn test_sign_extension_threshold() {
        assert!(SIG_COLUMN_TEXT >= SIG_EXTEND_THRESHOLD);
        assert!(SIG_COLUMN_NAME >= SIG_EXTEND_THRESHOLD);
        assert!(SIG_ROW_SIZE < SIG_EXTEND_THRESHOLD);
        assert!(SIG_COLUMN_SIZE < SIG_EXTEND_THRESHOLD);
    }
}
