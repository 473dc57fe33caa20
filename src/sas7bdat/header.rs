//! SAS7BDAT header geometry and the header record itself.
//!
//! [`HeaderInfo`] is the writer's geometry context: bit width, page sizes,
//! pointer sizes, and the computed page count, all derived from the
//! declared file version. [`ParsedHeader`] is the reader-side counterpart
//! recovered from the first kilobyte of a file.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, Local};

use crate::error::{Error, Result};
use crate::sas7bdat::constants::{self as c};
use crate::sas7bdat::timestamp;

/// Writer-side header context.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    /// `true` for the 64-bit layout (declared version >= 90000).
    pub u64_layout: bool,
    /// Header size in bytes; fixed at 1024.
    pub header_size: usize,
    /// Page size in bytes; fixed at 4096.
    pub page_size: usize,
    /// Page header size: 24 (32-bit) or 40 (64-bit).
    pub page_header_size: usize,
    /// Subheader pointer size: 12 (32-bit) or 24 (64-bit).
    pub subheader_pointer_size: usize,
    /// Total pages (meta + data), filled in before emission.
    pub page_count: u64,
    /// Creation timestamp.
    pub created: DateTime<Local>,
    /// Modification timestamp.
    pub modified: DateTime<Local>,
}

impl HeaderInfo {
    /// Derive the geometry for a declared file version.
    #[must_use]
    pub fn new(version: i64, timestamp: DateTime<Local>) -> Self {
        let u64_layout = version >= c::U64_VERSION_THRESHOLD;
        let (page_header_size, subheader_pointer_size) = if u64_layout {
            (c::PAGE_HEADER_SIZE_64, c::SUBHEADER_POINTER_SIZE_64)
        } else {
            (c::PAGE_HEADER_SIZE_32, c::SUBHEADER_POINTER_SIZE_32)
        };
        Self {
            u64_layout,
            header_size: c::HEADER_SIZE,
            page_size: c::PAGE_SIZE,
            page_header_size,
            subheader_pointer_size,
            page_count: 0,
            created: timestamp,
            modified: timestamp,
        }
    }

    /// Subheader signature width: 4 or 8 bytes by bit width.
    #[must_use]
    pub const fn signature_len(&self) -> usize {
        if self.u64_layout { 8 } else { 4 }
    }

    /// Capacity of one column-text pool page.
    ///
    /// Derated below `page_size - page_header_size - pointer_size` by the
    /// COLUMN_TEXT subheader's own framing (signature + 28-byte fixed
    /// header, rounded to 4), so that a full pool page still packs onto a
    /// meta page together with its pointer.
    #[must_use]
    pub const fn text_pool_capacity(&self) -> usize {
        self.page_size
            - self.page_header_size
            - self.subheader_pointer_size
            - self.signature_len()
            - 32
    }

    /// Usable bytes on a page after the page header.
    #[must_use]
    pub const fn page_body_size(&self) -> usize {
        self.page_size - self.page_header_size
    }

    /// Render the 1024-byte header record.
    #[must_use]
    pub fn render(&self, version: i64, file_label: &str) -> Vec<u8> {
        let mut buf = vec![0u8; self.header_size];

        buf[..32].copy_from_slice(&c::MAGIC);
        buf[c::OFF_ALIGN2] = if self.u64_layout {
            c::ALIGNMENT_OFFSET_4
        } else {
            c::ALIGNMENT_OFFSET_0
        };
        buf[c::OFF_ALIGN1] = c::ALIGNMENT_OFFSET_0;
        buf[c::OFF_ENDIAN] = c::ENDIAN_LITTLE;
        buf[c::OFF_FILE_FORMAT] = c::FILE_FORMAT_UNIX;
        buf[c::OFF_ENCODING] = crate::value::ENCODING_UTF8;
        buf[c::OFF_FILE_TYPE..c::OFF_FILE_TYPE + 8].copy_from_slice(c::FILE_TYPE);

        let label = file_label.as_bytes();
        let n = label.len().min(c::FILE_LABEL_LEN);
        buf[c::OFF_FILE_LABEL..c::OFF_FILE_LABEL + n].copy_from_slice(&label[..n]);

        buf[c::OFF_FILE_INFO..c::OFF_FILE_INFO + 8].copy_from_slice(c::FILE_INFO);

        LittleEndian::write_f64(
            &mut buf[c::OFF_CREATED..],
            timestamp::seconds_since_1960(self.created),
        );
        LittleEndian::write_f64(
            &mut buf[c::OFF_MODIFIED..],
            timestamp::seconds_since_1960(self.modified),
        );

        LittleEndian::write_u32(&mut buf[c::OFF_HEADER_SIZE..], self.header_size as u32);
        LittleEndian::write_u32(&mut buf[c::OFF_PAGE_SIZE..], self.page_size as u32);

        let mut pos = c::OFF_PAGE_COUNT;
        if self.u64_layout {
            LittleEndian::write_u64(&mut buf[pos..], self.page_count);
            pos += 8;
        } else {
            LittleEndian::write_u32(&mut buf[pos..], self.page_count as u32);
            pos += 4;
        }
        pos += 8; // reserved

        buf[pos..pos + 8].copy_from_slice(&timestamp::format_release(version));
        pos += 8;
        buf[pos..pos + c::HOST.len()].copy_from_slice(c::HOST);

        buf
    }
}

/// Header fields recovered from an existing file.
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    /// `true` for the 64-bit layout.
    pub u64_layout: bool,
    /// `true` when multi-byte fields are little-endian.
    pub little_endian: bool,
    /// Character-set identifier byte.
    pub encoding: u8,
    /// File label, NUL-trimmed.
    pub file_label: String,
    /// Creation timestamp, SAS epoch seconds.
    pub created: f64,
    /// Modification timestamp, SAS epoch seconds.
    pub modified: f64,
    /// Declared header size.
    pub header_size: u64,
    /// Declared page size.
    pub page_size: usize,
    /// Declared total page count.
    pub page_count: u64,
    /// File version recovered from the release string.
    pub version: i64,
    /// Host platform string.
    pub host: String,
    /// Page header size implied by the bit width.
    pub page_header_size: usize,
    /// Subheader pointer size implied by the bit width.
    pub subheader_pointer_size: usize,
}

impl ParsedHeader {
    /// Signature width implied by the bit width.
    #[must_use]
    pub const fn signature_len(&self) -> usize {
        if self.u64_layout { 8 } else { 4 }
    }

    /// Decode the fixed header prefix. `buf` must hold at least the
    /// minimum header size (1024 bytes).
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] when the magic number or geometry is invalid.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < c::HEADER_SIZE {
            return Err(Error::parse("file too small for a SAS7BDAT header"));
        }
        if buf[..32] != c::MAGIC {
            return Err(Error::parse("not a SAS7BDAT file (bad magic number)"));
        }

        let u64_layout = buf[c::OFF_ALIGN2] == c::ALIGNMENT_OFFSET_4;
        let pad1 = if buf[c::OFF_ALIGN1] == c::ALIGNMENT_OFFSET_4 {
            4
        } else {
            0
        };
        let little_endian = buf[c::OFF_ENDIAN] == c::ENDIAN_LITTLE;
        let encoding = buf[c::OFF_ENCODING];

        let file_label = trim_field(&buf[c::OFF_FILE_LABEL..c::OFF_FILE_LABEL + c::FILE_LABEL_LEN]);

        let created = read_f64(buf, c::OFF_CREATED + pad1, little_endian);
        let modified = read_f64(buf, c::OFF_MODIFIED + pad1, little_endian);
        let header_size = u64::from(read_u32(buf, c::OFF_HEADER_SIZE + pad1, little_endian));
        let page_size = read_u32(buf, c::OFF_PAGE_SIZE + pad1, little_endian) as usize;
        let page_count = if u64_layout {
            read_u64(buf, c::OFF_PAGE_COUNT + pad1, little_endian)
        } else {
            u64::from(read_u32(buf, c::OFF_PAGE_COUNT + pad1, little_endian))
        };

        if header_size < c::HEADER_SIZE as u64 || page_size == 0 || page_size > (1 << 24) {
            return Err(Error::parse("implausible header geometry"));
        }

        // Fields past the page count shift with the count's width.
        let tail_pad = pad1 + if u64_layout { 4 } else { 0 };
        let version = timestamp::parse_release(&buf[c::OFF_RELEASE + tail_pad..c::OFF_RELEASE + tail_pad + 8]);
        let host = trim_field(&buf[c::OFF_HOST + tail_pad..c::OFF_HOST + tail_pad + c::HOST_LEN]);

        let (page_header_size, subheader_pointer_size) = if u64_layout {
            (c::PAGE_HEADER_SIZE_64, c::SUBHEADER_POINTER_SIZE_64)
        } else {
            (c::PAGE_HEADER_SIZE_32, c::SUBHEADER_POINTER_SIZE_32)
        };

        Ok(Self {
            u64_layout,
            little_endian,
            encoding,
            file_label,
            created,
            modified,
            header_size,
            page_size,
            page_count,
            version,
            host,
            page_header_size,
            subheader_pointer_size,
        })
    }
}

fn trim_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

pub(crate) fn read_u16(buf: &[u8], offset: usize, little_endian: bool) -> u16 {
    if little_endian {
        LittleEndian::read_u16(&buf[offset..])
    } else {
        BigEndian::read_u16(&buf[offset..])
    }
}

pub(crate) fn read_u32(buf: &[u8], offset: usize, little_endian: bool) -> u32 {
    if little_endian {
        LittleEndian::read_u32(&buf[offset..])
    } else {
        BigEndian::read_u32(&buf[offset..])
    }
}

pub(crate) fn read_u64(buf: &[u8], offset: usize, little_endian: bool) -> u64 {
    if little_endian {
        LittleEndian::read_u64(&buf[offset..])
    } else {
        BigEndian::read_u64(&buf[offset..])
    }
}

pub(crate) fn read_f64(buf: &[u8], offset: usize, little_endian: bool) -> f64 {
    if little_endian {
        LittleEndian::read_f64(&buf[offset..])
    } else {
        BigEndian::read_f64(&buf[offset..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_by_version() {
        let now = Local::now();
        let h32 = HeaderInfo::new(80101, now);
        assert!(!h32.u64_layout);
        assert_eq!(h32.page_header_size, 24);
        assert_eq!(h32.subheader_pointer_size, 12);
        assert_eq!(h32.signature_len(), 4);
        assert_eq!(h32.text_pool_capacity(), 4096 - 24 - 12 - 4 - 32);

        let h64 = HeaderInfo::new(90101, now);
        assert!(h64.u64_layout);
        assert_eq!(h64.page_header_size, 40);
        assert_eq!(h64.subheader_pointer_size, 24);
        assert_eq!(h64.signature_len(), 8);
        assert_eq!(h64.text_pool_capacity(), 4096 - 40 - 24 - 8 - 32);
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let now = Local::now();
        let mut hinfo = HeaderInfo::new(90101, now);
        hinfo.page_count = 3;

        let buf = hinfo.render(90101, "survey wave 2");
        assert_eq!(buf.len(), 1024);

        let parsed = ParsedHeader::parse(&buf).unwrap();
        assert!(parsed.u64_layout);
        assert!(parsed.little_endian);
        assert_eq!(parsed.encoding, 20);
        assert_eq!(parsed.file_label, "survey wave 2");
        assert_eq!(parsed.header_size, 1024);
        assert_eq!(parsed.page_size, 4096);
        assert_eq!(parsed.page_count, 3);
        assert_eq!(parsed.version, 90101);
        assert_eq!(parsed.host, "W32_VSPRO");
    }

    #[test]
    fn test_render_32bit_page_count_width() {
        let now = Local::now();
        let mut hinfo = HeaderInfo::new(80101, now);
        hinfo.page_count = 7;
        let buf = hinfo.render(80101, "");

        assert_eq!(buf[c::OFF_ALIGN2], c::ALIGNMENT_OFFSET_0);
        let parsed = ParsedHeader::parse(&buf).unwrap();
        assert!(!parsed.u64_layout);
        assert_eq!(parsed.page_count, 7);
        assert_eq!(parsed.version, 80101);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let buf = vec![0u8; 1024];
        assert!(ParsedHeader::parse(&buf).is_err());
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(ParsedHeader::parse(&c::MAGIC).is_err());
    }
}
