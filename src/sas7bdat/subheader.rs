//! Construction of the metadata subheaders carried on meta pages.
//!
//! Each subheader is an opaque byte buffer plus a 32-bit signature. The
//! first 4 (32-bit) or 8 (64-bit) bytes are reserved for the signature,
//! written during page packing; payload fields live at bit-width-specific
//! offsets beyond it.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Result;
use crate::sas7bdat::constants::{self as c};
use crate::sas7bdat::header::HeaderInfo;
use crate::sas7bdat::text_pool::{PoolPage, TextPool, TextRef};
use crate::value::Variable;

/// A subheader awaiting page placement.
#[derive(Debug)]
pub struct Subheader {
    /// 32-bit signature; sign-extended on emission in 64-bit mode when
    /// at or above [`c::SIG_EXTEND_THRESHOLD`].
    pub signature: u32,
    /// Payload buffer, signature area included (and zeroed).
    pub data: Vec<u8>,
}

impl Subheader {
    fn new(signature: u32, len: usize) -> Self {
        Self {
            signature,
            data: vec![0u8; len],
        }
    }

    /// Total length including the signature area.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the payload is empty (never the case for valid subheaders).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn write_text_ref(buf: &mut [u8], text_ref: TextRef) {
    LittleEndian::write_u16(&mut buf[0..], text_ref.index);
    LittleEndian::write_u16(&mut buf[2..], text_ref.offset);
    LittleEndian::write_u16(&mut buf[4..], text_ref.length);
}

/// ROW_SIZE: row length, row count, and page size.
#[must_use]
pub fn row_size(hinfo: &HeaderInfo, row_length: usize, row_count: u64) -> Subheader {
    let mut sh = Subheader::new(c::SIG_ROW_SIZE, if hinfo.u64_layout { 128 } else { 64 });
    if hinfo.u64_layout {
        LittleEndian::write_i64(&mut sh.data[40..], row_length as i64);
        LittleEndian::write_i64(&mut sh.data[48..], row_count as i64);
        LittleEndian::write_i64(&mut sh.data[104..], hinfo.page_size as i64);
    } else {
        LittleEndian::write_i32(&mut sh.data[20..], row_length as i32);
        LittleEndian::write_i32(&mut sh.data[24..], row_count as i32);
        LittleEndian::write_i32(&mut sh.data[52..], hinfo.page_size as i32);
    }
    sh
}

/// COLUMN_SIZE: the variable count.
#[must_use]
pub fn column_size(hinfo: &HeaderInfo, var_count: usize) -> Subheader {
    let mut sh = Subheader::new(c::SIG_COLUMN_SIZE, if hinfo.u64_layout { 24 } else { 12 });
    if hinfo.u64_layout {
        LittleEndian::write_i64(&mut sh.data[8..], var_count as i64);
    } else {
        LittleEndian::write_i32(&mut sh.data[4..], var_count as i32);
    }
    sh
}

/// COLUMN_NAME: one pool reference per variable name.
///
/// Interns every name into the pool, in declaration order.
///
/// # Errors
///
/// Propagates pool overflow for names longer than a pool page.
pub fn column_name(
    hinfo: &HeaderInfo,
    variables: &[Variable],
    pool: &mut TextPool,
) -> Result<Subheader> {
    let signature_len = hinfo.signature_len();
    let len = (4 + 2 * signature_len) + 8 + 8 * variables.len();
    let remainder = (len - (4 + 2 * signature_len)) as u16;

    let mut sh = Subheader::new(c::SIG_COLUMN_NAME, len);
    LittleEndian::write_u16(&mut sh.data[signature_len..], remainder);

    let mut pos = signature_len + 8;
    for variable in variables {
        let text_ref = pool.make_ref(&variable.name)?;
        write_text_ref(&mut sh.data[pos..], text_ref);
        pos += 8;
    }
    Ok(sh)
}

/// COLUMN_ATTRS: per-variable row offset, storage width, name-length flag,
/// and column type. Row offsets accumulate storage widths in declaration
/// order.
#[must_use]
pub fn column_attrs(hinfo: &HeaderInfo, variables: &[Variable]) -> Subheader {
    let signature_len = hinfo.signature_len();
    let entry_size = if hinfo.u64_layout { 16 } else { 12 };
    let len = (4 + 2 * signature_len) + 8 + entry_size * variables.len();
    let remainder = (len - (4 + 2 * signature_len)) as u16;

    let mut sh = Subheader::new(c::SIG_COLUMN_ATTRS, len);
    LittleEndian::write_u16(&mut sh.data[signature_len..], remainder);

    let mut pos = signature_len + 8;
    let mut row_offset: u64 = 0;
    for variable in variables {
        if hinfo.u64_layout {
            LittleEndian::write_u64(&mut sh.data[pos..], row_offset);
            pos += 8;
        } else {
            LittleEndian::write_u32(&mut sh.data[pos..], row_offset as u32);
            pos += 4;
        }

        let name_length_flag: u16 = if variable.name.len() <= 8 { 4 } else { 2048 };
        let (column_type, width) = if variable.is_string() {
            (c::COLUMN_TYPE_CHR, variable.storage_width() as u32)
        } else {
            (c::COLUMN_TYPE_NUM, 8)
        };

        LittleEndian::write_u32(&mut sh.data[pos..], width);
        LittleEndian::write_u16(&mut sh.data[pos + 4..], name_length_flag);
        sh.data[pos + 6] = column_type;
        row_offset += u64::from(width);
        pos += 8;
    }
    sh
}

/// COLUMN_FORMAT: pool references for one variable's display format and
/// label, interned only when present.
///
/// # Errors
///
/// Propagates pool overflow.
pub fn column_format(
    hinfo: &HeaderInfo,
    variable: &Variable,
    pool: &mut TextPool,
) -> Result<Subheader> {
    let (len, format_offset, label_offset) = if hinfo.u64_layout {
        (64, 46, 52)
    } else {
        (52, 34, 40)
    };
    let mut sh = Subheader::new(c::SIG_COLUMN_FORMAT, len);

    if !variable.format.is_empty() {
        let text_ref = pool.make_ref(&variable.format)?;
        write_text_ref(&mut sh.data[format_offset..], text_ref);
    }
    if !variable.label.is_empty() {
        let text_ref = pool.make_ref(&variable.label)?;
        write_text_ref(&mut sh.data[label_offset..], text_ref);
    }
    Ok(sh)
}

/// COLUMN_TEXT: one pool page, prefixed by its 28-byte fixed header.
#[must_use]
pub fn column_text(hinfo: &HeaderInfo, page: &PoolPage) -> Subheader {
    let signature_len = hinfo.signature_len();
    let len = signature_len + c::COLUMN_TEXT_HEADER_LEN + page.used();
    let used = (len - (4 + 2 * signature_len)) as u16;

    let mut sh = Subheader::new(c::SIG_COLUMN_TEXT, len);
    LittleEndian::write_u16(&mut sh.data[signature_len..], used);
    sh.data[signature_len + 12..signature_len + 20].fill(b' ');
    sh.data[signature_len + c::COLUMN_TEXT_HEADER_LEN..].copy_from_slice(page.bytes());
    sh
}
