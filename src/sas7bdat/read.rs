//! The SAS7BDAT dialect parser.
//!
//! Walks the page chain of an uncompressed file: metadata pages feed the
//! subheader decoder, data pages feed row extraction. Events reach the
//! [`Handler`] in the fixed order `info`, `metadata`, `variable`*,
//! `value`*; the byte source's `update` hook is polled once per page so a
//! progress callback can cancel within one page's worth of work.

use std::io::SeekFrom;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::io::{ByteSource, ProgressFn};
use crate::parser::{Handler, check_flow};
use crate::sas7bdat::constants::{self as c};
use crate::sas7bdat::header::{ParsedHeader, read_f64, read_u16, read_u32, read_u64};
use crate::sas7bdat::timestamp;
use crate::value::{FileMetadata, MissingTag, Value, VarType, Variable};

/// Column facts accumulated while decoding metadata subheaders.
#[derive(Debug, Default)]
struct MetaState {
    row_length: u64,
    row_count: u64,
    column_count: u64,
    text_blocks: Vec<Vec<u8>>,
    name_entries: Vec<TextRefEntry>,
    attr_entries: Vec<AttrEntry>,
    format_entries: Vec<FormatEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
struct TextRefEntry {
    index: u16,
    offset: u16,
    length: u16,
}

#[derive(Debug, Clone, Copy)]
struct AttrEntry {
    row_offset: u64,
    width: u32,
    column_type: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct FormatEntry {
    format: TextRefEntry,
    label: TextRefEntry,
}

/// Parse a SAS7BDAT stream, emitting events to `handler`.
///
/// # Errors
///
/// [`Error::Parse`] for malformed bytes and for page features outside the
/// uncompressed META/DATA layout, [`Error::UserAbort`] when a handler or
/// the progress callback cancels, [`Error::RowCountMismatch`] when the
/// page chain disagrees with the declared row count.
pub fn parse(
    source: &mut dyn ByteSource,
    path: &Path,
    progress: Option<&mut ProgressFn<'_>>,
    handler: &mut dyn Handler,
) -> Result<()> {
    source.open(path)?;
    let result = parse_open(source, path, progress, handler);
    let close_result = source.close();
    if let Err(err) = &result {
        if !err.is_abort() {
            handler.error(&err.to_string());
        }
    }
    result?;
    close_result
}

fn parse_open(
    source: &mut dyn ByteSource,
    path: &Path,
    mut progress: Option<&mut ProgressFn<'_>>,
    handler: &mut dyn Handler,
) -> Result<()> {
    let total_size = source.total_size()?;

    let mut header_buf = vec![0u8; c::HEADER_SIZE];
    source.seek(SeekFrom::Start(0))?;
    source.read_exact_buf(&mut header_buf)?;
    let header = ParsedHeader::parse(&header_buf)?;
    debug!(
        "sas7bdat header: {}-bit, {} pages of {} bytes",
        if header.u64_layout { 64 } else { 32 },
        header.page_count,
        header.page_size
    );

    source.update(total_size, progress.as_deref_mut())?;

    if header.header_size > c::HEADER_SIZE as u64 {
        source.seek(SeekFrom::Start(header.header_size))?;
    }

    let mut meta = MetaState::default();
    let mut variables: Option<Vec<Variable>> = None;
    let mut obs_index: usize = 0;

    let mut page = vec![0u8; header.page_size];
    for _ in 0..header.page_count {
        source.read_exact_buf(&mut page)?;
        source.update(total_size, progress.as_deref_mut())?;

        let page_bit_offset = header.page_header_size - 8;
        let page_type = read_u16(&page, page_bit_offset, header.little_endian);

        match page_type {
            c::PAGE_TYPE_META => {
                collect_subheaders(&page, &header, &mut meta)?;
            }
            c::PAGE_TYPE_DATA => {
                if variables.is_none() {
                    variables = Some(finish_metadata(&header, &meta, handler)?);
                }
                let Some(vars) = variables.as_ref() else {
                    return Err(Error::parse("metadata pages are missing"));
                };
                let page_rows =
                    read_u16(&page, page_bit_offset + 2, header.little_endian) as usize;
                emit_rows(&page, &header, &meta, vars, page_rows, &mut obs_index, handler)?;
            }
            other => {
                return Err(Error::parse(format!(
                    "unsupported page type {other:#06x} in {}",
                    path.display()
                )));
            }
        }
    }

    // Files with no data pages still announce their schema.
    if variables.is_none() {
        finish_metadata(&header, &meta, handler)?;
    }

    if obs_index as u64 != meta.row_count {
        return Err(Error::RowCountMismatch {
            expected: meta.row_count,
            actual: obs_index as u64,
        });
    }
    Ok(())
}

fn collect_subheaders(page: &[u8], header: &ParsedHeader, meta: &mut MetaState) -> Result<()> {
    let page_bit_offset = header.page_header_size - 8;
    let count = read_u16(page, page_bit_offset + 4, header.little_endian) as usize;
    let ptr_size = header.subheader_pointer_size;

    for i in 0..count {
        let ptr = header.page_header_size + i * ptr_size;
        if ptr + ptr_size > page.len() {
            return Err(Error::parse("subheader pointer table exceeds page bounds"));
        }

        let (offset, length, compression) = if header.u64_layout {
            (
                read_u64(page, ptr, header.little_endian) as usize,
                read_u64(page, ptr + 8, header.little_endian) as usize,
                page[ptr + 16],
            )
        } else {
            (
                read_u32(page, ptr, header.little_endian) as usize,
                read_u32(page, ptr + 4, header.little_endian) as usize,
                page[ptr + 8],
            )
        };

        if length == 0 {
            continue;
        }
        if compression != 0 {
            return Err(Error::parse("compressed subheaders are not supported"));
        }
        if offset + length > page.len() {
            return Err(Error::parse("subheader exceeds page bounds"));
        }

        decode_subheader(&page[offset..offset + length], header, meta)?;
    }
    Ok(())
}

fn decode_subheader(data: &[u8], header: &ParsedHeader, meta: &mut MetaState) -> Result<()> {
    if data.len() < 4 {
        return Ok(());
    }
    let mut signature = read_u32(data, 0, header.little_endian);
    // 64-bit big-endian sign extension puts 0xFFFFFFFF first; the
    // distinguishing word follows.
    if header.u64_layout
        && !header.little_endian
        && signature == 0xFFFF_FFFF
        && data.len() >= 8
    {
        signature = read_u32(data, 4, header.little_endian);
    }

    let signature_len = header.signature_len();
    let entries_start = signature_len + 8;

    match signature {
        c::SIG_ROW_SIZE => {
            if header.u64_layout {
                meta.row_length = read_u64(data, 40, header.little_endian);
                meta.row_count = read_u64(data, 48, header.little_endian);
            } else {
                meta.row_length = u64::from(read_u32(data, 20, header.little_endian));
                meta.row_count = u64::from(read_u32(data, 24, header.little_endian));
            }
        }
        c::SIG_COLUMN_SIZE => {
            meta.column_count = if header.u64_layout {
                read_u64(data, 8, header.little_endian)
            } else {
                u64::from(read_u32(data, 4, header.little_endian))
            };
        }
        c::SIG_COLUMN_TEXT => {
            meta.text_blocks.push(data[signature_len..].to_vec());
        }
        c::SIG_COLUMN_NAME => {
            let entries = data[entries_start.min(data.len())..].chunks_exact(8);
            for entry in entries {
                meta.name_entries.push(TextRefEntry {
                    index: read_u16(entry, 0, header.little_endian),
                    offset: read_u16(entry, 2, header.little_endian),
                    length: read_u16(entry, 4, header.little_endian),
                });
            }
        }
        c::SIG_COLUMN_ATTRS => {
            let entry_size = if header.u64_layout { 16 } else { 12 };
            let entries = data[entries_start.min(data.len())..].chunks_exact(entry_size);
            for entry in entries {
                let (row_offset, width, column_type) = if header.u64_layout {
                    (
                        read_u64(entry, 0, header.little_endian),
                        read_u32(entry, 8, header.little_endian),
                        entry[14],
                    )
                } else {
                    (
                        u64::from(read_u32(entry, 0, header.little_endian)),
                        read_u32(entry, 4, header.little_endian),
                        entry[10],
                    )
                };
                meta.attr_entries.push(AttrEntry {
                    row_offset,
                    width,
                    column_type,
                });
            }
        }
        c::SIG_COLUMN_FORMAT => {
            let (format_offset, label_offset) = if header.u64_layout { (46, 52) } else { (34, 40) };
            if data.len() < label_offset + 6 {
                return Err(Error::parse("column-format subheader too short"));
            }
            meta.format_entries.push(FormatEntry {
                format: TextRefEntry {
                    index: read_u16(data, format_offset, header.little_endian),
                    offset: read_u16(data, format_offset + 2, header.little_endian),
                    length: read_u16(data, format_offset + 4, header.little_endian),
                },
                label: TextRefEntry {
                    index: read_u16(data, label_offset, header.little_endian),
                    offset: read_u16(data, label_offset + 2, header.little_endian),
                    length: read_u16(data, label_offset + 4, header.little_endian),
                },
            });
        }
        _ => {} // COUNTS, COLUMN_LIST, and vendor extensions are skipped.
    }
    Ok(())
}

fn resolve_text(meta: &MetaState, entry: TextRefEntry) -> Result<String> {
    if entry.length == 0 {
        return Ok(String::new());
    }
    let block = meta
        .text_blocks
        .get(entry.index as usize)
        .ok_or_else(|| Error::parse("text reference to a missing column-text block"))?;
    let start = entry.offset as usize;
    let end = start + entry.length as usize;
    if end > block.len() {
        return Err(Error::parse("text reference out of block bounds"));
    }
    let text = std::str::from_utf8(&block[start..end]).map_err(|_| Error::Encoding)?;
    Ok(text.to_string())
}

fn finish_metadata(
    header: &ParsedHeader,
    meta: &MetaState,
    handler: &mut dyn Handler,
) -> Result<Vec<Variable>> {
    let var_count = meta.column_count as usize;
    if meta.attr_entries.len() < var_count || meta.name_entries.len() < var_count {
        return Err(Error::parse("column metadata is incomplete"));
    }

    let mut variables = Vec::with_capacity(var_count);
    for i in 0..var_count {
        let name = resolve_text(meta, meta.name_entries[i])?;
        let attrs = meta.attr_entries[i];
        let format_entry = meta.format_entries.get(i).copied().unwrap_or_default();

        let var_type = if attrs.column_type == c::COLUMN_TYPE_NUM {
            VarType::Numeric
        } else {
            VarType::Str
        };
        let variable = Variable::new(i, name, var_type, attrs.width as usize)
            .with_label(resolve_text(meta, format_entry.label)?)
            .with_format(resolve_text(meta, format_entry.format)?);
        variables.push(variable);
    }

    check_flow!(handler.info(meta.row_count as i64, var_count as i64));

    let file_meta = FileMetadata {
        file_label: header.file_label.clone(),
        created: timestamp::datetime_from_seconds(header.created),
        modified: timestamp::datetime_from_seconds(header.modified),
        format_version: header.version,
        encoding: header.encoding,
        little_endian: header.little_endian,
        host: header.host.clone(),
        row_count: meta.row_count as i64,
        var_count: var_count as i64,
        // SAS datasets keep weights and label sets in the catalog.
        fweight_index: None,
    };
    check_flow!(handler.metadata(&file_meta));

    for variable in &variables {
        check_flow!(handler.variable(variable.index, variable, None));
    }
    Ok(variables)
}

fn emit_rows(
    page: &[u8],
    header: &ParsedHeader,
    meta: &MetaState,
    variables: &[Variable],
    page_rows: usize,
    obs_index: &mut usize,
    handler: &mut dyn Handler,
) -> Result<()> {
    let row_length = meta.row_length as usize;
    let mut row_start = header.page_header_size;

    for _ in 0..page_rows {
        if row_start + row_length > page.len() {
            return Err(Error::parse("row data exceeds page bounds"));
        }
        let row = &page[row_start..row_start + row_length];

        for (variable, attrs) in variables.iter().zip(&meta.attr_entries) {
            let start = attrs.row_offset as usize;
            let end = start + attrs.width as usize;
            if end > row.len() {
                return Err(Error::parse("cell exceeds row bounds"));
            }
            let cell = &row[start..end];

            if variable.is_string() {
                let trimmed = trim_cell(cell);
                let text = std::str::from_utf8(trimmed).map_err(|_| Error::Encoding)?;
                check_flow!(handler.value(*obs_index, variable.index, &Value::Str(text)));
            } else {
                let number = read_f64(cell, 0, header.little_endian);
                let value = match MissingTag::from_double(number) {
                    Some(tag) => Value::Missing(tag),
                    None => Value::Double(number),
                };
                check_flow!(handler.value(*obs_index, variable.index, &value));
            }
        }

        *obs_index += 1;
        row_start += row_length;
    }
    Ok(())
}

fn trim_cell(cell: &[u8]) -> &[u8] {
    let mut end = cell.len();
    while end > 0 && (cell[end - 1] == 0 || cell[end - 1] == b' ') {
        end -= 1;
    }
    &cell[..end]
}
