//! The SAS7BDAT dialect writer.
//!
//! Emits the 1024-byte header, then metadata pages carrying the subheader
//! table, then 4096-byte data pages of fixed-width rows. Page geometry and
//! subheader layout switch between the 32-bit and 64-bit variants on the
//! declared file version.

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::error::{Error, Result};
use crate::sas7bdat::constants::{self as c};
use crate::sas7bdat::header::HeaderInfo;
use crate::sas7bdat::subheader::{self, Subheader};
use crate::sas7bdat::text_pool::TextPool;
use crate::value::{MissingTag, VarType, Variable};
use crate::writer::{Dialect, WriteContext};

/// SAS7BDAT implementation of the writer vtable.
#[derive(Debug, Default)]
pub struct Sas7bdatDialect {
    hinfo: Option<HeaderInfo>,
    row_length: usize,
    rows_per_page: u64,
}

impl Sas7bdatDialect {
    /// Create the dialect; geometry is derived at `begin_data` from the
    /// declared version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn hinfo(&self) -> Result<&HeaderInfo> {
        self.hinfo
            .as_ref()
            .ok_or_else(|| Error::parse("begin_data has not run"))
    }

    /// Pad the output to the next page boundary.
    fn fill_page(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        let hinfo = self.hinfo()?;
        let written = ctx.bytes_written() - hinfo.header_size as u64;
        let remainder = (written % hinfo.page_size as u64) as usize;
        if remainder != 0 {
            ctx.write_zeros(hinfo.page_size - remainder)?;
        }
        Ok(())
    }

    fn build_subheaders(
        &self,
        hinfo: &HeaderInfo,
        ctx: &WriteContext<'_>,
    ) -> Result<Vec<Subheader>> {
        let mut pool = TextPool::new(hinfo.text_pool_capacity());
        let mut subheaders = Vec::with_capacity(4 + ctx.variables.len());

        subheaders.push(subheader::row_size(hinfo, self.row_length, ctx.row_count));
        subheaders.push(subheader::column_size(hinfo, ctx.variables.len()));
        subheaders.push(subheader::column_name(hinfo, ctx.variables, &mut pool)?);
        subheaders.push(subheader::column_attrs(hinfo, ctx.variables));
        for variable in ctx.variables {
            subheaders.push(subheader::column_format(hinfo, variable, &mut pool)?);
        }
        for page in pool.pages() {
            subheaders.push(subheader::column_text(hinfo, page));
        }
        Ok(subheaders)
    }

    /// Count the meta pages the packer will emit, by simulating its
    /// placement rule.
    fn count_meta_pages(hinfo: &HeaderInfo, subheaders: &[Subheader]) -> Result<u64> {
        let ptr_size = hinfo.subheader_pointer_size;
        let mut pages: u64 = 1;
        let mut data_offset = hinfo.page_size;
        let mut ptr_offset = hinfo.page_header_size;
        for sh in subheaders {
            if sh.len() + ptr_size >= data_offset - ptr_offset {
                if sh.len() + ptr_size >= hinfo.page_body_size() {
                    return Err(Error::parse("metadata subheader exceeds page capacity"));
                }
                pages += 1;
                data_offset = hinfo.page_size;
                ptr_offset = hinfo.page_header_size;
            }
            data_offset -= sh.len();
            ptr_offset += ptr_size;
        }
        Ok(pages)
    }

    fn emit_meta_pages(
        &self,
        ctx: &mut WriteContext<'_>,
        subheaders: &mut [Subheader],
    ) -> Result<()> {
        let hinfo = self.hinfo()?;
        let ptr_size = hinfo.subheader_pointer_size;
        let mut page = vec![0u8; hinfo.page_size];
        let mut written = 0;

        while written < subheaders.len() {
            page.fill(0);
            LittleEndian::write_u16(&mut page[hinfo.page_header_size - 8..], c::PAGE_TYPE_META);

            let mut count: u16 = 0;
            let mut data_offset = hinfo.page_size;
            let mut ptr_offset = hinfo.page_header_size;

            while written < subheaders.len() {
                let sh = &mut subheaders[written];
                if sh.len() + ptr_size >= data_offset - ptr_offset {
                    break;
                }

                // Stamp the signature into the subheader's reserved area;
                // high signatures sign-extend to 64 bits in 64-bit mode.
                if hinfo.u64_layout {
                    if sh.signature >= c::SIG_EXTEND_THRESHOLD {
                        LittleEndian::write_i64(&mut sh.data[0..], i64::from(sh.signature as i32));
                    } else {
                        LittleEndian::write_u32(&mut sh.data[0..], sh.signature);
                    }
                } else {
                    LittleEndian::write_u32(&mut sh.data[0..], sh.signature);
                }

                data_offset -= sh.len();
                let type_a = u8::from(c::is_type_a_signature(sh.signature));
                if hinfo.u64_layout {
                    LittleEndian::write_u64(&mut page[ptr_offset..], data_offset as u64);
                    LittleEndian::write_u64(&mut page[ptr_offset + 8..], sh.len() as u64);
                    page[ptr_offset + 17] = type_a;
                } else {
                    LittleEndian::write_u32(&mut page[ptr_offset..], data_offset as u32);
                    LittleEndian::write_u32(&mut page[ptr_offset + 4..], sh.len() as u32);
                    page[ptr_offset + 9] = type_a;
                }

                page[data_offset..data_offset + sh.len()].copy_from_slice(&sh.data);
                ptr_offset += ptr_size;
                written += 1;
                count += 1;
            }

            if count == 0 {
                return Err(Error::parse("metadata subheader exceeds page capacity"));
            }

            // The subheader count is stored twice.
            let count_offset = if hinfo.u64_layout { 34 } else { 18 };
            LittleEndian::write_u16(&mut page[count_offset..], count);
            LittleEndian::write_u16(&mut page[count_offset + 2..], count);

            ctx.write_bytes(&page)?;
        }
        Ok(())
    }
}

impl Dialect for Sas7bdatDialect {
    fn default_version(&self) -> i64 {
        c::DEFAULT_FILE_VERSION
    }

    fn variable_width(&self, var_type: VarType, user_width: usize) -> usize {
        match var_type {
            VarType::Str | VarType::LongStr => user_width,
            VarType::Numeric => 8,
        }
    }

    fn begin_data(&mut self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if ctx.version <= 0 {
            return Err(Error::UnsupportedFormatVersion { version: ctx.version });
        }

        let mut hinfo = HeaderInfo::new(ctx.version, ctx.timestamp);
        self.row_length = ctx
            .variables
            .iter()
            .map(|v| self.variable_width(v.var_type, v.user_width))
            .sum();
        self.rows_per_page = if self.row_length == 0 {
            0
        } else {
            (hinfo.page_body_size() / self.row_length) as u64
        };

        let mut subheaders = self.build_subheaders(&hinfo, ctx)?;

        let meta_pages = Self::count_meta_pages(&hinfo, &subheaders)?;
        let data_pages = if ctx.row_count == 0 || self.rows_per_page == 0 {
            0
        } else {
            ctx.row_count.div_ceil(self.rows_per_page)
        };
        hinfo.page_count = meta_pages + data_pages;

        debug!(
            "sas7bdat begin_data: {} meta + {} data pages, row length {}",
            meta_pages, data_pages, self.row_length
        );

        let header = hinfo.render(ctx.version, ctx.file_label);
        self.hinfo = Some(hinfo);

        ctx.write_bytes(&header)?;
        self.emit_meta_pages(ctx, &mut subheaders)
    }

    fn write_row(&mut self, ctx: &mut WriteContext<'_>, row: &[u8]) -> Result<()> {
        if self.rows_per_page == 0 {
            return Err(Error::RowCountMismatch {
                expected: ctx.row_count,
                actual: ctx.current_row + 1,
            });
        }

        if ctx.current_row % self.rows_per_page == 0 {
            self.fill_page(ctx)?;

            let hinfo = self.hinfo()?;
            let remaining = ctx.row_count - ctx.current_row;
            let page_row_count = remaining.min(self.rows_per_page) as u16;

            let mut header = vec![0u8; hinfo.page_header_size];
            LittleEndian::write_u16(&mut header[hinfo.page_header_size - 8..], c::PAGE_TYPE_DATA);
            LittleEndian::write_u16(&mut header[hinfo.page_header_size - 6..], page_row_count);
            ctx.write_bytes(&header)?;
        }

        ctx.write_bytes(row)
    }

    fn end_data(&mut self, ctx: &mut WriteContext<'_>) -> Result<()> {
        self.fill_page(ctx)
    }

    fn write_double(&self, cell: &mut [u8], _variable: &Variable, value: f64) -> Result<()> {
        LittleEndian::write_f64(cell, value);
        Ok(())
    }

    fn write_string(&self, cell: &mut [u8], _variable: &Variable, value: &str) -> Result<()> {
        cell.fill(0);
        let bytes = value.as_bytes();
        let n = bytes.len().min(cell.len());
        cell[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }

    fn write_missing_string(&self, cell: &mut [u8], _variable: &Variable) -> Result<()> {
        cell.fill(0);
        Ok(())
    }

    fn write_missing_number(&self, cell: &mut [u8], _variable: &Variable) -> Result<()> {
        LittleEndian::write_f64(cell, MissingTag::System.to_double());
        Ok(())
    }

    fn write_missing_tagged(&self, cell: &mut [u8], _variable: &Variable, tag: u8) -> Result<()> {
        let tag = MissingTag::tagged(tag)?;
        LittleEndian::write_f64(cell, tag.to_double());
        Ok(())
    }
}
