//! The writer skeleton.
//!
//! [`Writer`] accumulates a schema and streams rows to an output sink
//! through a pluggable [`Dialect`]: the per-format vtable providing cell
//! encoders, storage widths, and the begin/row/end page machinery. The
//! skeleton owns everything format-independent — schema order, the row
//! buffer, byte accounting, and the lifecycle state machine
//! `init -> schema -> data -> finished`.

use std::io::Write;

use chrono::{DateTime, Local};
use log::debug;

use crate::error::{Error, Result};
use crate::value::{Value, VarType, Variable};

/// Format-independent services a dialect writes through.
pub struct WriteContext<'a> {
    out: &'a mut dyn Write,
    bytes_written: &'a mut u64,
    /// The declared schema, in order.
    pub variables: &'a [Variable],
    /// Declared number of rows.
    pub row_count: u64,
    /// Rows emitted so far.
    pub current_row: u64,
    /// Declared file version.
    pub version: i64,
    /// File timestamp (creation and modification).
    pub timestamp: DateTime<Local>,
    /// File label.
    pub file_label: &'a str,
}

impl WriteContext<'_> {
    /// Append raw bytes to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the sink fails.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        *self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Append `n` zero bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the sink fails.
    pub fn write_zeros(&mut self, n: usize) -> Result<()> {
        const ZEROS: [u8; 256] = [0u8; 256];
        let mut left = n;
        while left > 0 {
            let chunk = left.min(ZEROS.len());
            self.write_bytes(&ZEROS[..chunk])?;
            left -= chunk;
        }
        Ok(())
    }

    /// Total bytes emitted so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        *self.bytes_written
    }
}

/// The per-dialect vtable installed by [`Writer::begin_writing`].
///
/// Cell encoders receive a slice of exactly
/// [`Dialect::variable_width`] bytes within the row buffer. The narrow
/// numeric encoders default to widening through [`Dialect::write_double`],
/// which is the behavior every dialect in this crate wants.
#[allow(unused_variables)]
pub trait Dialect {
    /// Version stamped on files when the caller declares none.
    fn default_version(&self) -> i64;

    /// On-disk width of a cell of `var_type` with declared `user_width`.
    fn variable_width(&self, var_type: VarType, user_width: usize) -> usize;

    /// Emit everything that precedes row data (header, metadata pages).
    ///
    /// # Errors
    ///
    /// Dialect-specific; I/O errors propagate.
    fn begin_data(&mut self, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Emit one assembled row.
    ///
    /// # Errors
    ///
    /// Dialect-specific; I/O errors propagate.
    fn write_row(&mut self, ctx: &mut WriteContext<'_>, row: &[u8]) -> Result<()>;

    /// Flush trailing structure (page padding, footers).
    ///
    /// # Errors
    ///
    /// Dialect-specific; I/O errors propagate.
    fn end_data(&mut self, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Encode a double into a cell.
    ///
    /// # Errors
    ///
    /// Dialect-specific encoding failures.
    fn write_double(&self, cell: &mut [u8], variable: &Variable, value: f64) -> Result<()>;

    /// Encode a float; defaults to widening.
    ///
    /// # Errors
    ///
    /// See [`Dialect::write_double`].
    fn write_float(&self, cell: &mut [u8], variable: &Variable, value: f32) -> Result<()> {
        self.write_double(cell, variable, f64::from(value))
    }

    /// Encode an 8-bit integer; defaults to widening.
    ///
    /// # Errors
    ///
    /// See [`Dialect::write_double`].
    fn write_int8(&self, cell: &mut [u8], variable: &Variable, value: i8) -> Result<()> {
        self.write_double(cell, variable, f64::from(value))
    }

    /// Encode a 16-bit integer; defaults to widening.
    ///
    /// # Errors
    ///
    /// See [`Dialect::write_double`].
    fn write_int16(&self, cell: &mut [u8], variable: &Variable, value: i16) -> Result<()> {
        self.write_double(cell, variable, f64::from(value))
    }

    /// Encode a 32-bit integer; defaults to widening.
    ///
    /// # Errors
    ///
    /// See [`Dialect::write_double`].
    fn write_int32(&self, cell: &mut [u8], variable: &Variable, value: i32) -> Result<()> {
        self.write_double(cell, variable, f64::from(value))
    }

    /// Encode a string cell.
    ///
    /// # Errors
    ///
    /// Dialect-specific encoding failures.
    fn write_string(&self, cell: &mut [u8], variable: &Variable, value: &str) -> Result<()>;

    /// Encode an absent string cell.
    ///
    /// # Errors
    ///
    /// See [`Dialect::write_string`].
    fn write_missing_string(&self, cell: &mut [u8], variable: &Variable) -> Result<()>;

    /// Encode a system-missing numeric cell.
    ///
    /// # Errors
    ///
    /// Dialect-specific encoding failures.
    fn write_missing_number(&self, cell: &mut [u8], variable: &Variable) -> Result<()>;

    /// Encode a tagged-missing numeric cell.
    ///
    /// # Errors
    ///
    /// [`Error::ValueOutOfRange`] for tags the dialect cannot represent.
    fn write_missing_tagged(&self, cell: &mut [u8], variable: &Variable, tag: u8) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Schema,
    Data,
    Finished,
    Failed,
}

/// Streaming writer over any `Write` sink.
pub struct Writer<W: Write> {
    sink: W,
    bytes_written: u64,
    variables: Vec<Variable>,
    row_count: u64,
    current_row: u64,
    version: i64,
    timestamp: DateTime<Local>,
    file_label: String,
    dialect: Option<Box<dyn Dialect>>,
    state: State,
    row_buf: Vec<u8>,
    cell_spans: Vec<(usize, usize)>,
}

impl<W: Write> Writer<W> {
    /// Create a writer over `sink` with an unset version, the current
    /// time, and an empty file label.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            bytes_written: 0,
            variables: Vec::new(),
            row_count: 0,
            current_row: 0,
            version: 0,
            timestamp: Local::now(),
            file_label: String::new(),
            dialect: None,
            state: State::Init,
            row_buf: Vec::new(),
            cell_spans: Vec::new(),
        }
    }

    /// Declare the file version the dialect should stamp.
    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Set the file timestamp (creation and modification).
    pub fn set_timestamp(&mut self, timestamp: DateTime<Local>) {
        self.timestamp = timestamp;
    }

    /// Set the file label.
    pub fn set_file_label(&mut self, label: impl Into<String>) {
        self.file_label = label.into();
    }

    /// Install the dialect and declare the row count; moves to the
    /// schema-building state.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] when called twice.
    pub fn begin_writing(&mut self, dialect: Box<dyn Dialect>, row_count: u64) -> Result<()> {
        if self.state != State::Init {
            return Err(Error::parse("writer is already initialized"));
        }
        if self.version == 0 {
            self.version = dialect.default_version();
        }
        self.row_count = row_count;
        self.dialect = Some(dialect);
        self.state = State::Schema;
        Ok(())
    }

    /// Append a variable to the schema, returning it for label/format
    /// attachment.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] outside the schema state.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        var_type: VarType,
        user_width: usize,
    ) -> Result<&mut Variable> {
        if self.state != State::Schema {
            return Err(Error::parse("variables must be added before begin_data"));
        }
        let index = self.variables.len();
        self.variables.push(Variable::new(index, name, var_type, user_width));
        Ok(&mut self.variables[index])
    }

    /// Number of variables declared so far.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// The stable on-disk row width: the sum of dialect widths across the
    /// schema.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] before `begin_writing`.
    pub fn row_length(&self) -> Result<usize> {
        let dialect = self
            .dialect
            .as_ref()
            .ok_or_else(|| Error::parse("writer is not initialized"))?;
        Ok(self
            .variables
            .iter()
            .map(|v| dialect.variable_width(v.var_type, v.user_width))
            .sum())
    }

    /// Close the schema and emit all pre-row structure.
    ///
    /// # Errors
    ///
    /// Propagates dialect and I/O failures; the writer then refuses
    /// further use.
    pub fn begin_data(&mut self) -> Result<()> {
        if self.state != State::Schema {
            return Err(Error::parse("begin_data must follow begin_writing"));
        }

        let row_len = self.row_length()?;
        if self.row_count > 0 && row_len == 0 {
            self.state = State::Failed;
            return Err(Error::RowCountMismatch {
                expected: self.row_count,
                actual: 0,
            });
        }

        self.cell_spans.clear();
        let mut offset = 0;
        if let Some(dialect) = self.dialect.as_ref() {
            for v in &self.variables {
                let width = dialect.variable_width(v.var_type, v.user_width);
                self.cell_spans.push((offset, width));
                offset += width;
            }
        }
        self.row_buf = vec![0u8; row_len];

        debug!(
            "begin_data: {} variables, {} rows, row length {}",
            self.variables.len(),
            self.row_count,
            row_len
        );

        self.dispatch(|dialect, ctx| dialect.begin_data(ctx))?;
        self.state = State::Data;
        Ok(())
    }

    /// Encode one cell of the current row.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] outside the data state or for an unknown variable;
    /// [`Error::ValueOutOfRange`] for a bad missing tag; encoding errors
    /// from the dialect.
    pub fn insert_value(&mut self, var_index: usize, value: &Value<'_>) -> Result<()> {
        if self.state != State::Data {
            return Err(Error::parse("insert_value must follow begin_data"));
        }
        let variable = self
            .variables
            .get(var_index)
            .ok_or_else(|| Error::parse(format!("no variable at index {var_index}")))?;
        let (offset, width) = self.cell_spans[var_index];
        let cell = &mut self.row_buf[offset..offset + width];
        let dialect = self
            .dialect
            .as_ref()
            .ok_or_else(|| Error::parse("writer is not initialized"))?;
        match *value {
            Value::Int8(v) => dialect.write_int8(cell, variable, v),
            Value::Int16(v) => dialect.write_int16(cell, variable, v),
            Value::Int32(v) => dialect.write_int32(cell, variable, v),
            Value::Float(v) => dialect.write_float(cell, variable, v),
            Value::Double(v) => dialect.write_double(cell, variable, v),
            Value::Str(s) => {
                if s.is_empty() {
                    dialect.write_missing_string(cell, variable)
                } else {
                    dialect.write_string(cell, variable, s)
                }
            }
            Value::Missing(tag) => {
                if variable.is_string() {
                    dialect.write_missing_string(cell, variable)
                } else {
                    match tag.letter() {
                        None => dialect.write_missing_number(cell, variable),
                        Some(letter) => {
                            dialect.write_missing_tagged(cell, variable, letter as u8)
                        }
                    }
                }
            }
        }
    }

    /// Emit the assembled row and reset the row buffer.
    ///
    /// # Errors
    ///
    /// [`Error::RowCountMismatch`] past the declared count; I/O and
    /// dialect failures otherwise.
    pub fn finish_row(&mut self) -> Result<()> {
        if self.state != State::Data {
            return Err(Error::parse("finish_row must follow begin_data"));
        }
        if self.current_row >= self.row_count {
            self.state = State::Failed;
            return Err(Error::RowCountMismatch {
                expected: self.row_count,
                actual: self.current_row + 1,
            });
        }
        let row = std::mem::take(&mut self.row_buf);
        let result = self.dispatch(|dialect, ctx| dialect.write_row(ctx, &row));
        self.row_buf = row;
        result?;
        self.row_buf.fill(0);
        self.current_row += 1;
        Ok(())
    }

    /// Flush trailing structure and return the sink.
    ///
    /// # Errors
    ///
    /// [`Error::RowCountMismatch`] when fewer rows arrived than declared;
    /// I/O and dialect failures otherwise.
    pub fn end_writing(mut self) -> Result<W> {
        if self.state != State::Data {
            return Err(Error::parse("end_writing must follow begin_data"));
        }
        if self.current_row != self.row_count {
            return Err(Error::RowCountMismatch {
                expected: self.row_count,
                actual: self.current_row,
            });
        }
        self.dispatch(|dialect, ctx| dialect.end_data(ctx))?;
        self.sink.flush()?;
        self.state = State::Finished;
        Ok(self.sink)
    }

    /// Total bytes emitted so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn dispatch(
        &mut self,
        f: impl FnOnce(&mut dyn Dialect, &mut WriteContext<'_>) -> Result<()>,
    ) -> Result<()> {
        let mut dialect = self
            .dialect
            .take()
            .ok_or_else(|| Error::parse("writer is not initialized"))?;
        let mut ctx = WriteContext {
            out: &mut self.sink,
            bytes_written: &mut self.bytes_written,
            variables: &self.variables,
            row_count: self.row_count,
            current_row: self.current_row,
            version: self.version,
            timestamp: self.timestamp,
            file_label: &self.file_label,
        };
        let result = f(dialect.as_mut(), &mut ctx);
        self.dialect = Some(dialect);
        if result.is_err() {
            self.state = State::Failed;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A trivial dialect that writes fixed-width cells with no framing.
    struct FlatDialect;

    impl Dialect for FlatDialect {
        fn default_version(&self) -> i64 {
            1
        }

        fn variable_width(&self, var_type: VarType, user_width: usize) -> usize {
            match var_type {
                VarType::Str | VarType::LongStr => user_width,
                VarType::Numeric => 8,
            }
        }

        fn begin_data(&mut self, ctx: &mut WriteContext<'_>) -> Result<()> {
            ctx.write_bytes(b"HDR!")
        }

        fn write_row(&mut self, ctx: &mut WriteContext<'_>, row: &[u8]) -> Result<()> {
            ctx.write_bytes(row)
        }

        fn end_data(&mut self, ctx: &mut WriteContext<'_>) -> Result<()> {
            ctx.write_bytes(b"EOF!")
        }

        fn write_double(&self, cell: &mut [u8], _v: &Variable, value: f64) -> Result<()> {
            cell.copy_from_slice(&value.to_le_bytes());
            Ok(())
        }

        fn write_string(&self, cell: &mut [u8], _v: &Variable, value: &str) -> Result<()> {
            let n = value.len().min(cell.len());
            cell[..n].copy_from_slice(&value.as_bytes()[..n]);
            Ok(())
        }

        fn write_missing_string(&self, cell: &mut [u8], _v: &Variable) -> Result<()> {
            cell.fill(0);
            Ok(())
        }

        fn write_missing_number(&self, cell: &mut [u8], _v: &Variable) -> Result<()> {
            cell.fill(0xFF);
            Ok(())
        }

        fn write_missing_tagged(&self, cell: &mut [u8], _v: &Variable, tag: u8) -> Result<()> {
            cell.fill(tag);
            Ok(())
        }
    }

    #[test]
    fn test_row_width_is_sum_of_widths() {
        let mut w = Writer::new(Vec::new());
        w.begin_writing(Box::new(FlatDialect), 0).unwrap();
        w.add_variable("s", VarType::Str, 5).unwrap();
        w.add_variable("n", VarType::Numeric, 4).unwrap();
        assert_eq!(w.row_length().unwrap(), 13);
    }

    #[test]
    fn test_lifecycle_and_bytes() {
        let mut w = Writer::new(Vec::new());
        w.begin_writing(Box::new(FlatDialect), 2).unwrap();
        w.add_variable("x", VarType::Numeric, 8).unwrap();
        w.begin_data().unwrap();

        w.insert_value(0, &Value::Double(1.0)).unwrap();
        w.finish_row().unwrap();
        w.insert_value(0, &Value::Int16(2)).unwrap();
        w.finish_row().unwrap();

        let out = w.end_writing().unwrap();
        assert_eq!(&out[..4], b"HDR!");
        assert_eq!(&out[4..12], &1.0f64.to_le_bytes());
        assert_eq!(&out[12..20], &2.0f64.to_le_bytes());
        assert_eq!(&out[20..], b"EOF!");
    }

    #[test]
    fn test_row_count_enforced() {
        let mut w = Writer::new(Vec::new());
        w.begin_writing(Box::new(FlatDialect), 1).unwrap();
        w.add_variable("x", VarType::Numeric, 8).unwrap();
        w.begin_data().unwrap();
        assert!(matches!(
            w.end_writing().unwrap_err(),
            Error::RowCountMismatch { expected: 1, actual: 0 }
        ));
    }

    #[test]
    fn test_extra_row_rejected() {
        let mut w = Writer::new(Vec::new());
        w.begin_writing(Box::new(FlatDialect), 1).unwrap();
        w.add_variable("x", VarType::Numeric, 8).unwrap();
        w.begin_data().unwrap();
        w.finish_row().unwrap();
        assert!(w.finish_row().is_err());
    }

    #[test]
    fn test_misordered_calls_rejected() {
        let mut w = Writer::new(Vec::new());
        assert!(w.add_variable("x", VarType::Numeric, 8).is_err());
        assert!(w.begin_data().is_err());

        w.begin_writing(Box::new(FlatDialect), 0).unwrap();
        let second = w.begin_writing(Box::new(FlatDialect), 0);
        assert!(second.is_err());
    }

    #[test]
    fn test_rows_with_empty_schema_rejected() {
        let mut w = Writer::new(Vec::new());
        w.begin_writing(Box::new(FlatDialect), 3).unwrap();
        assert!(matches!(
            w.begin_data().unwrap_err(),
            Error::RowCountMismatch { .. }
        ));
    }

    #[test]
    fn test_default_version_applied() {
        let mut w = Writer::new(Vec::new());
        w.begin_writing(Box::new(FlatDialect), 0).unwrap();
        assert_eq!(w.version, 1);
    }
}
