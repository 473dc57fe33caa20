//! # bdatrs
//!
//! Pure Rust codec for statistical-package data files: an event-driven
//! parser front-end over pluggable byte sources, a schema/row writer
//! back-end, and a bit-exact SAS7BDAT writer with the matching reader.
//!
//! ## Reading
//!
//! Parsing is push-based: install a [`Handler`] and the dialect parser
//! feeds it `info`, `metadata`, `variable`, and `value` events in order.
//! Handler methods default to no-ops, so a consumer implements only the
//! slots it needs.
//!
//! ```no_run
//! use std::path::Path;
//! use bdatrs::{Flow, Handler, Parser, Value};
//! use bdatrs::io::FileSource;
//!
//! struct CellPrinter;
//!
//! impl Handler for CellPrinter {
//!     fn value(&mut self, obs: usize, var: usize, value: &Value<'_>) -> Flow {
//!         println!("[{obs},{var}] = {value}");
//!         Flow::Continue
//!     }
//! }
//!
//! let mut parser = Parser::new(FileSource::new());
//! parser.parse_path(Path::new("survey.sas7bdat"), &mut CellPrinter)?;
//! # Ok::<(), bdatrs::Error>(())
//! ```
//!
//! ## Writing
//!
//! The writer skeleton collects a schema, then streams fixed-width rows
//! through a format dialect:
//!
//! ```no_run
//! use bdatrs::{Value, VarType, Writer};
//! use bdatrs::sas7bdat::Sas7bdatDialect;
//!
//! let file = std::fs::File::create("out.sas7bdat")?;
//! let mut writer = Writer::new(file);
//! writer.set_file_label("demo");
//! writer.begin_writing(Box::new(Sas7bdatDialect::new()), 1)?;
//! writer.add_variable("x", VarType::Numeric, 8)?;
//! writer.begin_data()?;
//! writer.insert_value(0, &Value::Double(1.0))?;
//! writer.finish_row()?;
//! writer.end_writing()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Conversion driver
//!
//! The `bdatrs` binary converts between formats in two passes: value
//! labels and the frequency-weight designation first, variables and rows
//! second. See [`driver`].

pub mod driver;
mod error;
pub mod io;
pub mod output;
pub mod parser;
pub mod sas7bdat;
pub mod value;
pub mod writer;

pub use error::{Error, Result};
pub use parser::{Flow, Handler, InputFormat, Parser};
pub use value::{FileMetadata, MissingTag, Value, VarType, Variable};
pub use writer::{Dialect, WriteContext, Writer};
