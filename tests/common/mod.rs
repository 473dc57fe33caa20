//! Shared helpers for the integration suites: an event collector and
//! in-memory write/parse plumbing.
#![allow(dead_code)] // each suite uses a different subset

use std::path::Path;

use bdatrs::io::BufferSource;
use bdatrs::{FileMetadata, Flow, Handler, InputFormat, MissingTag, Parser, Value, Variable};

/// An owned copy of a cell value, for assertions after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValue {
    Num(f64),
    Str(String),
    Missing(MissingTag),
}

impl From<&Value<'_>> for OwnedValue {
    fn from(value: &Value<'_>) -> Self {
        if let Some(tag) = value.tag() {
            Self::Missing(tag)
        } else if let Some(s) = value.as_str() {
            Self::Str(s.to_string())
        } else {
            Self::Num(value.as_f64().expect("numeric value"))
        }
    }
}

/// Collects every event a parse emits.
#[derive(Debug, Default)]
pub struct Collector {
    pub info: Option<(i64, i64)>,
    pub metadata: Option<FileMetadata>,
    pub variables: Vec<Variable>,
    pub values: Vec<(usize, usize, OwnedValue)>,
    pub errors: Vec<String>,
}

impl Handler for Collector {
    fn info(&mut self, obs_count: i64, var_count: i64) -> Flow {
        self.info = Some((obs_count, var_count));
        Flow::Continue
    }

    fn metadata(&mut self, meta: &FileMetadata) -> Flow {
        self.metadata = Some(meta.clone());
        Flow::Continue
    }

    fn variable(&mut self, _index: usize, variable: &Variable, _label_set: Option<&str>) -> Flow {
        self.variables.push(variable.clone());
        Flow::Continue
    }

    fn value(&mut self, obs_index: usize, var_index: usize, value: &Value<'_>) -> Flow {
        self.values.push((obs_index, var_index, value.into()));
        Flow::Continue
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

/// Parse in-memory SAS7BDAT bytes, collecting all events.
pub fn parse_bytes(bytes: Vec<u8>) -> bdatrs::Result<Collector> {
    let mut collector = Collector::default();
    let mut parser = Parser::new(BufferSource::new(bytes));
    parser.parse(
        Path::new("test.sas7bdat"),
        InputFormat::Sas7bdat,
        &mut collector,
    )?;
    Ok(collector)
}
