//! CSV output module: a header row of variable names, then one line per
//! observation with quoted character cells. Missing numeric cells become
//! empty fields.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::output::OutputModule;
use crate::value::{Value, Variable};

/// Writes `.csv` files.
#[derive(Default)]
pub struct CsvModule {
    out: Option<BufWriter<File>>,
    names: Vec<String>,
    header_written: bool,
}

impl CsvModule {
    /// Create an unopened CSV module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn out(&mut self) -> Result<&mut BufWriter<File>> {
        self.out.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "csv output is not open",
            ))
        })
    }

    fn write_header_once(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let line = self
            .names
            .iter()
            .map(|n| quote(n))
            .collect::<Vec<_>>()
            .join(",");
        let out = self.out()?;
        out.write_all(line.as_bytes())?;
        self.header_written = true;
        Ok(())
    }
}

fn quote(field: &str) -> String {
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for ch in field.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

impl OutputModule for CsvModule {
    fn accept(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("csv")
    }

    fn init(&mut self, path: &Path) -> Result<()> {
        self.out = Some(BufWriter::new(File::create(path)?));
        Ok(())
    }

    fn variable(&mut self, variable: &Variable, _label_set: Option<&str>) -> Result<()> {
        self.names.push(variable.name.clone());
        Ok(())
    }

    fn value(&mut self, _obs_index: usize, var_index: usize, value: &Value<'_>) -> Result<()> {
        self.write_header_once()?;

        let field = match value {
            Value::Str(s) => quote(s),
            Value::Missing(_) => String::new(),
            numeric => numeric.to_string(),
        };

        let out = self.out()?;
        if var_index == 0 {
            out.write_all(b"\n")?;
        } else {
            out.write_all(b",")?;
        }
        out.write_all(field.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.write_header_once()?;
        let out = self.out()?;
        out.write_all(b"\n")?;
        out.flush()?;
        self.out = None;
        Ok(())
    }
}
