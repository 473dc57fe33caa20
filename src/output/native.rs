//! Native output module: routes `.sas7bdat` output through the writer
//! skeleton with the SAS7BDAT dialect installed.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{Error, Result};
use crate::output::OutputModule;
use crate::sas7bdat::Sas7bdatDialect;
use crate::value::{Value, Variable};
use crate::writer::Writer;

/// Writes `.sas7bdat` files.
#[derive(Default)]
pub struct NativeModule {
    writer: Option<Writer<BufWriter<File>>>,
    var_count: usize,
    pending_rows: u64,
    initialized: bool,
    data_begun: bool,
}

impl NativeModule {
    /// Create an unopened native module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn writer(&mut self) -> Result<&mut Writer<BufWriter<File>>> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::parse("native output is not open"))
    }

    fn ensure_writing(&mut self) -> Result<()> {
        if !self.initialized {
            let row_count = self.pending_rows;
            self.writer()?
                .begin_writing(Box::new(Sas7bdatDialect::new()), row_count)?;
            self.initialized = true;
        }
        Ok(())
    }

    fn ensure_data(&mut self) -> Result<()> {
        self.ensure_writing()?;
        if !self.data_begun {
            self.writer()?.begin_data()?;
            self.data_begun = true;
        }
        Ok(())
    }
}

impl OutputModule for NativeModule {
    fn accept(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("sas7bdat")
    }

    fn init(&mut self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.writer = Some(Writer::new(BufWriter::new(file)));
        Ok(())
    }

    fn info(&mut self, obs_count: i64, _var_count: i64) -> Result<()> {
        // `info` arrives on both passes; schema construction begins at the
        // first `variable` event, so the latest count wins.
        if !self.initialized {
            self.pending_rows = obs_count.max(0) as u64;
        }
        Ok(())
    }

    fn variable(&mut self, variable: &Variable, _label_set: Option<&str>) -> Result<()> {
        self.ensure_writing()?;
        let writer = self.writer()?;
        let added = writer.add_variable(&variable.name, variable.var_type, variable.user_width)?;
        added.label = variable.label.clone();
        added.format = variable.format.clone();
        self.var_count += 1;
        Ok(())
    }

    fn value(&mut self, _obs_index: usize, var_index: usize, value: &Value<'_>) -> Result<()> {
        self.ensure_data()?;
        let is_last_var = var_index + 1 == self.var_count;
        let writer = self.writer()?;
        writer.insert_value(var_index, value)?;
        if is_last_var {
            writer.finish_row()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Files with zero rows still need their header and meta pages.
        self.ensure_data()?;
        let writer = self
            .writer
            .take()
            .ok_or_else(|| Error::parse("native output is not open"))?;
        writer.end_writing()?;
        Ok(())
    }
}
