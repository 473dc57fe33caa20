//! Output-module indirection for the conversion driver.
//!
//! An [`OutputModule`] claims output filenames via `accept` and receives
//! the parsing events the driver forwards. Event slots default to no-ops
//! so a module implements only what its format needs. The registry is an
//! ordered list searched first-accept.

mod csv;
mod native;

pub use csv::CsvModule;
pub use native::NativeModule;

use std::path::Path;

use crate::error::Result;
use crate::value::{Value, Variable};

/// A writer back-end selected by output filename.
#[allow(unused_variables)]
pub trait OutputModule {
    /// `true` if this module handles `path`'s extension.
    fn accept(&self, path: &Path) -> bool;

    /// Open the output file and prepare internal state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] when the file cannot be created.
    fn init(&mut self, path: &Path) -> Result<()>;

    /// Observation and variable counts from the `info` event.
    ///
    /// # Errors
    ///
    /// Module-specific failures.
    fn info(&mut self, obs_count: i64, var_count: i64) -> Result<()> {
        Ok(())
    }

    /// Frequency-weight designation from pass 1.
    ///
    /// # Errors
    ///
    /// Module-specific failures.
    fn fweight(&mut self, var_index: usize) -> Result<()> {
        Ok(())
    }

    /// One value-label entry from pass 1.
    ///
    /// # Errors
    ///
    /// Module-specific failures.
    fn value_label(&mut self, set: &str, key: &Value<'_>, label: &str) -> Result<()> {
        Ok(())
    }

    /// One variable descriptor from pass 2.
    ///
    /// # Errors
    ///
    /// Module-specific failures.
    fn variable(&mut self, variable: &Variable, label_set: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// One cell from pass 2, row-major.
    ///
    /// # Errors
    ///
    /// Module-specific failures.
    fn value(&mut self, obs_index: usize, var_index: usize, value: &Value<'_>) -> Result<()> {
        Ok(())
    }

    /// Flush and close the output.
    ///
    /// # Errors
    ///
    /// Module-specific failures.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The built-in module registry, in precedence order.
#[must_use]
pub fn default_modules() -> Vec<Box<dyn OutputModule>> {
    vec![
        Box::new(NativeModule::new()),
        Box::new(CsvModule::new()),
    ]
}

/// Find the first module accepting `path`.
pub fn module_for_path<'a>(
    modules: &'a mut [Box<dyn OutputModule>],
    path: &Path,
) -> Option<&'a mut Box<dyn OutputModule>> {
    modules.iter_mut().find(|m| m.accept(path))
}
