//! The parser skeleton.
//!
//! [`Parser`] owns a [`ByteSource`] and an optional progress callback, and
//! dispatches to the dialect parser selected by the input filename's
//! extension. It holds no per-file state of its own: running two passes
//! over the same file with different handlers is the intended usage when a
//! consumer needs label tables before variables (SAS data plus external
//! catalog), and all accumulation between passes belongs to the caller.

mod handler;

pub use handler::{Flow, Handler};
pub(crate) use handler::check_flow;

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::io::ByteSource;
use crate::sas7bdat;

/// Input dialects recognised by filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Stata `.dta`.
    Dta,
    /// SPSS system `.sav`.
    Sav,
    /// SPSS portable `.por`.
    Por,
    /// SAS dataset `.sas7bdat`.
    Sas7bdat,
    /// SAS catalog `.sas7bcat` (value-label store).
    Sas7bcat,
}

impl InputFormat {
    /// Determine the dialect from a filename extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "dta" => Some(Self::Dta),
            "sav" => Some(Self::Sav),
            "por" => Some(Self::Por),
            "sas7bdat" => Some(Self::Sas7bdat),
            "sas7bcat" => Some(Self::Sas7bcat),
            _ => None,
        }
    }

    /// `true` for the SAS catalog dialect.
    #[must_use]
    pub const fn is_catalog(self) -> bool {
        matches!(self, Self::Sas7bcat)
    }
}

/// Streaming parser over a pluggable byte source.
pub struct Parser<S: ByteSource> {
    source: S,
    progress: Option<Box<dyn FnMut(f64) -> Flow>>,
}

impl<S: ByteSource> Parser<S> {
    /// Create a parser over `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            progress: None,
        }
    }

    /// Install a progress callback, polled at least once per page parsed.
    /// Returning [`Flow::Abort`] cancels parsing with
    /// [`Error::UserAbort`].
    pub fn set_progress_handler(&mut self, progress: impl FnMut(f64) -> Flow + 'static) {
        self.progress = Some(Box::new(progress));
    }

    /// Recover the byte source, e.g. to rewind it for a second pass.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Parse `path`, selecting the dialect from its extension.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`] for unrecognised extensions or dialects
    /// without an in-crate parser; otherwise whatever the dialect parser
    /// reports.
    pub fn parse_path(&mut self, path: &Path, handler: &mut dyn Handler) -> Result<()> {
        let format = InputFormat::from_path(path)
            .ok_or_else(|| Error::unsupported_format(path))?;
        self.parse(path, format, handler)
    }

    /// Parse `path` as an explicit dialect.
    ///
    /// The path is forwarded to [`ByteSource::open`]; in-memory sources
    /// ignore it and only the extension-independent `format` matters.
    ///
    /// # Errors
    ///
    /// Returns the dialect parser's error, [`Error::UserAbort`] when a
    /// handler or the progress callback cancels, or
    /// [`Error::UnsupportedFormat`] for dialects parsed by sibling crates.
    pub fn parse(
        &mut self,
        path: &Path,
        format: InputFormat,
        handler: &mut dyn Handler,
    ) -> Result<()> {
        debug!("parsing {} as {:?}", path.display(), format);
        match format {
            InputFormat::Sas7bdat => match self.progress.as_mut() {
                Some(cb) => {
                    let mut progress = |fraction: f64| cb(fraction);
                    sas7bdat::read::parse(&mut self.source, path, Some(&mut progress), handler)
                }
                None => sas7bdat::read::parse(&mut self.source, path, None, handler),
            },
            InputFormat::Dta | InputFormat::Sav | InputFormat::Por | InputFormat::Sas7bcat => {
                Err(Error::unsupported_format(path))
            }
        }
    }
}
