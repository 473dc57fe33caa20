//! Pluggable byte-source abstraction for the dialect parsers.
//!
//! A [`ByteSource`] supplies open/close/seek/read plus [`ByteSource::update`],
//! the sole cancellation point: parsers call it at least once per page (or
//! per 64 KiB consumed) so a progress callback can observe the fraction
//! complete and request an abort.
//!
//! [`FileSource`] backs parsing from the filesystem; [`BufferSource`] backs
//! the in-memory parsing used throughout the test suites.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};
use crate::parser::Flow;

/// Progress callback: receives the fraction complete in `0.0..=1.0` and may
/// return [`Flow::Abort`] to cancel parsing.
pub type ProgressFn<'a> = dyn FnMut(f64) -> Flow + 'a;

/// A seekable, readable byte stream the parser skeleton drives.
pub trait ByteSource {
    /// Open the source. File-backed sources resolve `path`; in-memory
    /// sources ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the underlying transport fails.
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Release the source. Safe to call when not open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the underlying transport fails.
    fn close(&mut self) -> Result<()>;

    /// Reposition the stream, returning the new absolute offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] for out-of-range or failed seeks.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Read up to `buf.len()` bytes. Short reads are permitted; 0 means
    /// end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the underlying transport fails.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Report progress against `total_size` and poll for cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserAbort`] iff the callback requests an abort.
    fn update(&mut self, total_size: u64, progress: Option<&mut ProgressFn<'_>>) -> Result<()> {
        let Some(progress) = progress else {
            return Ok(());
        };
        let pos = self.seek(SeekFrom::Current(0))?;
        let fraction = if total_size == 0 {
            1.0
        } else {
            pos as f64 / total_size as f64
        };
        match progress(fraction) {
            Flow::Continue => Ok(()),
            Flow::Abort => Err(Error::UserAbort),
        }
    }

    /// Fill `buf` exactly, treating a short read as a truncated file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on premature end of input.
    fn read_exact_buf(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::parse("unexpected end of file"));
            }
            filled += n;
        }
        Ok(())
    }

    /// Total length of the source, leaving the position unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when seeking fails.
    fn total_size(&mut self) -> Result<u64> {
        let pos = self.seek(SeekFrom::Current(0))?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }
}

/// File-backed byte source.
#[derive(Debug, Default)]
pub struct FileSource {
    file: Option<File>,
}

impl FileSource {
    /// Create an unopened file source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "source is not open",
            ))
        })
    }
}

impl ByteSource for FileSource {
    fn open(&mut self, path: &Path) -> Result<()> {
        self.file = Some(File::open(path)?);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.file()?.seek(pos)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file()?.read(buf)?)
    }
}

/// In-memory byte source over a caller-supplied buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSource {
    data: Vec<u8>,
    pos: usize,
}

impl BufferSource {
    /// Wrap a byte buffer.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Rewind to the start, for a second parsing pass over the same bytes.
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl ByteSource for BufferSource {
    fn open(&mut self, _path: &Path) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let newpos = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            SeekFrom::Current(offset) => self.pos as i64 + offset,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
        };
        if newpos < 0 || newpos as usize > self.data.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek out of range",
            )));
        }
        self.pos = newpos as usize;
        Ok(self.pos as u64)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let left = self.data.len() - self.pos;
        let n = buf.len().min(left);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
