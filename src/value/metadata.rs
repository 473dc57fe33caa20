//! File-level metadata reported by the dialect parsers.

use chrono::{DateTime, Local};

/// Maximum file-label length for the SPSS portable dialect.
pub const LABEL_LEN_POR: usize = 20;
/// Maximum file-label length for Stata dialects up to release 105.
pub const LABEL_LEN_DTA_OLD: usize = 32;
/// Maximum file-label length for mid-era Stata dialects.
pub const LABEL_LEN_DTA: usize = 81;
/// Maximum file-label length for Stata 118 files.
pub const LABEL_LEN_DTA_118: usize = 321;
/// Maximum file-label length for SPSS system files.
pub const LABEL_LEN_SAV: usize = 64;
/// Maximum file-label length for SAS datasets (header field width).
pub const LABEL_LEN_SAS: usize = 64;

/// Character-set identifier byte denoting UTF-8 in SAS files.
pub const ENCODING_UTF8: u8 = 20;

/// Snapshot of per-file metadata, passed to the `metadata` handler.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    /// File label, truncated to the dialect's limit.
    pub file_label: String,
    /// Creation timestamp, if the file carries one.
    pub created: Option<DateTime<Local>>,
    /// Modification timestamp, if the file carries one.
    pub modified: Option<DateTime<Local>>,
    /// Dialect-specific format version (e.g. 90101 for SAS 9.0101).
    pub format_version: i64,
    /// Character-set identifier byte; 20 denotes UTF-8 for SAS.
    pub encoding: u8,
    /// `true` when multi-byte integers are stored little-endian.
    pub little_endian: bool,
    /// Host platform string from the file header, empty if none.
    pub host: String,
    /// Total observation count; -1 when the dialect cannot know up front.
    pub row_count: i64,
    /// Number of variables.
    pub var_count: i64,
    /// Index of the frequency-weight variable, when one is designated.
    pub fweight_index: Option<usize>,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            file_label: String::new(),
            created: None,
            modified: None,
            format_version: 0,
            encoding: 0,
            little_endian: true,
            host: String::new(),
            row_count: -1,
            var_count: 0,
            fweight_index: None,
        }
    }
}
