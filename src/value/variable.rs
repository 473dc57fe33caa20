//! Variable descriptors.

use crate::value::VarType;

/// Description of one column in a dataset.
///
/// Numeric variables always occupy 8 bytes on disk regardless of the cell
/// subtype supplied; string variables keep the user-declared width exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// 0-based position in declaration order.
    pub index: usize,
    /// Column name.
    pub name: String,
    /// Human-readable label, empty if none.
    pub label: String,
    /// Display format string (e.g. `DATE9.`), empty if none.
    pub format: String,
    /// Storage type.
    pub var_type: VarType,
    /// User-declared storage width in bytes. Ignored for numeric types.
    pub user_width: usize,
    /// Name of the value-label set attached to this variable, if any.
    pub label_set: Option<String>,
}

impl Variable {
    /// Create a variable with no label, format, or label set.
    #[must_use]
    pub fn new(index: usize, name: impl Into<String>, var_type: VarType, user_width: usize) -> Self {
        Self {
            index,
            name: name.into(),
            label: String::new(),
            format: String::new(),
            var_type,
            user_width,
            label_set: None,
        }
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Attach a display format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Attach a value-label set name.
    #[must_use]
    pub fn with_label_set(mut self, set: impl Into<String>) -> Self {
        self.label_set = Some(set.into());
        self
    }

    /// Storage width in bytes: user width for strings, 8 for numerics.
    #[must_use]
    pub const fn storage_width(&self) -> usize {
        match self.var_type {
            VarType::Str | VarType::LongStr => self.user_width,
            VarType::Numeric => 8,
        }
    }

    /// `true` for string and long-string variables.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self.var_type, VarType::Str | VarType::LongStr)
    }
}
