//! The event-handler capability consumed by dialect parsers.

use crate::value::{FileMetadata, Value, Variable};

/// Continuation signal returned by every handler method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum Flow {
    /// Keep parsing.
    #[default]
    Continue,
    /// Stop parsing; the parser returns [`crate::Error::UserAbort`].
    Abort,
}

impl Flow {
    /// `true` if this signal requests an abort.
    #[must_use = "an abort signal must be acted upon"]
    pub const fn is_abort(self) -> bool {
        matches!(self, Self::Abort)
    }
}

/// Consumer of parsing events.
///
/// Every method defaults to a no-op so consumers implement only the slots
/// they need — the driver's first pass installs label handlers only, its
/// second pass variable and value handlers only.
///
/// Dialect parsers invoke the methods in a fixed order per file: `info`
/// once, `metadata` once, `value_label` zero or more times, `fweight` at
/// most once, `variable` once per column, then `value` row-major. The set
/// of variables announced is exactly the set of columns later referenced
/// by `value`. Values are borrow-only; copy anything that must outlive the
/// callback.
#[allow(unused_variables)]
pub trait Handler {
    /// Observation and variable counts, emitted once near the start.
    /// `obs_count` is -1 when the dialect cannot know it up front.
    fn info(&mut self, obs_count: i64, var_count: i64) -> Flow {
        Flow::Continue
    }

    /// File-level metadata, emitted once.
    fn metadata(&mut self, meta: &FileMetadata) -> Flow {
        Flow::Continue
    }

    /// One entry of a named value-label set.
    fn value_label(&mut self, set: &str, key: &Value<'_>, label: &str) -> Flow {
        Flow::Continue
    }

    /// Index of the frequency-weight variable, when one is designated.
    fn fweight(&mut self, var_index: usize) -> Flow {
        Flow::Continue
    }

    /// One variable descriptor, with the label set it references, if any.
    fn variable(&mut self, index: usize, variable: &Variable, label_set: Option<&str>) -> Flow {
        Flow::Continue
    }

    /// One cell, row-major.
    fn value(&mut self, obs_index: usize, var_index: usize, value: &Value<'_>) -> Flow {
        Flow::Continue
    }

    /// Diagnostic sink for recoverable oddities; parsing continues.
    fn error(&mut self, message: &str) {}
}

/// Turn a handler signal into a parser status.
macro_rules! check_flow {
    ($flow:expr) => {
        if $flow.is_abort() {
            return Err($crate::error::Error::UserAbort);
        }
    };
}

pub(crate) use check_flow;
