//! Fields a caller may name, and the narrower set the worker accepts.

use std::fmt;

use super::error::RedError;

/// Fields of a RED triad as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Requests,
    Errors,
    /// Computed by `now()`, never updated by callers
    Duration,
    None,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Requests => "REQUESTS",
            Field::Errors => "ERRORS",
            Field::Duration => "DURATION",
            Field::None => "NONE",
        };
        f.write_str(name)
    }
}

/// A field that add/overwrite may legally target.
///
/// Only constructed through [`Operand::for_call`], so every `Add` or
/// `Overwrite` that reaches the worker names a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    Requests,
    Errors,
}

impl Operand {
    /// Validate `field` for the public operation `op`.
    pub(crate) fn for_call(op: &'static str, field: Field, value: i64) -> Result<Self, RedError> {
        match field {
            Field::Requests => Ok(Operand::Requests),
            Field::Errors => Ok(Operand::Errors),
            Field::Duration | Field::None => Err(RedError::Usage { op, field, value }),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Requests => Field::Requests.fmt(f),
            Operand::Errors => Field::Errors.fmt(f),
        }
    }
}
