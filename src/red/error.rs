//! Error types for the aggregator and its wire format

use std::fmt;

use tracing::error;

use super::field::Field;

/// Message returned by an unstarted handle, both as an error and as its
/// text rendering.
pub const NOT_STARTED: &str = "red handle is not started, call start() first";

/// Errors returned synchronously to a caller of [`Red`](super::Red).
///
/// Neither variant has side effects: the request never reaches the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedError {
    /// Operand not allowed for the operation
    Usage {
        op: &'static str,
        field: Field,
        value: i64,
    },
    /// Handle was never started
    NilHandle,
}

impl fmt::Display for RedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedError::Usage { op, field, value } => write!(
                f,
                "usage error, unsupported operand {} for {}({}, {})",
                field, op, field, value
            ),
            RedError::NilHandle => f.write_str(NOT_STARTED),
        }
    }
}

impl std::error::Error for RedError {}

/// Malformed `"<requests>, <errors>, <seconds>"` input.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Empty,
    FieldCount { actual: usize, line: String },
    InvalidNumber { field: &'static str, token: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "failed to scan a red from an empty line"),
            ParseError::FieldCount { actual, line } => {
                write!(f, "failed to scan a red from {:?}: read {} fields, expected 3", line, actual)
            }
            ParseError::InvalidNumber { field, token } => {
                write!(f, "failed to scan a red: {} is not a number: {:?}", field, token)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Invariant violations inside the aggregator. Never returned to callers;
/// see [`fatal`].
#[derive(Debug)]
pub(crate) enum ProgrammerError {
    /// The worker thread is gone while handles still exist
    WorkerGone { op: &'static str },
    /// The worker dropped a reply channel without answering
    ReplyDropped { op: &'static str },
}

impl fmt::Display for ProgrammerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgrammerError::WorkerGone { op } => {
                write!(f, "programmer error, red worker gone during {}", op)
            }
            ProgrammerError::ReplyDropped { op } => {
                write!(f, "programmer error, red worker dropped the reply to {}", op)
            }
        }
    }
}

impl std::error::Error for ProgrammerError {}

/// Aggregated state can't be trusted past a programmer error, so the whole
/// process stops here.
pub(crate) fn fatal(err: ProgrammerError) -> ! {
    error!(error = %err, "red aggregator invariant violated, aborting");
    std::process::abort()
}
