//! Operation trace.
//!
//! While tracing is active, the store appends one [`TraceEntry`] per public
//! operation: its name, its parameters and its outcome. Errors are recorded
//! and still returned to the caller.

use std::fmt;

use crate::error::{ComponentryError, StoreErrorCode};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum TraceOutcome {
    Result(Value),
    Error {
        message: String,
        code: Option<StoreErrorCode>,
    },
}

impl TraceOutcome {
    pub fn from_error(err: &ComponentryError) -> Self {
        TraceOutcome::Error {
            message: err.to_string(),
            code: err.code(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TraceOutcome::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub operation: &'static str,
    pub params: Vec<Value>,
    pub outcome: TraceOutcome,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operation)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;
        match &self.outcome {
            TraceOutcome::Result(value) => write!(f, " => {}", value),
            TraceOutcome::Error { message, code: Some(code) } => {
                write!(f, " !! {} [{}]", message, code)
            }
            TraceOutcome::Error { message, code: None } => write!(f, " !! {}", message),
        }
    }
}
