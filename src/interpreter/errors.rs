//! Runtime error types for the C interpreter
//!
//! This module defines [`RuntimeError`], which represents every condition that
//! stops a reduction. Errors are returned as values; a failed step never
//! modifies the state it was given, so a driver can report the error and
//! keep the last good state on screen.
//!
//! Errors fall into four categories, reported by [`RuntimeError::tag`]:
//!
//! - `halted`: there is no control left, the program has finished
//! - `stuck`: no step function exists for the current node kind
//! - `stack-underflow`: a leave or return found no matching frame
//! - `error`: everything else (semantic errors, unsupported constructs)

use crate::memory::value::Address;
use thiserror::Error;

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Stepping a state whose control is `Halt`
    #[error("program is halted")]
    Halted,

    /// No step function for this node kind
    #[error("cannot step through {kind}")]
    Stuck { kind: String },

    /// Mismatched enter/leave or return outside of any function frame
    #[error("stack underflow while {context}")]
    StackUnderflow { context: String },

    #[error("unsupported operation: {op} on {operand}")]
    UnsupportedOperation { op: String, operand: String },

    #[error("unsupported cast from {from} to {to}")]
    UnsupportedCast { from: String, to: String },

    /// Arithmetic between operands of different types
    #[error("mixed operand types for {op}: {lhs} and {rhs}")]
    MixedOperands { op: String, lhs: String, rhs: String },

    #[error("division by zero in {op}")]
    DivisionByZero { op: String },

    #[error("null pointer dereference ({size} bytes)")]
    NullDereference { size: usize },

    /// Access outside of the memory capacity
    #[error("memory fault at 0x{address:x} ({size} bytes)")]
    MemoryFault { address: Address, size: usize },

    /// A stack allocation would cross into static storage
    #[error("stack overflow declaring {name}")]
    StackOverflow { name: String },

    #[error("undefined variable {name}")]
    UndefinedVariable { name: String },

    #[error("undefined function {name}")]
    UndefinedFunction { name: String },

    #[error("no main function found")]
    NoMainFunction,

    #[error("record {record} has no field {field}")]
    MissingField { record: String, field: String },

    #[error("undeclared record {name}")]
    UndeclaredRecord { name: String },

    /// Storage requested for a type with no known size
    #[error("incomplete type {ty}")]
    IncompleteType { ty: String },

    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },

    /// The AST does not have the shape the step function expects
    #[error("malformed {kind} node: {message}")]
    InvalidNode { kind: String, message: String },

    #[error("{keyword} statement not within a loop")]
    BreakOutsideLoop { keyword: String },

    #[error("invalid string at 0x{address:x}: {message}")]
    InvalidString { address: Address, message: String },

    /// Reported by a native function
    #[error("builtin {name}: {message}")]
    Builtin { name: String, message: String },

    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    #[error("snapshot memory limit exceeded: {current} bytes used, limit {limit}")]
    SnapshotLimitExceeded { current: usize, limit: usize },
}

impl RuntimeError {
    /// Category tag of this error
    pub fn tag(&self) -> &'static str {
        match self {
            RuntimeError::Halted => "halted",
            RuntimeError::Stuck { .. } => "stuck",
            RuntimeError::StackUnderflow { .. } => "stack-underflow",
            _ => "error",
        }
    }

    pub(crate) fn invalid(kind: impl ToString, message: impl Into<String>) -> Self {
        RuntimeError::InvalidNode {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}
