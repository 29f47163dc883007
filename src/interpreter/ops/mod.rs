//! Operators
//!
//! Each submodule pairs the step functions for a family of operators with
//! the pure value operations they reduce to, so those operations can be
//! reused (compound assignment goes through [`binary::eval_binary`], every
//! conversion through [`cast::eval_cast`]).

pub mod access;
pub mod assign;
pub mod binary;
pub mod cast;
pub mod unary;
