//! # Introduction
//!
//! cstep executes a subset of C one small step at a time. It takes a program
//! as a serialized AST and exposes every intermediate state: the control
//! stack, scope chain, memory and the log of memory accesses, so a host can
//! visualize or single-step execution and move backward through history.
//!
//! ## Execution pipeline
//!
//! ```text
//! JSON AST → Program → start() → State → step() → State → ...
//! ```
//!
//! 1. [`ast`]: loads the AST and numbers its nodes.
//! 2. [`interpreter`]: bootstraps the program and reduces one node at a
//!    time; [`interpreter::driver`] groups steps into statements, calls and
//!    whole runs.
//! 3. [`memory`]: C types, values, byte serialization, the flat memory
//!    buffer and the scope chain.
//! 4. [`snapshot`]: bounded history of states and inspection of the access
//!    log.
//!
//! ## Supported C subset
//!
//! Types: the builtin scalars, pointers, arrays (including variable-length),
//! structs and function pointers. Control flow: `if/else`, `while`, `for`,
//! `do-while`, `break`, `continue`, `return`. Library functions are supplied
//! by the host through [`interpreter::builtins::Builtins`].

pub mod ast;
pub mod interpreter;
pub mod memory;
pub mod snapshot;
