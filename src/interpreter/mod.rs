//! The small-step evaluator
//!
//! - [`control`]: the control stack and what a step returns
//! - [`engine`]: [`State`](engine::State) and dispatch by node kind
//! - [`effects`]: state changes a step requests, applied in order
//! - [`driver`]: bootstrap, stepping granularities and history
//! - [`builtins`]: host functions callable from the program
//!
//! The step functions themselves live in [`statements`], [`loops`],
//! [`jumps`], [`expressions`], [`type_system`] and [`ops`].
//!
//! # Execution Model
//!
//! A step never mutates its input. It inspects the current control and
//! returns a [`Reduction`](control::Reduction): an optional new control,
//! effects, and an optional result handed to the continuation. Every
//! intermediate state is therefore a plain value that can be kept,
//! compared, or resumed.

pub mod builtins;
pub mod constants;
pub mod control;
pub mod driver;
pub mod effects;
pub mod engine;
pub mod errors;
pub mod expressions;
pub mod jumps;
pub mod loops;
pub mod ops;
pub mod statements;
pub mod type_system;
