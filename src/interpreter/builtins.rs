//! Native functions supplied by the host
//!
//! The interpreter ships no C library of its own. A host registers native
//! implementations by name in a [`Builtins`] table; a prototype without a
//! body is bound to the native function of the same name when the program
//! starts.
//!
//! # Calling Convention
//!
//! A native function receives the current state, the call's continuation
//! (the call expression waiting for its result), and the evaluated
//! `[callee, arg1, ...]` values. It returns a reduction like any step
//! function: usually just a result, optionally with effects such as stores.
//!
//! ```ignore
//! let mut builtins = Builtins::new();
//! builtins.register("abs", |_state: &State, _cont: &Rc<Control>, values: &[Value]| {
//!     let n = values.get(1).and_then(Value::to_integer).unwrap_or(0);
//!     builtins::returns(Value::int(n.abs() as i64))
//! });
//! ```

use super::control::{Control, Outcome, Reduction, StepResult};
use super::engine::State;
use super::errors::RuntimeError;
use crate::memory::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// A function implemented by the host
pub trait NativeFunction {
    fn call(&self, state: &State, cont: &Rc<Control>, values: &[Value]) -> StepResult;
}

impl<F> NativeFunction for F
where
    F: Fn(&State, &Rc<Control>, &[Value]) -> StepResult,
{
    fn call(&self, state: &State, cont: &Rc<Control>, values: &[Value]) -> StepResult {
        self(state, cont, values)
    }
}

/// Native functions by name
#[derive(Clone, Default)]
pub struct Builtins {
    natives: FxHashMap<String, Rc<dyn NativeFunction>>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, native: impl NativeFunction + 'static) -> &mut Self {
        self.natives.insert(name.into(), Rc::new(native));
        self
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn NativeFunction>> {
        self.natives.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.natives.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.natives.keys().map(String::as_str)
    }
}

impl fmt::Debug for Builtins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}

/// Reduction returning `value` to the call
pub fn returns(value: Value) -> StepResult {
    Ok(Reduction {
        result: Some(Outcome::Value(value)),
        ..Default::default()
    })
}

/// Reduction for a native function with no result
pub fn returns_void() -> StepResult {
    Ok(Reduction {
        result: Some(Outcome::Void),
        ..Default::default()
    })
}

/// The `index`-th argument (after the callee), or a builtin error
pub fn argument<'a>(name: &str, values: &'a [Value], index: usize) -> Result<&'a Value, RuntimeError> {
    values.get(index + 1).ok_or_else(|| RuntimeError::Builtin {
        name: name.to_string(),
        message: format!("missing argument {}", index + 1),
    })
}
