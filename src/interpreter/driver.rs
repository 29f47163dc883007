//! Execution driver
//!
//! [`start`] turns a loaded program into the initial [`State`]: it places
//! string literals in static storage, runs every top-level declaration, and
//! sets up a call to `main`. [`step`] performs one reduction. The other free
//! functions repeat `step` until a boundary a debugger cares about:
//!
//! - [`step_into`]: the next statement, descending into calls
//! - [`step_over`]: the next statement in the current function or a caller
//! - [`step_out`]: until the current function has returned
//! - [`step_expr`]: the next expression or statement
//! - [`run`]: until the program halts
//!
//! [`Interpreter`] wraps these with a snapshot history so execution can be
//! stepped backward.

use super::builtins::Builtins;
use super::constants::{DEFAULT_MEMORY_SIZE, DEFAULT_SNAPSHOT_LIMIT, HEAP_START};
use super::control::{Cont, Control, Outcome, Seq};
use super::effects::apply_reduction;
use super::engine::{self, Direction, State};
use super::errors::RuntimeError;
use crate::ast::{Attr, Node, NodeId, NodeKind, Program};
use crate::memory::serial::Endianness;
use crate::memory::stack::{self, Scope};
use crate::memory::types::{Scalar, Type};
use crate::memory::value::{Address, PointerValue, Value};
use crate::memory::Memory;
use crate::snapshot::History;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::rc::Rc;
use tracing::debug;

/// Interpreter configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Bytes of memory; the stack starts at the top
    pub memory_size: usize,
    /// First address of static storage
    pub heap_start: Address,
    pub endianness: Endianness,
    /// Maximum number of reductions [`Interpreter::run`] performs
    pub step_limit: Option<usize>,
    /// Memory budget of the snapshot history, in bytes
    pub snapshot_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            memory_size: DEFAULT_MEMORY_SIZE,
            heap_start: HEAP_START,
            endianness: Endianness::default(),
            step_limit: None,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }
}

/// Contents of a string literal's `value` attribute
///
/// A quoted value has its quotes removed and C escapes decoded; anything
/// else is taken as the literal text.
pub fn decode_string_literal(text: &str) -> Vec<u8> {
    let Some(inner) = text
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return text.as_bytes().to_vec();
    };
    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            // Up to three octal digits, `\0` included
            Some(first @ '0'..='7') => {
                let mut code = first.to_digit(8).unwrap_or_default();
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push(code as u8);
            }
            // Any number of hex digits; only the low byte is kept
            Some('x') if chars.peek().is_some_and(char::is_ascii_hexdigit) => {
                let mut code: u32 = 0;
                while let Some(digit) = chars.peek().and_then(|c| c.to_digit(16)) {
                    code = code.wrapping_mul(16).wrapping_add(digit);
                    chars.next();
                }
                bytes.push(code as u8);
            }
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(other) => {
                let mut buf = [0; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    bytes
}

/// Copy every string literal into static storage, in declaration order
fn place_literals(
    program: &Program,
    memory: &mut Memory,
    heap_start: &mut Address,
) -> Result<FxHashMap<NodeId, PointerValue>, RuntimeError> {
    let mut nodes = Vec::new();
    for decl in &program.decls {
        Node::walk(decl, &mut |node| {
            if node.kind == NodeKind::StringLiteral {
                nodes.push(node.clone());
            }
        });
    }

    let char_type = Type::scalar(Scalar::Char);
    let mut literals = FxHashMap::default();
    for node in nodes {
        let mut bytes = decode_string_literal(&node.attr_str("value").unwrap_or_default());
        bytes.push(0);
        let array = Type::array_of(char_type.clone(), Some(bytes.len()));
        let storage = PointerValue::new(array.clone(), *heap_start);
        let value = Value::Array {
            elem: char_type.clone(),
            elements: bytes
                .iter()
                .map(|b| Value::integral(Scalar::Char, *b as i8 as i128))
                .collect(),
        };
        *memory = memory.write(&storage, Some(&value))?;
        *heap_start += bytes.len() as Address;
        literals.insert(node.id, storage.decayed());
    }
    Ok(literals)
}

/// Build the initial state of `program`
///
/// Runs every top-level declaration, then points control at a synthesized
/// call to `main`. Fails with [`RuntimeError::NoMainFunction`] if `main` is
/// not a defined function.
pub fn start(program: &Program, builtins: Builtins, options: &Options) -> Result<State, RuntimeError> {
    let mut program = program.clone();
    let mut memory = Memory::allocate(options.memory_size, options.endianness);
    let mut heap_start = options.heap_start;
    let literals = place_literals(&program, &mut memory, &mut heap_start)?;
    debug!(count = literals.len(), heap_start, "string literals placed");

    let defined: FxHashSet<String> = program
        .decls
        .iter()
        .filter(|decl| decl.kind == NodeKind::FunctionDecl && decl.flag("define"))
        .filter_map(|decl| decl.identifier())
        .collect();

    let mut state = State {
        global_map: Rc::new(FxHashMap::default()),
        functions: Rc::new(Vec::new()),
        record_decls: Rc::new(FxHashMap::default()),
        memory,
        memory_log: Vec::new(),
        heap_start,
        scope: Scope::root(options.memory_size as Address),
        control: Cont::Halt,
        result: None,
        direction: Direction::Down,
        literals: Rc::new(literals),
        builtins: Rc::new(builtins),
        defined: Rc::new(defined),
    };

    for decl in &program.decls {
        state.control = Control::new(decl.clone(), Cont::Halt).into_cont();
        state = run(state, None)?;
    }
    debug!(
        globals = state.global_map.len(),
        functions = state.functions.len(),
        heap_start = state.heap_start,
        "declarations done"
    );

    if !matches!(state.global_map.get("main"), Some(Value::Function(_))) {
        return Err(RuntimeError::NoMainFunction);
    }
    let mut attrs = FxHashMap::default();
    attrs.insert("identifier".to_string(), Attr::Str("main".to_string()));
    let name = program.synthesize(NodeKind::Name, attrs, Vec::new());
    let callee = program.synthesize(NodeKind::DeclRefExpr, FxHashMap::default(), vec![name]);
    let call = program.synthesize(NodeKind::CallExpr, FxHashMap::default(), vec![callee]);

    state.control = Control::new(call, Cont::Halt).into_cont();
    state.result = None;
    state.direction = Direction::Down;
    state.memory_log.clear();
    debug!("ready to call main");
    Ok(state)
}

/// One reduction; an error leaves `state` as it was
pub fn step(state: &State) -> Result<State, RuntimeError> {
    let reduction = engine::step(state)?;
    let mut next = state.clone();
    apply_reduction(&mut next, reduction)?;
    Ok(next)
}

/// Whether `state` is about to execute a statement worth stopping at
fn at_statement(state: &State) -> bool {
    match state.control.control() {
        Some(control) => {
            state.direction == Direction::Down
                && control.seq == Some(Seq::Stmt)
                && !control.node.kind.is_transparent()
        }
        None => false,
    }
}

/// Key of the innermost function frame, 0 outside any call
fn function_depth(state: &State) -> u64 {
    stack::nearest_function(&state.scope).map_or(0, |frame| frame.key)
}

/// Step until the next statement boundary (or halt)
pub fn step_into(state: &State) -> Result<State, RuntimeError> {
    let mut state = step(state)?;
    while !state.is_halted() && !at_statement(&state) {
        state = step(&state)?;
    }
    Ok(state)
}

/// Step to the next statement without stopping inside calls made on the way
///
/// Before `main` has been entered this is [`step_into`].
pub fn step_over(state: &State) -> Result<State, RuntimeError> {
    let depth = function_depth(state);
    if depth == 0 {
        return step_into(state);
    }
    let mut state = step(state)?;
    while !state.is_halted() && !(at_statement(&state) && function_depth(&state) <= depth) {
        state = step(&state)?;
    }
    Ok(state)
}

/// Step until the current function has returned
///
/// Outside any call this runs to completion.
pub fn step_out(state: &State) -> Result<State, RuntimeError> {
    let Some(frame) = stack::nearest_function(&state.scope).cloned() else {
        return run(state.clone(), None);
    };
    let mut state = step(state)?;
    while !state.is_halted() && stack::contains(&state.scope, &frame) {
        state = step(&state)?;
    }
    Ok(state)
}

/// Step until the next expression or statement is entered
pub fn step_expr(state: &State) -> Result<State, RuntimeError> {
    let mut state = step(state)?;
    while !state.is_halted() {
        let entering = state.direction == Direction::Down
            && state.control.control().is_some_and(|control| control.seq.is_some());
        if entering {
            break;
        }
        state = step(&state)?;
    }
    Ok(state)
}

/// Step until halted, at most `limit` reductions
pub fn run(mut state: State, limit: Option<usize>) -> Result<State, RuntimeError> {
    let mut steps = 0;
    while !state.is_halted() {
        if let Some(limit) = limit {
            if steps >= limit {
                return Err(RuntimeError::StepLimitExceeded { limit });
            }
        }
        state = step(&state)?;
        steps += 1;
    }
    Ok(state)
}

/// A program being executed, with its history
///
/// Every coarse step (statement, step over, step out, run) records a
/// snapshot, so [`step_backward`](Interpreter::step_backward) and
/// [`rewind_to_start`](Interpreter::rewind_to_start) are just moves through
/// the history. Each coarse step starts a fresh memory-access log.
#[derive(Debug)]
pub struct Interpreter {
    state: State,
    history: History,
    history_position: usize,
    options: Options,
}

impl Interpreter {
    /// Bootstrap `program` and record the initial snapshot
    pub fn new(program: &Program, builtins: Builtins, options: Options) -> Result<Self, RuntimeError> {
        let state = start(program, builtins, &options)?;
        let mut history = History::new(options.snapshot_limit);
        history.push(state.clone())?;
        Ok(Interpreter {
            state,
            history,
            history_position: 0,
            options,
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Advance with `advance`, dropping any history ahead of the current
    /// position, and record the new state
    fn advance(&mut self, advance: impl FnOnce(&State) -> Result<State, RuntimeError>) -> Result<(), RuntimeError> {
        if self.state.is_halted() {
            return Err(RuntimeError::Halted);
        }
        let mut start = self.state.clone();
        start.memory_log.clear();
        let next = advance(&start)?;
        self.history.truncate(self.history_position + 1);
        self.history.push(next.clone())?;
        self.history_position += 1;
        self.state = next;
        Ok(())
    }

    /// Run to completion, honouring the configured step limit
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let limit = self.options.step_limit;
        self.advance(|state| run(state.clone(), limit))
    }

    pub fn step_into(&mut self) -> Result<(), RuntimeError> {
        self.advance(step_into)
    }

    pub fn step_over(&mut self) -> Result<(), RuntimeError> {
        self.advance(step_over)
    }

    pub fn step_out(&mut self) -> Result<(), RuntimeError> {
        self.advance(step_out)
    }

    pub fn step_expr(&mut self) -> Result<(), RuntimeError> {
        self.advance(step_expr)
    }

    /// Replay the next snapshot if there is one, otherwise step into
    pub fn step_forward(&mut self) -> Result<(), RuntimeError> {
        if let Some(snapshot) = self.history.get(self.history_position + 1) {
            self.state = snapshot.state.clone();
            self.history_position += 1;
            return Ok(());
        }
        self.step_into()
    }

    /// Go back one snapshot; false if already at the start
    pub fn step_backward(&mut self) -> bool {
        if self.history_position == 0 {
            return false;
        }
        self.history_position -= 1;
        if let Some(snapshot) = self.history.get(self.history_position) {
            self.state = snapshot.state.clone();
        }
        true
    }

    /// Rewind to the beginning of execution history
    pub fn rewind_to_start(&mut self) {
        self.history_position = 0;
        if let Some(snapshot) = self.history.get(0) {
            self.state = snapshot.state.clone();
        }
    }

    /// Get the current history position
    pub fn history_position(&self) -> usize {
        self.history_position
    }

    /// Get the total number of snapshots
    pub fn total_snapshots(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Check if execution has finished
    pub fn is_finished(&self) -> bool {
        self.state.is_halted()
    }

    /// The program's result once finished: `main`'s return value
    pub fn result(&self) -> Option<&Value> {
        if !self.is_finished() {
            return None;
        }
        self.state.result.as_ref().and_then(Outcome::as_value)
    }

    /// Memory as it was before the current coarse step, for diffing
    pub fn previous_memory(&self) -> Option<&Memory> {
        let previous = self.history_position.checked_sub(1)?;
        self.history.get(previous).map(|snapshot| &snapshot.state.memory)
    }
}
