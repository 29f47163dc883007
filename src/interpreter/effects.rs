//! Effects and their application
//!
//! Step functions never modify the state. They describe every change as an
//! [`Effect`], and [`apply_reduction`] applies those effects to a fresh copy
//! of the state. Application makes no decisions of its own; the only
//! failures are frame underflows and errors from memory itself.

use super::control::{Cont, Control, Outcome, Reduction};
use super::engine::{Direction, State};
use super::errors::RuntimeError;
use super::ops::cast::eval_cast;
use crate::ast::{Node, NodeId};
use crate::memory::stack;
use crate::memory::types::{resolve_incomplete_array, FunctionType, RecordDecl, RecordLayout, Type, TypeRef};
use crate::memory::value::{zero_value, BuiltinValue, FunctionValue, Init, PointerValue, Value};
use crate::memory::{AccessKind, LogEntry, Memory};
use std::rc::Rc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
pub enum Effect {
    /// Record a read through `reference`
    Load(PointerValue),
    Store(PointerValue, Value),
    /// Open a block frame for the node
    Enter(NodeId),
    /// Close the block frame opened for the node
    Leave(NodeId),
    /// Open a function frame holding the caller's continuation
    Call(Cont, Vec<Value>),
    /// Leave the current function, resuming its caller
    Return(Option<Value>),
    VarDecl {
        name: String,
        ty: TypeRef,
        init: Option<Init>,
    },
    /// A variable with static storage
    GlobalVarDecl {
        name: String,
        ty: TypeRef,
        init: Option<Init>,
    },
    FunDecl {
        name: String,
        ty: FunctionType,
        body: Option<Rc<Node>>,
        decl: Rc<Node>,
    },
    /// Register a record; no layout means a forward declaration
    RecDecl {
        name: String,
        layout: Option<RecordLayout>,
    },
    /// Hand a call to the native function registered under `name`
    BuiltinCall {
        name: String,
        cont: Rc<Control>,
        values: Vec<Value>,
    },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Load(_) => "load",
            Effect::Store(..) => "store",
            Effect::Enter(_) => "enter",
            Effect::Leave(_) => "leave",
            Effect::Call(..) => "call",
            Effect::Return(_) => "return",
            Effect::VarDecl { .. } => "vardecl",
            Effect::GlobalVarDecl { .. } => "globalvardecl",
            Effect::FunDecl { .. } => "fundecl",
            Effect::RecDecl { .. } => "recdecl",
            Effect::BuiltinCall { .. } => "builtin",
        }
    }
}

/// Apply a reduction: control first, then effects, then the result
pub fn apply_reduction(state: &mut State, reduction: Reduction) -> Result<(), RuntimeError> {
    if let Some(control) = reduction.control {
        state.control = control;
        state.direction = Direction::Down;
        state.result = None;
    }
    for effect in reduction.effects {
        apply(state, effect)?;
    }
    if let Some(result) = reduction.result {
        state.result = Some(result);
        state.direction = Direction::Up;
    }
    Ok(())
}

pub fn apply(state: &mut State, effect: Effect) -> Result<(), RuntimeError> {
    trace!(effect = effect.name(), "apply");
    match effect {
        Effect::Load(reference) => {
            state.memory_log.push(LogEntry {
                kind: AccessKind::Load,
                reference,
                value: None,
            });
        }
        Effect::Store(reference, value) => store(state, reference, value)?,
        Effect::Enter(node) => {
            state.scope = stack::declare_block(&state.scope, node);
        }
        Effect::Leave(node) => {
            state.scope = stack::leave(&state.scope, node).inspect_err(|_| {
                warn!(node, key = state.scope.key, "leave without a matching block frame");
            })?;
        }
        Effect::Call(cont, values) => {
            state.scope = stack::declare_function_call(&state.scope, cont, values);
        }
        Effect::Return(value) => {
            let (scope, cont, values) = stack::leave_function(&state.scope).inspect_err(|_| {
                warn!(key = state.scope.key, "return without a function frame");
            })?;
            let is_main = values.first().and_then(Value::callee_name) == Some("main");
            state.scope = scope;
            state.control = cont;
            state.result = Some(match value {
                Some(value) => Outcome::Value(value),
                None if is_main => Outcome::Value(Value::int(0)),
                None => Outcome::Void,
            });
            state.direction = Direction::Out;
        }
        Effect::VarDecl { name, ty, init } => {
            let (ty, value) = finalize_var_decl(&ty, init, &state.memory)?;
            let (scope, reference, needs_store) =
                stack::declare_variable(&state.scope, &name, ty, value.as_ref())?;
            if scope.limit < state.heap_start {
                return Err(RuntimeError::StackOverflow { name });
            }
            state.scope = scope;
            if let (true, Some(value)) = (needs_store, value) {
                store(state, reference, value)?;
            }
        }
        Effect::GlobalVarDecl { name, ty, init } => {
            let (ty, value) = finalize_var_decl(&ty, init, &state.memory)?;
            let reference = match (&*ty, value.as_ref()) {
                (Type::Array(_), Some(Value::Pointer(storage))) => {
                    PointerValue::new(ty.clone(), storage.address)
                }
                _ => {
                    let reference = PointerValue::new(ty.clone(), state.heap_start);
                    state.heap_start += ty.size() as u64;
                    if state.heap_start > state.scope.limit {
                        return Err(RuntimeError::MemoryFault {
                            address: reference.address,
                            size: ty.size(),
                        });
                    }
                    state.memory = state.memory.write(&reference, value.as_ref())?;
                    reference
                }
            };
            debug!(%name, ty = %ty, address = reference.address, "global variable");
            Rc::make_mut(&mut state.global_map).insert(name, Value::Pointer(reference));
        }
        Effect::FunDecl { name, ty, body, decl } => {
            let code = state.functions.len();
            let value = match body {
                Some(body) => Value::Function(Rc::new(FunctionValue {
                    name: name.clone(),
                    code,
                    ty,
                    body,
                    decl,
                })),
                None => {
                    let native = state
                        .builtins
                        .get(&name)
                        .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.clone() })?;
                    Value::Builtin(Rc::new(BuiltinValue {
                        name: name.clone(),
                        code,
                        ty,
                        native,
                    }))
                }
            };
            debug!(%name, code, "function");
            Rc::make_mut(&mut state.functions).push(value.clone());
            Rc::make_mut(&mut state.global_map).insert(name, value);
        }
        Effect::RecDecl { name, layout } => {
            let decls = Rc::make_mut(&mut state.record_decls);
            match layout {
                None => {
                    decls
                        .entry(name.clone())
                        .or_insert_with(|| RecordDecl::forward(name));
                }
                Some(layout) => {
                    let completed = decls
                        .get(&name)
                        .is_some_and(|existing| existing.define(layout.clone()));
                    if !completed {
                        decls.insert(name.clone(), RecordDecl::complete(name.clone(), layout));
                    }
                    debug!(%name, "record");
                }
            }
        }
        Effect::BuiltinCall { name, cont, values } => {
            let native = state
                .builtins
                .get(&name)
                .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.clone() })?;
            let reduction = native.call(state, &cont, &values)?;
            apply_reduction(state, reduction)?;
        }
    }
    Ok(())
}

fn store(state: &mut State, reference: PointerValue, value: Value) -> Result<(), RuntimeError> {
    state.memory = state.memory.write(&reference, Some(&value))?;
    state.memory_log.push(LogEntry {
        kind: AccessKind::Store,
        reference,
        value: Some(value),
    });
    Ok(())
}

/// Complete a declared type against its initializer and build the value to store
///
/// Incomplete array counts come from the initializer's shape; composites
/// are zero-filled past the end of the initializer. An array initialized
/// from a pointer (a string literal) keeps the pointer so the declaration
/// can alias that storage, unless the array is larger than the storage, in
/// which case the pointed-to bytes are copied.
pub fn finalize_var_decl(
    ty: &TypeRef,
    init: Option<Init>,
    memory: &Memory,
) -> Result<(TypeRef, Option<Value>), RuntimeError> {
    let incomplete = |ty: &TypeRef| RuntimeError::IncompleteType { ty: ty.to_string() };
    match init {
        None => {
            if !ty.is_complete() {
                return Err(incomplete(ty));
            }
            Ok((ty.clone(), None))
        }
        Some(Init::Value(Value::Pointer(storage))) if ty.is_array() => {
            let orig = storage.ty.orig.clone();
            let dims: Vec<usize> = match orig.as_deref() {
                Some(Type::Array(array)) => array.count.into_iter().collect(),
                _ => Vec::new(),
            };
            let resolved = resolve_incomplete_array(ty, &dims);
            if !resolved.is_complete() {
                return Err(incomplete(&resolved));
            }
            match orig {
                Some(orig) if orig.size() < resolved.size() => {
                    let source = memory.read(&PointerValue::new(orig, storage.address))?;
                    let Value::Array { elements, .. } = source else {
                        return Err(incomplete(&resolved));
                    };
                    let items = elements.into_iter().map(Init::Value).collect();
                    let value = build(&resolved, Some(&Init::List(items)))?;
                    Ok((resolved, Some(value)))
                }
                _ => Ok((resolved, Some(Value::Pointer(storage)))),
            }
        }
        Some(init @ Init::List(_)) => {
            let resolved = if ty.is_array() {
                resolve_incomplete_array(ty, &init.dims())
            } else {
                ty.clone()
            };
            if !resolved.is_complete() {
                return Err(incomplete(&resolved));
            }
            let value = build(&resolved, Some(&init))?;
            Ok((resolved, Some(value)))
        }
        Some(Init::Value(value)) => {
            if !ty.is_complete() {
                return Err(incomplete(ty));
            }
            Ok((ty.clone(), Some(coerce(ty, value)?)))
        }
    }
}

fn build(ty: &TypeRef, init: Option<&Init>) -> Result<Value, RuntimeError> {
    match (&**ty, init) {
        (_, None) => zero_value(ty),
        (Type::Array(array), Some(Init::List(items))) => {
            let count = array
                .count
                .ok_or_else(|| RuntimeError::IncompleteType { ty: ty.to_string() })?;
            let elements = (0..count)
                .map(|index| build(&array.elem, items.get(index)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array {
                elem: array.elem.clone(),
                elements,
            })
        }
        (Type::Record(decl), Some(Init::List(items))) => {
            let layout = decl
                .layout()
                .ok_or_else(|| RuntimeError::IncompleteType { ty: ty.to_string() })?;
            let mut fields = rustc_hash::FxHashMap::default();
            for (index, field) in layout.fields.iter().enumerate() {
                fields.insert(field.name.clone(), build(&field.ty, items.get(index))?);
            }
            Ok(Value::Record {
                decl: decl.clone(),
                fields,
            })
        }
        // `int x = {5};`
        (_, Some(Init::List(items))) => build(ty, items.first()),
        (_, Some(Init::Value(value))) => coerce(ty, value.clone()),
    }
}

/// Convert a scalar or pointer initializer to the declared type
pub(crate) fn coerce(ty: &TypeRef, value: Value) -> Result<Value, RuntimeError> {
    match &**ty {
        Type::Scalar(_) | Type::Pointer(_) if value.ty() != *ty => eval_cast(ty, &value),
        _ => Ok(value),
    }
}
