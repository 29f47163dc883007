//! Expression steps
//!
//! Calls, casts, names, literals, `sizeof`, initializer lists and the
//! conditional operator. Operators live in [`ops`](super::ops).
//!
//! # Modes
//!
//! Every expression can be evaluated in three modes (see [`Mode`]): for its
//! value, as an lvalue (a reference to the designated object), or for its
//! type only. Type mode never evaluates anything with side effects, which
//! is what `sizeof` relies on.

use super::control::{
    enter, enter_expr, enter_stmt, Acc, Cont, Control, Mode, Outcome, Phase, Reduction, Seq,
    StepResult,
};
use super::effects::Effect;
use super::engine::State;
use super::errors::RuntimeError;
use super::ops::access::access;
use super::ops::cast::eval_cast;
use crate::ast::Node;
use crate::memory::types::{FunctionType, Scalar, Type, TypeRef};
use crate::memory::value::{FunctionValue, Init, PointerValue, Value};
use std::rc::Rc;

fn child<'a>(control: &'a Control, index: usize) -> Result<&'a Rc<Node>, RuntimeError> {
    control
        .node
        .child(index)
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, format!("missing child {}", index)))
}

fn result(state: &State, control: &Control) -> Result<Outcome, RuntimeError> {
    state
        .result
        .clone()
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, "operand produced nothing"))
}

/// `(expr)`; also default arguments, which wrap their expression the same way
pub fn step_paren(state: &State, control: &Control) -> StepResult {
    match control.index() {
        0 => Ok(Reduction::to(enter_expr(child(control, 0)?, control.at(1)).with_mode(control.mode))),
        _ => Ok(Reduction::done(&control.cont, result(state, control)?)),
    }
}

fn function_type(ty: &TypeRef) -> Option<&FunctionType> {
    match &**ty {
        Type::Function(function) => Some(function),
        Type::Pointer(p) => match &*p.pointee {
            Type::Function(function) => Some(function),
            _ => None,
        },
        _ => None,
    }
}

/// `callee(args...)`
///
/// The callee and arguments are evaluated left to right into
/// [`Acc::Values`]. A call to a program function opens a frame, declares the
/// parameters and runs the body; a builtin is handed the call through a
/// [`Effect::BuiltinCall`]. Either way the call resumes at [`Phase::Catch`]
/// with the result.
pub fn step_call(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    match control.step {
        Phase::Catch => {
            let outcome = state.result.clone().unwrap_or(Outcome::Void);
            return Ok(Reduction::done(&control.cont, outcome));
        }
        Phase::FallOff => return Ok(Reduction::effects(vec![Effect::Return(None)])),
        Phase::At(_) => {}
    }

    if control.mode == Mode::Type {
        if control.index() == 0 {
            return Ok(Reduction::to(enter_expr(child(control, 0)?, control.at(1)).with_mode(Mode::Type)));
        }
        let callee = state.type_result(control)?;
        let function = function_type(&callee)
            .ok_or_else(|| RuntimeError::invalid(&node.kind, format!("{} is not callable", callee)))?;
        return Ok(Reduction::done(&control.cont, Outcome::Type(function.result.clone())));
    }

    let step = control.index();
    let mut values = match &control.acc {
        Acc::Values(values) if step > 0 => values.clone(),
        _ => Vec::new(),
    };
    if step > 0 {
        values.push(state.value(control)?);
    }
    if let Some(next) = node.children.get(step) {
        let cont = control.at(step + 1).with_acc(Acc::Values(values));
        return Ok(Reduction::to(enter_expr(next, cont)));
    }

    let callee = match values.first() {
        Some(Value::Pointer(p)) if matches!(**p.pointee(), Type::Function(_)) => state
            .functions
            .get(p.address as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                name: format!("0x{:x}", p.address),
            })?,
        Some(value) => value.clone(),
        None => return Err(RuntimeError::invalid(&node.kind, "call without a callee")),
    };
    values[0] = callee.clone();

    match callee {
        Value::Function(function) => call_function(control, &function, values),
        Value::Builtin(builtin) => {
            let catch = Rc::new(
                control
                    .clone()
                    .with_phase(Phase::Catch)
                    .with_seq(Seq::Expr)
                    .with_acc(Acc::Values(values.clone())),
            );
            Ok(Reduction {
                control: Some(Cont::Resume(catch.clone())),
                result: None,
                effects: vec![Effect::BuiltinCall {
                    name: builtin.name.clone(),
                    cont: catch,
                    values,
                }],
            })
        }
        other => Err(RuntimeError::invalid(
            &node.kind,
            format!("called object of type {} is not a function", other.ty()),
        )),
    }
}

fn call_function(control: &Control, function: &FunctionValue, values: Vec<Value>) -> StepResult {
    let catch = control
        .clone()
        .with_phase(Phase::Catch)
        .with_acc(Acc::Values(values.clone()));
    let mut effects = vec![Effect::Call(catch.into_cont(), values.clone())];
    for (index, param) in function.ty.params.iter().enumerate() {
        effects.push(Effect::VarDecl {
            name: param.name.clone(),
            ty: param.ty.clone(),
            init: values.get(index + 1).cloned().map(Init::Value),
        });
    }
    let fall_off = control.clone().with_phase(Phase::FallOff);
    let body = enter_stmt(&function.body, fall_off);
    Ok(Reduction {
        control: Some(body.into_cont()),
        result: None,
        effects,
    })
}

/// Shared tail of both cast kinds: the target type is known, the operand
/// has been evaluated
fn finish_cast(state: &State, control: &Control, ty: &TypeRef) -> StepResult {
    if control.mode == Mode::Lvalue {
        return Ok(Reduction::done(&control.cont, result(state, control)?));
    }
    if matches!(**ty, Type::Void) {
        return Ok(Reduction::done(&control.cont, Outcome::Void));
    }
    let value = eval_cast(ty, &state.value(control)?)?;
    Ok(Reduction::value(&control.cont, value))
}

/// Implicit conversion, `[expr, type]`
///
/// The target type is evaluated first. The operand keeps the cast's mode,
/// so an implicit cast is transparent to lvalue evaluation.
pub fn step_implicit_cast(state: &State, control: &Control) -> StepResult {
    match (control.index(), &control.acc) {
        (0, _) => Ok(Reduction::to(enter(child(control, 1)?, control.at(1)))),
        (1, _) => {
            let ty = state.type_result(control)?;
            if control.mode == Mode::Type {
                return Ok(Reduction::done(&control.cont, Outcome::Type(ty)));
            }
            let next = control.at(2).with_acc(Acc::Type(ty));
            Ok(Reduction::to(enter_expr(child(control, 0)?, next).with_mode(control.mode)))
        }
        (_, Acc::Type(ty)) => finish_cast(state, control, ty),
        _ => Err(RuntimeError::invalid(&control.node.kind, "lost the target type")),
    }
}

/// Explicit cast, `[type, expr]`
pub fn step_explicit_cast(state: &State, control: &Control) -> StepResult {
    match (control.index(), &control.acc) {
        (0, _) => Ok(Reduction::to(enter(child(control, 0)?, control.at(1)))),
        (1, _) => {
            let ty = state.type_result(control)?;
            if control.mode == Mode::Type {
                return Ok(Reduction::done(&control.cont, Outcome::Type(ty)));
            }
            let next = control.at(2).with_acc(Acc::Type(ty));
            Ok(Reduction::to(enter_expr(child(control, 1)?, next)))
        }
        (_, Acc::Type(ty)) => finish_cast(state, control, ty),
        _ => Err(RuntimeError::invalid(&control.node.kind, "lost the target type")),
    }
}

/// A name: variable, global or function
pub fn step_decl_ref(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let name = node
        .identifier()
        .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing identifier"))?;
    match state.find_declaration(&name)? {
        Value::Pointer(reference) => access(state, control, reference),
        callable => match control.mode {
            Mode::Type => Ok(Reduction::done(&control.cont, Outcome::Type(callable.ty()))),
            _ => Ok(Reduction::value(&control.cont, callable)),
        },
    }
}

fn literal(control: &Control, value: Value) -> StepResult {
    match control.mode {
        Mode::Type => Ok(Reduction::done(&control.cont, Outcome::Type(value.ty()))),
        _ => Ok(Reduction::value(&control.cont, value)),
    }
}

fn literal_text(control: &Control) -> Result<String, RuntimeError> {
    control
        .node
        .attr_str("value")
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, "missing value"))
}

/// Parse a C integer literal, picking its type from the suffix and
/// magnitude (`int` is 32 bits, `long` 32, `long long` 64)
pub fn parse_integer_literal(text: &str) -> Result<Value, String> {
    let lower = text.trim().to_ascii_lowercase();
    let digits = lower.trim_end_matches(['u', 'l']);
    let suffix = &lower[digits.len()..];
    let (radix, digits) = if let Some(hex) = digits.strip_prefix("0x") {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    let number = u64::from_str_radix(digits, radix)
        .map_err(|err| format!("invalid integer literal {:?}: {}", text, err))?;

    let unsigned = suffix.contains('u');
    let long = suffix.contains('l');
    let long_long = suffix.contains("ll");
    let fits_signed = number <= i32::MAX as u64;
    let fits_unsigned = number <= u32::MAX as u64;
    let non_decimal = radix != 10;
    let scalar = match (unsigned, long_long, long) {
        (_, true, _) if unsigned || (non_decimal && number > i64::MAX as u64) => Scalar::ULongLong,
        (_, true, _) => Scalar::LongLong,
        (true, _, true) if fits_unsigned => Scalar::ULong,
        (true, _, false) if fits_unsigned => Scalar::UInt,
        (true, _, _) => Scalar::ULongLong,
        (false, _, true) if fits_signed => Scalar::Long,
        (false, _, true) if non_decimal && fits_unsigned => Scalar::ULong,
        (false, _, false) if fits_signed => Scalar::Int,
        (false, _, false) if non_decimal && fits_unsigned => Scalar::UInt,
        _ if number <= i64::MAX as u64 => Scalar::LongLong,
        _ => Scalar::ULongLong,
    };
    Ok(Value::integral(scalar, number as i128))
}

pub fn step_integer_literal(_state: &State, control: &Control) -> StepResult {
    let text = literal_text(control)?;
    let value = parse_integer_literal(&text)
        .map_err(|message| RuntimeError::invalid(&control.node.kind, message))?;
    literal(control, value)
}

/// Character literals carry their code, either as a number or quoted
pub fn step_character_literal(_state: &State, control: &Control) -> StepResult {
    let text = literal_text(control)?;
    let code = match text.parse::<i64>() {
        Ok(code) => code,
        Err(_) => {
            let inner = text.trim_matches('\'');
            let mut chars = inner.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c as i64,
                _ => {
                    return Err(RuntimeError::invalid(
                        &control.node.kind,
                        format!("invalid character {}", text),
                    ))
                }
            }
        }
    };
    literal(control, Value::integral(Scalar::Char, code as i128))
}

/// `1.5` is a double, `1.5f` a float
pub fn step_floating_literal(_state: &State, control: &Control) -> StepResult {
    let text = literal_text(control)?;
    let scalar = if text.ends_with(['f', 'F']) {
        Scalar::Float
    } else {
        Scalar::Double
    };
    let number: f64 = text
        .trim_end_matches(['f', 'F', 'l', 'L'])
        .parse()
        .map_err(|_| {
            RuntimeError::invalid(&control.node.kind, format!("invalid floating literal {}", text))
        })?;
    literal(control, Value::floating(scalar, number))
}

/// String literals were placed in static storage at start-up
pub fn step_string_literal(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let storage = state
        .literals
        .get(&node.id)
        .ok_or_else(|| RuntimeError::invalid(&node.kind, "string literal without storage"))?;
    let array = storage.ty.orig.clone().unwrap_or_else(|| storage.pointee().clone());
    match control.mode {
        Mode::Value => Ok(Reduction::value(&control.cont, Value::Pointer(storage.clone()))),
        Mode::Lvalue => {
            let reference = PointerValue::new(array, storage.address);
            Ok(Reduction::value(&control.cont, Value::Pointer(reference)))
        }
        Mode::Type => Ok(Reduction::done(&control.cont, Outcome::Type(array))),
    }
}

/// `sizeof`: the operand is only evaluated for its type
pub fn step_sizeof(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    if let Some(name) = node.attr_str("name") {
        if name != "sizeof" {
            return Err(RuntimeError::NotImplemented { feature: name });
        }
    }
    if control.mode == Mode::Type {
        return Ok(Reduction::done(&control.cont, Outcome::Type(Type::int())));
    }
    if control.index() == 0 {
        return Ok(Reduction::to(enter_expr(child(control, 0)?, control.at(1)).with_mode(Mode::Type)));
    }
    let ty = state.type_result(control)?;
    if !ty.is_complete() {
        return Err(RuntimeError::IncompleteType { ty: ty.to_string() });
    }
    Ok(Reduction::value(&control.cont, Value::int(ty.size() as i64)))
}

/// `{a, b, {c, d}}`: elements are collected as [`Init`] trees
pub fn step_init_list(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let step = control.index();

    if control.mode == Mode::Type {
        if step == 0 {
            return Ok(Reduction::to(enter_expr(child(control, 0)?, control.at(1)).with_mode(Mode::Type)));
        }
        let elem = state.type_result(control)?;
        let ty = Type::array_of(elem, Some(node.children.len()));
        return Ok(Reduction::done(&control.cont, Outcome::Type(ty)));
    }

    let mut items = match &control.acc {
        Acc::Inits(items) if step > 0 => items.clone(),
        _ => Vec::new(),
    };
    if step > 0 {
        items.push(match result(state, control)? {
            Outcome::Value(value) => Init::Value(value),
            Outcome::InitList(list) => Init::List(list),
            _ => return Err(RuntimeError::invalid(&node.kind, "element produced no value")),
        });
    }
    match node.children.get(step) {
        Some(next) => {
            let cont = control.at(step + 1).with_acc(Acc::Inits(items));
            Ok(Reduction::to(enter_expr(next, cont)))
        }
        None => Ok(Reduction::done(&control.cont, Outcome::InitList(items))),
    }
}

/// `cond ? a : b`
pub fn step_conditional(state: &State, control: &Control) -> StepResult {
    if control.mode == Mode::Type {
        return match control.index() {
            0 => Ok(Reduction::to(enter_expr(child(control, 1)?, control.at(1)).with_mode(Mode::Type))),
            _ => Ok(Reduction::done(&control.cont, result(state, control)?)),
        };
    }
    match control.index() {
        0 => Ok(Reduction::to(enter_expr(child(control, 0)?, control.at(1)))),
        1 => {
            let branch = if state.value(control)?.to_bool() { 1 } else { 2 };
            Ok(Reduction::to(enter_expr(child(control, branch)?, control.at(2))))
        }
        _ => Ok(Reduction::done(&control.cont, result(state, control)?)),
    }
}
