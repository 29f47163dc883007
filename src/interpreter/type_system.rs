//! Type nodes and the declarations built from them
//!
//! Type nodes evaluate to [`Outcome::Type`] whatever mode they are entered
//! in. Function and record declarations evaluate their types first and
//! then register themselves through an effect.
//!
//! # Type Rules
//!
//! - Builtin names map to [`Scalar`]s; `void` is [`Type::Void`]
//! - Sugar (`ParenType`, `ElaboratedType`, `TypedefType`) is transparent
//! - A variable-length array evaluates its size expression at run time
//! - A function type with no result child returns `int`
//! - Unions are not supported

use super::control::{enter, enter_expr, Acc, Control, Outcome, Reduction, StepResult};
use super::effects::Effect;
use super::engine::State;
use super::errors::RuntimeError;
use crate::ast::Node;
use crate::memory::types::{decay, layout_record, FunctionType, Param, Scalar, Type, TypeRef};
use std::rc::Rc;

fn child<'a>(control: &'a Control, index: usize) -> Result<&'a Rc<Node>, RuntimeError> {
    control
        .node
        .child(index)
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, format!("missing child {}", index)))
}

fn name_of(control: &Control) -> Result<String, RuntimeError> {
    control
        .node
        .attr_str("name")
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, "missing name"))
}

fn typed(control: &Control, ty: TypeRef) -> StepResult {
    Ok(Reduction::done(&control.cont, Outcome::Type(ty)))
}

/// Evaluate child 0 as a type, then finish with `f` applied to it
fn wrap_type(state: &State, control: &Control, f: impl FnOnce(TypeRef) -> TypeRef) -> StepResult {
    match control.index() {
        0 => Ok(Reduction::to(enter(child(control, 0)?, control.at(1)))),
        _ => typed(control, f(state.type_result(control)?)),
    }
}

pub fn step_builtin_type(_state: &State, control: &Control) -> StepResult {
    let name = name_of(control)?;
    let ty = match name.as_str() {
        "void" => Type::void(),
        _ => Type::scalar(Scalar::from_name(&name).ok_or_else(|| RuntimeError::NotImplemented {
            feature: format!("builtin type {}", name),
        })?),
    };
    typed(control, ty)
}

pub fn step_pointer_type(state: &State, control: &Control) -> StepResult {
    wrap_type(state, control, Type::pointer_to)
}

pub fn step_constant_array_type(state: &State, control: &Control) -> StepResult {
    let size = control
        .node
        .attr_str("size")
        .and_then(|size| size.parse::<usize>().ok())
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, "missing array size"))?;
    wrap_type(state, control, |elem| Type::array_of(elem, Some(size)))
}

pub fn step_incomplete_array_type(state: &State, control: &Control) -> StepResult {
    wrap_type(state, control, |elem| Type::array_of(elem, None))
}

/// `T[n]` with `n` computed at run time
///
/// Steps: 0 element type, 1 size expression, 2 build.
pub fn step_variable_array_type(state: &State, control: &Control) -> StepResult {
    match (control.index(), &control.acc) {
        (0, _) => Ok(Reduction::to(enter(child(control, 0)?, control.at(1)))),
        (1, _) => {
            let elem = state.type_result(control)?;
            let next = control.at(2).with_acc(Acc::Type(elem));
            Ok(Reduction::to(enter_expr(child(control, 1)?, next)))
        }
        (_, Acc::Type(elem)) => {
            let count = state
                .value(control)?
                .to_integer()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    RuntimeError::invalid(&control.node.kind, "array size must be a non-negative integer")
                })?;
            typed(control, Type::array_of(elem.clone(), Some(count)))
        }
        _ => Err(RuntimeError::invalid(&control.node.kind, "lost the element type")),
    }
}

/// `result(params...)`
///
/// Child 0 is the result type; the rest are parameter declarations.
pub fn step_function_type(state: &State, control: &Control) -> StepResult {
    let step = control.index();
    let (mut result, mut params) = match &control.acc {
        Acc::Signature { result, params } => (result.clone(), params.clone()),
        _ => (Type::int(), Vec::new()),
    };
    if step == 1 {
        result = state.type_result(control)?;
    } else if step > 1 {
        params.push(match &state.result {
            Some(Outcome::Param(param)) => param.clone(),
            Some(Outcome::Type(ty)) => Param {
                name: String::new(),
                ty: ty.clone(),
            },
            _ => {
                return Err(RuntimeError::invalid(&control.node.kind, "parameter produced no type"))
            }
        });
    }
    match control.node.children.get(step) {
        Some(next) => {
            let cont = control.at(step + 1).with_acc(Acc::Signature { result, params });
            Ok(Reduction::to(enter(next, cont)))
        }
        None => typed(
            control,
            Rc::new(Type::Function(FunctionType { result, params })),
        ),
    }
}

pub fn step_paren_type(state: &State, control: &Control) -> StepResult {
    wrap_type(state, control, |ty| ty)
}

/// Parameter types written as arrays or functions are pointers
pub fn step_decayed_type(state: &State, control: &Control) -> StepResult {
    wrap_type(state, control, |ty| decay(&ty))
}

pub fn step_record_type(state: &State, control: &Control) -> StepResult {
    if control.node.attr_str("tagUsed").as_deref() == Some("union") {
        return Err(RuntimeError::NotImplemented {
            feature: "union".to_string(),
        });
    }
    let name = name_of(control)?;
    let decl = state
        .record_decls
        .get(&name)
        .cloned()
        .ok_or(RuntimeError::UndeclaredRecord { name })?;
    typed(control, Rc::new(Type::Record(decl)))
}

/// `ParmVarDecl` and `FieldDecl`: a name and a type
pub fn step_param(state: &State, control: &Control) -> StepResult {
    match control.index() {
        0 => Ok(Reduction::to(enter(child(control, 0)?, control.at(1)))),
        _ => {
            let param = Param {
                name: control.node.attr_str("name").unwrap_or_default(),
                ty: state.type_result(control)?,
            };
            Ok(Reduction::done(&control.cont, Outcome::Param(param)))
        }
    }
}

/// `[Name, type, body?]`
///
/// A prototype of a function the program defines is skipped. Any other
/// declaration without a body binds the builtin of the same name.
pub fn step_function_decl(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let name = node
        .identifier()
        .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing name"))?;
    let define = node.flag("define");

    if control.index() == 0 {
        if !define && state.defined.contains(&name) {
            return Ok(Reduction::done(&control.cont, Outcome::Void));
        }
        if !define && !state.builtins.contains(&name) {
            return Err(RuntimeError::UndefinedFunction { name });
        }
        return Ok(Reduction::to(enter(child(control, 1)?, control.at(1))));
    }

    let ty = state.type_result(control)?;
    let Type::Function(ty) = &*ty else {
        return Err(RuntimeError::invalid(&node.kind, format!("{} is not a function type", ty)));
    };
    let body = if define { Some(child(control, 2)?.clone()) } else { None };
    let effect = Effect::FunDecl {
        name,
        ty: ty.clone(),
        body,
        decl: node.clone(),
    };
    Ok(Reduction::done(&control.cont, Outcome::Void).with_effect(effect))
}

/// `struct name { fields... }`, or a forward declaration without fields
///
/// The name is registered before the fields are evaluated, so a field may
/// point to the record being defined.
pub fn step_record_decl(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    if node.attr_str("tagUsed").as_deref() == Some("union") {
        return Err(RuntimeError::NotImplemented {
            feature: "union".to_string(),
        });
    }
    let name = name_of(control)?;
    let step = control.index();
    let mut effects = Vec::new();
    if step == 0 && !state.record_decls.contains_key(&name) {
        effects.push(Effect::RecDecl {
            name: name.clone(),
            layout: None,
        });
    }

    let mut fields = match &control.acc {
        Acc::Fields(fields) => fields.clone(),
        _ => Vec::new(),
    };
    // Nested record definitions produce no field
    if let (true, Some(Outcome::Param(field))) = (step > 0, &state.result) {
        fields.push(field.clone());
    }
    if let Some(next) = node.children.get(step) {
        let cont = control.at(step + 1).with_acc(Acc::Fields(fields));
        return Ok(Reduction {
            control: Some(enter(next, cont).into_cont()),
            result: None,
            effects,
        });
    }
    if step > 0 {
        effects.push(Effect::RecDecl {
            name,
            layout: Some(layout_record(&fields)),
        });
    }
    Ok(Reduction {
        control: Some(control.cont.clone()),
        result: Some(Outcome::Void),
        effects,
    })
}
