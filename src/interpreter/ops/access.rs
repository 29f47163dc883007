//! Designators: member access, subscripts, `&` and `*`
//!
//! These all compute a reference (a [`PointerValue`] to the designated
//! object) and then finish through [`access`], which turns the reference
//! into what the requested mode asks for.

use crate::ast::Node;
use crate::interpreter::control::{enter_expr, Acc, Control, Mode, Outcome, Reduction, StepResult};
use crate::interpreter::effects::Effect;
use crate::interpreter::engine::State;
use crate::interpreter::errors::RuntimeError;
use crate::memory::types::{Type, TypeRef};
use crate::memory::value::{PointerValue, Value};
use std::rc::Rc;

/// Finish a designator in the control's mode
///
/// - lvalue: the reference itself
/// - type: the referenced type
/// - value: arrays decay without a load, anything else is read and logged
pub(crate) fn access(state: &State, control: &Control, reference: PointerValue) -> StepResult {
    match control.mode {
        Mode::Lvalue => Ok(Reduction::value(&control.cont, Value::Pointer(reference))),
        Mode::Type => Ok(Reduction::done(&control.cont, Outcome::Type(reference.pointee().clone()))),
        Mode::Value if reference.pointee().is_array() => {
            Ok(Reduction::value(&control.cont, Value::Pointer(reference.decayed())))
        }
        Mode::Value => {
            let value = state.read(&reference)?;
            Ok(Reduction::value(&control.cont, value).with_effect(Effect::Load(reference)))
        }
    }
}

/// Element type of a pointer or array type
fn element_type(ty: &TypeRef) -> Option<TypeRef> {
    match &**ty {
        Type::Pointer(p) => Some(p.pointee.clone()),
        Type::Array(a) => Some(a.elem.clone()),
        _ => None,
    }
}

fn operand<'a>(control: &'a Control, index: usize) -> Result<&'a Rc<Node>, RuntimeError> {
    control
        .node
        .child(index)
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, "missing operand"))
}

fn field_of(decl_ty: &TypeRef, name: &str) -> Result<(TypeRef, usize), RuntimeError> {
    let Type::Record(decl) = &**decl_ty else {
        return Err(RuntimeError::invalid("MemberExpr", format!("{} is not a record", decl_ty)));
    };
    if !decl.is_complete() {
        return Err(RuntimeError::IncompleteType {
            ty: decl_ty.to_string(),
        });
    }
    let field = decl.field(name).ok_or_else(|| RuntimeError::MissingField {
        record: decl.name.clone(),
        field: name.to_string(),
    })?;
    Ok((field.ty.clone(), field.offset))
}

/// `s.field` and `p->field`
///
/// The object of `.` is evaluated as an lvalue and the pointer of `->` as a
/// value; either way the field is at a fixed offset from it.
pub fn step_member(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let arrow = node.flag("isArrow");
    let name = node
        .identifier()
        .or_else(|| node.attr_str("name"))
        .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing field name"))?;
    // Children are [Name, object]; tolerate a bare [object].
    let object_index = node.children.len().saturating_sub(1);

    if control.index() == 0 {
        let mode = match (control.mode, arrow) {
            (Mode::Type, _) => Mode::Type,
            (_, true) => Mode::Value,
            (_, false) => Mode::Lvalue,
        };
        let object = operand(control, object_index)?;
        return Ok(Reduction::to(enter_expr(object, control.at(1)).with_mode(mode)));
    }

    if control.mode == Mode::Type {
        let ty = state.type_result(control)?;
        let record = if arrow {
            element_type(&ty).ok_or_else(|| RuntimeError::invalid(&node.kind, "-> on a non-pointer"))?
        } else {
            ty
        };
        let (field_ty, _) = field_of(&record, &name)?;
        return Ok(Reduction::done(&control.cont, Outcome::Type(field_ty)));
    }

    match state.value(control)? {
        Value::Pointer(object) => {
            let (ty, offset) = field_of(object.pointee(), &name)?;
            access(state, control, PointerValue::new(ty, object.address).offset_bytes(offset as i128))
        }
        // `.` on a record rvalue such as a call result
        Value::Record { decl, fields } => {
            let value = fields.get(&name).cloned().ok_or_else(|| RuntimeError::MissingField {
                record: decl.name.clone(),
                field: name.clone(),
            })?;
            Ok(Reduction::value(&control.cont, value))
        }
        other => Err(RuntimeError::invalid(
            &node.kind,
            format!("member access on {}", other.ty()),
        )),
    }
}

/// `base[index]`, also written `index[base]`
///
/// Steps: 0 base, 1 index, 2 address the element.
pub fn step_subscript(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    if control.mode == Mode::Type {
        return match (control.index(), &control.acc) {
            (0, _) => {
                let base = operand(control, 0)?;
                Ok(Reduction::to(enter_expr(base, control.at(1)).with_mode(Mode::Type)))
            }
            (1, _) => {
                let first = state.type_result(control)?;
                let next = control.at(2).with_acc(Acc::Type(first));
                Ok(Reduction::to(enter_expr(operand(control, 1)?, next).with_mode(Mode::Type)))
            }
            (_, Acc::Type(first)) => {
                let second = state.type_result(control)?;
                let elem = element_type(first)
                    .or_else(|| element_type(&second))
                    .ok_or_else(|| RuntimeError::invalid(&node.kind, "subscript of a non-pointer"))?;
                Ok(Reduction::done(&control.cont, Outcome::Type(elem)))
            }
            _ => Err(RuntimeError::invalid(&node.kind, "lost the base type")),
        };
    }

    match control.index() {
        0 => Ok(Reduction::to(enter_expr(operand(control, 0)?, control.at(1)))),
        1 => {
            let base = state.value(control)?;
            let next = control.at(2).with_acc(Acc::Lhs(base));
            Ok(Reduction::to(enter_expr(operand(control, 1)?, next)))
        }
        _ => {
            let Acc::Lhs(first) = &control.acc else {
                return Err(RuntimeError::invalid(&node.kind, "lost the base"));
            };
            let second = state.value(control)?;
            let (base, index) = match (first, &second) {
                (Value::Pointer(base), index) => (base, index),
                (index, Value::Pointer(base)) => (base, index),
                _ => return Err(RuntimeError::invalid(&node.kind, "subscript of a non-pointer")),
            };
            let index = index
                .to_integer()
                .ok_or_else(|| RuntimeError::invalid(&node.kind, "non-integral subscript"))?;
            let elem = base.pointee().clone();
            let element = PointerValue::new(elem.clone(), base.address).offset_bytes(index * elem.size() as i128);
            access(state, control, element)
        }
    }
}

/// `&operand`
pub fn step_addr_of(state: &State, control: &Control) -> StepResult {
    if control.index() == 0 {
        let mode = match control.mode {
            Mode::Type => Mode::Type,
            _ => Mode::Lvalue,
        };
        return Ok(Reduction::to(enter_expr(operand(control, 0)?, control.at(1)).with_mode(mode)));
    }
    if control.mode == Mode::Type {
        let ty = state.type_result(control)?;
        return Ok(Reduction::done(&control.cont, Outcome::Type(Type::pointer_to(ty))));
    }
    // The reference, or a function designator, is already the address.
    Ok(Reduction::value(&control.cont, state.value(control)?))
}

/// `*operand`
///
/// The operand is always evaluated as a value: the pointer it yields is
/// the reference to the designated object.
pub fn step_deref(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    if control.index() == 0 {
        let mode = match control.mode {
            Mode::Type => Mode::Type,
            _ => Mode::Value,
        };
        return Ok(Reduction::to(enter_expr(operand(control, 0)?, control.at(1)).with_mode(mode)));
    }
    if control.mode == Mode::Type {
        let ty = state.type_result(control)?;
        let pointee = element_type(&ty)
            .ok_or_else(|| RuntimeError::invalid(&node.kind, "dereference of a non-pointer"))?;
        return Ok(Reduction::done(&control.cont, Outcome::Type(pointee)));
    }
    match state.value(control)? {
        // `*f` and `(*fp)` designate the function itself
        value @ (Value::Function(_) | Value::Builtin(_)) => Ok(Reduction::value(&control.cont, value)),
        Value::Pointer(p) if matches!(**p.pointee(), Type::Function(_)) => {
            let function = state
                .functions
                .get(p.address as usize)
                .cloned()
                .ok_or_else(|| RuntimeError::UndefinedFunction {
                    name: format!("0x{:x}", p.address),
                })?;
            Ok(Reduction::value(&control.cont, function))
        }
        Value::Pointer(p) => access(state, control, p),
        other => Err(RuntimeError::invalid(
            &node.kind,
            format!("dereference of {}", other.ty()),
        )),
    }
}
