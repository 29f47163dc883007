//! Statement and variable declaration steps
//!
//! Each function here is the step function of one node kind: it looks at
//! `control.step` to see how far the node has progressed and returns the
//! next reduction.

use super::control::{enter, enter_expr, enter_stmt, Acc, Control, Outcome, Reduction, StepResult};
use super::effects::Effect;
use super::engine::State;
use super::errors::RuntimeError;
use crate::memory::value::Init;

/// `{ ... }`: open a block frame, run each child as a statement, close it
pub fn step_compound(_state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let step = control.index();
    let mut effects = Vec::new();
    if step == 0 {
        effects.push(Effect::Enter(node.id));
    }
    match node.children.get(step) {
        Some(child) => Ok(Reduction {
            control: Some(enter_stmt(child, control.at(step + 1)).into_cont()),
            result: None,
            effects,
        }),
        None => {
            effects.push(Effect::Leave(node.id));
            Ok(Reduction {
                control: Some(control.cont.clone()),
                result: Some(Outcome::Void),
                effects,
            })
        }
    }
}

pub fn step_decl_stmt(_state: &State, control: &Control) -> StepResult {
    let step = control.index();
    match control.node.children.get(step) {
        Some(child) => Ok(Reduction::to(enter(child, control.at(step + 1)))),
        None => Ok(Reduction::done(&control.cont, Outcome::Void)),
    }
}

pub fn step_null(_state: &State, control: &Control) -> StepResult {
    Ok(Reduction::done(&control.cont, Outcome::Void))
}

/// `if (cond) then [else]`; the condition is not a statement boundary
pub fn step_if(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    match control.index() {
        0 => {
            let cond = node
                .child(0)
                .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing condition"))?;
            Ok(Reduction::to(enter_expr(cond, control.at(1))))
        }
        1 => {
            let branch = if state.value(control)?.to_bool() {
                node.child(1)
            } else {
                node.child(2)
            };
            match branch {
                Some(branch) => Ok(Reduction::to(enter_stmt(branch, control.at(2)))),
                None => Ok(Reduction::done(&control.cont, Outcome::Void)),
            }
        }
        _ => Ok(Reduction::done(&control.cont, Outcome::Void)),
    }
}

/// `return [expr];`; control moves to the caller through the effect
pub fn step_return(state: &State, control: &Control) -> StepResult {
    match (control.index(), control.node.child(0)) {
        (0, Some(expr)) => Ok(Reduction::to(enter_expr(expr, control.at(1)))),
        (0, None) => Ok(Reduction::effects(vec![Effect::Return(None)])),
        _ => {
            let value = state.value(control)?;
            Ok(Reduction::effects(vec![Effect::Return(Some(value))]))
        }
    }
}

/// `T name [= init]`: evaluate the type, then the initializer, then declare
///
/// Declarations at the root scope get static storage.
pub fn step_var_decl(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let step = control.index();
    if step == 0 {
        let ty = node
            .child(0)
            .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing type"))?;
        return Ok(Reduction::to(enter(ty, control.at(1))));
    }
    if step == 1 {
        if let Some(init) = node.child(1) {
            let ty = state.type_result(control)?;
            return Ok(Reduction::to(enter_expr(init, control.at(2).with_acc(Acc::Type(ty)))));
        }
    }

    let (ty, init) = if step == 1 {
        (state.type_result(control)?, None)
    } else {
        let Acc::Type(ty) = &control.acc else {
            return Err(RuntimeError::invalid(&node.kind, "lost the declared type"));
        };
        let init = match &state.result {
            Some(Outcome::Value(value)) => Init::Value(value.clone()),
            Some(Outcome::InitList(items)) => Init::List(items.clone()),
            _ => return Err(RuntimeError::invalid(&node.kind, "initializer produced no value")),
        };
        (ty.clone(), Some(init))
    };
    let name = node
        .attr_str("name")
        .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing name"))?;
    let effect = if state.scope.is_root() {
        Effect::GlobalVarDecl { name, ty, init }
    } else {
        Effect::VarDecl { name, ty, init }
    };
    Ok(Reduction::done(&control.cont, Outcome::Void).with_effect(effect))
}
