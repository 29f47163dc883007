//! Loop steps: `while`, `do ... while` and `for`
//!
//! A loop marks the continuation it gives its body with a break step, so a
//! `break` inside the body can unwind straight to it (see
//! [`jumps`](super::jumps)). A `continue` resumes that same continuation at
//! its ordinary step, which is where the next iteration starts.
//!
//! Controlling expressions are entered as expressions: they are sequence
//! points but not statement boundaries.

use super::control::{enter_expr, enter_stmt, Control, Outcome, Reduction, StepResult};
use super::effects::Effect;
use super::engine::State;
use super::errors::RuntimeError;
use crate::ast::Node;
use std::rc::Rc;

fn child<'a>(node: &'a Node, index: usize, what: &str) -> Result<&'a Rc<Node>, RuntimeError> {
    node.child(index)
        .ok_or_else(|| RuntimeError::invalid(&node.kind, format!("missing {}", what)))
}

fn exit(control: &Control) -> StepResult {
    Ok(Reduction::done(&control.cont, Outcome::Void))
}

/// `while (cond) body`
///
/// Steps: 0 evaluate cond, 1 test it, 2 exit (break target).
pub fn step_while(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    match control.index() {
        0 => Ok(Reduction::to(enter_expr(child(node, 0, "condition")?, control.at(1)))),
        1 if state.value(control)?.to_bool() => {
            let body = child(node, 1, "body")?;
            Ok(Reduction::to(enter_stmt(body, control.at(0).with_break(2))))
        }
        _ => exit(control),
    }
}

/// `do body while (cond);`
///
/// Steps: 0 first iteration, 1 evaluate cond, 2 test it, 3 exit.
pub fn step_do(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    match control.index() {
        0 => {
            let body = child(node, 0, "body")?;
            Ok(Reduction::to(enter_stmt(body, control.at(1).with_break(3))))
        }
        1 => Ok(Reduction::to(enter_expr(child(node, 1, "condition")?, control.at(2)))),
        2 if state.value(control)?.to_bool() => {
            let body = child(node, 0, "body")?;
            Ok(Reduction::to(enter_stmt(body, control.at(1).with_break(3))))
        }
        _ => exit(control),
    }
}

/// Positions of the optional clauses of a `for` node
///
/// Absent clauses are left out of the children and flagged with `noInit`,
/// `noCond` and `noInc`.
struct ForClauses<'a> {
    init: Option<&'a Rc<Node>>,
    cond: Option<&'a Rc<Node>>,
    inc: Option<&'a Rc<Node>>,
    body: &'a Rc<Node>,
}

impl<'a> ForClauses<'a> {
    fn of(node: &'a Node) -> Result<Self, RuntimeError> {
        let mut children = node.children.iter();
        let mut clause = |absent: bool| if absent { None } else { children.next() };
        let init = clause(node.flag("noInit"));
        let cond = clause(node.flag("noCond"));
        let inc = clause(node.flag("noInc"));
        let body = children
            .next()
            .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing body"))?;
        Ok(ForClauses { init, cond, inc, body })
    }
}

/// `for (init; cond; inc) body`
///
/// The loop opens its own block frame so a declaration in `init` is scoped
/// to the loop.
///
/// Steps: 0 init, 1 evaluate cond, 2 inc, 3 test cond, 4 exit.
pub fn step_for(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let clauses = ForClauses::of(node)?;
    let mut effects = Vec::new();
    let mut step = control.index();
    let mut force = false;

    if step == 0 {
        effects.push(Effect::Enter(node.id));
        match clauses.init {
            Some(init) => {
                return Ok(Reduction {
                    control: Some(enter_stmt(init, control.at(1)).into_cont()),
                    result: None,
                    effects,
                })
            }
            None => step = 1,
        }
    }
    if step == 2 {
        match clauses.inc {
            Some(inc) => return Ok(Reduction::to(enter_stmt(inc, control.at(1)))),
            None => step = 1,
        }
    }
    if step == 1 {
        match clauses.cond {
            Some(cond) => {
                return Ok(Reduction {
                    control: Some(enter_expr(cond, control.at(3)).into_cont()),
                    result: None,
                    effects,
                })
            }
            None => {
                step = 3;
                force = true;
            }
        }
    }
    if step == 3 && (force || state.value(control)?.to_bool()) {
        return Ok(Reduction {
            control: Some(enter_stmt(clauses.body, control.at(2).with_break(4)).into_cont()),
            result: None,
            effects,
        });
    }
    effects.push(Effect::Leave(node.id));
    Ok(Reduction {
        control: Some(control.cont.clone()),
        result: Some(Outcome::Void),
        effects,
    })
}
