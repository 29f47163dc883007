// break and continue: unwind the continuation chain to the enclosing loop

use super::control::{Cont, Control, Outcome, Phase, Reduction, Seq, StepResult};
use super::effects::Effect;
use super::engine::State;
use super::errors::RuntimeError;
use crate::ast::NodeKind;
use std::rc::Rc;

/// Find the nearest continuation carrying a break step
///
/// Each block passed on the way is still open and gets a `Leave`. The
/// search stops at a function boundary: a `break` never crosses a call.
fn unwind(control: &Control, keyword: &str) -> Result<(Rc<Control>, Vec<Effect>), RuntimeError> {
    let outside = || RuntimeError::BreakOutsideLoop {
        keyword: keyword.to_string(),
    };
    let mut effects = Vec::new();
    let mut cont = &control.cont;
    loop {
        let Cont::Resume(next) = cont else {
            return Err(outside());
        };
        if next.break_step.is_some() {
            return Ok((next.clone(), effects));
        }
        if matches!(next.step, Phase::Catch | Phase::FallOff) {
            return Err(outside());
        }
        if matches!(next.node.kind, NodeKind::CompoundStmt | NodeKind::ForStmt) {
            effects.push(Effect::Leave(next.node.id));
        }
        cont = &next.cont;
    }
}

pub fn step_break(_state: &State, control: &Control) -> StepResult {
    let (target, effects) = unwind(control, "break")?;
    let step = target.break_step.unwrap_or_default();
    let resumed = target.at(step).with_seq(Seq::Stmt);
    Ok(Reduction {
        control: Some(resumed.into_cont()),
        result: Some(Outcome::Void),
        effects,
    })
}

pub fn step_continue(_state: &State, control: &Control) -> StepResult {
    let (target, effects) = unwind(control, "continue")?;
    let resumed = (*target).clone().with_seq(Seq::Stmt);
    Ok(Reduction {
        control: Some(resumed.into_cont()),
        result: Some(Outcome::Void),
        effects,
    })
}
