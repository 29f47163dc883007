use crate::interpreter::control::{enter_expr, Control, Mode, Outcome, Reduction, StepResult};
use crate::interpreter::engine::State;
use crate::interpreter::errors::RuntimeError;
use crate::memory::types::Type;
use crate::memory::value::Value;

/// Apply `+`, `-`, `!` or `~` to a value
pub fn eval_unary(op: &str, value: &Value) -> Result<Value, RuntimeError> {
    if op == "LNot" {
        return match value {
            Value::Integral { .. } | Value::Floating { .. } | Value::Pointer(_) => {
                Ok(Value::int(!value.to_bool() as i64))
            }
            _ => Err(unsupported(op, value)),
        };
    }
    match (op, value) {
        ("Plus", Value::Integral { .. } | Value::Floating { .. }) => Ok(value.clone()),
        ("Minus", Value::Integral { scalar, number }) => Ok(Value::integral(*scalar, -*number)),
        ("Minus", Value::Floating { scalar, number }) => Ok(Value::floating(*scalar, -*number)),
        ("Not", Value::Integral { scalar, number }) => Ok(Value::integral(*scalar, !*number)),
        _ => Err(unsupported(op, value)),
    }
}

fn unsupported(op: &str, value: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOperation {
        op: op.to_string(),
        operand: value.ty().to_string(),
    }
}

/// Arithmetic and logical unary operators
pub fn step_unary(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let op = node.attr_str("opcode").unwrap_or_default();
    if control.index() == 0 {
        let operand = node
            .child(0)
            .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing operand"))?;
        let mode = match control.mode {
            Mode::Type => Mode::Type,
            _ => Mode::Value,
        };
        return Ok(Reduction::to(enter_expr(operand, control.at(1)).with_mode(mode)));
    }
    if control.mode == Mode::Type {
        let ty = match op.as_str() {
            "LNot" => Type::int(),
            _ => state.type_result(control)?,
        };
        return Ok(Reduction::done(&control.cont, Outcome::Type(ty)));
    }
    let value = eval_unary(&op, &state.value(control)?)?;
    Ok(Reduction::value(&control.cont, value))
}
