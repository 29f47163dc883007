//! Controls and continuations
//!
//! A [`Control`] is a suspended computation: the node being evaluated, how
//! far its evaluation has progressed (`step`), what to resume once it
//! produces a result (`cont`), and the values it has accumulated so far.
//! Continuations are immutable `Rc` chains, so a state can be copied,
//! inspected or kept for later without copying the pending computation.
//!
//! Every step function returns a [`Reduction`]: the next control (if it
//! changes), the effects to apply, and the result handed to the continuation.

use super::effects::Effect;
use super::errors::RuntimeError;
use crate::ast::Node;
use crate::memory::types::{Param, TypeRef};
use crate::memory::value::{Init, PointerValue, Value};
use std::fmt;
use std::rc::Rc;

/// What evaluating an expression should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// A runtime value
    #[default]
    Value,
    /// A reference to the designated object
    Lvalue,
    /// The static type, without evaluating anything
    Type,
}

/// Sequence point tag, used by the driver to find step boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seq {
    Expr,
    Stmt,
}

/// Position within a node's evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    At(usize),
    /// After a call: pass the callee's result to the call's continuation
    Catch,
    /// End of a function body reached without `return`
    FallOff,
}

/// Where to resume when a control produces its result
#[derive(Clone)]
pub enum Cont {
    Halt,
    Resume(Rc<Control>),
}

impl Cont {
    pub fn control(&self) -> Option<&Rc<Control>> {
        match self {
            Cont::Halt => None,
            Cont::Resume(control) => Some(control),
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Cont::Halt)
    }
}

impl fmt::Debug for Cont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cont::Halt => write!(f, "Halt"),
            Cont::Resume(control) => write!(f, "{:?}", control),
        }
    }
}

/// Per-node accumulator
#[derive(Debug, Clone, Default)]
pub enum Acc {
    #[default]
    Empty,
    /// Evaluated callee and arguments of a call
    Values(Vec<Value>),
    /// Elements of an initializer list
    Inits(Vec<Init>),
    /// Left operand, or the base of a subscript
    Lhs(Value),
    /// Assignment target, and its old value for compound forms
    Lvalue {
        reference: PointerValue,
        lhs: Option<Value>,
    },
    Type(TypeRef),
    Signature { result: TypeRef, params: Vec<Param> },
    Fields(Vec<Param>),
}

/// A suspended evaluation of one node
#[derive(Clone)]
pub struct Control {
    pub node: Rc<Node>,
    pub step: Phase,
    pub cont: Cont,
    pub mode: Mode,
    pub seq: Option<Seq>,
    /// Step to resume at when a `break` unwinds to this control
    pub break_step: Option<usize>,
    pub acc: Acc,
}

// Only the head of the chain: continuations can be deep.
impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} {:?}", self.node.kind, self.node.id, self.step)?;
        if self.mode != Mode::Value {
            write!(f, " {:?}", self.mode)?;
        }
        if let Some(seq) = self.seq {
            write!(f, " seq={:?}", seq)?;
        }
        Ok(())
    }
}

impl Control {
    /// A fresh control for `node`, resuming `cont` when done
    pub fn new(node: Rc<Node>, cont: Cont) -> Control {
        Control {
            node,
            step: Phase::At(0),
            cont,
            mode: Mode::Value,
            seq: None,
            break_step: None,
            acc: Acc::Empty,
        }
    }

    /// Numeric step; symbolic phases count as past the end
    pub fn index(&self) -> usize {
        match self.step {
            Phase::At(n) => n,
            Phase::Catch | Phase::FallOff => usize::MAX,
        }
    }

    /// This control, moved to another step
    pub fn at(&self, step: usize) -> Control {
        Control {
            step: Phase::At(step),
            ..self.clone()
        }
    }

    pub fn with_phase(mut self, step: Phase) -> Control {
        self.step = step;
        self
    }

    pub fn with_acc(mut self, acc: Acc) -> Control {
        self.acc = acc;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Control {
        self.mode = mode;
        self
    }

    pub fn with_break(mut self, step: usize) -> Control {
        self.break_step = Some(step);
        self
    }

    pub fn with_seq(mut self, seq: Seq) -> Control {
        self.seq = Some(seq);
        self
    }

    pub fn into_cont(self) -> Cont {
        Cont::Resume(Rc::new(self))
    }
}

/// Descend into `child`, resuming `cont` afterwards
pub fn enter(child: &Rc<Node>, cont: Control) -> Control {
    Control::new(child.clone(), cont.into_cont())
}

/// Descend into an expression child (a sequence point boundary)
pub fn enter_expr(child: &Rc<Node>, cont: Control) -> Control {
    enter(child, cont).with_seq(Seq::Expr)
}

/// Descend into a statement child
pub fn enter_stmt(child: &Rc<Node>, cont: Control) -> Control {
    enter(child, cont).with_seq(Seq::Stmt)
}

/// What a node hands to its continuation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Statements, declarations and void calls
    Void,
    Value(Value),
    Type(TypeRef),
    InitList(Vec<Init>),
    Param(Param),
}

impl Outcome {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Output of one step function
#[derive(Debug, Default)]
pub struct Reduction {
    /// Next control; `None` leaves control to the effects
    pub control: Option<Cont>,
    pub result: Option<Outcome>,
    pub effects: Vec<Effect>,
}

impl Reduction {
    /// Continue with `control`
    pub fn to(control: Control) -> Self {
        Reduction {
            control: Some(control.into_cont()),
            ..Default::default()
        }
    }

    /// Resume `cont` with `result`
    pub fn done(cont: &Cont, result: Outcome) -> Self {
        Reduction {
            control: Some(cont.clone()),
            result: Some(result),
            effects: Vec::new(),
        }
    }

    pub fn value(cont: &Cont, value: Value) -> Self {
        Reduction::done(cont, Outcome::Value(value))
    }

    /// Only effects; control is decided by them (`Return`)
    pub fn effects(effects: Vec<Effect>) -> Self {
        Reduction {
            effects,
            ..Default::default()
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

pub type StepResult = Result<Reduction, RuntimeError>;
