// Reduction engine for the C interpreter

use super::builtins::Builtins;
use super::control::{Control, Outcome, StepResult};
use super::errors::RuntimeError;
use super::{expressions, jumps, loops, ops, statements, type_system};
use crate::ast::{NodeId, NodeKind};
use crate::interpreter::control::Cont;
use crate::memory::stack::{self, Scope};
use crate::memory::types::{RecordDecl, TypeRef};
use crate::memory::value::{Address, PointerValue, Value};
use crate::memory::{LogEntry, Memory};
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;
use tracing::trace;

/// Which way control moved in the last reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Descended into a node
    Down,
    /// A node produced its result
    Up,
    /// A function returned
    Out,
}

/// The complete interpreter state
///
/// Every table is reference counted, so cloning a state is cheap and an
/// old state stays valid after the next step.
#[derive(Debug, Clone)]
pub struct State {
    /// Globals and functions by name
    pub global_map: Rc<FxHashMap<String, Value>>,
    /// Function table, indexed by code
    pub functions: Rc<Vec<Value>>,
    pub record_decls: Rc<FxHashMap<String, Rc<RecordDecl>>>,
    pub memory: Memory,
    /// Accesses since the log was last cleared
    pub memory_log: Vec<LogEntry>,
    /// Next free static address
    pub heap_start: Address,
    pub scope: Rc<Scope>,
    pub control: Cont,
    pub result: Option<Outcome>,
    pub direction: Direction,
    /// Storage of each string literal, by node
    pub literals: Rc<FxHashMap<NodeId, PointerValue>>,
    pub builtins: Rc<Builtins>,
    /// Functions with a body somewhere in the program
    pub defined: Rc<FxHashSet<String>>,
}

impl State {
    pub fn is_halted(&self) -> bool {
        self.control.is_halt()
    }

    /// The result as a runtime value, if it is one
    pub fn result_value(&self) -> Option<&Value> {
        self.result.as_ref().and_then(Outcome::as_value)
    }

    /// The result as a runtime value; anything else is an engine error
    pub(crate) fn value(&self, control: &Control) -> Result<Value, RuntimeError> {
        self.result_value()
            .cloned()
            .ok_or_else(|| RuntimeError::invalid(&control.node.kind, "expected a value from the operand"))
    }

    /// The result as a type (type-mode evaluation)
    pub(crate) fn type_result(&self, control: &Control) -> Result<TypeRef, RuntimeError> {
        match &self.result {
            Some(Outcome::Type(ty)) => Ok(ty.clone()),
            _ => Err(RuntimeError::invalid(&control.node.kind, "expected a type")),
        }
    }

    /// Local reference, global or function bound to `name`
    pub fn find_declaration(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(reference) = stack::resolve_name(&self.scope, name) {
            return Ok(Value::Pointer(reference));
        }
        self.global_map
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Read through a reference, as a load effect would
    pub fn read(&self, reference: &PointerValue) -> Result<Value, RuntimeError> {
        self.memory.read(reference)
    }
}

/// Compute the next reduction for the current control
///
/// The state is not modified; the caller applies the returned reduction.
pub fn step(state: &State) -> StepResult {
    let control = match &state.control {
        Cont::Halt => return Err(RuntimeError::Halted),
        Cont::Resume(control) => control.clone(),
    };
    trace!(control = ?control, "reduce");
    let control = &*control;
    match &control.node.kind {
        // Statements
        NodeKind::CompoundStmt => statements::step_compound(state, control),
        NodeKind::DeclStmt => statements::step_decl_stmt(state, control),
        NodeKind::NullStmt => statements::step_null(state, control),
        NodeKind::IfStmt => statements::step_if(state, control),
        NodeKind::ReturnStmt => statements::step_return(state, control),
        NodeKind::WhileStmt => loops::step_while(state, control),
        NodeKind::DoStmt => loops::step_do(state, control),
        NodeKind::ForStmt => loops::step_for(state, control),
        NodeKind::BreakStmt => jumps::step_break(state, control),
        NodeKind::ContinueStmt => jumps::step_continue(state, control),

        // Declarations
        NodeKind::VarDecl => statements::step_var_decl(state, control),
        NodeKind::FunctionDecl => type_system::step_function_decl(state, control),
        NodeKind::ParmVarDecl | NodeKind::FieldDecl => type_system::step_param(state, control),
        NodeKind::RecordDecl => type_system::step_record_decl(state, control),
        NodeKind::TypedefDecl => Ok(super::control::Reduction::done(&control.cont, Outcome::Void)),

        // Expressions
        NodeKind::ParenExpr | NodeKind::CXXDefaultArgExpr => expressions::step_paren(state, control),
        NodeKind::CallExpr => expressions::step_call(state, control),
        NodeKind::ImplicitCastExpr => expressions::step_implicit_cast(state, control),
        NodeKind::CStyleCastExpr => expressions::step_explicit_cast(state, control),
        NodeKind::DeclRefExpr => expressions::step_decl_ref(state, control),
        NodeKind::IntegerLiteral => expressions::step_integer_literal(state, control),
        NodeKind::CharacterLiteral => expressions::step_character_literal(state, control),
        NodeKind::FloatingLiteral => expressions::step_floating_literal(state, control),
        NodeKind::StringLiteral => expressions::step_string_literal(state, control),
        NodeKind::UnaryExprOrTypeTraitExpr => expressions::step_sizeof(state, control),
        NodeKind::InitListExpr => expressions::step_init_list(state, control),
        NodeKind::ConditionalOperator => expressions::step_conditional(state, control),
        NodeKind::MemberExpr => ops::access::step_member(state, control),
        NodeKind::ArraySubscriptExpr => ops::access::step_subscript(state, control),
        NodeKind::UnaryOperator => step_unary_operator(state, control),
        NodeKind::BinaryOperator => {
            if control.node.attr_str("opcode").as_deref() == Some("Assign") {
                ops::assign::step_assign(state, control)
            } else {
                ops::binary::step_binary(state, control)
            }
        }
        NodeKind::CompoundAssignOperator => ops::assign::step_compound_assign(state, control),

        // Types
        NodeKind::BuiltinType => type_system::step_builtin_type(state, control),
        NodeKind::PointerType => type_system::step_pointer_type(state, control),
        NodeKind::ConstantArrayType => type_system::step_constant_array_type(state, control),
        NodeKind::VariableArrayType => type_system::step_variable_array_type(state, control),
        NodeKind::IncompleteArrayType => type_system::step_incomplete_array_type(state, control),
        NodeKind::FunctionProtoType | NodeKind::FunctionNoProtoType => {
            type_system::step_function_type(state, control)
        }
        NodeKind::ParenType | NodeKind::ElaboratedType | NodeKind::TypedefType => {
            type_system::step_paren_type(state, control)
        }
        NodeKind::DecayedType => type_system::step_decayed_type(state, control),
        NodeKind::RecordType => type_system::step_record_type(state, control),

        // C++
        NodeKind::CXXMemberCallExpr
        | NodeKind::CXXRecordDecl
        | NodeKind::CXXMethodDecl
        | NodeKind::CXXConstructorDecl => Err(RuntimeError::NotImplemented {
            feature: control.node.kind.to_string(),
        }),

        NodeKind::Name | NodeKind::Unknown(_) => Err(RuntimeError::Stuck {
            kind: control.node.kind.to_string(),
        }),
    }
}

fn step_unary_operator(state: &State, control: &Control) -> StepResult {
    let opcode = control.node.attr_str("opcode").unwrap_or_default();
    match opcode.as_str() {
        "Plus" | "Minus" | "LNot" | "Not" => ops::unary::step_unary(state, control),
        "PreInc" | "PreDec" | "PostInc" | "PostDec" => ops::assign::step_increment(state, control),
        "AddrOf" => ops::access::step_addr_of(state, control),
        "Deref" => ops::access::step_deref(state, control),
        _ => Err(RuntimeError::UnsupportedOperation {
            op: opcode,
            operand: "UnaryOperator".to_string(),
        }),
    }
}
