//! Serialized C syntax tree consumed by the interpreter
//!
//! The front end that produces these trees is external. A node is a triple
//! `(kind, attributes, children)`, serialized as a JSON array:
//!
//! ```text
//! ["BinaryOperator", {"opcode": "Add"}, [lhs, rhs]]
//! ```
//!
//! Every node gets a unique [`NodeId`] when the program is loaded. The
//! interpreter never mutates nodes; per-node runtime data (such as the
//! storage backing a string literal) is keyed by id in the interpreter state.

mod load;

pub use load::{LoadError, Program};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Unique identifier for AST nodes, used for tracking execution position
pub type NodeId = usize;

/// Scalar attribute value attached to a node
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Attr {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Node kinds understood by the engine
///
/// Tags the engine does not know are preserved as [`NodeKind::Unknown`] so
/// that a program can still be loaded; stepping into one reports `Stuck`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    // Statements
    CompoundStmt,
    DeclStmt,
    NullStmt,
    IfStmt,
    WhileStmt,
    DoStmt,
    ForStmt,
    BreakStmt,
    ContinueStmt,
    ReturnStmt,
    // Declarations
    VarDecl,
    FunctionDecl,
    ParmVarDecl,
    RecordDecl,
    FieldDecl,
    TypedefDecl,
    CXXRecordDecl,
    CXXMethodDecl,
    CXXConstructorDecl,
    // Expressions
    ParenExpr,
    CallExpr,
    ImplicitCastExpr,
    CStyleCastExpr,
    DeclRefExpr,
    MemberExpr,
    IntegerLiteral,
    CharacterLiteral,
    FloatingLiteral,
    StringLiteral,
    UnaryOperator,
    UnaryExprOrTypeTraitExpr,
    BinaryOperator,
    CompoundAssignOperator,
    ArraySubscriptExpr,
    InitListExpr,
    ConditionalOperator,
    CXXMemberCallExpr,
    CXXDefaultArgExpr,
    // Types
    BuiltinType,
    PointerType,
    ConstantArrayType,
    VariableArrayType,
    IncompleteArrayType,
    FunctionProtoType,
    FunctionNoProtoType,
    ParenType,
    ElaboratedType,
    TypedefType,
    DecayedType,
    RecordType,
    // Leaves
    Name,
    Unknown(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::CompoundStmt => "CompoundStmt",
            NodeKind::DeclStmt => "DeclStmt",
            NodeKind::NullStmt => "NullStmt",
            NodeKind::IfStmt => "IfStmt",
            NodeKind::WhileStmt => "WhileStmt",
            NodeKind::DoStmt => "DoStmt",
            NodeKind::ForStmt => "ForStmt",
            NodeKind::BreakStmt => "BreakStmt",
            NodeKind::ContinueStmt => "ContinueStmt",
            NodeKind::ReturnStmt => "ReturnStmt",
            NodeKind::VarDecl => "VarDecl",
            NodeKind::FunctionDecl => "FunctionDecl",
            NodeKind::ParmVarDecl => "ParmVarDecl",
            NodeKind::RecordDecl => "RecordDecl",
            NodeKind::FieldDecl => "FieldDecl",
            NodeKind::TypedefDecl => "TypedefDecl",
            NodeKind::CXXRecordDecl => "CXXRecordDecl",
            NodeKind::CXXMethodDecl => "CXXMethodDecl",
            NodeKind::CXXConstructorDecl => "CXXConstructorDecl",
            NodeKind::ParenExpr => "ParenExpr",
            NodeKind::CallExpr => "CallExpr",
            NodeKind::ImplicitCastExpr => "ImplicitCastExpr",
            NodeKind::CStyleCastExpr => "CStyleCastExpr",
            NodeKind::DeclRefExpr => "DeclRefExpr",
            NodeKind::MemberExpr => "MemberExpr",
            NodeKind::IntegerLiteral => "IntegerLiteral",
            NodeKind::CharacterLiteral => "CharacterLiteral",
            NodeKind::FloatingLiteral => "FloatingLiteral",
            NodeKind::StringLiteral => "StringLiteral",
            NodeKind::UnaryOperator => "UnaryOperator",
            NodeKind::UnaryExprOrTypeTraitExpr => "UnaryExprOrTypeTraitExpr",
            NodeKind::BinaryOperator => "BinaryOperator",
            NodeKind::CompoundAssignOperator => "CompoundAssignOperator",
            NodeKind::ArraySubscriptExpr => "ArraySubscriptExpr",
            NodeKind::InitListExpr => "InitListExpr",
            NodeKind::ConditionalOperator => "ConditionalOperator",
            NodeKind::CXXMemberCallExpr => "CXXMemberCallExpr",
            NodeKind::CXXDefaultArgExpr => "CXXDefaultArgExpr",
            NodeKind::BuiltinType => "BuiltinType",
            NodeKind::PointerType => "PointerType",
            NodeKind::ConstantArrayType => "ConstantArrayType",
            NodeKind::VariableArrayType => "VariableArrayType",
            NodeKind::IncompleteArrayType => "IncompleteArrayType",
            NodeKind::FunctionProtoType => "FunctionProtoType",
            NodeKind::FunctionNoProtoType => "FunctionNoProtoType",
            NodeKind::ParenType => "ParenType",
            NodeKind::ElaboratedType => "ElaboratedType",
            NodeKind::TypedefType => "TypedefType",
            NodeKind::DecayedType => "DecayedType",
            NodeKind::RecordType => "RecordType",
            NodeKind::Name => "Name",
            NodeKind::Unknown(tag) => tag,
        }
    }

    /// Control nodes that `step_into` passes through without stopping
    pub fn is_transparent(&self) -> bool {
        matches!(
            self,
            NodeKind::CompoundStmt
                | NodeKind::IfStmt
                | NodeKind::WhileStmt
                | NodeKind::DoStmt
                | NodeKind::ForStmt
        )
    }
}

impl FromStr for NodeKind {
    type Err = std::convert::Infallible;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Ok(match tag {
            "CompoundStmt" => NodeKind::CompoundStmt,
            "DeclStmt" => NodeKind::DeclStmt,
            "NullStmt" => NodeKind::NullStmt,
            "IfStmt" => NodeKind::IfStmt,
            "WhileStmt" => NodeKind::WhileStmt,
            "DoStmt" => NodeKind::DoStmt,
            "ForStmt" => NodeKind::ForStmt,
            "BreakStmt" => NodeKind::BreakStmt,
            "ContinueStmt" => NodeKind::ContinueStmt,
            "ReturnStmt" => NodeKind::ReturnStmt,
            "VarDecl" => NodeKind::VarDecl,
            "FunctionDecl" => NodeKind::FunctionDecl,
            "ParmVarDecl" => NodeKind::ParmVarDecl,
            "RecordDecl" => NodeKind::RecordDecl,
            "FieldDecl" => NodeKind::FieldDecl,
            "TypedefDecl" => NodeKind::TypedefDecl,
            "CXXRecordDecl" => NodeKind::CXXRecordDecl,
            "CXXMethodDecl" => NodeKind::CXXMethodDecl,
            "CXXConstructorDecl" => NodeKind::CXXConstructorDecl,
            "ParenExpr" => NodeKind::ParenExpr,
            "CallExpr" => NodeKind::CallExpr,
            "ImplicitCastExpr" => NodeKind::ImplicitCastExpr,
            "CStyleCastExpr" => NodeKind::CStyleCastExpr,
            "DeclRefExpr" => NodeKind::DeclRefExpr,
            "MemberExpr" => NodeKind::MemberExpr,
            "IntegerLiteral" => NodeKind::IntegerLiteral,
            "CharacterLiteral" => NodeKind::CharacterLiteral,
            "FloatingLiteral" => NodeKind::FloatingLiteral,
            "StringLiteral" => NodeKind::StringLiteral,
            "UnaryOperator" => NodeKind::UnaryOperator,
            "UnaryExprOrTypeTraitExpr" => NodeKind::UnaryExprOrTypeTraitExpr,
            "BinaryOperator" => NodeKind::BinaryOperator,
            "CompoundAssignOperator" => NodeKind::CompoundAssignOperator,
            "ArraySubscriptExpr" => NodeKind::ArraySubscriptExpr,
            "InitListExpr" => NodeKind::InitListExpr,
            "ConditionalOperator" => NodeKind::ConditionalOperator,
            "CXXMemberCallExpr" => NodeKind::CXXMemberCallExpr,
            "CXXDefaultArgExpr" => NodeKind::CXXDefaultArgExpr,
            "BuiltinType" => NodeKind::BuiltinType,
            "PointerType" => NodeKind::PointerType,
            "ConstantArrayType" => NodeKind::ConstantArrayType,
            "VariableArrayType" => NodeKind::VariableArrayType,
            "IncompleteArrayType" => NodeKind::IncompleteArrayType,
            "FunctionProtoType" => NodeKind::FunctionProtoType,
            "FunctionNoProtoType" => NodeKind::FunctionNoProtoType,
            "ParenType" => NodeKind::ParenType,
            "ElaboratedType" => NodeKind::ElaboratedType,
            "TypedefType" => NodeKind::TypedefType,
            "DecayedType" => NodeKind::DecayedType,
            "RecordType" => NodeKind::RecordType,
            "Name" => NodeKind::Name,
            other => NodeKind::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable AST node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub attrs: FxHashMap<String, Attr>,
    pub children: Vec<Rc<Node>>,
}

impl Node {
    pub fn child(&self, index: usize) -> Option<&Rc<Node>> {
        self.children.get(index)
    }

    pub fn attr(&self, key: &str) -> Option<&Attr> {
        self.attrs.get(key)
    }

    /// String attribute; integers and floats are rendered, so `{"value": 3}`
    /// and `{"value": "3"}` read the same.
    pub fn attr_str(&self, key: &str) -> Option<String> {
        match self.attrs.get(key)? {
            Attr::Str(s) => Some(s.clone()),
            Attr::Int(n) => Some(n.to_string()),
            Attr::Float(x) => Some(x.to_string()),
            Attr::Bool(b) => Some(b.to_string()),
        }
    }

    /// Boolean flag; absent means false
    pub fn flag(&self, key: &str) -> bool {
        match self.attrs.get(key) {
            Some(Attr::Bool(b)) => *b,
            Some(Attr::Int(n)) => *n != 0,
            Some(Attr::Str(s)) => s == "true",
            _ => false,
        }
    }

    /// Identifier of a `Name` node, or of the first `Name` child
    pub fn identifier(&self) -> Option<String> {
        if self.kind == NodeKind::Name {
            return self.attr_str("identifier");
        }
        self.children
            .iter()
            .find(|c| c.kind == NodeKind::Name)
            .and_then(|c| c.attr_str("identifier"))
    }

    /// Depth-first pre-order walk over this node and its descendants
    pub fn walk<'a>(node: &'a Rc<Node>, visit: &mut impl FnMut(&'a Rc<Node>)) {
        visit(node);
        for child in &node.children {
            Node::walk(child, visit);
        }
    }
}
