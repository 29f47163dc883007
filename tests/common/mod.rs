// AST builders for the integration tests
//
// Nodes are written in the JSON wire form `["Kind", {attrs}, [children]]`.

#![allow(dead_code)]

use cstep::ast::Program;
use cstep::interpreter::builtins::Builtins;
use cstep::interpreter::driver::{Interpreter, Options};
use serde_json::{json, Value as Json};

pub fn ty(name: &str) -> Json {
    json!(["BuiltinType", {"name": name}, []])
}

pub fn int_t() -> Json {
    ty("int")
}

pub fn ptr(pointee: Json) -> Json {
    json!(["PointerType", {}, [pointee]])
}

pub fn array(elem: Json, size: usize) -> Json {
    json!(["ConstantArrayType", {"size": size}, [elem]])
}

pub fn incomplete_array(elem: Json) -> Json {
    json!(["IncompleteArrayType", {}, [elem]])
}

pub fn record_t(name: &str) -> Json {
    json!(["ElaboratedType", {}, [["RecordType", {"name": name}, []]]])
}

pub fn proto(result: Json, params: Vec<Json>) -> Json {
    let mut children = vec![result];
    children.extend(params);
    json!(["FunctionProtoType", {}, children])
}

pub fn name(identifier: &str) -> Json {
    json!(["Name", {"identifier": identifier}, []])
}

pub fn param(name: &str, ty: Json) -> Json {
    json!(["ParmVarDecl", {"name": name}, [ty]])
}

pub fn field(name: &str, ty: Json) -> Json {
    json!(["FieldDecl", {"name": name}, [ty]])
}

pub fn record(name: &str, fields: Vec<Json>) -> Json {
    json!(["RecordDecl", {"name": name, "tagUsed": "struct"}, fields])
}

/// A function definition
pub fn func(identifier: &str, result: Json, params: Vec<Json>, body: Vec<Json>) -> Json {
    json!(["FunctionDecl", {"define": true}, [name(identifier), proto(result, params), block(body)]])
}

/// A prototype without a body
pub fn prototype(identifier: &str, result: Json, params: Vec<Json>) -> Json {
    json!(["FunctionDecl", {}, [name(identifier), proto(result, params)]])
}

pub fn var(name: &str, ty: Json) -> Json {
    json!(["VarDecl", {"name": name}, [ty]])
}

pub fn var_init(name: &str, ty: Json, init: Json) -> Json {
    json!(["VarDecl", {"name": name}, [ty, init]])
}

/// `T name [= init];` as a statement
pub fn decl(var: Json) -> Json {
    json!(["DeclStmt", {}, [var]])
}

pub fn block(stmts: Vec<Json>) -> Json {
    json!(["CompoundStmt", {}, stmts])
}

pub fn ret(expr: Json) -> Json {
    json!(["ReturnStmt", {}, [expr]])
}

pub fn if_else(cond: Json, then: Json, otherwise: Option<Json>) -> Json {
    match otherwise {
        Some(otherwise) => json!(["IfStmt", {}, [cond, then, otherwise]]),
        None => json!(["IfStmt", {}, [cond, then]]),
    }
}

pub fn while_loop(cond: Json, body: Json) -> Json {
    json!(["WhileStmt", {}, [cond, body]])
}

pub fn do_loop(body: Json, cond: Json) -> Json {
    json!(["DoStmt", {}, [body, cond]])
}

pub fn for_loop(init: Json, cond: Json, inc: Json, body: Json) -> Json {
    json!(["ForStmt", {}, [init, cond, inc, body]])
}

pub fn brk() -> Json {
    json!(["BreakStmt", {}, []])
}

pub fn cont() -> Json {
    json!(["ContinueStmt", {}, []])
}

pub fn lit(n: i64) -> Json {
    json!(["IntegerLiteral", {"value": n.to_string()}, []])
}

pub fn float(x: &str) -> Json {
    json!(["FloatingLiteral", {"value": x}, []])
}

pub fn chr(c: char) -> Json {
    json!(["CharacterLiteral", {"value": c as u32}, []])
}

pub fn string(text: &str) -> Json {
    json!(["StringLiteral", {"value": format!("\"{}\"", text)}, []])
}

pub fn refer(identifier: &str) -> Json {
    json!(["DeclRefExpr", {}, [name(identifier)]])
}

pub fn bin(op: &str, lhs: Json, rhs: Json) -> Json {
    json!(["BinaryOperator", {"opcode": op}, [lhs, rhs]])
}

pub fn assign(lhs: Json, rhs: Json) -> Json {
    bin("Assign", lhs, rhs)
}

pub fn compound_assign(op: &str, lhs: Json, rhs: Json) -> Json {
    json!(["CompoundAssignOperator", {"opcode": format!("{}Assign", op)}, [lhs, rhs]])
}

pub fn unary(op: &str, operand: Json) -> Json {
    json!(["UnaryOperator", {"opcode": op}, [operand]])
}

pub fn cast(expr: Json, ty: Json) -> Json {
    json!(["ImplicitCastExpr", {}, [expr, ty]])
}

pub fn c_cast(ty: Json, expr: Json) -> Json {
    json!(["CStyleCastExpr", {}, [ty, expr]])
}

pub fn call(callee: &str, args: Vec<Json>) -> Json {
    let mut children = vec![refer(callee)];
    children.extend(args);
    json!(["CallExpr", {}, children])
}

pub fn index(base: Json, index: Json) -> Json {
    json!(["ArraySubscriptExpr", {}, [base, index]])
}

pub fn member(object: Json, field: &str) -> Json {
    json!(["MemberExpr", {"isArrow": false}, [name(field), object]])
}

pub fn arrow(object: Json, field: &str) -> Json {
    json!(["MemberExpr", {"isArrow": true}, [name(field), object]])
}

pub fn sizeof(operand: Json) -> Json {
    json!(["UnaryExprOrTypeTraitExpr", {"name": "sizeof"}, [operand]])
}

pub fn init_list(items: Vec<Json>) -> Json {
    json!(["InitListExpr", {}, items])
}

/// `int main() { body }`
pub fn main_fn(body: Vec<Json>) -> Json {
    func("main", int_t(), vec![], body)
}

pub fn program(decls: Vec<Json>) -> Program {
    Program::from_value(Json::Array(decls)).expect("test program should load")
}

pub fn interpreter(decls: Vec<Json>, builtins: Builtins) -> Interpreter {
    Interpreter::new(&program(decls), builtins, Options::default()).expect("bootstrap failed")
}

/// Run the program to completion and return `main`'s result as an integer
pub fn run_main(decls: Vec<Json>) -> i128 {
    run_with(decls, Builtins::new())
}

pub fn run_with(decls: Vec<Json>, builtins: Builtins) -> i128 {
    let mut interpreter = interpreter(decls, builtins);
    interpreter.run().expect("execution failed");
    interpreter
        .result()
        .and_then(|value| value.to_integer())
        .expect("main returned no integer")
}
