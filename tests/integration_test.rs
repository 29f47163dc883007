// Integration tests for the interpreter

mod common;

use common::*;
use cstep::interpreter::builtins::{self, Builtins};
use cstep::interpreter::control::{Control, Outcome};
use cstep::interpreter::driver::{self, Interpreter, Options};
use cstep::interpreter::engine::{Direction, State};
use cstep::interpreter::errors::RuntimeError;
use cstep::memory::stack::{self, ScopeKind};
use cstep::memory::value::Value;
use cstep::memory::AccessKind;
use cstep::snapshot::inspect_pointer;
use std::cell::RefCell;
use std::rc::Rc;

fn function_frames(state: &State) -> usize {
    stack::frames(&state.scope)
        .filter(|frame| matches!(frame.kind, ScopeKind::Function { .. }))
        .count()
}

/// A `print_int` builtin that records its argument
fn recording_builtins() -> (Builtins, Rc<RefCell<Vec<i128>>>) {
    let output = Rc::new(RefCell::new(Vec::new()));
    let sink = output.clone();
    let mut table = Builtins::new();
    table.register("print_int", move |_: &State, _: &Rc<Control>, values: &[Value]| {
        let n = builtins::argument("print_int", values, 0)?;
        sink.borrow_mut().push(n.to_integer().unwrap_or_default());
        builtins::returns_void()
    });
    (table, output)
}

#[test]
fn test_simple_arithmetic() {
    let result = run_main(vec![main_fn(vec![
        decl(var_init("x", int_t(), lit(5))),
        decl(var_init("y", int_t(), lit(10))),
        decl(var_init("z", int_t(), bin("Add", refer("x"), refer("y")))),
        ret(refer("z")),
    ])]);
    assert_eq!(result, 15);
}

#[test]
fn test_main_without_return_yields_zero() {
    let mut interpreter = interpreter(vec![main_fn(vec![decl(var_init("x", int_t(), lit(5)))])], Builtins::new());
    interpreter.run().unwrap();
    assert_eq!(interpreter.result(), Some(&Value::int(0)));
}

#[test]
fn test_missing_main() {
    let program = program(vec![decl_global("g")]);
    let err = Interpreter::new(&program, Builtins::new(), Options::default()).unwrap_err();
    assert_eq!(err, RuntimeError::NoMainFunction);
}

fn decl_global(name: &str) -> serde_json::Value {
    var_init(name, int_t(), lit(1))
}

#[test]
fn test_function_call() {
    let result = run_main(vec![
        func(
            "add",
            int_t(),
            vec![param("a", int_t()), param("b", int_t())],
            vec![ret(bin("Add", refer("a"), refer("b")))],
        ),
        main_fn(vec![
            decl(var_init("result", int_t(), call("add", vec![lit(3), lit(4)]))),
            ret(refer("result")),
        ]),
    ]);
    assert_eq!(result, 7);
}

#[test]
fn test_recursion() {
    // int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); }
    let result = run_main(vec![
        func(
            "fact",
            int_t(),
            vec![param("n", int_t())],
            vec![
                if_else(bin("LE", refer("n"), lit(1)), ret(lit(1)), None),
                ret(bin(
                    "Mul",
                    refer("n"),
                    call("fact", vec![bin("Sub", refer("n"), lit(1))]),
                )),
            ],
        ),
        main_fn(vec![ret(call("fact", vec![lit(5)]))]),
    ]);
    assert_eq!(result, 120);
}

#[test]
fn test_prototype_before_definition() {
    let result = run_main(vec![
        prototype("twice", int_t(), vec![param("n", int_t())]),
        main_fn(vec![ret(call("twice", vec![lit(21)]))]),
        func(
            "twice",
            int_t(),
            vec![param("n", int_t())],
            vec![ret(bin("Mul", refer("n"), lit(2)))],
        ),
    ]);
    assert_eq!(result, 42);
}

#[test]
fn test_undefined_prototype() {
    let program = program(vec![
        prototype("missing", int_t(), vec![]),
        main_fn(vec![ret(lit(0))]),
    ]);
    let err = Interpreter::new(&program, Builtins::new(), Options::default()).unwrap_err();
    assert!(matches!(err, RuntimeError::UndefinedFunction { name } if name == "missing"));
}

#[test]
fn test_locals_are_not_visible_to_callees() {
    let program = program(vec![
        func("peek", int_t(), vec![], vec![ret(refer("secret"))]),
        main_fn(vec![
            decl(var_init("secret", int_t(), lit(7))),
            ret(call("peek", vec![])),
        ]),
    ]);
    let mut interpreter = Interpreter::new(&program, Builtins::new(), Options::default()).unwrap();
    let err = interpreter.run().unwrap_err();
    assert!(matches!(err, RuntimeError::UndefinedVariable { name } if name == "secret"));
}

#[test]
fn test_global_variables() {
    let result = run_main(vec![
        var_init("counter", int_t(), lit(40)),
        func(
            "bump",
            ty("void"),
            vec![],
            vec![unary("PostInc", refer("counter"))],
        ),
        main_fn(vec![
            call("bump", vec![]),
            call("bump", vec![]),
            ret(refer("counter")),
        ]),
    ]);
    assert_eq!(result, 42);
}

#[test]
fn test_scopes_are_balanced_after_run() {
    let mut interpreter = interpreter(
        vec![main_fn(vec![
            decl(var_init("sum", int_t(), lit(0))),
            for_loop(
                decl(var_init("i", int_t(), lit(0))),
                bin("LT", refer("i"), lit(3)),
                unary("PostInc", refer("i")),
                block(vec![
                    decl(var_init("t", int_t(), refer("i"))),
                    compound_assign("Add", refer("sum"), refer("t")),
                ]),
            ),
            ret(refer("sum")),
        ])],
        Builtins::new(),
    );
    interpreter.run().unwrap();
    assert_eq!(interpreter.result(), Some(&Value::int(3)));
    assert!(interpreter.state().scope.is_root());
}

#[test]
fn test_while_loop() {
    let result = run_main(vec![main_fn(vec![
        decl(var_init("n", int_t(), lit(0))),
        while_loop(
            bin("LT", refer("n"), lit(10)),
            block(vec![compound_assign("Add", refer("n"), lit(3))]),
        ),
        ret(refer("n")),
    ])]);
    assert_eq!(result, 12);
}

#[test]
fn test_do_while_runs_body_first() {
    let result = run_main(vec![main_fn(vec![
        decl(var_init("n", int_t(), lit(100))),
        do_loop(
            block(vec![unary("PreInc", refer("n"))]),
            bin("LT", refer("n"), lit(5)),
        ),
        ret(refer("n")),
    ])]);
    assert_eq!(result, 101);
}

#[test]
fn test_break_and_continue() {
    // for (i = 0; i < 10; i++) { if (i % 2 == 0) continue; if (i == 7) break; sum += i; }
    let result = run_main(vec![main_fn(vec![
        decl(var_init("sum", int_t(), lit(0))),
        for_loop(
            decl(var_init("i", int_t(), lit(0))),
            bin("LT", refer("i"), lit(10)),
            unary("PostInc", refer("i")),
            block(vec![
                if_else(
                    bin("EQ", bin("Rem", refer("i"), lit(2)), lit(0)),
                    cont(),
                    None,
                ),
                if_else(bin("EQ", refer("i"), lit(7)), brk(), None),
                compound_assign("Add", refer("sum"), refer("i")),
            ]),
        ),
        ret(refer("sum")),
    ])]);
    assert_eq!(result, 9);
}

#[test]
fn test_break_inside_nested_block_leaves_frames() {
    let mut interpreter = interpreter(
        vec![main_fn(vec![
            decl(var_init("n", int_t(), lit(0))),
            while_loop(
                lit(1),
                block(vec![
                    decl(var_init("inner", int_t(), lit(1))),
                    block(vec![unary("PreInc", refer("n")), brk()]),
                ]),
            ),
            ret(refer("n")),
        ])],
        Builtins::new(),
    );
    interpreter.run().unwrap();
    assert_eq!(interpreter.result(), Some(&Value::int(1)));
    assert!(interpreter.state().scope.is_root());
}

#[test]
fn test_break_outside_loop() {
    let program = program(vec![main_fn(vec![brk()])]);
    let mut interpreter = Interpreter::new(&program, Builtins::new(), Options::default()).unwrap();
    assert!(matches!(
        interpreter.run(),
        Err(RuntimeError::BreakOutsideLoop { .. })
    ));
}

#[test]
fn test_arrays_and_short_initializer() {
    // int a[5] = {1, 2}; return a[0] + a[1] + a[4];
    let result = run_main(vec![main_fn(vec![
        decl(var_init("a", array(int_t(), 5), init_list(vec![lit(1), lit(2)]))),
        ret(bin(
            "Add",
            bin("Add", index(refer("a"), lit(0)), index(refer("a"), lit(1))),
            index(refer("a"), lit(4)),
        )),
    ])]);
    assert_eq!(result, 3);
}

#[test]
fn test_incomplete_array_takes_initializer_size() {
    let result = run_main(vec![main_fn(vec![
        decl(var_init(
            "a",
            incomplete_array(ty("short")),
            init_list(vec![lit(1), lit(2), lit(3)]),
        )),
        ret(sizeof(refer("a"))),
    ])]);
    assert_eq!(result, 6);
}

#[test]
fn test_pointer_arithmetic_scales() {
    // int a[3] = {10, 20, 30}; int *p = a; p = p + 2; return *p + (p - a);
    let result = run_main(vec![main_fn(vec![
        decl(var_init("a", array(int_t(), 3), init_list(vec![lit(10), lit(20), lit(30)]))),
        decl(var_init("p", ptr(int_t()), refer("a"))),
        assign(refer("p"), bin("Add", refer("p"), lit(2))),
        ret(bin(
            "Add",
            unary("Deref", refer("p")),
            bin("Sub", refer("p"), refer("a")),
        )),
    ])]);
    assert_eq!(result, 32);
}

#[test]
fn test_write_through_pointer() {
    let result = run_main(vec![
        func(
            "set",
            ty("void"),
            vec![param("p", ptr(int_t())), param("v", int_t())],
            vec![assign(unary("Deref", refer("p")), refer("v"))],
        ),
        main_fn(vec![
            decl(var_init("x", int_t(), lit(1))),
            call("set", vec![unary("AddrOf", refer("x")), lit(99)]),
            ret(refer("x")),
        ]),
    ]);
    assert_eq!(result, 99);
}

#[test]
fn test_null_dereference() {
    let program = program(vec![main_fn(vec![
        decl(var_init("p", ptr(int_t()), c_cast(ptr(int_t()), lit(0)))),
        ret(unary("Deref", refer("p"))),
    ])]);
    let mut interpreter = Interpreter::new(&program, Builtins::new(), Options::default()).unwrap();
    assert!(matches!(
        interpreter.run(),
        Err(RuntimeError::NullDereference { .. })
    ));
}

#[test]
fn test_struct_fields() {
    // struct Point { int x; int y; }; struct Point p; p.x = 3; p.y = 4; return p.x * p.y;
    let result = run_main(vec![
        record("Point", vec![field("x", int_t()), field("y", int_t())]),
        main_fn(vec![
            decl(var("p", record_t("Point"))),
            assign(member(refer("p"), "x"), lit(3)),
            assign(member(refer("p"), "y"), lit(4)),
            ret(bin("Mul", member(refer("p"), "x"), member(refer("p"), "y"))),
        ]),
    ]);
    assert_eq!(result, 12);
}

#[test]
fn test_self_referential_struct() {
    // struct Node { int v; struct Node *next; };
    let result = run_main(vec![
        record(
            "Node",
            vec![field("v", int_t()), field("next", ptr(record_t("Node")))],
        ),
        main_fn(vec![
            decl(var("a", record_t("Node"))),
            decl(var("b", record_t("Node"))),
            assign(member(refer("b"), "v"), lit(8)),
            assign(member(refer("a"), "next"), unary("AddrOf", refer("b"))),
            ret(arrow(member(refer("a"), "next"), "v")),
        ]),
    ]);
    assert_eq!(result, 8);
}

#[test]
fn test_struct_initializer_and_sizeof() {
    let result = run_main(vec![
        record("Pair", vec![field("a", ty("char")), field("b", int_t())]),
        main_fn(vec![
            decl(var_init("p", record_t("Pair"), init_list(vec![lit(1), lit(2)]))),
            // Fields are packed without padding
            ret(bin("Add", sizeof(refer("p")), member(refer("p"), "b"))),
        ]),
    ]);
    assert_eq!(result, 7);
}

#[test]
fn test_undeclared_record() {
    let program = program(vec![main_fn(vec![decl(var("p", record_t("Nope")))])]);
    let mut interpreter = Interpreter::new(&program, Builtins::new(), Options::default()).unwrap();
    assert!(matches!(
        interpreter.run(),
        Err(RuntimeError::UndeclaredRecord { name }) if name == "Nope"
    ));
}

#[test]
fn test_function_pointer() {
    let fn_ptr = ptr(proto(int_t(), vec![param("n", int_t())]));
    let result = run_main(vec![
        func(
            "square",
            int_t(),
            vec![param("n", int_t())],
            vec![ret(bin("Mul", refer("n"), refer("n")))],
        ),
        main_fn(vec![
            decl(var_init("f", fn_ptr, refer("square"))),
            ret(call("f", vec![lit(6)])),
        ]),
    ]);
    assert_eq!(result, 36);
}

#[test]
fn test_builtin_call() {
    let (builtins, output) = recording_builtins();
    let result = run_with(
        vec![
            prototype("print_int", ty("void"), vec![param("n", int_t())]),
            main_fn(vec![
                for_loop(
                    decl(var_init("i", int_t(), lit(1))),
                    bin("LE", refer("i"), lit(3)),
                    unary("PreInc", refer("i")),
                    call("print_int", vec![bin("Mul", refer("i"), lit(10))]),
                ),
                ret(lit(0)),
            ]),
        ],
        builtins,
    );
    assert_eq!(result, 0);
    assert_eq!(*output.borrow(), vec![10, 20, 30]);
}

#[test]
fn test_string_literal_array() {
    // char s[] = "hi"; return sizeof(s) * 1000 + s[1];
    let result = run_main(vec![main_fn(vec![
        decl(var_init("s", incomplete_array(ty("char")), string("hi"))),
        ret(bin(
            "Add",
            bin("Mul", sizeof(refer("s")), lit(1000)),
            cast(index(refer("s"), lit(1)), int_t()),
        )),
    ])]);
    assert_eq!(result, 3105);
}

#[test]
fn test_string_literal_numeric_escapes() {
    // char s[] = "\x41"; char t[] = "\101\0"; return sizeof(s) * 10 + sizeof(t) + s[0] - t[0];
    let result = run_main(vec![main_fn(vec![
        decl(var_init("s", incomplete_array(ty("char")), string("\\x41"))),
        decl(var_init("t", incomplete_array(ty("char")), string("\\101\\0"))),
        ret(bin(
            "Sub",
            bin(
                "Add",
                bin("Add", bin("Mul", sizeof(refer("s")), lit(10)), sizeof(refer("t"))),
                cast(index(refer("s"), lit(0)), int_t()),
            ),
            cast(index(refer("t"), lit(0)), int_t()),
        )),
    ])]);
    assert_eq!(result, 23);
}

#[test]
fn test_string_literals_live_in_static_storage() {
    let interpreter = interpreter(
        vec![main_fn(vec![decl(var_init("s", ptr(ty("char")), string("abc")))])],
        Builtins::new(),
    );
    let state = interpreter.state();
    assert_eq!(state.literals.len(), 1);
    let storage = state.literals.values().next().unwrap();
    assert_eq!(storage.address, Options::default().heap_start);
    assert_eq!(state.memory.read_c_string(storage.address, None).unwrap(), "abc");
    assert_eq!(state.heap_start, storage.address + 4);
}

#[test]
fn test_sizeof_has_no_side_effects() {
    let result = run_main(vec![main_fn(vec![
        decl(var_init("x", int_t(), lit(1))),
        decl(var_init("n", int_t(), sizeof(unary("PostInc", refer("x"))))),
        ret(bin("Add", bin("Mul", refer("n"), lit(10)), refer("x"))),
    ])]);
    assert_eq!(result, 41);
}

#[test]
fn test_conditional_operator() {
    let result = run_main(vec![main_fn(vec![
        decl(var_init("x", int_t(), lit(3))),
        ret(json_conditional(bin("GT", refer("x"), lit(2)), lit(1), lit(2))),
    ])]);
    assert_eq!(result, 1);
}

fn json_conditional(cond: serde_json::Value, then: serde_json::Value, otherwise: serde_json::Value) -> serde_json::Value {
    serde_json::json!(["ConditionalOperator", {}, [cond, then, otherwise]])
}

#[test]
fn test_step_limit() {
    let program = program(vec![main_fn(vec![while_loop(lit(1), block(vec![]))])]);
    let options = Options {
        step_limit: Some(500),
        ..Options::default()
    };
    let mut interpreter = Interpreter::new(&program, Builtins::new(), options).unwrap();
    assert_eq!(
        interpreter.run(),
        Err(RuntimeError::StepLimitExceeded { limit: 500 })
    );
}

fn two_calls() -> Vec<serde_json::Value> {
    vec![
        func(
            "f",
            int_t(),
            vec![],
            vec![
                decl(var_init("a", int_t(), lit(1))),
                decl(var_init("b", int_t(), lit(2))),
                ret(bin("Add", refer("a"), refer("b"))),
            ],
        ),
        main_fn(vec![
            decl(var_init("r", int_t(), call("f", vec![]))),
            assign(refer("r"), bin("Add", refer("r"), lit(1))),
            ret(refer("r")),
        ]),
    ]
}

#[test]
fn test_step_into_stops_at_statements() {
    let mut state = driver::start(&program(two_calls()), Builtins::new(), &Options::default()).unwrap();
    state = driver::step_into(&state).unwrap();
    assert_eq!(state.control.control().unwrap().node.kind.as_str(), "DeclStmt");
    assert_eq!(state.direction, Direction::Down);
    assert_eq!(function_frames(&state), 1);

    // Into f's first statement
    state = driver::step_into(&state).unwrap();
    assert_eq!(state.control.control().unwrap().node.kind.as_str(), "DeclStmt");
    assert_eq!(function_frames(&state), 2);
}

#[test]
fn test_step_over_skips_calls() {
    let mut state = driver::start(&program(two_calls()), Builtins::new(), &Options::default()).unwrap();
    state = driver::step_into(&state).unwrap();
    state = driver::step_over(&state).unwrap();
    let control = state.control.control().unwrap();
    assert_eq!(control.node.kind.as_str(), "BinaryOperator");
    assert_eq!(function_frames(&state), 1);
    let r = stack::resolve_name(&state.scope, "r").unwrap();
    assert_eq!(state.read(&r).unwrap(), Value::int(3));
}

#[test]
fn test_step_out_returns_to_caller() {
    let mut state = driver::start(&program(two_calls()), Builtins::new(), &Options::default()).unwrap();
    state = driver::step_into(&state).unwrap();
    state = driver::step_into(&state).unwrap();
    assert_eq!(function_frames(&state), 2);

    state = driver::step_out(&state).unwrap();
    assert!(!state.is_halted());
    assert_eq!(function_frames(&state), 1);
    assert_eq!(state.direction, Direction::Out);
    assert!(matches!(state.result, Some(Outcome::Value(ref v)) if *v == Value::int(3)));

    let end = driver::run(state, None).unwrap();
    assert_eq!(end.result_value(), Some(&Value::int(4)));
}

#[test]
fn test_step_out_of_main_runs_to_end() {
    let mut state = driver::start(&program(two_calls()), Builtins::new(), &Options::default()).unwrap();
    state = driver::step_into(&state).unwrap();
    state = driver::step_out(&state).unwrap();
    assert_eq!(function_frames(&state), 0);
    assert!(state.scope.is_root());
    assert_eq!(state.result_value(), Some(&Value::int(4)));

    // One more step hands the result to the halt continuation
    state = driver::step(&state).unwrap();
    assert!(state.is_halted());
    assert_eq!(state.result_value(), Some(&Value::int(4)));
}

#[test]
fn test_step_expr_is_finer_than_statements() {
    let start = driver::start(&program(two_calls()), Builtins::new(), &Options::default()).unwrap();
    let count = |advance: fn(&State) -> Result<State, RuntimeError>| {
        let mut state = start.clone();
        let mut n = 0;
        while !state.is_halted() {
            state = advance(&state).unwrap();
            n += 1;
        }
        n
    };
    let exprs = count(driver::step_expr);
    let stmts = count(driver::step_into);
    let overs = count(driver::step_over);
    assert!(exprs > stmts);
    assert!(stmts > overs);
}

#[test]
fn test_stepping_leaves_old_states_intact() {
    let start = driver::start(&program(two_calls()), Builtins::new(), &Options::default()).unwrap();
    let first = driver::step_into(&start).unwrap();
    let second = driver::step_into(&first).unwrap();
    assert_ne!(function_frames(&first), function_frames(&second));
    // Stepping from the same state again gives the same result
    let again = driver::step_into(&first).unwrap();
    assert_eq!(function_frames(&again), function_frames(&second));
    assert_eq!(again.memory.bytes(), second.memory.bytes());
}

#[test]
fn test_history_backward_and_forward() {
    let mut interpreter = interpreter(two_calls(), Builtins::new());
    assert_eq!(interpreter.total_snapshots(), 1);

    interpreter.step_into().unwrap();
    interpreter.step_into().unwrap();
    interpreter.step_into().unwrap();
    assert_eq!(interpreter.history_position(), 3);
    let frames = function_frames(interpreter.state());

    assert!(interpreter.step_backward());
    assert_eq!(interpreter.history_position(), 2);
    interpreter.step_forward().unwrap();
    assert_eq!(interpreter.history_position(), 3);
    assert_eq!(function_frames(interpreter.state()), frames);

    interpreter.rewind_to_start();
    assert_eq!(interpreter.history_position(), 0);
    assert!(!interpreter.step_backward());

    // Stepping from the past discards the old future
    interpreter.step_over().unwrap();
    assert_eq!(interpreter.total_snapshots(), 2);

    interpreter.run().unwrap();
    assert!(interpreter.is_finished());
    assert_eq!(interpreter.result(), Some(&Value::int(4)));
    assert_eq!(interpreter.step_into(), Err(RuntimeError::Halted));
}

#[test]
fn test_memory_log_and_inspection() {
    let mut interpreter = interpreter(
        vec![main_fn(vec![
            decl(var_init("x", int_t(), lit(1))),
            assign(refer("x"), lit(5)),
            ret(refer("x")),
        ])],
        Builtins::new(),
    );
    interpreter.step_into().unwrap(); // at `int x = 1;`
    interpreter.step_into().unwrap(); // at `x = 5;`
    interpreter.step_into().unwrap(); // at `return x;`

    let state = interpreter.state();
    let x = stack::resolve_name(&state.scope, "x").unwrap();
    let log = &state.memory_log;
    assert!(log.iter().all(|entry| entry.kind != AccessKind::Load));
    let old = interpreter.previous_memory().unwrap();
    let inspection = inspect_pointer(&x, log, &state.memory, old).unwrap();
    assert_eq!(inspection.entry.kind, AccessKind::Store);
    assert_eq!(inspection.current, Some(Value::int(5)));
    assert_eq!(inspection.previous, Some(Value::int(1)));
}

#[test]
fn test_multidimensional_subscript() {
    // int m[2][3] = {{1, 2, 3}, {4, 5, 6}}; return m[1][2];
    let result = run_main(vec![main_fn(vec![
        decl(var_init(
            "m",
            array(array(int_t(), 3), 2),
            init_list(vec![
                init_list(vec![lit(1), lit(2), lit(3)]),
                init_list(vec![lit(4), lit(5), lit(6)]),
            ]),
        )),
        ret(index(index(refer("m"), lit(1)), lit(2))),
    ])]);
    assert_eq!(result, 6);
}

fn point_with_array() -> serde_json::Value {
    record("P", vec![field("x", int_t()), field("a", array(int_t(), 3))])
}

#[test]
fn test_struct_array_elements() {
    // struct P ps[2]; ps[1].x = 7; ps[1].a[2] = 9; ps[0].x = 1;
    // return ps[1].a[2] * 10 + ps[1].x + ps[0].x * 100;
    let element = |i: i64| index(refer("ps"), lit(i));
    let result = run_main(vec![
        point_with_array(),
        main_fn(vec![
            decl(var("ps", array(record_t("P"), 2))),
            assign(member(element(1), "x"), lit(7)),
            assign(index(member(element(1), "a"), lit(2)), lit(9)),
            assign(member(element(0), "x"), lit(1)),
            ret(bin(
                "Add",
                bin(
                    "Add",
                    bin("Mul", index(member(element(1), "a"), lit(2)), lit(10)),
                    member(element(1), "x"),
                ),
                bin("Mul", member(element(0), "x"), lit(100)),
            )),
        ]),
    ]);
    assert_eq!(result, 197);
}

#[test]
fn test_array_field_through_pointer() {
    // struct P s; struct P *p = &s; p->a[1] = 4; s.a[2] = p->a[1] + 1; return s.a[2];
    let result = run_main(vec![
        point_with_array(),
        main_fn(vec![
            decl(var("s", record_t("P"))),
            decl(var_init("p", ptr(record_t("P")), unary("AddrOf", refer("s")))),
            assign(index(arrow(refer("p"), "a"), lit(1)), lit(4)),
            assign(
                index(member(refer("s"), "a"), lit(2)),
                bin("Add", index(arrow(refer("p"), "a"), lit(1)), lit(1)),
            ),
            ret(index(member(refer("s"), "a"), lit(2))),
        ]),
    ]);
    assert_eq!(result, 5);
}

/// An interpreter stopped right after `int r = <read>;`, the second statement
fn stopped_after_read(decls: Vec<serde_json::Value>) -> Interpreter {
    let mut interpreter = interpreter(decls, Builtins::new());
    interpreter.step_into().unwrap(); // at the first declaration
    interpreter.step_into().unwrap(); // at `int r = ...;`
    interpreter.step_into().unwrap(); // at `return r;`
    interpreter
}

fn assert_single_scalar_load(state: &State, address: u64) {
    let loads: Vec<_> = state
        .memory_log
        .iter()
        .filter(|entry| entry.kind == AccessKind::Load)
        .collect();
    assert_eq!(loads.len(), 1, "{:?}", state.memory_log);
    assert_eq!(loads[0].reference.address, address);
    assert_eq!(loads[0].reference.ty.pointee.to_string(), "int");
    assert!(state
        .memory_log
        .iter()
        .all(|entry| !entry.reference.ty.pointee.is_array()));
}

#[test]
fn test_subscript_chain_loads_only_the_element() {
    let interpreter = stopped_after_read(vec![main_fn(vec![
        decl(var_init(
            "m",
            array(array(int_t(), 3), 2),
            init_list(vec![init_list(vec![lit(1), lit(2), lit(3)]), init_list(vec![lit(4), lit(5), lit(6)])]),
        )),
        decl(var_init("r", int_t(), index(index(refer("m"), lit(1)), lit(2)))),
        ret(refer("r")),
    ])]);
    let state = interpreter.state();
    let m = stack::resolve_name(&state.scope, "m").unwrap();
    assert_single_scalar_load(state, m.address + 20);
    let stores = state.memory_log.iter().filter(|entry| entry.kind == AccessKind::Store);
    assert_eq!(stores.count(), 1);
}

#[test]
fn test_member_of_element_loads_only_the_field() {
    let interpreter = stopped_after_read(vec![
        point_with_array(),
        main_fn(vec![
            decl(var("ps", array(record_t("P"), 2))),
            decl(var_init("r", int_t(), index(member(index(refer("ps"), lit(1)), "a"), lit(2)))),
            ret(refer("r")),
        ]),
    ]);
    let state = interpreter.state();
    let ps = stack::resolve_name(&state.scope, "ps").unwrap();
    // Each P is 16 bytes; `a` starts 4 bytes in
    assert_single_scalar_load(state, ps.address + 16 + 4 + 8);
}
