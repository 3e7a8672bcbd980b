//! Shared fixtures for the compiler integration tests

#![allow(dead_code)]

use cinder_compiler::ast::{BinaryOperator as Op, Expr, Stmt, SwitchCase, Tree};
use cinder_compiler::ast::Block;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn bin(op: Op, lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(op, lhs, rhs)
}

fn set(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(Expr::ident(name), value))
}

fn id(name: &str) -> Expr {
    Expr::ident(name)
}

fn main_calling(callee: &str, args: Vec<Expr>) -> Stmt {
    Stmt::func(
        "main",
        &[],
        vec![Stmt::expr(Expr::call("println", vec![Expr::call(callee, args)]))],
    )
}

/// `fn pick(x) { if (x) { y = 1 } else { y = 2 } return y }`
pub fn diamond() -> Tree {
    Tree::new(vec![
        Stmt::func(
            "pick",
            &["x"],
            vec![
                Stmt::if_else(
                    id("x"),
                    vec![set("y", Expr::int(1))],
                    Some(vec![set("y", Expr::int(2))]),
                ),
                Stmt::ret(Some(id("y"))),
            ],
        ),
        main_calling("pick", vec![Expr::int(1)]),
    ])
}

/// A for loop that breaks out early, followed by a while loop so the
/// for loop's exit block is nothing but a jump.
pub fn loop_with_break() -> Tree {
    Tree::new(vec![Stmt::func(
        "main",
        &[],
        vec![
            set("s", Expr::int(0)),
            Stmt::for_loop(
                Some(Expr::assign(id("i"), Expr::int(0))),
                Some(bin(Op::Lt, id("i"), Expr::int(3))),
                Some(Expr::assign(id("i"), bin(Op::Add, id("i"), Expr::int(1)))),
                vec![
                    Stmt::if_else(
                        bin(Op::Eq, id("i"), Expr::int(2)),
                        vec![Stmt::Break],
                        None,
                    ),
                    set("s", bin(Op::Add, id("s"), id("i"))),
                ],
            ),
            Stmt::while_loop(
                bin(Op::Gt, id("s"), Expr::int(100)),
                vec![set("s", bin(Op::Sub, id("s"), Expr::int(1)))],
            ),
            Stmt::ret(Some(id("s"))),
        ],
    )])
}

/// Two nested while loops with a `continue` in the inner one
pub fn nested_loops() -> Tree {
    Tree::new(vec![
        Stmt::func(
            "tally",
            &["n"],
            vec![
                set("total", Expr::int(0)),
                set("i", Expr::int(0)),
                Stmt::while_loop(
                    bin(Op::Lt, id("i"), id("n")),
                    vec![
                        set("j", Expr::int(0)),
                        Stmt::while_loop(
                            bin(Op::Lt, id("j"), id("i")),
                            vec![
                                set("j", bin(Op::Add, id("j"), Expr::int(1))),
                                Stmt::if_else(
                                    bin(
                                        Op::Eq,
                                        bin(Op::Mod, id("j"), Expr::int(2)),
                                        Expr::int(0),
                                    ),
                                    vec![Stmt::Continue],
                                    None,
                                ),
                                set("total", bin(Op::Add, id("total"), id("j"))),
                            ],
                        ),
                        set("i", bin(Op::Add, id("i"), Expr::int(1))),
                    ],
                ),
                Stmt::ret(Some(id("total"))),
            ],
        ),
        main_calling("tally", vec![Expr::int(5)]),
    ])
}

/// A switch whose every path assigns `r`
pub fn classify() -> Tree {
    let case = |value: i64, result: i64| SwitchCase {
        value: Expr::int(value),
        body: Block::new(vec![set("r", Expr::int(result))]),
    };
    Tree::new(vec![
        Stmt::func(
            "classify",
            &["v"],
            vec![
                Stmt::Switch {
                    scrutinee: id("v"),
                    cases: vec![case(1, 10), case(2, 20)],
                    default: Some(Block::new(vec![set("r", Expr::int(0))])),
                },
                Stmt::ret(Some(id("r"))),
            ],
        ),
        main_calling("classify", vec![Expr::int(2)]),
    ])
}

/// Rotates two variables through a temporary inside a loop
pub fn swap_loop() -> Tree {
    Tree::new(vec![
        Stmt::func(
            "swap",
            &["n"],
            vec![
                set("a", Expr::int(1)),
                set("b", Expr::int(2)),
                set("i", Expr::int(0)),
                Stmt::while_loop(
                    bin(Op::Lt, id("i"), id("n")),
                    vec![
                        set("t", id("a")),
                        set("a", id("b")),
                        set("b", id("t")),
                        set("i", bin(Op::Add, id("i"), Expr::int(1))),
                    ],
                ),
                Stmt::ret(Some(bin(Op::Sub, id("a"), id("b")))),
            ],
        ),
        main_calling("swap", vec![Expr::int(3)]),
    ])
}

/// Globals, arrays, indexed stores and calls between user functions
pub fn arrays_and_globals() -> Tree {
    Tree::new(vec![
        set("limit", bin(Op::Mul, Expr::int(2), Expr::int(4))),
        set("grid", Expr::array(vec![Expr::int(0), Expr::int(0), Expr::int(0)])),
        Stmt::func(
            "fill",
            &["k"],
            vec![
                set("i", Expr::int(0)),
                Stmt::while_loop(
                    bin(Op::Lt, id("i"), Expr::int(3)),
                    vec![
                        Stmt::expr(Expr::assign(
                            Expr::index("grid", vec![id("i")]),
                            bin(Op::Mul, id("k"), id("i")),
                        )),
                        set("i", bin(Op::Add, id("i"), Expr::int(1))),
                    ],
                ),
                Stmt::ret(Some(Expr::index("grid", vec![Expr::int(2)]))),
            ],
        ),
        Stmt::func(
            "main",
            &[],
            vec![
                set("row", Expr::array(vec![Expr::int(1), id("limit")])),
                Stmt::expr(Expr::call("print", vec![Expr::call("fill", vec![id("limit")])])),
                Stmt::ret(Some(Expr::index("row", vec![Expr::int(1)]))),
            ],
        ),
    ])
}

/// Identifiers shaped like compiler temporaries, versioned slots and block
/// labels, used as globals, locals, parameters and a function name
pub fn lookalike_names() -> Tree {
    Tree::new(vec![
        set("x_1", Expr::int(3)),
        Stmt::func(
            "t0",
            &["t1_0"],
            vec![
                set("x_2", Expr::int(0)),
                set("t1", Expr::int(0)),
                Stmt::while_loop(
                    bin(Op::Lt, id("t1"), id("t1_0")),
                    vec![
                        Stmt::if_else(
                            bin(Op::Eq, bin(Op::Mod, id("t1"), Expr::int(2)), Expr::int(0)),
                            vec![set("x_2", bin(Op::Add, id("x_2"), id("x_1")))],
                            Some(vec![set("x_2", bin(Op::Sub, id("x_2"), Expr::int(1)))]),
                        ),
                        set("t1", bin(Op::Add, id("t1"), Expr::int(1))),
                    ],
                ),
                Stmt::ret(Some(bin(Op::Add, id("x_2"), bin(Op::Mul, id("t1"), Expr::int(2))))),
            ],
        ),
        Stmt::func(
            "main",
            &[],
            vec![
                set("L0", Expr::call("t0", vec![Expr::int(4)])),
                Stmt::expr(Expr::call("print", vec![id("L0")])),
            ],
        ),
    ])
}

/// Every named fixture, for property sweeps
pub fn all() -> Vec<(&'static str, Tree)> {
    vec![
        ("diamond", diamond()),
        ("loop_with_break", loop_with_break()),
        ("nested_loops", nested_loops()),
        ("classify", classify()),
        ("swap_loop", swap_loop()),
        ("arrays_and_globals", arrays_and_globals()),
        ("lookalike_names", lookalike_names()),
    ]
}
