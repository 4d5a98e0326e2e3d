//! Property-based tests with proptest.
//!
//! Generate random scripts, print them, parse them back, and verify the
//! parsed tree equals the original (line numbers are ignored by the
//! tree's equality) and that printing is idempotent.
//!
//! The generators stay inside the language's unambiguous surface:
//! statements never start with an open paren (a trailing property read
//! on the previous line would absorb it as an argument list), and every
//! local reference is to a binder currently in scope.

use proptest::prelude::*;
use refactor_script::ast::{Arm, Expr, ExprKind, Method, Script, Stmt, StmtKind};
use refactor_script::{parse, tokenize};

// -- Leaf strategies --

/// String literal contents: no quotes, hashes, or line breaks.
fn string_content() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:;_-]{0,12}"
}

/// Method names start uppercase so they can never collide with a
/// keyword or a `get_` property prefix.
fn method_name() -> impl Strategy<Value = String> {
    "M[a-z0-9]{0,6}"
}

fn property_name() -> impl Strategy<Value = String> {
    "P[a-z0-9]{0,6}"
}

fn type_name() -> impl Strategy<Value = String> {
    "T[a-z]{0,4}"
}

const BINARY_OPS: &[&str] = &[
    "op_LogicalOr",
    "op_LogicalAnd",
    "op_Equals",
    "op_NotEquals",
    "op_Add",
];

fn invoke(target: Expr, method: String, args: Vec<Expr>) -> Expr {
    Expr::new(
        ExprKind::Invoke {
            target: Box::new(target),
            method,
            args,
        },
        0,
    )
}

// -- Expression strategies --

/// An expression at a given depth referencing only `locals`.
fn expr(depth: u32, locals: Vec<String>) -> BoxedStrategy<Expr> {
    let literal = prop_oneof![
        Just(ExprKind::Null),
        any::<bool>().prop_map(ExprKind::Bool),
        Just(ExprKind::SelfRef),
        string_content().prop_map(ExprKind::Str),
    ];
    let leaf = if locals.is_empty() {
        literal.boxed()
    } else {
        prop_oneof![
            3 => literal,
            1 => proptest::sample::select(locals.clone()).prop_map(ExprKind::Local),
        ]
        .boxed()
    };
    let leaf = leaf.prop_map(|kind| Expr::new(kind, 0)).boxed();

    if depth == 0 {
        return leaf;
    }

    let sub = expr(depth - 1, locals.clone());

    let seq = prop::collection::vec(sub.clone(), 0..=3)
        .prop_map(|elements| Expr::new(ExprKind::Seq(elements), 0));

    let call = (
        sub.clone(),
        method_name(),
        prop::collection::vec(sub.clone(), 0..=2),
    )
        .prop_map(|(target, method, args)| invoke(target, method, args));

    let property = (sub.clone(), property_name())
        .prop_map(|(target, name)| invoke(target, format!("get_{name}"), Vec::new()));

    let binary = (
        sub.clone(),
        proptest::sample::select(BINARY_OPS),
        sub.clone(),
    )
        .prop_map(|(lhs, op, rhs)| invoke(lhs, (*op).to_string(), vec![rhs]));

    let complement = sub
        .clone()
        .prop_map(|target| invoke(target, "op_LogicalComplement".to_string(), Vec::new()));

    let is_type = (sub.clone(), type_name()).prop_map(|(target, name)| {
        let arg = Expr::new(ExprKind::TypeName(name), 0);
        invoke(target, "op_IsType".to_string(), vec![arg])
    });

    let when =
        (sub.clone(), sub.clone(), sub.clone()).prop_map(|(value, predicate, otherwise)| {
            Expr::new(
                ExprKind::When {
                    value: Box::new(value),
                    predicate: Box::new(predicate),
                    otherwise: Box::new(otherwise),
                },
                0,
            )
        });

    let from = from_expr(depth, locals);

    prop_oneof![
        4 => leaf,
        1 => seq,
        2 => call,
        1 => property,
        1 => binary,
        1 => complement,
        1 => is_type,
        1 => when,
        1 => from,
    ]
    .boxed()
}

/// A `from` expression binding `q{depth}`; nesting levels get distinct
/// binder names so scopes never collide.
fn from_expr(depth: u32, locals: Vec<String>) -> BoxedStrategy<Expr> {
    let local = format!("q{depth}");
    let mut inner = locals.clone();
    inner.push(local.clone());

    (
        expr(depth - 1, locals),
        prop::option::of(expr(depth - 1, inner.clone())),
        expr(depth - 1, inner),
    )
        .prop_map(move |(source, filter, select)| {
            Expr::new(
                ExprKind::From {
                    local: local.clone(),
                    source: Box::new(source),
                    filter: filter.map(Box::new),
                    select: Box::new(select),
                },
                0,
            )
        })
        .boxed()
}

// -- Statement strategies --

const EXPR_DEPTH: u32 = 2;

/// An expression statement: always an explicit call on a leaf target,
/// so the printed form ends with a close paren and never starts with an
/// open one.
fn call_stmt(locals: Vec<String>) -> BoxedStrategy<Stmt> {
    (
        expr(0, locals.clone()),
        method_name(),
        prop::collection::vec(expr(1, locals), 0..=2),
    )
        .prop_map(|(target, method, args)| {
            Stmt::new(StmtKind::Expr(invoke(target, method, args)), 0)
        })
        .boxed()
}

fn stmt(depth: u32, locals: Vec<String>) -> BoxedStrategy<Stmt> {
    let leaf = prop_oneof![
        expr(EXPR_DEPTH, locals.clone()).prop_map(|value| Stmt::new(StmtKind::Return(value), 0)),
        call_stmt(locals.clone()),
    ]
    .boxed();

    if depth == 0 {
        return leaf;
    }

    let if_stmt = prop::collection::vec(
        (
            expr(EXPR_DEPTH, locals.clone()),
            block(depth - 1, locals.clone()),
        ),
        1..=3,
    )
    .prop_map(|arms| {
        let arms = arms
            .into_iter()
            .map(|(predicate, block)| Arm { predicate, block })
            .collect();
        Stmt::new(StmtKind::If(arms), 0)
    });

    let for_local = format!("v{depth}");
    let mut for_scope = locals.clone();
    for_scope.push(for_local.clone());
    let for_stmt = (
        expr(EXPR_DEPTH, locals.clone()),
        prop::option::of(expr(EXPR_DEPTH, for_scope.clone())),
        block(depth - 1, for_scope),
    )
        .prop_map(move |(source, filter, block)| {
            Stmt::new(
                StmtKind::For {
                    local: for_local.clone(),
                    source,
                    filter,
                    block,
                },
                0,
            )
        });

    // The block only sees the binders this arm actually produced, so a
    // printed reference can never name an unbound local.
    let first = format!("a{depth}");
    let second = format!("b{depth}");
    let mut one_bound = locals.clone();
    one_bound.push(first.clone());
    let mut both_bound = one_bound.clone();
    both_bound.push(second.clone());
    let single = first.clone();
    let one_let = (
        expr(EXPR_DEPTH, locals.clone()),
        block(depth - 1, one_bound.clone()),
    )
        .prop_map(move |(value, block)| {
            Stmt::new(
                StmtKind::Let {
                    bindings: vec![(single.clone(), value)],
                    block,
                },
                0,
            )
        });
    let two_let = (
        expr(EXPR_DEPTH, locals.clone()),
        expr(EXPR_DEPTH, one_bound),
        block(depth - 1, both_bound),
    )
        .prop_map(move |(value, extra, block)| {
            Stmt::new(
                StmtKind::Let {
                    bindings: vec![(first.clone(), value), (second.clone(), extra)],
                    block,
                },
                0,
            )
        });
    let let_stmt = prop_oneof![one_let, two_let];

    prop_oneof![
        4 => leaf,
        1 => if_stmt,
        1 => for_stmt,
        1 => let_stmt,
    ]
    .boxed()
}

fn block(depth: u32, locals: Vec<String>) -> BoxedStrategy<Vec<Stmt>> {
    prop::collection::vec(stmt(depth, locals), 1..=2).boxed()
}

// -- Script strategy --

fn script() -> impl Strategy<Value = Script> {
    (
        block(2, Vec::new()),
        prop::option::of(block(1, vec!["p0".to_string()])),
        prop::option::of(block(1, Vec::new())),
    )
        .prop_map(|(run, helper, property)| {
            let mut methods = vec![Method {
                name: "Run".to_string(),
                params: Vec::new(),
                body: run,
                line: 0,
            }];
            if let Some(body) = helper {
                methods.push(Method {
                    name: "Helper".to_string(),
                    params: vec!["p0".to_string()],
                    body,
                    line: 0,
                });
            }
            if let Some(body) = property {
                methods.push(Method {
                    name: "get_Enabled".to_string(),
                    params: Vec::new(),
                    body,
                    line: 0,
                });
            }
            Script { methods }
        })
}

// -- Property tests --

proptest! {
    /// The printed form parses back to an equal tree.
    #[test]
    fn printed_scripts_reparse(original in script()) {
        let printed = original.to_string();
        let parsed = parse(&printed).map_err(|e| {
            TestCaseError::fail(
                std::format!("parse error: {e}\n--- script ---\n{printed}"))
        })?;
        prop_assert_eq!(original, parsed);
    }

    /// Printing is idempotent: print(parse(print(x))) == print(x).
    #[test]
    fn printing_is_idempotent(original in script()) {
        let first = original.to_string();
        let parsed = parse(&first).map_err(|e| {
            TestCaseError::fail(
                std::format!("parse error: {e}\n--- script ---\n{first}"))
        })?;
        prop_assert_eq!(first, parsed.to_string());
    }

    /// A printed script never trips the scanner.
    #[test]
    fn printed_scripts_always_tokenize(original in script()) {
        let printed = original.to_string();
        tokenize(&printed).map_err(|e| {
            TestCaseError::fail(
                std::format!("scan error: {e}\n--- script ---\n{printed}"))
        })?;
    }

    /// Method names and order survive the round-trip.
    #[test]
    fn method_names_preserved(original in script()) {
        let parsed = parse(&original.to_string()).unwrap();
        let names: Vec<_> = original.methods.iter().map(|m| &m.name).collect();
        let reparsed: Vec<_> = parsed.methods.iter().map(|m| &m.name).collect();
        prop_assert_eq!(names, reparsed);
    }
}
