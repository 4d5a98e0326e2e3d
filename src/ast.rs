//! Syntax tree for refactor scripts.
//!
//! Every node records the source line it started on. Equality compares
//! structure only and ignores lines, so a printed-then-reparsed tree is
//! equal to the original. `Display` renders normalized, re-parseable
//! script source: lowered operators print back as parenthesized operator
//! syntax and `get_X` calls print as `.X` property access.

use std::fmt;

/// A parsed script: an ordered list of method definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub methods: Vec<Method>,
}

/// A `define` block. Properties are methods named `get_X` with no
/// parameters.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params && self.body == other.body
    }
}

/// A statement with its source line.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

impl PartialEq for Stmt {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// One `if`/`elif`/`else` arm. The `else` arm carries a literal `true`
/// predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Arm {
    pub predicate: Expr,
    pub block: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `if p then ... elif q then ... else ... end`
    If(Vec<Arm>),
    /// `for x in e where f do ... end`
    For {
        local: String,
        source: Expr,
        filter: Option<Expr>,
        block: Vec<Stmt>,
    },
    /// `let a = e, b = f in ... end`
    Let {
        bindings: Vec<(String, Expr)>,
        block: Vec<Stmt>,
    },
    /// `return e`
    Return(Expr),
    /// A bare expression, usually a method call queueing an edit.
    Expr(Expr),
}

/// An expression with its source line.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Bool(bool),
    Null,
    SelfRef,
    /// String literal contents in source form: no delimiters, `""`
    /// escapes still doubled.
    Str(String),
    /// `[a, b, c]`
    Seq(Vec<Expr>),
    /// A declared local.
    Local(String),
    /// Bare type name; appears only as the argument of `op_IsType`.
    TypeName(String),
    /// A method call. Operators and property reads lower to this form.
    Invoke {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// `from x in e where f select m`
    From {
        local: String,
        source: Box<Expr>,
        filter: Option<Box<Expr>>,
        select: Box<Expr>,
    },
    /// `value when p else other`
    When {
        value: Box<Expr>,
        predicate: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub const fn new(kind: ExprKind, line: usize) -> Self {
        Self { kind, line }
    }

    /// Literal `true`; the predicate of a lowered `else` arm.
    #[must_use]
    pub const fn literal_true(line: usize) -> Self {
        Self::new(ExprKind::Bool(true), line)
    }

    /// True for the literal `true`, used when printing `else` arms.
    #[must_use]
    pub fn is_literal_true(&self) -> bool {
        self.kind == ExprKind::Bool(true)
    }
}

impl Stmt {
    #[must_use]
    pub const fn new(kind: StmtKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// Binary operator method names and their surface spellings.
const BINARY_OPS: &[(&str, &str)] = &[
    ("op_LogicalOr", "or"),
    ("op_LogicalAnd", "and"),
    ("op_Equals", "=="),
    ("op_NotEquals", "!="),
    ("op_Add", "+"),
];

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Bool(true) => write!(f, "true"),
            ExprKind::Bool(false) => write!(f, "false"),
            ExprKind::Null => write!(f, "null"),
            ExprKind::SelfRef => write!(f, "self"),
            ExprKind::Str(text) => write!(f, "\"{text}\""),
            ExprKind::Seq(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            ExprKind::Local(name) | ExprKind::TypeName(name) => write!(f, "{name}"),
            ExprKind::Invoke {
                target,
                method,
                args,
            } => write_invoke(f, target, method, args),
            ExprKind::From {
                local,
                source,
                filter,
                select,
            } => {
                write!(f, "(from {local} in {source}")?;
                if let Some(filter) = filter {
                    write!(f, " where {filter}")?;
                }
                write!(f, " select {select})")
            }
            ExprKind::When {
                value,
                predicate,
                otherwise,
            } => write!(f, "({value} when {predicate} else {otherwise})"),
        }
    }
}

fn write_invoke(
    f: &mut fmt::Formatter<'_>,
    target: &Expr,
    method: &str,
    args: &[Expr],
) -> fmt::Result {
    if method == "op_LogicalComplement" && args.is_empty() {
        return write!(f, "(not {target})");
    }
    if method == "op_IsType" && args.len() == 1 {
        return write!(f, "({target} is {})", args[0]);
    }
    if args.len() == 1 {
        if let Some((_, op)) = BINARY_OPS.iter().find(|(name, _)| *name == method) {
            return write!(f, "({target} {op} {})", args[0]);
        }
    }
    if args.is_empty() {
        if let Some(property) = method.strip_prefix("get_") {
            return write!(f, "{target}.{property}");
        }
    }

    write!(f, "{target}.{method}(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &[Stmt], depth: usize) -> fmt::Result {
    for stmt in block {
        write_stmt(f, stmt, depth)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let indent = "\t".repeat(depth);
    match &stmt.kind {
        StmtKind::If(arms) => {
            for (i, arm) in arms.iter().enumerate() {
                if i == 0 {
                    writeln!(f, "{indent}if {} then", arm.predicate)?;
                } else if i + 1 == arms.len() && arm.predicate.is_literal_true() {
                    writeln!(f, "{indent}else")?;
                } else {
                    writeln!(f, "{indent}elif {} then", arm.predicate)?;
                }
                write_block(f, &arm.block, depth + 1)?;
            }
            writeln!(f, "{indent}end")
        }
        StmtKind::For {
            local,
            source,
            filter,
            block,
        } => {
            write!(f, "{indent}for {local} in {source}")?;
            if let Some(filter) = filter {
                write!(f, " where {filter}")?;
            }
            writeln!(f, " do")?;
            write_block(f, block, depth + 1)?;
            writeln!(f, "{indent}end")
        }
        StmtKind::Let { bindings, block } => {
            write!(f, "{indent}let ")?;
            for (i, (name, value)) in bindings.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name} = {value}")?;
            }
            writeln!(f, " in")?;
            write_block(f, block, depth + 1)?;
            writeln!(f, "{indent}end")
        }
        StmtKind::Return(value) => writeln!(f, "{indent}return {value}"),
        StmtKind::Expr(value) => writeln!(f, "{indent}{value}"),
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() && self.name.starts_with("get_") {
            writeln!(f, "define property {}", &self.name["get_".len()..])?;
        } else {
            write!(f, "define {}(", self.name)?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            writeln!(f, ")")?;
        }
        write_block(f, &self.body, 1)?;
        writeln!(f, "end")
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, method) in self.methods.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{method}")?;
        }
        Ok(())
    }
}
