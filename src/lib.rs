//! A scripting language for editor refactorings.
//!
//! Scripts walk the declaration tree of a C# file and queue edit
//! commands; the patch engine then orders the edits, rejects overlaps,
//! and applies them back-to-front against the file text. The pipeline
//! is scanner, recursive-descent parser, tree-walking evaluator, and
//! patcher.
//!
//! # Quick start
//!
//! ## Parse a script
//!
//! ```
//! use refactor_script::parse;
//!
//! let script = parse("define Run()\n\treturn null\nend\n").unwrap();
//! assert_eq!(script.methods[0].name, "Run");
//! ```
//!
//! ## Evaluate a script
//!
//! ```
//! use refactor_script::{Context, Evaluator, Namespace, parse};
//!
//! let script = parse("define Run()\n\tWriteLine(\"scope is #{Scope}\")\nend\n").unwrap();
//! let globals = Namespace::global(0);
//! let mut context = Context::new(&globals, "", 0, 0);
//!
//! let edits = Evaluator::new().run(&script, &mut context).unwrap();
//! assert!(edits.is_empty());
//! assert_eq!(context.transcript(), "scope is <globals>\n");
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod ast;
pub mod commands;
pub mod context;
pub mod decl;
pub mod eval;
pub mod parser;
pub mod patch;
pub mod scanner;
pub mod token;
pub mod value;

pub use ast::{Expr, ExprKind, Method, Script, Stmt, StmtKind};
pub use commands::{EditCommand, EditRange};
pub use context::Context;
pub use decl::{Member, Namespace, Node, TypeDecl};
pub use eval::{EvalError, EvalErrorKind, Evaluator, Registry};
pub use parser::{ParseError, ParseErrorKind, parse};
pub use patch::{PatchError, Refactor};
pub use scanner::{ScanError, ScanErrorKind, Scanner, tokenize};
pub use token::{Token, TokenKind};
pub use value::{Tag, Value};

/// Unified error type covering the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A scanner error.
    #[error("{0}")]
    Scan(#[from] ScanError),
    /// A parser error.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// An evaluation error.
    #[error("{0}")]
    Evaluate(#[from] EvalError),
    /// A patch error.
    #[error("{0}")]
    Patch(#[from] PatchError),
}

/// Parse and evaluate `source` against a declaration tree, then apply
/// the queued edits to `text` in one step.
pub fn rewrite(
    source: &str,
    globals: &Namespace,
    text: &str,
    selection_offset: usize,
    selection_len: usize,
) -> Result<String, Error> {
    let script = parse(source)?;
    let mut context = Context::new(globals, text, selection_offset, selection_len);
    let edits = Evaluator::new().run(&script, &mut context)?;

    let mut refactor = Refactor::new(text);
    refactor.extend(edits);
    Ok(refactor.process()?)
}
