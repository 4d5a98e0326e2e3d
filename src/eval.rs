//! Tree-walking evaluation of parsed scripts.
//!
//! Values dispatch method calls through a registry of built-in tables
//! keyed by type tag; lookups walk the tag chain so, for example, a
//! `Class` node answers `TypeDeclaration` and `Declaration` methods.
//! Script-defined methods live on the `self` receiver and are checked
//! against the built-in table before evaluation starts.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::ast::{Expr, ExprKind, Method, Script, Stmt, StmtKind};
use crate::commands::{
    AddBaseType, AddMember, AddRelativeMember, AddUsing, ChangeAccess, EditCommand, Indent,
    InsertAfterLine, InsertBeforeLine, InsertFirst, InsertLast,
};
use crate::context::{Context, MAX_DEPTH};
use crate::decl::{self, Body, Member, MemberKind, Namespace, Node, TypeDecl, TypeKind};
use crate::value::{Tag, Value};

/// Remaining native stack below this triggers growth.
const STACK_RED_ZONE: usize = 128 * 1024;
/// How much native stack each growth adds.
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// What went wrong during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalErrorKind {
    UnknownMethod {
        receiver: &'static str,
        method: String,
    },
    /// Wrong argument count for a built-in method.
    ArgCount {
        receiver: &'static str,
        method: &'static str,
        expected: usize,
    },
    /// Wrong argument count for a script-defined method.
    MethodArgCount {
        method: String,
        expected: usize,
        actual: usize,
    },
    ArgType {
        expected: &'static str,
        ordinal: &'static str,
        receiver: &'static str,
        method: &'static str,
        actual: &'static str,
    },
    BadPredicate {
        place: &'static str,
        actual: &'static str,
    },
    BadSequence {
        place: &'static str,
        actual: &'static str,
    },
    UndefinedLocal(String),
    RecursionLimit,
    BadRunResult(&'static str),
    AlreadyDefined(String),
    UnknownTypeName(String),
    OutOfRange {
        index: usize,
        count: usize,
    },
    NoUniqueName(String),
    BadIndent,
    /// `Raise` was called; the message is the script's own.
    Raised(String),
    Internal,
}

fn count_phrase(count: usize) -> String {
    match count {
        0 => "zero arguments".to_string(),
        1 => "one argument".to_string(),
        2 => "two arguments".to_string(),
        n => format!("{n} arguments"),
    }
}

fn argument_count(count: usize) -> String {
    if count == 1 {
        "1 argument".to_string()
    } else {
        format!("{count} arguments")
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMethod { receiver, method } => {
                write!(f, "{receiver} does not respond to the {method} method")
            }
            Self::ArgCount {
                receiver,
                method,
                expected,
            } => {
                write!(f, "{receiver}.{method} takes {}", count_phrase(*expected))
            }
            Self::MethodArgCount {
                method,
                expected,
                actual,
            } => write!(
                f,
                "the {method} method takes {}, not {}",
                argument_count(*expected),
                argument_count(*actual)
            ),
            Self::ArgType {
                expected,
                ordinal,
                receiver,
                method,
                actual,
            } => write!(
                f,
                "expected a {expected} for the {ordinal} argument to {receiver}.{method}, not {actual}"
            ),
            Self::BadPredicate { place, actual } => {
                write!(f, "the {place} should return a Boolean, but was a {actual}")
            }
            Self::BadSequence { place, actual } => {
                write!(f, "the {place} should return a Sequence, but was a {actual}")
            }
            Self::UndefinedLocal(name) => write!(f, "the {name} local is not defined"),
            Self::RecursionLimit => {
                write!(f, "method calls have recursed more than {MAX_DEPTH} times")
            }
            Self::BadRunResult(actual) => {
                write!(f, "Run should return null or an Edit, not {actual}")
            }
            Self::AlreadyDefined(name) => write!(f, "the {name} method is already defined"),
            Self::UnknownTypeName(name) => write!(f, "{name} is not a valid type name"),
            Self::OutOfRange { index, count } => write!(
                f,
                "attempt to get element {index} from the Sequence, but there are only {count} elements"
            ),
            Self::NoUniqueName(stem) => write!(f, "couldn't find a unique name for {stem}"),
            Self::BadIndent => {
                write!(f, "the argument to Script.Indent should contain only tabs")
            }
            Self::Raised(message) => write!(f, "{message}"),
            Self::Internal => write!(f, "internal evaluation error"),
        }
    }
}

/// Error produced while evaluating, with the script line it came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {line}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub line: usize,
}

impl EvalError {
    #[must_use]
    pub const fn new(kind: EvalErrorKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// Whether a statement's value flows to the next statement or returns
/// from the enclosing method.
enum Flow<'a> {
    Next(Value<'a>),
    Return(Value<'a>),
}

type Builtin = for<'a> fn(
    &mut Context<'a>,
    usize,
    &'static str,
    &Value<'a>,
    &[Value<'a>],
) -> Result<Value<'a>, EvalError>;

/// Built-in method tables, keyed by the tag the methods are defined on.
pub struct Registry {
    tables: HashMap<Tag, HashMap<&'static str, Builtin>>,
}

/// Tags with no base; the object methods live on all of them so every
/// value answers `op_Equals` and `op_NotEquals`.
const ROOTS: [Tag; 7] = [
    Tag::Void,
    Tag::Boolean,
    Tag::String,
    Tag::Sequence,
    Tag::Edit,
    Tag::Script,
    Tag::Declaration,
];

const TABLES: &[(Tag, &[(&str, Builtin)])] = &[
    (
        Tag::Boolean,
        &[
            ("op_LogicalAnd", bool_logical as Builtin),
            ("op_LogicalOr", bool_logical as Builtin),
            ("op_LogicalComplement", bool_complement as Builtin),
        ],
    ),
    (
        Tag::String,
        &[
            ("op_Add", str_add as Builtin),
            ("Contains", str_search as Builtin),
            ("StartsWith", str_search as Builtin),
            ("EndsWith", str_search as Builtin),
            ("Replace", str_replace as Builtin),
            ("Join", str_join as Builtin),
            ("get_IsEmpty", str_is_empty as Builtin),
        ],
    ),
    (
        Tag::Sequence,
        &[
            ("Contains", seq_contains as Builtin),
            ("get_First", seq_element as Builtin),
            ("get_Second", seq_element as Builtin),
            ("get_Third", seq_element as Builtin),
            ("get_Fourth", seq_element as Builtin),
            ("get_Fifth", seq_element as Builtin),
            ("get_Head", seq_element as Builtin),
            ("get_Last", seq_element as Builtin),
            ("get_Tail", seq_tail as Builtin),
            ("get_IsEmpty", seq_is_empty as Builtin),
        ],
    ),
    (
        Tag::Script,
        &[
            ("get_Globals", script_globals as Builtin),
            ("get_Scope", script_scope as Builtin),
            ("get_HasSelection", script_has_selection as Builtin),
            ("GetUniqueName", script_unique_name as Builtin),
            ("Indent", script_indent as Builtin),
            ("InsertBeforeSelection", script_insert_selection as Builtin),
            ("InsertAfterSelection", script_insert_selection as Builtin),
            ("Raise", script_raise as Builtin),
            ("Write", script_write as Builtin),
            ("WriteLine", script_write as Builtin),
        ],
    ),
    (Tag::Declaration, &[("get_Name", decl_name as Builtin)]),
    (
        Tag::TypeScope,
        &[
            ("get_Body", scope_body as Builtin),
            ("get_Declarations", scope_declarations as Builtin),
            ("get_Classes", scope_types as Builtin),
            ("get_Interfaces", scope_types as Builtin),
            ("get_Structs", scope_types as Builtin),
            ("get_Enums", scope_types as Builtin),
            ("get_Delegates", scope_types as Builtin),
            ("get_Types", scope_types as Builtin),
            ("get_Namespace", scope_namespace as Builtin),
        ],
    ),
    (
        Tag::Namespace,
        &[
            ("AddUsing", ns_add_using as Builtin),
            ("get_Namespaces", ns_namespaces as Builtin),
            ("get_Uses", ns_uses as Builtin),
            ("TypeMatches", ns_type_matches as Builtin),
        ],
    ),
    (
        Tag::Member,
        &[
            ("AddMemberAfter", member_add_relative as Builtin),
            ("AddMemberBefore", member_add_relative as Builtin),
            ("ChangeAccess", member_change_access as Builtin),
            ("get_Access", decl_access as Builtin),
            ("get_DeclaringType", decl_declaring_type as Builtin),
            ("get_FullName", decl_full_name as Builtin),
            ("get_IsPublic", modifier_test as Builtin),
            ("get_IsProtected", modifier_test as Builtin),
            ("get_IsInternal", modifier_test as Builtin),
            ("get_IsPrivate", modifier_test as Builtin),
            ("get_IsStatic", modifier_test as Builtin),
            ("get_IsAbstract", modifier_test as Builtin),
            ("get_IsVirtual", modifier_test as Builtin),
            ("get_IsOverride", modifier_test as Builtin),
            ("get_IsSealed", modifier_test as Builtin),
            ("get_IsReadonly", modifier_test as Builtin),
            ("get_IsConst", modifier_test as Builtin),
        ],
    ),
    (
        Tag::Method,
        &[
            ("get_Body", method_body as Builtin),
            ("get_ReturnType", method_return_type as Builtin),
            ("get_Parameters", method_parameters as Builtin),
            ("get_IsConstructor", method_is_constructor as Builtin),
        ],
    ),
    (
        Tag::Field,
        &[
            ("get_Type", field_type as Builtin),
            ("get_Value", field_value as Builtin),
        ],
    ),
    (
        Tag::Property,
        &[
            ("get_HasGetter", property_accessors as Builtin),
            ("get_HasSetter", property_accessors as Builtin),
        ],
    ),
    (
        Tag::TypeDeclaration,
        &[
            ("AddBase", type_add_base as Builtin),
            ("AddMember", type_add_member as Builtin),
            ("get_Bases", type_bases as Builtin),
            ("get_Fields", type_members as Builtin),
            ("get_Methods", type_members as Builtin),
            ("get_Properties", type_members as Builtin),
            ("get_Events", type_members as Builtin),
            ("get_Members", type_members as Builtin),
            ("GetUniqueName", type_unique_name as Builtin),
            ("HasMember", type_has_member as Builtin),
            ("get_Access", decl_access as Builtin),
            ("get_DeclaringType", decl_declaring_type as Builtin),
            ("get_FullName", decl_full_name as Builtin),
            ("get_IsPublic", modifier_test as Builtin),
            ("get_IsProtected", modifier_test as Builtin),
            ("get_IsInternal", modifier_test as Builtin),
            ("get_IsPrivate", modifier_test as Builtin),
            ("get_IsStatic", modifier_test as Builtin),
            ("get_IsAbstract", modifier_test as Builtin),
            ("get_IsSealed", modifier_test as Builtin),
        ],
    ),
    (
        Tag::Body,
        &[
            ("InsertFirst", body_insert as Builtin),
            ("InsertLast", body_insert as Builtin),
        ],
    ),
];

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        let mut tables: HashMap<Tag, HashMap<&'static str, Builtin>> = HashMap::new();
        for (tag, methods) in TABLES {
            let table = tables.entry(*tag).or_default();
            for (name, builtin) in *methods {
                table.insert(name, *builtin);
            }
        }
        for tag in ROOTS {
            let table = tables.entry(tag).or_default();
            table.insert("op_Equals", object_equality as Builtin);
            table.insert("op_NotEquals", object_equality as Builtin);
        }
        Self { tables }
    }

    /// Find `method` for `tag`, walking the tag chain toward the root.
    /// Returns the interned name alongside the implementation.
    #[must_use]
    pub fn lookup(&self, tag: Tag, method: &str) -> Option<(&'static str, Builtin)> {
        let mut current = Some(tag);
        while let Some(t) = current {
            if let Some((name, builtin)) = self
                .tables
                .get(&t)
                .and_then(|table| table.get_key_value(method))
            {
                return Some((name, *builtin));
            }
            current = t.base();
        }
        None
    }

    #[must_use]
    pub fn defines(&self, tag: Tag, method: &str) -> bool {
        self.lookup(tag, method).is_some()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// Argument helpers shared by the builtins.

const fn ordinal(index: usize) -> &'static str {
    match index {
        0 => "first",
        1 => "second",
        _ => "third",
    }
}

fn arity(
    receiver: &Value<'_>,
    method: &'static str,
    args: &[Value<'_>],
    expected: usize,
    line: usize,
) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::new(
            EvalErrorKind::ArgCount {
                receiver: receiver.type_name(),
                method,
                expected,
            },
            line,
        ))
    }
}

fn arg_type_error(
    expected: &'static str,
    index: usize,
    receiver: &Value<'_>,
    method: &'static str,
    actual: &Value<'_>,
    line: usize,
) -> EvalError {
    EvalError::new(
        EvalErrorKind::ArgType {
            expected,
            ordinal: ordinal(index),
            receiver: receiver.type_name(),
            method,
            actual: actual.type_name(),
        },
        line,
    )
}

fn str_arg<'v>(
    args: &'v [Value<'_>],
    index: usize,
    receiver: &Value<'_>,
    method: &'static str,
    line: usize,
) -> Result<&'v str, EvalError> {
    match &args[index] {
        Value::Str(text) => Ok(text),
        other => Err(arg_type_error("String", index, receiver, method, other, line)),
    }
}

fn bool_arg(
    args: &[Value<'_>],
    index: usize,
    receiver: &Value<'_>,
    method: &'static str,
    line: usize,
) -> Result<bool, EvalError> {
    match &args[index] {
        Value::Bool(value) => Ok(*value),
        other => Err(arg_type_error(
            "Boolean", index, receiver, method, other, line,
        )),
    }
}

fn lines_arg(
    args: &[Value<'_>],
    index: usize,
    receiver: &Value<'_>,
    method: &'static str,
    line: usize,
) -> Result<Vec<String>, EvalError> {
    match &args[index] {
        Value::Seq(items) => Ok(items.iter().map(ToString::to_string).collect()),
        other => Err(arg_type_error(
            "Sequence", index, receiver, method, other, line,
        )),
    }
}

const fn internal(line: usize) -> EvalError {
    EvalError::new(EvalErrorKind::Internal, line)
}

fn as_node<'a>(receiver: &Value<'a>, line: usize) -> Result<Node<'a>, EvalError> {
    if let Value::Node(node) = receiver {
        Ok(*node)
    } else {
        Err(internal(line))
    }
}

fn as_namespace<'a>(receiver: &Value<'a>, line: usize) -> Result<&'a Namespace, EvalError> {
    if let Value::Node(Node::Namespace(ns)) = receiver {
        Ok(ns)
    } else {
        Err(internal(line))
    }
}

fn as_type<'a>(receiver: &Value<'a>, line: usize) -> Result<&'a TypeDecl, EvalError> {
    if let Value::Node(Node::Type(ty)) = receiver {
        Ok(ty)
    } else {
        Err(internal(line))
    }
}

fn as_member<'a>(receiver: &Value<'a>, line: usize) -> Result<&'a Member, EvalError> {
    if let Value::Node(Node::Member(member)) = receiver {
        Ok(member)
    } else {
        Err(internal(line))
    }
}

fn as_body<'a>(receiver: &Value<'a>, line: usize) -> Result<&'a Body, EvalError> {
    if let Value::Node(Node::Body(body)) = receiver {
        Ok(body)
    } else {
        Err(internal(line))
    }
}

fn as_str<'v>(receiver: &'v Value<'_>, line: usize) -> Result<&'v str, EvalError> {
    if let Value::Str(text) = receiver {
        Ok(text)
    } else {
        Err(internal(line))
    }
}

fn as_seq<'v, 'a>(receiver: &'v Value<'a>, line: usize) -> Result<&'v [Value<'a>], EvalError> {
    if let Value::Seq(items) = receiver {
        Ok(items)
    } else {
        Err(internal(line))
    }
}

// Object methods, available on every value.

fn object_equality<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let equal = receiver == &args[0];
    Ok(Value::Bool(if method == "op_Equals" { equal } else { !equal }))
}

// Boolean.

fn bool_logical<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let Value::Bool(lhs) = receiver else {
        return Err(internal(line));
    };
    let rhs = bool_arg(args, 0, receiver, method, line)?;
    Ok(Value::Bool(if method == "op_LogicalAnd" {
        *lhs && rhs
    } else {
        *lhs || rhs
    }))
}

fn bool_complement<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let Value::Bool(value) = receiver else {
        return Err(internal(line));
    };
    Ok(Value::Bool(!value))
}

// String.

fn str_add<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let lhs = as_str(receiver, line)?;
    Ok(Value::Str(format!("{lhs}{}", args[0])))
}

fn str_search<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let text = as_str(receiver, line)?;
    let needle = str_arg(args, 0, receiver, method, line)?;
    Ok(Value::Bool(match method {
        "Contains" => text.contains(needle),
        "StartsWith" => text.starts_with(needle),
        _ => text.ends_with(needle),
    }))
}

fn str_replace<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 2, line)?;
    let text = as_str(receiver, line)?;
    let old = str_arg(args, 0, receiver, method, line)?;
    let new = str_arg(args, 1, receiver, method, line)?;
    Ok(Value::Str(text.replace(old, new)))
}

fn str_join<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let separator = as_str(receiver, line)?;
    let items = match &args[0] {
        Value::Seq(items) => items,
        other => {
            return Err(arg_type_error(
                "Sequence", 0, receiver, method, other, line,
            ));
        }
    };
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    Ok(Value::Str(parts.join(separator)))
}

fn str_is_empty<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    Ok(Value::Bool(as_str(receiver, line)?.is_empty()))
}

// Sequence.

fn seq_contains<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let items = as_seq(receiver, line)?;
    Ok(Value::Bool(items.contains(&args[0])))
}

fn seq_element<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let items = as_seq(receiver, line)?;

    let index = match method {
        "get_First" | "get_Head" => 0,
        "get_Second" => 1,
        "get_Third" => 2,
        "get_Fourth" => 3,
        "get_Fifth" => 4,
        _ => items.len().saturating_sub(1),
    };
    if items.is_empty() || index >= items.len() {
        return Err(EvalError::new(
            EvalErrorKind::OutOfRange {
                index: index + 1,
                count: items.len(),
            },
            line,
        ));
    }
    Ok(items[index].clone())
}

fn seq_tail<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let items = as_seq(receiver, line)?;
    if items.is_empty() {
        return Err(EvalError::new(
            EvalErrorKind::OutOfRange { index: 1, count: 0 },
            line,
        ));
    }
    Ok(Value::Seq(items[1..].to_vec()))
}

fn seq_is_empty<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    Ok(Value::Bool(as_seq(receiver, line)?.is_empty()))
}

// Script, the `self` receiver.

fn script_globals<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    Ok(Value::Node(Node::Namespace(ctx.globals)))
}

fn script_scope<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    Ok(Value::Node(decl::find_scope(
        ctx.globals,
        ctx.selection_offset,
    )))
}

fn script_has_selection<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    Ok(Value::Bool(ctx.selection_len > 0))
}

fn unique_name(used: impl Fn(&str) -> bool, stem: &str) -> Option<String> {
    if !used(stem) {
        return Some(stem.to_string());
    }
    (2..=101)
        .map(|i| format!("{stem}{i}"))
        .find(|candidate| !used(candidate))
}

fn tree_has_name(ns: &Namespace, name: &str) -> bool {
    ns.namespaces
        .iter()
        .any(|child| child.name == name || tree_has_name(child, name))
        || ns.types.iter().any(|ty| type_tree_has_name(ty, name))
}

fn type_tree_has_name(ty: &TypeDecl, name: &str) -> bool {
    ty.name == name
        || ty.members.iter().any(|m| m.name == name)
        || ty.types.iter().any(|nested| type_tree_has_name(nested, name))
}

fn script_unique_name<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let stem = str_arg(args, 0, receiver, method, line)?;
    unique_name(|candidate| tree_has_name(ctx.globals, candidate), stem)
        .map(Value::Str)
        .ok_or_else(|| EvalError::new(EvalErrorKind::NoUniqueName(stem.to_string()), line))
}

fn script_indent<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let tabs = str_arg(args, 0, receiver, method, line)?;
    if !tabs.chars().all(|c| c == '\t') {
        return Err(EvalError::new(EvalErrorKind::BadIndent, line));
    }
    Ok(Value::Edit(Rc::new(Indent::new(
        ctx.selection_offset,
        ctx.selection_len,
        tabs,
    ))))
}

fn script_insert_selection<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let text = str_arg(args, 0, receiver, method, line)?;
    let lines: Vec<String> = text.split('\n').map(String::from).collect();

    let command: Rc<dyn EditCommand + 'a> = if method == "InsertBeforeSelection" {
        Rc::new(InsertBeforeLine::new(ctx.selection_offset, lines))
    } else {
        Rc::new(InsertAfterLine::new(
            ctx.selection_offset,
            ctx.selection_len,
            lines,
        ))
    };
    Ok(Value::Edit(command))
}

fn script_raise<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let message = str_arg(args, 0, receiver, method, line)?;
    Err(EvalError::new(
        EvalErrorKind::Raised(message.to_string()),
        line,
    ))
}

fn script_write<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let text = args[0].to_string();
    if method == "Write" {
        ctx.write(&text);
    } else {
        ctx.write_line(&text);
    }
    Ok(Value::Void)
}

// Declaration, the root of the node tags.

fn decl_name<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    Ok(Value::Str(as_node(receiver, line)?.name().to_string()))
}

fn decl_access<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let access = match as_node(receiver, line)? {
        Node::Member(member) => member.access,
        Node::Type(ty) => ty.access,
        _ => return Err(internal(line)),
    };
    Ok(Value::Str(access.as_str().to_string()))
}

fn decl_declaring_type<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let node = as_node(receiver, line)?;
    Ok(decl::declaring_type_of(ctx.globals, &node)
        .map_or(Value::Void, |ty| Value::Node(Node::Type(ty))))
}

fn decl_full_name<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let node = as_node(receiver, line)?;
    Ok(Value::Str(decl::full_name(ctx.globals, &node)))
}

fn modifier_test<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let (access, modifiers) = match as_node(receiver, line)? {
        Node::Member(member) => (member.access, member.modifiers),
        Node::Type(ty) => (ty.access, ty.modifiers),
        _ => return Err(internal(line)),
    };
    let result = match method {
        "get_IsPublic" => access == decl::Access::Public,
        "get_IsProtected" => access == decl::Access::Protected,
        "get_IsInternal" => access == decl::Access::Internal,
        "get_IsPrivate" => access == decl::Access::Private,
        "get_IsStatic" => modifiers.is_static,
        "get_IsAbstract" => modifiers.is_abstract,
        "get_IsVirtual" => modifiers.is_virtual,
        "get_IsOverride" => modifiers.is_override,
        "get_IsSealed" => modifiers.is_sealed,
        "get_IsReadonly" => modifiers.is_readonly,
        _ => modifiers.is_const,
    };
    Ok(Value::Bool(result))
}

// TypeScope, shared by namespaces and type declarations.

fn scope_body<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let body = match as_node(receiver, line)? {
        Node::Namespace(ns) => &ns.body,
        Node::Type(ty) => &ty.body,
        _ => return Err(internal(line)),
    };
    Ok(Value::Node(Node::Body(body)))
}

fn scope_declarations<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let nodes = match as_node(receiver, line)? {
        Node::Namespace(ns) => ns.declarations(),
        Node::Type(ty) => ty.declarations(),
        _ => return Err(internal(line)),
    };
    Ok(Value::Seq(nodes.into_iter().map(Value::Node).collect()))
}

fn scope_types<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let types = match as_node(receiver, line)? {
        Node::Namespace(ns) => &ns.types,
        Node::Type(ty) => &ty.types,
        _ => return Err(internal(line)),
    };
    let wanted = match method {
        "get_Classes" => Some(TypeKind::Class),
        "get_Interfaces" => Some(TypeKind::Interface),
        "get_Structs" => Some(TypeKind::Struct),
        "get_Enums" => Some(TypeKind::Enum),
        "get_Delegates" => Some(TypeKind::Delegate),
        _ => None,
    };
    Ok(Value::Seq(
        types
            .iter()
            .filter(|ty| wanted.is_none_or(|kind| ty.kind == kind))
            .map(|ty| Value::Node(Node::Type(ty)))
            .collect(),
    ))
}

fn scope_namespace<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let node = as_node(receiver, line)?;
    Ok(decl::namespace_of(ctx.globals, &node)
        .map_or(Value::Void, |ns| Value::Node(Node::Namespace(ns))))
}

// Namespace.

fn ns_add_using<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let ns = as_namespace(receiver, line)?;
    let name = str_arg(args, 0, receiver, method, line)?;
    Ok(Value::Edit(Rc::new(AddUsing::new(ns, name))))
}

fn ns_namespaces<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let ns = as_namespace(receiver, line)?;
    Ok(Value::Seq(
        ns.namespaces
            .iter()
            .map(|child| Value::Node(Node::Namespace(child)))
            .collect(),
    ))
}

fn ns_uses<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let ns = as_namespace(receiver, line)?;
    Ok(Value::Seq(
        ns.uses
            .iter()
            .map(|u| Value::Node(Node::Using(u)))
            .collect(),
    ))
}

fn ns_type_matches<'a>(
    ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 2, line)?;
    let ns = as_namespace(receiver, line)?;
    let ty = str_arg(args, 0, receiver, method, line)?;
    let name = str_arg(args, 1, receiver, method, line)?;
    Ok(Value::Bool(ns.type_matches(ctx.globals, ty, name)))
}

// Member.

fn member_add_relative<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let member = as_member(receiver, line)?;
    let lines = lines_arg(args, 0, receiver, method, line)?;
    let after = method == "AddMemberAfter";
    Ok(Value::Edit(Rc::new(AddRelativeMember::new(
        member, after, lines,
    ))))
}

fn member_change_access<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let member = as_member(receiver, line)?;
    let access = str_arg(args, 0, receiver, method, line)?;
    Ok(Value::Edit(Rc::new(ChangeAccess::new(member, access))))
}

// Method, field, and property members.

fn method_body<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let member = as_member(receiver, line)?;
    if let MemberKind::Method { body, .. } = &member.kind {
        Ok(body.as_ref().map_or(Value::Void, |b| Value::Node(Node::Body(b))))
    } else {
        Err(internal(line))
    }
}

fn method_return_type<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let member = as_member(receiver, line)?;
    if let MemberKind::Method { return_type, .. } = &member.kind {
        Ok(Value::Str(return_type.clone()))
    } else {
        Err(internal(line))
    }
}

fn method_parameters<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let member = as_member(receiver, line)?;
    if let MemberKind::Method { params, .. } = &member.kind {
        Ok(Value::Seq(
            params.iter().map(|p| Value::Str(p.clone())).collect(),
        ))
    } else {
        Err(internal(line))
    }
}

fn method_is_constructor<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let member = as_member(receiver, line)?;
    if let MemberKind::Method { is_constructor, .. } = &member.kind {
        Ok(Value::Bool(*is_constructor))
    } else {
        Err(internal(line))
    }
}

fn field_type<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let member = as_member(receiver, line)?;
    if let MemberKind::Field { ty, .. } = &member.kind {
        Ok(Value::Str(ty.clone()))
    } else {
        Err(internal(line))
    }
}

fn field_value<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let member = as_member(receiver, line)?;
    if let MemberKind::Field { value, .. } = &member.kind {
        Ok(value.as_ref().map_or(Value::Void, |v| Value::Str(v.clone())))
    } else {
        Err(internal(line))
    }
}

fn property_accessors<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let member = as_member(receiver, line)?;
    if let MemberKind::Property {
        has_getter,
        has_setter,
        ..
    } = &member.kind
    {
        Ok(Value::Bool(if method == "get_HasGetter" {
            *has_getter
        } else {
            *has_setter
        }))
    } else {
        Err(internal(line))
    }
}

// TypeDeclaration.

fn type_add_base<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let ty = as_type(receiver, line)?;
    let name = str_arg(args, 0, receiver, method, line)?;
    Ok(Value::Edit(Rc::new(AddBaseType::new(ty, name))))
}

fn type_add_member<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let ty = as_type(receiver, line)?;
    let lines = lines_arg(args, 0, receiver, method, line)?;
    Ok(Value::Edit(Rc::new(AddMember::new(ty, lines))))
}

fn type_bases<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let ty = as_type(receiver, line)?;
    Ok(Value::Seq(
        ty.bases
            .names
            .iter()
            .map(|name| Value::Str(name.clone()))
            .collect(),
    ))
}

fn type_members<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 0, line)?;
    let ty = as_type(receiver, line)?;
    let keep = |member: &Member| match method {
        "get_Fields" => matches!(member.kind, MemberKind::Field { .. }),
        "get_Methods" => matches!(member.kind, MemberKind::Method { .. }),
        "get_Properties" => matches!(member.kind, MemberKind::Property { .. }),
        "get_Events" => matches!(member.kind, MemberKind::Event { .. }),
        _ => true,
    };
    Ok(Value::Seq(
        ty.members
            .iter()
            .filter(|m| keep(m))
            .map(|m| Value::Node(Node::Member(m)))
            .collect(),
    ))
}

fn type_unique_name<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let ty = as_type(receiver, line)?;
    let stem = str_arg(args, 0, receiver, method, line)?;
    let used =
        |candidate: &str| ty.has_member(candidate) || ty.types.iter().any(|n| n.name == candidate);
    unique_name(used, stem)
        .map(Value::Str)
        .ok_or_else(|| EvalError::new(EvalErrorKind::NoUniqueName(stem.to_string()), line))
}

fn type_has_member<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let ty = as_type(receiver, line)?;
    let name = str_arg(args, 0, receiver, method, line)?;
    Ok(Value::Bool(ty.has_member(name)))
}

// Body.

fn body_insert<'a>(
    _ctx: &mut Context<'a>,
    line: usize,
    method: &'static str,
    receiver: &Value<'a>,
    args: &[Value<'a>],
) -> Result<Value<'a>, EvalError> {
    arity(receiver, method, args, 1, line)?;
    let body = as_body(receiver, line)?;
    let lines = lines_arg(args, 0, receiver, method, line)?;
    let command: Rc<dyn EditCommand + 'a> = if method == "InsertFirst" {
        Rc::new(InsertFirst::new(body, lines))
    } else {
        Rc::new(InsertLast::new(body, lines))
    };
    Ok(Value::Edit(command))
}

/// Runs parsed scripts against a context.
pub struct Evaluator {
    registry: Registry,
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Evaluate `script` and return the queued edits in order.
    ///
    /// The script's `Run` method is invoked with no arguments after the
    /// optional `EnableTracing` property; its result must be null or an
    /// edit command.
    ///
    /// # Errors
    ///
    /// Returns `EvalError` for every runtime failure: unknown methods,
    /// argument mismatches, non-boolean predicates, recursion past the
    /// depth limit, or a script-raised message.
    pub fn run<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
    ) -> Result<Vec<Rc<dyn EditCommand + 'a>>, EvalError> {
        for method in &script.methods {
            if self.registry.defines(Tag::Script, &method.name) {
                return Err(EvalError::new(
                    EvalErrorKind::AlreadyDefined(method.name.clone()),
                    method.line,
                ));
            }
        }

        if let Some(tracing) = script
            .methods
            .iter()
            .find(|m| m.name == "get_EnableTracing")
        {
            let value = self.call(script, context, tracing, Vec::new(), tracing.line)?;
            match value {
                Value::Bool(enabled) => context.trace = enabled,
                other => {
                    return Err(EvalError::new(
                        EvalErrorKind::BadPredicate {
                            place: "EnableTracing property",
                            actual: other.type_name(),
                        },
                        tracing.line,
                    ));
                }
            }
        }

        let run = script
            .methods
            .iter()
            .find(|m| m.name == "Run")
            .ok_or_else(|| internal(1))?;
        match self.call(script, context, run, Vec::new(), run.line)? {
            Value::Void => {}
            Value::Edit(command) => context.add_command(command),
            other => {
                return Err(EvalError::new(
                    EvalErrorKind::BadRunResult(other.type_name()),
                    run.line,
                ));
            }
        }

        Ok(context.take_commands())
    }

    fn call<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
        method: &Method,
        args: Vec<Value<'a>>,
        line: usize,
    ) -> Result<Value<'a>, EvalError> {
        if args.len() != method.params.len() {
            return Err(EvalError::new(
                EvalErrorKind::MethodArgCount {
                    method: method.name.clone(),
                    expected: method.params.len(),
                    actual: args.len(),
                },
                line,
            ));
        }
        if !context.enter() {
            return Err(EvalError::new(EvalErrorKind::RecursionLimit, line));
        }

        context.push_scope();
        for (param, arg) in method.params.iter().zip(args) {
            context.define(param.clone(), arg);
        }
        // Script recursion nests native frames, so grow the stack as
        // needed; the depth guard, not the host stack, sets the limit.
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_block(script, context, &method.body)
        });
        context.pop_scope();
        context.leave();

        match result? {
            Flow::Next(value) | Flow::Return(value) => Ok(value),
        }
    }

    fn eval_block<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
        block: &[Stmt],
    ) -> Result<Flow<'a>, EvalError> {
        let mut last = Value::Void;
        for stmt in block {
            match self.eval_stmt(script, context, stmt)? {
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Next(value) => last = value,
            }
        }
        Ok(Flow::Next(last))
    }

    fn eval_stmt<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
        stmt: &Stmt,
    ) -> Result<Flow<'a>, EvalError> {
        match &stmt.kind {
            StmtKind::If(arms) => {
                for arm in arms {
                    if self.eval_predicate(script, context, &arm.predicate, "if predicate")? {
                        return self.eval_block(script, context, &arm.block);
                    }
                }
                Ok(Flow::Next(Value::Void))
            }
            StmtKind::For {
                local,
                source,
                filter,
                block,
            } => {
                let items = match self.eval_expr(script, context, source)? {
                    Value::Void => Vec::new(),
                    Value::Seq(items) => items,
                    other => {
                        return Err(EvalError::new(
                            EvalErrorKind::BadSequence {
                                place: "for statement",
                                actual: other.type_name(),
                            },
                            source.line,
                        ));
                    }
                };
                for item in items {
                    context.define(local.clone(), item);
                    if let Some(filter) = filter {
                        if !self.eval_predicate(script, context, filter, "where predicate")? {
                            continue;
                        }
                    }
                    if let Flow::Return(value) = self.eval_block(script, context, block)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Next(Value::Void))
            }
            StmtKind::Let { bindings, block } => {
                for (name, init) in bindings {
                    let value = self.eval_expr(script, context, init)?;
                    context.define(name.clone(), value);
                }
                self.eval_block(script, context, block)
            }
            StmtKind::Return(value) => {
                let value = self.eval_expr(script, context, value)?;
                Ok(Flow::Return(value))
            }
            StmtKind::Expr(expr) => {
                let value = self.eval_expr(script, context, expr)?;
                if let Value::Edit(command) = &value {
                    context.add_command(Rc::clone(command));
                }
                Ok(Flow::Next(value))
            }
        }
    }

    fn eval_predicate<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
        expr: &Expr,
        place: &'static str,
    ) -> Result<bool, EvalError> {
        match self.eval_expr(script, context, expr)? {
            Value::Bool(value) => Ok(value),
            other => Err(EvalError::new(
                EvalErrorKind::BadPredicate {
                    place,
                    actual: other.type_name(),
                },
                expr.line,
            )),
        }
    }

    fn eval_expr<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
        expr: &Expr,
    ) -> Result<Value<'a>, EvalError> {
        match &expr.kind {
            ExprKind::Bool(value) => Ok(Value::Bool(*value)),
            ExprKind::Null => Ok(Value::Void),
            ExprKind::SelfRef => Ok(Value::Script),
            ExprKind::Str(text) => Ok(Value::Str(text.replace("\"\"", "\""))),
            ExprKind::Seq(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(script, context, element)?);
                }
                Ok(Value::Seq(values))
            }
            ExprKind::Local(name) => context.lookup(name).cloned().ok_or_else(|| {
                EvalError::new(EvalErrorKind::UndefinedLocal(name.clone()), expr.line)
            }),
            ExprKind::TypeName(_) => Err(internal(expr.line)),
            ExprKind::Invoke {
                target,
                method,
                args,
            } => {
                if method == "op_IsType" {
                    return self.eval_is_type(script, context, target, args, expr.line);
                }
                let receiver = self.eval_expr(script, context, target)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(script, context, arg)?);
                }
                self.dispatch(script, context, expr.line, &receiver, method, values)
            }
            ExprKind::From {
                local,
                source,
                filter,
                select,
            } => {
                let items = match self.eval_expr(script, context, source)? {
                    Value::Void => Vec::new(),
                    Value::Seq(items) => items,
                    other => {
                        return Err(EvalError::new(
                            EvalErrorKind::BadSequence {
                                place: "from expression",
                                actual: other.type_name(),
                            },
                            source.line,
                        ));
                    }
                };
                let mut result = Vec::new();
                for item in items {
                    context.define(local.clone(), item);
                    if let Some(filter) = filter {
                        if !self.eval_predicate(script, context, filter, "where predicate")? {
                            continue;
                        }
                    }
                    result.push(self.eval_expr(script, context, select)?);
                }
                Ok(Value::Seq(result))
            }
            ExprKind::When {
                value,
                predicate,
                otherwise,
            } => {
                if self.eval_predicate(script, context, predicate, "when predicate")? {
                    self.eval_expr(script, context, value)
                } else {
                    self.eval_expr(script, context, otherwise)
                }
            }
        }
    }

    fn eval_is_type<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
        target: &Expr,
        args: &[Expr],
        line: usize,
    ) -> Result<Value<'a>, EvalError> {
        let value = self.eval_expr(script, context, target)?;
        let Some(ExprKind::TypeName(name)) = args.first().map(|arg| &arg.kind) else {
            return Err(internal(line));
        };
        if name == "Object" {
            return Ok(Value::Bool(true));
        }
        let tag = Tag::from_name(name).ok_or_else(|| {
            EvalError::new(EvalErrorKind::UnknownTypeName(name.clone()), line)
        })?;
        Ok(Value::Bool(value.is_a(tag)))
    }

    fn dispatch<'a>(
        &self,
        script: &Script,
        context: &mut Context<'a>,
        line: usize,
        receiver: &Value<'a>,
        method: &str,
        args: Vec<Value<'a>>,
    ) -> Result<Value<'a>, EvalError> {
        if context.trace {
            trace!("{}.{method}", receiver.type_name());
        }

        if matches!(receiver, Value::Script) {
            if let Some(user) = script.methods.iter().find(|m| m.name == method) {
                return self.call(script, context, user, args, line);
            }
        }

        let Some((name, builtin)) = self.registry.lookup(receiver.tag(), method) else {
            return Err(EvalError::new(
                EvalErrorKind::UnknownMethod {
                    receiver: receiver.type_name(),
                    method: method.to_string(),
                },
                line,
            ));
        };
        builtin(context, line, name, receiver, &args)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run_script<'a>(
        globals: &'a Namespace,
        source: &str,
    ) -> (Result<Vec<Rc<dyn EditCommand + 'a>>, EvalError>, String) {
        let script = parse(source).unwrap();
        let mut context = Context::new(globals, "", 0, 0);
        let result = Evaluator::new().run(&script, &mut context);
        let transcript = context.transcript().to_string();
        (result, transcript)
    }

    fn run_err(source: &str) -> String {
        let globals = Namespace::global(0);
        let (result, _) = run_script(&globals, source);
        let Err(error) = result else {
            panic!("evaluation succeeded");
        };
        error.to_string()
    }

    #[test]
    fn write_line_appends_to_the_transcript() {
        let globals = Namespace::global(0);
        let (result, transcript) =
            run_script(&globals, "define Run()\n\tWriteLine(\"hello\")\nend\n");
        assert!(result.unwrap().is_empty());
        assert_eq!(transcript, "hello\n");
    }

    #[test]
    fn interpolation_stringifies_values() {
        let globals = Namespace::global(0);
        let (result, transcript) = run_script(
            &globals,
            "define Run()\n\tlet x = [true, null] in\n\t\tWriteLine(\"got #{x}\")\n\tend\nend\n",
        );
        assert!(result.is_ok());
        assert_eq!(transcript, "got [true, null]\n");
    }

    #[test]
    fn string_escapes_collapse() {
        let globals = Namespace::global(0);
        let (_, transcript) =
            run_script(&globals, "define Run()\n\tWriteLine(\"a \"\"b\"\" c\")\nend\n");
        assert_eq!(transcript, "a \"b\" c\n");
    }

    #[test]
    fn conditionals_and_operators() {
        let globals = Namespace::global(0);
        let (_, transcript) = run_script(
            &globals,
            "define Run()\n\tif \"abc\".Contains(\"b\") and not false then\n\t\tWrite(\"yes\")\n\tend\nend\n",
        );
        assert_eq!(transcript, "yes");
    }

    #[test]
    fn from_filters_and_selects() {
        let globals = Namespace::global(0);
        let (_, transcript) = run_script(
            &globals,
            "define Run()\n\tlet s = from x in [\"a\", \"bb\", \"c\"] where not x.IsEmpty select x in\n\t\tWriteLine(\", \".Join(s))\n\tend\nend\n",
        );
        assert_eq!(transcript, "a, bb, c\n");
    }

    #[test]
    fn is_checks_walk_the_tag_chain() {
        let globals = Namespace::global(0);
        let (_, transcript) = run_script(
            &globals,
            "define Run()\n\tif null is Void then\n\t\tWrite(\"v\")\n\tend\n\tif Globals is TypeScope then\n\t\tWrite(\"s\")\n\tend\nend\n",
        );
        assert_eq!(transcript, "vs");
    }

    #[test]
    fn unknown_method_names_the_receiver() {
        assert_eq!(
            run_err("define Run()\n\treturn true.Foo\nend\n"),
            "Boolean does not respond to the get_Foo method at line 2"
        );
    }

    #[test]
    fn empty_sequence_access_is_reported() {
        assert_eq!(
            run_err("define Run()\n\treturn [].First\nend\n"),
            "attempt to get element 1 from the Sequence, but there are only 0 elements at line 2"
        );
    }

    #[test]
    fn builtin_arity_is_checked() {
        assert_eq!(
            run_err("define Run()\n\treturn \"a\".Contains(\"b\", \"c\")\nend\n"),
            "String.Contains takes one argument at line 2"
        );
    }

    #[test]
    fn builtin_argument_types_are_checked() {
        assert_eq!(
            run_err("define Run()\n\treturn \"a\".Contains(true)\nend\n"),
            "expected a String for the first argument to String.Contains, not Boolean at line 2"
        );
    }

    #[test]
    fn script_method_arity_is_checked() {
        assert_eq!(
            run_err("define Helper(a, b)\nend\n\ndefine Run()\n\tHelper(null)\nend\n"),
            "the Helper method takes 2 arguments, not 1 argument at line 5"
        );
    }

    #[test]
    fn run_result_must_be_null_or_an_edit() {
        assert_eq!(
            run_err("define Run()\n\treturn true\nend\n"),
            "Run should return null or an Edit, not Boolean at line 1"
        );
    }

    #[test]
    fn redefining_a_builtin_is_rejected() {
        assert_eq!(
            run_err("define Write(x)\nend\n\ndefine Run()\nend\n"),
            "the Write method is already defined at line 1"
        );
    }

    #[test]
    fn recursion_is_bounded() {
        assert_eq!(
            run_err("define Run()\n\tRun()\nend\n"),
            "method calls have recursed more than 256 times at line 2"
        );
    }

    #[test]
    fn raise_aborts_with_the_message() {
        assert_eq!(
            run_err("define Run()\n\tRaise(\"no selection\")\nend\n"),
            "no selection at line 2"
        );
    }

    #[test]
    fn indent_requires_tabs() {
        assert_eq!(
            run_err("define Run()\n\treturn Indent(\"  \")\nend\n"),
            "the argument to Script.Indent should contain only tabs at line 2"
        );
    }

    #[test]
    fn non_boolean_predicates_are_reported() {
        assert_eq!(
            run_err("define Run()\n\tif \"x\" then\n\t\treturn null\n\tend\nend\n"),
            "the if predicate should return a Boolean, but was a String at line 2"
        );
    }

    #[test]
    fn for_requires_a_sequence() {
        assert_eq!(
            run_err("define Run()\n\tfor x in true do\n\tend\nend\n"),
            "the for statement should return a Sequence, but was a Boolean at line 2"
        );
    }

    #[test]
    fn enable_tracing_turns_tracing_on() {
        let globals = Namespace::global(0);
        let script = parse(
            "define property EnableTracing\n\treturn true\nend\n\ndefine Run()\nend\n",
        )
        .unwrap();
        let mut context = Context::new(&globals, "", 0, 0);
        Evaluator::new().run(&script, &mut context).unwrap();
        assert!(context.trace);
    }

    #[test]
    fn unique_names_start_from_the_base_name() {
        let globals = Namespace::global(0);
        let (_, transcript) = run_script(
            &globals,
            "define Run()\n\tWriteLine(GetUniqueName(\"Helper\"))\nend\n",
        );
        assert_eq!(transcript, "Helper\n");
    }
}
