use std::fmt;

use crate::Error;
use crate::ast::{Arm, Expr, ExprKind, Method, Script, Stmt, StmtKind};
use crate::scanner::Scanner;
use crate::token::TokenKind;

/// Classifies a parser error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The current token is not what the grammar needs; `what` reads like
    /// "'then' for the if statement".
    Expected { what: String, found: String },
    /// A `let`/`for`/`from` local shadowing an existing one.
    DuplicateLocal(String),
    /// The same parameter name twice in one method.
    DuplicateArgument(String),
    /// Two methods with the same name.
    DuplicateMethod(String),
    /// No `Run` method anywhere in the script.
    MissingRun,
    /// Input left over after the last method.
    TrailingInput(String),
    /// `#{` with no closing `}` inside a string literal.
    UnterminatedInterpolation,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expected { what, found } => {
                write!(f, "expected {what}, but found '{found}'")
            }
            Self::DuplicateLocal(name) => {
                write!(f, "there is already a definition for the '{name}' local")
            }
            Self::DuplicateArgument(name) => {
                write!(f, "the '{name}' argument name appears twice")
            }
            Self::DuplicateMethod(name) => {
                write!(f, "the {name} method was defined more than once")
            }
            Self::MissingRun => write!(f, "script has no Run method"),
            Self::TrailingInput(found) => {
                write!(f, "expected eof, but found '{found}'")
            }
            Self::UnterminatedInterpolation => {
                write!(f, "expected a '}}' to close the string interpolation")
            }
        }
    }
}

/// Error produced while parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {line}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
}

/// Parse a script and check its script-level rules: unique method names,
/// a `Run` method, nothing after the last `end`.
///
/// # Errors
///
/// Returns [`Error::Scan`] or [`Error::Parse`].
pub fn parse(text: &str) -> Result<Script, Error> {
    let mut parser = Parser::new(text)?;
    let script = parser.parse_compilation_unit()?;

    if !script.methods.iter().any(|m| m.name == "Run") {
        return Err(ParseError {
            kind: ParseErrorKind::MissingRun,
            line: 1,
        }
        .into());
    }

    Ok(script)
}

struct Parser<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, Error> {
        Ok(Self {
            scanner: Scanner::new(text)?,
        })
    }

    /// Numbers lines from `line`; used by the interpolation sub-parser.
    fn with_line(text: &'a str, line: usize) -> Result<Self, Error> {
        Ok(Self {
            scanner: Scanner::with_line(text, line)?,
        })
    }

    fn line(&self) -> usize {
        self.scanner.token().line
    }

    fn error(&self, kind: ParseErrorKind) -> Error {
        ParseError {
            kind,
            line: self.line(),
        }
        .into()
    }

    fn expected(&self, what: impl Into<String>) -> Error {
        self.error(ParseErrorKind::Expected {
            what: what.into(),
            found: self.scanner.token().describe().to_string(),
        })
    }

    // CompilationUnit := Declaration+
    // Declaration := MethodDeclaration | PropertyDeclaration
    fn parse_compilation_unit(&mut self) -> Result<Script, Error> {
        let mut methods: Vec<Method> = Vec::new();
        let mut locals = Vec::new();

        while self.scanner.token().is_keyword("define") {
            self.scanner.advance()?;

            if self.scanner.token().is_keyword("property") {
                self.scanner.advance()?;
                methods.push(self.parse_property_declaration(&mut locals)?);
            } else {
                methods.push(self.parse_method_declaration(&mut locals)?);
            }
        }
        debug_assert!(locals.is_empty(), "locals were not cleaned up");

        for (i, method) in methods.iter().enumerate() {
            if methods[i + 1..].iter().any(|m| m.name == method.name) {
                return Err(ParseError {
                    kind: ParseErrorKind::DuplicateMethod(method.name.clone()),
                    line: 1,
                }
                .into());
            }
        }

        if !self.scanner.token().is_eof() {
            return Err(self.error(ParseErrorKind::TrailingInput(
                self.scanner.token().describe().to_string(),
            )));
        }

        Ok(Script { methods })
    }

    // MethodDeclaration := 'define' Identifier FormalArgs Statement* 'end'
    fn parse_method_declaration(&mut self, locals: &mut Vec<String>) -> Result<Method, Error> {
        let line = self.line();
        let name = self.parse_identifier("for the method's name")?;
        let params = self.parse_formal_args()?;

        debug_assert!(locals.is_empty(), "locals were not reset");
        for param in &params {
            if locals.contains(param) {
                return Err(ParseError {
                    kind: ParseErrorKind::DuplicateArgument(param.clone()),
                    line,
                }
                .into());
            }
            locals.push(param.clone());
        }

        let body = self.parse_statements(locals)?;
        locals.clear();

        self.parse_keyword("end", &format!("to end the {name} method"))?;

        Ok(Method {
            name,
            params,
            body,
            line,
        })
    }

    // PropertyDeclaration := 'define' 'property' Identifier Statement* 'end'
    fn parse_property_declaration(&mut self, locals: &mut Vec<String>) -> Result<Method, Error> {
        let line = self.line();
        let name = self.parse_identifier("for the property name")?;

        let body = self.parse_statements(locals)?;
        self.parse_keyword("end", &format!("to end the {name} property"))?;

        Ok(Method {
            name: format!("get_{name}"),
            params: Vec::new(),
            body,
            line,
        })
    }

    // FormalArgs := '(' IdentifierList? ')'
    fn parse_formal_args(&mut self) -> Result<Vec<String>, Error> {
        self.parse_punct("(", "to open the method's formal argument list")?;

        let args = if self.scanner.token().is_identifier() {
            self.parse_identifier_list("for the method's formal arguments")?
        } else {
            Vec::new()
        };

        self.parse_punct(")", "to close the method's formal argument list")?;
        Ok(args)
    }

    fn parse_statements(&mut self, locals: &mut Vec<String>) -> Result<Vec<Stmt>, Error> {
        let mut statements = Vec::new();

        while !self.scanner.token().is_eof()
            && !self.scanner.token().is_keyword("end")
            && !self.scanner.token().is_keyword("elif")
            && !self.scanner.token().is_keyword("else")
        {
            statements.push(self.parse_statement(locals)?);
        }

        Ok(statements)
    }

    // Statement := IfStatement | ForStatement | LetStatement
    //            | MethodStatement | ReturnStatement
    fn parse_statement(&mut self, locals: &mut Vec<String>) -> Result<Stmt, Error> {
        let line = self.line();
        if self.scanner.token().is_keyword("if") {
            self.scanner.advance()?;
            self.parse_if(line, locals)
        } else if self.scanner.token().is_keyword("for") {
            self.scanner.advance()?;
            self.parse_for(line, locals)
        } else if self.scanner.token().is_keyword("let") {
            self.scanner.advance()?;
            self.parse_let(line, locals)
        } else if self.scanner.token().is_keyword("return") {
            self.scanner.advance()?;
            let value = self.parse_expression(locals)?;
            Ok(Stmt::new(StmtKind::Return(value), line))
        } else {
            let value = self.parse_call_expression(locals)?;
            Ok(Stmt::new(StmtKind::Expr(value), line))
        }
    }

    // IfStatement := IfClause ElifClause* ElseClause? 'end'
    // IfClause := 'if' Expression 'then' Statement*
    // ElifClause := 'elif' Expression 'then' Statement*
    // ElseClause := 'else' Statement*
    fn parse_if(&mut self, line: usize, locals: &mut Vec<String>) -> Result<Stmt, Error> {
        let mut arms = Vec::new();

        let predicate = self.parse_expression(locals)?;
        self.parse_keyword("then", "for the if statement")?;
        let block = self.parse_statements(locals)?;
        arms.push(Arm { predicate, block });

        while self.scanner.token().is_keyword("elif") {
            self.scanner.advance()?;
            let predicate = self.parse_expression(locals)?;
            self.parse_keyword("then", "for the elif clause")?;
            let block = self.parse_statements(locals)?;
            arms.push(Arm { predicate, block });
        }

        if self.scanner.token().is_keyword("else") {
            let else_line = self.line();
            self.scanner.advance()?;
            let block = self.parse_statements(locals)?;
            arms.push(Arm {
                predicate: Expr::literal_true(else_line),
                block,
            });
        }

        self.parse_keyword("end", "to close the if statement")?;
        Ok(Stmt::new(StmtKind::If(arms), line))
    }

    // ForStatement := ForClause WhereClause? 'do' Statement* 'end'
    // ForClause := 'for' Identifier 'in' CallExpression
    // WhereClause := 'where' OrExpression
    fn parse_for(&mut self, line: usize, locals: &mut Vec<String>) -> Result<Stmt, Error> {
        let local = self.parse_identifier("for the for loop variable")?;
        self.parse_keyword("in", "for the for elements")?;
        let source = self.parse_call_expression(locals)?;

        if locals.contains(&local) {
            return Err(self.error(ParseErrorKind::DuplicateLocal(local)));
        }
        locals.push(local.clone());

        let filter = if self.scanner.token().is_keyword("where") {
            self.scanner.advance()?;
            Some(self.parse_or_expression(locals)?)
        } else {
            None
        };

        self.parse_keyword("do", "to start the for statements")?;
        let block = self.parse_statements(locals)?;
        self.parse_keyword("end", "to end the for statements")?;

        locals.retain(|name| name != &local);

        Ok(Stmt::new(
            StmtKind::For {
                local,
                source,
                filter,
                block,
            },
            line,
        ))
    }

    // LetStatement := 'let' LetLocal (',' LetLocal)* 'in' Statement* 'end'
    // LetLocal := Identifier '=' Expression
    fn parse_let(&mut self, line: usize, locals: &mut Vec<String>) -> Result<Stmt, Error> {
        let mut bindings = Vec::new();

        self.parse_let_local(locals, &mut bindings)?;
        while self.scanner.token().is_punct(",") {
            self.scanner.advance()?;
            self.parse_let_local(locals, &mut bindings)?;
        }

        self.parse_keyword("in", "for the local statement")?;
        let block = self.parse_statements(locals)?;
        self.parse_keyword("end", "to end the let statements")?;

        for (name, _) in &bindings {
            locals.retain(|local| local != name);
        }

        Ok(Stmt::new(StmtKind::Let { bindings, block }, line))
    }

    fn parse_let_local(
        &mut self,
        locals: &mut Vec<String>,
        bindings: &mut Vec<(String, Expr)>,
    ) -> Result<(), Error> {
        let local = self.parse_identifier("for the let local")?;
        self.parse_punct("=", "for the let local value")?;
        let value = self.parse_expression(locals)?;

        if locals.contains(&local) {
            return Err(self.error(ParseErrorKind::DuplicateLocal(local)));
        }
        locals.push(local.clone());
        bindings.push((local, value));
        Ok(())
    }

    // Expression := OrExpression | FromExpression | WhenExpression
    fn parse_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        if self.scanner.token().is_keyword("from") {
            self.scanner.advance()?;
            return self.parse_from_expression(locals);
        }

        let line = self.line();
        let result = self.parse_or_expression(locals)?;

        if self.scanner.token().is_keyword("when") {
            self.scanner.advance()?;
            return self.parse_when_expression(locals, result, line);
        }

        Ok(result)
    }

    // FromExpression := FromClause ('where' OrExpression)? ('select' OrExpression)?
    // FromClause := 'from' Identifier 'in' CallExpression
    fn parse_from_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let line = self.line();
        let local = self.parse_identifier("for the from loop variable")?;
        self.parse_keyword("in", "for the from elements")?;
        let source = self.parse_call_expression(locals)?;

        if locals.contains(&local) {
            return Err(self.error(ParseErrorKind::DuplicateLocal(local)));
        }
        locals.push(local.clone());

        let filter = if self.scanner.token().is_keyword("where") {
            self.scanner.advance()?;
            Some(Box::new(self.parse_or_expression(locals)?))
        } else {
            None
        };

        let select = if self.scanner.token().is_keyword("select") {
            self.scanner.advance()?;
            self.parse_or_expression(locals)?
        } else {
            Expr::new(ExprKind::Local(local.clone()), line)
        };

        locals.retain(|name| name != &local);

        Ok(Expr::new(
            ExprKind::From {
                local,
                source: Box::new(source),
                filter,
                select: Box::new(select),
            },
            line,
        ))
    }

    // WhenExpression := OrExpression 'when' OrExpression 'else' OrExpression
    fn parse_when_expression(
        &mut self,
        locals: &mut Vec<String>,
        value: Expr,
        line: usize,
    ) -> Result<Expr, Error> {
        let predicate = self.parse_or_expression(locals)?;
        self.parse_keyword("else", "for the when expression")?;
        let otherwise = self.parse_or_expression(locals)?;

        Ok(Expr::new(
            ExprKind::When {
                value: Box::new(value),
                predicate: Box::new(predicate),
                otherwise: Box::new(otherwise),
            },
            line,
        ))
    }

    // OrExpression = AndExpression ('or' AndExpression)*
    fn parse_or_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let mut result = self.parse_and_expression(locals)?;

        while self.scanner.token().is_keyword("or") {
            let line = self.line();
            self.scanner.advance()?;
            let rhs = self.parse_and_expression(locals)?;
            result = invoke(result, "op_LogicalOr", vec![rhs], line);
        }

        Ok(result)
    }

    // AndExpression = EqualityExpression ('and' EqualityExpression)*
    fn parse_and_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let mut result = self.parse_equality_expression(locals)?;

        while self.scanner.token().is_keyword("and") {
            let line = self.line();
            self.scanner.advance()?;
            let rhs = self.parse_equality_expression(locals)?;
            result = invoke(result, "op_LogicalAnd", vec![rhs], line);
        }

        Ok(result)
    }

    // EqualityExpression = RelationalExpression (('==' | '!=') RelationalExpression)?
    fn parse_equality_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let mut result = self.parse_relational_expression(locals)?;

        for (punct, method) in [("==", "op_Equals"), ("!=", "op_NotEquals")] {
            if self.scanner.token().is_punct(punct) {
                let line = self.line();
                self.scanner.advance()?;
                let rhs = self.parse_relational_expression(locals)?;
                result = invoke(result, method, vec![rhs], line);
                break;
            }
        }

        Ok(result)
    }

    // RelationalExpression = AddExpression ('is' Identifier)?
    fn parse_relational_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let mut result = self.parse_add_expression(locals)?;

        if self.scanner.token().is_keyword("is") {
            let line = self.line();
            self.scanner.advance()?;
            let name = self.parse_identifier("for the is expression")?;
            let type_name = Expr::new(ExprKind::TypeName(name), line);
            result = invoke(result, "op_IsType", vec![type_name], line);
        }

        Ok(result)
    }

    // AddExpression := UnaryExpression ('+' UnaryExpression)*
    fn parse_add_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let mut result = self.parse_unary_expression(locals)?;

        while self.scanner.token().is_punct("+") {
            let line = self.line();
            self.scanner.advance()?;
            let rhs = self.parse_unary_expression(locals)?;
            result = invoke(result, "op_Add", vec![rhs], line);
        }

        Ok(result)
    }

    // UnaryExpression := 'not'? CallExpression
    fn parse_unary_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let line = self.line();
        let notted = if self.scanner.token().is_keyword("not") {
            self.scanner.advance()?;
            true
        } else {
            false
        };

        let result = self.parse_call_expression(locals)?;
        if notted {
            return Ok(invoke(result, "op_LogicalComplement", vec![], line));
        }
        Ok(result)
    }

    // CallExpression = PrimaryExpression ('.' MethodCall)*
    fn parse_call_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let mut result = self.parse_primary_expression(locals)?;

        while self.scanner.token().is_punct(".") {
            let line = self.line();
            self.scanner.advance()?;
            result = self.parse_method_call(line, locals, result)?;
        }

        Ok(result)
    }

    // MethodCall := Identifier ActualArgs?
    // A bare name reads as a property access: `.Name` lowers to `get_Name`.
    fn parse_method_call(
        &mut self,
        line: usize,
        locals: &mut Vec<String>,
        target: Expr,
    ) -> Result<Expr, Error> {
        let name = self.parse_identifier("for a method or property name")?;

        if self.scanner.token().is_punct("(") {
            let args = self.parse_actual_args(locals, &name)?;
            Ok(invoke(target, &name, args, line))
        } else {
            Ok(invoke(target, &format!("get_{name}"), vec![], line))
        }
    }

    // ActualArgs := '(' ExpressionList? ')'
    fn parse_actual_args(
        &mut self,
        locals: &mut Vec<String>,
        method: &str,
    ) -> Result<Vec<Expr>, Error> {
        self.parse_punct("(", &format!("to open the {method} method argument list"))?;

        let args = if self.scanner.token().is_punct(")") {
            Vec::new()
        } else {
            self.parse_expression_list(locals)?
        };

        self.parse_punct(")", &format!("to close the {method} method argument list"))?;
        Ok(args)
    }

    // ExpressionList := Expression (',' Expression)*
    fn parse_expression_list(&mut self, locals: &mut Vec<String>) -> Result<Vec<Expr>, Error> {
        let mut exprs = vec![self.parse_expression(locals)?];

        while self.scanner.token().is_punct(",") {
            self.scanner.advance()?;
            exprs.push(self.parse_expression(locals)?);
        }

        Ok(exprs)
    }

    // PrimaryExpression = Literal | Local | MethodCall | ParenthesizedExpression
    fn parse_primary_expression(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        if let Some(literal) = self.parse_literal(locals)? {
            return Ok(literal);
        }

        if self.scanner.token().is_identifier() {
            let line = self.line();
            if locals.contains(&self.scanner.token().text) {
                let name = self.scanner.token().text.clone();
                self.scanner.advance()?;
                return Ok(Expr::new(ExprKind::Local(name), line));
            }
            // Not a local, so an implicit call on self.
            let target = Expr::new(ExprKind::SelfRef, line);
            return self.parse_method_call(line, locals, target);
        }

        if self.scanner.token().is_punct("(") {
            self.scanner.advance()?;
            let result = self.parse_expression(locals)?;
            self.parse_punct(")", "to close the parenthesized expression")?;
            return Ok(result);
        }

        Err(self.expected("a literal, call, or parenthesized expression"))
    }

    // Literal := 'true' | 'false' | 'null' | 'self'
    //          | SequenceLiteral | StringLiteral
    fn parse_literal(&mut self, locals: &mut Vec<String>) -> Result<Option<Expr>, Error> {
        let line = self.line();

        let kind = if self.scanner.token().is_keyword("true") {
            ExprKind::Bool(true)
        } else if self.scanner.token().is_keyword("false") {
            ExprKind::Bool(false)
        } else if self.scanner.token().is_keyword("null") {
            ExprKind::Null
        } else if self.scanner.token().is_keyword("self") {
            ExprKind::SelfRef
        } else if self.scanner.token().is_punct("[") {
            self.scanner.advance()?;
            return Ok(Some(self.parse_sequence_literal(line, locals)?));
        } else if self.scanner.token().kind == TokenKind::Str {
            return Ok(Some(self.parse_string_literal(locals)?));
        } else {
            return Ok(None);
        };

        self.scanner.advance()?;
        Ok(Some(Expr::new(kind, line)))
    }

    // SequenceLiteral := '[' ExpressionList? ']'
    fn parse_sequence_literal(
        &mut self,
        line: usize,
        locals: &mut Vec<String>,
    ) -> Result<Expr, Error> {
        let elements = if self.scanner.token().is_punct("]") {
            Vec::new()
        } else {
            self.parse_expression_list(locals)?
        };

        self.parse_punct("]", "to end the sequence literal")?;
        Ok(Expr::new(ExprKind::Seq(elements), line))
    }

    // "foo #{e} bar" lowers to "foo " + (e) + " bar", re-parsed with a
    // sub-parser so the embedded expressions get real line numbers.
    fn parse_string_literal(&mut self, locals: &mut Vec<String>) -> Result<Expr, Error> {
        let line = self.line();
        let text = self.scanner.token().text.clone();
        self.scanner.advance()?;

        if text.contains("#{") {
            let lowered = interpolate(line, &text)?;
            let mut parser = Parser::with_line(&lowered, line)?;
            return parser.parse_add_expression(locals);
        }

        Ok(Expr::new(ExprKind::Str(text), line))
    }

    fn parse_identifier(&mut self, reason: &str) -> Result<String, Error> {
        if !self.scanner.token().is_identifier() {
            return Err(self.expected(format!("an identifier {reason}")));
        }

        let name = self.scanner.token().text.clone();
        self.scanner.advance()?;
        Ok(name)
    }

    fn parse_identifier_list(&mut self, reason: &str) -> Result<Vec<String>, Error> {
        let mut identifiers = vec![self.parse_identifier(reason)?];

        while self.scanner.token().is_punct(",") {
            self.scanner.advance()?;
            identifiers.push(self.parse_identifier(reason)?);
        }

        Ok(identifiers)
    }

    fn parse_keyword(&mut self, name: &str, reason: &str) -> Result<(), Error> {
        if !self.scanner.token().is_keyword(name) {
            return Err(self.expected(format!("'{name}' {reason}")));
        }
        self.scanner.advance()?;
        Ok(())
    }

    fn parse_punct(&mut self, symbol: &str, reason: &str) -> Result<(), Error> {
        if !self.scanner.token().is_punct(symbol) {
            return Err(self.expected(format!("a '{symbol}' {reason}")));
        }
        self.scanner.advance()?;
        Ok(())
    }
}

fn invoke(target: Expr, method: &str, args: Vec<Expr>, line: usize) -> Expr {
    Expr::new(
        ExprKind::Invoke {
            target: Box::new(target),
            method: method.to_string(),
            args,
        },
        line,
    )
}

// "foo #{e} bar #{f}" => "foo " + (e) + " bar " + (f) + ""
fn interpolate(line: usize, text: &str) -> Result<String, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut lowered = String::with_capacity(text.len() + 8);

    lowered.push('"');

    let mut i = 0;
    let mut copying = true;
    while i < chars.len() {
        if copying {
            if chars[i] == '#' && chars.get(i + 1) == Some(&'{') {
                copying = false;
                lowered.push_str("\" + (");
                i += 2;
            } else {
                lowered.push(chars[i]);
                i += 1;
            }
        } else {
            if chars[i] == '}' {
                copying = true;
                lowered.push_str(") + \"");
            } else if chars[i] == '"' && chars.get(i + 1) == Some(&'"') {
                lowered.push('"');
                i += 1;
            } else {
                lowered.push(chars[i]);
            }
            i += 1;
        }
    }

    if !copying {
        return Err(ParseError {
            kind: ParseErrorKind::UnterminatedInterpolation,
            line,
        });
    }

    lowered.push('"');
    Ok(lowered)
}
