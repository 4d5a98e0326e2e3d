//! Mutable state threaded through script evaluation.

use std::collections::HashMap;
use std::rc::Rc;

use crate::commands::EditCommand;
use crate::decl::Namespace;
use crate::value::Value;

/// Method calls deeper than this abort evaluation.
pub const MAX_DEPTH: usize = 256;

/// Everything a running script can see or produce: the declaration tree,
/// the file text and selection, the local scope stack, and the edits
/// queued so far.
pub struct Context<'a> {
    pub globals: &'a Namespace,
    pub text: &'a str,
    pub selection_offset: usize,
    pub selection_len: usize,
    /// Set from the script's `EnableTracing` property.
    pub trace: bool,
    scopes: Vec<HashMap<String, Value<'a>>>,
    commands: Vec<Rc<dyn EditCommand + 'a>>,
    depth: usize,
    transcript: String,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(
        globals: &'a Namespace,
        text: &'a str,
        selection_offset: usize,
        selection_len: usize,
    ) -> Self {
        Self {
            globals,
            text,
            selection_offset,
            selection_len,
            trace: false,
            scopes: Vec::new(),
            commands: Vec::new(),
            depth: 0,
            transcript: String::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind `name` in the innermost scope, shadowing any outer binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Look `name` up in the innermost scope only. Outer frames belong to
    /// other method invocations and are not visible.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Value<'a>> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }

    /// Queue an edit, unless it is the very command queued last. Scripts
    /// often both return a command and evaluate it as a statement.
    pub fn add_command(&mut self, command: Rc<dyn EditCommand + 'a>) {
        let duplicate = self
            .commands
            .last()
            .is_some_and(|last| std::ptr::addr_eq(Rc::as_ptr(last), Rc::as_ptr(&command)));
        if !duplicate {
            self.commands.push(command);
        }
    }

    #[must_use]
    pub fn commands(&self) -> &[Rc<dyn EditCommand + 'a>] {
        &self.commands
    }

    #[must_use]
    pub fn take_commands(&mut self) -> Vec<Rc<dyn EditCommand + 'a>> {
        std::mem::take(&mut self.commands)
    }

    /// Track method-call depth; false once the limit is breached.
    pub fn enter(&mut self) -> bool {
        self.depth += 1;
        self.depth <= MAX_DEPTH
    }

    pub fn leave(&mut self) {
        self.depth -= 1;
    }

    pub fn write(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    pub fn write_line(&mut self, text: &str) {
        self.transcript.push_str(text);
        self.transcript.push('\n');
    }

    /// Everything the script printed with `Write`/`WriteLine`.
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::InsertBeforeLine;

    #[test]
    fn lookup_sees_only_the_innermost_scope() {
        let globals = Namespace::global(0);
        let mut context = Context::new(&globals, "", 0, 0);

        context.push_scope();
        context.define("x", Value::Bool(true));
        context.push_scope();
        assert!(context.lookup("x").is_none());

        context.define("x", Value::Bool(false));
        assert_eq!(context.lookup("x"), Some(&Value::Bool(false)));

        context.pop_scope();
        assert_eq!(context.lookup("x"), Some(&Value::Bool(true)));
    }

    #[test]
    fn queueing_the_same_command_twice_keeps_one() {
        let globals = Namespace::global(0);
        let mut context = Context::new(&globals, "", 0, 0);

        let command: Rc<dyn EditCommand> = Rc::new(InsertBeforeLine::new(0, vec![]));
        context.add_command(Rc::clone(&command));
        context.add_command(Rc::clone(&command));
        assert_eq!(context.commands().len(), 1);

        let other: Rc<dyn EditCommand> = Rc::new(InsertBeforeLine::new(0, vec![]));
        context.add_command(other);
        context.add_command(command);
        assert_eq!(context.commands().len(), 3);
    }

    #[test]
    fn depth_guard_trips_past_the_limit() {
        let globals = Namespace::global(0);
        let mut context = Context::new(&globals, "", 0, 0);

        for _ in 0..MAX_DEPTH {
            assert!(context.enter());
        }
        assert!(!context.enter());
    }
}
