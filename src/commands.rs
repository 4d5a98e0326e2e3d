//! Edit commands produced by script evaluation.
//!
//! A command computes its range against the pristine text, may tweak
//! what it inserts once all queued commands are known, and finally
//! applies itself to the buffer. Ranges are computed before any mutation
//! so commands stay independent of each other; the patch engine orders
//! and applies them.

use std::cell::{Cell, RefCell};
use std::fmt;

use tracing::debug;

use crate::decl::{Body, GLOBALS, Member, Namespace, TypeDecl, is_interface};

/// The half-open text range a command affects. Insertions at `offset`
/// itself are not counted in `length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditRange {
    pub offset: usize,
    pub length: usize,
}

impl EditRange {
    #[must_use]
    pub const fn at(offset: usize) -> Self {
        Self { offset, length: 0 }
    }
}

/// A single queued edit.
pub trait EditCommand: fmt::Display {
    /// Display name used in overlap diagnostics.
    fn kind(&self) -> &'static str;

    /// Compute the affected range against the unmodified text. `None`
    /// means the command has nothing to do. Must not mutate the text.
    fn find_range(&self, text: &str) -> Option<EditRange>;

    /// Runs after every range is known, in execution order. May change
    /// what this command inserts but never where.
    fn pre_execute(&self, _commands: &[&dyn EditCommand], _index: usize) {}

    /// Apply the edit at the range `find_range` produced.
    fn execute(&self, text: &mut String, range: EditRange);
}

/// Offset of the start of the line `offset` is within.
#[must_use]
pub fn find_line_start(text: &str, offset: usize) -> usize {
    let bytes = text.as_bytes();
    let mut offset = offset.min(bytes.len());
    while offset > 0 && bytes[offset - 1] != b'\n' {
        offset -= 1;
    }
    offset
}

/// Offset of the start of the line after the one `offset` is within.
#[must_use]
pub fn find_next_line_start(text: &str, offset: usize) -> usize {
    let bytes = text.as_bytes();
    let mut end = offset.min(bytes.len());
    while end < bytes.len() && bytes[end] != b'\n' {
        end += 1;
    }
    if end < bytes.len() {
        end += 1;
    }
    end
}

fn prev_line_start(text: &str, first: usize) -> usize {
    let bytes = text.as_bytes();
    debug_assert!(first == 0 || bytes[first - 1] == b'\n');

    let mut first = first;
    if first > 0 {
        first -= 1;
        while first > 0 && bytes[first - 1] != b'\n' {
            first -= 1;
        }
    }
    first
}

/// Leading whitespace of the line starting at `start`, with one extra
/// tab when the line opens a brace block.
fn infer_indent(text: &str, start: usize) -> String {
    let bytes = text.as_bytes();
    debug_assert!(start == 0 || bytes[start - 1] == b'\n');

    let mut index = start;
    while index < bytes.len() && (bytes[index] == b' ' || bytes[index] == b'\t') {
        index += 1;
    }
    let mut indent = text[start..index].to_string();

    if index < bytes.len() && bytes[index] == b'{' {
        // A line of whitespace with a { on the end.
        indent.push('\t');
    } else {
        // A line with printable characters that ends with a {.
        while index < bytes.len() && bytes[index] != b'{' && bytes[index] != b'\n' {
            index += 1;
        }
        if index < bytes.len() && bytes[index] == b'{' {
            index += 1;
            while index < bytes.len() && (bytes[index] == b' ' || bytes[index] == b'\t') {
                index += 1;
            }
            if index < bytes.len() && bytes[index] == b'\n' {
                indent.push('\t');
            }
        }
    }

    indent
}

/// Insert whole lines at `offset` (which must be a line start), each
/// indented like the previous line.
fn add_lines(text: &mut String, offset: usize, lines: &[String]) {
    let previous = prev_line_start(text, offset);
    let indent = infer_indent(text, previous);

    let mut at = offset;
    for line in lines {
        text.insert_str(at, &indent);
        at += indent.len();
        text.insert_str(at, line);
        at += line.len();
        text.insert(at, '\n');
        at += 1;
    }
}

fn truncated(line: &str) -> String {
    if line.chars().count() > 40 {
        let head: String = line.chars().take(40).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}

/// Short display form for a list of inserted lines.
fn lines_to_string(lines: &[String]) -> String {
    match lines {
        [] => "<no lines>".to_string(),
        [line] => truncated(line),
        [first, second] => format!("1: {}, 2: {}", truncated(first), truncated(second)),
        [first, second, ..] => {
            format!("1: {}, 2: {}, ...", truncated(first), truncated(second))
        }
    }
}

/// Adds a name to a type's base list, keeping sorted interface lists
/// sorted and base classes in front.
pub struct AddBaseType<'a> {
    ty: &'a TypeDecl,
    name: String,
    prefix: RefCell<String>,
    suffix: RefCell<String>,
}

impl<'a> AddBaseType<'a> {
    #[must_use]
    pub fn new(ty: &'a TypeDecl, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            prefix: RefCell::new(String::new()),
            suffix: RefCell::new(String::new()),
        }
    }

    fn sorted_offset(&self, text: &str) -> usize {
        let names = &self.ty.bases.names;
        let offset = self.ty.bases.offset;

        // The base class, if any, does not move.
        let start = usize::from(!is_interface(&names[0]));
        for name in &names[start..] {
            if name.as_str() > self.name.as_str() {
                let span = &text[offset..offset + self.ty.bases.length];
                if let Some(k) = span.find(name.as_str()) {
                    return offset + k;
                }
            }
        }

        offset + self.ty.bases.length
    }

    fn is_sorted(names: &[String]) -> bool {
        // The base class, if any, is allowed to sort anywhere.
        let start = if is_interface(&names[0]) { 1 } else { 2 };
        (start..names.len()).all(|i| names[i - 1] <= names[i])
    }
}

impl EditCommand for AddBaseType<'_> {
    fn kind(&self) -> &'static str {
        "AddBaseType"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        let bases = &self.ty.bases;

        if bases.names.iter().any(|n| n == &self.name) {
            return None;
        }

        if bases.names.is_empty() {
            *self.prefix.borrow_mut() = " : ".to_string();
            return Some(EditRange::at(bases.offset));
        }

        if !is_interface(&self.name) {
            // The base class always goes to the front.
            *self.suffix.borrow_mut() = ", ".to_string();
            return Some(EditRange::at(bases.offset));
        }

        if bases.names.len() > 1 && Self::is_sorted(&bases.names) {
            let offset = self.sorted_offset(text);
            if offset < bases.offset + bases.length {
                *self.suffix.borrow_mut() = ", ".to_string();
            } else {
                *self.prefix.borrow_mut() = ", ".to_string();
            }
            return Some(EditRange::at(offset));
        }

        *self.prefix.borrow_mut() = ", ".to_string();
        Some(EditRange::at(bases.offset + bases.length))
    }

    fn pre_execute(&self, commands: &[&dyn EditCommand], index: usize) {
        // With no existing bases only the last AddBaseType writes the
        // colon; the ones before it chain on with commas.
        if self.ty.bases.names.is_empty() {
            let later = commands[index + 1..].iter().any(|c| c.kind() == self.kind());
            *self.prefix.borrow_mut() = if later { ", " } else { " : " }.to_string();
        }
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(ty = %self.ty.name, name = %self.name, "AddBaseType");
        let insert = format!("{}{}{}", self.prefix.borrow(), self.name, self.suffix.borrow());
        text.insert_str(range.offset, &insert);
    }
}

impl fmt::Display for AddBaseType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.AddBase({})", self.ty.name, self.name)
    }
}

/// Adds a member to the top of a type's body, expanding a one-line
/// `{}` body if needed.
pub struct AddMember<'a> {
    ty: &'a TypeDecl,
    lines: Vec<String>,
    first: Cell<usize>,
}

impl<'a> AddMember<'a> {
    #[must_use]
    pub fn new(ty: &'a TypeDecl, lines: Vec<String>) -> Self {
        let mut lines = lines;
        // With existing declarations we want a trailing blank line.
        if !ty.declarations().is_empty() {
            lines.push(String::new());
        }
        Self {
            ty,
            lines,
            first: Cell::new(0),
        }
    }

    fn expanded_block(&self, text: &str) -> String {
        let indent = infer_indent(text, self.first.get());
        let mut block = String::from("\n");
        for line in &self.lines {
            block.push_str(&indent);
            block.push_str(line);
            block.push('\n');
        }
        if !indent.is_empty() {
            block.push_str(&indent[1..]);
        }
        block
    }
}

impl EditCommand for AddMember<'_> {
    fn kind(&self) -> &'static str {
        "AddMember"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        let first = find_line_start(text, self.ty.body.first);
        self.first.set(first);

        if first > self.ty.body.start {
            Some(EditRange::at(first))
        } else {
            // The whole body is on one line, e.g. "{}".
            Some(EditRange::at(self.ty.body.first))
        }
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(ty = %self.ty.name, lines = %lines_to_string(&self.lines), "AddMember");
        if self.first.get() > self.ty.body.start {
            add_lines(text, range.offset, &self.lines);
        } else {
            let block = self.expanded_block(text);
            text.insert_str(range.offset, &block);
        }
    }
}

impl fmt::Display for AddMember<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.AddMember({})", self.ty.name, lines_to_string(&self.lines))
    }
}

/// Adds a member directly before or after an existing member.
pub struct AddRelativeMember<'a> {
    member: &'a Member,
    after: bool,
    lines: Vec<String>,
}

impl<'a> AddRelativeMember<'a> {
    #[must_use]
    pub fn new(member: &'a Member, after: bool, lines: Vec<String>) -> Self {
        // A blank separator line goes on the side facing the member.
        let mut munged = lines;
        if after {
            munged.insert(0, String::new());
        } else {
            munged.push(String::new());
        }
        Self {
            member,
            after,
            lines: munged,
        }
    }
}

impl EditCommand for AddRelativeMember<'_> {
    fn kind(&self) -> &'static str {
        "AddRelativeMember"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        let index = if self.after {
            self.member.offset + self.member.length + 1
        } else {
            self.member.offset
        };
        Some(EditRange::at(find_line_start(text, index)))
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        if self.after {
            debug!(member = %self.member.name, "AddMemberAfter");
        } else {
            debug!(member = %self.member.name, "AddMemberBefore");
        }
        add_lines(text, range.offset, &self.lines);
    }
}

impl fmt::Display for AddRelativeMember<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.AddRelativeMember({})",
            self.member.name,
            lines_to_string(&self.lines)
        )
    }
}

/// Adds a using directive, keeping a sorted list sorted.
pub struct AddUsing<'a> {
    namespace: &'a Namespace,
    name: String,
}

impl<'a> AddUsing<'a> {
    #[must_use]
    pub fn new(namespace: &'a Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    fn is_sorted(&self) -> bool {
        self.namespace
            .uses
            .windows(2)
            .all(|pair| pair[0].name <= pair[1].name)
    }
}

impl EditCommand for AddUsing<'_> {
    fn kind(&self) -> &'static str {
        "AddUsing"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        let ns = self.namespace;

        if ns.uses.iter().any(|u| u.name == self.name) {
            return None;
        }

        if !ns.uses.is_empty() {
            // A single using counts as sorted.
            if self.is_sorted() {
                // Insert before the next largest namespace.
                if let Some(next) = ns.uses.iter().find(|u| u.name > self.name) {
                    return Some(EditRange::at(find_line_start(text, next.offset)));
                }
            }
            // Not sorted, or ours sorts last; append after the last using.
            let last = &ns.uses[ns.uses.len() - 1];
            return Some(EditRange::at(find_next_line_start(
                text,
                last.offset + last.length,
            )));
        }

        let declarations = ns.declarations();
        if let Some(first) = declarations.first() {
            return Some(EditRange::at(find_line_start(text, first.offset())));
        }

        if ns.name == GLOBALS {
            // An empty file; insert at the start.
            Some(EditRange::at(find_line_start(text, ns.offset)))
        } else {
            // An empty namespace; insert just before the closing brace.
            Some(EditRange::at(find_line_start(text, ns.body.last)))
        }
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(namespace = %self.namespace.name, name = %self.name, "AddUsing");

        let line = if self.namespace.uses.is_empty() && !self.namespace.declarations().is_empty() {
            format!("using {};\n", self.name)
        } else {
            format!("using {};", self.name)
        };
        add_lines(text, range.offset, &[line]);
    }
}

impl fmt::Display for AddUsing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.AddUsing({})", self.namespace.name, self.name)
    }
}

/// Replaces or inserts a member's access keyword.
pub struct ChangeAccess<'a> {
    member: &'a Member,
    access: String,
}

impl<'a> ChangeAccess<'a> {
    #[must_use]
    pub fn new(member: &'a Member, access: impl Into<String>) -> Self {
        Self {
            member,
            access: access.into(),
        }
    }
}

impl EditCommand for ChangeAccess<'_> {
    fn kind(&self) -> &'static str {
        "ChangeAccess"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        const CANDIDATES: &[&str] = &["public", "protected", "internal", "private"];

        // Scan identifier tokens from the member's declaration; stop at
        // the first token that is not a plain word.
        let bytes = text.as_bytes();
        let mut index = self.member.offset.min(bytes.len());
        loop {
            while index < bytes.len() && bytes[index].is_ascii_whitespace() {
                index += 1;
            }
            if index >= bytes.len() || !(bytes[index].is_ascii_alphabetic() || bytes[index] == b'_')
            {
                break;
            }

            let start = index;
            while index < bytes.len()
                && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_')
            {
                index += 1;
            }
            let word = &text[start..index];
            if CANDIDATES.contains(&word) {
                return Some(EditRange {
                    offset: start,
                    length: index - start + 1,
                });
            }
        }

        // No access keyword; a plain insert at the member.
        Some(EditRange::at(self.member.offset))
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(member = %self.member.name, access = %self.access, "ChangeAccess");

        let insert = format!("{} ", self.access);
        if range.length == 0 {
            text.insert_str(range.offset, &insert);
        } else {
            text.replace_range(range.offset..range.offset + range.length, &insert);
        }
    }
}

impl fmt::Display for ChangeAccess<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.ChangeAccess({})", self.member.name, self.access)
    }
}

/// Prefixes every line a range touches with tabs.
pub struct Indent {
    offset: usize,
    len: usize,
    tabs: String,
    new_text: RefCell<String>,
}

impl Indent {
    #[must_use]
    pub fn new(offset: usize, len: usize, tabs: impl Into<String>) -> Self {
        Self {
            offset,
            len,
            tabs: tabs.into(),
            new_text: RefCell::new(String::new()),
        }
    }
}

impl EditCommand for Indent {
    fn kind(&self) -> &'static str {
        "Indent"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        if self.tabs.is_empty() || self.len == 0 {
            return None;
        }

        let bytes = text.as_bytes();
        let first = find_line_start(text, self.offset);
        let mut length = self.len + self.offset - first - 1;
        while first + length < bytes.len() && bytes[first + length] != b'\n' {
            length += 1;
        }

        let old = &text[first..first + length];
        *self.new_text.borrow_mut() =
            format!("{}{}", self.tabs, old.replace('\n', &format!("\n{}", self.tabs)));

        Some(EditRange {
            offset: first,
            length,
        })
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(offset = self.offset, len = self.len, tabs = %self.tabs, "Indent");
        text.replace_range(
            range.offset..range.offset + range.length,
            &self.new_text.borrow(),
        );
    }
}

impl fmt::Display for Indent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Indent({}, {}, \"{}\")", self.offset, self.len, self.tabs)
    }
}

/// Inserts lines before the line `index` is within.
pub struct InsertBeforeLine {
    index: usize,
    lines: Vec<String>,
}

impl InsertBeforeLine {
    #[must_use]
    pub fn new(index: usize, lines: Vec<String>) -> Self {
        Self { index, lines }
    }
}

impl EditCommand for InsertBeforeLine {
    fn kind(&self) -> &'static str {
        "InsertBeforeLine"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        Some(EditRange::at(find_line_start(text, self.index)))
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(index = self.index, "InsertBeforeLine");
        add_lines(text, range.offset, &self.lines);
    }
}

impl fmt::Display for InsertBeforeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InsertBeforeLine({}, {})",
            self.index,
            lines_to_string(&self.lines)
        )
    }
}

/// Inserts lines after the line the `index..index + length` range ends
/// within.
pub struct InsertAfterLine {
    index: usize,
    length: usize,
    lines: Vec<String>,
}

impl InsertAfterLine {
    #[must_use]
    pub fn new(index: usize, length: usize, lines: Vec<String>) -> Self {
        Self {
            index,
            length,
            lines,
        }
    }
}

impl EditCommand for InsertAfterLine {
    fn kind(&self) -> &'static str {
        "InsertAfterLine"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        let bytes = text.as_bytes();
        // When the range ends exactly at a line start, stay on the line
        // it came from.
        let index = if self.index > 0
            && self.length > 0
            && bytes.get(self.index - 1) == Some(&b'\n')
        {
            self.index - 1
        } else {
            self.index
        };
        Some(EditRange::at(find_next_line_start(text, index)))
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(index = self.index, "InsertAfterLine");
        add_lines(text, range.offset, &self.lines);
    }
}

impl fmt::Display for InsertAfterLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InsertAfterLine({}, {})",
            self.index,
            lines_to_string(&self.lines)
        )
    }
}

/// Inserts lines at the start of a body.
pub struct InsertFirst<'a> {
    body: &'a Body,
    lines: Vec<String>,
}

impl<'a> InsertFirst<'a> {
    #[must_use]
    pub fn new(body: &'a Body, lines: Vec<String>) -> Self {
        Self { body, lines }
    }
}

impl EditCommand for InsertFirst<'_> {
    fn kind(&self) -> &'static str {
        "InsertFirst"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        Some(EditRange::at(find_line_start(text, self.body.first)))
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(body = %self.body.name, "InsertFirst");
        add_lines(text, range.offset, &self.lines);
    }
}

impl fmt::Display for InsertFirst<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.Body.InsertFirst({})",
            self.body.name,
            lines_to_string(&self.lines)
        )
    }
}

/// Inserts lines at the end of a body, before the closing brace.
pub struct InsertLast<'a> {
    body: &'a Body,
    lines: Vec<String>,
}

impl<'a> InsertLast<'a> {
    #[must_use]
    pub fn new(body: &'a Body, lines: Vec<String>) -> Self {
        Self { body, lines }
    }
}

impl EditCommand for InsertLast<'_> {
    fn kind(&self) -> &'static str {
        "InsertLast"
    }

    fn find_range(&self, text: &str) -> Option<EditRange> {
        Some(EditRange::at(find_line_start(text, self.body.last)))
    }

    fn execute(&self, text: &mut String, range: EditRange) {
        debug!(body = %self.body.name, "InsertLast");
        add_lines(text, range.offset, &self.lines);
    }
}

impl fmt::Display for InsertLast<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.Body.InsertLast({})",
            self.body.name,
            lines_to_string(&self.lines)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_scans() {
        let text = "one\ntwo\nthree\n";
        assert_eq!(find_line_start(text, 5), 4);
        assert_eq!(find_line_start(text, 4), 4);
        assert_eq!(find_line_start(text, 0), 0);
        assert_eq!(find_next_line_start(text, 5), 8);
        assert_eq!(find_next_line_start(text, 9), 14);
    }

    #[test]
    fn indent_copies_leading_whitespace() {
        let text = "\t\tfoo;\n";
        assert_eq!(infer_indent(text, 0), "\t\t");
    }

    #[test]
    fn indent_deepens_after_an_open_brace() {
        assert_eq!(infer_indent("\t{\n", 0), "\t\t");
        assert_eq!(infer_indent("\tvoid Process(int x)\n", 0), "\t");
        assert_eq!(infer_indent("\tif (x) {\n", 0), "\t\t");
    }

    #[test]
    fn add_lines_uses_previous_line_indent() {
        let mut text = "\t{\n\t\txxx;\n".to_string();
        add_lines(&mut text, 3, &["try".to_string(), "{".to_string()]);
        assert_eq!(text, "\t{\n\t\ttry\n\t\t{\n\t\txxx;\n");
    }

    #[test]
    fn line_summaries() {
        assert_eq!(lines_to_string(&[]), "<no lines>");
        assert_eq!(lines_to_string(&["int x;".to_string()]), "int x;");
        assert_eq!(
            lines_to_string(&["a".to_string(), "b".to_string(), "c".to_string()]),
            "1: a, 2: b, ..."
        );
        let long = "x".repeat(50);
        assert_eq!(lines_to_string(&[long]), format!("{}...", "x".repeat(40)));
    }

    #[test]
    fn indent_command_rewrites_whole_lines() {
        let text = "abc\ndef\n";
        let command = Indent::new(4, 3, "\t");
        let range = command.find_range(text).unwrap();
        assert_eq!(range, EditRange { offset: 4, length: 3 });

        let mut buffer = text.to_string();
        command.execute(&mut buffer, range);
        assert_eq!(buffer, "abc\n\tdef\n");
    }

    #[test]
    fn indent_with_no_tabs_is_a_no_op() {
        let command = Indent::new(0, 3, "");
        assert!(command.find_range("abc\n").is_none());
    }

    #[test]
    fn change_access_finds_the_existing_keyword() {
        let text = "\tpublic static void Run() {}\n";
        let member = Member {
            kind: crate::decl::MemberKind::Method {
                return_type: "void".to_string(),
                params: vec![],
                body: None,
                is_constructor: false,
            },
            name: "Run".to_string(),
            offset: 1,
            length: 27,
            access: crate::decl::Access::Public,
            modifiers: crate::decl::Modifiers::default(),
        };
        let command = ChangeAccess::new(&member, "protected");
        let range = command.find_range(text).unwrap();
        assert_eq!(range, EditRange { offset: 1, length: 7 });

        let mut buffer = text.to_string();
        command.execute(&mut buffer, range);
        assert_eq!(buffer, "\tprotected static void Run() {}\n");
    }

    #[test]
    fn change_access_inserts_when_missing() {
        let text = "\tstatic void Run() {}\n";
        let member = Member {
            kind: crate::decl::MemberKind::Method {
                return_type: "void".to_string(),
                params: vec![],
                body: None,
                is_constructor: false,
            },
            name: "Run".to_string(),
            offset: 1,
            length: 20,
            access: crate::decl::Access::Private,
            modifiers: crate::decl::Modifiers::default(),
        };
        let command = ChangeAccess::new(&member, "internal");
        let range = command.find_range(text).unwrap();
        assert_eq!(range, EditRange::at(1));

        let mut buffer = text.to_string();
        command.execute(&mut buffer, range);
        assert_eq!(buffer, "\tinternal static void Run() {}\n");
    }
}
