//! The declaration tree of the C# file being refactored.
//!
//! Scripts run against this tree; the host's C# parser produces it and
//! hands it over with every offset already resolved against the file
//! text. The tree is plain owned data with no parent pointers; enclosing
//! namespaces and declaring types are recovered by identity walks from
//! the root.

/// Access level of a declaration, printed lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Internal,
    Private,
}

impl Access {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Internal => "internal",
            Self::Private => "private",
        }
    }
}

/// Modifier flags shared by types and members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_sealed: bool,
    pub is_readonly: bool,
    pub is_const: bool,
}

/// A brace-delimited body. `start` is the `{`, `first` the first offset
/// after it with content, `last` the `}`. The global namespace's body
/// spans the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub name: String,
    pub start: usize,
    pub first: usize,
    pub last: usize,
}

impl Body {
    #[must_use]
    pub fn new(name: impl Into<String>, start: usize, first: usize, last: usize) -> Self {
        Self {
            name: name.into(),
            start,
            first,
            last,
        }
    }
}

/// A `using` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingDirective {
    pub name: String,
    pub offset: usize,
    pub length: usize,
}

/// A type's base list. When the list is empty `offset` is where
/// ` : Base` would be inserted and `length` is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bases {
    pub names: Vec<String>,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
}

/// A type declaration, possibly nested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub access: Access,
    pub modifiers: Modifiers,
    pub bases: Bases,
    pub body: Body,
    pub members: Vec<Member>,
    pub types: Vec<TypeDecl>,
}

/// What kind of member a [`Member`] is, with its kind-specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Field {
        ty: String,
        value: Option<String>,
    },
    Method {
        return_type: String,
        params: Vec<String>,
        body: Option<Body>,
        is_constructor: bool,
    },
    Property {
        body: Option<Body>,
        has_getter: bool,
        has_setter: bool,
    },
    Event {
        ty: String,
    },
}

/// A member of a type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub kind: MemberKind,
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub access: Access,
    pub modifiers: Modifiers,
}

/// A namespace; the root has the name `<globals>` and covers the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub body: Body,
    pub uses: Vec<UsingDirective>,
    pub namespaces: Vec<Namespace>,
    pub types: Vec<TypeDecl>,
}

/// The root namespace's display name.
pub const GLOBALS: &str = "<globals>";

impl Namespace {
    /// An empty global namespace covering `length` bytes of text.
    #[must_use]
    pub fn global(length: usize) -> Self {
        Self {
            name: GLOBALS.to_string(),
            offset: 0,
            length,
            body: Body::new(GLOBALS, 0, 0, length.saturating_sub(1)),
            uses: Vec::new(),
            namespaces: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Child declarations (uses, nested namespaces, types) sorted by
    /// offset.
    #[must_use]
    pub fn declarations(&self) -> Vec<Node<'_>> {
        let mut nodes: Vec<Node<'_>> = self
            .uses
            .iter()
            .map(Node::Using)
            .chain(self.namespaces.iter().map(Node::Namespace))
            .chain(self.types.iter().map(Node::Type))
            .collect();
        nodes.sort_by_key(Node::offset);
        nodes
    }

    /// True when `ty` could name `name` from inside this namespace:
    /// a direct match, a match through one of the using directives, or a
    /// match through the namespace's own qualification chain.
    #[must_use]
    pub fn type_matches<'a>(&'a self, root: &'a Self, ty: &str, name: &str) -> bool {
        if ty == name {
            return true;
        }
        if self.uses.iter().any(|u| format!("{}.{name}", u.name) == ty) {
            return true;
        }

        let mut chain = Vec::new();
        if namespace_chain(root, self, &mut chain) {
            chain.push(self);
            let mut prefix = String::new();
            for ns in chain {
                if ns.name == GLOBALS {
                    continue;
                }
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(&ns.name);
                if format!("{prefix}.{name}") == ty {
                    return true;
                }
            }
        }
        false
    }
}

impl TypeDecl {
    /// Members and nested types sorted by offset.
    #[must_use]
    pub fn declarations(&self) -> Vec<Node<'_>> {
        let mut nodes: Vec<Node<'_>> = self
            .members
            .iter()
            .map(Node::Member)
            .chain(self.types.iter().map(Node::Type))
            .collect();
        nodes.sort_by_key(Node::offset);
        nodes
    }

    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.name == name)
    }
}

/// A borrowed reference to any declaration in the tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Namespace(&'a Namespace),
    Type(&'a TypeDecl),
    Member(&'a Member),
    Body(&'a Body),
    Using(&'a UsingDirective),
}

impl<'a> Node<'a> {
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            Self::Namespace(ns) => &ns.name,
            Self::Type(ty) => &ty.name,
            Self::Member(member) => &member.name,
            Self::Body(body) => &body.name,
            Self::Using(using) => &using.name,
        }
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        match self {
            Self::Namespace(ns) => ns.offset,
            Self::Type(ty) => ty.offset,
            Self::Member(member) => member.offset,
            Self::Body(body) => body.start,
            Self::Using(using) => using.offset,
        }
    }

    #[must_use]
    pub const fn length(&self) -> usize {
        match self {
            Self::Namespace(ns) => ns.length,
            Self::Type(ty) => ty.length,
            Self::Member(member) => member.length,
            Self::Body(body) => body.last - body.start,
            Self::Using(using) => using.length,
        }
    }

    /// Identity comparison; two nodes are the same declaration, not
    /// merely equal in content.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Namespace(a), Self::Namespace(b)) => std::ptr::eq(*a, *b),
            (Self::Type(a), Self::Type(b)) => std::ptr::eq(*a, *b),
            (Self::Member(a), Self::Member(b)) => std::ptr::eq(*a, *b),
            (Self::Body(a), Self::Body(b)) => std::ptr::eq(*a, *b),
            (Self::Using(a), Self::Using(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }

    const fn contains(&self, offset: usize) -> bool {
        let start = self.offset();
        offset >= start && offset < start + self.length()
    }
}

/// The innermost declaration containing `offset`, or the root when
/// nothing narrower does.
#[must_use]
pub fn find_scope(root: &Namespace, offset: usize) -> Node<'_> {
    let mut scope = Node::Namespace(root);

    loop {
        let children = match scope {
            Node::Namespace(ns) => ns.declarations(),
            Node::Type(ty) => ty.declarations(),
            _ => return scope,
        };

        let Some(child) = children.into_iter().find(|c| c.contains(offset)) else {
            return scope;
        };
        match child {
            Node::Namespace(_) | Node::Type(_) => scope = child,
            other => return other,
        }
    }
}

/// The nearest namespace enclosing `node`, or `None` for the root
/// itself.
#[must_use]
pub fn namespace_of<'a>(root: &'a Namespace, node: &Node<'a>) -> Option<&'a Namespace> {
    fn walk<'a>(ns: &'a Namespace, node: &Node<'a>) -> Option<&'a Namespace> {
        for child in &ns.namespaces {
            if node.same(&Node::Namespace(child)) {
                return Some(ns);
            }
            if let Some(found) = walk(child, node) {
                return Some(found);
            }
        }
        for ty in &ns.types {
            if type_holds(ty, node) {
                return Some(ns);
            }
        }
        None
    }

    fn type_holds<'a>(ty: &'a TypeDecl, node: &Node<'a>) -> bool {
        if node.same(&Node::Type(ty)) || node.same(&Node::Body(&ty.body)) {
            return true;
        }
        ty.members.iter().any(|m| node.same(&Node::Member(m)))
            || ty.types.iter().any(|nested| type_holds(nested, node))
    }

    if node.same(&Node::Namespace(root)) {
        return None;
    }
    if node.same(&Node::Body(&root.body)) {
        return Some(root);
    }
    for u in &root.uses {
        if node.same(&Node::Using(u)) {
            return Some(root);
        }
    }
    walk(root, node).or_else(|| {
        // Uses inside nested namespaces.
        fn uses_walk<'a>(ns: &'a Namespace, node: &Node<'a>) -> Option<&'a Namespace> {
            for child in &ns.namespaces {
                for u in &child.uses {
                    if node.same(&Node::Using(u)) {
                        return Some(child);
                    }
                }
                if node.same(&Node::Body(&child.body)) {
                    return Some(child);
                }
                if let Some(found) = uses_walk(child, node) {
                    return Some(found);
                }
            }
            None
        }
        uses_walk(root, node)
    })
}

/// The type declaring `node` (a member or a nested type), if any.
#[must_use]
pub fn declaring_type_of<'a>(root: &'a Namespace, node: &Node<'a>) -> Option<&'a TypeDecl> {
    fn in_type<'a>(ty: &'a TypeDecl, node: &Node<'a>) -> Option<&'a TypeDecl> {
        if ty.members.iter().any(|m| node.same(&Node::Member(m)))
            || ty.types.iter().any(|n| node.same(&Node::Type(n)))
        {
            return Some(ty);
        }
        ty.types.iter().find_map(|nested| in_type(nested, node))
    }

    fn in_namespace<'a>(ns: &'a Namespace, node: &Node<'a>) -> Option<&'a TypeDecl> {
        ns.types
            .iter()
            .find_map(|ty| in_type(ty, node))
            .or_else(|| ns.namespaces.iter().find_map(|n| in_namespace(n, node)))
    }

    in_namespace(root, node)
}

/// Dotted full name: namespace chain, declaring types, then the node's
/// own name. The global namespace contributes nothing.
#[must_use]
pub fn full_name(root: &Namespace, node: &Node<'_>) -> String {
    match node {
        Node::Namespace(ns) => {
            let mut chain = Vec::new();
            if namespace_chain(root, ns, &mut chain) {
                let mut parts: Vec<&str> = chain
                    .iter()
                    .filter(|n| n.name != GLOBALS)
                    .map(|n| n.name.as_str())
                    .collect();
                if ns.name != GLOBALS {
                    parts.push(&ns.name);
                }
                if parts.is_empty() {
                    return ns.name.clone();
                }
                return parts.join(".");
            }
            ns.name.clone()
        }
        Node::Type(ty) => {
            let prefix = declaring_type_of(root, node).map_or_else(
                || {
                    namespace_of(root, node)
                        .filter(|ns| ns.name != GLOBALS)
                        .map(|ns| full_name(root, &Node::Namespace(ns)))
                },
                |declaring| Some(full_name(root, &Node::Type(declaring))),
            );
            prefix.map_or_else(|| ty.name.clone(), |prefix| format!("{prefix}.{}", ty.name))
        }
        Node::Member(member) => declaring_type_of(root, node).map_or_else(
            || member.name.clone(),
            |declaring| format!("{}::{}", full_name(root, &Node::Type(declaring)), member.name),
        ),
        Node::Body(body) => body.name.clone(),
        Node::Using(using) => using.name.clone(),
    }
}

fn namespace_chain<'a>(
    current: &'a Namespace,
    target: &Namespace,
    chain: &mut Vec<&'a Namespace>,
) -> bool {
    if std::ptr::eq(current, target) {
        return true;
    }
    chain.push(current);
    for child in &current.namespaces {
        if namespace_chain(child, target, chain) {
            return true;
        }
    }
    chain.pop();
    false
}

/// The `.IName` convention: the simple name starts with `I` followed by
/// another uppercase letter.
#[must_use]
pub fn is_interface(name: &str) -> bool {
    let simple = name.rsplit('.').next().unwrap_or(name);
    let mut chars = simple.chars();
    chars.next() == Some('I') && chars.next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Namespace {
        // 0         1         2         3         4
        // namespace Ns { class Foo { void Bar() {} } }
        let member = Member {
            kind: MemberKind::Method {
                return_type: "void".to_string(),
                params: vec![],
                body: Some(Body::new("Bar", 40, 41, 41)),
                is_constructor: false,
            },
            name: "Bar".to_string(),
            offset: 28,
            length: 15,
            access: Access::Private,
            modifiers: Modifiers::default(),
        };
        let ty = TypeDecl {
            kind: TypeKind::Class,
            name: "Foo".to_string(),
            offset: 15,
            length: 28,
            access: Access::Internal,
            modifiers: Modifiers::default(),
            bases: Bases {
                names: vec![],
                offset: 24,
                length: 0,
            },
            body: Body::new("Foo", 25, 28, 42),
            members: vec![member],
            types: vec![],
        };
        let ns = Namespace {
            name: "Ns".to_string(),
            offset: 0,
            length: 45,
            body: Body::new("Ns", 13, 15, 44),
            uses: vec![],
            namespaces: vec![],
            types: vec![ty],
        };
        let mut root = Namespace::global(45);
        root.namespaces.push(ns);
        root
    }

    #[test]
    fn scope_descends_to_the_innermost_declaration() {
        let root = sample();
        let node = find_scope(&root, 30);
        assert!(matches!(node, Node::Member(m) if m.name == "Bar"));

        let node = find_scope(&root, 16);
        assert!(matches!(node, Node::Type(t) if t.name == "Foo"));
    }

    #[test]
    fn full_names_chain_through_namespaces() {
        let root = sample();
        let ty = Node::Type(&root.namespaces[0].types[0]);
        assert_eq!(full_name(&root, &ty), "Ns.Foo");

        let member = Node::Member(&root.namespaces[0].types[0].members[0]);
        assert_eq!(full_name(&root, &member), "Ns.Foo::Bar");
    }

    #[test]
    fn declaring_type_is_found_by_identity() {
        let root = sample();
        let member = Node::Member(&root.namespaces[0].types[0].members[0]);
        let declaring = declaring_type_of(&root, &member).unwrap();
        assert_eq!(declaring.name, "Foo");
    }

    #[test]
    fn interface_names() {
        assert!(is_interface("IAlpha"));
        assert!(is_interface("System.IDisposable"));
        assert!(!is_interface("Indent"));
        assert!(!is_interface("Base"));
        assert!(!is_interface("I"));
    }

    #[test]
    fn type_matches_uses_and_qualification() {
        let mut root = sample();
        root.namespaces[0].uses.push(UsingDirective {
            name: "System".to_string(),
            offset: 14,
            length: 0,
        });
        let ns = &root.namespaces[0];
        assert!(ns.type_matches(&root, "Foo", "Foo"));
        assert!(ns.type_matches(&root, "System.IDisposable", "IDisposable"));
        assert!(ns.type_matches(&root, "Ns.Foo", "Foo"));
        assert!(!ns.type_matches(&root, "Other.Foo", "Foo"));
    }
}
