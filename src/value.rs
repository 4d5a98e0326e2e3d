//! Runtime values and the type-tag lattice used for dispatch.

use std::fmt;
use std::rc::Rc;

use crate::commands::EditCommand;
use crate::decl::{MemberKind, Node, TypeKind};

/// A value a script expression can produce.
///
/// Nodes and edit commands compare by identity, everything else by
/// structure.
#[derive(Clone)]
pub enum Value<'a> {
    /// `null`.
    Void,
    Bool(bool),
    Str(String),
    Seq(Vec<Value<'a>>),
    /// A queued (or queueable) edit command.
    Edit(Rc<dyn EditCommand + 'a>),
    /// A declaration from the target file.
    Node(Node<'a>),
    /// The script receiver, `self`.
    Script,
}

/// Type tags form a single-inheritance chain; method lookup and `is`
/// checks walk it from the value's own tag to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Void,
    Boolean,
    String,
    Sequence,
    Edit,
    Script,
    Namespace,
    TypeScope,
    TypeDeclaration,
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
    Declaration,
    Member,
    Method,
    Field,
    Property,
    Event,
    Body,
    Using,
}

impl Tag {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Sequence => "Sequence",
            Self::Edit => "Edit",
            Self::Script => "Script",
            Self::Namespace => "Namespace",
            Self::TypeScope => "TypeScope",
            Self::TypeDeclaration => "TypeDeclaration",
            Self::Class => "Class",
            Self::Interface => "Interface",
            Self::Struct => "Struct",
            Self::Enum => "Enum",
            Self::Delegate => "Delegate",
            Self::Declaration => "Declaration",
            Self::Member => "Member",
            Self::Method => "Method",
            Self::Field => "Field",
            Self::Property => "Property",
            Self::Event => "Event",
            Self::Body => "Body",
            Self::Using => "Using",
        }
    }

    #[must_use]
    pub const fn base(self) -> Option<Self> {
        match self {
            Self::Class | Self::Interface | Self::Struct | Self::Enum | Self::Delegate => {
                Some(Self::TypeDeclaration)
            }
            Self::TypeDeclaration | Self::Namespace => Some(Self::TypeScope),
            Self::Method | Self::Field | Self::Property | Self::Event => Some(Self::Member),
            Self::TypeScope | Self::Member | Self::Body | Self::Using => Some(Self::Declaration),
            _ => None,
        }
    }

    /// Resolve a type name from an `is` expression. `Object` is handled
    /// separately since it matches every value.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: &[Tag] = &[
            Tag::Void,
            Tag::Boolean,
            Tag::String,
            Tag::Sequence,
            Tag::Edit,
            Tag::Script,
            Tag::Namespace,
            Tag::TypeScope,
            Tag::TypeDeclaration,
            Tag::Class,
            Tag::Interface,
            Tag::Struct,
            Tag::Enum,
            Tag::Delegate,
            Tag::Declaration,
            Tag::Member,
            Tag::Method,
            Tag::Field,
            Tag::Property,
            Tag::Event,
            Tag::Body,
            Tag::Using,
        ];
        ALL.iter().copied().find(|tag| tag.name() == name)
    }
}

impl<'a> Value<'a> {
    #[must_use]
    pub const fn tag(&self) -> Tag {
        match self {
            Self::Void => Tag::Void,
            Self::Bool(_) => Tag::Boolean,
            Self::Str(_) => Tag::String,
            Self::Seq(_) => Tag::Sequence,
            Self::Edit(_) => Tag::Edit,
            Self::Script => Tag::Script,
            Self::Node(node) => match node {
                Node::Namespace(_) => Tag::Namespace,
                Node::Type(ty) => match ty.kind {
                    TypeKind::Class => Tag::Class,
                    TypeKind::Interface => Tag::Interface,
                    TypeKind::Struct => Tag::Struct,
                    TypeKind::Enum => Tag::Enum,
                    TypeKind::Delegate => Tag::Delegate,
                },
                Node::Member(member) => match member.kind {
                    MemberKind::Field { .. } => Tag::Field,
                    MemberKind::Method { .. } => Tag::Method,
                    MemberKind::Property { .. } => Tag::Property,
                    MemberKind::Event { .. } => Tag::Event,
                },
                Node::Body(_) => Tag::Body,
                Node::Using(_) => Tag::Using,
            },
        }
    }

    /// The name used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    /// True when the value's tag chain reaches `tag`.
    #[must_use]
    pub fn is_a(&self, tag: Tag) -> bool {
        let mut current = Some(self.tag());
        while let Some(t) = current {
            if t == tag {
                return true;
            }
            current = t.base();
        }
        false
    }

    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) | (Self::Script, Self::Script) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Edit(a), Self::Edit(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (Self::Node(a), Self::Node(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "null"),
            Self::Bool(true) => write!(f, "true"),
            Self::Bool(false) => write!(f, "false"),
            Self::Str(text) => write!(f, "{text}"),
            Self::Seq(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Self::Edit(command) => write!(f, "{command}"),
            Self::Node(node) => write!(f, "{}", node.name()),
            Self::Script => write!(f, "Script"),
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({self})", self.type_name())
    }
}
