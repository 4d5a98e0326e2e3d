#![allow(dead_code)]

use refactor_script::decl::{
    Access, Bases, Body, Member, MemberKind, Modifiers, Namespace, TypeDecl, TypeKind,
    UsingDirective,
};
use refactor_script::{Context, Error, Evaluator, Refactor, parse};

/// The C# file the fixture tree describes.
pub const SOURCE: &str = "using System;\n\
using System.IO;\n\
\n\
namespace App\n\
{\n\
\tpublic class Greeter\n\
\t{\n\
\t\tprivate string m_name;\n\
\n\
\t\tpublic void Process()\n\
\t\t{\n\
\t\t\tint x = 1;\n\
\t\t}\n\
\t}\n\
}\n";

pub fn offset_of(pattern: &str) -> usize {
    SOURCE.find(pattern).expect("fixture pattern")
}

/// A declaration tree matching [`SOURCE`], with offsets derived from the
/// text itself.
pub fn globals() -> Namespace {
    let field_offset = offset_of("private string");
    let field = Member {
        kind: MemberKind::Field {
            ty: "string".to_string(),
            value: None,
        },
        name: "m_name".to_string(),
        offset: field_offset,
        length: "private string m_name;".len(),
        access: Access::Private,
        modifiers: Modifiers::default(),
    };

    let method_offset = offset_of("public void Process");
    let method_close = offset_of("\n\t\t}") + 3;
    let method = Member {
        kind: MemberKind::Method {
            return_type: "void".to_string(),
            params: Vec::new(),
            body: Some(Body::new(
                "Process",
                offset_of("\t\t{\n") + 2,
                offset_of("int x"),
                method_close,
            )),
            is_constructor: false,
        },
        name: "Process".to_string(),
        offset: method_offset,
        length: method_close - method_offset + 1,
        access: Access::Public,
        modifiers: Modifiers::default(),
    };

    let class_offset = offset_of("public class Greeter");
    let class_close = offset_of("\n\t}") + 2;
    let greeter = TypeDecl {
        kind: TypeKind::Class,
        name: "Greeter".to_string(),
        offset: class_offset,
        length: class_close - class_offset + 1,
        access: Access::Public,
        modifiers: Modifiers::default(),
        bases: Bases {
            names: Vec::new(),
            offset: offset_of("Greeter") + "Greeter".len(),
            length: 0,
        },
        body: Body::new(
            "Greeter",
            offset_of("\n\t{") + 2,
            offset_of("private string"),
            class_close,
        ),
        members: vec![field, method],
        types: Vec::new(),
    };

    let ns_offset = offset_of("namespace App");
    let ns_close = SOURCE.rfind('}').expect("fixture close");
    let app = Namespace {
        name: "App".to_string(),
        offset: ns_offset,
        length: ns_close - ns_offset + 1,
        body: Body::new(
            "App",
            offset_of("namespace App\n{") + "namespace App\n".len(),
            class_offset,
            ns_close,
        ),
        uses: Vec::new(),
        namespaces: Vec::new(),
        types: vec![greeter],
    };

    let mut root = Namespace::global(SOURCE.len());
    root.uses = vec![
        UsingDirective {
            name: "System".to_string(),
            offset: 0,
            length: "using System;".len(),
        },
        UsingDirective {
            name: "System.IO".to_string(),
            offset: offset_of("using System.IO;"),
            length: "using System.IO;".len(),
        },
    ];
    root.namespaces.push(app);
    root
}

/// Parse and evaluate a script against the fixture, apply the edits, and
/// return the command display forms with the patched text.
pub fn apply(
    script: &str,
    globals: &Namespace,
    selection_offset: usize,
    selection_len: usize,
) -> Result<(Vec<String>, String), Error> {
    let parsed = parse(script)?;
    let mut context = Context::new(globals, SOURCE, selection_offset, selection_len);
    let edits = Evaluator::new().run(&parsed, &mut context)?;
    let displays = edits.iter().map(ToString::to_string).collect();

    let mut refactor = Refactor::new(SOURCE);
    refactor.extend(edits);
    Ok((displays, refactor.process()?))
}
