//! End-to-end tests: parse a script, evaluate it against the fixture
//! declaration tree, and apply the queued edits to the fixture text.

mod common;

use common::{SOURCE, apply, globals, offset_of};

#[test]
fn add_using_keeps_a_sorted_list_sorted() {
    let root = globals();
    let (displays, patched) = apply(
        "define Run()\n\treturn Globals.AddUsing(\"System.Core\")\nend\n",
        &root,
        0,
        0,
    )
    .unwrap();

    assert_eq!(displays, ["<globals>.AddUsing(System.Core)"]);
    assert_eq!(
        patched,
        SOURCE.replace(
            "using System.IO;",
            "using System.Core;\nusing System.IO;"
        )
    );
}

#[test]
fn adding_an_existing_using_changes_nothing() {
    let root = globals();
    let (displays, patched) = apply(
        "define Run()\n\treturn Globals.AddUsing(\"System\")\nend\n",
        &root,
        0,
        0,
    )
    .unwrap();

    assert_eq!(displays, ["<globals>.AddUsing(System)"]);
    assert_eq!(patched, SOURCE);
}

#[test]
fn insert_first_lands_at_the_top_of_the_method_body() {
    let root = globals();
    let selection = offset_of("int x");
    let (displays, patched) = apply(
        "define Run()\n\treturn Scope.Body.InsertFirst([\"Console.WriteLine();\"])\nend\n",
        &root,
        selection,
        0,
    )
    .unwrap();

    assert_eq!(displays, ["Process.Body.InsertFirst(Console.WriteLine();)"]);
    assert_eq!(
        patched,
        SOURCE.replace(
            "\t\t{\n\t\t\tint x",
            "\t\t{\n\t\t\tConsole.WriteLine();\n\t\t\tint x"
        )
    );
}

#[test]
fn add_base_and_member_compose() {
    let root = globals();
    let selection = offset_of("public class");
    let (displays, patched) = apply(
        "define Run()\n\
         \tScope.AddBase(\"IDisposable\")\n\
         \tScope.AddMember([\"public void Dispose()\", \"{\", \"}\"])\n\
         end\n",
        &root,
        selection,
        0,
    )
    .unwrap();

    assert_eq!(
        displays,
        [
            "Greeter.AddBase(IDisposable)",
            "Greeter.AddMember(1: public void Dispose(), 2: {, ...)",
        ]
    );
    let expected = SOURCE
        .replace(
            "public class Greeter\n",
            "public class Greeter : IDisposable\n",
        )
        .replace(
            "\t{\n\t\tprivate",
            "\t{\n\t\tpublic void Dispose()\n\t\t{\n\t\t}\n\t\t\n\t\tprivate",
        );
    assert_eq!(patched, expected);
}

#[test]
fn wrapping_the_selection_in_a_try_block() {
    let root = globals();
    let selection = offset_of("int x");
    let (_, patched) = apply(
        "define Run()\n\
         \tInsertBeforeSelection(\"try\n{\")\n\
         \tInsertAfterSelection(\"}\ncatch (Exception e)\n{\n}\")\n\
         \tIndent(\"\t\")\n\
         end\n",
        &root,
        selection,
        "int x = 1;".len(),
    )
    .unwrap();

    assert_eq!(
        patched,
        SOURCE.replace(
            "\t\t\tint x = 1;\n",
            "\t\t\ttry\n\t\t\t{\n\t\t\t\tint x = 1;\n\t\t\t}\n\
             \t\t\tcatch (Exception e)\n\t\t\t{\n\t\t\t}\n"
        )
    );
}

#[test]
fn change_access_replaces_the_existing_keyword() {
    let root = globals();
    let selection = offset_of("public class");
    let (displays, patched) = apply(
        "define Run()\n\
         \tfor m in Scope.Members where m.Name == \"m_name\" do\n\
         \t\tm.ChangeAccess(\"protected\")\n\
         \tend\n\
         end\n",
        &root,
        selection,
        0,
    )
    .unwrap();

    assert_eq!(displays, ["m_name.ChangeAccess(protected)"]);
    assert_eq!(
        patched,
        SOURCE.replace("\t\tprivate string", "\t\tprotected string")
    );
}

#[test]
fn overlapping_edits_abort_the_batch() {
    let root = globals();
    let error = apply(
        "define Run()\n\
         \tGlobals.AddUsing(\"System.Core\")\n\
         \tIndent(\"\t\")\n\
         end\n",
        &root,
        0,
        20,
    )
    .unwrap_err();

    assert_eq!(error.to_string(), "AddUsing and Indent edits overlap.");
}

#[test]
fn rewrite_runs_the_whole_pipeline() {
    let root = globals();
    let patched = refactor_script::rewrite(
        "define Run()\n\treturn Globals.AddUsing(\"System.Core\")\nend\n",
        &root,
        SOURCE,
        0,
        0,
    )
    .unwrap();
    assert!(patched.starts_with(
        "using System;\nusing System.Core;\nusing System.IO;\n"
    ));
}

#[test]
fn scope_walks_to_the_innermost_declaration() {
    let root = globals();
    let (_, patched) = apply(
        "define Run()\n\
         \tif Scope is Method then\n\
         \t\tWriteLine(\"in #{Scope.FullName}\")\n\
         \tend\n\
         \treturn null\nend\n",
        &root,
        offset_of("int x"),
        0,
    )
    .unwrap();
    assert_eq!(patched, SOURCE);
}
