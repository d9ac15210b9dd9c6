//! Span path queries against fragments an editor would send.

use pretty_assertions::assert_eq;
use tsrepl::{EvaluableSpan, find_spans};

fn kinds(path: &[EvaluableSpan]) -> Vec<&str> {
    path.iter().map(|span| &*span.kind).collect()
}

#[test]
fn cursor_inside_object_literal() {
    let source = "const o = { a: 1 }";
    let path = find_spans(source, 11);
    assert_eq!(
        kinds(&path),
        vec!["VariableDeclaration", "VariableDeclarator", "ObjectExpression"]
    );
    let last = path.last().map(|span| &source[span.start..span.end]);
    assert_eq!(last, Some("{ a: 1 }"));
}

#[test]
fn path_is_ordered_outermost_first() {
    let source = "foo(bar.baz, 2);";
    let path = find_spans(source, 9);
    assert_eq!(path.first().map(|span| &*span.kind), Some("ExpressionStatement"));
    assert!(kinds(&path).contains(&"CallExpression"), "{path:?}");
    assert!(kinds(&path).contains(&"MemberExpression"), "{path:?}");
    for pair in path.windows(2) {
        assert!(pair[0].start <= pair[1].start && pair[1].end <= pair[0].end, "{pair:?}");
    }
}

#[test]
fn only_the_statement_under_the_cursor_is_reported() {
    let source = "let a = 1;\nlet b = 2;";
    let path = find_spans(source, 15);
    let first = path.first().map(|span| &source[span.start..span.end]);
    assert_eq!(first.map(|text| text.starts_with("let b")), Some(true));
    assert!(path.iter().all(|span| span.start >= 11), "{path:?}");
}

#[test]
fn node_boundaries_are_inclusive() {
    let source = "x + y";
    let at_end = find_spans(source, source.len());
    assert!(!at_end.is_empty());
    let at_start = find_spans(source, 0);
    assert_eq!(at_start.last().map(|span| &*span.kind), Some("Identifier"));
}

#[test]
fn unparseable_source_yields_nothing() {
    assert_eq!(find_spans("const = ;", 3), Vec::new());
}

#[test]
fn out_of_range_offsets_yield_nothing() {
    assert_eq!(find_spans("1 + 2", 500), Vec::new());
    assert_eq!(find_spans("", 0), Vec::new());
}

#[test]
fn arbitrary_input_never_panics() {
    let samples = [
        "const ü = 'ünïcödé';",
        "`${a}${`${b}`}`",
        "(((",
        "a => b => c",
        "/* unterminated",
        "class A { static { this.x = 1 } }",
        "for (const [k, v] of m) {}",
        "label: while (true) break label;",
        "😀",
    ];
    for source in samples {
        for offset in 0..=source.len() + 2 {
            let path = find_spans(source, offset);
            for span in &path {
                assert!(span.start <= span.end && span.end <= source.len(), "{source:?} {span:?}");
            }
        }
    }
}

#[test]
fn serializes_as_plain_records() {
    let path = find_spans("x", 0);
    let json = serde_json::to_value(&path).map(|value| value.to_string());
    assert_eq!(
        json.ok().as_deref(),
        Some(r#"[{"start":0,"end":1,"kind":"ExpressionStatement"},{"start":0,"end":1,"kind":"Identifier"}]"#)
    );
}
