//! Integration tests for the three transform entry points.

use pretty_assertions::assert_eq;
use tsrepl::{TransformError, transform, transform_module, transform_regular};

fn code(source: &str) -> String {
    match transform(source) {
        Ok(output) => output.code,
        Err(err) => panic!("transform of {source:?} failed: {err}"),
    }
}

// ============================================================================
// Redeclaration
// ============================================================================

#[test]
fn top_level_const_and_let_become_var() {
    let out = code("const x = 1;\nlet y = 2;");
    assert!(out.contains("var x = 1"), "{out}");
    assert!(out.contains("var y = 2"), "{out}");
    assert!(!out.contains("const"), "{out}");
    assert!(!out.contains("let "), "{out}");
}

#[test]
fn nested_declarations_keep_their_kind() {
    let out = code("function f() { const inner = 1; return inner; }");
    assert!(out.contains("const inner = 1"), "{out}");
}

#[test]
fn top_level_class_becomes_var_binding() {
    let out = code("class Point { constructor(x: number) {} }");
    assert!(out.contains("var Point = class Point"), "{out}");
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn named_import_becomes_require_and_echo() {
    let out = code("import { foo } from 'bar';");
    assert!(out.contains("require(\"bar\")"), "{out}");
    assert!(out.trim_end().ends_with("foo;"), "{out}");
}

#[test]
fn renamed_default_and_namespace_imports() {
    let out = code("import d from 'm';\nimport * as n from 'n';\nimport { a as b } from 'o';");
    assert!(out.contains("var d = _interopDefault(require(\"m\"))"), "{out}");
    assert!(out.contains("function _interopDefault(m)"), "{out}");
    assert!(out.contains("var n = require(\"n\")"), "{out}");
    assert!(out.contains("a: b"), "{out}");
    for echo in ["d;", "n;", "b;"] {
        assert!(out.lines().any(|line| line.trim() == echo), "missing echo {echo} in {out}");
    }
}

#[test]
fn side_effect_import_is_a_bare_require() {
    let out = code("import './setup';");
    assert_eq!(out.trim(), "require(\"./setup\");");
}

#[test]
fn type_only_imports_vanish() {
    let out = code("import type { T } from 'types';\n1");
    assert!(!out.contains("require"), "{out}");
}

// ============================================================================
// Exports
// ============================================================================

#[test]
fn exports_never_emit_use_strict() {
    let out = code("\"use strict\";\nexport const foo = 42;");
    assert!(!out.contains("use strict"), "{out}");
    assert!(out.contains("__esModule"), "{out}");
}

#[test]
fn single_export_uses_define_property() {
    let out = code("export const foo = 42;");
    assert!(out.contains("Object.defineProperty(exports, \"foo\""), "{out}");
    assert!(!out.contains("_export"), "{out}");
}

#[test]
fn several_exports_share_one_helper() {
    let out = code("export const a = 1;\nexport function b() {}\nexport default 3;");
    assert!(out.contains("function _export("), "{out}");
    assert_eq!(out.matches("function _export(").count(), 1, "{out}");
    assert!(out.contains("_default"), "{out}");
}

#[test]
fn helper_name_avoids_user_bindings() {
    let out = code("const _export = 'mine';\nexport const a = 1;\nexport const b = 2;");
    assert!(out.contains("function _export1("), "{out}");
    assert!(out.contains("var _export = \"mine\""), "{out}");
}

#[test]
fn export_star_uses_fresh_helper() {
    let out = code("export * from './other';");
    assert!(out.contains("_exportStar"), "{out}");
    assert!(out.contains("require(\"./other\")"), "{out}");
}

// ============================================================================
// Top-level await
// ============================================================================

#[test]
fn async_flag_tracks_top_level_await() {
    let top = transform("const v = await Promise.resolve(1);\nv").map(|out| out.is_async);
    assert_eq!(top, Ok(true));
    let nested = transform("async function f() { await 1; }").map(|out| out.is_async);
    assert_eq!(nested, Ok(false));
    let plain = transform("1 + 1").map(|out| out.is_async);
    assert_eq!(plain, Ok(false));
}

#[test]
fn awaited_declarations_are_hoisted_out_of_the_wrapper() {
    let out = code("const v = await Promise.resolve(1);\nawait v;");
    let hoisted = out.find("var v").unwrap_or(usize::MAX);
    let wrapper = out.find("async").unwrap_or(0);
    assert!(hoisted < wrapper, "{out}");
    assert!(out.contains("return await v"), "{out}");
}

// ============================================================================
// Type erasure and failures
// ============================================================================

#[test]
fn types_are_erased() {
    let out = code("type Id = string;\ninterface P { x: number }\nconst n: number = (1 as number)!;\nn");
    assert!(!out.contains("interface"), "{out}");
    assert!(!out.contains("type Id"), "{out}");
    assert!(!out.contains(": number"), "{out}");
    assert!(!out.contains(" as "), "{out}");
}

#[test]
fn syntax_errors_carry_location() {
    let err = transform("let a = 1;\nconst = ;").map(|out| out.code);
    let Err(err) = err else { panic!("expected a syntax error") };
    assert_eq!(err.loc().line, 2);
    assert!(err.to_string().starts_with("SyntaxError"), "{err}");
}

#[test]
fn unsupported_constructs_are_reported_by_name() {
    let err = transform("function* gen() { yield 1; }").map(|out| out.code);
    let Err(TransformError::Parse(err)) = err else { panic!("expected failure") };
    assert!(err.message().contains("not supported"), "{}", err.message());
}

#[test]
fn regular_transform_only_erases_types() {
    let out = transform_regular("const a: string = 'x';\nexport const b = a;").map(|out| out.code);
    let Ok(out) = out else { panic!("regular transform failed") };
    assert!(out.contains("const a = \"x\""), "{out}");
    assert!(out.contains("export const b"), "{out}");
}

#[test]
fn module_transform_keeps_declaration_kinds() {
    let out = transform_module("import { x } from './x';\nexport const a = x;").map(|out| out.code);
    let Ok(out) = out else { panic!("module transform failed") };
    assert!(out.contains("const a = x"), "{out}");
    assert!(!out.lines().any(|line| line.trim() == "x;"), "{out}");
}
