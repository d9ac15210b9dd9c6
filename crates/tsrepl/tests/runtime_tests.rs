//! Language and runtime-library behaviour, observed through evaluation results.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use tsrepl::{EngineConfig, EvaluateRequest, FileSystem, MemoryFileSystem, NoopObserver, ReplOutput, SessionRegistry};

struct Runtime {
    registry: SessionRegistry,
    session: String,
}

impl Runtime {
    fn new() -> Self {
        let fs: Rc<dyn FileSystem> = Rc::new(MemoryFileSystem::new().with_file("/proj/package.json", "{}"));
        let mut registry = SessionRegistry::with_file_system(EngineConfig::default(), fs);
        let session = registry.create_session(Some("runtime"), None);
        Self { registry, session }
    }

    fn eval(&mut self, code: &str) -> ReplOutput {
        let request = EvaluateRequest::new(&self.session, "/proj", code).namespace("main.ts");
        self.registry.evaluate(&request, &mut NoopObserver)
    }

    fn print(&mut self, code: &str) -> String {
        match self.eval(code) {
            ReplOutput::Print { text, .. } => text,
            ReplOutput::Error { text, .. } => panic!("{code:?} failed: {text}"),
        }
    }

    fn check(&mut self, cases: &[(&str, &str)]) {
        for (code, expected) in cases {
            assert_eq!(self.print(code), *expected, "evaluating {code:?}");
        }
    }
}

/// Evaluates `code` and renders whatever it throws as `Name: message`.
fn thrown(code: &str) -> String {
    format!("(() => {{ try {{ {code}; return 'no error'; }} catch (e) {{ return e.name + ': ' + e.message; }} }})()")
}

// ============================================================================
// Numbers and strings
// ============================================================================

#[test]
fn number_formatting() {
    Runtime::new().check(&[
        ("(1e21).toString()", "'1e+21'"),
        ("1e21.toString()", "'1e+21'"),
        ("0.1 + 0.2", "0.30000000000000004"),
        ("(255).toString(16)", "'ff'"),
        ("(1234.5678).toFixed(2)", "'1234.57'"),
        ("-0", "-0"),
        ("2 ** 10", "1024"),
        ("Number('0x1f')", "31"),
        ("parseInt('42px')", "42"),
    ]);
}

#[test]
fn string_methods() {
    Runtime::new().check(&[
        ("'abc'.padStart(5, '-')", "'--abc'"),
        ("'a,b,,c'.split(',')", "[ 'a', 'b', '', 'c' ]"),
        ("' x '.trim()", "'x'"),
        ("'abc'.at(-1)", "'c'"),
        ("`${1 + 1} items`", "'2 items'"),
        ("String.raw`a\\nb`", "'a\\\\nb'"),
        ("String.fromCharCode(72, 105)", "'Hi'"),
        ("String.fromCharCode(0xD800) === '\\uFFFD'", "true"),
    ]);
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn array_holes_are_shown_and_absent() {
    Runtime::new().check(&[
        ("[,,1]", "[ <2 empty items>, 1 ]"),
        ("[1,,3]", "[ 1, <1 empty item>, 3 ]"),
        ("new Array(3)", "[ <3 empty items> ]"),
        ("[,,1].length", "3"),
        ("0 in [,1]", "false"),
        ("1 in [,1]", "true"),
        ("Object.keys([,'a'])", "[ '1' ]"),
        ("const sparse = [1, 2, 3]; delete sparse[1]; sparse", "[ 1, <1 empty item>, 3 ]"),
    ]);
}

#[test]
fn array_length_is_validated() {
    let mut runtime = Runtime::new();
    runtime.check(&[
        (&thrown("[].length = -1"), "'RangeError: Invalid array length'"),
        (&thrown("[].length = 1.5"), "'RangeError: Invalid array length'"),
        (&thrown("new Array(-1)"), "'RangeError: Invalid array length'"),
    ]);
    runtime.check(&[
        ("const grow = [1]; grow.length = 3; grow", "[ 1, <2 empty items> ]"),
        ("const shrink = [1, 2, 3]; shrink.length = 1; shrink", "[ 1 ]"),
    ]);
}

#[test]
fn array_methods() {
    Runtime::new().check(&[
        ("[3, 1, 2].sort()", "[ 1, 2, 3 ]"),
        ("[1, 2, 3].map((n) => n * 2)", "[ 2, 4, 6 ]"),
        ("[1, 2, 3, 4].filter((n) => n % 2).join('-')", "'1-3'"),
        ("[1, [2, [3]]].flat(Infinity)", "[ 1, 2, 3 ]"),
        ("[1, 2, 3].reduce((a, b) => a + b, 0)", "6"),
        ("Array.from({ length: 2 }, (_, i) => i)", "[ 0, 1 ]"),
        ("[1, 2, 3].includes(2)", "true"),
    ]);
}

// ============================================================================
// Regular expressions
// ============================================================================

#[test]
fn regular_expressions() {
    Runtime::new().check(&[
        ("/a+/g.test('caaat')", "true"),
        ("'2024-01-05'.replace(/(\\d+)-(\\d+)-(\\d+)/, '$3/$2/$1')", "'05/01/2024'"),
        ("'a1b2'.match(/\\d/g)", "[ '1', '2' ]"),
        ("/(?<year>\\d{4})/.exec('in 1999').groups.year", "'1999'"),
        ("'x'.search(/y/)", "-1"),
    ]);
}

#[test]
fn backtracking_only_patterns_still_match() {
    Runtime::new().check(&[
        ("/a(?=b)/.test('ab')", "true"),
        ("/a(?=b)/.test('ac')", "false"),
        ("/a(?!b)/.test('ab')", "false"),
        ("'price: $5'.replace(/(?<=\\$)\\d/, 'x')", "'price: $x'"),
        ("/(\\w)\\1/.exec('abccd')[0]", "'cc'"),
        ("'aXbxc'.split(/(?=x)/i)", "[ 'a', 'Xb', 'xc' ]"),
    ]);
}

#[test]
fn invalid_patterns_are_syntax_errors() {
    let mut runtime = Runtime::new();
    let text = runtime.print(&thrown("new RegExp('(')"));
    assert!(text.starts_with("'SyntaxError: Invalid regular expression: /(/"), "{text}");
}

// ============================================================================
// Dates
// ============================================================================

#[test]
fn dates_use_utc_fields() {
    Runtime::new().check(&[
        ("new Date(0).toISOString()", "'1970-01-01T00:00:00.000Z'"),
        ("new Date(Date.UTC(2024, 0, 32)).toISOString()", "'2024-02-01T00:00:00.000Z'"),
        ("Date.parse('2000-01-01T00:00:00.000Z')", "946684800000"),
        ("new Date('2000-01-01T00:00:00Z').getUTCDay()", "6"),
        ("new Date(NaN).getTime()", "NaN"),
        ("JSON.stringify({ at: new Date(1) })", "'{\"at\":\"1970-01-01T00:00:00.001Z\"}'"),
    ]);
}

// ============================================================================
// Language
// ============================================================================

#[test]
fn functions_keep_their_source() {
    Runtime::new().check(&[
        ("function twice(n) { return n * 2; }\ntwice.toString().includes('return n * 2')", "true"),
        ("String((a) => a + 1).includes('=>')", "true"),
        ("Math.max.toString()", "'function max() { [native code] }'"),
        ("twice.length", "1"),
        ("((a, b = 1, ...rest) => 0).length", "1"),
    ]);
}

#[test]
fn classes_and_accessors() {
    Runtime::new().check(&[
        (
            "class Shape { constructor(n) { this.n = n; } get sides() { return this.n; } static of(n) { return new this(n); } }\nShape.of(3).sides",
            "3",
        ),
        (
            "class Square extends Shape { constructor() { super(4); } get sides() { return super.sides * 10; } }\nnew Square().sides",
            "40",
        ),
        ("class Counter { count = 1; inc() { return ++this.count; } }\nnew Counter().inc()", "2"),
        ("const o = { get v() { return 7; }, set v(x) { this.w = x; } }; o.v = 3; [o.v, o.w]", "[ 7, 3 ]"),
        ("new Square() instanceof Shape", "true"),
    ]);
}

#[test]
fn destructuring_and_spread() {
    Runtime::new().check(&[
        ("const { a, b: { c = 5 } = {}, ...rest } = { a: 1, d: 2 }; [a, c, rest.d]", "[ 1, 5, 2 ]"),
        ("const [x, , y = 9, ...more] = [1, 2, undefined, 4, 5]; [x, y, more]", "[ 1, 9, [ 4, 5 ] ]"),
        ("Math.max(...[1, 5, 3])", "5"),
        ("({ ...{ p: 1 }, q: 2 })", "{ p: 1, q: 2 }"),
        ("let s = 1, t = 2; [s, t] = [t, s]; s", "2"),
    ]);
}

#[test]
fn optional_chaining_and_nullish() {
    Runtime::new().check(&[
        ("const deep = { a: { b: () => 3 } }; deep?.a?.b()", "3"),
        ("deep.missing?.b.c.d", "undefined"),
        ("deep.a.none?.()", "undefined"),
        ("null ?? 'fallback'", "'fallback'"),
        ("0 ?? 1", "0"),
        ("let u; u ??= 4; u", "4"),
    ]);
}

#[test]
fn control_flow() {
    Runtime::new().check(&[
        (
            "let found = -1; outer: for (let i = 0; i < 3; i++) { for (let j = 0; j < 3; j++) { if (i * j === 2) { found = i * 10 + j; break outer; } } } found",
            "12",
        ),
        (
            "const fns = []; for (let i = 0; i < 3; i++) fns.push(() => i); fns.map((f) => f())",
            "[ 0, 1, 2 ]",
        ),
        ("let keys = ''; for (const k in { a: 1, b: 2 }) keys += k; keys", "'ab'"),
        (
            "function pick(v) { switch (v) { case 1: return 'one'; default: return 'other'; } } [pick(1), pick(2)]",
            "[ 'one', 'other' ]",
        ),
        ("(() => { try { return 1; } finally { keys = 'done'; } })() + keys", "'1done'"),
    ]);
}

#[test]
fn typescript_syntax_is_stripped() {
    Runtime::new().check(&[
        ("const n: number = 5;\ninterface P { x: number }\nn as number", "5"),
        ("function id<T>(v: T): T { return v; }\nid<string>('t')", "'t'"),
        ("enum Color { Red, Green }\nColor.Green", "1"),
    ]);
}
