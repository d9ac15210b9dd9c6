//! End-to-end evaluation through a [`SessionRegistry`].

use std::{cell::RefCell, path::Path, rc::Rc, time::Duration};

use pretty_assertions::assert_eq;
use tsrepl::{
    CollectEvents, DefinitionsChange, EngineConfig, ErrorKind, EvaluateRequest, FaultKind, FileSystem,
    MemoryFileSystem, NoopObserver, ReplEvent, ReplOutput, SessionRegistry,
};

const ROOT: &str = "/proj";

struct Harness {
    registry: SessionRegistry,
    session: String,
    events: CollectEvents,
}

impl Harness {
    fn new() -> Self {
        Self::with_files(MemoryFileSystem::new().with_file("/proj/package.json", "{}"))
    }

    fn with_files(fs: MemoryFileSystem) -> Self {
        let fs: Rc<dyn FileSystem> = Rc::new(fs);
        let mut registry = SessionRegistry::with_file_system(EngineConfig::default(), fs);
        let session = registry.create_session(Some("test"), None);
        Self {
            registry,
            session,
            events: CollectEvents::new(),
        }
    }

    fn eval_in(&mut self, namespace: &str, code: &str) -> ReplOutput {
        let request = EvaluateRequest::new(&self.session, ROOT, code).namespace(namespace);
        self.registry.evaluate(&request, &mut self.events)
    }

    fn eval(&mut self, code: &str) -> ReplOutput {
        self.eval_in("main.ts", code)
    }

    /// Evaluates and returns the printed text, failing the test on an error result.
    fn print(&mut self, code: &str) -> String {
        match self.eval(code) {
            ReplOutput::Print { text, .. } => text,
            ReplOutput::Error { text, .. } => panic!("{code:?} failed: {text}"),
        }
    }

    fn definitions_changes(&mut self) -> Vec<DefinitionsChange> {
        self.events
            .take()
            .into_iter()
            .filter_map(|event| match event {
                ReplEvent::DefinitionsChanged(change) => Some(change),
                _ => None,
            })
            .collect()
    }
}

fn map(pairs: &[(&str, &str)]) -> indexmap::IndexMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

// ============================================================================
// Results
// ============================================================================

#[test]
fn expression_result_is_formatted() {
    let mut h = Harness::new();
    let output = h.eval("1 + 1");
    assert_eq!(
        output,
        ReplOutput::Print {
            text: "2".to_owned(),
            namespace_id: "main.ts".to_owned(),
            input: Some("1 + 1".to_owned()),
        }
    );
}

#[test]
fn redeclaring_a_const_replaces_it() {
    let mut h = Harness::new();
    h.print("const x = 1;");
    h.print("const x = 2;");
    assert_eq!(h.print("x === 2"), "true");
}

#[test]
fn namespaces_are_isolated() {
    let mut h = Harness::new();
    h.eval_in("a.ts", "const shared = 'a';");
    let output = h.eval_in("b.ts", "typeof shared");
    assert_eq!(output.text(), "'undefined'");
    assert_eq!(h.registry.list_namespaces(&h.session).ok(), Some(vec!["a.ts".to_owned(), "b.ts".to_owned()]));
}

#[test]
fn last_results_are_kept_in_dollar_slots() {
    let mut h = Harness::new();
    h.print("10");
    h.print("20");
    assert_eq!(h.print("$1 + $2"), "30");
}

#[test]
fn top_level_await_is_awaited() {
    let mut h = Harness::new();
    let text = h.print("const v = await Promise.resolve(41);\nawait (v + 1)");
    assert_eq!(text, "42");
    assert_eq!(h.print("v"), "41");
}

#[test]
fn console_output_precedes_the_result() {
    let mut h = Harness::new();
    h.eval("console.log('hi', 1); 5");
    let outputs: Vec<ReplOutput> = h
        .events
        .take()
        .into_iter()
        .filter_map(|event| match event {
            ReplEvent::Output(output) => Some(output),
            _ => None,
        })
        .collect();
    assert_eq!(
        outputs,
        vec![
            ReplOutput::Print {
                text: "hi 1".to_owned(),
                namespace_id: "main.ts".to_owned(),
                input: None,
            },
            ReplOutput::Print {
                text: "5".to_owned(),
                namespace_id: "main.ts".to_owned(),
                input: Some("console.log('hi', 1); 5".to_owned()),
            },
        ]
    );
}

#[test]
fn values_are_formatted_like_node() {
    let mut h = Harness::new();
    let cases = [
        ("[1, 2]", "[ 1, 2 ]"),
        ("({ a: 1 })", "{ a: 1 }"),
        ("'str'", "'str'"),
        ("function f() {}\nf", "[Function: f]"),
        ("class C {}\nC", "[class C]"),
        ("Promise.resolve(42)", "Promise { 42 }"),
        ("new Map([['a', 1]])", "Map(1) { 'a' => 1 }"),
        ("new Set([1])", "Set(1) { 1 }"),
        ("null", "null"),
        ("undefined", "undefined"),
        ("[]", "[]"),
        ("({})", "{}"),
    ];
    for (code, expected) in cases {
        assert_eq!(h.print(code), expected, "formatting {code:?}");
    }
}

// ============================================================================
// Definition diffs
// ============================================================================

#[test]
fn definitions_report_added_and_changed() {
    let mut h = Harness::new();
    h.print("let a = 1;");
    let changes = h.definitions_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].added, map(&[("a", "1")]));

    h.print("a = 9; const b = 2;");
    let changes = h.definitions_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].added, map(&[("b", "2")]));
    assert_eq!(changes[0].changed, map(&[("a", "9")]));
    assert!(changes[0].removed.is_empty());
}

#[test]
fn unchanged_definitions_emit_nothing() {
    let mut h = Harness::new();
    h.print("const a = 1;");
    h.events.take();
    h.print("a + 1");
    assert!(h.definitions_changes().is_empty());
}

#[test]
fn definitions_list_current_values() {
    let mut h = Harness::new();
    h.print("const a = [1];\nfunction f() {}");
    let defs = h.registry.definitions(&h.session, "main.ts");
    assert_eq!(defs.ok(), Some(map(&[("a", "[ 1 ]"), ("f", "[Function: f]")])));
}

#[test]
fn throwing_getter_is_rendered_not_propagated() {
    let mut h = Harness::new();
    h.print("Object.defineProperty(globalThis, 'bad', { get() { throw new Error('no'); }, enumerable: true, configurable: true }); 0");
    let defs = h.registry.definitions(&h.session, "main.ts").unwrap_or_default();
    let bad = defs.get("bad").cloned().unwrap_or_default();
    assert!(bad.starts_with("<Inspection threw"), "{bad}");
}

// ============================================================================
// Modules and exports
// ============================================================================

#[test]
fn exports_are_enumerable_getters() {
    let mut h = Harness::new();
    h.print("export const foo = 42;");
    assert_eq!(h.print("exports.foo"), "42");
    assert_eq!(h.print("Object.getOwnPropertyDescriptor(exports, 'foo').enumerable"), "true");
    assert_eq!(h.print("typeof Object.getOwnPropertyDescriptor(exports, 'foo').get"), "'function'");
}

#[test]
fn export_getter_tracks_reassignment() {
    let mut h = Harness::new();
    h.print("export let count = 1;");
    h.print("count = 5;");
    assert_eq!(h.print("exports.count"), "5");
}

#[test]
fn sibling_namespace_is_importable() {
    let mut h = Harness::new();
    h.eval_in("a.ts", "export const greeting = 'hi';");
    let output = h.eval_in("b.ts", "import { greeting } from 'ns:a.ts';");
    assert_eq!(output.text(), "'hi'");
}

#[test]
fn unknown_namespace_import_is_an_error_result() {
    let mut h = Harness::new();
    let output = h.eval("import { x } from 'ns:missing.ts';");
    assert_eq!(output.error_kind(), Some(ErrorKind::NamespaceNotFound));
    assert!(output.text().contains("Namespace not found: missing.ts"), "{}", output.text());
}

#[test]
fn file_modules_load_once() {
    let fs = MemoryFileSystem::new()
        .with_file("/proj/lib.ts", "export const stamp: any = {};\nexport default 'lib';")
        .with_file("/proj/data.json", r#"{ "answer": 42 }"#);
    let mut h = Harness::with_files(fs);
    h.print("import { stamp } from './lib';\nstamp.n = 1;");
    h.print("import { stamp as again } from './lib';");
    assert_eq!(h.print("again.n"), "1");
    assert_eq!(h.print("import lib from './lib';"), "'lib'");
    assert_eq!(h.print("require('./data.json').answer"), "42");
    assert_eq!(h.print("import data from './data.json';"), "{ answer: 42 }");
}

#[test]
fn importing_twice_in_one_namespace_succeeds() {
    let fs = MemoryFileSystem::new()
        .with_file("/proj/package.json", "{}")
        .with_file("/proj/node_modules/bar/package.json", r#"{ "main": "main.js" }"#)
        .with_file("/proj/node_modules/bar/main.js", "exports.foo = 'from bar';");
    let mut h = Harness::with_files(fs);
    assert_eq!(h.print("import {foo} from 'bar'; foo"), "'from bar'");
    assert_eq!(h.print("import {foo} from 'bar'; foo"), "'from bar'");
}

#[test]
fn missing_module_is_an_error_result() {
    let mut h = Harness::new();
    let output = h.eval("require('./nope')");
    assert_eq!(output.error_kind(), Some(ErrorKind::Runtime));
    assert!(output.text().contains("Cannot find module './nope'"), "{}", output.text());
    assert_eq!(h.print("(() => { try { require('./nope'); } catch (e) { return e.code; } })()"), "'MODULE_NOT_FOUND'");
}

#[test]
fn changed_files_are_reloaded() {
    let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let lib = dir.path().join("lib.js");
    std::fs::write(&lib, "module.exports = 1;").unwrap_or_else(|err| panic!("write: {err}"));

    let mut registry = SessionRegistry::new(EngineConfig::default());
    let session = registry.create_session(None, None);
    let request = EvaluateRequest::new(&session, dir.path(), "require('./lib')").namespace("main.ts");
    assert_eq!(registry.evaluate(&request, &mut NoopObserver).text(), "1");

    std::fs::write(&lib, "module.exports = 2;").unwrap_or_else(|err| panic!("write: {err}"));
    assert_eq!(registry.evaluate(&request, &mut NoopObserver).text(), "1");
    registry.file_changed(&lib);
    assert_eq!(registry.evaluate(&request, &mut NoopObserver).text(), "2");
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn runtime_errors_keep_earlier_definitions() {
    let mut h = Harness::new();
    let output = h.eval("const k = 1;\nthrow new Error('boom');");
    assert_eq!(output.error_kind(), Some(ErrorKind::Runtime));
    assert!(output.text().contains("Error: boom"), "{}", output.text());
    assert_eq!(h.print("k"), "1");
}

#[test]
fn runaway_recursion_fits_a_default_thread() {
    let handle = std::thread::spawn(|| Harness::new().eval("(function f(){ f() })()"));
    let output = handle.join().unwrap_or_else(|_| panic!("evaluation thread overflowed"));
    assert_eq!(output.error_kind(), Some(ErrorKind::Runtime));
    assert!(output.text().contains("RangeError: Maximum call stack size exceeded"), "{}", output.text());
}

#[test]
fn syntax_errors_are_transform_errors() {
    let mut h = Harness::new();
    let output = h.eval("const = ;");
    assert_eq!(output.error_kind(), Some(ErrorKind::Transform));
    assert!(output.text().starts_with("SyntaxError"), "{}", output.text());
    let emitted = h.events.take();
    assert_eq!(emitted, vec![ReplEvent::Output(output)]);
}

#[test]
fn unknown_session_is_reported() {
    let mut h = Harness::new();
    let request = EvaluateRequest::new("nope", ROOT, "1");
    let output = h.registry.evaluate(&request, &mut NoopObserver);
    assert_eq!(
        output,
        ReplOutput::Error {
            text: "Session not found: nope".to_owned(),
            namespace_id: "index.ts".to_owned(),
            input: None,
            error_kind: ErrorKind::SessionNotFound,
        }
    );
}

#[test]
fn missing_working_dir_fails_namespace_creation() {
    let mut h = Harness::new();
    let request = EvaluateRequest::new(&h.session, "/elsewhere", "1").namespace("x.ts");
    let output = h.registry.evaluate(&request, &mut NoopObserver);
    assert_eq!(output.error_kind(), Some(ErrorKind::NamespaceCreation));
    assert_eq!(h.registry.list_namespaces(&h.session).ok(), Some(Vec::new()));
}

#[test]
fn sync_evaluation_needs_an_existing_namespace() {
    let mut h = Harness::new();
    let request = EvaluateRequest::new(&h.session, ROOT, "1 + 2").namespace("main.ts");
    let output = h.registry.evaluate_sync(&request);
    assert_eq!(output.error_kind(), Some(ErrorKind::NamespaceNotFound));

    h.print("const base = 1;");
    h.events.take();
    let output = h.registry.evaluate_sync(&request);
    assert_eq!(output.text(), "3");
    let sync_await = EvaluateRequest::new(&h.session, ROOT, "await Promise.resolve(base)").namespace("main.ts");
    assert_eq!(h.registry.evaluate_sync(&sync_await).text(), "1");
    assert!(h.events.take().is_empty());
}

#[test]
fn broadcast_sync_evaluation_reaches_subscribers() {
    let mut h = Harness::new();
    h.print("const base = 10;");
    let seen = subscribe(&mut h.registry);
    let request = EvaluateRequest::new(&h.session, ROOT, "console.log('side'); base * 2")
        .namespace("main.ts")
        .broadcast(true);
    assert_eq!(h.registry.evaluate_sync(&request).text(), "20");

    let texts: Vec<String> = seen
        .borrow()
        .iter()
        .filter_map(|event| match event {
            ReplEvent::Output(output) => Some(output.text().to_owned()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["side".to_owned(), "20".to_owned()]);
}

#[test]
fn namespace_source_files_are_evaluated_whole() {
    let fs = MemoryFileSystem::new().with_file("/proj/calc.ts", "export const double = (n: number) => n * 2;\ndouble(4)");
    let mut h = Harness::with_files(fs);
    let output = h
        .registry
        .evaluate_namespace(&h.session, "calc.ts", Path::new(ROOT), &mut h.events);
    assert_eq!(output.text(), "8");
    assert_eq!(h.eval_in("calc.ts", "double(5)").text(), "10");

    let missing = h
        .registry
        .evaluate_namespace(&h.session, "gone.ts", Path::new(ROOT), &mut h.events);
    assert_eq!(missing.error_kind(), Some(ErrorKind::NamespaceNotFound));
    assert!(missing.text().starts_with("Cannot read /proj/gone.ts"), "{}", missing.text());
}

// ============================================================================
// Session operations
// ============================================================================

#[test]
fn creating_an_existing_session_keeps_it() {
    let mut registry = SessionRegistry::default();
    let first = registry.create_session(Some("one"), Some("s1"));
    let second = registry.create_session(Some("two"), Some("s1"));
    assert_eq!(first, second);
    let sessions = registry.list_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].name.as_deref(), Some("two"));
    assert!(registry.connect("s1").is_ok());
    assert!(registry.connect("s2").is_err());
}

#[test]
fn reset_drops_namespaces() {
    let mut h = Harness::new();
    h.print("const a = 1;");
    h.events.take();
    assert!(h.registry.reset_session(&h.session, &mut h.events).is_ok());
    assert_eq!(
        h.events.take(),
        vec![ReplEvent::Reset {
            session_id: h.session.clone(),
        }]
    );
    assert_eq!(h.registry.list_namespaces(&h.session).ok(), Some(Vec::new()));
    assert_eq!(h.print("typeof a"), "'undefined'");
}

#[test]
fn reset_restores_the_default_namespace() {
    let mut h = Harness::new();
    let session = h.session.clone();
    assert!(h.registry.set_current_namespace(&session, "other.ts", &mut NoopObserver).is_ok());
    assert!(h.registry.reset_session(&session, &mut NoopObserver).is_ok());
    assert_eq!(h.registry.current_namespace(&session).ok().as_deref(), Some("index.ts"));
}

#[test]
fn reset_cancels_pending_timers() {
    let mut h = Harness::new();
    h.print("setTimeout(() => console.log('late'), 1); 0");
    assert!(h.registry.reset_session(&h.session, &mut NoopObserver).is_ok());
    h.events.take();
    std::thread::sleep(Duration::from_millis(20));
    h.registry.poll(&mut h.events);
    assert!(h.events.take().is_empty());
    assert_eq!(h.registry.next_timer_due(), None);
}

#[test]
fn unmap_removes_a_definition() {
    let mut h = Harness::new();
    h.print("const a = 1; const b = 2;");
    h.events.take();
    let session = h.session.clone();
    assert!(h.registry.unmap_symbol(&session, "main.ts", "a", &mut h.events).is_ok());
    let changes = h.definitions_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].removed, vec!["a".to_owned()]);
    let defs = h.registry.definitions(&session, "main.ts").unwrap_or_default();
    assert_eq!(defs.keys().cloned().collect::<Vec<_>>(), vec!["b".to_owned()]);
    assert_eq!(h.eval("a").error_kind(), Some(ErrorKind::Runtime));
    h.events.take();

    assert!(h.registry.unmap_symbol(&session, "main.ts", "missing", &mut h.events).is_ok());
    assert!(h.events.take().is_empty());
}

#[test]
fn current_namespace_is_the_default_target() {
    let mut h = Harness::new();
    let session = h.session.clone();
    assert_eq!(h.registry.current_namespace(&session).ok().as_deref(), Some("index.ts"));
    assert!(h.registry.set_current_namespace(&session, "other.ts", &mut h.events).is_ok());
    assert_eq!(
        h.events.take(),
        vec![ReplEvent::NamespaceChanged {
            session_id: session.clone(),
            namespace_id: "other.ts".to_owned(),
        }]
    );
    let output = h.registry.evaluate(&EvaluateRequest::new(&session, ROOT, "1"), &mut NoopObserver);
    assert_eq!(output.namespace_id(), "other.ts");
}

// ============================================================================
// Faults
// ============================================================================

fn subscribe(registry: &mut SessionRegistry) -> Rc<RefCell<Vec<ReplEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    registry.subscribe(Box::new(move |event: &ReplEvent| sink.borrow_mut().push(event.clone())));
    seen
}

#[test]
fn timer_exceptions_reach_subscribers() {
    let mut h = Harness::new();
    let seen = subscribe(&mut h.registry);
    h.print("setTimeout(() => { throw new Error('late'); }, 0); 1");
    assert!(h.registry.next_timer_due().is_some());
    std::thread::sleep(Duration::from_millis(20));
    h.registry.poll(&mut NoopObserver);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1, "{seen:?}");
    let ReplEvent::UncaughtFault {
        session_id,
        namespace_id,
        fault,
        text,
    } = &seen[0]
    else {
        panic!("unexpected event {:?}", seen[0]);
    };
    assert_eq!(session_id, &h.session);
    assert_eq!(namespace_id, "main.ts");
    assert_eq!(*fault, FaultKind::UncaughtException);
    assert!(text.contains("late"), "{text}");
}

#[test]
fn unhandled_rejections_reach_subscribers() {
    let mut h = Harness::new();
    let seen = subscribe(&mut h.registry);
    h.print("Promise.reject(new Error('nope')); 1");
    let seen = seen.borrow();
    assert!(
        seen.iter().any(|event| matches!(
            event,
            ReplEvent::UncaughtFault { fault: FaultKind::UnhandledRejection, text, .. } if text.contains("nope")
        )),
        "{seen:?}"
    );
}

#[test]
fn handled_rejections_are_not_faults() {
    let mut h = Harness::new();
    let seen = subscribe(&mut h.registry);
    h.print("Promise.reject(new Error('nope')).catch(() => {}); 1");
    assert!(seen.borrow().is_empty());
}
