use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tsrepl::{EngineConfig, FileSystem, MemoryFileSystem, SessionRegistry};
use tsrepl_server::{
    handler::ReplHandler,
    protocol::{INVALID_PARAMS, METHOD_NOT_FOUND, REPL_ERROR},
};

fn handler() -> ReplHandler {
    let fs: Rc<dyn FileSystem> = Rc::new(
        MemoryFileSystem::new()
            .with_file("/proj/index.ts", "")
            .with_file("/proj/lib.ts", "export const answer = 42;")
            .with_file("/proj/util.ts", "console.log('loaded'); const six = 6; six * 7"),
    );
    ReplHandler::with_registry(SessionRegistry::with_file_system(EngineConfig::default(), fs))
}

fn call(handler: &mut ReplHandler, method: &str, params: Value) -> Value {
    match handler.handle(method, params) {
        Ok(value) => value,
        Err(err) => panic!("{method} failed: {err:?}"),
    }
}

fn new_session(handler: &mut ReplHandler) -> String {
    let created = call(handler, "repl/new", json!({ "sessionId": "s1", "name": "editor" }));
    assert_eq!(created, json!({ "sessionId": "s1" }));
    "s1".to_owned()
}

fn methods(notifications: &[Value]) -> Vec<&str> {
    notifications.iter().filter_map(|n| n["method"].as_str()).collect()
}

#[test]
fn initialize_lists_methods() {
    let mut handler = handler();
    let info = call(&mut handler, "initialize", Value::Null);
    assert_eq!(info["serverInfo"]["name"], json!("tsrepl-server"));
    let listed = info["capabilities"]["methods"].as_array().cloned().unwrap_or_default();
    assert!(listed.contains(&json!("repl/evaluate")));
    assert!(listed.contains(&json!("repl/spans")));
    assert!(listed.contains(&json!("repl/evaluateNamespace")));
}

#[test]
fn new_session_without_params_generates_an_id() {
    let mut handler = handler();
    let created = call(&mut handler, "repl/new", Value::Null);
    let id = created["sessionId"].as_str().unwrap_or_default();
    assert_eq!(id.len(), 36, "{created}");
    let info = call(&mut handler, "repl/connect", json!({ "sessionId": id }));
    assert_eq!(info["currentNamespace"], json!("index.ts"));
}

#[test]
fn evaluate_returns_output_and_queues_events() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    let output = call(
        &mut handler,
        "repl/evaluate",
        json!({
            "sessionId": session,
            "namespaceId": "index.ts",
            "workingDir": "/proj",
            "code": "console.log('hi'); const a = 1; a + 1",
        }),
    );
    assert_eq!(
        output,
        json!({
            "kind": "print",
            "text": "2",
            "namespaceId": "index.ts",
            "input": "console.log('hi'); const a = 1; a + 1",
        })
    );

    let notifications = handler.take_notifications();
    assert_eq!(
        methods(&notifications),
        vec!["repl/output", "repl/output", "repl/definitionsChanged"]
    );
    assert_eq!(notifications[0]["params"]["text"], json!("hi"));
    assert_eq!(notifications[2]["params"]["added"], json!({ "a": "1" }));
    assert!(handler.take_notifications().is_empty());
}

#[test]
fn evaluation_failures_are_results() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    let output = call(
        &mut handler,
        "repl/evaluate",
        json!({ "sessionId": session, "workingDir": "/proj", "code": "null.x" }),
    );
    assert_eq!(output["kind"], json!("error"));
    assert_eq!(output["errorKind"], json!("runtime"));
    assert_eq!(output["namespaceId"], json!("index.ts"));
}

#[test]
fn imports_resolve_through_the_registry_filesystem() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    let output = call(
        &mut handler,
        "repl/evaluate",
        json!({ "sessionId": session, "workingDir": "/proj", "code": "import { answer } from './lib';" }),
    );
    assert_eq!(output["text"], json!("42"));
}

#[test]
fn session_errors_carry_their_kind() {
    let mut handler = handler();
    let err = handler.handle("repl/reset", json!({ "sessionId": "missing" }));
    let Err(err) = err else { panic!("reset of unknown session succeeded") };
    assert_eq!(err.code, REPL_ERROR);
    assert_eq!(err.message, "Session not found: missing");
    assert_eq!(err.data, Some(json!({ "kind": "sessionNotFound" })));
}

#[test]
fn namespace_management() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    call(
        &mut handler,
        "repl/setCurrentNamespace",
        json!({ "sessionId": session, "namespaceId": "lib.ts" }),
    );
    call(
        &mut handler,
        "repl/evaluate",
        json!({ "sessionId": session, "workingDir": "/proj", "code": "let x = 1; let y = 2;" }),
    );
    assert_eq!(call(&mut handler, "repl/namespaces", json!({ "sessionId": session })), json!(["lib.ts"]));
    handler.take_notifications();

    call(
        &mut handler,
        "repl/unmap",
        json!({ "sessionId": session, "namespaceId": "lib.ts", "symbol": "x" }),
    );
    let defs = call(
        &mut handler,
        "repl/definitions",
        json!({ "sessionId": session, "namespaceId": "lib.ts" }),
    );
    assert_eq!(defs, json!({ "y": "2" }));

    call(&mut handler, "repl/reset", json!({ "sessionId": session }));
    assert_eq!(call(&mut handler, "repl/namespaces", json!({ "sessionId": session })), json!([]));
    assert_eq!(
        methods(&handler.take_notifications()),
        vec!["repl/definitionsChanged", "repl/reset"]
    );
}

#[test]
fn set_current_namespace_is_announced() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    call(
        &mut handler,
        "repl/setCurrentNamespace",
        json!({ "sessionId": session, "namespaceId": "other.ts" }),
    );
    let notifications = handler.take_notifications();
    assert_eq!(
        notifications,
        vec![json!({
            "jsonrpc": "2.0",
            "method": "repl/namespaceChanged",
            "params": { "event": "namespaceChanged", "sessionId": "s1", "namespaceId": "other.ts" },
        })]
    );
}

#[test]
fn evaluate_namespace_runs_the_source_file() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    let output = call(
        &mut handler,
        "repl/evaluateNamespace",
        json!({ "sessionId": session, "namespaceId": "util.ts", "workingDir": "/proj" }),
    );
    assert_eq!(output["kind"], json!("print"));
    assert_eq!(output["text"], json!("42"));
    assert_eq!(output["namespaceId"], json!("util.ts"));
    let notifications = handler.take_notifications();
    assert_eq!(
        methods(&notifications),
        vec!["repl/output", "repl/output", "repl/definitionsChanged"]
    );
    assert_eq!(notifications[0]["params"]["text"], json!("loaded"));
    let defs = call(
        &mut handler,
        "repl/definitions",
        json!({ "sessionId": session, "namespaceId": "util.ts" }),
    );
    assert_eq!(defs, json!({ "six": "6" }));
}

#[test]
fn evaluate_namespace_reports_unreadable_files() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    let output = call(
        &mut handler,
        "repl/evaluateNamespace",
        json!({ "sessionId": session, "namespaceId": "missing.ts", "workingDir": "/proj" }),
    );
    assert_eq!(output["kind"], json!("error"));
    assert_eq!(output["errorKind"], json!("namespaceNotFound"));
    let text = output["text"].as_str().unwrap_or_default();
    assert!(text.starts_with("Cannot read /proj/missing.ts"), "{text}");
    assert_eq!(methods(&handler.take_notifications()), vec!["repl/output"]);
}

#[test]
fn evaluate_sync_notifies_only_when_broadcasting() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    call(
        &mut handler,
        "repl/evaluate",
        json!({ "sessionId": session, "workingDir": "/proj", "code": "let n = 1;" }),
    );
    handler.take_notifications();

    let quiet = json!({ "sessionId": session, "workingDir": "/proj", "code": "console.log('q'); n + 1" });
    let output = call(&mut handler, "repl/evaluateSync", quiet);
    assert_eq!(output["text"], json!("2"));
    assert!(handler.take_notifications().is_empty());

    let loud = json!({
        "sessionId": session,
        "workingDir": "/proj",
        "code": "console.log('l'); n + 2",
        "broadcast": true,
    });
    let output = call(&mut handler, "repl/evaluateSync", loud);
    assert_eq!(output["text"], json!("3"));
    let notifications = handler.take_notifications();
    assert_eq!(methods(&notifications), vec!["repl/output", "repl/output"]);
    assert_eq!(notifications[0]["params"]["text"], json!("l"));
    assert_eq!(notifications[1]["params"]["text"], json!("3"));
}

#[test]
fn unhandled_rejections_become_fault_notifications() {
    let mut handler = handler();
    let session = new_session(&mut handler);
    call(
        &mut handler,
        "repl/evaluate",
        json!({ "sessionId": session, "workingDir": "/proj", "code": "Promise.reject(new Error('later')); 0" }),
    );
    let notifications = handler.take_notifications();
    let fault = notifications.iter().find(|n| n["method"] == json!("repl/uncaughtFault"));
    let Some(fault) = fault else { panic!("no fault in {notifications:?}") };
    assert_eq!(fault["params"]["fault"], json!("unhandledRejection"));
    assert!(fault["params"]["text"].as_str().unwrap_or_default().contains("later"));
}

#[test]
fn transform_and_spans_are_stateless() {
    let mut handler = handler();
    let transformed = call(&mut handler, "repl/transform", json!({ "code": "const a = 1;" }));
    assert_eq!(transformed["isAsync"], json!(false));
    assert!(transformed["code"].as_str().unwrap_or_default().contains("var a = 1"));

    let module = call(&mut handler, "repl/transform", json!({ "code": "const a = 1;", "mode": "module" }));
    assert!(module["code"].as_str().unwrap_or_default().contains("const a = 1"));

    let err = handler.handle("repl/transform", json!({ "code": "const = ;" }));
    let Err(err) = err else { panic!("bad code transformed") };
    assert_eq!(err.code, REPL_ERROR);
    assert_eq!(err.data.as_ref().map(|data| data["kind"].clone()), Some(json!("transform")));

    let spans = call(&mut handler, "repl/spans", json!({ "code": "f(x)", "offset": 2 }));
    let kinds: Vec<&str> = spans
        .as_array()
        .map(|spans| spans.iter().filter_map(|span| span["kind"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(kinds, vec!["ExpressionStatement", "CallExpression", "Identifier"]);
}

#[test]
fn bad_params_and_unknown_methods() {
    let mut handler = handler();
    let err = handler.handle("repl/evaluate", json!({ "code": 1 }));
    assert!(matches!(err, Err(ref err) if err.code == INVALID_PARAMS), "{err:?}");
    let err = handler.handle("repl/frobnicate", Value::Null);
    assert!(matches!(err, Err(ref err) if err.code == METHOD_NOT_FOUND), "{err:?}");
}

#[test]
fn shutdown_is_remembered() {
    let mut handler = handler();
    assert!(!handler.is_shut_down());
    assert_eq!(call(&mut handler, "shutdown", Value::Null), Value::Null);
    assert!(handler.is_shut_down());
}
