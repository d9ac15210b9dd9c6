use std::io::{BufReader, Cursor};

use pretty_assertions::assert_eq;
use serde_json::json;
use tsrepl_server::protocol::{
    RpcError, error_response, is_json_rpc_notification, notification, read_framed_message, success_response,
    write_framed_message,
};

#[test]
fn written_frames_read_back() {
    let mut buffer = Vec::new();
    let first = json!({ "jsonrpc": "2.0", "id": 1, "method": "repl/new" });
    let second = json!({ "jsonrpc": "2.0", "method": "repl/fileChanged", "params": { "path": "/tmp/ü.ts" } });
    write_framed_message(&mut buffer, &first).unwrap_or_else(|err| panic!("write: {err}"));
    write_framed_message(&mut buffer, &second).unwrap_or_else(|err| panic!("write: {err}"));

    let mut reader = BufReader::new(Cursor::new(buffer));
    let read = |reader: &mut BufReader<Cursor<Vec<u8>>>| {
        read_framed_message(reader)
            .unwrap_or_else(|err| panic!("read: {err}"))
            .map(|body| serde_json::from_slice::<serde_json::Value>(&body).unwrap_or_default())
    };
    assert_eq!(read(&mut reader), Some(first));
    assert_eq!(read(&mut reader), Some(second));
    assert_eq!(read(&mut reader), None);
}

#[test]
fn extra_headers_are_ignored() {
    let raw = b"Content-Type: application/vscode-jsonrpc; charset=utf-8\r\ncontent-length: 2\r\n\r\n{}";
    let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
    let body = read_framed_message(&mut reader).ok().flatten();
    assert_eq!(body, Some(b"{}".to_vec()));
}

#[test]
fn missing_or_bad_length_is_an_error() {
    let mut reader = BufReader::new(Cursor::new(b"X-Other: 1\r\n\r\n{}".to_vec()));
    assert!(read_framed_message(&mut reader).is_err());
    let mut reader = BufReader::new(Cursor::new(b"Content-Length: many\r\n\r\n".to_vec()));
    assert!(read_framed_message(&mut reader).is_err());
}

#[test]
fn notifications_have_no_id() {
    assert!(is_json_rpc_notification(&json!({ "jsonrpc": "2.0", "method": "repl/fileChanged" })));
    assert!(!is_json_rpc_notification(&json!({ "jsonrpc": "2.0", "id": 3, "method": "repl/new" })));
    assert!(!is_json_rpc_notification(&json!({ "method": "repl/new" })));
    assert!(!is_json_rpc_notification(&json!([1, 2])));
}

#[test]
fn response_shapes() {
    assert_eq!(
        success_response(&json!(7), &json!({ "ok": true })),
        json!({ "jsonrpc": "2.0", "id": 7, "result": { "ok": true } })
    );
    let error = RpcError::new(-32000, "Session not found: x").with_data(json!({ "kind": "sessionNotFound" }));
    assert_eq!(
        error_response(&json!("a"), &error),
        json!({
            "jsonrpc": "2.0",
            "id": "a",
            "error": { "code": -32000, "message": "Session not found: x", "data": { "kind": "sessionNotFound" } },
        })
    );
    assert_eq!(
        notification("repl/reset", &json!({ "sessionId": "s" })),
        json!({ "jsonrpc": "2.0", "method": "repl/reset", "params": { "sessionId": "s" } })
    );
}
