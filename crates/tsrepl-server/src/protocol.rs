//! JSON-RPC 2.0 messages and `Content-Length` framing.

use std::io::{self, BufRead, Write};

use serde::Deserialize;
use serde_json::{Value, json};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// Engine-level failures such as an unknown session.
pub const REPL_ERROR: i32 = -32000;

/// A request or notification from the client. Notifications have no `id`.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A failed call, turned into the `error` member of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Returns true when the payload is a JSON-RPC 2.0 notification.
///
/// Notifications contain a string `method` and omit `id`; they never get a response.
#[must_use]
pub fn is_json_rpc_notification(payload: &Value) -> bool {
    let Some(object) = payload.as_object() else {
        return false;
    };

    object.get("jsonrpc").and_then(Value::as_str) == Some("2.0")
        && object.get("method").is_some_and(Value::is_string)
        && !object.contains_key("id")
}

#[must_use]
pub fn success_response(id: &Value, result: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

#[must_use]
pub fn error_response(id: &Value, error: &RpcError) -> Value {
    let mut body = json!({
        "code": error.code,
        "message": error.message,
    });
    if let Some(data) = &error.data {
        body["data"] = data.clone();
    }
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": body,
    })
}

/// A server-to-client notification.
#[must_use]
pub fn notification(method: &str, params: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

/// Reads one Content-Length framed message body. `None` means the stream ended cleanly.
pub fn read_framed_message(reader: &mut impl BufRead) -> io::Result<Option<Vec<u8>>> {
    let mut content_length = None;
    let mut saw_header = false;
    loop {
        let mut header_line = String::new();
        let read = reader.read_line(&mut header_line)?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;
        let Some((name, value)) = trimmed.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let length = value
                .trim()
                .parse::<usize>()
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("invalid Content-Length: {err}")))?;
            content_length = Some(length);
        }
    }

    let Some(content_length) = content_length else {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "missing Content-Length header"));
    };

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Writes one Content-Length framed JSON message.
pub fn write_framed_message(writer: &mut impl Write, payload: &Value) -> io::Result<()> {
    let body = serde_json::to_vec(payload)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("serialize error: {err}")))?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()
}
