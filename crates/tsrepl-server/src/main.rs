use std::{
    io::{self, BufReader},
    process::ExitCode,
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::Instant,
};

use log::{error, info, warn};
use serde_json::Value;
use tsrepl::EngineConfig;
use tsrepl_server::{
    handler::ReplHandler,
    protocol::{
        INVALID_REQUEST, PARSE_ERROR, RpcError, RpcRequest, error_response, is_json_rpc_notification,
        read_framed_message, success_response, write_framed_message,
    },
};

/// Interpreter frames are deep; the default main-thread stack overflows before the
/// recursion limit is reached.
const STACK_SIZE: usize = 256 * 1024 * 1024;
/// Call depth that fits in `STACK_SIZE`.
const RECURSION_LIMIT: usize = 4000;

fn main() -> ExitCode {
    env_logger::init();
    let server = thread::Builder::new()
        .name("tsrepl-server".to_owned())
        .stack_size(STACK_SIZE)
        .spawn(serve);
    let result = match server {
        Ok(handle) => handle.join().unwrap_or_else(|_| Err(io::Error::other("server thread panicked"))),
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("server stopped: {err}");
            ExitCode::FAILURE
        }
    }
}

fn serve() -> io::Result<()> {
    let messages = spawn_reader();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut handler = ReplHandler::new(EngineConfig::default().recursion_limit(RECURSION_LIMIT));
    info!("tsrepl-server ready");

    loop {
        let received = match handler.next_timer_due() {
            Some(due) => match messages.recv_timeout(due.saturating_duration_since(Instant::now())) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match messages.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            },
        };

        let response = match received {
            Some(body) => handle_message(&mut handler, &body?),
            None => None,
        };
        handler.poll();
        for notification in handler.take_notifications() {
            write_framed_message(&mut writer, &notification)?;
        }
        if let Some(response) = response {
            write_framed_message(&mut writer, &response)?;
        }
        if handler.is_shut_down() {
            break;
        }
    }
    info!("tsrepl-server exiting");
    Ok(())
}

/// Reads framed messages on a separate thread so timers can fire while stdin is idle.
fn spawn_reader() -> Receiver<io::Result<Vec<u8>>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin.lock());
        loop {
            match read_framed_message(&mut reader) {
                Ok(Some(body)) => {
                    if sender.send(Ok(body)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let _ = sender.send(Err(err));
                    break;
                }
            }
        }
    });
    receiver
}

/// Handles one message body and returns the response to send, if any.
fn handle_message(handler: &mut ReplHandler, body: &[u8]) -> Option<Value> {
    let raw_message = match serde_json::from_slice::<Value>(body) {
        Ok(message) => message,
        Err(err) => {
            let error = RpcError::new(PARSE_ERROR, format!("parse error: {err}"));
            return Some(error_response(&Value::Null, &error));
        }
    };
    let is_notification = is_json_rpc_notification(&raw_message);

    let request = match serde_json::from_value::<RpcRequest>(raw_message) {
        Ok(request) => request,
        Err(err) => {
            let error = RpcError::new(INVALID_REQUEST, format!("invalid request: {err}"));
            return Some(error_response(&Value::Null, &error));
        }
    };

    let result = handler.handle(&request.method, request.params);
    if is_notification {
        if let Err(err) = result {
            warn!("notification {} failed: {}", request.method, err.message);
        }
        return None;
    }
    let id = request.id.unwrap_or(Value::Null);
    Some(match result {
        Ok(value) => success_response(&id, &value),
        Err(err) => error_response(&id, &err),
    })
}
