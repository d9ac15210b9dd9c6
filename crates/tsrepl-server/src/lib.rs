//! Editor-facing JSON-RPC server for the tsrepl engine.
//!
//! `protocol` holds the JSON-RPC 2.0 message shapes and `Content-Length` framing;
//! `handler::ReplHandler` maps `repl/*` methods onto a `SessionRegistry` and queues
//! engine events as notifications. The binary wires both to stdin and stdout.

pub mod handler;
pub mod protocol;
