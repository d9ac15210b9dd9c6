//! Results and push events produced by the engine.
//!
//! Every type here is protocol-facing: it serializes to camelCase JSON and is what the
//! editor server forwards to its client.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The outcome of one evaluation, or a line of console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReplOutput {
    #[serde(rename_all = "camelCase")]
    Print {
        text: String,
        namespace_id: String,
        /// The evaluated fragment; absent for console output.
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        text: String,
        namespace_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        error_kind: ErrorKind,
    },
}

impl ReplOutput {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Print { text, .. } | Self::Error { text, .. } => text,
        }
    }

    #[must_use]
    pub fn namespace_id(&self) -> &str {
        match self {
            Self::Print { namespace_id, .. } | Self::Error { namespace_id, .. } => namespace_id,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The error kind, or `None` for printed output.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Print { .. } => None,
            Self::Error { error_kind, .. } => Some(*error_kind),
        }
    }
}

/// Why an evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorKind {
    SessionNotFound,
    NamespaceNotFound,
    NamespaceCreation,
    Transform,
    Runtime,
}

/// Kinds of fault raised outside any evaluation's own call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FaultKind {
    UncaughtException,
    UnhandledRejection,
}

/// Top-level names that appeared, vanished or changed value during one evaluation.
///
/// Values are rendered through the result formatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionsChange {
    pub session_id: String,
    pub namespace_id: String,
    pub added: IndexMap<String, String>,
    pub removed: Vec<String>,
    pub changed: IndexMap<String, String>,
}

impl DefinitionsChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Something a [`ReplObserver`] is told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ReplEvent {
    Output(ReplOutput),
    #[serde(rename_all = "camelCase")]
    NamespaceChanged { session_id: String, namespace_id: String },
    DefinitionsChanged(DefinitionsChange),
    #[serde(rename_all = "camelCase")]
    Reset { session_id: String },
    /// An exception thrown from a timer or microtask, or a rejection nobody handled.
    ///
    /// Only registry subscribers receive these.
    #[serde(rename_all = "camelCase")]
    UncaughtFault {
        session_id: String,
        namespace_id: String,
        fault: FaultKind,
        text: String,
    },
}

impl ReplEvent {
    /// The JSON-RPC notification method the event is published under.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Output(_) => "repl/output",
            Self::NamespaceChanged { .. } => "repl/namespaceChanged",
            Self::DefinitionsChanged(_) => "repl/definitionsChanged",
            Self::Reset { .. } => "repl/reset",
            Self::UncaughtFault { .. } => "repl/uncaughtFault",
        }
    }
}

/// Receives events as the engine produces them.
///
/// Implement this to forward events to an editor, a terminal or a test buffer.
pub trait ReplObserver {
    fn on_event(&mut self, event: &ReplEvent);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReplObserver for NoopObserver {
    fn on_event(&mut self, _event: &ReplEvent) {}
}

/// Observer that keeps every event, for tests and batch callers.
#[derive(Debug, Default, Clone)]
pub struct CollectEvents(pub Vec<ReplEvent>);

impl CollectEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the events collected so far.
    pub fn take(&mut self) -> Vec<ReplEvent> {
        std::mem::take(&mut self.0)
    }
}

impl ReplObserver for CollectEvents {
    fn on_event(&mut self, event: &ReplEvent) {
        self.0.push(event.clone());
    }
}

impl<F: FnMut(&ReplEvent)> ReplObserver for F {
    fn on_event(&mut self, event: &ReplEvent) {
        self(event);
    }
}
