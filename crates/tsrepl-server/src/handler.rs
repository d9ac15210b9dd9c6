use std::{cell::RefCell, path::PathBuf, rc::Rc, time::Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tsrepl::{
    CollectEvents, EngineConfig, EvaluateRequest, ReplError, ReplEvent, SessionRegistry, find_spans, transform,
    transform_module, transform_regular,
};

use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, REPL_ERROR, RpcError, notification};

/// Methods answered by [`ReplHandler::handle`], as listed by `initialize`.
pub const METHODS: &[&str] = &[
    "initialize",
    "shutdown",
    "repl/new",
    "repl/connect",
    "repl/sessions",
    "repl/setCurrentNamespace",
    "repl/evaluate",
    "repl/evaluateSync",
    "repl/evaluateNamespace",
    "repl/reset",
    "repl/unmap",
    "repl/namespaces",
    "repl/definitions",
    "repl/fileChanged",
    "repl/transform",
    "repl/spans",
];

// =============================================================================
// ReplHandler
// =============================================================================

/// JSON adapter around a [`SessionRegistry`].
///
/// Each method parses its params, calls the registry and serializes the result. Events the
/// registry produces along the way are queued and handed out by
/// [`ReplHandler::take_notifications`] so the transport can send them before the response.
pub struct ReplHandler {
    registry: SessionRegistry,
    events: CollectEvents,
    broadcasts: Rc<RefCell<Vec<ReplEvent>>>,
    shutdown: bool,
}

impl ReplHandler {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(SessionRegistry::new(config))
    }

    /// Wraps an existing registry, e.g. one reading from an in-memory filesystem.
    #[must_use]
    pub fn with_registry(mut registry: SessionRegistry) -> Self {
        let broadcasts = Rc::new(RefCell::new(Vec::new()));
        let sink = broadcasts.clone();
        registry.subscribe(Box::new(move |event: &ReplEvent| sink.borrow_mut().push(event.clone())));
        Self {
            registry,
            events: CollectEvents::new(),
            broadcasts,
            shutdown: false,
        }
    }

    /// Dispatches one call by method name.
    pub fn handle(&mut self, method: &str, params: Value) -> Result<Value, RpcError> {
        debug!("handling {method}");
        match method {
            "initialize" => Ok(json!({
                "serverInfo": {
                    "name": "tsrepl-server",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {
                    "methods": METHODS,
                    "notifications": [
                        "repl/output",
                        "repl/namespaceChanged",
                        "repl/definitionsChanged",
                        "repl/reset",
                        "repl/uncaughtFault",
                    ],
                },
            })),
            "shutdown" => {
                self.shutdown = true;
                Ok(Value::Null)
            }
            "repl/new" => self.new_session(params),
            "repl/connect" => self.connect(params),
            "repl/sessions" => to_json(&self.registry.list_sessions()),
            "repl/setCurrentNamespace" => self.set_current_namespace(params),
            "repl/evaluate" => self.evaluate(params),
            "repl/evaluateSync" => self.evaluate_sync(params),
            "repl/evaluateNamespace" => self.evaluate_namespace(params),
            "repl/reset" => self.reset(params),
            "repl/unmap" => self.unmap(params),
            "repl/namespaces" => self.namespaces(params),
            "repl/definitions" => self.definitions(params),
            "repl/fileChanged" => self.file_changed(params),
            "repl/transform" => transform_tool(params),
            "repl/spans" => spans_tool(params),
            other => Err(RpcError::new(METHOD_NOT_FOUND, format!("method not found: {other}"))),
        }
    }

    /// Runs due timers so their output and faults are queued as notifications.
    pub fn poll(&mut self) {
        self.registry.poll(&mut self.events);
    }

    #[must_use]
    pub fn next_timer_due(&self) -> Option<Instant> {
        self.registry.next_timer_due()
    }

    /// True once `shutdown` has been handled.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    /// Drains queued events as JSON-RPC notifications, in the order they were produced.
    pub fn take_notifications(&mut self) -> Vec<Value> {
        let mut events = self.events.take();
        events.append(&mut self.broadcasts.borrow_mut());
        events
            .iter()
            .filter_map(|event| match serde_json::to_value(event) {
                Ok(params) => Some(notification(event.method(), &params)),
                Err(err) => {
                    warn!("dropping unserializable {} event: {err}", event.method());
                    None
                }
            })
            .collect()
    }
}

// =============================================================================
// Session methods
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionParams {
    session_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceParams {
    session_id: String,
    namespace_id: String,
}

impl ReplHandler {
    /// `{"name"?, "sessionId"?}` -> `{"sessionId"}`
    fn new_session(&mut self, params: Value) -> Result<Value, RpcError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            name: Option<String>,
            session_id: Option<String>,
        }

        let params: Params = parse_params("repl/new", params)?;
        let id = self
            .registry
            .create_session(params.name.as_deref(), params.session_id.as_deref());
        Ok(json!({ "sessionId": id }))
    }

    fn connect(&self, params: Value) -> Result<Value, RpcError> {
        let params: SessionParams = parse_params("repl/connect", params)?;
        let info = self.registry.connect(&params.session_id).map_err(repl_error)?;
        to_json(&info)
    }

    fn set_current_namespace(&mut self, params: Value) -> Result<Value, RpcError> {
        let params: NamespaceParams = parse_params("repl/setCurrentNamespace", params)?;
        self.registry
            .set_current_namespace(&params.session_id, &params.namespace_id, &mut self.events)
            .map_err(repl_error)?;
        Ok(Value::Null)
    }

    fn reset(&mut self, params: Value) -> Result<Value, RpcError> {
        let params: SessionParams = parse_params("repl/reset", params)?;
        self.registry
            .reset_session(&params.session_id, &mut self.events)
            .map_err(repl_error)?;
        Ok(Value::Null)
    }

    fn unmap(&mut self, params: Value) -> Result<Value, RpcError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            session_id: String,
            namespace_id: String,
            symbol: String,
        }

        let params: Params = parse_params("repl/unmap", params)?;
        self.registry
            .unmap_symbol(&params.session_id, &params.namespace_id, &params.symbol, &mut self.events)
            .map_err(repl_error)?;
        Ok(Value::Null)
    }

    fn namespaces(&self, params: Value) -> Result<Value, RpcError> {
        let params: SessionParams = parse_params("repl/namespaces", params)?;
        let namespaces = self.registry.list_namespaces(&params.session_id).map_err(repl_error)?;
        to_json(&namespaces)
    }

    fn definitions(&mut self, params: Value) -> Result<Value, RpcError> {
        let params: NamespaceParams = parse_params("repl/definitions", params)?;
        let definitions = self
            .registry
            .definitions(&params.session_id, &params.namespace_id)
            .map_err(repl_error)?;
        to_json(&definitions)
    }

    fn file_changed(&mut self, params: Value) -> Result<Value, RpcError> {
        #[derive(Deserialize)]
        struct Params {
            path: PathBuf,
        }

        let params: Params = parse_params("repl/fileChanged", params)?;
        self.registry.file_changed(&params.path);
        Ok(Value::Null)
    }
}

// =============================================================================
// Evaluation
// =============================================================================

impl ReplHandler {
    /// Evaluates and returns the output record. Evaluation failures are results, not
    /// JSON-RPC errors.
    fn evaluate(&mut self, params: Value) -> Result<Value, RpcError> {
        let request: EvaluateRequest = parse_params("repl/evaluate", params)?;
        let output = self.registry.evaluate(&request, &mut self.events);
        to_json(&output)
    }

    fn evaluate_sync(&mut self, params: Value) -> Result<Value, RpcError> {
        let request: EvaluateRequest = parse_params("repl/evaluateSync", params)?;
        let output = self.registry.evaluate_sync(&request);
        to_json(&output)
    }

    /// `{"sessionId", "namespaceId", "workingDir"}` -> output of evaluating the file
    /// `workingDir/namespaceId`.
    fn evaluate_namespace(&mut self, params: Value) -> Result<Value, RpcError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            session_id: String,
            namespace_id: String,
            working_dir: PathBuf,
        }

        let params: Params = parse_params("repl/evaluateNamespace", params)?;
        let output = self.registry.evaluate_namespace(
            &params.session_id,
            &params.namespace_id,
            &params.working_dir,
            &mut self.events,
        );
        to_json(&output)
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
enum TransformMode {
    #[default]
    Repl,
    Module,
    Regular,
}

/// `{"code", "mode"?}` -> `{"code", "isAsync"}`; parse failures are JSON-RPC errors.
fn transform_tool(params: Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        code: String,
        #[serde(default)]
        mode: TransformMode,
    }

    let params: Params = parse_params("repl/transform", params)?;
    let transformed = match params.mode {
        TransformMode::Repl => transform(&params.code),
        TransformMode::Module => transform_module(&params.code),
        TransformMode::Regular => transform_regular(&params.code),
    };
    match transformed {
        Ok(output) => to_json(&output),
        Err(err) => {
            let loc = err.loc();
            Err(RpcError::new(REPL_ERROR, err.to_string()).with_data(json!({
                "kind": "transform",
                "line": loc.line,
                "column": loc.column,
            })))
        }
    }
}

/// `{"code", "offset"}` -> spans, outermost first.
fn spans_tool(params: Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        code: String,
        offset: usize,
    }

    let params: Params = parse_params("repl/spans", params)?;
    to_json(&find_spans(&params.code, params.offset))
}

// =============================================================================
// Helpers
// =============================================================================

/// Absent params are read as an empty object so methods with only optional fields work.
fn parse_params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, RpcError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|err| RpcError::new(INVALID_PARAMS, format!("invalid {method} params: {err}")))
}

fn repl_error(err: ReplError) -> RpcError {
    RpcError::new(REPL_ERROR, err.to_string()).with_data(json!({ "kind": err.kind() }))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::new(INTERNAL_ERROR, format!("serialize error: {err}")))
}
