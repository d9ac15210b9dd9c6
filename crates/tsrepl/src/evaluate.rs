//! The evaluation coordinator.
//!
//! One call runs `resolve namespace -> transform -> execute -> diff -> emit`. Failures at any
//! stage become a [`ReplOutput::Error`]; nothing propagates to the caller.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::{
    config::InspectOptions,
    diff::DefinitionDiff,
    events::{CollectEvents, DefinitionsChange, ReplEvent, ReplObserver, ReplOutput},
    interp::{Interp, JsResult, Throw, Value},
    modules::NAMESPACE_NOT_FOUND,
    namespace::Namespace,
    repl_error::ReplError,
    session::{SessionRegistry, dispatch_console, log_console, render_binding},
    transform::{TransformOutput, transform},
};

/// A fragment to evaluate and where to evaluate it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub session_id: String,
    /// Target namespace; the session's current namespace when absent.
    #[serde(default)]
    pub namespace_id: Option<String>,
    /// File the fragment was taken from, used in error stacks.
    #[serde(default)]
    pub source_path: Option<PathBuf>,
    /// Directory relative `require` ids resolve against.
    pub working_dir: PathBuf,
    pub code: String,
    /// Send console output and the result of a sync evaluation to subscribers.
    #[serde(default)]
    pub broadcast: bool,
}

impl EvaluateRequest {
    #[must_use]
    pub fn new(session_id: impl Into<String>, working_dir: impl Into<PathBuf>, code: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            namespace_id: None,
            source_path: None,
            working_dir: working_dir.into(),
            code: code.into(),
            broadcast: false,
        }
    }

    #[must_use]
    pub fn namespace(mut self, namespace_id: impl Into<String>) -> Self {
        self.namespace_id = Some(namespace_id.into());
        self
    }

    #[must_use]
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }
}

impl SessionRegistry {
    /// Evaluates a fragment, creating its namespace on first use.
    ///
    /// `sink` receives console output, then the result, then the definitions change, in
    /// that order. Uncaught faults raised along the way go to subscribers.
    pub fn evaluate(&mut self, request: &EvaluateRequest, sink: &mut dyn ReplObserver) -> ReplOutput {
        self.apply_invalidations();
        let namespace_id = self.target_namespace(request);
        let output = match self.evaluate_in_namespace(request, &namespace_id, sink) {
            Ok(output) => output,
            Err(err) => {
                let output = error_output(&err, &namespace_id, &request.code);
                sink.on_event(&ReplEvent::Output(output.clone()));
                output
            }
        };
        self.dispatch_faults();
        output
    }

    /// Evaluates a fragment in an existing namespace and returns the result.
    ///
    /// No diff is computed. Console output goes to the log unless the request asks for a
    /// broadcast, in which case subscribers see the console lines and then the result.
    pub fn evaluate_sync(&mut self, request: &EvaluateRequest) -> ReplOutput {
        self.apply_invalidations();
        let namespace_id = self.target_namespace(request);
        let mut events = CollectEvents::new();
        let console = request.broadcast.then_some(&mut events as &mut dyn ReplObserver);
        let output = self
            .evaluate_existing(request, &namespace_id, console)
            .unwrap_or_else(|err| error_output(&err, &namespace_id, &request.code));
        if request.broadcast {
            events.on_event(&ReplEvent::Output(output.clone()));
            for event in events.take() {
                self.broadcast(&event);
            }
        }
        self.dispatch_faults();
        output
    }

    /// Evaluates the whole source file of a namespace, `working_dir/namespace_id`, as one
    /// fragment. Events go to `sink` exactly as for [`SessionRegistry::evaluate`].
    pub fn evaluate_namespace(
        &mut self,
        session_id: &str,
        namespace_id: &str,
        working_dir: &Path,
        sink: &mut dyn ReplObserver,
    ) -> ReplOutput {
        let path = working_dir.join(namespace_id);
        match self.fs.read_to_string(&path) {
            Ok(code) => {
                let request = EvaluateRequest::new(session_id, working_dir, code)
                    .namespace(namespace_id)
                    .source_path(&path);
                self.evaluate(&request, sink)
            }
            Err(err) => {
                let err = ReplError::SourceUnreadable {
                    path,
                    reason: err.to_string(),
                };
                let output = error_output(&err, namespace_id, "");
                sink.on_event(&ReplEvent::Output(output.clone()));
                output
            }
        }
    }

    fn target_namespace(&self, request: &EvaluateRequest) -> String {
        request.namespace_id.clone().unwrap_or_else(|| {
            self.sessions
                .get(&request.session_id)
                .map_or_else(|| self.config.default_namespace.clone(), |session| session.current_namespace.clone())
        })
    }

    fn evaluate_in_namespace(
        &mut self,
        request: &EvaluateRequest,
        namespace_id: &str,
        sink: &mut dyn ReplObserver,
    ) -> Result<ReplOutput, ReplError> {
        let session = self
            .sessions
            .get_mut(&request.session_id)
            .ok_or_else(|| ReplError::SessionNotFound(request.session_id.clone()))?;
        if !session.namespaces.contains_key(namespace_id) {
            let namespace = Namespace::create(
                &self.interp,
                &self.config,
                &self.fs,
                &session.directory,
                &session.id,
                namespace_id,
                &request.working_dir,
            )?;
            session.namespaces.insert(namespace_id.to_owned(), namespace);
        }
        let Some(namespace) = session.namespaces.get_mut(namespace_id) else {
            return Err(ReplError::NamespaceNotFound(namespace_id.to_owned()));
        };
        let before = namespace.snapshot(&self.config);
        let transformed = transform(&request.code)?;
        debug!("evaluating in {namespace_id}:\n{}", transformed.code);

        let result = execute(&mut self.interp, namespace, request, &transformed);
        dispatch_console(&mut self.interp, sink);
        let value = match result {
            Ok(value) => value,
            Err(Throw(thrown)) => {
                namespace.sync_definitions(&self.config);
                return Err(thrown_error(&mut self.interp, &thrown, &self.config.inspect));
            }
        };

        let output = ReplOutput::Print {
            text: self.interp.inspect(&value, &self.config.inspect),
            namespace_id: namespace_id.to_owned(),
            input: Some(request.code.clone()),
        };
        sink.on_event(&ReplEvent::Output(output.clone()));
        namespace.record_result(value);

        let after = namespace.snapshot(&self.config);
        namespace.sync_definitions(&self.config);
        let diff = DefinitionDiff::between(&before, &after);
        if !diff.is_empty() {
            let global = namespace.global().clone();
            let render = |interp: &mut Interp, names: Vec<String>| -> IndexMap<String, String> {
                names
                    .into_iter()
                    .map(|name| {
                        let text = render_binding(interp, &global, &name, &self.config.inspect);
                        (name, text)
                    })
                    .collect()
            };
            let change = DefinitionsChange {
                session_id: request.session_id.clone(),
                namespace_id: namespace_id.to_owned(),
                added: render(&mut self.interp, diff.added),
                removed: diff.removed,
                changed: render(&mut self.interp, diff.changed),
            };
            sink.on_event(&ReplEvent::DefinitionsChanged(change));
        }
        Ok(output)
    }

    fn evaluate_existing(
        &mut self,
        request: &EvaluateRequest,
        namespace_id: &str,
        console: Option<&mut dyn ReplObserver>,
    ) -> Result<ReplOutput, ReplError> {
        let session = self
            .sessions
            .get_mut(&request.session_id)
            .ok_or_else(|| ReplError::SessionNotFound(request.session_id.clone()))?;
        let namespace = session
            .namespaces
            .get_mut(namespace_id)
            .ok_or_else(|| ReplError::NamespaceNotFound(namespace_id.to_owned()))?;
        let transformed = transform(&request.code)?;
        let result = execute(&mut self.interp, namespace, request, &transformed);
        match console {
            Some(sink) => dispatch_console(&mut self.interp, sink),
            None => log_console(&mut self.interp),
        }
        namespace.sync_definitions(&self.config);
        let value = result.map_err(|Throw(thrown)| thrown_error(&mut self.interp, &thrown, &self.config.inspect))?;
        let text = self.interp.inspect(&value, &self.config.inspect);
        namespace.record_result(value);
        Ok(ReplOutput::Print {
            text,
            namespace_id: namespace_id.to_owned(),
            input: Some(request.code.clone()),
        })
    }
}

/// Runs transformed code in the namespace sandbox, awaiting it when it was wrapped for
/// top-level `await`.
fn execute(
    interp: &mut Interp,
    namespace: &Namespace,
    request: &EvaluateRequest,
    transformed: &TransformOutput,
) -> JsResult<Value> {
    let filename = request
        .source_path
        .as_ref()
        .map_or_else(|| namespace.id.clone(), |path| path.to_string_lossy().into_owned());
    let realm = namespace.realm.clone();
    let result = interp.with_origin(Some(namespace.origin.clone()), |interp| {
        let value = interp.run_script(&transformed.code, &realm, &filename)?;
        if transformed.is_async {
            interp.await_value(value)
        } else {
            interp.run_microtasks();
            Ok(value)
        }
    });
    interp.check_unhandled_rejections();
    result
}

/// Classifies an uncaught exception; a failed `ns:` import keeps its own kind.
fn thrown_error(interp: &mut Interp, thrown: &Value, options: &InspectOptions) -> ReplError {
    if let Value::Object(error) = thrown {
        let tagged = matches!(error.own_value("code"), Some(Value::String(code)) if &*code == NAMESPACE_NOT_FOUND);
        if let (true, Some(Value::String(namespace))) = (tagged, error.own_value("namespace")) {
            return ReplError::NamespaceNotFound(namespace.to_string());
        }
    }
    ReplError::Runtime(interp.inspect(thrown, options))
}

fn error_output(err: &ReplError, namespace_id: &str, code: &str) -> ReplOutput {
    let input = match err {
        ReplError::SessionNotFound(_) | ReplError::SourceUnreadable { .. } => None,
        _ => Some(code.to_owned()),
    };
    ReplOutput::Error {
        text: err.to_string(),
        namespace_id: namespace_id.to_owned(),
        input,
        error_kind: err.kind(),
    }
}
