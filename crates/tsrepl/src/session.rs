//! Sessions and the registry that owns them.
//!
//! A [`SessionRegistry`] plays the part of one host process: it owns the interpreter, the
//! event loop every session shares, and the module cache. Sessions group namespaces and
//! remember which one evaluations target by default.
//!
//! The registry is single-threaded. Embedders create one and keep it for as long as they
//! serve requests; nothing here is global.

use std::{
    path::{Path, PathBuf},
    rc::Rc,
    time::Instant,
};

use indexmap::{IndexMap, IndexSet};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    config::{EngineConfig, InspectOptions},
    events::{DefinitionsChange, ReplEvent, ReplObserver, ReplOutput},
    fs::{FileSystem, OsFileSystem},
    interp::{ConsoleLevel, ConsoleLine, Interp, ObjRef, Throw, Value},
    modules::NamespaceDirectory,
    namespace::Namespace,
    repl_error::ReplError,
};

// =============================================================================
// Output types
// =============================================================================

/// Summary of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub current_namespace: String,
    /// Namespace ids in creation order.
    pub namespaces: Vec<String>,
}

// =============================================================================
// Session state
// =============================================================================

pub(crate) struct Session {
    pub id: String,
    pub name: Option<String>,
    pub current_namespace: String,
    pub namespaces: IndexMap<String, Namespace>,
    /// Sandbox globals by namespace id, shared with every `require` of the session.
    pub directory: NamespaceDirectory,
}

impl Session {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            current_namespace: self.current_namespace.clone(),
            namespaces: self.namespaces.keys().cloned().collect(),
        }
    }
}

/// Owns every session, the interpreter they run on, and the registry-wide subscribers.
///
/// Evaluation runs on the caller's thread and nested script calls consume its stack.
/// [`EngineConfig::recursion_limit`] must fit that stack: the default suits a 2 MiB thread,
/// larger limits need a thread built with `std::thread::Builder::stack_size`.
pub struct SessionRegistry {
    pub(crate) config: EngineConfig,
    pub(crate) fs: Rc<dyn FileSystem>,
    pub(crate) interp: Interp,
    pub(crate) sessions: IndexMap<String, Session>,
    /// Observers receiving uncaught faults from every session.
    subscribers: Vec<Box<dyn ReplObserver>>,
    /// Files reported changed since the last evaluation.
    pending_invalidations: IndexSet<PathBuf>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SessionRegistry {
    /// Creates a registry reading modules from the real filesystem.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_file_system(config, Rc::new(OsFileSystem))
    }

    /// Creates a registry reading modules through `fs`.
    #[must_use]
    pub fn with_file_system(config: EngineConfig, fs: Rc<dyn FileSystem>) -> Self {
        let mut interp = Interp::new(config.recursion_limit);
        interp.inspect_options = config.inspect.clone();
        Self {
            config,
            fs,
            interp,
            sessions: IndexMap::new(),
            subscribers: Vec::new(),
            pending_invalidations: IndexSet::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

// =============================================================================
// Session lifecycle
// =============================================================================

impl SessionRegistry {
    /// Creates a session and returns its id.
    ///
    /// Without an `id` a UUID v4 is generated. Creating a session whose id is already taken
    /// keeps the existing session and only updates its name when one is given.
    pub fn create_session(&mut self, name: Option<&str>, id: Option<&str>) -> String {
        let id = id.map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned);
        if let Some(existing) = self.sessions.get_mut(&id) {
            if let Some(name) = name {
                existing.name = Some(name.to_owned());
            }
            return id;
        }
        info!("created session {id}");
        self.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                name: name.map(str::to_owned),
                current_namespace: self.config.default_namespace.clone(),
                namespaces: IndexMap::new(),
                directory: NamespaceDirectory::default(),
            },
        );
        id
    }

    /// Checks that a session exists and describes it.
    pub fn connect(&self, session_id: &str) -> Result<SessionInfo, ReplError> {
        let session = self.session(session_id)?;
        info!("connected to session {session_id}");
        Ok(session.info())
    }

    #[must_use]
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.values().map(Session::info).collect()
    }

    /// Points the session's default evaluation target at `namespace_id`.
    ///
    /// No sandbox is created; that happens on the first evaluation against it.
    pub fn set_current_namespace(
        &mut self,
        session_id: &str,
        namespace_id: &str,
        sink: &mut dyn ReplObserver,
    ) -> Result<(), ReplError> {
        let session = self.session_mut(session_id)?;
        session.current_namespace = namespace_id.to_owned();
        debug!("session {session_id} now targets {namespace_id}");
        sink.on_event(&ReplEvent::NamespaceChanged {
            session_id: session_id.to_owned(),
            namespace_id: namespace_id.to_owned(),
        });
        Ok(())
    }

    pub fn current_namespace(&self, session_id: &str) -> Result<String, ReplError> {
        Ok(self.session(session_id)?.current_namespace.clone())
    }

    /// Drops every namespace of the session together with its pending timers and jobs.
    pub fn reset_session(&mut self, session_id: &str, sink: &mut dyn ReplObserver) -> Result<(), ReplError> {
        let session = self.sessions.get_mut(session_id).ok_or_else(|| ReplError::SessionNotFound(session_id.to_owned()))?;
        session.namespaces.clear();
        session.directory.borrow_mut().clear();
        session.current_namespace.clone_from(&self.config.default_namespace);
        self.interp.event_loop.cancel_origin(session_id);
        info!("reset session {session_id}");
        sink.on_event(&ReplEvent::Reset {
            session_id: session_id.to_owned(),
        });
        Ok(())
    }

    /// Removes `symbol` from a namespace.
    ///
    /// A symbol that is not defined is logged and otherwise ignored.
    pub fn unmap_symbol(
        &mut self,
        session_id: &str,
        namespace_id: &str,
        symbol: &str,
        sink: &mut dyn ReplObserver,
    ) -> Result<(), ReplError> {
        let config = &self.config;
        let session = self.sessions.get_mut(session_id).ok_or_else(|| ReplError::SessionNotFound(session_id.to_owned()))?;
        let removed = session.namespaces.get_mut(namespace_id).is_some_and(|namespace| {
            namespace.sync_definitions(config);
            namespace.unmap(symbol)
        });
        if !removed {
            warn!("cannot unmap {symbol}: not defined in {namespace_id}");
            return Ok(());
        }
        debug!("unmapped {symbol} from {namespace_id}");
        sink.on_event(&ReplEvent::DefinitionsChanged(DefinitionsChange {
            session_id: session_id.to_owned(),
            namespace_id: namespace_id.to_owned(),
            removed: vec![symbol.to_owned()],
            ..DefinitionsChange::default()
        }));
        Ok(())
    }

    /// Namespace ids of a session, in creation order.
    pub fn list_namespaces(&self, session_id: &str) -> Result<Vec<String>, ReplError> {
        Ok(self.session(session_id)?.namespaces.keys().cloned().collect())
    }

    /// A namespace's definitions with their formatted values, in definition order.
    pub fn definitions(&mut self, session_id: &str, namespace_id: &str) -> Result<IndexMap<String, String>, ReplError> {
        let session = self.sessions.get_mut(session_id).ok_or_else(|| ReplError::SessionNotFound(session_id.to_owned()))?;
        let namespace = session
            .namespaces
            .get_mut(namespace_id)
            .ok_or_else(|| ReplError::NamespaceNotFound(namespace_id.to_owned()))?;
        namespace.sync_definitions(&self.config);
        let global = namespace.global().clone();
        let names: Vec<String> = namespace.definitions.iter().cloned().collect();
        let options = self.config.inspect.clone();
        Ok(names
            .into_iter()
            .map(|name| {
                let text = render_binding(&mut self.interp, &global, &name, &options);
                (name, text)
            })
            .collect())
    }

    fn session(&self, session_id: &str) -> Result<&Session, ReplError> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| ReplError::SessionNotFound(session_id.to_owned()))
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut Session, ReplError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| ReplError::SessionNotFound(session_id.to_owned()))
    }
}

// =============================================================================
// Event loop and subscribers
// =============================================================================

impl SessionRegistry {
    /// Registers an observer for uncaught faults of every session.
    pub fn subscribe(&mut self, observer: Box<dyn ReplObserver>) {
        self.subscribers.push(observer);
    }

    /// Runs due timers and pending microtasks, then delivers their console output to
    /// `sink` and their faults to subscribers.
    pub fn poll(&mut self, sink: &mut dyn ReplObserver) {
        self.interp.run_due_timers();
        dispatch_console(&mut self.interp, sink);
        self.dispatch_faults();
    }

    /// When the earliest pending timer is due, if any.
    #[must_use]
    pub fn next_timer_due(&self) -> Option<Instant> {
        self.interp.event_loop.next_timer_due()
    }

    /// Records that `path` changed on disk.
    ///
    /// Cached resolutions and loaded modules for it are dropped before the next evaluation.
    pub fn file_changed(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if let Ok(canonical) = self.fs.canonicalize(path) {
            self.pending_invalidations.insert(canonical);
        }
        self.pending_invalidations.insert(path.to_path_buf());
    }

    pub(crate) fn apply_invalidations(&mut self) {
        if self.pending_invalidations.is_empty() {
            return;
        }
        let paths: Vec<PathBuf> = self.pending_invalidations.drain(..).collect();
        for path in &paths {
            if self.interp.modules.remove(path).is_some() {
                debug!("evicted module {}", path.display());
            }
        }
        for session in self.sessions.values() {
            for namespace in session.namespaces.values() {
                namespace.resolver.borrow_mut().evict(&paths);
            }
        }
    }

    pub(crate) fn broadcast(&mut self, event: &ReplEvent) {
        for subscriber in &mut self.subscribers {
            subscriber.on_event(event);
        }
    }

    /// Sends collected faults to subscribers as [`ReplEvent::UncaughtFault`].
    ///
    /// Faults of sessions that no longer exist are only logged.
    pub(crate) fn dispatch_faults(&mut self) {
        let options = self.config.inspect.clone();
        for fault in self.interp.take_faults() {
            let text = self.interp.inspect(&fault.value, &options);
            let Some(origin) = fault.origin else {
                error!("uncaught {}: {text}", fault.kind);
                continue;
            };
            error!(
                "uncaught {} in {} ({}): {text}",
                fault.kind, origin.namespace_id, origin.session_id
            );
            if !self.sessions.contains_key(&origin.session_id) {
                continue;
            }
            let event = ReplEvent::UncaughtFault {
                session_id: origin.session_id.clone(),
                namespace_id: origin.namespace_id.clone(),
                fault: fault.kind,
                text,
            };
            self.broadcast(&event);
        }
    }
}

/// Sends buffered console lines to `sink` as print output.
pub(crate) fn dispatch_console(interp: &mut Interp, sink: &mut dyn ReplObserver) {
    for line in interp.take_console() {
        let namespace_id = line.origin.as_ref().map(|origin| origin.namespace_id.clone()).unwrap_or_default();
        sink.on_event(&ReplEvent::Output(ReplOutput::Print {
            text: line.text,
            namespace_id,
            input: None,
        }));
    }
}

/// Writes buffered console lines to the log instead of an observer.
pub(crate) fn log_console(interp: &mut Interp) {
    for ConsoleLine { origin, level, text } in interp.take_console() {
        let namespace = origin.as_ref().map_or("<host>", |origin| origin.namespace_id.as_str());
        match level {
            ConsoleLevel::Error => error!("[{namespace}] {text}"),
            ConsoleLevel::Warn => warn!("[{namespace}] {text}"),
            ConsoleLevel::Debug => debug!("[{namespace}] {text}"),
            ConsoleLevel::Log | ConsoleLevel::Info => info!("[{namespace}] {text}"),
        }
    }
}

/// Formats the current value of a sandbox binding, running its getter if it has one.
pub(crate) fn render_binding(interp: &mut Interp, global: &ObjRef, name: &str, options: &InspectOptions) -> String {
    match interp.get(&Value::Object(global.clone()), name) {
        Ok(value) => interp.inspect(&value, options),
        Err(Throw(thrown)) => format!("<Inspection threw ({})>", interp.inspect(&thrown, options)),
    }
}
