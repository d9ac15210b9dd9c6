//! Tree-walking interpreter that hosts namespace sandboxes.
//!
//! One [`Interp`] plays the part of a host process: it owns the host realm (whose global
//! object carries timers, `process` and friends), the event loop, and the module cache.
//! Each namespace gets its own [`Realm`] with fresh intrinsics; closures remember the realm
//! they were created in and switch to it while they run.
//!
//! Generated code is parsed and executed directly from the syntax tree. `await` is eager:
//! it drives the event loop until the awaited promise settles instead of suspending the
//! surrounding function.

mod builtins;
mod code;
mod convert;
mod eval;
mod event_loop;
mod function;
mod inspect;
mod iter;
mod object;
mod promise;
mod realm;
mod regexp;
mod scope;
mod value;

use std::{path::PathBuf, rc::Rc, time::Instant};

use ahash::AHashMap;

pub(crate) use self::{
    builtins::{from_json, make_console},
    convert::number_to_string,
    event_loop::{ConsoleLevel, ConsoleLine, Fault, Origin},
    function::{NativeFn, native_function},
    object::{Class, JsObject, ObjRef, Slot},
    realm::Realm,
    value::Value,
};
use self::code::{FunctionCode, SourceText};
use crate::{config::InspectOptions, syntax::Source};

pub(crate) type JsResult<T> = Result<T, Throw>;

/// A thrown JavaScript value travelling up the Rust stack.
#[derive(Debug, Clone)]
pub(crate) struct Throw(pub Value);

/// The built-in error constructors the interpreter raises itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub(crate) enum ErrorType {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
    ReferenceError,
}

pub(crate) struct Interp {
    /// The realm host globals and filesystem modules live in.
    pub(crate) host: Rc<Realm>,
    /// The realm of the running code; natives allocate here.
    pub(crate) realm: Rc<Realm>,
    pub(crate) event_loop: event_loop::EventLoop,
    /// Loaded filesystem modules keyed by resolved path, shared by every namespace.
    pub(crate) modules: AHashMap<PathBuf, ObjRef>,
    /// Session and namespace charged with faults raised by the running code.
    pub(crate) origin: Option<Rc<Origin>>,
    /// File name reported in error stacks.
    pub(crate) filename: Rc<str>,
    pub(crate) console: Vec<ConsoleLine>,
    pub(crate) faults: Vec<Fault>,
    /// Promises rejected while nothing was listening.
    pub(crate) unhandled: Vec<(ObjRef, Option<Rc<Origin>>)>,
    pub(crate) started: Instant,
    /// Layout used by `console` methods.
    pub(crate) inspect_options: InspectOptions,
    depth: usize,
    recursion_limit: usize,
    /// Value of the last expression statement of the running script.
    completion: Value,
    /// Syntax of the running function; new closures are cut out of it.
    code: Rc<FunctionCode>,
}

impl Interp {
    pub fn new(recursion_limit: usize) -> Self {
        let host = Realm::new();
        let mut interp = Self {
            realm: host.clone(),
            host,
            event_loop: event_loop::EventLoop::default(),
            modules: AHashMap::new(),
            origin: None,
            filename: "<host>".into(),
            console: Vec::new(),
            faults: Vec::new(),
            unhandled: Vec::new(),
            started: Instant::now(),
            inspect_options: InspectOptions::default(),
            depth: 0,
            recursion_limit,
            completion: Value::Undefined,
            code: Rc::default(),
        };
        builtins::install_host_globals(&mut interp);
        interp
    }

    /// Creates a realm with fresh intrinsics.
    pub fn new_realm(&self) -> Rc<Realm> {
        Realm::new()
    }

    /// Parses and runs `code` as a script whose top-level scope is `realm`'s global.
    ///
    /// Returns the completion value: the argument of a top-level `return`, otherwise the
    /// value of the last expression statement executed.
    pub fn run_script(&mut self, code: &str, realm: &Rc<Realm>, filename: &str) -> JsResult<Value> {
        let source = Source::new(code);
        let script = source.parse_script().map_err(|err| {
            let loc = err.loc();
            self.throw(
                ErrorType::SyntaxError,
                format!("{} ({}:{})", err.message(), loc.line, loc.column),
            )
        })?;
        let text = SourceText {
            text: code.into(),
            start_pos: source.start_pos(),
        };
        let unit = Rc::new(FunctionCode::script(script.body, Rc::new(text)));
        let saved_realm = std::mem::replace(&mut self.realm, realm.clone());
        let saved_filename = std::mem::replace(&mut self.filename, filename.into());
        let saved_completion = std::mem::take(&mut self.completion);
        let saved_code = std::mem::replace(&mut self.code, unit.clone());
        let scope = realm.global_scope.clone();
        let result = match &unit.body {
            code::CodeBody::Block(stmts) => self.run_statements(stmts, &scope),
            code::CodeBody::Expr(_) => Ok(eval::Flow::Normal),
        };
        let completion = std::mem::replace(&mut self.completion, saved_completion);
        self.code = saved_code;
        self.realm = saved_realm;
        self.filename = saved_filename;
        match result? {
            eval::Flow::Return(value) => Ok(value),
            _ => Ok(completion),
        }
    }

    /// Builds an error object of the given type in the current realm.
    pub fn make_error(&self, kind: ErrorType, msg: &str) -> ObjRef {
        let proto = self.realm.intrinsics.error_proto(kind).clone();
        let error = ObjRef::new(JsObject::new(Class::Error, Some(proto)));
        error.define_hidden("message", msg);
        error.define_hidden("stack", self.stack_text(kind.into(), msg));
        error
    }

    /// The `stack` text of an error raised now: the header and a single frame naming the
    /// running file.
    pub fn stack_text(&self, name: &str, msg: &str) -> String {
        let header = if msg.is_empty() {
            name.to_owned()
        } else {
            format!("{name}: {msg}")
        };
        format!("{header}\n    at {}", self.filename)
    }

    pub fn throw(&self, kind: ErrorType, msg: impl AsRef<str>) -> Throw {
        Throw(Value::Object(self.make_error(kind, msg.as_ref())))
    }

    pub fn type_error(&self, msg: impl AsRef<str>) -> Throw {
        self.throw(ErrorType::TypeError, msg)
    }

    pub fn range_error(&self, msg: impl AsRef<str>) -> Throw {
        self.throw(ErrorType::RangeError, msg)
    }

    pub fn reference_error(&self, msg: impl AsRef<str>) -> Throw {
        self.throw(ErrorType::ReferenceError, msg)
    }

    pub fn syntax_error(&self, msg: impl AsRef<str>) -> Throw {
        self.throw(ErrorType::SyntaxError, msg)
    }

    /// Allocates an ordinary object inheriting from the current realm's `Object.prototype`.
    pub fn new_object(&self) -> ObjRef {
        ObjRef::new(JsObject::new(
            Class::Ordinary,
            Some(self.realm.intrinsics.object_proto.clone()),
        ))
    }

    pub fn new_array(&self, items: Vec<Value>) -> ObjRef {
        ObjRef::new(JsObject::new(
            Class::Array(items),
            Some(self.realm.intrinsics.array_proto.clone()),
        ))
    }

    /// Enters a call frame, failing once the configured recursion limit is reached.
    fn enter_frame(&mut self) -> JsResult<()> {
        if self.depth >= self.recursion_limit {
            return Err(self.range_error("Maximum call stack size exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_frame(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Runs `f` with faults and scheduled work charged to `origin`.
    pub fn with_origin<T>(&mut self, origin: Option<Rc<Origin>>, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.origin, origin);
        let result = f(self);
        self.origin = saved;
        result
    }

    pub fn take_console(&mut self) -> Vec<ConsoleLine> {
        std::mem::take(&mut self.console)
    }

    pub fn take_faults(&mut self) -> Vec<Fault> {
        std::mem::take(&mut self.faults)
    }
}
