//! Promise state, reactions and the eager `await`.

use std::{cell::Cell, rc::Rc};

use super::{
    Interp, JsResult, Throw,
    event_loop::Job,
    function::{NativeFn, native_function},
    object::{Class, JsObject, ObjRef},
    value::Value,
};

#[derive(Debug, Clone)]
pub(crate) enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

pub(crate) struct PromiseData {
    pub state: PromiseState,
    /// Whether anything ever listened for the outcome.
    pub handled: bool,
    reactions: Vec<Reaction>,
}

struct Reaction {
    on_fulfilled: Value,
    on_rejected: Value,
    derived: Option<ObjRef>,
}

impl PromiseData {
    pub(crate) fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            handled: false,
            reactions: Vec::new(),
        }
    }
}

impl ObjRef {
    pub(crate) fn promise_state(&self) -> Option<PromiseState> {
        match &self.borrow().class {
            Class::Promise(data) => Some(data.state.clone()),
            _ => None,
        }
    }

    pub(crate) fn is_promise(&self) -> bool {
        matches!(self.borrow().class, Class::Promise(_))
    }

    fn is_pending_promise(&self) -> bool {
        matches!(self.promise_state(), Some(PromiseState::Pending))
    }

    pub(crate) fn mark_handled(&self) {
        if let Class::Promise(data) = &mut self.borrow_mut().class {
            data.handled = true;
        }
    }

    /// The rejection reason when this promise is rejected and nobody has listened.
    pub(crate) fn unhandled_reason(&self) -> Option<Value> {
        match &self.borrow().class {
            Class::Promise(PromiseData {
                state: PromiseState::Rejected(reason),
                handled: false,
                ..
            }) => Some(reason.clone()),
            _ => None,
        }
    }
}

impl Interp {
    /// A pending promise in the current realm.
    pub(crate) fn new_promise(&self) -> ObjRef {
        self.new_promise_with_proto(self.realm.intrinsics.promise_proto.clone())
    }

    pub(crate) fn new_promise_with_proto(&self, proto: ObjRef) -> ObjRef {
        ObjRef::new(JsObject::new(Class::Promise(PromiseData::new()), Some(proto)))
    }

    /// `Promise.resolve(value)`: promises pass through, anything else is wrapped.
    pub(crate) fn promise_resolve(&mut self, value: Value) -> ObjRef {
        if let Value::Object(obj) = &value {
            if obj.is_promise() {
                return obj.clone();
            }
        }
        let promise = self.new_promise();
        self.resolve_promise(&promise, value);
        promise
    }

    /// Resolves `promise` with `value`, adopting the state of thenables.
    pub(crate) fn resolve_promise(&mut self, promise: &ObjRef, value: Value) {
        if !promise.is_pending_promise() {
            return;
        }
        if let Value::Object(obj) = &value {
            if obj.ptr_eq(promise) {
                let error = self.type_error("Chaining cycle detected for promise #<Promise>");
                self.reject_promise(promise, error.0);
                return;
            }
            let then = match self.get(&value, "then") {
                Ok(then) => then,
                Err(thrown) => {
                    self.reject_promise(promise, thrown.0);
                    return;
                }
            };
            if then.is_callable() {
                self.enqueue_job(Job::ResolveThenable {
                    promise: promise.clone(),
                    thenable: value,
                    then,
                });
                return;
            }
        }
        self.settle(promise, PromiseState::Fulfilled(value));
    }

    pub(crate) fn reject_promise(&mut self, promise: &ObjRef, reason: Value) {
        if promise.is_pending_promise() {
            self.settle(promise, PromiseState::Rejected(reason));
        }
    }

    fn settle(&mut self, promise: &ObjRef, state: PromiseState) {
        let (reactions, handled) = {
            let mut obj = promise.borrow_mut();
            let Class::Promise(data) = &mut obj.class else { return };
            data.state = state.clone();
            (std::mem::take(&mut data.reactions), data.handled)
        };
        if let PromiseState::Rejected(_) = state {
            if !handled {
                self.unhandled.push((promise.clone(), self.origin.clone()));
            }
        }
        for reaction in reactions {
            self.enqueue_reaction(reaction, &state);
        }
    }

    fn enqueue_reaction(&mut self, reaction: Reaction, state: &PromiseState) {
        let (handler, argument, rejected) = match state {
            PromiseState::Fulfilled(value) => (reaction.on_fulfilled, value.clone(), false),
            PromiseState::Rejected(reason) => (reaction.on_rejected, reason.clone(), true),
            PromiseState::Pending => return,
        };
        self.enqueue_job(Job::Reaction {
            handler,
            argument,
            rejected,
            derived: reaction.derived,
        });
    }

    /// Registers reactions on `promise`; `derived` is settled with the handler's outcome.
    pub(crate) fn promise_then(
        &mut self,
        promise: &ObjRef,
        on_fulfilled: Value,
        on_rejected: Value,
        derived: Option<ObjRef>,
    ) {
        let reaction = Reaction {
            on_fulfilled,
            on_rejected,
            derived,
        };
        let settled = {
            let mut obj = promise.borrow_mut();
            let Class::Promise(data) = &mut obj.class else { return };
            data.handled = true;
            match &data.state {
                PromiseState::Pending => {
                    data.reactions.push(reaction);
                    return;
                }
                settled => settled.clone(),
            }
        };
        self.enqueue_reaction(reaction, &settled);
    }

    /// A `resolve`/`reject` pair for `promise`; only the first call of either counts.
    pub(crate) fn resolving_functions(&mut self, promise: &ObjRef) -> (ObjRef, ObjRef) {
        let already = Rc::new(Cell::new(false));
        let function_proto = self.realm.intrinsics.function_proto.clone();
        let resolve: NativeFn = {
            let (promise, already) = (promise.clone(), already.clone());
            Rc::new(move |interp, _, args| {
                if !already.replace(true) {
                    interp.resolve_promise(&promise, args.first().cloned().unwrap_or_default());
                }
                Ok(Value::Undefined)
            })
        };
        let reject: NativeFn = {
            let promise = promise.clone();
            Rc::new(move |interp, _, args| {
                if !already.replace(true) {
                    interp.reject_promise(&promise, args.first().cloned().unwrap_or_default());
                }
                Ok(Value::Undefined)
            })
        };
        (
            native_function(&function_proto, "", 1, Some(resolve), None),
            native_function(&function_proto, "", 1, Some(reject), None),
        )
    }

    /// `await value`: drives the event loop until the awaited promise settles.
    pub(crate) fn await_value(&mut self, value: Value) -> JsResult<Value> {
        let promise = match &value {
            Value::Object(obj) if obj.is_promise() => obj.clone(),
            Value::Object(_) if self.get(&value, "then")?.is_callable() => {
                let promise = self.new_promise();
                self.resolve_promise(&promise, value);
                promise
            }
            _ => {
                self.run_microtasks();
                return Ok(value);
            }
        };
        promise.mark_handled();
        self.run_microtasks();
        self.run_until(|_| !promise.is_pending_promise())?;
        match promise.promise_state() {
            Some(PromiseState::Fulfilled(value)) => Ok(value),
            Some(PromiseState::Rejected(reason)) => Err(Throw(reason)),
            _ => Ok(Value::Undefined),
        }
    }
}
