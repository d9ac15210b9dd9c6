use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult, Throw,
    function::{NativeFn, native_function},
    object::{Class, ObjRef},
    promise::PromiseData,
    realm::Intrinsics,
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.promise_proto;
    let ctor = installer.constructor("Promise", 1, None, construct, proto);
    installer.method(&ctor, "resolve", 1, |interp, _, args| {
        Ok(Value::Object(interp.promise_resolve(arg(args, 0))))
    });
    installer.method(&ctor, "reject", 1, |interp, _, args| {
        let promise = interp.new_promise();
        interp.reject_promise(&promise, arg(args, 0));
        Ok(Value::Object(promise))
    });
    installer.method(&ctor, "withResolvers", 0, with_resolvers);
    installer.method(&ctor, "all", 1, |interp, _, args| combine(interp, &arg(args, 0), Combinator::All));
    installer.method(&ctor, "allSettled", 1, |interp, _, args| {
        combine(interp, &arg(args, 0), Combinator::AllSettled)
    });
    installer.method(&ctor, "race", 1, race);
    global.define_hidden("Promise", ctor);

    installer.method(proto, "then", 2, |interp, this, args| {
        then(interp, this, arg(args, 0), arg(args, 1))
    });
    installer.method(proto, "catch", 1, |interp, this, args| {
        let on_rejected = arg(args, 0);
        let then_method = interp.get(this, "then")?;
        interp.call(&then_method, this.clone(), &[Value::Undefined, on_rejected])
    });
    installer.method(proto, "finally", 1, finally);
}

fn construct(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(interp.type_error(format!(
            "Promise resolver {} is not a function",
            interp.describe_for_error(&executor)
        )));
    }
    let Value::Object(promise) = this else {
        return Ok(this.clone());
    };
    promise.borrow_mut().class = Class::Promise(PromiseData::new());
    let (resolve, reject) = interp.resolving_functions(promise);
    let result = interp.call(
        &executor,
        Value::Undefined,
        &[Value::Object(resolve), Value::Object(reject.clone())],
    );
    if let Err(Throw(reason)) = result {
        interp.call(&Value::Object(reject), Value::Undefined, &[reason])?;
    }
    Ok(this.clone())
}

fn this_promise(interp: &Interp, this: &Value, method: &str) -> JsResult<ObjRef> {
    match this {
        Value::Object(obj) if obj.is_promise() => Ok(obj.clone()),
        _ => Err(interp.type_error(format!(
            "Method Promise.prototype.{method} called on incompatible receiver {}",
            interp.describe_for_error(this)
        ))),
    }
}

fn then(interp: &mut Interp, this: &Value, on_fulfilled: Value, on_rejected: Value) -> JsResult<Value> {
    let promise = this_promise(interp, this, "then")?;
    let derived = interp.new_promise();
    interp.promise_then(&promise, on_fulfilled, on_rejected, Some(derived.clone()));
    Ok(Value::Object(derived))
}

fn native(interp: &Interp, length: usize, f: NativeFn) -> Value {
    Value::Object(native_function(&interp.realm.intrinsics.function_proto, "", length, Some(f), None))
}

/// `finally(f)`: runs `f` on either outcome, waits for what it returns, then passes the
/// original outcome through unless `f` failed.
fn finally(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let on_finally = arg(args, 0);
    if !on_finally.is_callable() {
        return then(interp, this, on_finally.clone(), on_finally);
    }
    let settle_after = |on_finally: Value, rejected: bool| -> NativeFn {
        Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
            let outcome = arg(args, 0);
            let result = interp.call(&on_finally, Value::Undefined, &[])?;
            let waited = interp.promise_resolve(result);
            let pass: NativeFn = Rc::new(move |_interp: &mut Interp, _this: &Value, _args: &[Value]| {
                if rejected {
                    Err(Throw(outcome.clone()))
                } else {
                    Ok(outcome.clone())
                }
            });
            let pass = native(interp, 0, pass);
            let derived = interp.new_promise();
            interp.promise_then(&waited, pass, Value::Undefined, Some(derived.clone()));
            Ok(Value::Object(derived))
        })
    };
    let on_fulfilled = native(interp, 1, settle_after(on_finally.clone(), false));
    let on_rejected = native(interp, 1, settle_after(on_finally, true));
    then(interp, this, on_fulfilled, on_rejected)
}

fn with_resolvers(interp: &mut Interp, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    let promise = interp.new_promise();
    let (resolve, reject) = interp.resolving_functions(&promise);
    let out = interp.new_object();
    out.define_data("promise", promise);
    out.define_data("resolve", resolve);
    out.define_data("reject", reject);
    Ok(Value::Object(out))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Combinator {
    All,
    AllSettled,
}

/// Shared bookkeeping for `Promise.all` and `Promise.allSettled`.
struct Gather {
    result: ObjRef,
    values: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
}

impl Gather {
    fn store(&self, interp: &mut Interp, index: usize, value: Value) {
        if let Some(slot) = self.values.borrow_mut().get_mut(index) {
            *slot = value;
        }
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        if remaining == 0 {
            let values = self.values.borrow().clone();
            let array = interp.new_array(values);
            interp.resolve_promise(&self.result, Value::Object(array));
        }
    }
}

fn combine(interp: &mut Interp, iterable: &Value, combinator: Combinator) -> JsResult<Value> {
    let result = interp.new_promise();
    let items = match interp.collect_iterable(iterable) {
        Ok(items) => items,
        Err(Throw(reason)) => {
            interp.reject_promise(&result, reason);
            return Ok(Value::Object(result));
        }
    };
    if items.is_empty() {
        let array = interp.new_array(Vec::new());
        interp.resolve_promise(&result, Value::Object(array));
        return Ok(Value::Object(result));
    }
    let gather = Rc::new(Gather {
        result: result.clone(),
        values: RefCell::new(vec![Value::Undefined; items.len()]),
        remaining: Cell::new(items.len()),
    });
    for (index, item) in items.into_iter().enumerate() {
        let promise = interp.promise_resolve(item);
        let fulfilled: NativeFn = {
            let gather = gather.clone();
            Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
                let value = arg(args, 0);
                let value = match combinator {
                    Combinator::All => value,
                    Combinator::AllSettled => settled_record(interp, "fulfilled", "value", value),
                };
                gather.store(interp, index, value);
                Ok(Value::Undefined)
            })
        };
        let rejected: NativeFn = {
            let gather = gather.clone();
            Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
                let reason = arg(args, 0);
                match combinator {
                    Combinator::All => interp.reject_promise(&gather.result, reason),
                    Combinator::AllSettled => {
                        let record = settled_record(interp, "rejected", "reason", reason);
                        gather.store(interp, index, record);
                    }
                }
                Ok(Value::Undefined)
            })
        };
        let on_fulfilled = native(interp, 1, fulfilled);
        let on_rejected = native(interp, 1, rejected);
        interp.promise_then(&promise, on_fulfilled, on_rejected, None);
    }
    Ok(Value::Object(result))
}

fn settled_record(interp: &Interp, status: &str, key: &str, value: Value) -> Value {
    let record = interp.new_object();
    record.define_data("status", status);
    record.define_data(key, value);
    Value::Object(record)
}

fn race(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let result = interp.new_promise();
    let items = match interp.collect_iterable(&arg(args, 0)) {
        Ok(items) => items,
        Err(Throw(reason)) => {
            interp.reject_promise(&result, reason);
            return Ok(Value::Object(result));
        }
    };
    let (resolve, reject) = interp.resolving_functions(&result);
    for item in items {
        let promise = interp.promise_resolve(item);
        interp.promise_then(
            &promise,
            Value::Object(resolve.clone()),
            Value::Object(reject.clone()),
            None,
        );
    }
    Ok(Value::Object(result))
}
