//! Globals the host process provides outside the language intrinsics: timers, the
//! microtask scheduler, `performance`, `structuredClone` and `process`.
//!
//! These live on the host realm's global object only. Namespace sandboxes receive them by
//! copying every host global that is not part of the intrinsics baseline.

use std::time::Duration;

use ahash::AHashMap;
use indexmap::{IndexMap, IndexSet};

use super::{Installer, arg};
use crate::interp::{
    ErrorType, Interp, JsResult,
    event_loop::Job,
    object::{Class, JsObject, ObjRef, Property, Slot},
    value::{HashKey, Value},
};

/// Longest delay a timer accepts; larger values fire after 1ms, as in Node.
const MAX_DELAY_MS: f64 = 2_147_483_647.0;

pub(crate) fn install_host_globals(interp: &mut Interp) {
    let host = interp.host.clone();
    let global = &host.global;
    let installer = Installer {
        function_proto: &host.intrinsics.function_proto,
    };
    installer.method(global, "setTimeout", 2, |interp, _, args| schedule(interp, args, false));
    installer.method(global, "setInterval", 2, |interp, _, args| schedule(interp, args, true));
    installer.method(global, "setImmediate", 1, set_immediate);
    for name in ["clearTimeout", "clearInterval", "clearImmediate"] {
        installer.method(global, name, 1, clear);
    }
    installer.method(global, "queueMicrotask", 1, queue_microtask);
    installer.method(global, "structuredClone", 1, |interp, _, args| {
        structured_clone(interp, &arg(args, 0))
    });

    let performance = ObjRef::new(JsObject::new(Class::Ordinary, Some(host.intrinsics.object_proto.clone())));
    installer.method(&performance, "now", 0, |interp, _, _| {
        Ok(Value::Number(interp.started.elapsed().as_secs_f64() * 1000.0))
    });
    global.define_hidden("performance", performance);

    global.define_hidden("process", make_process(interp, &installer));
}

fn make_process(interp: &Interp, installer: &Installer<'_>) -> ObjRef {
    let process = interp.new_object();
    let platform = match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    };
    process.define_data("platform", platform);
    process.define_data("version", format!("v{}", env!("CARGO_PKG_VERSION")));
    let env = interp.new_object();
    for (key, value) in std::env::vars() {
        env.define_data(&key, value);
    }
    process.define_data("env", env);
    let argv = interp.new_array(std::env::args().map(Value::from).collect());
    process.define_data("argv", argv);
    installer.method(&process, "cwd", 0, |interp, _, _| {
        let cwd = std::env::current_dir().map_err(|err| interp.type_error(format!("process.cwd failed: {err}")))?;
        Ok(Value::from(cwd.to_string_lossy().into_owned()))
    });
    installer.method(&process, "nextTick", 1, queue_microtask_with_args);
    process
}

fn require_callback(interp: &Interp, callback: &Value) -> JsResult<()> {
    if callback.is_callable() {
        Ok(())
    } else {
        Err(interp.type_error(format!(
            "The \"callback\" argument must be of type function. Received {}",
            interp.describe_for_error(callback)
        )))
    }
}

fn schedule(interp: &mut Interp, args: &[Value], repeat: bool) -> JsResult<Value> {
    let callback = arg(args, 0);
    require_callback(interp, &callback)?;
    let delay = interp.to_number(&arg(args, 1))?;
    let delay = if delay.is_nan() || !(1.0..=MAX_DELAY_MS).contains(&delay) {
        1.0
    } else {
        delay
    };
    let extra = args.get(2..).unwrap_or_default().to_vec();
    let id = interp.schedule_timer(callback, Duration::from_secs_f64(delay / 1000.0), extra, repeat);
    Ok(Value::from(id as f64))
}

fn set_immediate(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let callback = arg(args, 0);
    require_callback(interp, &callback)?;
    let extra = args.get(1..).unwrap_or_default().to_vec();
    let id = interp.schedule_timer(callback, Duration::ZERO, extra, false);
    Ok(Value::from(id as f64))
}

fn clear(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    if let Value::Number(id) = arg(args, 0) {
        if id.is_finite() && id >= 0.0 && id.fract() == 0.0 {
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "checked integral and non-negative")]
            let id = id as u64;
            interp.clear_timer(id);
        }
    }
    Ok(Value::Undefined)
}

fn queue_microtask(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let callback = arg(args, 0);
    require_callback(interp, &callback)?;
    interp.enqueue_job(Job::Callback {
        callback,
        args: Vec::new(),
    });
    Ok(Value::Undefined)
}

fn queue_microtask_with_args(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let callback = arg(args, 0);
    require_callback(interp, &callback)?;
    interp.enqueue_job(Job::Callback {
        callback,
        args: args.get(1..).unwrap_or_default().to_vec(),
    });
    Ok(Value::Undefined)
}

/// Deep copy of plain data: primitives, plain objects, arrays, `Map`, `Set`, `Date`,
/// `RegExp`, errors and boxed primitives. Shared and cyclic references are preserved.
/// Clones are allocated in the current realm.
pub(crate) fn structured_clone(interp: &mut Interp, value: &Value) -> JsResult<Value> {
    let mut memo = AHashMap::new();
    clone_value(interp, value, &mut memo)
}

fn clone_value(interp: &mut Interp, value: &Value, memo: &mut AHashMap<usize, ObjRef>) -> JsResult<Value> {
    let Value::Object(source) = value else {
        return Ok(value.clone());
    };
    if let Some(copy) = memo.get(&source.addr()) {
        return Ok(Value::Object(copy.clone()));
    }
    let intrinsics = &interp.realm.intrinsics;
    let shell = |class: Class, proto: &ObjRef| ObjRef::new(JsObject::new(class, Some(proto.clone())));
    let copy = match &source.borrow().class {
        Class::Ordinary => Some(shell(Class::Ordinary, &intrinsics.object_proto)),
        Class::Array(_) => Some(shell(Class::Array(Vec::new()), &intrinsics.array_proto)),
        Class::Map(_) => Some(shell(Class::Map(IndexMap::default()), &intrinsics.map_proto)),
        Class::Set(_) => Some(shell(Class::Set(IndexSet::default()), &intrinsics.set_proto)),
        Class::Date(time) => Some(shell(Class::Date(*time), &intrinsics.date_proto)),
        Class::RegExp(data) => Some(shell(Class::RegExp(data.clone()), &intrinsics.regexp_proto)),
        Class::Boolean(b) => Some(shell(Class::Boolean(*b), &intrinsics.boolean_proto)),
        Class::Number(n) => Some(shell(Class::Number(*n), &intrinsics.number_proto)),
        Class::String(s) => Some(shell(Class::String(s.clone()), &intrinsics.string_proto)),
        Class::Error => Some(shell(Class::Error, &intrinsics.error_proto)),
        Class::Function(_) | Class::Promise(_) | Class::Iterator(_) => None,
    };
    let Some(copy) = copy else {
        let text = interp.describe_for_error(value);
        return Err(interp.throw(ErrorType::Error, format!("{text} could not be cloned.")));
    };
    memo.insert(source.addr(), copy.clone());

    let items = source.borrow().array_items().cloned();
    if let Some(items) = items {
        let mut cloned = Vec::with_capacity(items.len());
        for item in &items {
            cloned.push(clone_value(interp, item, memo)?);
        }
        let holes = source.borrow().holes.clone();
        let mut copy = copy.borrow_mut();
        copy.class = Class::Array(cloned);
        copy.holes = holes;
    }
    let entries: Option<Vec<(Value, Value)>> = match &source.borrow().class {
        Class::Map(entries) => Some(entries.iter().map(|(k, v)| (k.0.clone(), v.clone())).collect()),
        Class::Set(items) => Some(items.iter().map(|k| (k.0.clone(), Value::Undefined)).collect()),
        _ => None,
    };
    for (key, entry_value) in entries.unwrap_or_default() {
        let key = HashKey(clone_value(interp, &key, memo)?);
        let entry_value = clone_value(interp, &entry_value, memo)?;
        match &mut copy.borrow_mut().class {
            Class::Map(map) => {
                map.insert(key, entry_value);
            }
            Class::Set(set) => {
                set.insert(key);
            }
            _ => {}
        }
    }

    if source.is_error() {
        for key in ["name", "message", "stack", "cause"] {
            if let Some(Value::String(text)) = source.lookup(key).and_then(|p| p.value().cloned()) {
                copy.define(key, Property::hidden(Value::String(text)));
            }
        }
    }
    let keys = source.borrow().own_enumerable_keys();
    let skip_indices = source.is_array();
    for key in keys {
        if skip_indices && crate::interp::object::array_index(&key).is_some() {
            continue;
        }
        let Some(prop) = source.get_own(&key) else { continue };
        let field = match prop.slot {
            Slot::Data(field) => field,
            Slot::Accessor { .. } => interp.get(value, &key)?,
        };
        let field = clone_value(interp, &field, memo)?;
        copy.define_data(&key, field);
    }
    Ok(Value::Object(copy))
}
