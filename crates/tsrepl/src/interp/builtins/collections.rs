//! `Map` and `Set`, keyed by SameValueZero in insertion order.

use indexmap::{IndexMap, IndexSet};

use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    iter::{IterCursor, IterKind},
    object::{Class, ObjRef},
    realm::Intrinsics,
    value::{HashKey, Value},
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let map_proto = &intrinsics.map_proto;
    let map = installer.constructor("Map", 0, None, map_construct, map_proto);
    global.define_hidden("Map", map);
    installer.method(map_proto, "get", 1, map_get);
    installer.method(map_proto, "set", 2, map_set);
    installer.method(map_proto, "has", 1, map_has);
    installer.method(map_proto, "delete", 1, map_delete);
    installer.method(map_proto, "clear", 0, map_clear);
    installer.method(map_proto, "forEach", 1, map_for_each);
    installer.method(map_proto, "keys", 0, |interp, this, _| map_iter(interp, this, IterKind::Keys));
    installer.method(map_proto, "values", 0, |interp, this, _| map_iter(interp, this, IterKind::Values));
    installer.method(map_proto, "entries", 0, |interp, this, _| map_iter(interp, this, IterKind::Entries));
    installer.getter(map_proto, "size", map_size);

    let set_proto = &intrinsics.set_proto;
    let set = installer.constructor("Set", 0, None, set_construct, set_proto);
    global.define_hidden("Set", set);
    installer.method(set_proto, "add", 1, set_add);
    installer.method(set_proto, "has", 1, set_has);
    installer.method(set_proto, "delete", 1, set_delete);
    installer.method(set_proto, "clear", 0, set_clear);
    installer.method(set_proto, "forEach", 1, set_for_each);
    installer.method(set_proto, "values", 0, |interp, this, _| set_iter(interp, this, IterKind::Values));
    installer.method(set_proto, "keys", 0, |interp, this, _| set_iter(interp, this, IterKind::Keys));
    installer.method(set_proto, "entries", 0, |interp, this, _| set_iter(interp, this, IterKind::Entries));
    installer.getter(set_proto, "size", set_size);
}

/// Normalises `-0` to `+0` so keys print the way they compare.
fn key_of(value: Value) -> HashKey {
    match value {
        Value::Number(n) if n.to_bits() == (-0.0f64).to_bits() => HashKey(Value::Number(0.0)),
        other => HashKey(other),
    }
}

fn incompatible(interp: &Interp, method: &str, this: &Value) -> crate::interp::Throw {
    interp.type_error(format!(
        "Method {method} called on incompatible receiver {}",
        interp.describe_for_error(this)
    ))
}

fn this_map(interp: &Interp, this: &Value, method: &str) -> JsResult<ObjRef> {
    match this.as_object() {
        Some(obj) if matches!(obj.borrow().class, Class::Map(_)) => Ok(obj.clone()),
        _ => Err(incompatible(interp, &format!("Map.prototype.{method}"), this)),
    }
}

fn this_set(interp: &Interp, this: &Value, method: &str) -> JsResult<ObjRef> {
    match this.as_object() {
        Some(obj) if matches!(obj.borrow().class, Class::Set(_)) => Ok(obj.clone()),
        _ => Err(incompatible(interp, &format!("Set.prototype.{method}"), this)),
    }
}

fn with_map<T>(obj: &ObjRef, f: impl FnOnce(&mut IndexMap<HashKey, Value, ahash::RandomState>) -> T) -> Option<T> {
    match &mut obj.borrow_mut().class {
        Class::Map(entries) => Some(f(entries)),
        _ => None,
    }
}

fn with_set<T>(obj: &ObjRef, f: impl FnOnce(&mut IndexSet<HashKey, ahash::RandomState>) -> T) -> Option<T> {
    match &mut obj.borrow_mut().class {
        Class::Set(items) => Some(f(items)),
        _ => None,
    }
}

fn map_construct(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let Value::Object(obj) = this else {
        return Ok(this.clone());
    };
    obj.borrow_mut().class = Class::Map(IndexMap::default());
    let source = arg(args, 0);
    if source.is_nullish() {
        return Ok(this.clone());
    }
    for entry in interp.collect_iterable(&source)? {
        if !matches!(entry, Value::Object(_)) {
            return Err(interp.type_error(format!("Iterator value {entry:?} is not an entry object")));
        }
        let key = interp.get(&entry, "0")?;
        let value = interp.get(&entry, "1")?;
        with_map(obj, |entries| entries.insert(key_of(key), value));
    }
    Ok(this.clone())
}

fn map_get(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_map(interp, this, "get")?;
    let key = key_of(arg(args, 0));
    Ok(with_map(&obj, |entries| entries.get(&key).cloned()).flatten().unwrap_or_default())
}

fn map_set(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_map(interp, this, "set")?;
    let key = key_of(arg(args, 0));
    with_map(&obj, |entries| entries.insert(key, arg(args, 1)));
    Ok(this.clone())
}

fn map_has(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_map(interp, this, "has")?;
    let key = key_of(arg(args, 0));
    Ok(Value::Bool(with_map(&obj, |entries| entries.contains_key(&key)).unwrap_or(false)))
}

fn map_delete(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_map(interp, this, "delete")?;
    let key = key_of(arg(args, 0));
    let removed = with_map(&obj, |entries| entries.shift_remove(&key).is_some());
    Ok(Value::Bool(removed.unwrap_or(false)))
}

fn map_clear(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_map(interp, this, "clear")?;
    with_map(&obj, IndexMap::clear);
    Ok(Value::Undefined)
}

fn map_size(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_map(interp, this, "size")?;
    Ok(Value::from(with_map(&obj, |entries| entries.len()).unwrap_or(0)))
}

fn map_for_each(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_map(interp, this, "forEach")?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.type_error(format!("{} is not a function", interp.describe_for_error(&callback))));
    }
    let mut index = 0;
    // entries added by the callback are visited too
    while let Some((key, value)) = with_map(&obj, |entries| {
        entries.get_index(index).map(|(key, value)| (key.0.clone(), value.clone()))
    })
    .flatten()
    {
        interp.call(&callback, arg(args, 1), &[value, key, this.clone()])?;
        index += 1;
    }
    Ok(Value::Undefined)
}

fn map_iter(interp: &mut Interp, this: &Value, kind: IterKind) -> JsResult<Value> {
    let map = this_map(interp, this, "entries")?;
    Ok(Value::Object(interp.make_iterator(IterCursor::Map { map, index: 0, kind })))
}

fn set_construct(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let Value::Object(obj) = this else {
        return Ok(this.clone());
    };
    obj.borrow_mut().class = Class::Set(IndexSet::default());
    let source = arg(args, 0);
    if source.is_nullish() {
        return Ok(this.clone());
    }
    for item in interp.collect_iterable(&source)? {
        with_set(obj, |items| items.insert(key_of(item)));
    }
    Ok(this.clone())
}

fn set_add(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_set(interp, this, "add")?;
    let key = key_of(arg(args, 0));
    with_set(&obj, |items| items.insert(key));
    Ok(this.clone())
}

fn set_has(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_set(interp, this, "has")?;
    let key = key_of(arg(args, 0));
    Ok(Value::Bool(with_set(&obj, |items| items.contains(&key)).unwrap_or(false)))
}

fn set_delete(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_set(interp, this, "delete")?;
    let key = key_of(arg(args, 0));
    Ok(Value::Bool(with_set(&obj, |items| items.shift_remove(&key)).unwrap_or(false)))
}

fn set_clear(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_set(interp, this, "clear")?;
    with_set(&obj, IndexSet::clear);
    Ok(Value::Undefined)
}

fn set_size(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_set(interp, this, "size")?;
    Ok(Value::from(with_set(&obj, |items| items.len()).unwrap_or(0)))
}

fn set_for_each(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_set(interp, this, "forEach")?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.type_error(format!("{} is not a function", interp.describe_for_error(&callback))));
    }
    let mut index = 0;
    while let Some(value) = with_set(&obj, |items| items.get_index(index).map(|key| key.0.clone())).flatten() {
        interp.call(&callback, arg(args, 1), &[value.clone(), value, this.clone()])?;
        index += 1;
    }
    Ok(Value::Undefined)
}

fn set_iter(interp: &mut Interp, this: &Value, kind: IterKind) -> JsResult<Value> {
    let set = this_set(interp, this, "values")?;
    Ok(Value::Object(interp.make_iterator(IterCursor::Set { set, index: 0, kind })))
}
