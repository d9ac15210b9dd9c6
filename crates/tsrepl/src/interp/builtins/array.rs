use std::{cmp::Ordering, collections::BTreeSet, rc::Rc};

use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    convert::{relative_index, to_integer},
    iter::{IterCursor, IterKind},
    object::{Class, ObjRef},
    realm::Intrinsics,
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.array_proto;
    let ctor = installer.constructor("Array", 1, Some(array_call), array_construct, proto);
    installer.method(&ctor, "isArray", 1, is_array);
    installer.method(&ctor, "from", 1, from);
    installer.method(&ctor, "of", 0, of);
    global.define_hidden("Array", ctor);
    installer.method(&intrinsics.iterator_proto, "next", 0, crate::interp::iter::iterator_next);

    let methods: [(&str, usize, super::Builtin); 37] = [
        ("push", 1, push),
        ("pop", 0, pop),
        ("shift", 0, shift),
        ("unshift", 1, unshift),
        ("slice", 2, slice),
        ("splice", 2, splice),
        ("concat", 1, concat),
        ("join", 1, join),
        ("toString", 0, to_string),
        ("reverse", 0, reverse),
        ("indexOf", 1, index_of),
        ("lastIndexOf", 1, last_index_of),
        ("includes", 1, includes),
        ("find", 1, find),
        ("findIndex", 1, find_index),
        ("findLast", 1, find_last),
        ("findLastIndex", 1, find_last_index),
        ("filter", 1, filter),
        ("map", 1, map),
        ("forEach", 1, for_each),
        ("reduce", 1, reduce),
        ("reduceRight", 1, reduce_right),
        ("some", 1, some),
        ("every", 1, every),
        ("sort", 1, sort),
        ("flat", 0, flat),
        ("flatMap", 1, flat_map),
        ("fill", 1, fill),
        ("at", 1, at),
        ("keys", 0, keys),
        ("values", 0, values),
        ("entries", 0, entries),
        ("toReversed", 0, to_reversed),
        ("toSorted", 1, to_sorted),
        ("with", 2, with),
        ("copyWithin", 2, copy_within),
        ("toLocaleString", 0, to_string),
    ];
    for (name, length, f) in methods {
        installer.method(proto, name, length, f);
    }
}

fn array_call(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let array = interp.new_array(Vec::new());
    fill_from_args(interp, &array, args)?;
    Ok(Value::Object(array))
}

fn array_construct(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    if let Value::Object(obj) = this {
        fill_from_args(interp, obj, args)?;
    }
    Ok(this.clone())
}

/// `Array(n)` makes `n` holes; any other argument list becomes the elements.
fn fill_from_args(interp: &Interp, array: &ObjRef, args: &[Value]) -> JsResult<()> {
    let items = array_items_from_args(interp, args)?;
    let mut borrowed = array.borrow_mut();
    borrowed.holes = match args {
        [Value::Number(_)] => (0..items.len()).collect(),
        _ => BTreeSet::new(),
    };
    borrowed.class = Class::Array(items);
    Ok(())
}

fn array_items_from_args(interp: &Interp, args: &[Value]) -> JsResult<Vec<Value>> {
    match args {
        [Value::Number(n)] => {
            if *n < 0.0 || n.fract() != 0.0 || *n > f64::from(u32::MAX) {
                return Err(interp.range_error("Invalid array length"));
            }
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "validated array length")]
            let length = *n as usize;
            Ok(vec![Value::Undefined; length])
        }
        _ => Ok(args.to_vec()),
    }
}

fn is_array(_interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(arg(args, 0).as_object().is_some_and(ObjRef::is_array)))
}

fn from(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let source = arg(args, 0);
    let map_fn = arg(args, 1);
    let items = match &source {
        Value::Undefined | Value::Null => {
            return Err(interp.type_error(format!("{source:?} is not iterable")));
        }
        Value::String(_) => interp.collect_iterable(&source)?,
        Value::Object(obj) => {
            let builtin_iterable = matches!(
                obj.borrow().class,
                Class::Array(_) | Class::Map(_) | Class::Set(_) | Class::String(_) | Class::Iterator(_)
            );
            if builtin_iterable || interp.get(&source, "next")?.is_callable() {
                interp.collect_iterable(&source)?
            } else {
                array_like_items(interp, &source)?
            }
        }
        _ => Vec::new(),
    };
    let items = if map_fn.is_callable() {
        let mut mapped = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            mapped.push(interp.call(&map_fn, Value::Undefined, &[item, Value::from(index)])?);
        }
        mapped
    } else {
        items
    };
    Ok(Value::Object(interp.new_array(items)))
}

fn of(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Object(interp.new_array(args.to_vec())))
}

fn array_like_items(interp: &mut Interp, value: &Value) -> JsResult<Vec<Value>> {
    let length = interp.length_of(value)?;
    let mut items = Vec::with_capacity(length.min(1 << 16));
    for index in 0..length {
        items.push(interp.get(value, &index.to_string())?);
    }
    Ok(items)
}

/// `this` as an array object, or a `TypeError` naming `method`.
fn this_array(interp: &Interp, this: &Value, method: &str) -> JsResult<ObjRef> {
    match this {
        Value::Object(obj) if obj.is_array() => Ok(obj.clone()),
        _ => Err(interp.type_error(format!(
            "Array.prototype.{method} called on {}",
            interp.describe_for_error(this)
        ))),
    }
}

/// A snapshot of the elements of an array or array-like `this`.
fn items_of(interp: &mut Interp, this: &Value) -> JsResult<Vec<Value>> {
    if let Value::Object(obj) = this {
        if let Some(items) = obj.borrow().array_items() {
            return Ok(items.clone());
        }
    }
    if this.is_nullish() {
        return Err(interp.type_error("Array.prototype method called on null or undefined"));
    }
    array_like_items(interp, this)
}

/// Mutates the elements in place. Holes become `undefined` elements.
fn with_items<T>(obj: &ObjRef, f: impl FnOnce(&mut Vec<Value>) -> T) -> Option<T> {
    let mut borrowed = obj.borrow_mut();
    if borrowed.frozen {
        return None;
    }
    borrowed.holes.clear();
    match &mut borrowed.class {
        Class::Array(items) => Some(f(items)),
        _ => None,
    }
}

fn frozen_error(interp: &Interp, obj: &ObjRef) -> crate::interp::Throw {
    let length = obj.borrow().array_items().map_or(0, Vec::len);
    interp.type_error(format!("Cannot add property {length}, object is not extensible"))
}

fn push(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "push")?;
    let length = with_items(&obj, |items| {
        items.extend_from_slice(args);
        items.len()
    })
    .ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(Value::from(length))
}

fn pop(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "pop")?;
    let popped = with_items(&obj, Vec::pop).ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(popped.unwrap_or_default())
}

fn shift(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "shift")?;
    let shifted = with_items(&obj, |items| (!items.is_empty()).then(|| items.remove(0)))
        .ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(shifted.unwrap_or_default())
}

fn unshift(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "unshift")?;
    let length = with_items(&obj, |items| {
        items.splice(0..0, args.iter().cloned());
        items.len()
    })
    .ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(Value::from(length))
}

/// Resolves an optional relative index argument, `default` when undefined.
fn index_arg(interp: &mut Interp, value: &Value, len: usize, default: usize) -> JsResult<usize> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_number(value)?;
    Ok(relative_index(n, len))
}

fn slice(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let start = index_arg(interp, &arg(args, 0), items.len(), 0)?;
    let end = index_arg(interp, &arg(args, 1), items.len(), items.len())?;
    let slice = items.get(start..end.max(start)).unwrap_or_default().to_vec();
    Ok(Value::Object(interp.new_array(slice)))
}

fn splice(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "splice")?;
    let len = obj.borrow().array_items().map_or(0, Vec::len);
    let start = index_arg(interp, &arg(args, 0), len, 0)?;
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let n = to_integer(interp.to_number(&args[1])?).max(0.0);
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped non-negative")]
            let n = n.min((len - start) as f64) as usize;
            n
        }
    };
    let inserted = args.get(2..).unwrap_or_default();
    let removed = with_items(&obj, |items| {
        items
            .splice(start..start + delete_count, inserted.iter().cloned())
            .collect::<Vec<_>>()
    })
    .ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(Value::Object(interp.new_array(removed)))
}

fn concat(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut items = items_of(interp, this)?;
    for value in args {
        match value.as_object().and_then(|obj| obj.borrow().array_items().cloned()) {
            Some(more) => items.extend(more),
            None => items.push(value.clone()),
        }
    }
    Ok(Value::Object(interp.new_array(items)))
}

fn join_items(interp: &mut Interp, items: &[Value], separator: &str) -> JsResult<String> {
    let mut out = String::new();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(separator);
        }
        if !item.is_nullish() {
            out.push_str(&interp.to_string(item)?);
        }
    }
    Ok(out)
}

fn join(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => Rc::from(","),
        other => interp.to_string(&other)?,
    };
    join_items(interp, &items, &separator).map(Value::from)
}

fn to_string(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    join_items(interp, &items, ",").map(Value::from)
}

fn reverse(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "reverse")?;
    with_items(&obj, |items| items.reverse()).ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(this.clone())
}

fn to_reversed(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let mut items = items_of(interp, this)?;
    items.reverse();
    Ok(Value::Object(interp.new_array(items)))
}

fn index_of(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let target = arg(args, 0);
    let start = index_arg(interp, &arg(args, 1), items.len(), 0)?;
    let found = items.iter().skip(start).position(|item| item.strict_equals(&target));
    Ok(found.map_or(Value::Number(-1.0), |i| Value::from(i + start)))
}

fn last_index_of(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let target = arg(args, 0);
    let found = items.iter().rposition(|item| item.strict_equals(&target));
    Ok(found.map_or(Value::Number(-1.0), Value::from))
}

fn includes(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let target = arg(args, 0);
    let start = index_arg(interp, &arg(args, 1), items.len(), 0)?;
    Ok(Value::Bool(items.iter().skip(start).any(|item| item.same_value_zero(&target))))
}

fn callback_arg(interp: &Interp, args: &[Value]) -> JsResult<Value> {
    let callback = arg(args, 0);
    if callback.is_callable() {
        Ok(callback)
    } else {
        Err(interp.type_error(format!("{} is not a function", interp.describe_for_error(&callback))))
    }
}

/// Element `index` of `this`, read live so callbacks observe mutations.
fn live_item(interp: &mut Interp, this: &Value, index: usize) -> JsResult<Value> {
    if let Value::Object(obj) = this {
        if let Some(items) = obj.borrow().array_items() {
            return Ok(items.get(index).cloned().unwrap_or_default());
        }
    }
    interp.get(this, &index.to_string())
}

/// Calls `callback(item, index, this)` for each index in `order`, stopping when `visit`
/// returns `Some`.
fn scan<T>(
    interp: &mut Interp,
    this: &Value,
    args: &[Value],
    reverse: bool,
    mut visit: impl FnMut(usize, &Value, &Value) -> Option<T>,
) -> JsResult<Option<T>> {
    let callback = callback_arg(interp, args)?;
    let receiver = arg(args, 1);
    let length = items_of(interp, this)?.len();
    let indices: Box<dyn Iterator<Item = usize>> = if reverse {
        Box::new((0..length).rev())
    } else {
        Box::new(0..length)
    };
    for index in indices {
        let item = live_item(interp, this, index)?;
        let result = interp.call(&callback, receiver.clone(), &[item.clone(), Value::from(index), this.clone()])?;
        if let Some(found) = visit(index, &item, &result) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn find(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = scan(interp, this, args, false, |_, item, result| {
        Interp::to_boolean(result).then(|| item.clone())
    })?;
    Ok(found.unwrap_or_default())
}

fn find_index(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = scan(interp, this, args, false, |index, _, result| {
        Interp::to_boolean(result).then_some(index)
    })?;
    Ok(found.map_or(Value::Number(-1.0), Value::from))
}

fn find_last(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = scan(interp, this, args, true, |_, item, result| {
        Interp::to_boolean(result).then(|| item.clone())
    })?;
    Ok(found.unwrap_or_default())
}

fn find_last_index(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = scan(interp, this, args, true, |index, _, result| {
        Interp::to_boolean(result).then_some(index)
    })?;
    Ok(found.map_or(Value::Number(-1.0), Value::from))
}

fn some(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = scan(interp, this, args, false, |_, _, result| {
        Interp::to_boolean(result).then_some(())
    })?;
    Ok(Value::Bool(found.is_some()))
}

fn every(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let failed = scan(interp, this, args, false, |_, _, result| {
        (!Interp::to_boolean(result)).then_some(())
    })?;
    Ok(Value::Bool(failed.is_none()))
}

fn filter(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut kept = Vec::new();
    scan(interp, this, args, false, |_, item, result| {
        if Interp::to_boolean(result) {
            kept.push(item.clone());
        }
        None::<()>
    })?;
    Ok(Value::Object(interp.new_array(kept)))
}

fn map(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut mapped = Vec::new();
    scan(interp, this, args, false, |_, _, result| {
        mapped.push(result.clone());
        None::<()>
    })?;
    Ok(Value::Object(interp.new_array(mapped)))
}

fn for_each(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    scan(interp, this, args, false, |_, _, _| None::<()>)?;
    Ok(Value::Undefined)
}

fn reduce_impl(interp: &mut Interp, this: &Value, args: &[Value], reverse: bool) -> JsResult<Value> {
    let callback = callback_arg(interp, args)?;
    let length = items_of(interp, this)?.len();
    let mut indices: Box<dyn Iterator<Item = usize>> = if reverse {
        Box::new((0..length).rev())
    } else {
        Box::new(0..length)
    };
    let mut accumulator = if args.len() >= 2 {
        args[1].clone()
    } else {
        match indices.next() {
            Some(index) => live_item(interp, this, index)?,
            None => return Err(interp.type_error("Reduce of empty array with no initial value")),
        }
    };
    for index in indices {
        let item = live_item(interp, this, index)?;
        accumulator = interp.call(&callback, Value::Undefined, &[
            accumulator,
            item,
            Value::from(index),
            this.clone(),
        ])?;
    }
    Ok(accumulator)
}

fn reduce(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    reduce_impl(interp, this, args, false)
}

fn reduce_right(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    reduce_impl(interp, this, args, true)
}

/// Stable merge sort with a comparator that may throw. `slice::sort_by` is not usable
/// because script comparators need not be consistent.
fn merge_sort(
    items: Vec<Value>,
    compare: &mut dyn FnMut(&Value, &Value) -> JsResult<Ordering>,
) -> JsResult<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut items = items;
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if compare(a, b)? == Ordering::Greater {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn sorted(interp: &mut Interp, items: Vec<Value>, comparator: &Value) -> JsResult<Vec<Value>> {
    if !comparator.is_undefined() && !comparator.is_callable() {
        return Err(interp.type_error(
            "The comparison function must be either a function or undefined",
        ));
    }
    // undefined always sorts last and is never passed to the comparator
    let (mut defined, undefined): (Vec<_>, Vec<_>) = items.into_iter().partition(|v| !v.is_undefined());
    defined = if comparator.is_callable() {
        merge_sort(defined, &mut |a, b| {
            let result = interp.call(comparator, Value::Undefined, &[a.clone(), b.clone()])?;
            let n = interp.to_number(&result)?;
            Ok(if n > 0.0 {
                Ordering::Greater
            } else if n < 0.0 {
                Ordering::Less
            } else {
                Ordering::Equal
            })
        })?
    } else {
        let mut keyed = Vec::with_capacity(defined.len());
        for value in defined {
            let key = interp.to_string(&value)?;
            keyed.push((key, value));
        }
        keyed.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));
        keyed.into_iter().map(|(_, value)| value).collect()
    };
    defined.extend(undefined);
    Ok(defined)
}

fn sort(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "sort")?;
    let items = items_of(interp, this)?;
    let sorted = sorted(interp, items, &arg(args, 0))?;
    with_items(&obj, |items| *items = sorted).ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(this.clone())
}

fn to_sorted(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let sorted = sorted(interp, items, &arg(args, 0))?;
    Ok(Value::Object(interp.new_array(sorted)))
}

fn flatten_into(interp: &mut Interp, out: &mut Vec<Value>, items: Vec<Value>, depth: f64) -> JsResult<()> {
    for item in items {
        let nested = item
            .as_object()
            .and_then(|obj| obj.borrow().array_items().cloned());
        match nested {
            Some(nested) if depth >= 1.0 => flatten_into(interp, out, nested, depth - 1.0)?,
            _ => out.push(item),
        }
    }
    Ok(())
}

fn flat(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let depth = match arg(args, 0) {
        Value::Undefined => 1.0,
        other => to_integer(interp.to_number(&other)?),
    };
    let mut out = Vec::new();
    flatten_into(interp, &mut out, items, depth)?;
    Ok(Value::Object(interp.new_array(out)))
}

fn flat_map(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut mapped = Vec::new();
    scan(interp, this, args, false, |_, _, result| {
        mapped.push(result.clone());
        None::<()>
    })?;
    let mut out = Vec::new();
    flatten_into(interp, &mut out, mapped, 1.0)?;
    Ok(Value::Object(interp.new_array(out)))
}

fn fill(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "fill")?;
    let len = obj.borrow().array_items().map_or(0, Vec::len);
    let value = arg(args, 0);
    let start = index_arg(interp, &arg(args, 1), len, 0)?;
    let end = index_arg(interp, &arg(args, 2), len, len)?;
    with_items(&obj, |items| {
        for slot in items.iter_mut().take(end).skip(start) {
            *slot = value.clone();
        }
    })
    .ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(this.clone())
}

fn copy_within(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = this_array(interp, this, "copyWithin")?;
    let len = obj.borrow().array_items().map_or(0, Vec::len);
    let target = index_arg(interp, &arg(args, 0), len, 0)?;
    let start = index_arg(interp, &arg(args, 1), len, 0)?;
    let end = index_arg(interp, &arg(args, 2), len, len)?;
    with_items(&obj, |items| {
        let chunk: Vec<Value> = items.get(start..end.max(start)).unwrap_or_default().to_vec();
        for (offset, value) in chunk.into_iter().enumerate() {
            if let Some(slot) = items.get_mut(target + offset) {
                *slot = value;
            }
        }
    })
    .ok_or_else(|| frozen_error(interp, &obj))?;
    Ok(this.clone())
}

/// Resolves `at`-style indices, returning `None` when out of range.
fn absolute_index(interp: &mut Interp, value: &Value, len: usize) -> JsResult<Option<usize>> {
    let n = to_integer(interp.to_number(value)?);
    let resolved = if n < 0.0 { len as f64 + n } else { n };
    if resolved < 0.0 || resolved >= len as f64 {
        return Ok(None);
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "checked in range")]
    let index = resolved as usize;
    Ok(Some(index))
}

fn at(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let items = items_of(interp, this)?;
    let index = absolute_index(interp, &arg(args, 0), items.len())?;
    Ok(index.and_then(|i| items.get(i).cloned()).unwrap_or_default())
}

fn with(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut items = items_of(interp, this)?;
    let Some(index) = absolute_index(interp, &arg(args, 0), items.len())? else {
        return Err(interp.range_error("Invalid index"));
    };
    items[index] = arg(args, 1);
    Ok(Value::Object(interp.new_array(items)))
}

fn iterator(interp: &mut Interp, this: &Value, kind: IterKind, method: &str) -> JsResult<Value> {
    let array = this_array(interp, this, method)?;
    Ok(Value::Object(interp.make_iterator(IterCursor::Array {
        array,
        index: 0,
        kind,
    })))
}

fn keys(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    iterator(interp, this, IterKind::Keys, "keys")
}

fn values(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    iterator(interp, this, IterKind::Values, "values")
}

fn entries(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    iterator(interp, this, IterKind::Entries, "entries")
}
