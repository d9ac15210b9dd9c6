use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    object::{Class, JsObject, ObjRef, Property, Slot},
    realm::Intrinsics,
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.object_proto;
    let ctor = installer.constructor("Object", 1, Some(object_call), object_construct, proto);
    installer.method(&ctor, "keys", 1, keys);
    installer.method(&ctor, "values", 1, values);
    installer.method(&ctor, "entries", 1, entries);
    installer.method(&ctor, "assign", 2, assign);
    installer.method(&ctor, "defineProperty", 3, define_property);
    installer.method(&ctor, "defineProperties", 2, define_properties);
    installer.method(&ctor, "getOwnPropertyNames", 1, get_own_property_names);
    installer.method(&ctor, "getOwnPropertyDescriptor", 2, get_own_property_descriptor);
    installer.method(&ctor, "getOwnPropertyDescriptors", 1, get_own_property_descriptors);
    installer.method(&ctor, "getPrototypeOf", 1, get_prototype_of);
    installer.method(&ctor, "setPrototypeOf", 2, set_prototype_of);
    installer.method(&ctor, "create", 2, create);
    installer.method(&ctor, "freeze", 1, freeze);
    installer.method(&ctor, "isFrozen", 1, is_frozen);
    installer.method(&ctor, "preventExtensions", 1, prevent_extensions);
    installer.method(&ctor, "isExtensible", 1, is_extensible);
    installer.method(&ctor, "fromEntries", 1, from_entries);
    installer.method(&ctor, "is", 2, is);
    installer.method(&ctor, "hasOwn", 2, has_own);
    global.define_hidden("Object", ctor);

    installer.method(proto, "hasOwnProperty", 1, has_own_property);
    installer.method(proto, "isPrototypeOf", 1, is_prototype_of);
    installer.method(proto, "propertyIsEnumerable", 1, property_is_enumerable);
    installer.method(proto, "toString", 0, to_string);
    installer.method(proto, "toLocaleString", 0, to_string);
    installer.method(proto, "valueOf", 0, value_of);
    let get_proto = installer.function("get __proto__", 0, |interp, this, _| {
        let obj = interp.to_object(this)?;
        Ok(obj.proto().map_or(Value::Null, Value::Object))
    });
    let set_proto = installer.function("set __proto__", 1, |_, this, args| {
        if let Value::Object(obj) = this {
            match arg(args, 0) {
                Value::Object(proto) if !proto.ptr_eq(obj) && !proto.inherits_from(obj) => {
                    obj.borrow_mut().proto = Some(proto);
                }
                Value::Null => obj.borrow_mut().proto = None,
                _ => {}
            }
        }
        Ok(Value::Undefined)
    });
    proto.define(
        "__proto__",
        Property::accessor(Some(Value::Object(get_proto)), Some(Value::Object(set_proto)), false),
    );
}

fn object_call(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    match arg(args, 0) {
        Value::Undefined | Value::Null => Ok(Value::Object(interp.new_object())),
        value => interp.to_object(&value).map(Value::Object),
    }
}

fn object_construct(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    match arg(args, 0) {
        Value::Undefined | Value::Null => Ok(this.clone()),
        value => interp.to_object(&value).map(Value::Object),
    }
}

/// Own enumerable keys of `value` after boxing primitives.
fn enumerable_keys(interp: &mut Interp, value: &Value) -> JsResult<(ObjRef, Vec<std::rc::Rc<str>>)> {
    let obj = interp.to_object(value)?;
    let keys = obj.borrow().own_enumerable_keys();
    Ok((obj, keys))
}

fn keys(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let (_, keys) = enumerable_keys(interp, &arg(args, 0))?;
    Ok(Value::Object(interp.new_array(keys.into_iter().map(Value::String).collect())))
}

fn values(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let (obj, keys) = enumerable_keys(interp, &arg(args, 0))?;
    let receiver = Value::Object(obj.clone());
    let mut items = Vec::with_capacity(keys.len());
    for key in keys {
        items.push(interp.get_from(&obj, &key, &receiver)?);
    }
    Ok(Value::Object(interp.new_array(items)))
}

fn entries(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let (obj, keys) = enumerable_keys(interp, &arg(args, 0))?;
    let receiver = Value::Object(obj.clone());
    let mut items = Vec::with_capacity(keys.len());
    for key in keys {
        let value = interp.get_from(&obj, &key, &receiver)?;
        items.push(Value::Object(interp.new_array(vec![Value::String(key), value])));
    }
    Ok(Value::Object(interp.new_array(items)))
}

fn assign(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = interp.to_object(&arg(args, 0))?;
    let receiver = Value::Object(target.clone());
    for source in args.iter().skip(1) {
        if source.is_nullish() {
            continue;
        }
        let (source, keys) = enumerable_keys(interp, source)?;
        let source_value = Value::Object(source.clone());
        for key in keys {
            let value = interp.get_from(&source, &key, &source_value)?;
            interp.put_on(&target, &key, value, &receiver)?;
        }
    }
    Ok(receiver)
}

/// Converts a descriptor object into a property, filling gaps from `existing`.
fn to_property(interp: &mut Interp, desc: &Value, existing: Option<Property>) -> JsResult<Property> {
    let Value::Object(desc_obj) = desc else {
        return Err(interp.type_error(format!(
            "Property description must be an object: {}",
            interp.describe_for_error(desc)
        )));
    };
    let read = |interp: &mut Interp, key: &str| -> JsResult<Option<Value>> {
        if desc_obj.has_property(key) {
            interp.get(desc, key).map(Some)
        } else {
            Ok(None)
        }
    };
    let value = read(interp, "value")?;
    let writable = read(interp, "writable")?.map(|v| Interp::to_boolean(&v));
    let enumerable = read(interp, "enumerable")?.map(|v| Interp::to_boolean(&v));
    let configurable = read(interp, "configurable")?.map(|v| Interp::to_boolean(&v));
    let get = read(interp, "get")?;
    let set = read(interp, "set")?;
    for accessor in [&get, &set].into_iter().flatten() {
        if !accessor.is_undefined() && !accessor.is_callable() {
            return Err(interp.type_error(format!(
                "Getter must be a function: {}",
                interp.describe_for_error(accessor)
            )));
        }
    }
    if (get.is_some() || set.is_some()) && (value.is_some() || writable.is_some()) {
        return Err(interp.type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        ));
    }
    let base = existing.unwrap_or(Property {
        slot: Slot::Data(Value::Undefined),
        writable: false,
        enumerable: false,
        configurable: false,
    });
    let slot = if get.is_some() || set.is_some() {
        let (old_get, old_set) = match base.slot {
            Slot::Accessor { get, set } => (get, set),
            Slot::Data(_) => (None, None),
        };
        let keep = |new: Option<Value>, old: Option<Value>| match new {
            Some(Value::Undefined) => None,
            Some(f) => Some(f),
            None => old,
        };
        Slot::Accessor {
            get: keep(get, old_get),
            set: keep(set, old_set),
        }
    } else {
        match (value, base.slot) {
            (Some(value), _) => Slot::Data(value),
            (None, Slot::Data(old)) => Slot::Data(old),
            (None, accessor) => accessor,
        }
    };
    Ok(Property {
        writable: writable.unwrap_or(base.writable) && matches!(slot, Slot::Data(_)),
        enumerable: enumerable.unwrap_or(base.enumerable),
        configurable: configurable.unwrap_or(base.configurable),
        slot,
    })
}

fn define_one(interp: &mut Interp, target: &ObjRef, key: &str, desc: &Value) -> JsResult<()> {
    let existing = target.get_own(key);
    let prop = to_property(interp, desc, existing)?;
    if !target.define(key, prop) {
        return Err(interp.type_error(format!("Cannot redefine property: {key}")));
    }
    Ok(())
}

fn define_property(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    let Value::Object(obj) = &target else {
        return Err(interp.type_error("Object.defineProperty called on non-object"));
    };
    let key = interp.to_property_key(&arg(args, 1))?;
    define_one(interp, obj, &key, &arg(args, 2))?;
    Ok(target)
}

fn define_properties(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    let Value::Object(obj) = &target else {
        return Err(interp.type_error("Object.defineProperties called on non-object"));
    };
    let (descs, keys) = enumerable_keys(interp, &arg(args, 1))?;
    let descs_value = Value::Object(descs.clone());
    for key in keys {
        let desc = interp.get_from(&descs, &key, &descs_value)?;
        define_one(interp, obj, &key, &desc)?;
    }
    Ok(target)
}

fn get_own_property_names(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = interp.to_object(&arg(args, 0))?;
    let mut keys = obj.borrow().own_keys();
    if obj.is_array() {
        keys.push("length".into());
    }
    Ok(Value::Object(interp.new_array(keys.into_iter().map(Value::String).collect())))
}

/// Builds a descriptor object for `prop`.
pub(crate) fn from_property(interp: &Interp, prop: Property) -> ObjRef {
    let desc = interp.new_object();
    match prop.slot {
        Slot::Data(value) => {
            desc.define_data("value", value);
            desc.define_data("writable", prop.writable);
        }
        Slot::Accessor { get, set } => {
            desc.define_data("get", get.unwrap_or_default());
            desc.define_data("set", set.unwrap_or_default());
        }
    }
    desc.define_data("enumerable", prop.enumerable);
    desc.define_data("configurable", prop.configurable);
    desc
}

fn get_own_property_descriptor(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = interp.to_object(&arg(args, 0))?;
    let key = interp.to_property_key(&arg(args, 1))?;
    Ok(obj
        .get_own(&key)
        .map_or(Value::Undefined, |prop| Value::Object(from_property(interp, prop))))
}

fn get_own_property_descriptors(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = interp.to_object(&arg(args, 0))?;
    let result = interp.new_object();
    let keys = obj.borrow().own_keys();
    for key in keys {
        if let Some(prop) = obj.get_own(&key) {
            result.define_data(&key, from_property(interp, prop));
        }
    }
    Ok(Value::Object(result))
}

fn get_prototype_of(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = interp.to_object(&arg(args, 0))?;
    Ok(obj.proto().map_or(Value::Null, Value::Object))
}

fn set_prototype_of(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    let proto = match arg(args, 1) {
        Value::Object(proto) => Some(proto),
        Value::Null => None,
        other => {
            return Err(interp.type_error(format!(
                "Object prototype may only be an Object or null: {}",
                interp.describe_for_error(&other)
            )));
        }
    };
    if let Value::Object(obj) = &target {
        if proto.as_ref().is_some_and(|p| p.ptr_eq(obj) || p.inherits_from(obj)) {
            return Err(interp.type_error("Cyclic __proto__ value"));
        }
        obj.borrow_mut().proto = proto;
    }
    Ok(target)
}

fn create(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let proto = match arg(args, 0) {
        Value::Object(proto) => Some(proto),
        Value::Null => None,
        other => {
            return Err(interp.type_error(format!(
                "Object prototype may only be an Object or null: {}",
                interp.describe_for_error(&other)
            )));
        }
    };
    let obj = ObjRef::new(JsObject::new(Class::Ordinary, proto));
    let result = Value::Object(obj);
    let props = arg(args, 1);
    if !props.is_undefined() {
        define_properties(interp, &Value::Undefined, &[result.clone(), props])?;
    }
    Ok(result)
}

fn freeze(_interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    if let Value::Object(obj) = &target {
        let mut obj = obj.borrow_mut();
        obj.frozen = true;
        obj.extensible = false;
        for prop in obj.props.values_mut() {
            prop.configurable = false;
            if matches!(prop.slot, Slot::Data(_)) {
                prop.writable = false;
            }
        }
    }
    Ok(target)
}

fn is_frozen(_interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(match arg(args, 0) {
        Value::Object(obj) => {
            let obj = obj.borrow();
            obj.frozen
                || (!obj.extensible
                    && obj.array_items().is_none_or(Vec::is_empty)
                    && obj
                        .props
                        .values()
                        .all(|p| !p.configurable && (!p.writable || !matches!(p.slot, Slot::Data(_)))))
        }
        _ => true,
    }))
}

fn prevent_extensions(_interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    if let Value::Object(obj) = &target {
        obj.borrow_mut().extensible = false;
    }
    Ok(target)
}

fn is_extensible(_interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(match arg(args, 0) {
        Value::Object(obj) => obj.borrow().extensible,
        _ => false,
    }))
}

fn from_entries(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = interp.new_object();
    let entries = interp.collect_iterable(&arg(args, 0))?;
    for entry in entries {
        if !matches!(entry, Value::Object(_)) {
            return Err(interp.type_error(format!(
                "Iterator value {} is not an entry object",
                interp.describe_for_error(&entry)
            )));
        }
        let key = interp.get(&entry, "0")?;
        let key = interp.to_property_key(&key)?;
        let value = interp.get(&entry, "1")?;
        obj.define_data(&key, value);
    }
    Ok(Value::Object(obj))
}

fn is(_interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(arg(args, 0).same_value(&arg(args, 1))))
}

fn has_own(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let obj = interp.to_object(&arg(args, 0))?;
    let key = interp.to_property_key(&arg(args, 1))?;
    Ok(Value::Bool(obj.borrow().has_own(&key)))
}

fn has_own_property(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(this)?;
    Ok(Value::Bool(obj.borrow().has_own(&key)))
}

fn is_prototype_of(_interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(match (this, arg(args, 0)) {
        (Value::Object(proto), Value::Object(obj)) => obj.inherits_from(proto),
        _ => false,
    }))
}

fn property_is_enumerable(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(this)?;
    Ok(Value::Bool(obj.get_own(&key).is_some_and(|p| p.enumerable)))
}

/// The `[object Tag]` string for `value`.
pub(crate) fn object_tag(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Object(obj) => match obj.borrow().class {
            Class::Array(_) => "Array",
            Class::Function(_) => "Function",
            Class::Error => "Error",
            Class::Boolean(_) => "Boolean",
            Class::Number(_) => "Number",
            Class::String(_) => "String",
            Class::Date(_) => "Date",
            Class::RegExp(_) => "RegExp",
            Class::Map(_) => "Map",
            Class::Set(_) => "Set",
            Class::Promise(_) => "Promise",
            Class::Iterator(_) => "Iterator",
            Class::Ordinary => "Object",
        },
    }
}

fn to_string(_interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::from(format!("[object {}]", object_tag(this))))
}

fn value_of(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    interp.to_object(this).map(Value::Object)
}
