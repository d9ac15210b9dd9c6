use super::{Installer, arg};
use crate::interp::{
    ErrorType, Interp, JsResult,
    object::{Class, JsObject, ObjRef, Property},
    realm::Intrinsics,
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let base_proto = &intrinsics.error_proto;
    let base = installer.constructor(
        "Error",
        1,
        Some(|interp, _, args| call_as(interp, ErrorType::Error, args)),
        error_construct,
        base_proto,
    );
    base_proto.define_hidden("name", "Error");
    base_proto.define_hidden("message", "");
    installer.method(base_proto, "toString", 0, to_string);
    installer.method(&base, "captureStackTrace", 1, |_, _, _| Ok(Value::Undefined));
    global.define_hidden("Error", base.clone());

    let derived: [(ErrorType, super::Builtin); 4] = [
        (ErrorType::TypeError, |interp, _, args| call_as(interp, ErrorType::TypeError, args)),
        (ErrorType::RangeError, |interp, _, args| call_as(interp, ErrorType::RangeError, args)),
        (ErrorType::SyntaxError, |interp, _, args| call_as(interp, ErrorType::SyntaxError, args)),
        (ErrorType::ReferenceError, |interp, _, args| call_as(interp, ErrorType::ReferenceError, args)),
    ];
    for (kind, call) in derived {
        let name: &'static str = kind.into();
        let proto = intrinsics.error_proto(kind);
        let ctor = installer.constructor(name, 1, Some(call), error_construct, proto);
        // TypeError.__proto__ === Error
        ctor.borrow_mut().proto = Some(base.clone());
        proto.define_hidden("name", name);
        proto.define_hidden("message", "");
        global.define_hidden(name, ctor);
    }
}

/// Calling an error constructor without `new` behaves like constructing it.
fn call_as(interp: &mut Interp, kind: ErrorType, args: &[Value]) -> JsResult<Value> {
    let proto = interp.realm.intrinsics.error_proto(kind).clone();
    let error = ObjRef::new(JsObject::new(Class::Error, Some(proto)));
    error_construct(interp, &Value::Object(error), args)
}

fn error_construct(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let Value::Object(error) = this else {
        return Ok(this.clone());
    };
    error.borrow_mut().class = Class::Error;
    let message = arg(args, 0);
    let message = if message.is_undefined() {
        None
    } else {
        Some(interp.to_string(&message)?)
    };
    if let Some(message) = &message {
        error.define_hidden("message", message.clone());
    }
    let options = arg(args, 1);
    if let Value::Object(options) = &options {
        if options.has_property("cause") {
            let cause = interp.get(&Value::Object(options.clone()), "cause")?;
            error.define_hidden("cause", cause);
        }
    }
    let name = match interp.get(this, "name")? {
        Value::String(name) => name,
        _ => "Error".into(),
    };
    let stack = interp.stack_text(&name, message.as_deref().unwrap_or(""));
    error.define("stack", Property::hidden(Value::from(stack)));
    Ok(this.clone())
}

fn to_string(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    if !matches!(this, Value::Object(_)) {
        return Err(interp.type_error("Error.prototype.toString called on non-object"));
    }
    let name = match interp.get(this, "name")? {
        Value::Undefined => "Error".into(),
        other => interp.to_string(&other)?,
    };
    let message = match interp.get(this, "message")? {
        Value::Undefined => "".into(),
        other => interp.to_string(&other)?,
    };
    Ok(Value::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{name}: {message}"),
    }))
}
