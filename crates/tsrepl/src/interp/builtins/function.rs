use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    function::FunctionKind,
    object::ObjRef,
    realm::Intrinsics,
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.function_proto;
    let ctor = installer.constructor("Function", 1, Some(function_ctor), function_ctor, proto);
    global.define_hidden("Function", ctor);
    installer.method(proto, "call", 1, call);
    installer.method(proto, "apply", 2, apply);
    installer.method(proto, "bind", 1, bind);
    installer.method(proto, "toString", 0, to_string);
}

fn function_ctor(interp: &mut Interp, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    Err(interp.throw(
        crate::interp::ErrorType::Error,
        "Code generation from strings is not supported",
    ))
}

fn this_function<'a>(interp: &Interp, this: &'a Value, method: &str) -> JsResult<&'a ObjRef> {
    match this {
        Value::Object(obj) if obj.is_callable() => Ok(obj),
        _ => Err(interp.type_error(format!(
            "Function.prototype.{method} called on {}",
            interp.describe_for_error(this)
        ))),
    }
}

fn call(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    this_function(interp, this, "call")?;
    let receiver = arg(args, 0);
    interp.call(this, receiver, args.get(1..).unwrap_or_default())
}

fn apply(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    this_function(interp, this, "apply")?;
    let list = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        list @ Value::Object(_) => {
            let length = interp.length_of(&list)?;
            let mut items = Vec::with_capacity(length);
            for index in 0..length {
                items.push(interp.get(&list, &index.to_string())?);
            }
            items
        }
        _ => return Err(interp.type_error("CreateListFromArrayLike called on non-object")),
    };
    interp.call(this, arg(args, 0), &list)
}

fn bind(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = this_function(interp, this, "bind")?.clone();
    let bound_args = args.get(1..).unwrap_or_default().to_vec();
    interp.bind_function(&target, arg(args, 0), bound_args).map(Value::Object)
}

fn to_string(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let obj = this_function(interp, this, "toString")?;
    let source = match obj.borrow().function().map(|f| &f.kind) {
        Some(FunctionKind::Closure(closure)) => Some(closure.code.snippet(closure.code.span).to_owned()),
        Some(FunctionKind::Class(class)) => Some(class.text.to_string()),
        _ => None,
    };
    let source = source.filter(|source| !source.is_empty());
    let source = match source {
        Some(source) => source,
        None => {
            let name = match obj.own_value("name") {
                Some(Value::String(name)) => name,
                _ => "".into(),
            };
            format!("function {name}() {{ [native code] }}")
        }
    };
    Ok(Value::from(source))
}
