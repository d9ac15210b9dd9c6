//! Namespace consoles. Output is buffered on the interpreter as [`ConsoleLine`]s and
//! drained by the caller after each evaluation or event-loop turn.

use std::rc::Rc;

use super::{Installer, json, number};
use crate::{
    config::InspectOptions,
    interp::{
        Class, ConsoleLevel, ConsoleLine, Interp, JsResult, Origin,
        function::NativeFn,
        number_to_string,
        object::{JsObject, ObjRef},
        realm::Realm,
        value::Value,
    },
};

/// Creates a `console` object whose output is charged to `origin`.
pub(crate) fn make_console(realm: &Realm, origin: Option<Rc<Origin>>) -> ObjRef {
    let console = ObjRef::new(JsObject::new(Class::Ordinary, Some(realm.intrinsics.object_proto.clone())));
    let installer = Installer {
        function_proto: &realm.intrinsics.function_proto,
    };
    let levels = [
        ("log", ConsoleLevel::Log),
        ("info", ConsoleLevel::Info),
        ("warn", ConsoleLevel::Warn),
        ("error", ConsoleLevel::Error),
        ("debug", ConsoleLevel::Debug),
    ];
    for (name, level) in levels {
        let origin = origin.clone();
        let f: NativeFn = Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
            let text = format_log_args(interp, args)?;
            emit(interp, origin.clone(), level, text);
            Ok(Value::Undefined)
        });
        define(&installer, &console, name, f);
    }

    let trace_origin = origin.clone();
    let trace: NativeFn = Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
        let message = format_log_args(interp, args)?;
        let text = interp.stack_text("Trace", &message);
        emit(interp, trace_origin.clone(), ConsoleLevel::Error, text);
        Ok(Value::Undefined)
    });
    define(&installer, &console, "trace", trace);

    let dir_origin = origin.clone();
    let dir: NativeFn = Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
        let options = interp.inspect_options.clone();
        let text = interp.inspect(&args.first().cloned().unwrap_or_default(), &options);
        emit(interp, dir_origin.clone(), ConsoleLevel::Log, text);
        Ok(Value::Undefined)
    });
    define(&installer, &console, "dir", dir);

    let assert: NativeFn = Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
        if args.first().is_some_and(Interp::to_boolean) {
            return Ok(Value::Undefined);
        }
        let rest = args.get(1..).unwrap_or_default();
        let text = if rest.is_empty() {
            "Assertion failed".to_owned()
        } else {
            format!("Assertion failed: {}", format_log_args(interp, rest)?)
        };
        emit(interp, origin.clone(), ConsoleLevel::Error, text);
        Ok(Value::Undefined)
    });
    define(&installer, &console, "assert", assert);
    console
}

fn define(installer: &Installer<'_>, console: &ObjRef, name: &str, f: NativeFn) {
    let function = crate::interp::native_function(installer.function_proto, name, 0, Some(f), None);
    console.define_data(name, function);
}

fn emit(interp: &mut Interp, origin: Option<Rc<Origin>>, level: ConsoleLevel, text: String) {
    interp.console.push(ConsoleLine { origin, level, text });
}

/// `util.format`: printf-style substitution on a leading string, then the remaining
/// arguments separated by spaces.
pub(crate) fn format_log_args(interp: &mut Interp, args: &[Value]) -> JsResult<String> {
    let options = interp.inspect_options.clone();
    let mut out = String::new();
    let mut rest = args;
    if let Some((Value::String(template), tail)) = args.split_first() {
        rest = tail;
        let mut chars = template.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            let Some(&spec) = chars.peek() else {
                out.push('%');
                break;
            };
            if spec == '%' {
                chars.next();
                out.push('%');
                continue;
            }
            if !"sdifjoOc".contains(spec) {
                out.push('%');
                continue;
            }
            chars.next();
            let Some((value, tail)) = rest.split_first() else {
                out.push('%');
                out.push(spec);
                continue;
            };
            rest = tail;
            out.push_str(&format_spec(interp, spec, value, &options)?);
        }
    }
    for (index, value) in rest.iter().enumerate() {
        if index > 0 || !out.is_empty() || args.len() > rest.len() {
            out.push(' ');
        }
        out.push_str(&interp.display_value(value, &options));
    }
    Ok(out)
}

fn format_spec(interp: &mut Interp, spec: char, value: &Value, options: &InspectOptions) -> JsResult<String> {
    Ok(match spec {
        's' => match value {
            Value::Object(obj) if !obj.is_callable() => {
                let shallow = InspectOptions {
                    depth: 0,
                    ..options.clone()
                };
                interp.inspect(value, &shallow)
            }
            Value::String(s) => s.to_string(),
            other => interp.to_string(other)?.to_string(),
        },
        'd' => match value {
            Value::Object(_) => "NaN".to_owned(),
            other => number_to_string(interp.to_number(other)?),
        },
        'i' => match value {
            Value::Object(_) => "NaN".to_owned(),
            other => {
                let text = interp.to_string(other)?;
                number_to_string(number::parse_int_str(&text, 10))
            }
        },
        'f' => {
            let text = interp.to_string(value)?;
            number_to_string(number::parse_float_str(&text))
        }
        'j' => json::stringify(interp, value, "")?.unwrap_or_else(|| "undefined".to_owned()),
        'o' | 'O' => interp.inspect(value, options),
        // %c carries CSS, which has no meaning here
        _ => String::new(),
    })
}
