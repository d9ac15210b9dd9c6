//! `JSON`. Parsing goes through `serde_json`; stringification walks the object graph
//! directly so that `toJSON`, replacers and accessors behave as scripts expect.

use std::rc::Rc;

use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    convert::to_integer,
    number_to_string,
    object::{Class, JsObject, ObjRef},
    realm::Intrinsics,
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let json = ObjRef::new(JsObject::new(Class::Ordinary, Some(intrinsics.object_proto.clone())));
    installer.method(&json, "parse", 2, parse);
    installer.method(&json, "stringify", 3, stringify_method);
    global.define_hidden("JSON", json);
}

/// Converts parsed JSON into script values in the current realm.
pub(crate) fn from_json(interp: &Interp, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            Value::Object(interp.new_array(items.iter().map(|item| from_json(interp, item)).collect()))
        }
        serde_json::Value::Object(entries) => {
            let obj = interp.new_object();
            for (key, value) in entries {
                obj.define_data(key, from_json(interp, value));
            }
            Value::Object(obj)
        }
    }
}

fn parse(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = interp.to_string(&arg(args, 0))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|err| interp.syntax_error(format!("Unexpected token in JSON: {err}")))?;
    let value = from_json(interp, &json);
    let reviver = arg(args, 1);
    if !reviver.is_callable() {
        return Ok(value);
    }
    let holder = interp.new_object();
    holder.define_data("", value);
    revive(interp, &Value::Object(holder), "", &reviver)
}

fn revive(interp: &mut Interp, holder: &Value, key: &str, reviver: &Value) -> JsResult<Value> {
    let value = interp.get(holder, key)?;
    if let Value::Object(obj) = &value {
        let keys = obj.borrow().own_enumerable_keys();
        for child in keys {
            let revived = revive(interp, &value, &child, reviver)?;
            if revived.is_undefined() {
                obj.borrow_mut().delete(&child);
            } else {
                interp.put(&value, &child, revived)?;
            }
        }
    }
    interp.call(reviver, holder.clone(), &[Value::from(key), value])
}

fn stringify_method(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let replacer = arg(args, 1);
    let indent = match arg(args, 2) {
        Value::Number(n) => {
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped to 0..=10")]
            let width = to_integer(n).clamp(0.0, 10.0) as usize;
            " ".repeat(width)
        }
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let mut state = Stringifier {
        indent,
        replacer: None,
        allow_list: None,
        stack: Vec::new(),
    };
    if replacer.is_callable() {
        state.replacer = Some(replacer);
    } else if let Some(items) = replacer.as_object().and_then(|obj| obj.borrow().array_items().cloned()) {
        let mut allow = Vec::new();
        for item in items {
            if matches!(item, Value::String(_) | Value::Number(_)) {
                let key = interp.to_string(&item)?;
                if !allow.contains(&key) {
                    allow.push(key);
                }
            }
        }
        state.allow_list = Some(allow);
    }
    let holder = interp.new_object();
    holder.define_data("", arg(args, 0));
    let out = state.serialize_property(interp, &Value::Object(holder), "", "")?;
    Ok(out.map_or(Value::Undefined, Value::from))
}

/// `JSON.stringify(value, null, indent)`, `None` when the value has no JSON form.
pub(crate) fn stringify(interp: &mut Interp, value: &Value, indent: &str) -> JsResult<Option<String>> {
    let mut state = Stringifier {
        indent: indent.to_owned(),
        replacer: None,
        allow_list: None,
        stack: Vec::new(),
    };
    let holder = interp.new_object();
    holder.define_data("", value.clone());
    state.serialize_property(interp, &Value::Object(holder), "", "")
}

struct Stringifier {
    indent: String,
    replacer: Option<Value>,
    allow_list: Option<Vec<Rc<str>>>,
    stack: Vec<ObjRef>,
}

impl Stringifier {
    fn serialize_property(
        &mut self,
        interp: &mut Interp,
        holder: &Value,
        key: &str,
        current_indent: &str,
    ) -> JsResult<Option<String>> {
        let mut value = interp.get(holder, key)?;
        if let Value::Object(_) = &value {
            let to_json = interp.get(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interp.call(&to_json, value.clone(), &[Value::from(key)])?;
            }
        }
        if let Some(replacer) = &self.replacer {
            value = interp.call(replacer, holder.clone(), &[Value::from(key), value])?;
        }
        // unwrap boxed primitives
        if let Value::Object(obj) = &value {
            let unboxed = match &obj.borrow().class {
                Class::Number(_) => Some(true),
                Class::String(_) => Some(false),
                Class::Boolean(b) => return Ok(Some(b.to_string())),
                _ => None,
            };
            value = match unboxed {
                Some(true) => Value::Number(interp.to_number(&value)?),
                Some(false) => Value::String(interp.to_string(&value)?),
                None => value,
            };
        }
        Ok(match &value {
            Value::Null => Some("null".to_owned()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) if n.is_finite() => Some(number_to_string(*n)),
            Value::Number(_) => Some("null".to_owned()),
            Value::String(s) => Some(quote_json(s)),
            Value::Undefined => None,
            Value::Object(obj) if obj.is_callable() => None,
            Value::Object(obj) => {
                if self.stack.iter().any(|seen| seen.ptr_eq(obj)) {
                    return Err(interp.type_error("Converting circular structure to JSON"));
                }
                self.stack.push(obj.clone());
                let result = if obj.is_array() {
                    self.serialize_array(interp, &value, current_indent)
                } else {
                    self.serialize_object(interp, &value, current_indent)
                };
                self.stack.pop();
                Some(result?)
            }
        })
    }

    fn serialize_object(&mut self, interp: &mut Interp, value: &Value, current_indent: &str) -> JsResult<String> {
        let inner_indent = format!("{current_indent}{}", self.indent);
        let keys: Vec<Rc<str>> = match &self.allow_list {
            Some(allow) => allow.clone(),
            None => value.as_object().map(|obj| obj.borrow().own_enumerable_keys()).unwrap_or_default(),
        };
        let mut parts = Vec::new();
        for key in keys {
            if let Some(text) = self.serialize_property(interp, value, &key, &inner_indent)? {
                let separator = if self.indent.is_empty() { ":" } else { ": " };
                parts.push(format!("{}{separator}{text}", quote_json(&key)));
            }
        }
        Ok(self.wrap(&parts, ('{', '}'), current_indent, &inner_indent))
    }

    fn serialize_array(&mut self, interp: &mut Interp, value: &Value, current_indent: &str) -> JsResult<String> {
        let inner_indent = format!("{current_indent}{}", self.indent);
        let length = interp.length_of(value)?;
        let mut parts = Vec::with_capacity(length);
        for index in 0..length {
            let text = self.serialize_property(interp, value, &index.to_string(), &inner_indent)?;
            parts.push(text.unwrap_or_else(|| "null".to_owned()));
        }
        Ok(self.wrap(&parts, ('[', ']'), current_indent, &inner_indent))
    }

    fn wrap(&self, parts: &[String], brackets: (char, char), current_indent: &str, inner_indent: &str) -> String {
        let (open, close) = brackets;
        if parts.is_empty() {
            return format!("{open}{close}");
        }
        if self.indent.is_empty() {
            return format!("{open}{}{close}", parts.join(","));
        }
        let separator = format!(",\n{inner_indent}");
        format!("{open}\n{inner_indent}{}\n{current_indent}{close}", parts.join(&separator))
    }
}

fn quote_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if u32::from(c) < 0x20 => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
