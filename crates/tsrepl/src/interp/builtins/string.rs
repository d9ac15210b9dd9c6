//! `String` and its prototype.
//!
//! Strings are stored as UTF-8 while scripts index them in UTF-16 code units, so every
//! position argument goes through [`byte_offset`] and every reported index through
//! [`utf16_index`].

use std::rc::Rc;

use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    convert::{number_to_string, relative_index, to_integer, to_uint32},
    iter::{IterCursor, IterKind},
    object::{Class, ObjRef, utf16_unit_at},
    realm::Intrinsics,
    regexp::{self, Groups, RegExpData, byte_offset, regexp_data, utf16_index},
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.string_proto;
    proto.borrow_mut().class = Class::String("".into());
    let ctor = installer.constructor(
        "String",
        1,
        Some(|interp, _, args| match args.first() {
            Some(value) => Ok(Value::String(interp.to_string(value)?)),
            None => Ok(Value::from("")),
        }),
        |interp, this, args| {
            let text = match args.first() {
                Some(value) => interp.to_string(value)?,
                None => "".into(),
            };
            if let Value::Object(obj) = this {
                obj.borrow_mut().class = Class::String(text);
            }
            Ok(this.clone())
        },
        proto,
    );
    installer.method(&ctor, "fromCharCode", 1, from_char_code);
    installer.method(&ctor, "fromCodePoint", 1, from_code_point);
    installer.method(&ctor, "raw", 1, raw);
    global.define_hidden("String", ctor);

    let methods: [(&str, usize, super::Builtin); 37] = [
        ("toString", 0, value_of),
        ("valueOf", 0, value_of),
        ("charAt", 1, char_at),
        ("charCodeAt", 1, char_code_at),
        ("codePointAt", 1, code_point_at),
        ("at", 1, at),
        ("indexOf", 1, index_of),
        ("lastIndexOf", 1, last_index_of),
        ("includes", 1, includes),
        ("startsWith", 1, starts_with),
        ("endsWith", 1, ends_with),
        ("slice", 2, slice),
        ("substring", 2, substring),
        ("substr", 2, substr),
        ("toUpperCase", 0, |interp, this, _| map_text(interp, this, "toUpperCase", |s| s.to_uppercase())),
        ("toLowerCase", 0, |interp, this, _| map_text(interp, this, "toLowerCase", |s| s.to_lowercase())),
        ("toLocaleUpperCase", 0, |interp, this, _| {
            map_text(interp, this, "toLocaleUpperCase", |s| s.to_uppercase())
        }),
        ("toLocaleLowerCase", 0, |interp, this, _| {
            map_text(interp, this, "toLocaleLowerCase", |s| s.to_lowercase())
        }),
        ("trim", 0, |interp, this, _| {
            map_text(interp, this, "trim", |s| s.trim_matches(is_space).to_owned())
        }),
        ("trimStart", 0, |interp, this, _| {
            map_text(interp, this, "trimStart", |s| s.trim_start_matches(is_space).to_owned())
        }),
        ("trimEnd", 0, |interp, this, _| {
            map_text(interp, this, "trimEnd", |s| s.trim_end_matches(is_space).to_owned())
        }),
        ("trimLeft", 0, |interp, this, _| {
            map_text(interp, this, "trimLeft", |s| s.trim_start_matches(is_space).to_owned())
        }),
        ("trimRight", 0, |interp, this, _| {
            map_text(interp, this, "trimRight", |s| s.trim_end_matches(is_space).to_owned())
        }),
        ("normalize", 0, |interp, this, _| map_text(interp, this, "normalize", str::to_owned)),
        ("padStart", 2, |interp, this, args| pad(interp, this, args, true)),
        ("padEnd", 2, |interp, this, args| pad(interp, this, args, false)),
        ("repeat", 1, repeat),
        ("concat", 1, concat),
        ("split", 2, split),
        ("replace", 2, |interp, this, args| replace(interp, this, args, false)),
        ("replaceAll", 2, |interp, this, args| replace(interp, this, args, true)),
        ("match", 1, match_method),
        ("matchAll", 1, match_all),
        ("search", 1, search),
        ("localeCompare", 1, locale_compare),
        ("isWellFormed", 0, |interp, this, _| {
            this_text(interp, this, "isWellFormed")?;
            Ok(Value::Bool(true))
        }),
        ("toWellFormed", 0, |interp, this, _| map_text(interp, this, "toWellFormed", str::to_owned)),
    ];
    for (name, length, f) in methods {
        installer.method(proto, name, length, f);
    }
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// `this` coerced to a string; `null` and `undefined` are rejected.
fn this_text(interp: &mut Interp, this: &Value, method: &str) -> JsResult<Rc<str>> {
    if this.is_nullish() {
        return Err(interp.type_error(format!("String.prototype.{method} called on null or undefined")));
    }
    interp.to_string(this)
}

fn map_text(interp: &mut Interp, this: &Value, method: &str, f: impl FnOnce(&str) -> String) -> JsResult<Value> {
    let text = this_text(interp, this, method)?;
    Ok(Value::from(f(&text)))
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// The text between UTF-16 indices `start` and `end`.
fn utf16_slice(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let from = byte_offset(text, start);
    let to = byte_offset(text, end);
    &text[from..to.max(from)]
}

/// An integer position argument clamped to `0..=len`, `default` when absent.
fn position_arg(interp: &mut Interp, value: &Value, len: usize, default: usize) -> JsResult<usize> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = to_integer(interp.to_number(value)?);
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped to [0, len]")]
    let index = n.clamp(0.0, len as f64) as usize;
    Ok(index)
}

fn value_of(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    match this {
        Value::String(_) => Ok(this.clone()),
        Value::Object(obj) => match &obj.borrow().class {
            Class::String(text) => Ok(Value::String(text.clone())),
            _ => Err(interp.type_error("String.prototype.valueOf requires that 'this' be a String")),
        },
        _ => Err(interp.type_error("String.prototype.valueOf requires that 'this' be a String")),
    }
}

fn from_char_code(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut units = Vec::with_capacity(args.len());
    for value in args {
        #[expect(clippy::cast_possible_truncation, reason = "ToUint16 keeps the low 16 bits")]
        let unit = to_uint32(interp.to_number(value)?) as u16;
        units.push(unit);
    }
    Ok(Value::from(String::from_utf16_lossy(&units)))
}

fn from_code_point(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut out = String::with_capacity(args.len());
    for value in args {
        let n = interp.to_number(value)?;
        let ch = (n.fract() == 0.0 && (0.0..=1_114_111.0).contains(&n))
            .then(|| {
                #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "checked range")]
                let code = n as u32;
                char::from_u32(code).unwrap_or('\u{fffd}')
            })
            .ok_or_else(|| interp.range_error(format!("Invalid code point {}", number_to_string(n))))?;
        out.push(ch);
    }
    Ok(Value::from(out))
}

/// `String.raw` as a plain function: `strings.raw` interleaved with substitutions.
fn raw(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let strings = arg(args, 0);
    let raw = interp.get(&strings, "raw")?;
    let count = interp.length_of(&raw)?;
    let mut out = String::new();
    for index in 0..count {
        let piece = interp.get(&raw, &index.to_string())?;
        out.push_str(&interp.to_string(&piece)?);
        if index + 1 < count {
            if let Some(sub) = args.get(index + 1) {
                out.push_str(&interp.to_string(sub)?);
            }
        }
    }
    Ok(Value::from(out))
}

fn char_at(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "charAt")?;
    let index = to_integer(interp.to_number(&arg(args, 0))?);
    if index < 0.0 {
        return Ok(Value::from(""));
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "non-negative integer")]
    let index = index as usize;
    Ok(Value::from(utf16_unit_at(&text, index).unwrap_or_default()))
}

fn char_code_at(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "charCodeAt")?;
    let index = to_integer(interp.to_number(&arg(args, 0))?);
    if index < 0.0 {
        return Ok(Value::Number(f64::NAN));
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "non-negative integer")]
    let index = index as usize;
    Ok(Value::Number(
        text.encode_utf16().nth(index).map_or(f64::NAN, f64::from),
    ))
}

fn code_point_at(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "codePointAt")?;
    let index = to_integer(interp.to_number(&arg(args, 0))?);
    if index < 0.0 || index >= utf16_len(&text) as f64 {
        return Ok(Value::Undefined);
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "within the text")]
    let index = index as usize;
    let units: Vec<u16> = text.encode_utf16().skip(index).take(2).collect();
    let code = match units.as_slice() {
        [high @ 0xd800..=0xdbff, low @ 0xdc00..=0xdfff, ..] => {
            0x10000 + ((u32::from(*high) - 0xd800) << 10) + (u32::from(*low) - 0xdc00)
        }
        [unit, ..] => u32::from(*unit),
        [] => return Ok(Value::Undefined),
    };
    Ok(Value::Number(f64::from(code)))
}

fn at(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "at")?;
    let len = utf16_len(&text);
    let n = to_integer(interp.to_number(&arg(args, 0))?);
    let index = if n < 0.0 { len as f64 + n } else { n };
    if index < 0.0 || index >= len as f64 {
        return Ok(Value::Undefined);
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "within the text")]
    let index = index as usize;
    Ok(utf16_unit_at(&text, index).map_or(Value::Undefined, Value::from))
}

fn index_of(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "indexOf")?;
    let needle = interp.to_string(&arg(args, 0))?;
    let from = position_arg(interp, &arg(args, 1), utf16_len(&text), 0)?;
    let start = byte_offset(&text, from);
    Ok(match text[start..].find(&*needle) {
        Some(found) => Value::from(utf16_index(&text, start + found)),
        None => Value::Number(-1.0),
    })
}

fn last_index_of(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "lastIndexOf")?;
    let needle = interp.to_string(&arg(args, 0))?;
    let len = utf16_len(&text);
    let from = match interp.to_number(&arg(args, 1))? {
        n if n.is_nan() => len,
        n => {
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped to [0, len]")]
            let from = to_integer(n).clamp(0.0, len as f64) as usize;
            from
        }
    };
    let limit = (byte_offset(&text, from) + needle.len()).min(text.len());
    let haystack = text.get(..limit).unwrap_or(&text);
    Ok(match haystack.rfind(&*needle) {
        Some(found) => Value::from(utf16_index(&text, found)),
        None => Value::Number(-1.0),
    })
}

fn reject_regexp(interp: &Interp, value: &Value, method: &str) -> JsResult<()> {
    if regexp_data(value).is_some() {
        return Err(interp.type_error(format!(
            "First argument to String.prototype.{method} must not be a regular expression"
        )));
    }
    Ok(())
}

fn includes(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "includes")?;
    reject_regexp(interp, &arg(args, 0), "includes")?;
    let needle = interp.to_string(&arg(args, 0))?;
    let from = position_arg(interp, &arg(args, 1), utf16_len(&text), 0)?;
    Ok(Value::Bool(text[byte_offset(&text, from)..].contains(&*needle)))
}

fn starts_with(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "startsWith")?;
    reject_regexp(interp, &arg(args, 0), "startsWith")?;
    let needle = interp.to_string(&arg(args, 0))?;
    let from = position_arg(interp, &arg(args, 1), utf16_len(&text), 0)?;
    Ok(Value::Bool(text[byte_offset(&text, from)..].starts_with(&*needle)))
}

fn ends_with(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "endsWith")?;
    reject_regexp(interp, &arg(args, 0), "endsWith")?;
    let needle = interp.to_string(&arg(args, 0))?;
    let len = utf16_len(&text);
    let end = position_arg(interp, &arg(args, 1), len, len)?;
    Ok(Value::Bool(text[..byte_offset(&text, end)].ends_with(&*needle)))
}

fn slice(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "slice")?;
    let len = utf16_len(&text);
    let start = relative_index(interp.to_number(&arg(args, 0))?, len);
    let end = match arg(args, 1) {
        Value::Undefined => len,
        value => relative_index(interp.to_number(&value)?, len),
    };
    Ok(Value::from(utf16_slice(&text, start, end)))
}

fn substring(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "substring")?;
    let len = utf16_len(&text);
    let start = position_arg(interp, &arg(args, 0), len, 0)?;
    let end = position_arg(interp, &arg(args, 1), len, len)?;
    Ok(Value::from(utf16_slice(&text, start.min(end), start.max(end))))
}

fn substr(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "substr")?;
    let len = utf16_len(&text);
    let start = relative_index(interp.to_number(&arg(args, 0))?, len);
    let count = position_arg(interp, &arg(args, 1), len - start, len - start)?;
    Ok(Value::from(utf16_slice(&text, start, start + count)))
}

fn pad(interp: &mut Interp, this: &Value, args: &[Value], at_start: bool) -> JsResult<Value> {
    let method = if at_start { "padStart" } else { "padEnd" };
    let text = this_text(interp, this, method)?;
    let target = to_integer(interp.to_number(&arg(args, 0))?);
    let filler = match arg(args, 1) {
        Value::Undefined => Rc::from(" "),
        value => interp.to_string(&value)?,
    };
    let len = utf16_len(&text);
    if target <= len as f64 || filler.is_empty() {
        return Ok(Value::String(text));
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "larger than the current length")]
    let missing = target as usize - len;
    let filler_units: Vec<u16> = filler.encode_utf16().collect();
    let padding: Vec<u16> = filler_units.iter().copied().cycle().take(missing).collect();
    let padding = String::from_utf16_lossy(&padding);
    Ok(Value::from(if at_start {
        format!("{padding}{text}")
    } else {
        format!("{text}{padding}")
    }))
}

fn repeat(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "repeat")?;
    let count = to_integer(interp.to_number(&arg(args, 0))?);
    if count < 0.0 || count.is_infinite() {
        return Err(interp.range_error(format!("Invalid count value: {}", number_to_string(count))));
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "finite and non-negative")]
    let count = count as usize;
    if text.len().saturating_mul(count) >= 1 << 29 {
        return Err(interp.range_error("Invalid string length"));
    }
    Ok(Value::from(text.repeat(count)))
}

fn concat(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "concat")?;
    let mut out = text.to_string();
    for value in args {
        out.push_str(&interp.to_string(value)?);
    }
    Ok(Value::from(out))
}

fn locale_compare(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "localeCompare")?;
    let other = interp.to_string(&arg(args, 0))?;
    let ordering = text
        .to_lowercase()
        .cmp(&other.to_lowercase())
        .then_with(|| other.cmp(&text));
    Ok(Value::Number(match ordering {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    }))
}

/// One match found by a string or regular-expression search. Offsets are in bytes.
struct Found {
    start: usize,
    end: usize,
    captures: Vec<Option<String>>,
    named: Vec<(String, Option<String>)>,
}

impl Found {
    fn from_captures(data: &RegExpData, caps: &Groups, text: &str) -> Option<Self> {
        let whole = caps.whole()?;
        Some(Self {
            start: whole.start,
            end: whole.end,
            captures: (1..caps.count()).map(|index| caps.text(index, text).map(str::to_owned)).collect(),
            named: data
                .regex
                .group_names()
                .into_iter()
                .map(|(name, index)| (name.to_owned(), caps.text(index, text).map(str::to_owned)))
                .collect(),
        })
    }
}

/// All matches of `data` in `text` (global) or the first one.
fn regex_matches(data: &RegExpData, text: &str, all: bool) -> Vec<Found> {
    let mut found = Vec::new();
    let mut at = 0;
    while at <= text.len() {
        let Some(caps) = data.regex.captures_at(text, at) else { break };
        let Some(m) = Found::from_captures(data, &caps, text) else { break };
        at = if m.end == m.start {
            // step over an empty match by one character
            m.end + text[m.end..].chars().next().map_or(1, char::len_utf8)
        } else {
            m.end
        };
        found.push(m);
        if !all {
            break;
        }
    }
    found
}

/// Expands `$` patterns in a replacement template.
fn expand_template(template: &str, text: &str, found: &Found) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut index = 0;
    while index < template.len() {
        let rest = &template[index..];
        if bytes[index] != b'$' || rest.len() == 1 {
            let ch = rest.chars().next().unwrap_or_default();
            out.push(ch);
            index += ch.len_utf8();
            continue;
        }
        let next = bytes[index + 1];
        match next {
            b'$' => {
                out.push('$');
                index += 2;
            }
            b'&' => {
                out.push_str(&text[found.start..found.end]);
                index += 2;
            }
            b'`' => {
                out.push_str(&text[..found.start]);
                index += 2;
            }
            b'\'' => {
                out.push_str(&text[found.end..]);
                index += 2;
            }
            b'<' if !found.named.is_empty() => {
                if let Some(close) = rest.find('>') {
                    let name = &rest[2..close];
                    if let Some((_, Some(value))) = found.named.iter().find(|(n, _)| n == name) {
                        out.push_str(value);
                    }
                    index += close + 1;
                } else {
                    out.push('$');
                    index += 1;
                }
            }
            b'0'..=b'9' => {
                let count = found.captures.len();
                let one = usize::from(next - b'0');
                let two = bytes
                    .get(index + 2)
                    .filter(|b| b.is_ascii_digit())
                    .map(|b| one * 10 + usize::from(b - b'0'));
                let (group, width) = match two {
                    Some(two) if (1..=count).contains(&two) => (two, 3),
                    _ if (1..=count).contains(&one) => (one, 2),
                    _ => (0, 0),
                };
                if width == 0 {
                    out.push('$');
                    index += 1;
                } else {
                    if let Some(Some(value)) = found.captures.get(group - 1) {
                        out.push_str(value);
                    }
                    index += width;
                }
            }
            _ => {
                out.push('$');
                index += 1;
            }
        }
    }
    out
}

fn replacement_text(
    interp: &mut Interp,
    replacement: &Value,
    text: &Rc<str>,
    found: &Found,
) -> JsResult<String> {
    if !replacement.is_callable() {
        let template = interp.to_string(replacement)?;
        return Ok(expand_template(&template, text, found));
    }
    let mut call_args = vec![Value::from(&text[found.start..found.end])];
    call_args.extend(found.captures.iter().map(|c| c.as_deref().map_or(Value::Undefined, Value::from)));
    call_args.push(Value::from(utf16_index(text, found.start)));
    call_args.push(Value::String(text.clone()));
    if !found.named.is_empty() {
        let groups = interp.new_object();
        for (name, value) in &found.named {
            groups.define_data(name, value.as_deref().map_or(Value::Undefined, Value::from));
        }
        call_args.push(Value::Object(groups));
    }
    let result = interp.call(replacement, Value::Undefined, &call_args)?;
    Ok(interp.to_string(&result)?.to_string())
}

fn replace(interp: &mut Interp, this: &Value, args: &[Value], all: bool) -> JsResult<Value> {
    let method = if all { "replaceAll" } else { "replace" };
    let text = this_text(interp, this, method)?;
    let pattern = arg(args, 0);
    let replacement = arg(args, 1);
    let matches = if let Some(data) = regexp_data(&pattern) {
        if all && !data.global() {
            return Err(interp.type_error("replaceAll must be called with a global RegExp"));
        }
        if data.global() {
            interp.put(&pattern, "lastIndex", Value::Number(0.0))?;
        }
        regex_matches(&data, &text, data.global())
    } else {
        let needle = interp.to_string(&pattern)?;
        string_matches(&text, &needle, all)
    };
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in &matches {
        out.push_str(&text[last..found.start]);
        out.push_str(&replacement_text(interp, &replacement, &text, found)?);
        last = found.end;
    }
    out.push_str(&text[last..]);
    Ok(Value::from(out))
}

fn string_matches(text: &str, needle: &str, all: bool) -> Vec<Found> {
    let found = |start: usize| Found {
        start,
        end: start + needle.len(),
        captures: Vec::new(),
        named: Vec::new(),
    };
    if needle.is_empty() {
        if !all {
            return vec![found(0)];
        }
        let mut positions: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        positions.push(text.len());
        return positions.into_iter().map(found).collect();
    }
    if all {
        text.match_indices(needle).map(|(i, _)| found(i)).collect()
    } else {
        text.find(needle).map(found).into_iter().collect()
    }
}

/// The argument of `match`/`matchAll`/`search` as a regular expression.
fn coerce_regexp(interp: &mut Interp, value: &Value, flags: &str) -> JsResult<(ObjRef, Rc<RegExpData>)> {
    if let (Some(obj), Some(data)) = (value.as_object(), regexp_data(value)) {
        return Ok((obj.clone(), data));
    }
    let source = match value {
        Value::Undefined => Rc::from(""),
        other => interp.to_string(other)?,
    };
    let obj = regexp::new_regexp(interp, &source, flags)?;
    let data = regexp_data(&Value::Object(obj.clone())).ok_or_else(|| interp.type_error("not a RegExp"))?;
    Ok((obj, data))
}

fn match_method(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "match")?;
    let (obj, data) = coerce_regexp(interp, &arg(args, 0), "")?;
    if !data.global() {
        return regexp::exec(interp, &obj, &data, &text);
    }
    obj.borrow_mut().put_own("lastIndex", Value::Number(0.0));
    let matches = regex_matches(&data, &text, true);
    if matches.is_empty() {
        return Ok(Value::Null);
    }
    let items = matches.iter().map(|m| Value::from(&text[m.start..m.end])).collect();
    Ok(Value::Object(interp.new_array(items)))
}

fn match_all(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "matchAll")?;
    let pattern = arg(args, 0);
    if regexp_data(&pattern).is_some_and(|data| !data.global()) {
        return Err(interp.type_error("String.prototype.matchAll called with a non-global RegExp argument"));
    }
    let (_, data) = coerce_regexp(interp, &pattern, "g")?;
    let mut arrays = Vec::new();
    let mut at = 0;
    while at <= text.len() {
        let Some(caps) = data.regex.captures_at(&text, at) else { break };
        let Some(whole) = caps.whole() else { break };
        at = if whole.is_empty() {
            whole.end + text[whole.end..].chars().next().map_or(1, char::len_utf8)
        } else {
            whole.end
        };
        arrays.push(Value::Object(regexp::match_array(interp, &data, &caps, &text)));
    }
    let array = interp.new_array(arrays);
    Ok(Value::Object(interp.make_iterator(IterCursor::Array {
        array,
        index: 0,
        kind: IterKind::Values,
    })))
}

fn search(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "search")?;
    let (_, data) = coerce_regexp(interp, &arg(args, 0), "")?;
    Ok(match data.regex.find(&text) {
        Some(m) => Value::from(utf16_index(&text, m.start)),
        None => Value::Number(-1.0),
    })
}

fn split(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_text(interp, this, "split")?;
    let separator = arg(args, 0);
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        value => to_uint32(interp.to_number(&value)?) as usize,
    };
    let mut parts: Vec<Value> = Vec::new();
    if limit == 0 {
        return Ok(Value::Object(interp.new_array(parts)));
    }
    if separator.is_undefined() {
        parts.push(Value::String(text));
        return Ok(Value::Object(interp.new_array(parts)));
    }
    if let Some(data) = regexp_data(&separator) {
        if text.is_empty() {
            if data.regex.is_match("") {
                return Ok(Value::Object(interp.new_array(parts)));
            }
            parts.push(Value::String(text));
            return Ok(Value::Object(interp.new_array(parts)));
        }
        let mut last = 0;
        for found in regex_matches(&data, &text, true) {
            // empty matches at either end and zero-width progress do not split
            if found.end == found.start && (found.start == 0 || found.start >= text.len() || found.start == last) {
                continue;
            }
            parts.push(Value::from(&text[last..found.start]));
            parts.extend(found.captures.iter().map(|c| c.as_deref().map_or(Value::Undefined, Value::from)));
            last = found.end;
            if parts.len() >= limit {
                parts.truncate(limit);
                return Ok(Value::Object(interp.new_array(parts)));
            }
        }
        parts.push(Value::from(&text[last..]));
    } else {
        let separator = interp.to_string(&separator)?;
        if separator.is_empty() {
            parts.extend(text.encode_utf16().map(|unit| Value::from(String::from_utf16_lossy(&[unit]))));
        } else {
            parts.extend(text.split(&*separator).map(Value::from));
        }
    }
    parts.truncate(limit);
    Ok(Value::Object(interp.new_array(parts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(start: usize, end: usize, captures: &[Option<&str>]) -> Found {
        Found {
            start,
            end,
            captures: captures.iter().map(|c| c.map(str::to_owned)).collect(),
            named: Vec::new(),
        }
    }

    #[test]
    fn template_expansion() {
        let text = "John Smith";
        let found = literal(0, 10, &[Some("John"), Some("Smith")]);
        assert_eq!(expand_template("$2, $1", text, &found), "Smith, John");
        assert_eq!(expand_template("$$1", text, &found), "$1");
        assert_eq!(expand_template("[$&]", text, &found), "[John Smith]");
        assert_eq!(expand_template("$3", text, &found), "$3");
    }

    #[test]
    fn slicing_uses_utf16_indices() {
        let text = "a😀b";
        assert_eq!(utf16_len(text), 4);
        assert_eq!(utf16_slice(text, 1, 3), "😀");
        assert_eq!(utf16_slice(text, 3, 4), "b");
    }

    #[test]
    fn empty_needle_matches_between_characters() {
        let matches = string_matches("ab", "", true);
        let starts: Vec<usize> = matches.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 1, 2]);
    }
}
