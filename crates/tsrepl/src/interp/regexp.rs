//! `RegExp`, backed by the `regex` crate.
//!
//! Patterns are handed to `regex` nearly verbatim with the JavaScript flags turned into
//! inline flags. Patterns `regex` rejects (backreferences, lookaround) are compiled with
//! `fancy-regex` instead, which backtracks up to a fixed step limit. Match positions are
//! converted between UTF-8 byte offsets and the UTF-16 indices scripts see.

use std::{ops::Range, rc::Rc};

use regex::{Regex, RegexBuilder};

use super::{
    Interp, JsResult,
    builtins::{Installer, arg},
    object::{Class, JsObject, ObjRef, Property},
    realm::Intrinsics,
    value::Value,
};

pub(crate) struct RegExpData {
    pub source: Rc<str>,
    pub flags: Rc<str>,
    pub regex: Pattern,
}

pub(crate) enum Pattern {
    Linear(Regex),
    Backtracking(fancy_regex::Regex),
}

/// Byte ranges of the groups of one match; group 0 is the whole match.
pub(crate) struct Groups(Vec<Option<Range<usize>>>);

impl Groups {
    pub fn get(&self, index: usize) -> Option<Range<usize>> {
        self.0.get(index).cloned().flatten()
    }

    pub fn whole(&self) -> Option<Range<usize>> {
        self.get(0)
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    pub fn text<'t>(&self, index: usize, text: &'t str) -> Option<&'t str> {
        self.get(index).and_then(|range| text.get(range))
    }
}

impl Pattern {
    pub fn captures_at(&self, text: &str, start: usize) -> Option<Groups> {
        match self {
            Self::Linear(regex) => regex
                .captures_at(text, start)
                .map(|caps| Groups(caps.iter().map(|m| m.map(|m| m.start()..m.end())).collect())),
            Self::Backtracking(regex) => match regex.captures_from_pos(text, start) {
                Ok(caps) => caps.map(|caps| Groups(caps.iter().map(|m| m.map(|m| m.start()..m.end())).collect())),
                Err(err) => {
                    log::warn!("regular expression match abandoned: {err}");
                    None
                }
            },
        }
    }

    pub fn find(&self, text: &str) -> Option<Range<usize>> {
        self.captures_at(text, 0)?.whole()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// Named groups and their indices.
    pub fn group_names<'a>(&'a self) -> Vec<(&'a str, usize)> {
        let named = |(index, name): (usize, Option<&'a str>)| name.map(|name| (name, index));
        match self {
            Self::Linear(regex) => regex.capture_names().enumerate().filter_map(named).collect(),
            Self::Backtracking(regex) => regex.capture_names().enumerate().filter_map(named).collect(),
        }
    }
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }

    pub fn sticky(&self) -> bool {
        self.flags.contains('y')
    }
}

/// Upper bound on the compiled program size; keeps hostile patterns from eating memory.
const SIZE_LIMIT: usize = 1 << 22;

/// Steps a backtracking match may take before it is abandoned as a non-match.
const BACKTRACK_LIMIT: usize = 1_000_000;

fn compile(interp: &Interp, source: &str, flags: &str) -> JsResult<Pattern> {
    if let Some(bad) = flags.chars().find(|c| !"gimsuy".contains(*c)) {
        return Err(interp.syntax_error(format!("Invalid flags supplied to RegExp constructor '{bad}'")));
    }
    let pattern = if source.is_empty() { "(?:)" } else { source };
    let linear = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .size_limit(SIZE_LIMIT)
        .build();
    let err = match linear {
        Ok(regex) => return Ok(Pattern::Linear(regex)),
        Err(err) => err,
    };
    let inline: String = flags.chars().filter(|c| "ims".contains(*c)).collect();
    let prefixed = if inline.is_empty() {
        pattern.to_owned()
    } else {
        format!("(?{inline}){pattern}")
    };
    let backtracking = fancy_regex::RegexBuilder::new(&prefixed)
        .backtrack_limit(BACKTRACK_LIMIT)
        .delegate_size_limit(SIZE_LIMIT)
        .build();
    match backtracking {
        Ok(regex) => Ok(Pattern::Backtracking(regex)),
        Err(_) => {
            let detail = match err {
                regex::Error::Syntax(text) => text.lines().last().unwrap_or_default().trim().to_owned(),
                other => other.to_string(),
            };
            Err(interp.syntax_error(format!("Invalid regular expression: /{source}/{flags}: {detail}")))
        }
    }
}

/// Creates a `RegExp` object in the current realm.
pub(crate) fn new_regexp(interp: &Interp, source: &str, flags: &str) -> JsResult<ObjRef> {
    let regex = compile(interp, source, flags)?;
    let data = RegExpData {
        source: source.into(),
        flags: sorted_flags(flags).into(),
        regex,
    };
    let obj = ObjRef::new(JsObject::new(
        Class::RegExp(Rc::new(data)),
        Some(interp.realm.intrinsics.regexp_proto.clone()),
    ));
    obj.define(
        "lastIndex",
        Property {
            enumerable: false,
            configurable: false,
            ..Property::data(Value::Number(0.0))
        },
    );
    Ok(obj)
}

fn sorted_flags(flags: &str) -> String {
    let mut chars: Vec<char> = flags.chars().collect();
    chars.sort_by_key(|c| "dgimsuy".find(*c));
    chars.dedup();
    chars.into_iter().collect()
}

pub(crate) fn regexp_data(value: &Value) -> Option<Rc<RegExpData>> {
    match &value.as_object()?.borrow().class {
        Class::RegExp(data) => Some(data.clone()),
        _ => None,
    }
}

/// UTF-16 index of byte offset `byte` in `text`.
pub(crate) fn utf16_index(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or(0, |prefix| prefix.encode_utf16().count())
}

/// Byte offset of UTF-16 index `index` in `text`, clamped to the end.
pub(crate) fn byte_offset(text: &str, index: usize) -> usize {
    let mut units = 0;
    for (offset, ch) in text.char_indices() {
        if units >= index {
            return offset;
        }
        units += ch.len_utf16();
    }
    text.len()
}

/// Builds the match array `exec` returns.
pub(crate) fn match_array(interp: &Interp, data: &RegExpData, caps: &Groups, text: &str) -> ObjRef {
    let items = (0..caps.count())
        .map(|index| caps.text(index, text).map_or(Value::Undefined, Value::from))
        .collect();
    let array = interp.new_array(items);
    let start = caps.whole().map_or(0, |m| m.start);
    array.define_data("index", Value::from(utf16_index(text, start)));
    array.define_data("input", Value::from(text));
    let names = data.regex.group_names();
    let groups = if names.is_empty() {
        Value::Undefined
    } else {
        let groups = interp.new_object();
        for (name, index) in names {
            let value = caps.text(index, text).map_or(Value::Undefined, Value::from);
            groups.define_data(name, value);
        }
        Value::Object(groups)
    };
    array.define_data("groups", groups);
    array
}

/// `RegExp.prototype.exec`, honouring `lastIndex` for global and sticky patterns.
pub(crate) fn exec(interp: &mut Interp, obj: &ObjRef, data: &RegExpData, text: &str) -> JsResult<Value> {
    let uses_last_index = data.global() || data.sticky();
    let start = if uses_last_index {
        let last_index = interp.get(&Value::Object(obj.clone()), "lastIndex")?;
        let last_index = interp.to_number(&last_index)?;
        if last_index > text.encode_utf16().count() as f64 {
            obj.borrow_mut().put_own("lastIndex", Value::Number(0.0));
            return Ok(Value::Null);
        }
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped to the text length")]
        let index = last_index.max(0.0) as usize;
        byte_offset(text, index)
    } else {
        0
    };
    let caps = data
        .regex
        .captures_at(text, start)
        .filter(|caps| !data.sticky() || caps.whole().is_some_and(|m| m.start == start));
    let Some(caps) = caps else {
        if uses_last_index {
            obj.borrow_mut().put_own("lastIndex", Value::Number(0.0));
        }
        return Ok(Value::Null);
    };
    if uses_last_index {
        let end = caps.whole().map_or(start, |m| m.end);
        obj.borrow_mut().put_own("lastIndex", Value::from(utf16_index(text, end)));
    }
    Ok(Value::Object(match_array(interp, data, &caps, text)))
}

fn this_regexp(interp: &Interp, this: &Value, method: &str) -> JsResult<(ObjRef, Rc<RegExpData>)> {
    match (this.as_object(), regexp_data(this)) {
        (Some(obj), Some(data)) => Ok((obj.clone(), data)),
        _ => Err(interp.type_error(format!(
            "RegExp.prototype.{method} called on incompatible receiver {}",
            interp.describe_for_error(this)
        ))),
    }
}

fn regexp_call(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    regexp_construct(interp, &Value::Undefined, args)
}

fn regexp_construct(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let pattern = arg(args, 0);
    let flags = arg(args, 1);
    let (source, inherited_flags) = match regexp_data(&pattern) {
        Some(data) => (data.source.clone(), data.flags.clone()),
        None if pattern.is_undefined() => (Rc::from(""), Rc::from("")),
        None => (interp.to_string(&pattern)?, Rc::from("")),
    };
    let flags = if flags.is_undefined() {
        inherited_flags
    } else {
        interp.to_string(&flags)?
    };
    new_regexp(interp, &source, &flags).map(Value::Object)
}

fn test(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let (obj, data) = this_regexp(interp, this, "test")?;
    let text = interp.to_string(&arg(args, 0))?;
    let result = exec(interp, &obj, &data, &text)?;
    Ok(Value::Bool(!matches!(result, Value::Null)))
}

fn exec_method(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let (obj, data) = this_regexp(interp, this, "exec")?;
    let text = interp.to_string(&arg(args, 0))?;
    exec(interp, &obj, &data, &text)
}

fn to_string(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let (_, data) = this_regexp(interp, this, "toString")?;
    Ok(Value::from(format!("/{}/{}", data.source, data.flags)))
}

fn source(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let (_, data) = this_regexp(interp, this, "source")?;
    Ok(Value::String(data.source.clone()))
}

fn flags(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let (_, data) = this_regexp(interp, this, "flags")?;
    Ok(Value::String(data.flags.clone()))
}

fn flag_getter(interp: &Interp, this: &Value, flag: char) -> JsResult<Value> {
    let (_, data) = this_regexp(interp, this, "flags")?;
    Ok(Value::Bool(data.flags.contains(flag)))
}

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.regexp_proto;
    let ctor = installer.constructor("RegExp", 2, Some(regexp_call), regexp_construct, proto);
    global.define_hidden("RegExp", ctor);
    installer.method(proto, "test", 1, test);
    installer.method(proto, "exec", 1, exec_method);
    installer.method(proto, "toString", 0, to_string);
    installer.getter(proto, "source", source);
    installer.getter(proto, "flags", flags);
    installer.getter(proto, "global", |interp, this, _| flag_getter(interp, this, 'g'));
    installer.getter(proto, "ignoreCase", |interp, this, _| flag_getter(interp, this, 'i'));
    installer.getter(proto, "multiline", |interp, this, _| flag_getter(interp, this, 'm'));
    installer.getter(proto, "sticky", |interp, this, _| flag_getter(interp, this, 'y'));
}
