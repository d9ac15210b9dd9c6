//! `util.inspect`-style rendering of values.
//!
//! The layout rules (single-line packing, column grouping of long arrays, `<ref *N>`
//! markers) follow Node's inspector so results read the way users expect from a
//! JavaScript REPL. Getters are invoked; a getter that throws is rendered, never
//! propagated.

use ahash::AHashMap;

use super::{
    Interp,
    function::FunctionKind,
    iter::IterCursor,
    object::{Class, ObjRef, Slot, array_index},
    promise::PromiseState,
    value::Value,
};
use crate::config::InspectOptions;

/// Entries of a level with fewer nested levels than this may share one line.
const COMPACT: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Extras {
    Object,
    Array,
}

struct Inspector<'a> {
    options: &'a InspectOptions,
    seen: Vec<ObjRef>,
    circular: AHashMap<usize, usize>,
    indentation: usize,
    current_depth: usize,
}

impl Interp {
    /// Renders `value` the way a REPL echoes results: strings are quoted.
    pub(crate) fn inspect(&mut self, value: &Value, options: &InspectOptions) -> String {
        let mut inspector = Inspector {
            options,
            seen: Vec::new(),
            circular: AHashMap::new(),
            indentation: 0,
            current_depth: 0,
        };
        inspector.format_value(self, value, 0)
    }

    /// Renders `value` the way `console.log` prints an argument: strings verbatim.
    pub(crate) fn display_value(&mut self, value: &Value, options: &InspectOptions) -> String {
        match value {
            Value::String(s) => s.to_string(),
            other => self.inspect(other, options),
        }
    }
}

impl Inspector<'_> {
    fn format_value(&mut self, interp: &mut Interp, value: &Value, depth: usize) -> String {
        let Value::Object(obj) = value else {
            return format_primitive(value);
        };
        if self.seen.iter().any(|seen| seen.ptr_eq(obj)) {
            let next = self.circular.len() + 1;
            let index = *self.circular.entry(obj.addr()).or_insert(next);
            return format!("[Circular *{index}]");
        }
        self.format_raw(interp, obj, depth)
    }

    fn format_raw(&mut self, interp: &mut Interp, obj: &ObjRef, depth: usize) -> String {
        let constructor = constructor_name(obj);
        let keys = visible_keys(obj);
        let mut base = String::new();
        let mut extras = Extras::Object;
        let mut braces = (String::from("{"), "}");
        let mut output = Vec::new();
        let summary = Summary::of(obj);

        match &summary {
            Summary::Array(len) => {
                extras = Extras::Array;
                let prefix = match constructor.as_deref() {
                    Some("Array") => String::new(),
                    _ => prefix(constructor.as_deref(), "Array", &format!("({len})")),
                };
                braces = (format!("{prefix}["), "]");
                if *len == 0 && keys.is_empty() {
                    return format!("{}]", braces.0);
                }
            }
            Summary::Map(size) | Summary::Set(size) => {
                let fallback = if matches!(summary, Summary::Map(_)) { "Map" } else { "Set" };
                let prefix = prefix(constructor.as_deref(), fallback, &format!("({size})"));
                braces = (format!("{prefix}{{"), "}");
                if *size == 0 && keys.is_empty() {
                    return format!("{}}}", braces.0);
                }
            }
            Summary::Function => {
                base = function_base(obj, constructor.as_deref());
                if keys.is_empty() {
                    return base;
                }
            }
            Summary::Error => {
                base = self.error_base(interp, obj);
                if keys.is_empty() {
                    return base;
                }
            }
            Summary::Plain(text) => {
                base.clone_from(text);
                if keys.is_empty() {
                    return base;
                }
            }
            Summary::Boxed(text) => {
                base.clone_from(text);
                if keys.is_empty() {
                    return base;
                }
            }
            Summary::Promise | Summary::Ordinary => {
                let fallback = "Object";
                let prefix = match (&summary, constructor.as_deref()) {
                    (Summary::Ordinary, Some("Object")) => String::new(),
                    (Summary::Promise, Some("Promise")) => "Promise ".to_owned(),
                    (_, name) => prefix(name, fallback, ""),
                };
                braces = (format!("{prefix}{{"), "}");
                if matches!(summary, Summary::Ordinary) && keys.is_empty() {
                    return format!("{}}}", braces.0);
                }
            }
            Summary::Iterator(tag) => {
                braces = (format!("Object [{tag}] {{"), "}");
                if keys.is_empty() {
                    return format!("{}}}", braces.0);
                }
            }
        }

        if depth > self.options.depth {
            return match constructor {
                Some(name) => format!("[{name}]"),
                None => "[Object: null prototype]".to_owned(),
            };
        }

        let depth = depth + 1;
        self.seen.push(obj.clone());
        self.current_depth = depth;
        match &summary {
            Summary::Array(_) => self.format_array(interp, obj, depth, &mut output),
            Summary::Map(_) => self.format_map(interp, obj, depth, &mut output),
            Summary::Set(_) => self.format_set(interp, obj, depth, &mut output),
            Summary::Promise => self.format_promise(interp, obj, depth, &mut output),
            _ => {}
        }
        for key in &keys {
            let entry = self.format_property(interp, obj, key, depth);
            output.push(entry);
        }
        self.seen.pop();

        if let Some(index) = self.circular.get(&obj.addr()) {
            let reference = format!("<ref *{index}>");
            base = if base.is_empty() {
                reference
            } else {
                format!("{reference} {base}")
            };
        }

        let all_numbers = match &obj.borrow().class {
            Class::Array(items) => items.iter().all(|item| matches!(item, Value::Number(_))),
            _ => false,
        };
        self.reduce_to_single_string(output, &base, (&braces.0, braces.1), extras, depth, all_numbers)
    }

    fn format_array(&mut self, interp: &mut Interp, obj: &ObjRef, depth: usize, output: &mut Vec<String>) {
        let (items, holes) = {
            let borrowed = obj.borrow();
            (borrowed.array_items().cloned().unwrap_or_default(), borrowed.holes.clone())
        };
        let mut index = 0;
        let mut entries = 0;
        while index < items.len() && entries < self.options.max_array_length {
            entries += 1;
            if holes.contains(&index) {
                // a run of holes prints as one entry
                let run = (index..items.len()).take_while(|i| holes.contains(i)).count();
                let plural = if run == 1 { "" } else { "s" };
                output.push(format!("<{run} empty item{plural}>"));
                index += run;
                continue;
            }
            self.indentation += 2;
            let text = self.format_value(interp, &items[index], depth);
            self.indentation -= 2;
            output.push(text);
            index += 1;
        }
        if index < items.len() {
            output.push(remaining_text(items.len() - index));
        }
    }

    fn format_map(&mut self, interp: &mut Interp, obj: &ObjRef, depth: usize, output: &mut Vec<String>) {
        let entries: Vec<(Value, Value)> = match &obj.borrow().class {
            Class::Map(entries) => entries.iter().map(|(k, v)| (k.0.clone(), v.clone())).collect(),
            _ => Vec::new(),
        };
        let shown = entries.len().min(self.options.max_array_length);
        self.indentation += 2;
        for (key, value) in entries.iter().take(shown) {
            let key = self.format_value(interp, key, depth);
            let value = self.format_value(interp, value, depth);
            output.push(format!("{key} => {value}"));
        }
        self.indentation -= 2;
        if entries.len() > shown {
            output.push(remaining_text(entries.len() - shown));
        }
    }

    fn format_set(&mut self, interp: &mut Interp, obj: &ObjRef, depth: usize, output: &mut Vec<String>) {
        let items: Vec<Value> = match &obj.borrow().class {
            Class::Set(items) => items.iter().map(|k| k.0.clone()).collect(),
            _ => Vec::new(),
        };
        let shown = items.len().min(self.options.max_array_length);
        self.indentation += 2;
        for item in items.iter().take(shown) {
            output.push(self.format_value(interp, item, depth));
        }
        self.indentation -= 2;
        if items.len() > shown {
            output.push(remaining_text(items.len() - shown));
        }
    }

    fn format_promise(&mut self, interp: &mut Interp, obj: &ObjRef, depth: usize, output: &mut Vec<String>) {
        let (value, rejected) = match obj.promise_state() {
            Some(PromiseState::Fulfilled(value)) => (value, false),
            Some(PromiseState::Rejected(value)) => (value, true),
            Some(PromiseState::Pending) | None => {
                output.push("<pending>".to_owned());
                return;
            }
        };
        self.indentation += 2;
        let text = self.format_value(interp, &value, depth);
        self.indentation -= 2;
        output.push(if rejected { format!("<rejected> {text}") } else { text });
    }

    fn format_property(&mut self, interp: &mut Interp, obj: &ObjRef, key: &str, depth: usize) -> String {
        let name = if is_plain_key(key) {
            key.to_owned()
        } else {
            quote(key)
        };
        let Some(prop) = obj.get_own(key) else {
            return format!("{name}: undefined");
        };
        let text = match prop.slot {
            Slot::Data(value) => {
                self.indentation += 2;
                let text = self.format_value(interp, &value, depth);
                self.indentation -= 2;
                text
            }
            Slot::Accessor { get: Some(getter), set } => {
                let label = if set.is_some() { "Getter/Setter" } else { "Getter" };
                match interp.call(&getter, Value::Object(obj.clone()), &[]) {
                    Ok(Value::Null) => format!("[{label}: null]"),
                    Ok(value @ Value::Object(_)) => {
                        self.indentation += 2;
                        let text = self.format_value(interp, &value, depth);
                        self.indentation -= 2;
                        format!("[{label}] {text}")
                    }
                    Ok(value) => format!("[{label}: {}]", format_primitive(&value)),
                    Err(thrown) => {
                        let message = match &thrown.0 {
                            Value::Object(error) => match error.lookup("message").and_then(|p| p.value().cloned()) {
                                Some(Value::String(message)) => message.to_string(),
                                _ => "undefined".to_owned(),
                            },
                            _ => "undefined".to_owned(),
                        };
                        format!("[{label}: <Inspection threw ({message})>]")
                    }
                }
            }
            Slot::Accessor { get: None, set: Some(_) } => "[Setter]".to_owned(),
            Slot::Accessor { get: None, set: None } => "undefined".to_owned(),
        };
        format!("{name}: {text}")
    }

    fn error_base(&mut self, interp: &mut Interp, obj: &ObjRef) -> String {
        let stack = match obj.lookup("stack").and_then(|p| p.value().cloned()) {
            Some(Value::String(stack)) => stack.to_string(),
            _ => error_to_string(interp, obj),
        };
        let stack = if stack.contains("\n    at") {
            stack
        } else {
            format!("[{stack}]")
        };
        if self.indentation == 0 {
            stack
        } else {
            let indentation = " ".repeat(self.indentation);
            stack.replace('\n', &format!("\n{indentation}"))
        }
    }

    fn reduce_to_single_string(
        &self,
        output: Vec<String>,
        base: &str,
        braces: (&str, &str),
        extras: Extras,
        depth: usize,
        all_numbers: bool,
    ) -> String {
        let entries = output.len();
        let output = if extras == Extras::Array && entries > 6 {
            self.group_array_elements(output, all_numbers)
        } else {
            output
        };
        let prefix = if base.is_empty() {
            String::new()
        } else {
            format!("{base} ")
        };
        if self.current_depth.saturating_sub(depth) < COMPACT && entries == output.len() {
            let start = output.len() + self.indentation + width(braces.0) + width(base) + 10;
            if self.is_below_break_length(&output, start, base) {
                let joined = output.join(", ");
                if !joined.contains('\n') {
                    return format!("{prefix}{} {joined} {}", braces.0, braces.1);
                }
            }
        }
        let indentation = format!("\n{}", " ".repeat(self.indentation));
        format!(
            "{prefix}{}{indentation}  {}{indentation}{}",
            braces.0,
            output.join(&format!(",{indentation}  ")),
            braces.1
        )
    }

    fn is_below_break_length(&self, output: &[String], start: usize, base: &str) -> bool {
        let mut total = output.len() + start;
        if total + output.len() > self.options.break_length {
            return false;
        }
        for entry in output {
            total += width(entry);
            if total > self.options.break_length {
                return false;
            }
        }
        base.is_empty() || !base.contains('\n')
    }

    /// Packs short array entries into aligned columns.
    fn group_array_elements(&self, output: Vec<String>, all_numbers: bool) -> Vec<String> {
        let mut output_len = output.len();
        let has_more = output.last().is_some_and(|last| last.starts_with("... "));
        if has_more {
            output_len -= 1;
        }
        let separator_space = 2;
        let data_len: Vec<usize> = output.iter().take(output_len).map(|entry| width(entry)).collect();
        let total_len: usize = data_len.iter().map(|len| len + separator_space).sum();
        let max_len = data_len.iter().copied().max().unwrap_or(0);
        let actual_max = max_len + separator_space;
        if actual_max * 3 + self.indentation >= self.options.break_length
            || !(total_len as f64 / actual_max as f64 > 5.0 || max_len <= 6)
        {
            return output;
        }
        let approx_char_heights = 2.5;
        let average_bias = (actual_max as f64 - total_len as f64 / output.len() as f64).max(0.0).sqrt();
        let biased_max = (actual_max as f64 - 3.0 - average_bias).max(1.0);
        let ideal = ((approx_char_heights * biased_max * output_len as f64).sqrt() / biased_max).round();
        let fitting = (self.options.break_length.saturating_sub(self.indentation) / actual_max) as f64;
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "small positive column count")]
        let columns = ideal.min(fitting).min((COMPACT * 4) as f64).min(15.0) as usize;
        if columns <= 1 {
            return output;
        }
        let max_line_len: Vec<usize> = (0..columns)
            .map(|column| {
                data_len
                    .iter()
                    .skip(column)
                    .step_by(columns)
                    .copied()
                    .max()
                    .unwrap_or(0)
                    + separator_space
            })
            .collect();
        let mut grouped = Vec::new();
        let mut row_start = 0;
        while row_start < output_len {
            let row_end = (row_start + columns).min(output_len);
            let mut line = String::new();
            for index in row_start..row_end - 1 {
                let cell = format!("{}, ", output[index]);
                line.push_str(&pad(&cell, max_line_len[index - row_start], all_numbers));
            }
            let last = row_end - 1;
            if all_numbers {
                let padding = max_line_len[last - row_start] - separator_space;
                line.push_str(&pad(&output[last], padding, true));
            } else {
                line.push_str(&output[last]);
            }
            grouped.push(line);
            row_start += columns;
        }
        if has_more {
            grouped.extend(output.last().cloned());
        }
        grouped
    }
}

/// What kind of rendering an object gets.
enum Summary {
    Array(usize),
    Map(usize),
    Set(usize),
    Function,
    Error,
    /// Rendered entirely by its base text: regular expressions and dates.
    Plain(String),
    Boxed(String),
    Promise,
    Iterator(&'static str),
    Ordinary,
}

impl Summary {
    fn of(obj: &ObjRef) -> Self {
        match &obj.borrow().class {
            Class::Array(items) => Self::Array(items.len()),
            Class::Map(entries) => Self::Map(entries.len()),
            Class::Set(items) => Self::Set(items.len()),
            Class::Function(_) => Self::Function,
            Class::Error => Self::Error,
            Class::RegExp(data) => Self::Plain(format!("/{}/{}", data.source, data.flags)),
            Class::Date(time) => Self::Plain(
                super::builtins::iso_string(*time).unwrap_or_else(|| "Invalid Date".to_owned()),
            ),
            Class::Boolean(b) => Self::Boxed(format!("[Boolean: {b}]")),
            Class::Number(n) => Self::Boxed(format!("[Number: {}]", format_primitive(&Value::Number(*n)))),
            Class::String(s) => Self::Boxed(format!("[String: {}]", quote(s))),
            Class::Promise(_) => Self::Promise,
            Class::Iterator(cursor) => Self::Iterator(match cursor {
                IterCursor::Array { .. } => "Array Iterator",
                IterCursor::String { .. } => "String Iterator",
                IterCursor::Map { .. } => "Map Iterator",
                IterCursor::Set { .. } => "Set Iterator",
                IterCursor::Protocol { .. } | IterCursor::Done => "Iterator",
            }),
            Class::Ordinary => Self::Ordinary,
        }
    }
}

fn format_primitive(value: &Value) -> String {
    match value {
        Value::Number(n) if n.to_bits() == (-0.0f64).to_bits() => "-0".to_owned(),
        Value::String(s) => quote(s),
        other => format!("{other:?}"),
    }
}

/// Quotes a string with single quotes, switching to double quotes or backticks when that
/// avoids escaping.
pub(crate) fn quote(s: &str) -> String {
    let mut delimiter = '\'';
    if s.contains('\'') {
        if !s.contains('"') {
            delimiter = '"';
        } else if !s.contains('`') && !s.contains("${") {
            delimiter = '`';
        }
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for ch in s.chars() {
        match ch {
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{b}' => out.push_str("\\x0B"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c if u32::from(c) < 0x20 || (0x7f..=0x9f).contains(&u32::from(c)) => {
                out.push_str(&format!("\\x{:02X}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Own enumerable string keys, minus array indices for array-like classes.
fn visible_keys(obj: &ObjRef) -> Vec<std::rc::Rc<str>> {
    let borrowed = obj.borrow();
    let indexed = matches!(borrowed.class, Class::Array(_) | Class::String(_));
    borrowed
        .own_enumerable_keys()
        .into_iter()
        .filter(|key| !indexed || array_index(key).is_none())
        .collect()
}

/// Name of the nearest constructor on the prototype chain; `None` for null-prototype
/// objects.
fn constructor_name(obj: &ObjRef) -> Option<String> {
    let mut current = obj.proto();
    current.as_ref()?;
    while let Some(proto) = current {
        if let Some(Value::Object(ctor)) = proto.own_value("constructor") {
            if let Some(Value::String(name)) = ctor.own_value("name") {
                if ctor.is_callable() && !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
        current = proto.proto();
    }
    Some("Object".to_owned())
}

fn prefix(constructor: Option<&str>, fallback: &str, size: &str) -> String {
    match constructor {
        Some(name) => format!("{name}{size} "),
        None => format!("[{fallback}{size}: null prototype] "),
    }
}

fn function_base(obj: &ObjRef, constructor: Option<&str>) -> String {
    let name = match obj.own_value("name") {
        Some(Value::String(name)) => name.to_string(),
        _ => String::new(),
    };
    let borrowed = obj.borrow();
    let kind = borrowed.function().map(|f| &f.kind);
    if let Some(FunctionKind::Class(class)) = kind {
        let mut base = if name.is_empty() {
            "[class (anonymous)".to_owned()
        } else {
            format!("[class {name}")
        };
        if class.parent.as_ref().is_some_and(|parent| !parent.is_nullish()) {
            let parent_name = obj
                .proto()
                .and_then(|parent| parent.own_value("name"))
                .and_then(|name| match name {
                    Value::String(name) if !name.is_empty() => Some(name),
                    _ => None,
                });
            if let Some(parent_name) = parent_name {
                base.push_str(&format!(" extends {parent_name}"));
            }
        }
        base.push(']');
        return base;
    }
    let kind_name = match kind {
        Some(FunctionKind::Closure(closure)) if closure.code.is_async => "AsyncFunction",
        _ => "Function",
    };
    let mut base = format!("[{kind_name}");
    if constructor.is_none() {
        base.push_str(" (null prototype)");
    }
    if name.is_empty() {
        base.push_str(" (anonymous)");
    } else {
        base.push_str(&format!(": {name}"));
    }
    base.push(']');
    base
}

fn error_to_string(interp: &mut Interp, obj: &ObjRef) -> String {
    let read = |interp: &mut Interp, key: &str| match interp.get(&Value::Object(obj.clone()), key) {
        Ok(Value::String(s)) => Some(s.to_string()),
        _ => None,
    };
    let name = read(interp, "name").unwrap_or_else(|| "Error".to_owned());
    match read(interp, "message") {
        Some(message) if !message.is_empty() => format!("{name}: {message}"),
        _ => name,
    }
}

fn remaining_text(remaining: usize) -> String {
    let plural = if remaining > 1 { "s" } else { "" };
    format!("... {remaining} more item{plural}")
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, target: usize, at_start: bool) -> String {
    let fill = " ".repeat(target.saturating_sub(width(s)));
    if at_start {
        format!("{fill}{s}")
    } else {
        format!("{s}{fill}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_picks_delimiter() {
        assert_eq!(quote("abc"), "'abc'");
        assert_eq!(quote("it's"), "\"it's\"");
        assert_eq!(quote("it's \"x\""), "`it's \"x\"`");
        assert_eq!(quote("a\nb"), "'a\\nb'");
    }

    #[test]
    fn plain_keys() {
        assert!(is_plain_key("abc_1"));
        assert!(!is_plain_key("1abc"));
        assert!(!is_plain_key("a-b"));
        assert!(!is_plain_key(""));
    }
}
