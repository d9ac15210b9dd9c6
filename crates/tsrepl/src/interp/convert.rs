//! Type coercions, equality and property access with accessors.

use std::rc::Rc;

use super::{
    Interp, JsResult,
    object::{Class, JsObject, ObjRef, Slot, array_index, utf16_unit_at},
    value::Value,
};

/// Formats a number the way `Number.prototype.toString()` does.
pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    let mut buffer = ryu::Buffer::new();
    let shortest = buffer.format_finite(n.abs());
    let (digits, point) = decimal_digits(shortest);
    let sign = if n < 0.0 { "-" } else { "" };
    format!("{sign}{}", layout_digits(&digits, point))
}

/// Splits ryu output into significant digits and the position of the decimal point
/// relative to the first digit (the value is `0.d1d2... * 10^point`).
fn decimal_digits(shortest: &str) -> (String, i32) {
    let (mantissa, exponent) = match shortest.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (shortest, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut digits: String = format!("{int_part}{frac_part}");
    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap, reason = "digit counts are tiny")]
    let mut point = int_part.len() as i32 + exponent;
    let leading = digits.len() - digits.trim_start_matches('0').len();
    digits.drain(..leading);
    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap, reason = "digit counts are tiny")]
    let leading = leading as i32;
    point -= leading;
    let trimmed = digits.trim_end_matches('0').len();
    digits.truncate(trimmed);
    if digits.is_empty() {
        digits.push('0');
        point = 1;
    }
    (digits, point)
}

fn layout_digits(digits: &str, point: i32) -> String {
    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap, reason = "digit counts are tiny")]
    let k = digits.len() as i32;
    if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k).unsigned_abs() as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point.unsigned_abs() as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else {
        let exponent = point - 1;
        let sign = if exponent < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{sign}{}", exponent.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", exponent.abs())
        }
    }
}

/// `StringToNumber`: whitespace-trimmed decimal, hex, octal or binary literal.
pub(crate) fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let radix_literal = |prefix: [&str; 2], radix: u32| -> Option<f64> {
        let digits = trimmed.strip_prefix(prefix[0]).or_else(|| trimmed.strip_prefix(prefix[1]))?;
        Some(parse_radix_digits(digits, radix).unwrap_or(f64::NAN))
    };
    if let Some(n) = radix_literal(["0x", "0X"], 16)
        .or_else(|| radix_literal(["0o", "0O"], 8))
        .or_else(|| radix_literal(["0b", "0B"], 2))
    {
        return n;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let valid = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parses an unsigned digit string in `radix`, rejecting empty input and stray characters.
pub(crate) fn parse_radix_digits(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        let digit = c.to_digit(radix)?;
        value = value * f64::from(radix) + f64::from(digit);
    }
    Some(value)
}

/// `ToInt32`
pub(crate) fn to_int32(n: f64) -> i32 {
    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap, reason = "ToInt32 wraps modulo 2^32")]
    let wrapped = to_uint32(n) as i32;
    wrapped
}

/// `ToUint32`
pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let truncated = n.trunc();
    let modulo = truncated.rem_euclid(4_294_967_296.0);
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is in [0, 2^32)")]
    let unsigned = modulo as u32;
    unsigned
}

/// `ToIntegerOrInfinity`
pub(crate) fn to_integer(n: f64) -> f64 {
    if n.is_nan() { 0.0 } else { n.trunc() }
}

/// Resolves a relative index argument (`slice`, `at`, ...) against `len`.
pub(crate) fn relative_index(n: f64, len: usize) -> usize {
    let n = to_integer(n);
    let len_f = len as f64;
    let resolved = if n < 0.0 { (len_f + n).max(0.0) } else { n.min(len_f) };
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped to [0, len]")]
    let index = resolved as usize;
    index
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    Default,
    Number,
    String,
}

impl Interp {
    pub(crate) fn to_boolean(value: &Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !(n.is_nan() || *n == 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub(crate) fn to_primitive(&mut self, value: &Value, hint: Hint) -> JsResult<Value> {
        let Value::Object(obj) = value else {
            return Ok(value.clone());
        };
        let is_date = matches!(obj.borrow().class, Class::Date(_));
        let order = match hint {
            Hint::String => ["toString", "valueOf"],
            Hint::Default if is_date => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get(value, name)?;
            if method.is_callable() {
                let result = self.call(&method, value.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub(crate) fn to_number(&mut self, value: &Value) -> JsResult<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub(crate) fn to_string(&mut self, value: &Value) -> JsResult<Rc<str>> {
        Ok(match value {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => if *b { "true" } else { "false" }.into(),
            Value::Number(n) => number_to_string(*n).into(),
            Value::String(s) => s.clone(),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                return self.to_string(&primitive);
            }
        })
    }

    /// Property key conversion; symbols do not exist so keys are always strings.
    pub(crate) fn to_property_key(&mut self, value: &Value) -> JsResult<Rc<str>> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(number_to_string(*n).into()),
            _ => self.to_string(value),
        }
    }

    pub(crate) fn to_object(&mut self, value: &Value) -> JsResult<ObjRef> {
        let intrinsics = &self.realm.intrinsics;
        let (class, proto) = match value {
            Value::Object(obj) => return Ok(obj.clone()),
            Value::Undefined | Value::Null => {
                return Err(self.type_error("Cannot convert undefined or null to object"));
            }
            Value::Bool(b) => (Class::Boolean(*b), intrinsics.boolean_proto.clone()),
            Value::Number(n) => (Class::Number(*n), intrinsics.number_proto.clone()),
            Value::String(s) => (Class::String(s.clone()), intrinsics.string_proto.clone()),
        };
        Ok(ObjRef::new(JsObject::new(class, Some(proto))))
    }

    /// Reads `key` from any value, boxing primitives through their prototypes.
    pub(crate) fn get(&mut self, target: &Value, key: &str) -> JsResult<Value> {
        let proto = match target {
            Value::Object(obj) => return self.get_from(obj, key, target),
            Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "Cannot read properties of {target:?} (reading '{key}')"
                )));
            }
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::from(s.encode_utf16().count()));
                }
                if let Some(index) = array_index(key) {
                    return Ok(utf16_unit_at(s, index).map_or(Value::Undefined, Value::from));
                }
                self.realm.intrinsics.string_proto.clone()
            }
            Value::Number(_) => self.realm.intrinsics.number_proto.clone(),
            Value::Bool(_) => self.realm.intrinsics.boolean_proto.clone(),
        };
        self.get_from(&proto, key, target)
    }

    /// `[[Get]]` on `obj` with an explicit receiver for accessors.
    pub(crate) fn get_from(&mut self, obj: &ObjRef, key: &str, receiver: &Value) -> JsResult<Value> {
        match obj.lookup(key) {
            None => Ok(Value::Undefined),
            Some(prop) => match prop.slot {
                Slot::Data(value) => Ok(value),
                Slot::Accessor { get: Some(getter), .. } => self.call(&getter, receiver.clone(), &[]),
                Slot::Accessor { get: None, .. } => Ok(Value::Undefined),
            },
        }
    }

    /// `target[key] = value` with sloppy-mode semantics: refused writes are silent.
    pub(crate) fn put(&mut self, target: &Value, key: &str, value: Value) -> JsResult<()> {
        let obj = match target {
            Value::Object(obj) => obj,
            Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "Cannot set properties of {target:?} (setting '{key}')"
                )));
            }
            _ => return Ok(()),
        };
        self.put_on(obj, key, value, target)
    }

    pub(crate) fn put_on(&mut self, obj: &ObjRef, key: &str, mut value: Value, receiver: &Value) -> JsResult<()> {
        if key == "length" && obj.is_array() {
            let len = self.to_number(&value)?;
            if !(0.0..=f64::from(u32::MAX)).contains(&len) || len.fract() != 0.0 {
                return Err(self.range_error("Invalid array length"));
            }
            value = Value::Number(len);
        }
        let own = obj.get_own(key);
        let found = match own {
            Some(prop) => Some((prop, true)),
            None => obj.proto().and_then(|proto| proto.lookup(key)).map(|prop| (prop, false)),
        };
        match found {
            Some((prop, is_own)) => match prop.slot {
                Slot::Accessor { set: Some(setter), .. } => {
                    self.call(&setter, receiver.clone(), &[value])?;
                }
                Slot::Accessor { set: None, .. } => {}
                Slot::Data(_) if !prop.writable => {}
                Slot::Data(_) => {
                    let target = match receiver {
                        Value::Object(receiver) if !is_own || !receiver.ptr_eq(obj) => receiver.clone(),
                        _ => obj.clone(),
                    };
                    target.borrow_mut().put_own(key, value);
                }
            },
            None => {
                let target = match receiver {
                    Value::Object(receiver) => receiver.clone(),
                    _ => obj.clone(),
                };
                target.borrow_mut().put_own(key, value);
            }
        }
        Ok(())
    }

    /// `==`
    pub(crate) fn loose_equals(&mut self, a: &Value, b: &Value) -> JsResult<bool> {
        Ok(match (a, b) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::String(s)) => a.strict_equals(&Value::Number(string_to_number(s))),
            (Value::String(s), Value::Number(_)) => Value::Number(string_to_number(s)).strict_equals(b),
            (Value::Bool(x), _) => {
                let n = Value::Number(f64::from(u8::from(*x)));
                return self.loose_equals(&n, b);
            }
            (_, Value::Bool(y)) => {
                let n = Value::Number(f64::from(u8::from(*y)));
                return self.loose_equals(a, &n);
            }
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                let primitive = self.to_primitive(a, Hint::Default)?;
                return self.loose_equals(&primitive, b);
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                let primitive = self.to_primitive(b, Hint::Default)?;
                return self.loose_equals(a, &primitive);
            }
            _ => a.strict_equals(b),
        })
    }

    /// `value instanceof ctor`
    pub(crate) fn instance_of(&mut self, value: &Value, ctor: &Value) -> JsResult<bool> {
        if !ctor.is_callable() {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        let Value::Object(obj) = value else {
            return Ok(false);
        };
        // bound functions test against their target
        let ctor = match ctor.as_object().and_then(|c| {
            c.borrow().function().and_then(|f| match &f.kind {
                super::function::FunctionKind::Bound(bound) => Some(bound.target.clone()),
                _ => None,
            })
        }) {
            Some(target) => Value::Object(target),
            None => ctor.clone(),
        };
        match self.get(&ctor, "prototype")? {
            Value::Object(proto) => Ok(obj.inherits_from(&proto)),
            _ => Err(self.type_error("Function has non-object prototype in instanceof check")),
        }
    }

    /// `key in obj`
    pub(crate) fn has_property(&mut self, obj: &Value, key: &Value) -> JsResult<bool> {
        let Value::Object(obj) = obj else {
            let key = self.to_string(key)?;
            return Err(self.type_error(format!("Cannot use 'in' operator to search for '{key}' in {obj:?}")));
        };
        let key = self.to_property_key(key)?;
        Ok(obj.has_property(&key))
    }

    /// Reads the `length` of an array-like as an index bound.
    pub(crate) fn length_of(&mut self, value: &Value) -> JsResult<usize> {
        if let Value::Object(obj) = value {
            if let Some(items) = obj.borrow().array_items() {
                return Ok(items.len());
            }
        }
        let length = self.get(value, "length")?;
        let n = to_integer(self.to_number(&length)?).max(0.0);
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped non-negative")]
        let length = n.min(9_007_199_254_740_991.0) as usize;
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbers_like_javascript() {
        let cases = [
            (1.0, "1"),
            (-1.5, "-1.5"),
            (0.1 + 0.2, "0.30000000000000004"),
            (1e21, "1e+21"),
            (1e-7, "1e-7"),
            (123_456_789.0, "123456789"),
            (0.000_001, "0.000001"),
            (1.5e-10, "1.5e-10"),
            (2f64.powi(53), "9007199254740992"),
            (-0.0, "0"),
            (f64::NAN, "NaN"),
            (f64::NEG_INFINITY, "-Infinity"),
        ];
        for (n, expected) in cases {
            assert_eq!(number_to_string(n), expected, "formatting {n:e}");
        }
    }

    #[test]
    fn parses_numeric_strings() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert_eq!(string_to_number(""), 0.0);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn wraps_int32() {
        assert_eq!(to_int32(4_294_967_295.0), -1);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
        assert_eq!(to_int32(f64::NAN), 0);
    }
}
