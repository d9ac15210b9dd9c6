//! `Number`, `Boolean` and the numeric globals (`parseInt`, `parseFloat`, `isNaN`, `isFinite`).

use super::{Installer, arg, frozen};
use crate::interp::{
    Interp, JsResult,
    convert::{number_to_string, to_int32, to_integer},
    object::{Class, ObjRef},
    realm::Intrinsics,
    value::Value,
};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.number_proto;
    proto.borrow_mut().class = Class::Number(0.0);
    let ctor = installer.constructor(
        "Number",
        1,
        Some(|interp, _, args| Ok(Value::Number(to_numeric_arg(interp, args)?))),
        |interp, this, args| {
            let n = to_numeric_arg(interp, args)?;
            if let Value::Object(obj) = this {
                obj.borrow_mut().class = Class::Number(n);
            }
            Ok(this.clone())
        },
        proto,
    );
    let constants = [
        ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
        ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ];
    for (name, value) in constants {
        ctor.define(name, frozen(Value::Number(value)));
    }
    installer.method(&ctor, "isInteger", 1, |_, _, args| {
        Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
    });
    installer.method(&ctor, "isSafeInteger", 1, |_, _, args| {
        Ok(Value::Bool(
            matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER),
        ))
    });
    installer.method(&ctor, "isFinite", 1, |_, _, args| {
        Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
    });
    installer.method(&ctor, "isNaN", 1, |_, _, args| {
        Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
    });

    // Number.parseInt === parseInt
    let parse_int = installer.function("parseInt", 2, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        let radix = to_int32(interp.to_number(&arg(args, 1))?);
        Ok(Value::Number(parse_int_with_radix(&text, radix)))
    });
    let parse_float = installer.function("parseFloat", 1, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(parse_float_str(&text)))
    });
    ctor.define_hidden("parseInt", parse_int.clone());
    ctor.define_hidden("parseFloat", parse_float.clone());
    global.define_hidden("parseInt", parse_int);
    global.define_hidden("parseFloat", parse_float);
    installer.method(global, "isNaN", 1, |interp, _, args| {
        Ok(Value::Bool(interp.to_number(&arg(args, 0))?.is_nan()))
    });
    installer.method(global, "isFinite", 1, |interp, _, args| {
        Ok(Value::Bool(interp.to_number(&arg(args, 0))?.is_finite()))
    });
    global.define_hidden("Number", ctor);

    installer.method(proto, "toString", 1, to_string);
    installer.method(proto, "toLocaleString", 0, to_locale_string);
    installer.method(proto, "valueOf", 0, |interp, this, _| Ok(Value::Number(this_number(interp, this)?)));
    installer.method(proto, "toFixed", 1, to_fixed);
    installer.method(proto, "toPrecision", 1, to_precision);

    install_boolean(installer, intrinsics, global);
}

fn install_boolean(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.boolean_proto;
    proto.borrow_mut().class = Class::Boolean(false);
    let ctor = installer.constructor(
        "Boolean",
        1,
        Some(|_, _, args| Ok(Value::Bool(Interp::to_boolean(&arg(args, 0))))),
        |_, this, args| {
            if let Value::Object(obj) = this {
                obj.borrow_mut().class = Class::Boolean(Interp::to_boolean(&arg(args, 0)));
            }
            Ok(this.clone())
        },
        proto,
    );
    global.define_hidden("Boolean", ctor);
    installer.method(proto, "toString", 0, |interp, this, _| {
        Ok(Value::from(this_boolean(interp, this)?.to_string()))
    });
    installer.method(proto, "valueOf", 0, |interp, this, _| Ok(Value::Bool(this_boolean(interp, this)?)));
}

fn to_numeric_arg(interp: &mut Interp, args: &[Value]) -> JsResult<f64> {
    match args.first() {
        Some(value) => interp.to_number(value),
        None => Ok(0.0),
    }
}

fn this_number(interp: &Interp, this: &Value) -> JsResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(obj) => match obj.borrow().class {
            Class::Number(n) => Ok(n),
            _ => Err(interp.type_error("Number.prototype.valueOf requires that 'this' be a Number")),
        },
        _ => Err(interp.type_error("Number.prototype.valueOf requires that 'this' be a Number")),
    }
}

fn this_boolean(interp: &Interp, this: &Value) -> JsResult<bool> {
    match this {
        Value::Bool(b) => Ok(*b),
        Value::Object(obj) => match obj.borrow().class {
            Class::Boolean(b) => Ok(b),
            _ => Err(interp.type_error("Boolean.prototype.valueOf requires that 'this' be a Boolean")),
        },
        _ => Err(interp.type_error("Boolean.prototype.valueOf requires that 'this' be a Boolean")),
    }
}

fn to_string(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let n = this_number(interp, this)?;
    let radix = match arg(args, 0) {
        Value::Undefined => 10.0,
        value => to_integer(interp.to_number(&value)?),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(interp.range_error("toString() radix must be between 2 and 36"));
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "radix checked to be in 2..=36")]
    let radix = radix as u32;
    Ok(Value::from(if radix == 10 {
        number_to_string(n)
    } else {
        to_radix_string(n, radix)
    }))
}

fn to_locale_string(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let n = this_number(interp, this)?;
    if !n.is_finite() {
        return Ok(Value::from(if n.is_nan() { "NaN" } else if n > 0.0 { "∞" } else { "-∞" }));
    }
    let fixed = fixed_string(n.abs(), 3);
    let (int, frac) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac = frac.trim_end_matches('0');
    let mut grouped = String::new();
    for (index, digit) in int.chars().enumerate() {
        if index > 0 && (int.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if n < 0.0 && (int != "0" || !frac.is_empty()) { "-" } else { "" };
    Ok(Value::from(if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }))
}

fn to_fixed(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let n = this_number(interp, this)?;
    let digits = to_integer(interp.to_number(&arg(args, 0))?);
    if !(0.0..=100.0).contains(&digits) {
        return Err(interp.range_error("toFixed() digits argument must be between 0 and 100"));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(Value::from(number_to_string(n)));
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "checked to be in 0..=100")]
    let digits = digits as usize;
    let body = fixed_string(n.abs(), digits);
    let sign = if n < 0.0 { "-" } else { "" };
    Ok(Value::from(format!("{sign}{body}")))
}

fn to_precision(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let n = this_number(interp, this)?;
    let precision = arg(args, 0);
    if precision.is_undefined() {
        return Ok(Value::from(number_to_string(n)));
    }
    let precision = to_integer(interp.to_number(&precision)?);
    if !n.is_finite() {
        return Ok(Value::from(number_to_string(n)));
    }
    if !(1.0..=100.0).contains(&precision) {
        return Err(interp.range_error("toPrecision() argument must be between 1 and 100"));
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "checked to be in 1..=100")]
    let precision = precision as usize;
    let sign = if n < 0.0 { "-" } else { "" };
    Ok(Value::from(format!("{sign}{}", precision_string(n.abs(), precision))))
}

/// The exact decimal expansion of a finite non-negative `x` as significant digits and
/// the position of the decimal point: `x = 0.d1d2... * 10^point`.
fn exact_decimal(x: f64) -> (String, i64) {
    let text = format!("{x:.1100}");
    let (int, frac) = text.split_once('.').unwrap_or((&text, ""));
    let mut digits = format!("{int}{frac}");
    let leading = digits.len() - digits.trim_start_matches('0').len();
    digits.drain(..leading);
    let point = signed(int.len()) - signed(leading);
    let trimmed = digits.trim_end_matches('0').len();
    digits.truncate(trimmed);
    (digits, point)
}

fn signed(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Rounds `0.digits * 10^keep` half-up to an integer and returns its decimal digits.
fn round_to_integer(digits: &str, keep: i64) -> String {
    if keep < 0 {
        return "0".to_owned();
    }
    let keep = usize::try_from(keep).unwrap_or(usize::MAX);
    if keep >= digits.len() {
        let mut out = digits.to_owned();
        out.push_str(&"0".repeat(keep - digits.len()));
        return if out.is_empty() { "0".to_owned() } else { out };
    }
    let mut head: Vec<u8> = digits.as_bytes()[..keep].to_vec();
    if digits.as_bytes()[keep] >= b'5' {
        let mut index = head.len();
        loop {
            if index == 0 {
                head.insert(0, b'1');
                break;
            }
            index -= 1;
            if head[index] == b'9' {
                head[index] = b'0';
            } else {
                head[index] += 1;
                break;
            }
        }
    }
    if head.is_empty() {
        return "0".to_owned();
    }
    String::from_utf8(head).unwrap_or_default()
}

/// `x.toFixed(fraction)` for finite non-negative `x` below 1e21.
fn fixed_string(x: f64, fraction: usize) -> String {
    let (digits, point) = exact_decimal(x);
    let mut scaled = round_to_integer(&digits, point + signed(fraction));
    if scaled.len() <= fraction {
        scaled = format!("{}{scaled}", "0".repeat(fraction + 1 - scaled.len()));
    }
    if fraction == 0 {
        return scaled;
    }
    let (int, frac) = scaled.split_at(scaled.len() - fraction);
    format!("{int}.{frac}")
}

/// `x.toPrecision(precision)` for finite non-negative `x`.
fn precision_string(x: f64, precision: usize) -> String {
    if x == 0.0 {
        return if precision == 1 {
            "0".to_owned()
        } else {
            format!("0.{}", "0".repeat(precision - 1))
        };
    }
    let (digits, point) = exact_decimal(x);
    let mut rounded = round_to_integer(&digits, signed(precision));
    let mut exponent = point - 1;
    if rounded.len() > precision {
        rounded.truncate(precision);
        exponent += 1;
    }
    if exponent < -6 || exponent >= signed(precision) {
        let (first, rest) = rounded.split_at(1);
        let sign = if exponent < 0 { '-' } else { '+' };
        return if rest.is_empty() {
            format!("{first}e{sign}{}", exponent.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", exponent.abs())
        };
    }
    if exponent >= 0 {
        let split = usize::try_from(exponent + 1).unwrap_or(rounded.len()).min(rounded.len());
        let (int, frac) = rounded.split_at(split);
        if frac.is_empty() {
            int.to_owned()
        } else {
            format!("{int}.{frac}")
        }
    } else {
        let zeros = usize::try_from(-exponent - 1).unwrap_or(0);
        format!("0.{}{rounded}", "0".repeat(zeros))
    }
}

fn to_radix_string(n: f64, radix: u32) -> String {
    if !n.is_finite() {
        return number_to_string(n);
    }
    let digit = |d: f64| {
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "a digit below the radix")]
        let d = d as u32;
        std::char::from_digit(d, radix).unwrap_or('0')
    };
    let radix_f = f64::from(radix);
    let negative = n < 0.0;
    let abs = n.abs();
    let mut int = abs.trunc();
    let mut frac = abs - int;
    let mut int_digits = Vec::new();
    while int >= 1.0 {
        int_digits.push(digit(int % radix_f));
        int = (int / radix_f).trunc();
    }
    if int_digits.is_empty() {
        int_digits.push('0');
    }
    int_digits.reverse();
    let mut out: String = int_digits.into_iter().collect();
    if frac > 0.0 {
        out.push('.');
        // enough digits to distinguish doubles in base 2
        for _ in 0..52 {
            frac *= radix_f;
            let d = frac.trunc();
            out.push(digit(d));
            frac -= d;
            if frac == 0.0 {
                break;
            }
        }
    }
    if negative { format!("-{out}") } else { out }
}

/// `parseInt(text, 10)`.
pub(crate) fn parse_int_str(text: &str, radix: u32) -> f64 {
    parse_int_with_radix(text, i32::try_from(radix).unwrap_or(0))
}

fn parse_int_with_radix(text: &str, radix: i32) -> f64 {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let mut radix = radix;
    let mut rest = rest;
    let hex_prefix = rest.starts_with("0x") || rest.starts_with("0X");
    if radix == 0 {
        radix = 10;
        if hex_prefix {
            radix = 16;
        }
    } else if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if radix == 16 && hex_prefix {
        rest = &rest[2..];
    }
    let radix = radix.unsigned_abs();
    let end = rest.find(|c: char| !c.is_digit(radix)).unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = if radix == 10 {
        digits.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d))
    };
    if negative { -value } else { value }
}

/// `parseFloat(text)`: the longest prefix that reads as a decimal literal.
pub(crate) fn parse_float_str(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if trimmed[end..].starts_with("Infinity") {
        return if trimmed.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_from = |mut at: usize| {
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        at
    };
    let int_end = digits_from(end);
    let mut seen_digits = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || seen_digits {
            seen_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !seen_digits {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_start = end + 1;
        if matches!(bytes.get(exp_start), Some(b'+' | b'-')) {
            exp_start += 1;
        }
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }
    trimmed[..end].trim_end_matches('.').parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int_str("  42px", 10).to_bits(), 42.0f64.to_bits());
        assert_eq!(parse_int_with_radix("0x1f", 0).to_bits(), 31.0f64.to_bits());
        assert_eq!(parse_int_with_radix("-101", 2).to_bits(), (-5.0f64).to_bits());
        assert!(parse_int_with_radix("zz", 10).is_nan());
        assert!(parse_int_with_radix("1", 40).is_nan());
    }

    #[test]
    fn parse_float_prefixes() {
        assert_eq!(parse_float_str("3.25abc").to_bits(), 3.25f64.to_bits());
        assert_eq!(parse_float_str(".5").to_bits(), 0.5f64.to_bits());
        assert_eq!(parse_float_str("1e3x").to_bits(), 1000.0f64.to_bits());
        assert_eq!(parse_float_str("7.").to_bits(), 7.0f64.to_bits());
        assert!(parse_float_str("abc").is_nan());
        assert!(parse_float_str("-Infinity").is_infinite());
    }

    #[test]
    fn fixed_rounds_half_up_on_exact_value() {
        assert_eq!(fixed_string(2.5, 0), "3");
        assert_eq!(fixed_string(1.005, 2), "1.00");
        assert_eq!(fixed_string(0.000_5, 3), "0.001");
        assert_eq!(fixed_string(123.456, 1), "123.5");
        assert_eq!(fixed_string(0.0, 2), "0.00");
    }

    #[test]
    fn precision_layouts() {
        assert_eq!(precision_string(123.456, 4), "123.5");
        assert_eq!(precision_string(0.000_123, 2), "0.00012");
        assert_eq!(precision_string(123_456.0, 2), "1.2e+5");
        assert_eq!(precision_string(9.99, 2), "10");
    }

    #[test]
    fn radix_strings() {
        assert_eq!(to_radix_string(255.0, 16), "ff");
        assert_eq!(to_radix_string(-0.5, 2), "-0.1");
        assert_eq!(to_radix_string(0.0, 2), "0");
    }
}
